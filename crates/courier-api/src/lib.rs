pub mod auth;
pub mod error;
pub mod messages;
pub mod middleware;
pub mod users;

use axum::Router;
use axum::middleware::from_fn_with_state;
use axum::routing::{get, post};
use chrono::{DateTime, Utc};
use tracing::warn;
use uuid::Uuid;

use auth::AppState;
use courier_db::models::ProfileRow;
use courier_types::models::UserSummary;

/// Build the full route tree: login/register are public, everything else
/// sits behind the bearer-token middleware.
pub fn router(state: AppState) -> Router {
    let public = Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .with_state(state.clone());

    let protected = Router::new()
        .route("/users", get(users::list_users))
        .route("/users/{username}", get(users::get_user))
        .route("/users/{username}/to", get(users::messages_to))
        .route("/users/{username}/from", get(users::messages_from))
        .route("/messages", post(messages::send_message))
        .route("/messages/{id}", get(messages::get_message))
        .route("/messages/{id}/read", post(messages::mark_read))
        .layer(from_fn_with_state(state.clone(), middleware::require_auth))
        .with_state(state);

    Router::new().merge(public).merge(protected)
}

pub(crate) fn profile_summary(row: ProfileRow) -> UserSummary {
    UserSummary {
        username: row.username,
        first_name: row.first_name,
        last_name: row.last_name,
        phone: row.phone,
    }
}

pub(crate) fn parse_message_id(raw: &str) -> Uuid {
    raw.parse().unwrap_or_else(|e| {
        warn!("Corrupt message id '{}': {}", raw, e);
        Uuid::default()
    })
}

pub(crate) fn parse_timestamp(value: &str, column: &str) -> DateTime<Utc> {
    value
        .parse::<DateTime<Utc>>()
        .or_else(|_| {
            // SQLite's datetime('now') format carries no timezone. Parse as
            // naive UTC and convert.
            chrono::NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S")
                .map(|ndt| ndt.and_utc())
        })
        .unwrap_or_else(|e| {
            warn!("Corrupt timestamp '{}' in {}: {}", value, column, e);
            DateTime::default()
        })
}
