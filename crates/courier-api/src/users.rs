use anyhow::anyhow;
use axum::{
    Extension, Json,
    extract::{Path, State},
};
use courier_types::api::{Claims, InboxResponse, OutboxResponse, UserResponse, UsersResponse};
use courier_types::models::{InboundMessage, OutboundMessage, UserDetail};
use tracing::error;

use crate::auth::AppState;
use crate::error::ApiError;
use crate::middleware::ensure_correct_user;
use crate::{parse_message_id, parse_timestamp, profile_summary};

pub async fn list_users(
    State(state): State<AppState>,
    Extension(_claims): Extension<Claims>,
) -> Result<Json<UsersResponse>, ApiError> {
    // Any authenticated user may list profiles
    let users = state
        .db
        .list_users()?
        .into_iter()
        .map(profile_summary)
        .collect();

    Ok(Json(UsersResponse { users }))
}

pub async fn get_user(
    State(state): State<AppState>,
    Path(username): Path<String>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<UserResponse>, ApiError> {
    ensure_correct_user(&username, &claims.username)?;

    let row = state
        .db
        .get_user(&username)?
        .ok_or_else(|| ApiError::NotFound(format!("No such user: {username}")))?;

    Ok(Json(UserResponse {
        user: UserDetail {
            username: row.username,
            first_name: row.first_name,
            last_name: row.last_name,
            phone: row.phone,
            join_at: parse_timestamp(&row.join_at, "users.join_at"),
            last_login_at: parse_timestamp(&row.last_login_at, "users.last_login_at"),
        },
    }))
}

pub async fn messages_to(
    State(state): State<AppState>,
    Path(username): Path<String>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<InboxResponse>, ApiError> {
    ensure_correct_user(&username, &claims.username)?;

    if state.db.get_user(&username)?.is_none() {
        return Err(ApiError::NotFound(format!("No such user: {username}")));
    }

    // Run the blocking projection query off the async runtime
    let db = state.clone();
    let name = username.clone();
    let rows = tokio::task::spawn_blocking(move || db.db.messages_to(&name))
        .await
        .map_err(|e| {
            error!("spawn_blocking join error: {e}");
            ApiError::Storage(anyhow!("task join error: {e}"))
        })??;

    let messages = rows
        .into_iter()
        .map(|row| InboundMessage {
            id: parse_message_id(&row.id),
            body: row.body,
            sent_at: parse_timestamp(&row.sent_at, "messages.sent_at"),
            read_at: row
                .read_at
                .as_deref()
                .map(|ts| parse_timestamp(ts, "messages.read_at")),
            from_user: profile_summary(row.partner),
        })
        .collect();

    Ok(Json(InboxResponse { messages }))
}

pub async fn messages_from(
    State(state): State<AppState>,
    Path(username): Path<String>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<OutboxResponse>, ApiError> {
    ensure_correct_user(&username, &claims.username)?;

    if state.db.get_user(&username)?.is_none() {
        return Err(ApiError::NotFound(format!("No such user: {username}")));
    }

    let db = state.clone();
    let name = username.clone();
    let rows = tokio::task::spawn_blocking(move || db.db.messages_from(&name))
        .await
        .map_err(|e| {
            error!("spawn_blocking join error: {e}");
            ApiError::Storage(anyhow!("task join error: {e}"))
        })??;

    let messages = rows
        .into_iter()
        .map(|row| OutboundMessage {
            id: parse_message_id(&row.id),
            body: row.body,
            sent_at: parse_timestamp(&row.sent_at, "messages.sent_at"),
            read_at: row
                .read_at
                .as_deref()
                .map(|ts| parse_timestamp(ts, "messages.read_at")),
            to_user: profile_summary(row.partner),
        })
        .collect();

    Ok(Json(OutboxResponse { messages }))
}
