use anyhow::anyhow;
use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use courier_db::models::MessageDetailRow;
use courier_types::api::{
    Claims, MessageResponse, ReadReceipt, ReadResponse, SendMessageRequest, SentMessage,
    SentResponse,
};
use courier_types::models::MessageDetail;
use tracing::error;
use uuid::Uuid;

use crate::auth::AppState;
use crate::error::ApiError;
use crate::middleware::ensure_message_party;
use crate::{parse_message_id, parse_timestamp, profile_summary};

pub async fn send_message(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<SendMessageRequest>,
) -> Result<impl IntoResponse, ApiError> {
    // Both parties must exist before the insert
    if state.db.get_user(&claims.username)?.is_none() {
        return Err(ApiError::NotFound(format!(
            "No such user: {}",
            claims.username
        )));
    }
    if state.db.get_user(&req.to_username)?.is_none() {
        return Err(ApiError::NotFound(format!(
            "No such user: {}",
            req.to_username
        )));
    }

    let id = Uuid::new_v4();
    let sent_at = Utc::now();

    // Run the blocking insert off the async runtime
    let db = state.clone();
    let mid = id.to_string();
    let from = claims.username.clone();
    let to = req.to_username.clone();
    let body = req.body.clone();
    let stamp = sent_at.to_rfc3339();
    tokio::task::spawn_blocking(move || db.db.insert_message(&mid, &from, &to, &body, &stamp))
        .await
        .map_err(|e| {
            error!("spawn_blocking join error: {e}");
            ApiError::Storage(anyhow!("task join error: {e}"))
        })??;

    Ok((
        StatusCode::CREATED,
        Json(SentResponse {
            message: SentMessage {
                id,
                from_username: claims.username,
                to_username: req.to_username,
                body: req.body,
                sent_at,
            },
        }),
    ))
}

pub async fn get_message(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<MessageResponse>, ApiError> {
    let row = state
        .db
        .get_message(&id.to_string())?
        .ok_or_else(|| ApiError::NotFound(format!("No such message: {id}")))?;

    ensure_message_party(&row, &claims.username)?;

    Ok(Json(MessageResponse {
        message: detail_from_row(row),
    }))
}

pub async fn mark_read(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<ReadResponse>, ApiError> {
    let row = state
        .db
        .get_message(&id.to_string())?
        .ok_or_else(|| ApiError::NotFound(format!("No such message: {id}")))?;

    if row.to.username != claims.username {
        return Err(ApiError::Forbidden);
    }

    // Marking an already-read message is a no-op; the original timestamp
    // stands.
    let read_at = match row.read_at.as_deref() {
        Some(ts) => parse_timestamp(ts, "messages.read_at"),
        None => {
            let now = Utc::now();
            state.db.mark_read(&id.to_string(), &now.to_rfc3339())?;
            now
        }
    };

    Ok(Json(ReadResponse {
        message: ReadReceipt { id, read_at },
    }))
}

fn detail_from_row(row: MessageDetailRow) -> MessageDetail {
    MessageDetail {
        id: parse_message_id(&row.id),
        body: row.body,
        sent_at: parse_timestamp(&row.sent_at, "messages.sent_at"),
        read_at: row
            .read_at
            .as_deref()
            .map(|ts| parse_timestamp(ts, "messages.read_at")),
        from_user: profile_summary(row.from),
        to_user: profile_summary(row.to),
    }
}
