use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{InboundMessage, MessageDetail, OutboundMessage, UserDetail, UserSummary};

// -- JWT Claims --

/// JWT claims shared between token creation (login/register) and the
/// request middleware. Canonical definition lives here in courier-types.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub username: String,
    pub exp: usize,
}

// -- Auth --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegisterRequest {
    pub username: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub token: String,
}

// -- Users --

#[derive(Debug, Serialize)]
pub struct UsersResponse {
    pub users: Vec<UserSummary>,
}

#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub user: UserDetail,
}

#[derive(Debug, Serialize)]
pub struct InboxResponse {
    pub messages: Vec<InboundMessage>,
}

#[derive(Debug, Serialize)]
pub struct OutboxResponse {
    pub messages: Vec<OutboundMessage>,
}

// -- Messages --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SendMessageRequest {
    pub to_username: String,
    pub body: String,
}

/// Reply to a send: the stored message without the embedded party
/// summaries (the sender already knows both usernames).
#[derive(Debug, Serialize)]
pub struct SentMessage {
    pub id: Uuid,
    pub from_username: String,
    pub to_username: String,
    pub body: String,
    pub sent_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct SentResponse {
    pub message: SentMessage,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: MessageDetail,
}

/// Reply to a mark-read: just the id and the (now set) read timestamp.
#[derive(Debug, Serialize)]
pub struct ReadReceipt {
    pub id: Uuid,
    pub read_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct ReadResponse {
    pub message: ReadReceipt,
}
