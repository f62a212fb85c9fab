use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Public projection of a user: what other users are allowed to see.
/// Also embedded in message projections as the other party's summary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserSummary {
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: String,
}

/// Full profile as returned to the user themselves. The password hash
/// never leaves the auth module.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserDetail {
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: String,
    pub join_at: DateTime<Utc>,
    pub last_login_at: DateTime<Utc>,
}

/// A message as seen from the recipient's side.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InboundMessage {
    pub id: Uuid,
    pub body: String,
    pub sent_at: DateTime<Utc>,
    pub read_at: Option<DateTime<Utc>>,
    pub from_user: UserSummary,
}

/// A message as seen from the sender's side.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutboundMessage {
    pub id: Uuid,
    pub body: String,
    pub sent_at: DateTime<Utc>,
    pub read_at: Option<DateTime<Utc>>,
    pub to_user: UserSummary,
}

/// A single message with both parties embedded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageDetail {
    pub id: Uuid,
    pub body: String,
    pub sent_at: DateTime<Utc>,
    pub read_at: Option<DateTime<Utc>>,
    pub from_user: UserSummary,
    pub to_user: UserSummary,
}
