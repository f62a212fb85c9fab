/// Database row types — these map directly to SQLite rows.
/// Distinct from the courier-types API models to keep the DB layer
/// independent. Timestamps stay as stored strings here; the API layer
/// parses them.

pub struct UserRow {
    pub username: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: String,
    pub join_at: String,
    pub last_login_at: String,
}

/// The public slice of a user row: list entries and embedded party
/// summaries.
pub struct ProfileRow {
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: String,
}

/// A message joined with the other party's profile, as produced by the
/// inbox/outbox projections.
pub struct PartnerMessageRow {
    pub id: String,
    pub body: String,
    pub sent_at: String,
    pub read_at: Option<String>,
    pub partner: ProfileRow,
}

/// A single message joined with both parties' profiles.
pub struct MessageDetailRow {
    pub id: String,
    pub body: String,
    pub sent_at: String,
    pub read_at: Option<String>,
    pub from: ProfileRow,
    pub to: ProfileRow,
}
