use crate::Database;
use crate::models::{MessageDetailRow, PartnerMessageRow, ProfileRow, UserRow};
use anyhow::Result;
use rusqlite::Connection;

impl Database {
    // -- Users --

    pub fn create_user(
        &self,
        username: &str,
        password_hash: &str,
        first_name: &str,
        last_name: &str,
        phone: &str,
        now: &str,
    ) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO users (username, password, first_name, last_name, phone, join_at, last_login_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)",
                rusqlite::params![username, password_hash, first_name, last_name, phone, now],
            )?;
            Ok(())
        })
    }

    pub fn get_user(&self, username: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, username))
    }

    /// Set last_login_at. Returns false if no such user exists.
    pub fn touch_login(&self, username: &str, now: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let updated = conn.execute(
                "UPDATE users SET last_login_at = ?2 WHERE username = ?1",
                rusqlite::params![username, now],
            )?;
            Ok(updated > 0)
        })
    }

    pub fn list_users(&self) -> Result<Vec<ProfileRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT username, first_name, last_name, phone
                 FROM users
                 ORDER BY username",
            )?;

            let rows = stmt
                .query_map([], |row| {
                    Ok(ProfileRow {
                        username: row.get(0)?,
                        first_name: row.get(1)?,
                        last_name: row.get(2)?,
                        phone: row.get(3)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            Ok(rows)
        })
    }

    // -- Messages --

    pub fn insert_message(
        &self,
        id: &str,
        from_username: &str,
        to_username: &str,
        body: &str,
        sent_at: &str,
    ) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO messages (id, from_username, to_username, body, sent_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                rusqlite::params![id, from_username, to_username, body, sent_at],
            )?;
            Ok(())
        })
    }

    pub fn get_message(&self, id: &str) -> Result<Option<MessageDetailRow>> {
        self.with_conn(|conn| query_message(conn, id))
    }

    /// Stamp read_at. The `read_at IS NULL` guard keeps an already-set
    /// timestamp in place, so re-marking never moves it.
    pub fn mark_read(&self, id: &str, read_at: &str) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "UPDATE messages SET read_at = ?2 WHERE id = ?1 AND read_at IS NULL",
                rusqlite::params![id, read_at],
            )?;
            Ok(())
        })
    }

    /// Outbox: messages sent by this user, each joined with the
    /// recipient's profile in a single query (eliminates N+1).
    pub fn messages_from(&self, username: &str) -> Result<Vec<PartnerMessageRow>> {
        self.with_conn(|conn| query_partner_messages(conn, username, Direction::From))
    }

    /// Inbox: messages sent to this user, each joined with the sender's
    /// profile.
    pub fn messages_to(&self, username: &str) -> Result<Vec<PartnerMessageRow>> {
        self.with_conn(|conn| query_partner_messages(conn, username, Direction::To))
    }
}

enum Direction {
    From,
    To,
}

fn query_user(conn: &Connection, username: &str) -> Result<Option<UserRow>> {
    let mut stmt = conn.prepare(
        "SELECT username, password, first_name, last_name, phone, join_at, last_login_at
         FROM users
         WHERE username = ?1",
    )?;

    let row = stmt
        .query_row([username], |row| {
            Ok(UserRow {
                username: row.get(0)?,
                password: row.get(1)?,
                first_name: row.get(2)?,
                last_name: row.get(3)?,
                phone: row.get(4)?,
                join_at: row.get(5)?,
                last_login_at: row.get(6)?,
            })
        })
        .optional()?;

    Ok(row)
}

fn query_message(conn: &Connection, id: &str) -> Result<Option<MessageDetailRow>> {
    let mut stmt = conn.prepare(
        "SELECT m.id, m.body, m.sent_at, m.read_at,
                f.username, f.first_name, f.last_name, f.phone,
                t.username, t.first_name, t.last_name, t.phone
         FROM messages m
           JOIN users f ON m.from_username = f.username
           JOIN users t ON m.to_username = t.username
         WHERE m.id = ?1",
    )?;

    let row = stmt
        .query_row([id], |row| {
            Ok(MessageDetailRow {
                id: row.get(0)?,
                body: row.get(1)?,
                sent_at: row.get(2)?,
                read_at: row.get(3)?,
                from: ProfileRow {
                    username: row.get(4)?,
                    first_name: row.get(5)?,
                    last_name: row.get(6)?,
                    phone: row.get(7)?,
                },
                to: ProfileRow {
                    username: row.get(8)?,
                    first_name: row.get(9)?,
                    last_name: row.get(10)?,
                    phone: row.get(11)?,
                },
            })
        })
        .optional()?;

    Ok(row)
}

fn query_partner_messages(
    conn: &Connection,
    username: &str,
    direction: Direction,
) -> Result<Vec<PartnerMessageRow>> {
    // The partner is the recipient for the outbox and the sender for the
    // inbox; the projection shape is identical either way.
    let sql = match direction {
        Direction::From => {
            "SELECT m.id, m.body, m.sent_at, m.read_at,
                    p.username, p.first_name, p.last_name, p.phone
             FROM messages m
               JOIN users p ON m.to_username = p.username
             WHERE m.from_username = ?1
             ORDER BY m.sent_at"
        }
        Direction::To => {
            "SELECT m.id, m.body, m.sent_at, m.read_at,
                    p.username, p.first_name, p.last_name, p.phone
             FROM messages m
               JOIN users p ON m.from_username = p.username
             WHERE m.to_username = ?1
             ORDER BY m.sent_at"
        }
    };

    let mut stmt = conn.prepare(sql)?;

    let rows = stmt
        .query_map([username], |row| {
            Ok(PartnerMessageRow {
                id: row.get(0)?,
                body: row.get(1)?,
                sent_at: row.get(2)?,
                read_at: row.get(3)?,
                partner: ProfileRow {
                    username: row.get(4)?,
                    first_name: row.get(5)?,
                    last_name: row.get(6)?,
                    phone: row.get(7)?,
                },
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(rows)
}

/// Extension trait for optional query results
trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>>;
}

impl<T> OptionalExt<T> for std::result::Result<T, rusqlite::Error> {
    fn optional(self) -> Result<Option<T>> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}
