//! User storage operations

use chrono::Utc;
use rusqlite::{params, Connection};
use tracing::instrument;

use super::parse::{format_datetime, OptionalExt};
use crate::error::Result;
use crate::models::{normalize_username, UserIdentity};

pub struct UserStore<'a> {
    conn: &'a Connection,
}

impl<'a> UserStore<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Create a new user. Fails on a taken username.
    #[instrument(skip(self, user), fields(username = %user.username))]
    pub fn create(&self, user: &UserIdentity) -> Result<()> {
        self.conn.execute(
            "INSERT INTO users (username, display_name, created_at) VALUES (?1, ?2, ?3)",
            params![
                normalize_username(&user.username),
                user.display_name,
                format_datetime(&Utc::now()),
            ],
        )?;
        Ok(())
    }

    /// Find user by username (case-insensitive)
    #[instrument(skip(self))]
    pub fn find_by_username(&self, username: &str) -> Result<Option<UserIdentity>> {
        let user = self
            .conn
            .query_row(
                "SELECT username, display_name FROM users WHERE username = ?1",
                params![normalize_username(username)],
                |row| {
                    Ok(UserIdentity {
                        username: row.get(0)?,
                        display_name: row.get(1)?,
                    })
                },
            )
            .optional()?;
        Ok(user)
    }
}
