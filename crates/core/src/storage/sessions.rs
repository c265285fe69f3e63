//! Session storage operations

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, Row};
use tracing::{debug, instrument};
use uuid::Uuid;

use super::parse::{
    format_datetime, parse_datetime, parse_datetime_opt, parse_people, parse_uuid, OptionalExt,
};
use crate::error::{Error, Result};
use crate::models::{Session, SessionUpdate};

const SESSION_COLUMNS: &str =
    "id, people, is_current, last_roll_time, last_updated, created_at, archived_at";

pub struct SessionStore<'a> {
    conn: &'a Connection,
}

impl<'a> SessionStore<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    fn row_to_session(row: &Row<'_>) -> rusqlite::Result<Session> {
        Ok(Session {
            id: parse_uuid(0, &row.get::<_, String>(0)?)?,
            people: parse_people(1, &row.get::<_, String>(1)?)?,
            is_current: row.get::<_, i64>(2)? != 0,
            last_roll_time: parse_datetime_opt(3, row.get(3)?)?,
            last_updated: parse_datetime(4, &row.get::<_, String>(4)?)?,
            created_at: parse_datetime(5, &row.get::<_, String>(5)?)?,
            archived_at: parse_datetime_opt(6, row.get(6)?)?,
        })
    }

    /// The session flagged current, if any
    #[instrument(skip(self))]
    pub fn find_current(&self) -> Result<Option<Session>> {
        let sql = format!("SELECT {} FROM sessions WHERE is_current = 1", SESSION_COLUMNS);
        let session = self
            .conn
            .query_row(&sql, [], Self::row_to_session)
            .optional()?;
        Ok(session)
    }

    #[instrument(skip(self))]
    pub fn find_by_id(&self, id: Uuid) -> Result<Option<Session>> {
        let sql = format!("SELECT {} FROM sessions WHERE id = ?1", SESSION_COLUMNS);
        let session = self
            .conn
            .query_row(&sql, params![id.to_string()], Self::row_to_session)
            .optional()?;
        Ok(session)
    }

    /// Archived sessions, newest first. `None` means no bound.
    #[instrument(skip(self))]
    pub fn list_archived(&self, limit: Option<u32>) -> Result<Vec<Session>> {
        let sql = format!(
            "SELECT {} FROM sessions
             WHERE is_current = 0 AND archived_at IS NOT NULL
             ORDER BY archived_at DESC
             LIMIT ?1",
            SESSION_COLUMNS
        );
        // SQLite treats a negative LIMIT as unbounded
        let limit = limit.map(i64::from).unwrap_or(-1);
        let mut stmt = self.conn.prepare(&sql)?;
        let sessions = stmt
            .query_map(params![limit], Self::row_to_session)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(sessions)
    }

    /// Insert a session. The unique index on `is_current` rejects a second
    /// current row.
    #[instrument(skip(self, session), fields(session_id = %session.id))]
    pub fn insert(&self, session: &Session) -> Result<()> {
        self.conn.execute(
            "INSERT INTO sessions (id, people, is_current, last_roll_time, last_updated, created_at, archived_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                session.id.to_string(),
                serde_json::to_string(&session.people)?,
                session.is_current as i64,
                session.last_roll_time.as_ref().map(format_datetime),
                format_datetime(&session.last_updated),
                format_datetime(&session.created_at),
                session.archived_at.as_ref().map(format_datetime),
            ],
        )?;
        debug!(people = session.people.len(), "Session inserted");
        Ok(())
    }

    /// Overwrite every mutable field of a current session in one statement.
    ///
    /// Unconditional with respect to what the row held before: the last
    /// writer wins. Only archived rows are protected.
    #[instrument(skip(self, update), fields(people = update.people.len()))]
    pub fn replace(&self, id: Uuid, update: &SessionUpdate) -> Result<()> {
        let changed = self.conn.execute(
            "UPDATE sessions SET people = ?1, last_updated = ?2, last_roll_time = ?3
             WHERE id = ?4 AND is_current = 1",
            params![
                serde_json::to_string(&update.people)?,
                format_datetime(&update.last_updated),
                update.last_roll_time.as_ref().map(format_datetime),
                id.to_string(),
            ],
        )?;
        if changed == 0 {
            return Err(Error::Precondition(format!(
                "session {} is no longer current",
                id
            )));
        }
        Ok(())
    }

    /// Flip a current session to archived
    #[instrument(skip(self))]
    pub fn archive(&self, id: Uuid, archived_at: DateTime<Utc>) -> Result<()> {
        let changed = self.conn.execute(
            "UPDATE sessions SET is_current = 0, archived_at = ?1
             WHERE id = ?2 AND is_current = 1",
            params![format_datetime(&archived_at), id.to_string()],
        )?;
        if changed == 0 {
            return Err(Error::Precondition(format!(
                "session {} is not the current session",
                id
            )));
        }
        debug!("Session archived");
        Ok(())
    }

    /// Number of rows flagged current (0 or 1 while the index holds)
    pub fn count_current(&self) -> Result<u32> {
        let count = self.conn.query_row(
            "SELECT COUNT(*) FROM sessions WHERE is_current = 1",
            [],
            |row| row.get(0),
        )?;
        Ok(count)
    }
}
