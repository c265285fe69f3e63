//! SQLite storage layer for Nightcap

mod migrations;
mod parse;
mod sessions;
mod traits;
mod users;

use chrono::{DateTime, Utc};
use rusqlite::Connection;
use std::path::Path;
use tracing::instrument;
use uuid::Uuid;

use crate::error::Result;
use crate::models::{Session, SessionUpdate, UserIdentity};

pub use parse::format_datetime;
pub use rusqlite::Error as SqlError;
pub use sessions::SessionStore;
pub use traits::{IdentityRepository, SessionRepository, Storage};
pub use users::UserStore;

/// Main database handle
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open or create database at the given path
    #[instrument(skip(path), fields(path = %path.as_ref().display()))]
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path)?;
        // Several processes may share one file
        conn.busy_timeout(std::time::Duration::from_secs(2))?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    /// Open in-memory database (for testing)
    #[instrument]
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    fn init(&self) -> Result<()> {
        migrations::run_migrations(&self.conn)
    }

    /// Get current schema version
    pub fn schema_version(&self) -> Result<u32> {
        migrations::get_current_version(&self.conn)
    }

    pub fn sessions(&self) -> SessionStore<'_> {
        SessionStore::new(&self.conn)
    }

    pub fn users(&self) -> UserStore<'_> {
        UserStore::new(&self.conn)
    }
}

impl SessionRepository for Database {
    fn current_session(&self) -> Result<Option<Session>> {
        self.sessions().find_current()
    }

    fn archived_sessions(&self, limit: u32) -> Result<Vec<Session>> {
        self.sessions().list_archived(Some(limit))
    }

    fn all_archived_sessions(&self) -> Result<Vec<Session>> {
        self.sessions().list_archived(None)
    }

    fn insert_session(&self, session: &Session) -> Result<Session> {
        self.sessions().insert(session)?;
        Ok(session.clone())
    }

    fn update_session(&self, id: Uuid, update: &SessionUpdate) -> Result<()> {
        self.sessions().replace(id, update)
    }

    fn archive_session(&self, id: Uuid, archived_at: DateTime<Utc>) -> Result<()> {
        self.sessions().archive(id, archived_at)
    }
}

impl IdentityRepository for Database {
    fn find_user(&self, username: &str) -> Result<Option<UserIdentity>> {
        self.users().find_by_username(username)
    }

    fn create_user(&self, user: &UserIdentity) -> Result<()> {
        self.users().create(user)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_database_persists_across_opens() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nightcap.db");

        let session = Session::new_current(Vec::new(), None);
        {
            let db = Database::open(&path).unwrap();
            db.insert_session(&session).unwrap();
        }

        let db = Database::open(&path).unwrap();
        assert!(db.schema_version().unwrap() >= 2);
        assert_eq!(db.current_session().unwrap().map(|s| s.id), Some(session.id));
    }
}
