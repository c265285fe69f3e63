//! Storage repository traits
//!
//! These traits define the storage interface, allowing for different
//! implementations (SQLite, an in-process hub with a change feed, a remote
//! hub reached over the network).

use std::sync::Arc;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::Result;
use crate::models::{Session, SessionUpdate, UserIdentity};

/// Session repository operations
///
/// There is no version token: `update_session` overwrites whatever the
/// stored row holds.
pub trait SessionRepository {
    /// The session flagged current, if any
    fn current_session(&self) -> Result<Option<Session>>;

    /// Archived sessions, newest `archived_at` first, at most `limit`
    fn archived_sessions(&self, limit: u32) -> Result<Vec<Session>>;

    /// Every archived session, newest first
    fn all_archived_sessions(&self) -> Result<Vec<Session>>;

    /// Insert a session and return it as stored
    fn insert_session(&self, session: &Session) -> Result<Session>;

    /// Replace the mutable fields of the current session
    fn update_session(&self, id: Uuid, update: &SessionUpdate) -> Result<()>;

    /// Mark the current session archived
    fn archive_session(&self, id: Uuid, archived_at: DateTime<Utc>) -> Result<()>;
}

/// Identity store operations
pub trait IdentityRepository {
    /// Find a user by username (case-insensitive)
    fn find_user(&self, username: &str) -> Result<Option<UserIdentity>>;

    /// Create a new user
    fn create_user(&self, user: &UserIdentity) -> Result<()>;
}

/// Combined storage interface
pub trait Storage: SessionRepository + IdentityRepository {}

// Blanket implementation: any type implementing all traits implements Storage
impl<T> Storage for T where T: SessionRepository + IdentityRepository {}

impl<T: SessionRepository + ?Sized> SessionRepository for Arc<T> {
    fn current_session(&self) -> Result<Option<Session>> {
        (**self).current_session()
    }

    fn archived_sessions(&self, limit: u32) -> Result<Vec<Session>> {
        (**self).archived_sessions(limit)
    }

    fn all_archived_sessions(&self) -> Result<Vec<Session>> {
        (**self).all_archived_sessions()
    }

    fn insert_session(&self, session: &Session) -> Result<Session> {
        (**self).insert_session(session)
    }

    fn update_session(&self, id: Uuid, update: &SessionUpdate) -> Result<()> {
        (**self).update_session(id, update)
    }

    fn archive_session(&self, id: Uuid, archived_at: DateTime<Utc>) -> Result<()> {
        (**self).archive_session(id, archived_at)
    }
}

impl<T: IdentityRepository + ?Sized> IdentityRepository for Arc<T> {
    fn find_user(&self, username: &str) -> Result<Option<UserIdentity>> {
        (**self).find_user(username)
    }

    fn create_user(&self, user: &UserIdentity) -> Result<()> {
        (**self).create_user(user)
    }
}
