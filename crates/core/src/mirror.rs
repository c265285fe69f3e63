//! Local session mirror
//!
//! Each client keeps one cached copy of the current session. The copy is
//! replaced wholesale, never patched: by the mutation pipeline after a
//! successful commit, and by the change feed whenever any client writes.

use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::invariants::assert_session_invariants;
use crate::models::{Participant, Session, SessionEvent};

/// Shared handle to a client's cached current session.
///
/// Cloning yields another handle to the same cache, so the feed listener,
/// the cooldown ticker and the console all observe one view.
#[derive(Debug, Clone, Default)]
pub struct SessionMirror {
    inner: Arc<RwLock<Option<Session>>>,
}

impl SessionMirror {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mirror seeded from an initial read (`None` = no active session)
    pub fn with_session(session: Option<Session>) -> Self {
        Self {
            inner: Arc::new(RwLock::new(session)),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, Option<Session>> {
        self.inner.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, Option<Session>> {
        self.inner.write().unwrap_or_else(|e| e.into_inner())
    }

    /// Copy of the cached session
    pub fn snapshot(&self) -> Option<Session> {
        self.read().clone()
    }

    /// Participants of the cached session; empty when there is none
    pub fn people(&self) -> Vec<Participant> {
        self.read()
            .as_ref()
            .map(|s| s.people.clone())
            .unwrap_or_default()
    }

    pub fn last_roll_time(&self) -> Option<DateTime<Utc>> {
        self.read().as_ref().and_then(|s| s.last_roll_time)
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_none()
    }

    /// Replace the cached session unconditionally
    pub fn replace(&self, session: Session) {
        assert_session_invariants(&session);
        *self.write() = Some(session);
    }

    /// Drop the cached session (nothing is current)
    pub fn clear(&self) {
        *self.write() = None;
    }

    /// Apply a change-feed event. Returns true if the view changed.
    ///
    /// Full-record events win regardless of what this client had pending.
    /// Records that are not current are ignored, and an archive notice only
    /// clears the view if it names the session being shown.
    pub fn apply(&self, event: &SessionEvent) -> bool {
        match event {
            SessionEvent::Changed(session) if session.is_current => {
                debug!(session_id = %session.id, people = session.people.len(), "Mirror replaced from feed");
                self.replace(session.clone());
                true
            }
            SessionEvent::Changed(_) => false,
            SessionEvent::Archived { id, .. } => {
                let mut guard = self.write();
                if guard.as_ref().map(|s| s.id) == Some(*id) {
                    debug!(session_id = %id, "Mirror cleared by archive notice");
                    *guard = None;
                    true
                } else {
                    false
                }
            }
        }
    }
}
