//! Session model - the single shared tally record

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::Participant;

/// One event's shared tally.
///
/// At most one session is current at a time. Once archived it is never
/// written again.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub id: Uuid,
    /// Participants in insertion order
    pub people: Vec<Participant>,
    pub is_current: bool,
    pub last_roll_time: Option<DateTime<Utc>>,
    pub last_updated: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub archived_at: Option<DateTime<Utc>>,
}

impl Session {
    /// A fresh current session, as created by the first mutation
    pub fn new_current(people: Vec<Participant>, last_roll_time: Option<DateTime<Utc>>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            people,
            is_current: true,
            last_roll_time,
            last_updated: now,
            created_at: now,
            archived_at: None,
        }
    }

    pub fn is_archived(&self) -> bool {
        !self.is_current && self.archived_at.is_some()
    }

    /// Copy of this session with the mutable fields replaced, as a full
    /// overwrite would leave it
    pub fn with_update(&self, update: &SessionUpdate) -> Self {
        Self {
            people: update.people.clone(),
            last_updated: update.last_updated,
            last_roll_time: update.last_roll_time,
            ..self.clone()
        }
    }
}

/// Every mutable field of a session, written together in one replace
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionUpdate {
    pub people: Vec<Participant>,
    pub last_updated: DateTime<Utc>,
    pub last_roll_time: Option<DateTime<Utc>>,
}

/// A change-feed notification about the current session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SessionEvent {
    /// The current session was inserted or overwritten; carries the full record
    Changed(Session),
    /// The current session was archived and is no longer current
    Archived {
        id: Uuid,
        archived_at: DateTime<Utc>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_session_is_current_and_not_archived() {
        let s = Session::new_current(Vec::new(), None);
        assert!(s.is_current);
        assert!(!s.is_archived());
        assert!(s.last_roll_time.is_none());
    }

    #[test]
    fn test_update_replaces_mutable_fields_only() {
        let s = Session::new_current(Vec::new(), None);
        let now = Utc::now();
        let update = SessionUpdate {
            people: vec![Participant::guest("Eve".to_string())],
            last_updated: now,
            last_roll_time: Some(now),
        };
        let next = s.with_update(&update);
        assert_eq!(next.id, s.id);
        assert_eq!(next.created_at, s.created_at);
        assert_eq!(next.people.len(), 1);
        assert_eq!(next.last_roll_time, Some(now));
    }
}
