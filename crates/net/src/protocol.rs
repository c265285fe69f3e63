//! Network protocol message types
//!
//! All messages are JSON-serialized and length-prefixed on the wire.
//! Repository calls are request/response pairs correlated by id; change
//! feed events are pushed to subscribed connections.

use chrono::{DateTime, Utc};
use nightcap_core::{Error as CoreError, Session, SessionEvent, SessionUpdate, UserIdentity};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A repository operation executed by the hub
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Request {
    CurrentSession,
    ArchivedSessions { limit: u32 },
    AllArchivedSessions,
    InsertSession { session: Session },
    UpdateSession { id: Uuid, update: SessionUpdate },
    ArchiveSession { id: Uuid, archived_at: DateTime<Utc> },
    FindUser { username: String },
    CreateUser { user: UserIdentity },
}

/// Successful outcome of a [`Request`]
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "reply", content = "data", rename_all = "snake_case")]
pub enum Reply {
    Session(Option<Session>),
    Sessions(Vec<Session>),
    Inserted(Session),
    User(Option<UserIdentity>),
    Done,
}

/// Error category carried across the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RemoteErrorKind {
    Unavailable,
    NotFound,
    PermissionDenied,
    Precondition,
    InvalidOperation,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteError {
    pub kind: RemoteErrorKind,
    pub message: String,
}

impl From<&CoreError> for RemoteError {
    fn from(e: &CoreError) -> Self {
        let (kind, message) = match e {
            CoreError::NotFound(m) => (RemoteErrorKind::NotFound, m.clone()),
            CoreError::PermissionDenied(m) => (RemoteErrorKind::PermissionDenied, m.clone()),
            CoreError::Precondition(m) => (RemoteErrorKind::Precondition, m.clone()),
            CoreError::InvalidOperation(m) => (RemoteErrorKind::InvalidOperation, m.clone()),
            CoreError::CooldownActive { .. } => (RemoteErrorKind::PermissionDenied, e.to_string()),
            CoreError::Unavailable(m) => (RemoteErrorKind::Unavailable, m.clone()),
            CoreError::Database(_) | CoreError::Io(_) | CoreError::Serialization(_) => {
                (RemoteErrorKind::Unavailable, e.to_string())
            }
        };
        Self { kind, message }
    }
}

impl From<RemoteError> for CoreError {
    fn from(e: RemoteError) -> Self {
        match e.kind {
            RemoteErrorKind::Unavailable => CoreError::Unavailable(e.message),
            RemoteErrorKind::NotFound => CoreError::NotFound(e.message),
            RemoteErrorKind::PermissionDenied => CoreError::PermissionDenied(e.message),
            RemoteErrorKind::Precondition => CoreError::Precondition(e.message),
            RemoteErrorKind::InvalidOperation => CoreError::InvalidOperation(e.message),
        }
    }
}

/// Network protocol messages
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Message {
    /// Client asks the hub to run a repository operation
    Request { request_id: u64, request: Request },

    /// Hub answers a request
    Response {
        request_id: u64,
        result: Result<Reply, RemoteError>,
    },

    /// Start receiving change feed events on this connection
    Subscribe,

    /// Stop receiving change feed events
    Unsubscribe,

    /// A change feed event
    Event(SessionEvent),

    Ping,

    Pong,

    /// Hub is shutting down
    ServerShutdown,
}

impl Message {
    /// Serialize message to JSON bytes
    pub fn to_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    /// Deserialize message from JSON bytes
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nightcap_core::Participant;

    #[test]
    fn test_event_message_decodes() {
        let session = Session::new_current(vec![Participant::guest("Ann".into())], None);
        let msg = Message::Event(SessionEvent::Changed(session.clone()));

        match Message::from_bytes(&msg.to_bytes().unwrap()).unwrap() {
            Message::Event(SessionEvent::Changed(s)) => assert_eq!(s, session),
            other => panic!("Wrong message type: {:?}", other),
        }
    }

    #[test]
    fn test_error_response_keeps_kind() {
        let err = CoreError::Precondition("session is no longer current".into());
        let msg = Message::Response {
            request_id: 7,
            result: Err(RemoteError::from(&err)),
        };

        match Message::from_bytes(&msg.to_bytes().unwrap()).unwrap() {
            Message::Response {
                request_id: 7,
                result: Err(remote),
            } => {
                assert_eq!(remote.kind, RemoteErrorKind::Precondition);
                assert!(matches!(CoreError::from(remote), CoreError::Precondition(_)));
            }
            other => panic!("Wrong message type: {:?}", other),
        }
    }

    #[test]
    fn test_storage_failures_travel_as_unavailable() {
        let err = CoreError::Database(rusqlite_error());
        assert_eq!(RemoteError::from(&err).kind, RemoteErrorKind::Unavailable);
    }

    fn rusqlite_error() -> nightcap_core::storage::SqlError {
        nightcap_core::storage::SqlError::QueryReturnedNoRows
    }
}
