//! Network error types

use std::io;

use crate::protocol::{RemoteError, RemoteErrorKind};

/// Network result type
pub type Result<T> = std::result::Result<T, Error>;

/// Network errors
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Connection closed")]
    ConnectionClosed,

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Not connected")]
    NotConnected,

    #[error("Request timed out")]
    Timeout,

    /// The hub ran the request and rejected it
    #[error("Hub rejected request: {message}")]
    Remote {
        kind: RemoteErrorKind,
        message: String,
    },
}

impl From<RemoteError> for Error {
    fn from(e: RemoteError) -> Self {
        Error::Remote {
            kind: e.kind,
            message: e.message,
        }
    }
}

/// Transport failures are repository-unavailable failures to callers of the
/// repository traits; hub rejections keep their category.
impl From<Error> for nightcap_core::Error {
    fn from(e: Error) -> Self {
        match e {
            Error::Remote { kind, message } => RemoteError { kind, message }.into(),
            other => nightcap_core::Error::Unavailable(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_failure_is_unavailable() {
        let err: nightcap_core::Error = Error::Timeout.into();
        assert!(err.is_repository_failure());
    }

    #[test]
    fn test_remote_rejection_keeps_kind() {
        let err: nightcap_core::Error = Error::Remote {
            kind: RemoteErrorKind::NotFound,
            message: "session".into(),
        }
        .into();
        assert!(matches!(err, nightcap_core::Error::NotFound(_)));
    }
}
