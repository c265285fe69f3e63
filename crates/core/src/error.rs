//! Error types for Nightcap Core

use std::time::Duration;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Repository unavailable: {0}")]
    Unavailable(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Wait {} more minutes before rolling", .remaining.as_secs() / 60)]
    CooldownActive { remaining: Duration },

    #[error("Precondition failed: {0}")]
    Precondition(String),

    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// True for failures raised by the store itself (read or write failed),
    /// as opposed to rejections decided before any write was attempted.
    pub fn is_repository_failure(&self) -> bool {
        matches!(self, Error::Database(_) | Error::Unavailable(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cooldown_message_rounds_down_to_minutes() {
        let err = Error::CooldownActive {
            remaining: Duration::from_secs(5 * 60 + 59),
        };
        assert_eq!(err.to_string(), "Wait 5 more minutes before rolling");
    }

    #[test]
    fn test_repository_failures_are_distinguished() {
        assert!(Error::Unavailable("down".into()).is_repository_failure());
        assert!(!Error::PermissionDenied("no".into()).is_repository_failure());
        assert!(!Error::Precondition("empty".into()).is_repository_failure());
    }
}
