//! Account registration and login against the identity store

use tracing::info;

use crate::error::{Error, Result};
use crate::models::{normalize_username, UserIdentity};
use crate::storage::IdentityRepository;

/// Register a new account. Both fields are required; the username must not
/// be taken (case-insensitive).
pub fn register<R: IdentityRepository + ?Sized>(
    repo: &R,
    username: &str,
    display_name: &str,
) -> Result<UserIdentity> {
    if username.trim().is_empty() || display_name.trim().is_empty() {
        return Err(Error::InvalidOperation(
            "username and display name are both required".into(),
        ));
    }

    let identity = UserIdentity::new(username, display_name);
    if repo.find_user(&identity.username)?.is_some() {
        return Err(Error::InvalidOperation(format!(
            "username {} already exists",
            identity.username
        )));
    }

    repo.create_user(&identity)?;
    info!(username = %identity.username, "Account created");
    Ok(identity)
}

/// Look up an existing account
pub fn login<R: IdentityRepository + ?Sized>(repo: &R, username: &str) -> Result<UserIdentity> {
    if username.trim().is_empty() {
        return Err(Error::InvalidOperation("username is required".into()));
    }
    repo.find_user(username)?
        .ok_or_else(|| Error::NotFound(format!("account {}", normalize_username(username))))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::Database;

    #[test]
    fn test_register_then_login() {
        let db = Database::open_in_memory().unwrap();
        let created = register(&db, "Alice", "Alice Liddell").unwrap();
        assert_eq!(created.username, "alice");

        let found = login(&db, "ALICE").unwrap();
        assert_eq!(found, created);
    }

    #[test]
    fn test_taken_username_rejected() {
        let db = Database::open_in_memory().unwrap();
        register(&db, "alice", "A").unwrap();
        assert!(matches!(
            register(&db, "Alice", "B"),
            Err(Error::InvalidOperation(_))
        ));
    }

    #[test]
    fn test_missing_fields_rejected() {
        let db = Database::open_in_memory().unwrap();
        assert!(register(&db, "alice", " ").is_err());
        assert!(register(&db, "", "Alice").is_err());
    }

    #[test]
    fn test_unknown_login_is_not_found() {
        let db = Database::open_in_memory().unwrap();
        assert!(matches!(login(&db, "ghost"), Err(Error::NotFound(_))));
    }
}
