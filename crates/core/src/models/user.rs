//! User identity model

use serde::{Deserialize, Serialize};

/// An account as seen by the tracker: a unique handle plus the name shown
/// when the user joins a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserIdentity {
    pub username: String,
    pub display_name: String,
}

impl UserIdentity {
    /// Build an identity with the username normalized to lower case
    pub fn new(username: &str, display_name: &str) -> Self {
        Self {
            username: normalize_username(username),
            display_name: display_name.trim().to_string(),
        }
    }
}

/// Usernames are unique case-insensitively; store and compare lower case
pub fn normalize_username(username: &str) -> String {
    username.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_username_is_lowercased_and_trimmed() {
        let id = UserIdentity::new("  Alice ", " Alice A. ");
        assert_eq!(id.username, "alice");
        assert_eq!(id.display_name, "Alice A.");
    }

    #[test]
    fn test_cache_json_uses_camel_case() {
        let id = UserIdentity::new("bob", "Bob");
        let json = serde_json::to_string(&id).unwrap();
        assert!(json.contains("\"displayName\":\"Bob\""));
    }
}
