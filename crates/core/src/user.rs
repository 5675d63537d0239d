//! User accounts stored on the data endpoint.

use serde::{Deserialize, Serialize};

use crate::types::{Email, Role, UserId};

/// A user account.
///
/// `password` holds an argon2 PHC string, never the plaintext.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub name: String,
    pub email: Email,
    pub password: String,
    #[serde(default)]
    pub role: Role,
}

impl User {
    /// Whether the account has back-office access.
    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

/// Payload for creating a user (everything but the id).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewUser {
    pub name: String,
    pub email: Email,
    pub password: String,
    pub role: Role,
}

/// Partial update; `None` fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_role_defaults_to_user() {
        let json = r#"{"id": 1, "name": "Ash", "email": "Ash@Example.com", "password": "x"}"#;
        let user: User = serde_json::from_str(json).unwrap();
        assert_eq!(user.role, Role::User);
        assert!(!user.is_admin());
        assert_eq!(user.email.as_str(), "ash@example.com");
    }

    #[test]
    fn test_patch_only_sends_set_fields() {
        let patch = UserPatch {
            role: Some(Role::Admin),
            ..UserPatch::default()
        };
        assert_eq!(
            serde_json::to_string(&patch).unwrap(),
            r#"{"role":"admin"}"#
        );
    }
}
