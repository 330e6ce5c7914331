//! Local user identity and request credentials

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The person running this client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
}

impl User {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            email: None,
        }
    }

    /// Create a user with a fresh random id.
    #[must_use]
    pub fn generate(name: impl Into<String>) -> Self {
        Self::new(Uuid::now_v7().to_string(), name)
    }
}

/// An authenticated user plus the token sent with every HTTP request.
#[derive(Clone, PartialEq, Eq)]
pub struct Session {
    user: User,
    auth_token: String,
}

impl Session {
    /// Derive the `Basic` token as `base64("<name>:<id>")`.
    #[must_use]
    pub fn new(user: User) -> Self {
        let auth_token = STANDARD.encode(format!("{}:{}", user.name, user.id));
        Self { user, auth_token }
    }

    pub const fn user(&self) -> &User {
        &self.user
    }

    pub fn user_id(&self) -> &str {
        &self.user.id
    }

    fn auth_token(&self) -> &str {
        &self.auth_token
    }

    /// Value for the `Authorization` header.
    pub fn authorization_header(&self) -> String {
        format!("Basic {}", self.auth_token())
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("Session")
            .field("user", &self.user)
            .field("auth_token", &"[REDACTED]")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_token_encodes_name_and_id() {
        let session = Session::new(User::new("abc", "Ada"));
        assert_eq!(session.auth_token(), STANDARD.encode("Ada:abc"));
        assert_eq!(
            session.authorization_header(),
            format!("Basic {}", STANDARD.encode("Ada:abc"))
        );
    }

    #[test]
    fn session_debug_redacts_token() {
        let session = Session::new(User::new("abc", "Ada"));
        let debug = format!("{session:?}");
        assert!(!debug.contains(session.auth_token()));
        assert!(debug.contains("[REDACTED]"));
    }

    #[test]
    fn generated_users_get_distinct_ids() {
        assert_ne!(User::generate("A").id, User::generate("A").id);
    }
}
