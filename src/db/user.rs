//! Identity model for warden.

use chrono::{DateTime, Utc};

/// Registered identity.
///
/// Never deleted by this core; deactivation flips `is_active`.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct User {
    /// Unique user ID.
    pub id: i64,
    /// Login email (unique, case-insensitive).
    pub email: String,
    /// Password hash (Argon2 PHC string).
    pub password_hash: String,
    /// Display name.
    pub name: String,
    /// Role reference.
    pub role_id: i64,
    /// Whether the account is active.
    pub is_active: bool,
    /// Whether the email address has been confirmed.
    pub email_verified: bool,
    /// Account creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last successful login.
    pub last_login_at: Option<DateTime<Utc>>,
}

/// Data for creating a new user.
#[derive(Debug, Clone)]
pub struct NewUser {
    /// Login email, already normalized.
    pub email: String,
    /// Pre-hashed password.
    pub password_hash: String,
    /// Display name.
    pub name: String,
    /// Role reference.
    pub role_id: i64,
}

impl NewUser {
    /// Create a new user with the default role.
    pub fn new(
        email: impl Into<String>,
        password_hash: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            email: email.into(),
            password_hash: password_hash.into(),
            name: name.into(),
            role_id: super::role::DEFAULT_ROLE_ID,
        }
    }

    /// Set the role.
    pub fn with_role(mut self, role_id: i64) -> Self {
        self.role_id = role_id;
        self
    }
}

/// Normalize an email address for storage and lookup.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_user_defaults() {
        let user = NewUser::new("a@example.com", "hash", "A");
        assert_eq!(user.role_id, super::super::role::DEFAULT_ROLE_ID);
    }

    #[test]
    fn test_new_user_with_role() {
        let user = NewUser::new("a@example.com", "hash", "A").with_role(3);
        assert_eq!(user.role_id, 3);
    }

    #[test]
    fn test_normalize_email() {
        assert_eq!(normalize_email("  Alice@Example.COM "), "alice@example.com");
    }
}
