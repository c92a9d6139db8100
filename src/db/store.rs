//! Credential store seam.
//!
//! The auth layer talks to persistence only through [`CredentialStore`], so
//! tests can substitute failing or slow stores.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::{
    select_active, Ban, BanRepository, Database, NewBan, NewUser, Role, RoleRepository,
    SettingsRepository, User, UserRepository,
};
use crate::Result;

/// Persistence operations needed by authentication and authorization.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Create a user. Fails with a database error on a duplicate email.
    async fn create_user(&self, new_user: &NewUser) -> Result<User>;

    /// Find a user by id.
    async fn find_user_by_id(&self, id: i64) -> Result<Option<User>>;

    /// Find a user by email (case-insensitive).
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>>;

    /// Check whether an email is already registered.
    async fn email_exists(&self, email: &str) -> Result<bool>;

    /// Mark a user's email verified.
    async fn mark_email_verified(&self, id: i64) -> Result<bool>;

    /// Replace a user's password hash.
    async fn update_password(&self, id: i64, password_hash: &str) -> Result<bool>;

    /// Stamp the last successful login.
    async fn update_last_login(&self, id: i64) -> Result<()>;

    /// Enable or disable an account.
    async fn set_active(&self, id: i64, active: bool) -> Result<bool>;

    /// Load a role with its permissions.
    async fn find_role(&self, role_id: i64) -> Result<Option<Role>>;

    /// All bans for a user, newest first.
    async fn list_bans(&self, user_id: i64) -> Result<Vec<Ban>>;

    /// The ban currently in force for a user, if any.
    async fn find_active_ban(&self, user_id: i64, now: DateTime<Utc>) -> Result<Option<Ban>> {
        let bans = self.list_bans(user_id).await?;
        Ok(select_active(&bans, now).cloned())
    }

    /// Record a ban.
    async fn create_ban(&self, new_ban: &NewBan) -> Result<Ban>;

    /// Read a platform setting.
    async fn get_setting(&self, key: &str) -> Result<Option<String>>;

    /// Write a platform setting.
    async fn set_setting(&self, key: &str, value: &str) -> Result<()>;
}

#[async_trait]
impl CredentialStore for Database {
    async fn create_user(&self, new_user: &NewUser) -> Result<User> {
        UserRepository::new(self.pool()).create(new_user).await
    }

    async fn find_user_by_id(&self, id: i64) -> Result<Option<User>> {
        UserRepository::new(self.pool()).get_by_id(id).await
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>> {
        UserRepository::new(self.pool()).get_by_email(email).await
    }

    async fn email_exists(&self, email: &str) -> Result<bool> {
        UserRepository::new(self.pool()).email_exists(email).await
    }

    async fn mark_email_verified(&self, id: i64) -> Result<bool> {
        UserRepository::new(self.pool()).mark_email_verified(id).await
    }

    async fn update_password(&self, id: i64, password_hash: &str) -> Result<bool> {
        UserRepository::new(self.pool())
            .update_password(id, password_hash)
            .await
    }

    async fn update_last_login(&self, id: i64) -> Result<()> {
        UserRepository::new(self.pool()).update_last_login(id).await
    }

    async fn set_active(&self, id: i64, active: bool) -> Result<bool> {
        UserRepository::new(self.pool()).set_active(id, active).await
    }

    async fn find_role(&self, role_id: i64) -> Result<Option<Role>> {
        RoleRepository::new(self.pool()).get_by_id(role_id).await
    }

    async fn list_bans(&self, user_id: i64) -> Result<Vec<Ban>> {
        BanRepository::new(self.pool()).list_for_user(user_id).await
    }

    async fn create_ban(&self, new_ban: &NewBan) -> Result<Ban> {
        BanRepository::new(self.pool()).create(new_ban).await
    }

    async fn get_setting(&self, key: &str) -> Result<Option<String>> {
        SettingsRepository::new(self.pool()).get(key).await
    }

    async fn set_setting(&self, key: &str, value: &str) -> Result<()> {
        SettingsRepository::new(self.pool()).set(key, value).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    async fn seeded() -> (Database, User) {
        let db = Database::open_in_memory().await.unwrap();
        let user = db
            .create_user(&NewUser::new("ban@example.com", "hash", "Ban Target"))
            .await
            .unwrap();
        (db, user)
    }

    #[tokio::test]
    async fn test_find_active_ban_none() {
        let (db, user) = seeded().await;
        assert!(db
            .find_active_ban(user.id, Utc::now())
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_find_active_ban_ignores_expired() {
        let (db, user) = seeded().await;
        let now = Utc::now();
        db.create_ban(&NewBan {
            user_id: user.id,
            reason: "old".to_string(),
            expires_at: Some(now - Duration::hours(1)),
            created_by: None,
        })
        .await
        .unwrap();

        assert!(db.find_active_ban(user.id, now).await.unwrap().is_none());

        db.create_ban(&NewBan {
            user_id: user.id,
            reason: "current".to_string(),
            expires_at: Some(now + Duration::hours(1)),
            created_by: None,
        })
        .await
        .unwrap();

        let ban = db.find_active_ban(user.id, now).await.unwrap().unwrap();
        assert_eq!(ban.reason, "current");
    }

    #[tokio::test]
    async fn test_settings_through_store() {
        let (db, _) = seeded().await;
        db.set_setting("maintenance_mode", "true").await.unwrap();
        assert_eq!(
            db.get_setting("maintenance_mode").await.unwrap().as_deref(),
            Some("true")
        );
    }
}
