//! Ban repository for warden.

use chrono::Utc;
use sqlx::SqlitePool;

use super::ban::{Ban, NewBan};
use crate::{Result, WardenError};

/// Repository for ban records.
pub struct BanRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> BanRepository<'a> {
    /// Create a new repository instance.
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Create a ban.
    pub async fn create(&self, new_ban: &NewBan) -> Result<Ban> {
        let result = sqlx::query(
            "INSERT INTO bans (user_id, reason, ban_type, expires_at, created_by, created_at)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(new_ban.user_id)
        .bind(&new_ban.reason)
        .bind(new_ban.ban_type().as_str())
        .bind(new_ban.expires_at)
        .bind(new_ban.created_by)
        .bind(Utc::now())
        .execute(self.pool)
        .await?;

        self.get_by_id(result.last_insert_rowid())
            .await?
            .ok_or_else(|| WardenError::NotFound("ban".to_string()))
    }

    /// Get a ban by ID.
    pub async fn get_by_id(&self, id: i64) -> Result<Option<Ban>> {
        let ban = sqlx::query_as::<_, Ban>(
            "SELECT id, user_id, reason, ban_type, expires_at, created_by, created_at
             FROM bans WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(self.pool)
        .await?;
        Ok(ban)
    }

    /// List every ban for a user, newest first.
    pub async fn list_for_user(&self, user_id: i64) -> Result<Vec<Ban>> {
        let bans = sqlx::query_as::<_, Ban>(
            "SELECT id, user_id, reason, ban_type, expires_at, created_by, created_at
             FROM bans WHERE user_id = ? ORDER BY created_at DESC, id DESC",
        )
        .bind(user_id)
        .fetch_all(self.pool)
        .await?;
        Ok(bans)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::ban::{select_active, BanType};
    use crate::db::{Database, NewUser, UserRepository};
    use chrono::Duration;

    async fn setup() -> (Database, i64) {
        let db = Database::open_in_memory().await.unwrap();
        let user = UserRepository::new(db.pool())
            .create(&NewUser::new("x@example.com", "hash", "X"))
            .await
            .unwrap();
        (db, user.id)
    }

    #[tokio::test]
    async fn test_create_permanent_ban() {
        let (db, user_id) = setup().await;
        let repo = BanRepository::new(db.pool());

        let ban = repo
            .create(&NewBan {
                user_id,
                reason: "abuse".to_string(),
                expires_at: None,
                created_by: None,
            })
            .await
            .unwrap();

        assert_eq!(ban.ban_type, BanType::Permanent);
        assert!(ban.expires_at.is_none());
        assert!(ban.is_effective(Utc::now()));
    }

    #[tokio::test]
    async fn test_list_and_select_active() {
        let (db, user_id) = setup().await;
        let repo = BanRepository::new(db.pool());

        repo.create(&NewBan {
            user_id,
            reason: "old".to_string(),
            expires_at: Some(Utc::now() - Duration::hours(1)),
            created_by: None,
        })
        .await
        .unwrap();
        let current = repo
            .create(&NewBan {
                user_id,
                reason: "current".to_string(),
                expires_at: Some(Utc::now() + Duration::hours(1)),
                created_by: None,
            })
            .await
            .unwrap();

        let bans = repo.list_for_user(user_id).await.unwrap();
        assert_eq!(bans.len(), 2);

        let active = select_active(&bans, Utc::now()).unwrap();
        assert_eq!(active.id, current.id);
        assert_eq!(active.reason, "current");
    }

    #[tokio::test]
    async fn test_list_for_user_without_bans() {
        let (db, user_id) = setup().await;
        let repo = BanRepository::new(db.pool());
        assert!(repo.list_for_user(user_id).await.unwrap().is_empty());
    }
}
