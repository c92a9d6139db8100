//! Security event log repository.

use sqlx::SqlitePool;

use crate::audit::{SecurityEvent, SecurityEventKind};
use crate::Result;

/// Append-only access to `security_events`.
pub struct SecurityEventRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> SecurityEventRepository<'a> {
    /// Create a new repository instance.
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Append an event.
    pub async fn append(&self, event: &SecurityEvent) -> Result<()> {
        sqlx::query(
            "INSERT INTO security_events (occurred_at, kind, actor_id, ip, user_agent, path, outcome, detail)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(event.occurred_at)
        .bind(event.kind.as_str())
        .bind(event.actor_id)
        .bind(&event.ip)
        .bind(&event.user_agent)
        .bind(&event.path)
        .bind(event.outcome.as_str())
        .bind(&event.detail)
        .execute(self.pool)
        .await?;
        Ok(())
    }

    /// Count all recorded events.
    pub async fn count(&self) -> Result<i64> {
        let count = sqlx::query_scalar("SELECT COUNT(*) FROM security_events")
            .fetch_one(self.pool)
            .await?;
        Ok(count)
    }

    /// Count events of one kind.
    pub async fn count_by_kind(&self, kind: SecurityEventKind) -> Result<i64> {
        let count = sqlx::query_scalar("SELECT COUNT(*) FROM security_events WHERE kind = ?")
            .bind(kind.as_str())
            .fetch_one(self.pool)
            .await?;
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;

    #[tokio::test]
    async fn test_append_keeps_client_details() {
        let db = Database::open_in_memory().await.unwrap();
        let repo = SecurityEventRepository::new(db.pool());

        repo.append(
            &SecurityEvent::failure(SecurityEventKind::Login)
                .ip("10.0.0.9")
                .user_agent("curl/8")
                .path("/api/auth/login"),
        )
        .await
        .unwrap();

        let (ip, user_agent, path): (Option<String>, Option<String>, Option<String>) =
            sqlx::query_as("SELECT ip, user_agent, path FROM security_events")
                .fetch_one(db.pool())
                .await
                .unwrap();
        assert_eq!(ip.as_deref(), Some("10.0.0.9"));
        assert_eq!(user_agent.as_deref(), Some("curl/8"));
        assert_eq!(path.as_deref(), Some("/api/auth/login"));
        assert_eq!(
            repo.count_by_kind(SecurityEventKind::Login).await.unwrap(),
            1
        );
    }
}
