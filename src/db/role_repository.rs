//! Role repository for warden.
//!
//! Roles are read-only from this core's perspective.

use sqlx::SqlitePool;

use super::role::Role;
use crate::Result;

/// Repository for roles and their permissions.
pub struct RoleRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> RoleRepository<'a> {
    /// Create a new repository instance.
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Get a role with its permission set.
    pub async fn get_by_id(&self, id: i64) -> Result<Option<Role>> {
        let name: Option<String> = sqlx::query_scalar("SELECT name FROM roles WHERE id = ?")
            .bind(id)
            .fetch_optional(self.pool)
            .await?;

        let Some(name) = name else {
            return Ok(None);
        };

        let permissions: Vec<String> =
            sqlx::query_scalar("SELECT permission FROM role_permissions WHERE role_id = ?")
                .bind(id)
                .fetch_all(self.pool)
                .await?;

        Ok(Some(Role::new(id, name, permissions)))
    }

    /// Get a role by name.
    pub async fn get_by_name(&self, name: &str) -> Result<Option<Role>> {
        let id: Option<i64> = sqlx::query_scalar("SELECT id FROM roles WHERE name = ?")
            .bind(name)
            .fetch_optional(self.pool)
            .await?;

        match id {
            Some(id) => self.get_by_id(id).await,
            None => Ok(None),
        }
    }
}
