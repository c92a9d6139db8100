//! Role model for warden.

use std::collections::BTreeSet;

use serde::Serialize;

/// Role assigned to new registrations (`student`).
pub const DEFAULT_ROLE_ID: i64 = 1;

/// Name of the role that bypasses maintenance mode.
pub const ADMIN_ROLE: &str = "admin";

/// Role with its capability set.
///
/// Always resolved to this shape at the data-access boundary; the
/// authorization gate never sees a bare role name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Role {
    /// Role ID.
    pub id: i64,
    /// Role name.
    pub name: String,
    /// Capability strings granted by this role.
    pub permissions: BTreeSet<String>,
}

impl Role {
    /// Create a role from its parts.
    pub fn new<I, S>(id: i64, name: impl Into<String>, permissions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            id,
            name: name.into(),
            permissions: permissions.into_iter().map(Into::into).collect(),
        }
    }

    /// Check whether the role grants a capability.
    pub fn grants(&self, permission: &str) -> bool {
        self.permissions.contains(permission)
    }

    /// Check whether this is the administrator role.
    pub fn is_admin(&self) -> bool {
        self.name == ADMIN_ROLE
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_grants() {
        let role = Role::new(2, "instructor", ["courses:read", "courses:write"]);
        assert!(role.grants("courses:write"));
        assert!(!role.grants("users:ban"));
        assert!(!role.is_admin());
    }

    #[test]
    fn test_permissions_deduplicated() {
        let role = Role::new(1, "student", ["a", "a", "b"]);
        assert_eq!(role.permissions.len(), 2);
    }
}
