//! Role and permission checks for an authenticated principal.

use super::{AuthError, Principal};

/// Require the principal's role to be one of `roles`.
pub fn require_roles(principal: Option<&Principal>, roles: &[&str]) -> Result<(), AuthError> {
    let principal = principal.ok_or(AuthError::Unauthenticated)?;
    if roles.iter().any(|role| *role == principal.role_name) {
        Ok(())
    } else {
        Err(AuthError::InsufficientRole)
    }
}

/// Require the principal to hold every permission in `permissions`.
pub fn require_permissions(
    principal: Option<&Principal>,
    permissions: &[&str],
) -> Result<(), AuthError> {
    let principal = principal.ok_or(AuthError::Unauthenticated)?;
    if permissions.iter().all(|p| principal.has_permission(p)) {
        Ok(())
    } else {
        Err(AuthError::InsufficientPermission)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn principal(role: &str, permissions: &[&str]) -> Principal {
        Principal {
            id: 1,
            email: "p@example.com".to_string(),
            role_id: 1,
            role_name: role.to_string(),
            permissions: permissions.iter().map(|p| p.to_string()).collect(),
        }
    }

    #[test]
    fn test_missing_principal_is_unauthenticated() {
        assert!(matches!(
            require_roles(None, &["admin"]),
            Err(AuthError::Unauthenticated)
        ));
        assert!(matches!(
            require_permissions(None, &["users:ban"]),
            Err(AuthError::Unauthenticated)
        ));
    }

    #[test]
    fn test_role_allow_list() {
        let p = principal("instructor", &[]);
        assert!(require_roles(Some(&p), &["admin", "instructor"]).is_ok());
        assert!(matches!(
            require_roles(Some(&p), &["admin"]),
            Err(AuthError::InsufficientRole)
        ));
    }

    #[test]
    fn test_permissions_are_and() {
        let p = principal("admin", &["users:read", "users:ban"]);
        assert!(require_permissions(Some(&p), &["users:ban"]).is_ok());
        assert!(require_permissions(Some(&p), &["users:read", "users:ban"]).is_ok());
        assert!(matches!(
            require_permissions(Some(&p), &["users:ban", "settings:write"]),
            Err(AuthError::InsufficientPermission)
        ));
    }

    #[test]
    fn test_empty_requirement_passes() {
        let p = principal("student", &[]);
        assert!(require_permissions(Some(&p), &[]).is_ok());
    }
}
