//! Per-request authentication.
//!
//! [`Authenticator::authenticate`] turns an `Authorization` header into an
//! [`AuthContext`] or a terminal [`AuthError`]. Lookup failures never let a
//! request through: they reject with [`AuthError::AuthenticationFailed`].

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::Serialize;
use tracing::{error, warn};

use super::{AuthError, BanInfo, Claims, TokenService};
use crate::db::{CredentialStore, Role, User, ADMIN_ROLE};
use crate::timeout::bounded;

/// The authenticated identity attached to a request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Principal {
    /// User ID.
    pub id: i64,
    /// Login email.
    pub email: String,
    /// Role ID.
    pub role_id: i64,
    /// Role name.
    pub role_name: String,
    /// Granted permissions.
    pub permissions: BTreeSet<String>,
}

impl Principal {
    /// Build a principal from a user and their role.
    pub fn new(user: &User, role: Role) -> Self {
        Self {
            id: user.id,
            email: user.email.clone(),
            role_id: role.id,
            role_name: role.name,
            permissions: role.permissions,
        }
    }

    /// Whether the principal holds a permission.
    pub fn has_permission(&self, permission: &str) -> bool {
        self.permissions.contains(permission)
    }

    /// Whether the principal is an administrator.
    pub fn is_admin(&self) -> bool {
        self.role_name == ADMIN_ROLE
    }
}

/// Result of a successful authentication.
#[derive(Debug, Clone)]
pub struct AuthContext {
    /// Who is calling.
    pub principal: Principal,
    /// The raw access token, kept for logout.
    pub token: String,
    /// Its verified claims.
    pub claims: Claims,
}

/// Extract the token from a `Bearer` authorization header.
pub fn extract_bearer(header: Option<&str>) -> Option<&str> {
    let header = header?.trim();
    let (scheme, token) = header.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}

/// The auth gateway.
pub struct Authenticator {
    tokens: Arc<TokenService>,
    store: Arc<dyn CredentialStore>,
    store_timeout: Duration,
}

impl Authenticator {
    /// Create a gateway over the given collaborators.
    pub fn new(
        tokens: Arc<TokenService>,
        store: Arc<dyn CredentialStore>,
        store_timeout: Duration,
    ) -> Self {
        Self {
            tokens,
            store,
            store_timeout,
        }
    }

    /// Run the gateway checks in order: presence, blacklist, signature and
    /// expiry, subject revocation, identity, ban.
    pub async fn authenticate(
        &self,
        authorization: Option<&str>,
    ) -> Result<AuthContext, AuthError> {
        let token = extract_bearer(authorization).ok_or(AuthError::MissingToken)?;

        match self.tokens.is_blacklisted(token).await {
            Ok(false) => {}
            Ok(true) => return Err(AuthError::TokenRevoked),
            Err(e) => {
                error!(error = %e, "Blacklist lookup failed");
                return Err(AuthError::AuthenticationFailed);
            }
        }

        let claims = self.tokens.verify_access(token)?;

        match self.tokens.is_revoked_for_subject(&claims).await {
            Ok(false) => {}
            Ok(true) => return Err(AuthError::TokenRevoked),
            Err(e) => {
                error!(error = %e, user_id = claims.sub, "Subject revocation lookup failed");
                return Err(AuthError::AuthenticationFailed);
            }
        }

        let user = bounded(
            self.store_timeout,
            "credential store",
            self.store.find_user_by_id(claims.sub),
        )
        .await
        .map_err(|e| {
            error!(error = %e, user_id = claims.sub, "User lookup failed");
            AuthError::AuthenticationFailed
        })?;

        let user = match user {
            Some(user) if user.is_active => user,
            _ => return Err(AuthError::UserUnavailable),
        };

        let ban = bounded(
            self.store_timeout,
            "credential store",
            self.store.find_active_ban(user.id, Utc::now()),
        )
        .await
        .map_err(|e| {
            error!(error = %e, user_id = user.id, "Ban lookup failed");
            AuthError::AuthenticationFailed
        })?;

        if let Some(ban) = ban {
            warn!(user_id = user.id, ban_id = ban.id, "Banned user rejected");
            return Err(AuthError::Banned(BanInfo::from(&ban)));
        }

        let role = bounded(
            self.store_timeout,
            "credential store",
            self.store.find_role(user.role_id),
        )
        .await
        .map_err(|e| {
            error!(error = %e, user_id = user.id, "Role lookup failed");
            AuthError::AuthenticationFailed
        })?
        .ok_or_else(|| {
            error!(user_id = user.id, role_id = user.role_id, "User references missing role");
            AuthError::AuthenticationFailed
        })?;

        Ok(AuthContext {
            principal: Principal::new(&user, role),
            token: token.to_string(),
            claims,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCache;
    use crate::config::TokenConfig;
    use crate::db::{Database, NewBan, NewUser};

    async fn setup() -> (Authenticator, Arc<TokenService>, Database, User) {
        let db = Database::open_in_memory().await.unwrap();
        let user = db
            .create_user(&NewUser::new("gate@example.com", "hash", "Gate"))
            .await
            .unwrap();
        let tokens = Arc::new(TokenService::new(
            TokenConfig {
                secret: "gateway-test-secret-gateway-test".to_string(),
                ..TokenConfig::default()
            },
            Arc::new(MemoryCache::new()),
            Duration::from_millis(500),
        ));
        let gateway = Authenticator::new(
            tokens.clone(),
            Arc::new(db.clone()),
            Duration::from_secs(2),
        );
        (gateway, tokens, db, user)
    }

    fn bearer(token: &str) -> String {
        format!("Bearer {token}")
    }

    #[test]
    fn test_extract_bearer() {
        assert_eq!(extract_bearer(Some("Bearer abc")), Some("abc"));
        assert_eq!(extract_bearer(Some("bearer  abc ")), Some("abc"));
        assert_eq!(extract_bearer(Some("Basic abc")), None);
        assert_eq!(extract_bearer(Some("Bearer ")), None);
        assert_eq!(extract_bearer(Some("abc")), None);
        assert_eq!(extract_bearer(None), None);
    }

    #[tokio::test]
    async fn test_authenticate_success() {
        let (gateway, tokens, _db, user) = setup().await;
        let issued = tokens.issue_access(user.id).unwrap();

        let ctx = gateway
            .authenticate(Some(&bearer(&issued.token)))
            .await
            .unwrap();
        assert_eq!(ctx.principal.id, user.id);
        assert_eq!(ctx.principal.email, "gate@example.com");
        assert_eq!(ctx.principal.role_name, "student");
        assert!(ctx.principal.has_permission("courses:read"));
        assert_eq!(ctx.token, issued.token);
    }

    #[tokio::test]
    async fn test_missing_token() {
        let (gateway, ..) = setup().await;
        assert!(matches!(
            gateway.authenticate(None).await,
            Err(AuthError::MissingToken)
        ));
    }

    #[tokio::test]
    async fn test_revoked_token() {
        let (gateway, tokens, _db, user) = setup().await;
        let issued = tokens.issue_access(user.id).unwrap();
        tokens
            .revoke(&issued.token, issued.expires_at.timestamp())
            .await
            .unwrap();

        assert!(matches!(
            gateway.authenticate(Some(&bearer(&issued.token))).await,
            Err(AuthError::TokenRevoked)
        ));
    }

    #[tokio::test]
    async fn test_invalid_token() {
        let (gateway, ..) = setup().await;
        assert!(matches!(
            gateway.authenticate(Some("Bearer not.a.jwt")).await,
            Err(AuthError::InvalidToken)
        ));
    }

    #[tokio::test]
    async fn test_inactive_user() {
        let (gateway, tokens, db, user) = setup().await;
        db.set_active(user.id, false).await.unwrap();
        let issued = tokens.issue_access(user.id).unwrap();

        assert!(matches!(
            gateway.authenticate(Some(&bearer(&issued.token))).await,
            Err(AuthError::UserUnavailable)
        ));
    }

    #[tokio::test]
    async fn test_unknown_user() {
        let (gateway, tokens, ..) = setup().await;
        let issued = tokens.issue_access(9999).unwrap();

        assert!(matches!(
            gateway.authenticate(Some(&bearer(&issued.token))).await,
            Err(AuthError::UserUnavailable)
        ));
    }

    #[tokio::test]
    async fn test_banned_user() {
        let (gateway, tokens, db, user) = setup().await;
        db.create_ban(&NewBan {
            user_id: user.id,
            reason: "cheating".to_string(),
            expires_at: None,
            created_by: None,
        })
        .await
        .unwrap();
        let issued = tokens.issue_access(user.id).unwrap();

        match gateway.authenticate(Some(&bearer(&issued.token))).await {
            Err(AuthError::Banned(info)) => {
                assert_eq!(info.reason, "cheating");
                assert!(info.expires_at.is_none());
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_store_failure_fails_closed() {
        let (gateway, tokens, db, user) = setup().await;
        let issued = tokens.issue_access(user.id).unwrap();
        db.pool().close().await;

        assert!(matches!(
            gateway.authenticate(Some(&bearer(&issued.token))).await,
            Err(AuthError::AuthenticationFailed)
        ));
    }
}
