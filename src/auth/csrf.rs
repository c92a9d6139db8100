//! CSRF protection.
//!
//! Double-submit cookie reinforced by a server-side copy: at login a random
//! secret goes to the browser as an HttpOnly cookie and to the revocation
//! cache as a salted hash under `csrf:<userId>`. Mutating requests must echo
//! the secret in a header; header and cookie must match, and for an
//! authenticated caller the header must also match the stored hash.

use std::sync::Arc;
use std::time::Duration;

use axum::http::Method;
use tracing::{debug, error};

use super::AuthError;
use crate::cache::{csrf_key, sha256_hex, RevocationCache};
use crate::config::CsrfConfig;
use crate::timeout::bounded;
use crate::Result;

/// Whether a method can change state.
pub fn is_state_changing(method: &Method) -> bool {
    !matches!(*method, Method::GET | Method::HEAD | Method::OPTIONS)
}

fn server_hash(user_id: i64, secret: &str) -> String {
    sha256_hex(&format!("{user_id}:{secret}"))
}

/// Issues and checks CSRF secrets.
pub struct CsrfGuard {
    cache: Arc<dyn RevocationCache>,
    config: CsrfConfig,
    secure_cookie: bool,
    cache_timeout: Duration,
}

impl CsrfGuard {
    /// Create a guard.
    pub fn new(
        cache: Arc<dyn RevocationCache>,
        config: CsrfConfig,
        secure_cookie: bool,
        cache_timeout: Duration,
    ) -> Self {
        Self {
            cache,
            config,
            secure_cookie,
            cache_timeout,
        }
    }

    /// Cookie name.
    pub fn cookie_name(&self) -> &str {
        &self.config.cookie_name
    }

    /// Header name.
    pub fn header_name(&self) -> &str {
        &self.config.header_name
    }

    /// Whether a request to `path` with `method` must carry a CSRF token.
    pub fn requires_check(&self, method: &Method, path: &str) -> bool {
        is_state_changing(method) && !self.config.exempt_paths.iter().any(|p| p == path)
    }

    /// Generate a secret for `user_id` and store its hash.
    pub async fn issue(&self, user_id: i64) -> Result<String> {
        let bytes: [u8; 32] = rand::random();
        let secret: String = bytes.iter().map(|b| format!("{b:02x}")).collect();

        bounded(
            self.cache_timeout,
            "revocation cache",
            self.cache.set_ex(
                &csrf_key(user_id),
                &server_hash(user_id, &secret),
                Duration::from_secs(self.config.ttl_secs),
            ),
        )
        .await?;
        Ok(secret)
    }

    /// `Set-Cookie` value delivering the secret.
    pub fn set_cookie(&self, secret: &str) -> String {
        self.cookie(secret, self.config.ttl_secs)
    }

    /// `Set-Cookie` value removing the cookie.
    pub fn clear_cookie(&self) -> String {
        self.cookie("", 0)
    }

    fn cookie(&self, value: &str, max_age: u64) -> String {
        let mut cookie = format!(
            "{}={}; Path=/; HttpOnly; SameSite=Strict; Max-Age={}",
            self.config.cookie_name, value, max_age
        );
        if self.secure_cookie {
            cookie.push_str("; Secure");
        }
        cookie
    }

    /// Check a request's CSRF material.
    pub async fn validate(
        &self,
        header: Option<&str>,
        cookie: Option<&str>,
        user_id: Option<i64>,
    ) -> std::result::Result<(), AuthError> {
        let (header, cookie) = match (header, cookie) {
            (Some(h), Some(c)) if !h.is_empty() && !c.is_empty() => (h, c),
            _ => {
                debug!("CSRF header or cookie missing");
                return Err(AuthError::CsrfMismatch);
            }
        };

        // Compare digests rather than the raw values.
        if sha256_hex(header) != sha256_hex(cookie) {
            debug!("CSRF header does not match cookie");
            return Err(AuthError::CsrfMismatch);
        }

        let Some(user_id) = user_id else {
            return Ok(());
        };

        let stored = bounded(
            self.cache_timeout,
            "revocation cache",
            self.cache.get(&csrf_key(user_id)),
        )
        .await
        .map_err(|e| {
            error!(error = %e, user_id, "CSRF lookup failed");
            AuthError::Dependency(e.to_string())
        })?;

        match stored {
            Some(hash) if hash == server_hash(user_id, header) => Ok(()),
            _ => {
                debug!(user_id, "CSRF secret expired or not issued for this user");
                Err(AuthError::CsrfExpiredOrInvalid)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCache;

    fn guard(secure: bool) -> CsrfGuard {
        CsrfGuard::new(
            Arc::new(MemoryCache::new()),
            CsrfConfig::default(),
            secure,
            Duration::from_millis(500),
        )
    }

    #[test]
    fn test_requires_check() {
        let guard = guard(false);
        assert!(!guard.requires_check(&Method::GET, "/api/auth/me"));
        assert!(!guard.requires_check(&Method::OPTIONS, "/api/auth/logout"));
        assert!(guard.requires_check(&Method::POST, "/api/auth/logout"));
        assert!(guard.requires_check(&Method::POST, "/api/auth/refresh-token"));
        assert!(!guard.requires_check(&Method::POST, "/api/auth/login"));
        assert!(!guard.requires_check(&Method::POST, "/api/auth/register"));
        assert!(guard.requires_check(&Method::DELETE, "/api/admin/users/1/bans"));
    }

    #[test]
    fn test_cookie_attributes() {
        let cookie = guard(true).set_cookie("abc");
        assert!(cookie.starts_with("__csrf=abc;"));
        assert!(cookie.contains("HttpOnly"));
        assert!(cookie.contains("SameSite=Strict"));
        assert!(cookie.contains("Max-Age=3600"));
        assert!(cookie.contains("Secure"));

        let cleared = guard(false).clear_cookie();
        assert!(cleared.contains("Max-Age=0"));
        assert!(!cleared.contains("Secure"));
    }

    #[tokio::test]
    async fn test_issue_and_validate() {
        let guard = guard(false);
        let secret = guard.issue(4).await.unwrap();
        assert_eq!(secret.len(), 64);

        assert!(guard
            .validate(Some(&secret), Some(&secret), Some(4))
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_mismatch_and_missing() {
        let guard = guard(false);
        let secret = guard.issue(4).await.unwrap();

        assert!(matches!(
            guard.validate(Some(&secret), Some("other"), Some(4)).await,
            Err(AuthError::CsrfMismatch)
        ));
        assert!(matches!(
            guard.validate(None, Some(&secret), Some(4)).await,
            Err(AuthError::CsrfMismatch)
        ));
        assert!(matches!(
            guard.validate(Some(&secret), None, None).await,
            Err(AuthError::CsrfMismatch)
        ));
    }

    #[tokio::test]
    async fn test_forged_pair_fails_server_check() {
        let guard = guard(false);
        guard.issue(4).await.unwrap();

        // Attacker-chosen value planted in both cookie and header.
        assert!(matches!(
            guard.validate(Some("forged"), Some("forged"), Some(4)).await,
            Err(AuthError::CsrfExpiredOrInvalid)
        ));
    }

    #[tokio::test]
    async fn test_secret_bound_to_user() {
        let guard = guard(false);
        let secret = guard.issue(4).await.unwrap();
        guard.issue(5).await.unwrap();

        assert!(matches!(
            guard.validate(Some(&secret), Some(&secret), Some(5)).await,
            Err(AuthError::CsrfExpiredOrInvalid)
        ));
    }

    #[tokio::test]
    async fn test_anonymous_double_submit_only() {
        let guard = guard(false);
        assert!(guard
            .validate(Some("value"), Some("value"), None)
            .await
            .is_ok());
    }
}
