//! Signed tokens and revocation.
//!
//! Every token is an HS256 JWT with a `typ` claim so one kind can never be
//! accepted in place of another. Revocation comes in two forms:
//!
//! - a per-token blacklist entry keyed by the SHA-256 of the raw token,
//!   living exactly as long as the token it blocks;
//! - a per-subject watermark: tokens issued at or before it are revoked.
//!
//! Verification is pure (signature, expiry, type). Revocation checks are
//! separate calls that go to the [`RevocationCache`].

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::AuthError;
use crate::cache::{blacklist_key, revoked_before_key, RevocationCache};
use crate::config::TokenConfig;
use crate::logging::SECURITY_TARGET;
use crate::timeout::bounded;
use crate::{Result, WardenError};

/// What a token may be used for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenKind {
    /// Authenticates API requests.
    Access,
    /// Exchanged for a new token pair.
    Refresh,
    /// Confirms an email address.
    EmailVerification,
    /// Authorizes one password reset.
    PasswordReset,
}

/// Claims carried by every token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (user ID).
    pub sub: i64,
    /// Issued at, seconds.
    pub iat: i64,
    /// Issued at, milliseconds. Compared against revocation watermarks.
    pub iat_ms: i64,
    /// Expiration, seconds.
    pub exp: i64,
    /// Unique token ID.
    pub jti: String,
    /// Token kind.
    pub typ: TokenKind,
}

impl Claims {
    /// Time left before expiry, zero if already expired.
    pub fn remaining(&self, now: DateTime<Utc>) -> Duration {
        let secs = self.exp - now.timestamp();
        if secs > 0 {
            Duration::from_secs(secs as u64)
        } else {
            Duration::ZERO
        }
    }
}

/// A freshly signed token.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    /// Encoded JWT.
    pub token: String,
    /// Expiry instant.
    pub expires_at: DateTime<Utc>,
    /// Lifetime in seconds.
    pub expires_in: u64,
}

/// Access and refresh token issued together.
#[derive(Debug, Clone)]
pub struct TokenPair {
    /// Short-lived access token.
    pub access: IssuedToken,
    /// Long-lived refresh token.
    pub refresh: IssuedToken,
}

/// Outcome of a successful refresh rotation.
#[derive(Debug, Clone)]
pub struct Rotation {
    /// Subject of the exchanged token.
    pub user_id: i64,
    /// Replacement tokens.
    pub pair: TokenPair,
}

/// Mints, verifies and revokes tokens.
pub struct TokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    config: TokenConfig,
    cache: Arc<dyn RevocationCache>,
    cache_timeout: Duration,
}

impl TokenService {
    /// Create a token service signing with `config.secret`.
    pub fn new(
        config: TokenConfig,
        cache: Arc<dyn RevocationCache>,
        cache_timeout: Duration,
    ) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        validation.leeway = config.leeway_secs;

        Self {
            encoding_key: EncodingKey::from_secret(config.secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(config.secret.as_bytes()),
            validation,
            config,
            cache,
            cache_timeout,
        }
    }

    /// Lifetime configured for a token kind.
    pub fn ttl(&self, kind: TokenKind) -> Duration {
        let secs = match kind {
            TokenKind::Access => self.config.access_ttl_secs,
            TokenKind::Refresh => self.config.refresh_ttl_secs,
            TokenKind::EmailVerification => self.config.verification_ttl_secs,
            TokenKind::PasswordReset => self.config.reset_ttl_secs,
        };
        Duration::from_secs(secs)
    }

    fn issue(&self, user_id: i64, kind: TokenKind) -> Result<IssuedToken> {
        let now = Utc::now();
        let ttl = self.ttl(kind).as_secs();
        let exp = now.timestamp() + ttl as i64;
        let claims = Claims {
            sub: user_id,
            iat: now.timestamp(),
            iat_ms: now.timestamp_millis(),
            exp,
            jti: uuid::Uuid::new_v4().to_string(),
            typ: kind,
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| WardenError::Signing(e.to_string()))?;
        let expires_at = Utc
            .timestamp_opt(exp, 0)
            .single()
            .ok_or_else(|| WardenError::Signing("expiry out of range".to_string()))?;

        Ok(IssuedToken {
            token,
            expires_at,
            expires_in: ttl,
        })
    }

    /// Sign a short-lived access token.
    pub fn issue_access(&self, user_id: i64) -> Result<IssuedToken> {
        self.issue(user_id, TokenKind::Access)
    }

    /// Sign a long-lived refresh token.
    pub fn issue_refresh(&self, user_id: i64) -> Result<IssuedToken> {
        self.issue(user_id, TokenKind::Refresh)
    }

    /// Sign an access and refresh token for the same subject.
    pub fn issue_pair(&self, user_id: i64) -> Result<TokenPair> {
        Ok(TokenPair {
            access: self.issue_access(user_id)?,
            refresh: self.issue_refresh(user_id)?,
        })
    }

    /// Sign a single-purpose token (email verification or password reset).
    pub fn issue_purpose(&self, user_id: i64, kind: TokenKind) -> Result<IssuedToken> {
        self.issue(user_id, kind)
    }

    fn verify(&self, token: &str, kind: TokenKind) -> std::result::Result<Claims, AuthError> {
        let data = decode::<Claims>(token, &self.decoding_key, &self.validation).map_err(|e| {
            debug!("JWT validation failed: {}", e);
            AuthError::InvalidToken
        })?;

        if data.claims.typ != kind {
            debug!(expected = ?kind, actual = ?data.claims.typ, "JWT type mismatch");
            return Err(AuthError::InvalidToken);
        }
        Ok(data.claims)
    }

    /// Check signature, expiry and type of an access token.
    pub fn verify_access(&self, token: &str) -> std::result::Result<Claims, AuthError> {
        self.verify(token, TokenKind::Access)
    }

    /// Check signature, expiry and type of a refresh token.
    pub fn verify_refresh(&self, token: &str) -> std::result::Result<Claims, AuthError> {
        self.verify(token, TokenKind::Refresh)
    }

    /// Check a single-purpose token.
    pub fn verify_purpose(
        &self,
        token: &str,
        kind: TokenKind,
    ) -> std::result::Result<Claims, AuthError> {
        self.verify(token, kind)
    }

    /// Whether the raw token is on the blacklist.
    pub async fn is_blacklisted(&self, token: &str) -> Result<bool> {
        let key = blacklist_key(token);
        bounded(self.cache_timeout, "revocation cache", self.cache.exists(&key)).await
    }

    /// Blacklist a token until its own expiry (`exp`, epoch seconds).
    ///
    /// A token that has already expired needs no entry.
    pub async fn revoke(&self, token: &str, exp: i64) -> Result<()> {
        let remaining = exp - Utc::now().timestamp();
        if remaining <= 0 {
            return Ok(());
        }
        let key = blacklist_key(token);
        bounded(
            self.cache_timeout,
            "revocation cache",
            self.cache
                .set_ex(&key, "revoked", Duration::from_secs(remaining as u64)),
        )
        .await
    }

    /// Blacklist a token only if it is not already blacklisted.
    ///
    /// Returns `true` for the single caller that won.
    pub async fn consume(&self, token: &str, exp: i64) -> Result<bool> {
        // An unexpired-within-leeway token still needs an entry to win.
        let remaining = (exp - Utc::now().timestamp()).max(1);
        let key = blacklist_key(token);
        bounded(
            self.cache_timeout,
            "revocation cache",
            self.cache
                .set_nx_ex(&key, "consumed", Duration::from_secs(remaining as u64)),
        )
        .await
    }

    /// Revoke every token issued to `user_id` up to now.
    pub async fn revoke_all_for_subject(&self, user_id: i64) -> Result<()> {
        let watermark = Utc::now().timestamp_millis().to_string();
        // Outlives the longest-lived token that could predate it.
        let ttl = Duration::from_secs(self.config.refresh_ttl_secs + self.config.leeway_secs);
        bounded(
            self.cache_timeout,
            "revocation cache",
            self.cache
                .set_ex(&revoked_before_key(user_id), &watermark, ttl),
        )
        .await
    }

    /// Whether the token predates its subject's revocation watermark.
    ///
    /// The watermark is a millisecond timestamp and the comparison is
    /// inclusive: a token minted in the same millisecond as the revocation
    /// is treated as revoked, since it may have been issued before it. The
    /// bound is therefore one millisecond on a single node. Across nodes it
    /// is one millisecond plus clock skew, and the failure mode is a fresh
    /// token rejected until the minting node's clock passes the watermark,
    /// never a stale token accepted.
    pub async fn is_revoked_for_subject(&self, claims: &Claims) -> Result<bool> {
        let watermark = bounded(
            self.cache_timeout,
            "revocation cache",
            self.cache.get(&revoked_before_key(claims.sub)),
        )
        .await?;

        Ok(match watermark.and_then(|w| w.parse::<i64>().ok()) {
            Some(before) => claims.iat_ms <= before,
            None => false,
        })
    }

    /// Exchange a refresh token for a new pair.
    ///
    /// The old token is consumed with an atomic insert-if-absent, so of
    /// several concurrent exchanges of the same token at most one succeeds.
    /// Every later attempt fails with [`AuthError::TokenReuse`] and, when
    /// configured, revokes all of the subject's tokens.
    pub async fn rotate_refresh_token(
        &self,
        old_token: &str,
    ) -> std::result::Result<Rotation, AuthError> {
        let claims = self.verify_refresh(old_token)?;

        if self.is_revoked_for_subject(&claims).await? {
            return Err(AuthError::TokenRevoked);
        }

        if !self.consume(old_token, claims.exp).await? {
            warn!(
                target: SECURITY_TARGET,
                user_id = claims.sub,
                jti = %claims.jti,
                "Refresh token reuse detected"
            );
            if self.config.revoke_all_on_reuse {
                self.revoke_all_for_subject(claims.sub).await?;
            }
            return Err(AuthError::TokenReuse);
        }

        let pair = self.issue_pair(claims.sub)?;
        Ok(Rotation {
            user_id: claims.sub,
            pair,
        })
    }
}
