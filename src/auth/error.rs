//! Authentication and authorization failures.

use std::collections::HashMap;
use std::time::Duration;

use axum::http::StatusCode;
use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

use super::password::PasswordError;
use crate::db::{Ban, BanType};
use crate::WardenError;

/// Ban details returned to the banned user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BanInfo {
    /// Reason given by the issuer.
    pub reason: String,
    /// Ban kind.
    pub ban_type: BanType,
    /// When the ban lifts; `None` for permanent bans.
    pub expires_at: Option<DateTime<Utc>>,
}

impl From<&Ban> for BanInfo {
    fn from(ban: &Ban) -> Self {
        Self {
            reason: ban.reason.clone(),
            ban_type: ban.ban_type,
            expires_at: ban.expires_at,
        }
    }
}

/// Broad failure class, mapped to the HTTP status family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Malformed input (400).
    Validation,
    /// Missing, invalid or revoked credentials (401).
    Authentication,
    /// Authenticated but not allowed (403).
    Authorization,
    /// Request budget exceeded (429).
    RateLimit,
    /// Duplicate resource (409).
    Conflict,
    /// A collaborator failed (5xx).
    Dependency,
}

/// Every way an auth decision can fail.
#[derive(Error, Debug, Clone)]
pub enum AuthError {
    /// No bearer token on the request.
    #[error("Authentication required")]
    MissingToken,

    /// Token is on the revocation list.
    #[error("Token has been revoked")]
    TokenRevoked,

    /// Bad signature, wrong type or expired.
    #[error("Invalid or expired token")]
    InvalidToken,

    /// Subject no longer exists or is deactivated.
    #[error("User not found or inactive")]
    UserUnavailable,

    /// Subject has an active ban.
    #[error("Account is banned")]
    Banned(BanInfo),

    /// No principal on a route that needs one.
    #[error("Authentication required")]
    Unauthenticated,

    /// Principal's role is not on the allow-list.
    #[error("Insufficient role")]
    InsufficientRole,

    /// Principal lacks a required permission.
    #[error("Insufficient permissions")]
    InsufficientPermission,

    /// CSRF header and cookie missing or different.
    #[error("CSRF token mismatch")]
    CsrfMismatch,

    /// CSRF secret does not match the server-side copy.
    #[error("CSRF token expired or invalid")]
    CsrfExpiredOrInvalid,

    /// Request budget exceeded.
    #[error("Too many requests, please try again later")]
    RateLimited {
        /// Time until the next request is allowed.
        retry_after: Duration,
    },

    /// Email already registered.
    #[error("Email is already registered")]
    EmailTaken,

    /// Unknown email or wrong password.
    #[error("Invalid email or password")]
    InvalidCredentials,

    /// Login requires a verified email.
    #[error("Email address has not been verified")]
    EmailNotVerified,

    /// Verification or reset token unusable.
    #[error("Invalid or expired token")]
    InvalidOrExpiredToken,

    /// An already exchanged refresh token was presented again.
    #[error("Refresh token has already been used")]
    TokenReuse,

    /// Account deactivated.
    #[error("Account is disabled")]
    AccountDisabled,

    /// Field-level input errors.
    #[error("Validation failed")]
    Validation(HashMap<String, Vec<String>>),

    /// A lookup failed while authenticating; the request is rejected.
    #[error("Authentication failed")]
    AuthenticationFailed,

    /// A collaborator failed outside the gateway.
    #[error("Service temporarily unavailable, please try again later")]
    Dependency(String),
}

impl AuthError {
    /// Single-field validation failure.
    pub fn invalid_field(field: &str, message: impl Into<String>) -> Self {
        let mut details = HashMap::new();
        details.insert(field.to_string(), vec![message.into()]);
        AuthError::Validation(details)
    }

    /// Failure class.
    pub fn class(&self) -> ErrorClass {
        match self {
            AuthError::Validation(_) | AuthError::InvalidOrExpiredToken => ErrorClass::Validation,
            AuthError::MissingToken
            | AuthError::TokenRevoked
            | AuthError::InvalidToken
            | AuthError::UserUnavailable
            | AuthError::Unauthenticated
            | AuthError::InvalidCredentials
            | AuthError::TokenReuse
            | AuthError::AuthenticationFailed => ErrorClass::Authentication,
            AuthError::Banned(_)
            | AuthError::InsufficientRole
            | AuthError::InsufficientPermission
            | AuthError::CsrfMismatch
            | AuthError::CsrfExpiredOrInvalid
            | AuthError::EmailNotVerified
            | AuthError::AccountDisabled => ErrorClass::Authorization,
            AuthError::RateLimited { .. } => ErrorClass::RateLimit,
            AuthError::EmailTaken => ErrorClass::Conflict,
            AuthError::Dependency(_) => ErrorClass::Dependency,
        }
    }

    /// HTTP status for this failure.
    pub fn status(&self) -> StatusCode {
        match self.class() {
            ErrorClass::Validation => StatusCode::BAD_REQUEST,
            ErrorClass::Authentication => StatusCode::UNAUTHORIZED,
            ErrorClass::Authorization => StatusCode::FORBIDDEN,
            ErrorClass::RateLimit => StatusCode::TOO_MANY_REQUESTS,
            ErrorClass::Conflict => StatusCode::CONFLICT,
            ErrorClass::Dependency => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

impl From<WardenError> for AuthError {
    fn from(err: WardenError) -> Self {
        AuthError::Dependency(err.to_string())
    }
}

impl From<PasswordError> for AuthError {
    fn from(err: PasswordError) -> Self {
        match err {
            PasswordError::TooShort | PasswordError::TooLong => {
                AuthError::invalid_field("password", err.to_string())
            }
            PasswordError::HashError(_) | PasswordError::InvalidHash => {
                AuthError::Dependency(err.to_string())
            }
        }
    }
}
