//! Request DTOs for Web API.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use validator::Validate;

/// User registration request.
#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    /// Login email.
    #[validate(email(message = "Must be a valid email address"))]
    pub email: String,
    /// Password.
    #[validate(length(
        min = 8,
        max = 128,
        message = "Must be between 8 and 128 characters"
    ))]
    pub password: String,
    /// Display name.
    #[validate(length(min = 1, max = 100, message = "Must be between 1 and 100 characters"))]
    pub name: String,
}

/// Email verification request.
#[derive(Debug, Deserialize, Validate)]
pub struct VerifyEmailRequest {
    /// Token from the verification link.
    #[validate(length(min = 1, message = "Token is required"))]
    pub token: String,
}

/// Login request.
#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    /// Login email.
    #[validate(length(min = 1, message = "Email is required"))]
    pub email: String,
    /// Password.
    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

/// Token refresh request.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest {
    /// Refresh token.
    #[validate(length(min = 1, message = "Refresh token is required"))]
    pub refresh_token: String,
}

/// Logout request. The body is optional.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogoutRequest {
    /// Refresh token to revoke alongside the access token.
    #[serde(default)]
    pub refresh_token: Option<String>,
}

/// Password reset request.
#[derive(Debug, Deserialize, Validate)]
pub struct ForgotPasswordRequest {
    /// Account email.
    #[validate(email(message = "Must be a valid email address"))]
    pub email: String,
}

/// Password reset submission.
#[derive(Debug, Deserialize, Validate)]
pub struct ResetPasswordRequest {
    /// Token from the reset link.
    #[validate(length(min = 1, message = "Token is required"))]
    pub token: String,
    /// New password.
    #[validate(length(
        min = 8,
        max = 128,
        message = "Must be between 8 and 128 characters"
    ))]
    pub password: String,
}

/// Ban creation request.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateBanRequest {
    /// Reason shown to the user.
    #[validate(length(min = 1, max = 500, message = "Must be between 1 and 500 characters"))]
    pub reason: String,
    /// Expiry; omit for a permanent ban.
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
}

/// Maintenance toggle.
#[derive(Debug, Deserialize, Validate)]
pub struct MaintenanceRequest {
    /// New value.
    pub enabled: bool,
}
