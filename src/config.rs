//! Configuration module for warden.

use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

use crate::{Result, WardenError};

/// Environment variable that overrides `tokens.secret`.
pub const SECRET_ENV_VAR: &str = "WARDEN_JWT_SECRET";

/// Minimum signing secret length in bytes.
pub const MIN_SECRET_LENGTH: usize = 32;

/// Server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Host address to bind.
    #[serde(default = "default_host")]
    pub host: String,
    /// Port number to listen on.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Public base URL used to build links in outgoing mail.
    #[serde(default = "default_public_url")]
    pub public_url: String,
    /// Whether cookies carry the `Secure` attribute (production).
    #[serde(default)]
    pub secure_cookies: bool,
    /// CORS allowed origins.
    #[serde(default)]
    pub cors_origins: Vec<String>,
    /// Take the client address from `X-Forwarded-For` / `X-Real-IP`.
    ///
    /// Only enable behind a reverse proxy that overwrites these headers;
    /// otherwise clients pick their own rate limit key.
    #[serde(default)]
    pub trust_proxy: bool,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_public_url() -> String {
    "http://localhost:8080".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            public_url: default_public_url(),
            secure_cookies: false,
            cors_origins: Vec::new(),
            trust_proxy: false,
        }
    }
}

/// Database configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_db_path")]
    pub path: String,
    /// Maximum pooled connections.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_db_path() -> String {
    "data/warden.db".to_string()
}

fn default_max_connections() -> u32 {
    8
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
            max_connections: default_max_connections(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Path to the log file.
    #[serde(default = "default_log_file")]
    pub file: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_file() -> String {
    "logs/warden.log".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: default_log_file(),
        }
    }
}

/// Token lifetimes and signing configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenConfig {
    /// HMAC signing secret (overridden by `WARDEN_JWT_SECRET`).
    #[serde(default)]
    pub secret: String,
    /// Access token lifetime in seconds.
    #[serde(default = "default_access_ttl")]
    pub access_ttl_secs: u64,
    /// Refresh token lifetime in seconds.
    #[serde(default = "default_refresh_ttl")]
    pub refresh_ttl_secs: u64,
    /// Email verification token lifetime in seconds.
    #[serde(default = "default_verification_ttl")]
    pub verification_ttl_secs: u64,
    /// Password reset token lifetime in seconds.
    #[serde(default = "default_reset_ttl")]
    pub reset_ttl_secs: u64,
    /// Clock skew tolerance in seconds when checking expiry.
    #[serde(default = "default_leeway")]
    pub leeway_secs: u64,
    /// Revoke every session of a subject when a spent refresh token is replayed.
    #[serde(default = "default_revoke_all_on_reuse")]
    pub revoke_all_on_reuse: bool,
}

fn default_access_ttl() -> u64 {
    15 * 60
}

fn default_refresh_ttl() -> u64 {
    7 * 24 * 60 * 60
}

fn default_verification_ttl() -> u64 {
    24 * 60 * 60
}

fn default_reset_ttl() -> u64 {
    60 * 60
}

fn default_leeway() -> u64 {
    5
}

fn default_revoke_all_on_reuse() -> bool {
    true
}

impl Default for TokenConfig {
    fn default() -> Self {
        Self {
            secret: String::new(),
            access_ttl_secs: default_access_ttl(),
            refresh_ttl_secs: default_refresh_ttl(),
            verification_ttl_secs: default_verification_ttl(),
            reset_ttl_secs: default_reset_ttl(),
            leeway_secs: default_leeway(),
            revoke_all_on_reuse: default_revoke_all_on_reuse(),
        }
    }
}

/// CSRF guard configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct CsrfConfig {
    /// Cookie carrying the secret.
    #[serde(default = "default_csrf_cookie")]
    pub cookie_name: String,
    /// Header the client echoes the secret in.
    #[serde(default = "default_csrf_header")]
    pub header_name: String,
    /// Lifetime of both the cookie and the server-side hash, in seconds.
    #[serde(default = "default_csrf_ttl")]
    pub ttl_secs: u64,
    /// Mutating endpoints reachable before a session exists.
    #[serde(default = "default_csrf_exempt_paths")]
    pub exempt_paths: Vec<String>,
}

fn default_csrf_cookie() -> String {
    "__csrf".to_string()
}

fn default_csrf_header() -> String {
    "x-csrf-token".to_string()
}

fn default_csrf_ttl() -> u64 {
    60 * 60
}

fn default_csrf_exempt_paths() -> Vec<String> {
    [
        "/api/auth/register",
        "/api/auth/login",
        "/api/auth/verify-email",
        "/api/auth/forgot-password",
        "/api/auth/reset-password",
    ]
    .iter()
    .map(|p| p.to_string())
    .collect()
}

impl Default for CsrfConfig {
    fn default() -> Self {
        Self {
            cookie_name: default_csrf_cookie(),
            header_name: default_csrf_header(),
            ttl_secs: default_csrf_ttl(),
            exempt_paths: default_csrf_exempt_paths(),
        }
    }
}

/// Request budgets, in requests per minute.
#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitSettings {
    /// Budget for registration.
    #[serde(default = "default_register_limit")]
    pub register_per_minute: u32,
    /// Budget for login attempts.
    #[serde(default = "default_login_limit")]
    pub login_per_minute: u32,
    /// Budget for password reset request and submission.
    #[serde(default = "default_password_reset_limit")]
    pub password_reset_per_minute: u32,
    /// Budget for email verification.
    #[serde(default = "default_email_verification_limit")]
    pub email_verification_per_minute: u32,
    /// Budget for everything else.
    #[serde(default = "default_api_limit")]
    pub api_per_minute: u32,
}

fn default_register_limit() -> u32 {
    5
}

fn default_login_limit() -> u32 {
    5
}

fn default_password_reset_limit() -> u32 {
    3
}

fn default_email_verification_limit() -> u32 {
    10
}

fn default_api_limit() -> u32 {
    100
}

impl Default for RateLimitSettings {
    fn default() -> Self {
        Self {
            register_per_minute: default_register_limit(),
            login_per_minute: default_login_limit(),
            password_reset_per_minute: default_password_reset_limit(),
            email_verification_per_minute: default_email_verification_limit(),
            api_per_minute: default_api_limit(),
        }
    }
}

/// Revocation cache backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum CacheBackend {
    /// In-process cache (single instance only).
    #[default]
    Memory,
    /// Shared Redis instance.
    Redis,
}

/// Revocation cache configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    /// Backend kind.
    #[serde(default)]
    pub backend: CacheBackend,
    /// Redis connection URL (used when backend = "redis").
    #[serde(default = "default_redis_url")]
    pub redis_url: String,
}

fn default_redis_url() -> String {
    "redis://127.0.0.1:6379".to_string()
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            backend: CacheBackend::default(),
            redis_url: default_redis_url(),
        }
    }
}

/// Outbound mail transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum MailTransport {
    /// Write messages to the log.
    #[default]
    Log,
    /// POST messages to an HTTP mail relay.
    Webhook,
}

/// Mail configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct MailConfig {
    /// Transport kind.
    #[serde(default)]
    pub transport: MailTransport,
    /// Relay endpoint (used when transport = "webhook").
    #[serde(default)]
    pub webhook_url: String,
    /// Sender address.
    #[serde(default = "default_mail_from")]
    pub from: String,
}

fn default_mail_from() -> String {
    "no-reply@localhost".to_string()
}

impl Default for MailConfig {
    fn default() -> Self {
        Self {
            transport: MailTransport::default(),
            webhook_url: String::new(),
            from: default_mail_from(),
        }
    }
}

/// Deadlines for collaborator calls, in milliseconds.
#[derive(Debug, Clone, Deserialize)]
pub struct TimeoutConfig {
    /// Credential store calls.
    #[serde(default = "default_store_timeout")]
    pub store_ms: u64,
    /// Revocation cache calls.
    #[serde(default = "default_cache_timeout")]
    pub cache_ms: u64,
    /// Mailer calls.
    #[serde(default = "default_mail_timeout")]
    pub mail_ms: u64,
}

fn default_store_timeout() -> u64 {
    2000
}

fn default_cache_timeout() -> u64 {
    500
}

fn default_mail_timeout() -> u64 {
    5000
}

impl TimeoutConfig {
    /// Credential store deadline.
    pub fn store(&self) -> Duration {
        Duration::from_millis(self.store_ms)
    }

    /// Revocation cache deadline.
    pub fn cache(&self) -> Duration {
        Duration::from_millis(self.cache_ms)
    }

    /// Mailer deadline.
    pub fn mail(&self) -> Duration {
        Duration::from_millis(self.mail_ms)
    }
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            store_ms: default_store_timeout(),
            cache_ms: default_cache_timeout(),
            mail_ms: default_mail_timeout(),
        }
    }
}

/// Argon2 cost parameters.
#[derive(Debug, Clone, Deserialize)]
pub struct PasswordConfig {
    /// Memory cost in KiB.
    #[serde(default = "default_memory_kib")]
    pub memory_kib: u32,
    /// Iterations.
    #[serde(default = "default_iterations")]
    pub iterations: u32,
    /// Lanes.
    #[serde(default = "default_parallelism")]
    pub parallelism: u32,
}

fn default_memory_kib() -> u32 {
    65536
}

fn default_iterations() -> u32 {
    3
}

fn default_parallelism() -> u32 {
    4
}

impl Default for PasswordConfig {
    fn default() -> Self {
        Self {
            memory_kib: default_memory_kib(),
            iterations: default_iterations(),
            parallelism: default_parallelism(),
        }
    }
}

/// Platform settings cache configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct SettingsConfig {
    /// How long loaded settings are served before reloading, in seconds.
    #[serde(default = "default_settings_ttl")]
    pub cache_ttl_secs: u64,
}

fn default_settings_ttl() -> u64 {
    30
}

impl Default for SettingsConfig {
    fn default() -> Self {
        Self {
            cache_ttl_secs: default_settings_ttl(),
        }
    }
}

/// Login policy.
#[derive(Debug, Clone, Deserialize)]
pub struct LoginConfig {
    /// Refuse login until the email address is verified.
    #[serde(default = "default_require_verified_email")]
    pub require_verified_email: bool,
}

fn default_require_verified_email() -> bool {
    true
}

impl Default for LoginConfig {
    fn default() -> Self {
        Self {
            require_verified_email: default_require_verified_email(),
        }
    }
}

/// Root configuration.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    /// Server settings.
    #[serde(default)]
    pub server: ServerConfig,
    /// Database settings.
    #[serde(default)]
    pub database: DatabaseConfig,
    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Token settings.
    #[serde(default)]
    pub tokens: TokenConfig,
    /// CSRF settings.
    #[serde(default)]
    pub csrf: CsrfConfig,
    /// Rate limit settings.
    #[serde(default)]
    pub rate_limit: RateLimitSettings,
    /// Revocation cache settings.
    #[serde(default)]
    pub cache: CacheConfig,
    /// Mail settings.
    #[serde(default)]
    pub mail: MailConfig,
    /// Collaborator deadlines.
    #[serde(default)]
    pub timeouts: TimeoutConfig,
    /// Password hashing cost.
    #[serde(default)]
    pub password: PasswordConfig,
    /// Settings cache.
    #[serde(default)]
    pub settings: SettingsConfig,
    /// Login policy.
    #[serde(default)]
    pub login: LoginConfig,
}

impl Config {
    /// Load configuration from a TOML file, applying environment overrides.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let mut config = Self::parse(&content)?;
        config.apply_env();
        Ok(config)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| WardenError::Config(e.to_string()))
    }

    /// Apply environment variable overrides.
    pub fn apply_env(&mut self) {
        if let Ok(secret) = std::env::var(SECRET_ENV_VAR) {
            if !secret.is_empty() {
                self.tokens.secret = secret;
            }
        }
    }

    /// Check settings that have no safe default.
    pub fn validate(&self) -> Result<()> {
        if self.tokens.secret.len() < MIN_SECRET_LENGTH {
            return Err(WardenError::Config(format!(
                "tokens.secret must be at least {MIN_SECRET_LENGTH} bytes (or set {SECRET_ENV_VAR})"
            )));
        }
        if self.tokens.access_ttl_secs == 0 || self.tokens.refresh_ttl_secs == 0 {
            return Err(WardenError::Config(
                "token lifetimes must be positive".to_string(),
            ));
        }
        if self.tokens.refresh_ttl_secs < self.tokens.access_ttl_secs {
            return Err(WardenError::Config(
                "refresh_ttl_secs must not be shorter than access_ttl_secs".to_string(),
            ));
        }
        Ok(())
    }
}
