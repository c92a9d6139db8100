//! Security event emission.
//!
//! Events are append-only observations. Sinks swallow their own failures:
//! a broken audit trail is logged loudly, but never turns a successful login
//! into an error or a rejected request into an accepted one.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::db::{Database, SecurityEventRepository};
use crate::logging::SECURITY_TARGET;

/// What happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SecurityEventKind {
    /// New identity created.
    Registration,
    /// Email address confirmed.
    EmailVerification,
    /// Login attempt.
    Login,
    /// Session ended.
    Logout,
    /// Refresh token exchanged.
    TokenRefresh,
    /// A spent refresh token was presented again.
    RefreshTokenReuse,
    /// Password reset requested.
    PasswordResetRequest,
    /// Password replaced through a reset token.
    PasswordReset,
    /// Request rejected by the gateway.
    AccessDenied,
    /// Request rejected by the CSRF guard.
    CsrfRejected,
    /// Request budget exceeded.
    RateLimited,
    /// Ban issued by an administrator.
    BanIssued,
    /// A collaborator failed while deciding a request.
    DependencyFailure,
}

impl SecurityEventKind {
    /// Stable string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            SecurityEventKind::Registration => "registration",
            SecurityEventKind::EmailVerification => "email_verification",
            SecurityEventKind::Login => "login",
            SecurityEventKind::Logout => "logout",
            SecurityEventKind::TokenRefresh => "token_refresh",
            SecurityEventKind::RefreshTokenReuse => "refresh_token_reuse",
            SecurityEventKind::PasswordResetRequest => "password_reset_request",
            SecurityEventKind::PasswordReset => "password_reset",
            SecurityEventKind::AccessDenied => "access_denied",
            SecurityEventKind::CsrfRejected => "csrf_rejected",
            SecurityEventKind::RateLimited => "rate_limited",
            SecurityEventKind::BanIssued => "ban_issued",
            SecurityEventKind::DependencyFailure => "dependency_failure",
        }
    }
}

impl fmt::Display for SecurityEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of the observed action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    /// The action went through.
    Success,
    /// The action was refused.
    Failure,
}

impl Outcome {
    /// Stable string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Success => "success",
            Outcome::Failure => "failure",
        }
    }
}

/// A single audit observation.
#[derive(Debug, Clone, Serialize)]
pub struct SecurityEvent {
    /// When it happened.
    pub occurred_at: DateTime<Utc>,
    /// What happened.
    pub kind: SecurityEventKind,
    /// Acting user, when known.
    pub actor_id: Option<i64>,
    /// Client address.
    pub ip: Option<String>,
    /// Client `User-Agent`.
    pub user_agent: Option<String>,
    /// Request path.
    pub path: Option<String>,
    /// Result.
    pub outcome: Outcome,
    /// Free-form detail (never secrets).
    pub detail: Option<String>,
}

impl SecurityEvent {
    /// Start an event stamped with the current time.
    pub fn new(kind: SecurityEventKind, outcome: Outcome) -> Self {
        Self {
            occurred_at: Utc::now(),
            kind,
            actor_id: None,
            ip: None,
            user_agent: None,
            path: None,
            outcome,
            detail: None,
        }
    }

    /// Shorthand for a successful event.
    pub fn success(kind: SecurityEventKind) -> Self {
        Self::new(kind, Outcome::Success)
    }

    /// Shorthand for a failed event.
    pub fn failure(kind: SecurityEventKind) -> Self {
        Self::new(kind, Outcome::Failure)
    }

    /// Set the acting user.
    pub fn actor(mut self, actor_id: i64) -> Self {
        self.actor_id = Some(actor_id);
        self
    }

    /// Set the client address.
    pub fn ip(mut self, ip: impl Into<String>) -> Self {
        self.ip = Some(ip.into());
        self
    }

    /// Set the client user agent.
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    /// Set the request path.
    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Attach detail.
    pub fn detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

/// Append-only destination for security events.
#[async_trait]
pub trait SecurityEventSink: Send + Sync {
    /// Record an event. Must not fail the caller.
    async fn record(&self, event: SecurityEvent);
}

/// Sink writing events to the `security` log target.
#[derive(Debug, Default, Clone)]
pub struct TracingEventSink;

#[async_trait]
impl SecurityEventSink for TracingEventSink {
    async fn record(&self, event: SecurityEvent) {
        match event.outcome {
            Outcome::Success => tracing::info!(
                target: SECURITY_TARGET,
                kind = %event.kind,
                actor_id = ?event.actor_id,
                ip = ?event.ip,
                user_agent = ?event.user_agent,
                path = ?event.path,
                outcome = event.outcome.as_str(),
                detail = ?event.detail,
                "security event"
            ),
            Outcome::Failure => tracing::warn!(
                target: SECURITY_TARGET,
                kind = %event.kind,
                actor_id = ?event.actor_id,
                ip = ?event.ip,
                user_agent = ?event.user_agent,
                path = ?event.path,
                outcome = event.outcome.as_str(),
                detail = ?event.detail,
                "security event"
            ),
        }
    }
}

/// Sink appending events to the `security_events` table.
#[derive(Debug, Clone)]
pub struct DatabaseEventSink {
    db: Database,
}

impl DatabaseEventSink {
    /// Create a sink over the given database.
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

#[async_trait]
impl SecurityEventSink for DatabaseEventSink {
    async fn record(&self, event: SecurityEvent) {
        let repo = SecurityEventRepository::new(self.db.pool());
        if let Err(e) = repo.append(&event).await {
            tracing::error!(error = %e, kind = %event.kind, "Failed to persist security event");
        }
    }
}

/// Sink forwarding every event to several sinks in order.
#[derive(Clone, Default)]
pub struct FanoutEventSink {
    sinks: Vec<Arc<dyn SecurityEventSink>>,
}

impl FanoutEventSink {
    /// Create an empty fan-out.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a destination.
    pub fn with(mut self, sink: Arc<dyn SecurityEventSink>) -> Self {
        self.sinks.push(sink);
        self
    }
}

#[async_trait]
impl SecurityEventSink for FanoutEventSink {
    async fn record(&self, event: SecurityEvent) {
        for sink in &self.sinks {
            sink.record(event.clone()).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_builder() {
        let event = SecurityEvent::failure(SecurityEventKind::Login)
            .actor(7)
            .ip("10.0.0.1")
            .user_agent("curl/8")
            .path("/api/auth/login")
            .detail("bad password");

        assert_eq!(event.kind, SecurityEventKind::Login);
        assert_eq!(event.outcome, Outcome::Failure);
        assert_eq!(event.actor_id, Some(7));
        assert_eq!(event.ip.as_deref(), Some("10.0.0.1"));
        assert_eq!(event.user_agent.as_deref(), Some("curl/8"));
        assert_eq!(event.path.as_deref(), Some("/api/auth/login"));
        assert_eq!(event.detail.as_deref(), Some("bad password"));
    }

    #[test]
    fn test_kind_strings() {
        assert_eq!(SecurityEventKind::RefreshTokenReuse.as_str(), "refresh_token_reuse");
        assert_eq!(SecurityEventKind::Login.to_string(), "login");
    }

    #[tokio::test]
    async fn test_database_sink_appends() {
        let db = Database::open_in_memory().await.unwrap();
        let sink = FanoutEventSink::new()
            .with(Arc::new(TracingEventSink))
            .with(Arc::new(DatabaseEventSink::new(db.clone())));

        sink.record(SecurityEvent::success(SecurityEventKind::Registration).actor(1))
            .await;
        sink.record(SecurityEvent::failure(SecurityEventKind::Login).ip("127.0.0.1"))
            .await;

        let repo = SecurityEventRepository::new(db.pool());
        assert_eq!(repo.count().await.unwrap(), 2);
        assert_eq!(
            repo.count_by_kind(SecurityEventKind::Login).await.unwrap(),
            1
        );
    }
}
