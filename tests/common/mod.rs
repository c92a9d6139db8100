//! Shared helpers for API integration tests.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::http::header::{AUTHORIZATION, COOKIE};
use axum::http::HeaderName;
use axum_test::{TestRequest, TestServer};
use serde_json::{json, Value};

use warden::audit::{SecurityEvent, SecurityEventKind, SecurityEventSink};
use warden::auth::Argon2Hasher;
use warden::cache::MemoryCache;
use warden::config::{Config, PasswordConfig};
use warden::mailer::{MailKind, Mailer, OutboundMail};
use warden::web::create_router;
use warden::{AppState, Collaborators, Database};

/// Password used by every test account.
pub const PASSWORD: &str = "Sw0rdfish!pass";

/// CSRF header name under the default configuration.
pub const CSRF_HEADER: HeaderName = HeaderName::from_static("x-csrf-token");

/// Mailer that keeps every message.
#[derive(Default)]
pub struct RecordingMailer {
    sent: Mutex<Vec<OutboundMail>>,
}

impl RecordingMailer {
    /// Token of the latest message of `kind` sent to `to`.
    pub fn last_token(&self, kind: MailKind, to: &str) -> Option<String> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|m| m.kind == kind && m.to == to)
            .map(|m| m.token.clone())
    }

    /// Number of messages sent.
    pub fn count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }

    /// Like [`RecordingMailer::last_token`], for mail sent in the background.
    pub async fn wait_for_token(&self, kind: MailKind, to: &str) -> Option<String> {
        for _ in 0..100 {
            if let Some(token) = self.last_token(kind, to) {
                return Some(token);
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        None
    }

    /// Wait until at least `n` messages have been sent.
    pub async fn wait_for_count(&self, n: usize) -> usize {
        for _ in 0..100 {
            if self.count() >= n {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        self.count()
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, mail: &OutboundMail) -> warden::Result<()> {
        self.sent.lock().unwrap().push(mail.clone());
        Ok(())
    }
}

/// Event sink that keeps every event.
#[derive(Default)]
pub struct RecordingSink {
    events: Mutex<Vec<SecurityEvent>>,
}

impl RecordingSink {
    /// Number of events of `kind`.
    pub fn count(&self, kind: SecurityEventKind) -> usize {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.kind == kind)
            .count()
    }
}

#[async_trait]
impl SecurityEventSink for RecordingSink {
    async fn record(&self, event: SecurityEvent) {
        self.events.lock().unwrap().push(event);
    }
}

/// A running test application.
pub struct TestApp {
    pub server: TestServer,
    pub db: Database,
    pub cache: Arc<MemoryCache>,
    pub mailer: Arc<RecordingMailer>,
    pub events: Arc<RecordingSink>,
    pub state: AppState,
}

/// Configuration with a signing secret and generous budgets.
pub fn test_config() -> Config {
    let mut config = Config::default();
    config.tokens.secret = "test-secret-key-for-testing-only-0123456789".to_string();
    config.rate_limit.register_per_minute = 1000;
    config.rate_limit.login_per_minute = 1000;
    config.rate_limit.password_reset_per_minute = 1000;
    config.rate_limit.email_verification_per_minute = 1000;
    config.rate_limit.api_per_minute = 1000;
    config.settings.cache_ttl_secs = 0;
    config
}

/// Start an application with the default test configuration.
pub async fn spawn_app() -> TestApp {
    spawn_app_with(test_config()).await
}

/// Start an application with `config`.
pub async fn spawn_app_with(config: Config) -> TestApp {
    let db = Database::open_in_memory()
        .await
        .expect("Failed to create test database");
    let cache = Arc::new(MemoryCache::new());
    let mailer = Arc::new(RecordingMailer::default());
    let events = Arc::new(RecordingSink::default());
    let hasher = Argon2Hasher::new(&PasswordConfig {
        memory_kib: 1024,
        iterations: 1,
        parallelism: 1,
    })
    .expect("Failed to create hasher");

    let state = AppState::new(
        &config,
        Collaborators {
            store: Arc::new(db.clone()),
            cache: cache.clone(),
            mailer: mailer.clone(),
            hasher: Arc::new(hasher),
            events: events.clone(),
        },
    )
    .expect("Failed to build state");

    let router = create_router(state.clone(), &config.server.cors_origins);
    let server = TestServer::new(router).expect("Failed to create test server");

    TestApp {
        server,
        db,
        cache,
        mailer,
        events,
        state,
    }
}

/// Tokens of a logged-in session.
#[derive(Debug, Clone)]
pub struct Session {
    pub user_id: i64,
    pub access: String,
    pub refresh: String,
    pub csrf: String,
}

impl TestApp {
    /// Register an account and return its ID.
    pub async fn register(&self, email: &str) -> i64 {
        let response = self
            .server
            .post("/api/auth/register")
            .json(&json!({
                "email": email,
                "password": PASSWORD,
                "name": "Test User"
            }))
            .await;
        response.assert_status(axum::http::StatusCode::CREATED);
        response.json::<Value>()["data"]["user"]["id"]
            .as_i64()
            .expect("user id")
    }

    /// Register and verify an account, returning its ID.
    pub async fn register_verified(&self, email: &str) -> i64 {
        let id = self.register(email).await;
        let token = self
            .mailer
            .last_token(MailKind::Verification, email)
            .expect("verification mail");
        self.server
            .post("/api/auth/verify-email")
            .json(&json!({ "token": token }))
            .await
            .assert_status_ok();
        id
    }

    /// Log in and return the session.
    pub async fn login(&self, email: &str) -> Session {
        let response = self
            .server
            .post("/api/auth/login")
            .json(&json!({ "email": email, "password": PASSWORD }))
            .await;
        response.assert_status_ok();
        let body: Value = response.json();
        Session {
            user_id: body["data"]["user"]["id"].as_i64().expect("user id"),
            access: body["data"]["tokens"]["accessToken"]
                .as_str()
                .expect("access token")
                .to_string(),
            refresh: body["data"]["tokens"]["refreshToken"]
                .as_str()
                .expect("refresh token")
                .to_string(),
            csrf: body["data"]["csrfToken"]
                .as_str()
                .expect("csrf token")
                .to_string(),
        }
    }

    /// Register, verify and log in.
    pub async fn signed_in(&self, email: &str) -> Session {
        self.register_verified(email).await;
        self.login(email).await
    }

    /// Give a user the admin role.
    pub async fn make_admin(&self, user_id: i64) {
        sqlx::query("UPDATE users SET role_id = 3 WHERE id = ?")
            .bind(user_id)
            .execute(self.db.pool())
            .await
            .expect("Failed to promote user");
    }
}

/// Attach bearer, CSRF header and CSRF cookie for `session`.
pub fn with_session(request: TestRequest, session: &Session) -> TestRequest {
    request
        .add_header(AUTHORIZATION, format!("Bearer {}", session.access))
        .add_header(CSRF_HEADER, session.csrf.clone())
        .add_header(COOKIE, format!("__csrf={}", session.csrf))
}

/// Attach only the bearer token.
pub fn with_bearer(request: TestRequest, access: &str) -> TestRequest {
    request.add_header(AUTHORIZATION, format!("Bearer {access}"))
}
