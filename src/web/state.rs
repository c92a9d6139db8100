//! Shared application state.

use std::sync::Arc;
use std::time::Duration;

use crate::audit::{DatabaseEventSink, FanoutEventSink, SecurityEventSink, TracingEventSink};
use crate::auth::{
    Argon2Hasher, AuthService, AuthServiceDeps, Authenticator, CsrfGuard, SecretHasher,
    TokenService,
};
use crate::cache::{self, RevocationCache};
use crate::config::Config;
use crate::db::{CredentialStore, Database};
use crate::mailer::{self, MailComposer, Mailer};
use crate::rate_limit::RateGovernor;
use crate::settings::SettingsCache;
use crate::{Result, WardenError};

/// External collaborators the HTTP surface is wired to.
pub struct Collaborators {
    /// Credential store.
    pub store: Arc<dyn CredentialStore>,
    /// Revocation cache.
    pub cache: Arc<dyn RevocationCache>,
    /// Mail transport.
    pub mailer: Arc<dyn Mailer>,
    /// Password hasher.
    pub hasher: Arc<dyn SecretHasher>,
    /// Security event sink.
    pub events: Arc<dyn SecurityEventSink>,
}

impl Collaborators {
    /// Open the database and connect every production collaborator.
    ///
    /// Security events go both to the log and to the database.
    pub async fn from_config(config: &Config) -> Result<Self> {
        let db = Database::open(&config.database.path, config.database.max_connections).await?;
        let cache = cache::connect(&config.cache).await?;
        let mailer = mailer::from_config(&config.mail)?;
        let hasher =
            Argon2Hasher::new(&config.password).map_err(|e| WardenError::Config(e.to_string()))?;

        let events = FanoutEventSink::new()
            .with(Arc::new(TracingEventSink))
            .with(Arc::new(DatabaseEventSink::new(db.clone())));

        Ok(Self {
            store: Arc::new(db),
            cache,
            mailer,
            hasher: Arc::new(hasher),
            events: Arc::new(events),
        })
    }
}

/// Application state shared across handlers and middleware.
#[derive(Clone)]
pub struct AppState {
    /// Account and session operations.
    pub auth: Arc<AuthService>,
    /// Per-request authentication.
    pub gateway: Arc<Authenticator>,
    /// CSRF guard.
    pub csrf: Arc<CsrfGuard>,
    /// Request budgets.
    pub governor: Arc<RateGovernor>,
    /// Cached platform settings.
    pub settings: Arc<SettingsCache>,
    /// Revocation cache, for background maintenance.
    pub cache: Arc<dyn RevocationCache>,
    /// Credential store, for admin operations.
    pub store: Arc<dyn CredentialStore>,
    /// Security event sink.
    pub events: Arc<dyn SecurityEventSink>,
    /// Deadline for store calls made directly by handlers.
    pub store_timeout: Duration,
    /// Read the client address from proxy headers.
    pub trust_proxy: bool,
}

impl AppState {
    /// Wire every component from configuration and collaborators.
    pub fn new(config: &Config, deps: Collaborators) -> Result<Self> {
        let timeouts = config.timeouts.clone();

        let tokens = Arc::new(TokenService::new(
            config.tokens.clone(),
            deps.cache.clone(),
            timeouts.cache(),
        ));
        let csrf = Arc::new(CsrfGuard::new(
            deps.cache.clone(),
            config.csrf.clone(),
            config.server.secure_cookies,
            timeouts.cache(),
        ));
        let gateway = Arc::new(Authenticator::new(
            tokens.clone(),
            deps.store.clone(),
            timeouts.store(),
        ));
        let composer = MailComposer::new(&config.server.public_url, config.mail.from.clone())?;

        let auth = Arc::new(AuthService::new(
            AuthServiceDeps {
                store: deps.store.clone(),
                tokens,
                hasher: deps.hasher,
                csrf: csrf.clone(),
                mailer: deps.mailer,
                composer,
                events: deps.events.clone(),
            },
            timeouts.clone(),
            config.login.require_verified_email,
        ));

        let settings = Arc::new(SettingsCache::new(
            deps.store.clone(),
            Duration::from_secs(config.settings.cache_ttl_secs),
            timeouts.store(),
        ));

        Ok(Self {
            auth,
            gateway,
            csrf,
            governor: Arc::new(RateGovernor::new(&config.rate_limit)),
            settings,
            cache: deps.cache,
            store: deps.store,
            events: deps.events,
            store_timeout: timeouts.store(),
            trust_proxy: config.server.trust_proxy,
        })
    }
}
