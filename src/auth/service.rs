//! Account and session orchestration.

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::OnceCell;
use tracing::{error, info, warn};

use super::{
    validate_password, AuthContext, AuthError, BanInfo, CsrfGuard, Principal, SecretHasher,
    TokenKind, TokenPair, TokenService,
};
use crate::audit::{SecurityEvent, SecurityEventKind, SecurityEventSink};
use crate::config::TimeoutConfig;
use crate::db::{normalize_email, CredentialStore, NewUser, User};
use crate::mailer::{MailComposer, Mailer, OutboundMail};
use crate::timeout::bounded;
use crate::WardenError;

/// Where a request came from.
#[derive(Debug, Clone, Default)]
pub struct ClientInfo {
    /// Client address.
    pub ip: Option<String>,
    /// `User-Agent` header.
    pub user_agent: Option<String>,
    /// Request path.
    pub path: Option<String>,
}

impl ClientInfo {
    /// Copy the client details onto an event.
    pub fn stamp(&self, mut event: SecurityEvent) -> SecurityEvent {
        if let Some(ip) = &self.ip {
            event = event.ip(ip.clone());
        }
        if let Some(user_agent) = &self.user_agent {
            event = event.user_agent(user_agent.clone());
        }
        if let Some(path) = &self.path {
            event = event.path(path.clone());
        }
        event
    }
}

/// Registration input.
#[derive(Debug, Clone)]
pub struct RegisterInput {
    /// Login email.
    pub email: String,
    /// Plain-text password.
    pub password: String,
    /// Display name.
    pub name: String,
}

/// Result of a registration.
#[derive(Debug, Clone)]
pub struct Registration {
    /// The created user.
    pub user: User,
    /// The verification token that was mailed.
    pub verification_token: String,
}

/// Result of a successful login.
#[derive(Debug, Clone)]
pub struct LoginOutcome {
    /// The logged-in principal.
    pub principal: Principal,
    /// The user record.
    pub user: User,
    /// Issued tokens.
    pub tokens: TokenPair,
    /// CSRF secret to hand to the browser.
    pub csrf_token: String,
}

/// Collaborators of [`AuthService`].
pub struct AuthServiceDeps {
    /// Identity persistence.
    pub store: Arc<dyn CredentialStore>,
    /// Token minting and revocation.
    pub tokens: Arc<TokenService>,
    /// Password hashing.
    pub hasher: Arc<dyn SecretHasher>,
    /// CSRF secret issuance.
    pub csrf: Arc<CsrfGuard>,
    /// Mail transport.
    pub mailer: Arc<dyn Mailer>,
    /// Message builder.
    pub composer: MailComposer,
    /// Audit trail.
    pub events: Arc<dyn SecurityEventSink>,
}

/// Registration, verification, login, refresh, logout and password reset.
pub struct AuthService {
    store: Arc<dyn CredentialStore>,
    tokens: Arc<TokenService>,
    hasher: Arc<dyn SecretHasher>,
    csrf: Arc<CsrfGuard>,
    mailer: Arc<dyn Mailer>,
    composer: MailComposer,
    events: Arc<dyn SecurityEventSink>,
    timeouts: TimeoutConfig,
    require_verified_email: bool,
    dummy_digest: OnceCell<String>,
}

impl AuthService {
    /// Create the service.
    pub fn new(deps: AuthServiceDeps, timeouts: TimeoutConfig, require_verified_email: bool) -> Self {
        Self {
            store: deps.store,
            tokens: deps.tokens,
            hasher: deps.hasher,
            csrf: deps.csrf,
            mailer: deps.mailer,
            composer: deps.composer,
            events: deps.events,
            timeouts,
            require_verified_email,
            dummy_digest: OnceCell::new(),
        }
    }

    /// The token service used by this instance.
    pub fn tokens(&self) -> &Arc<TokenService> {
        &self.tokens
    }

    async fn record(&self, client: &ClientInfo, event: SecurityEvent) {
        self.events.record(client.stamp(event)).await;
    }

    async fn send_mail(&self, mail: &OutboundMail) -> Result<(), WardenError> {
        bounded(self.timeouts.mail(), "mailer", self.mailer.send(mail)).await
    }

    /// Deliver mail without holding up the caller.
    fn dispatch_mail(&self, mail: OutboundMail, user_id: i64) {
        let mailer = Arc::clone(&self.mailer);
        let limit = self.timeouts.mail();
        tokio::spawn(async move {
            if let Err(e) = bounded(limit, "mailer", mailer.send(&mail)).await {
                error!(error = %e, user_id, kind = ?mail.kind, "Failed to send mail");
            }
        });
    }

    /// Spend the same hashing work as a real password check.
    ///
    /// Keeps an unknown email as slow as a wrong password.
    async fn verify_dummy(&self, password: &str) {
        let digest = self
            .dummy_digest
            .get_or_try_init(|| async {
                let secret = format!("{:032x}", rand::random::<u128>());
                self.hasher.hash(&secret).await
            })
            .await;

        match digest {
            Ok(digest) => {
                let _ = self.hasher.verify(password, digest).await;
            }
            Err(e) => warn!(error = %e, "Failed to prepare dummy password digest"),
        }
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, AuthError> {
        Ok(bounded(
            self.timeouts.store(),
            "credential store",
            self.store.find_user_by_email(email),
        )
        .await?)
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<User>, AuthError> {
        Ok(bounded(
            self.timeouts.store(),
            "credential store",
            self.store.find_user_by_id(id),
        )
        .await?)
    }

    /// Create an unverified identity and mail a verification link.
    ///
    /// A mail failure is logged but does not undo the registration.
    pub async fn register(
        &self,
        input: RegisterInput,
        client: &ClientInfo,
    ) -> Result<Registration, AuthError> {
        validate_password(&input.password)?;
        let email = normalize_email(&input.email);
        let store_timeout = self.timeouts.store();

        if bounded(store_timeout, "credential store", self.store.email_exists(&email)).await? {
            self.record(
                client,
                SecurityEvent::failure(SecurityEventKind::Registration).detail("email taken"),
            )
            .await;
            return Err(AuthError::EmailTaken);
        }

        let password_hash = self.hasher.hash(&input.password).await?;
        let new_user = NewUser::new(email, password_hash, input.name.trim());

        let user = match bounded(store_timeout, "credential store", self.store.create_user(&new_user))
            .await
        {
            Ok(user) => user,
            // Lost a race with a concurrent registration of the same email.
            Err(WardenError::Database(msg)) if msg.contains("UNIQUE") => {
                return Err(AuthError::EmailTaken)
            }
            Err(e) => return Err(e.into()),
        };

        let token = self
            .tokens
            .issue_purpose(user.id, TokenKind::EmailVerification)?
            .token;

        match self.composer.verification(&user.email, &user.name, &token) {
            Ok(mail) => {
                if let Err(e) = self.send_mail(&mail).await {
                    error!(error = %e, user_id = user.id, "Failed to send verification mail");
                    self.record(
                        client,
                        SecurityEvent::failure(SecurityEventKind::DependencyFailure)
                            .actor(user.id)
                            .detail("verification mail not sent"),
                    )
                    .await;
                }
            }
            Err(e) => error!(error = %e, "Failed to compose verification mail"),
        }

        info!(user_id = user.id, "User registered");
        self.record(
            client,
            SecurityEvent::success(SecurityEventKind::Registration).actor(user.id),
        )
        .await;

        Ok(Registration {
            user,
            verification_token: token,
        })
    }

    /// Confirm an email address. Verifying twice succeeds.
    pub async fn verify_email(&self, token: &str, client: &ClientInfo) -> Result<User, AuthError> {
        let claims = self
            .tokens
            .verify_purpose(token, TokenKind::EmailVerification)
            .map_err(|_| AuthError::InvalidOrExpiredToken)?;

        let mut user = self
            .find_by_id(claims.sub)
            .await?
            .ok_or(AuthError::InvalidOrExpiredToken)?;

        if !user.email_verified {
            bounded(
                self.timeouts.store(),
                "credential store",
                self.store.mark_email_verified(user.id),
            )
            .await?;
            user.email_verified = true;
            self.record(
                client,
                SecurityEvent::success(SecurityEventKind::EmailVerification).actor(user.id),
            )
            .await;
        }

        Ok(user)
    }

    /// Authenticate with email and password.
    pub async fn login(
        &self,
        email: &str,
        password: &str,
        client: &ClientInfo,
    ) -> Result<LoginOutcome, AuthError> {
        let email = normalize_email(email);
        let store_timeout = self.timeouts.store();

        let Some(user) = self.find_by_email(&email).await? else {
            self.verify_dummy(password).await;
            self.record(
                client,
                SecurityEvent::failure(SecurityEventKind::Login).detail("unknown email"),
            )
            .await;
            return Err(AuthError::InvalidCredentials);
        };

        if !self.hasher.verify(password, &user.password_hash).await? {
            self.record(
                client,
                SecurityEvent::failure(SecurityEventKind::Login)
                    .actor(user.id)
                    .detail("wrong password"),
            )
            .await;
            return Err(AuthError::InvalidCredentials);
        }

        if !user.is_active {
            self.record(
                client,
                SecurityEvent::failure(SecurityEventKind::Login)
                    .actor(user.id)
                    .detail("account disabled"),
            )
            .await;
            return Err(AuthError::AccountDisabled);
        }

        if self.require_verified_email && !user.email_verified {
            return Err(AuthError::EmailNotVerified);
        }

        let ban = bounded(
            store_timeout,
            "credential store",
            self.store.find_active_ban(user.id, Utc::now()),
        )
        .await?;
        if let Some(ban) = ban {
            self.record(
                client,
                SecurityEvent::failure(SecurityEventKind::Login)
                    .actor(user.id)
                    .detail("banned"),
            )
            .await;
            return Err(AuthError::Banned(BanInfo::from(&ban)));
        }

        let role = bounded(store_timeout, "credential store", self.store.find_role(user.role_id))
            .await?
            .ok_or_else(|| {
                AuthError::Dependency(format!("role {} not found", user.role_id))
            })?;

        let tokens = self.tokens.issue_pair(user.id)?;
        let csrf_token = self.csrf.issue(user.id).await?;

        if let Err(e) = bounded(
            store_timeout,
            "credential store",
            self.store.update_last_login(user.id),
        )
        .await
        {
            warn!(error = %e, user_id = user.id, "Failed to record last login");
        }

        info!(user_id = user.id, "User logged in");
        self.record(
            client,
            SecurityEvent::success(SecurityEventKind::Login).actor(user.id),
        )
        .await;

        Ok(LoginOutcome {
            principal: Principal::new(&user, role),
            user,
            tokens,
            csrf_token,
        })
    }

    /// Exchange a refresh token for a new pair.
    pub async fn refresh_token(
        &self,
        refresh_token: &str,
        client: &ClientInfo,
    ) -> Result<TokenPair, AuthError> {
        match self.tokens.rotate_refresh_token(refresh_token).await {
            Ok(rotation) => {
                self.record(
                    client,
                    SecurityEvent::success(SecurityEventKind::TokenRefresh)
                        .actor(rotation.user_id),
                )
                .await;
                Ok(rotation.pair)
            }
            Err(AuthError::TokenReuse) => {
                let mut event = SecurityEvent::failure(SecurityEventKind::RefreshTokenReuse);
                if let Ok(claims) = self.tokens.verify_refresh(refresh_token) {
                    event = event.actor(claims.sub);
                }
                self.record(client, event).await;
                Err(AuthError::TokenReuse)
            }
            Err(e) => Err(e),
        }
    }

    /// Revoke the caller's access token and, if given, their refresh token.
    ///
    /// Idempotent: revoking an already revoked token succeeds.
    pub async fn logout(
        &self,
        ctx: &AuthContext,
        refresh_token: Option<&str>,
        client: &ClientInfo,
    ) -> Result<(), AuthError> {
        self.tokens.revoke(&ctx.token, ctx.claims.exp).await?;

        if let Some(refresh_token) = refresh_token {
            match self.tokens.verify_refresh(refresh_token) {
                Ok(claims) if claims.sub == ctx.principal.id => {
                    self.tokens.revoke(refresh_token, claims.exp).await?;
                }
                _ => warn!(
                    user_id = ctx.principal.id,
                    "Ignoring refresh token that does not belong to the caller"
                ),
            }
        }

        self.record(
            client,
            SecurityEvent::success(SecurityEventKind::Logout).actor(ctx.principal.id),
        )
        .await;
        Ok(())
    }

    /// Start a password reset.
    ///
    /// The outcome is identical whether or not the email exists.
    pub async fn forgot_password(&self, email: &str, client: &ClientInfo) -> Result<(), AuthError> {
        let email = normalize_email(email);

        let user = match self.find_by_email(&email).await? {
            Some(user) if user.is_active => user,
            _ => {
                self.record(
                    client,
                    SecurityEvent::failure(SecurityEventKind::PasswordResetRequest)
                        .detail("no matching account"),
                )
                .await;
                return Ok(());
            }
        };

        let token = self.tokens.issue_purpose(user.id, TokenKind::PasswordReset)?;
        // Sent in the background so a known email answers as fast as an
        // unknown one.
        match self.composer.password_reset(&user.email, &user.name, &token.token) {
            Ok(mail) => self.dispatch_mail(mail, user.id),
            Err(e) => error!(error = %e, "Failed to compose reset mail"),
        }

        self.record(
            client,
            SecurityEvent::success(SecurityEventKind::PasswordResetRequest).actor(user.id),
        )
        .await;
        Ok(())
    }

    /// Set a new password with a reset token and end every session.
    pub async fn reset_password(
        &self,
        token: &str,
        new_password: &str,
        client: &ClientInfo,
    ) -> Result<(), AuthError> {
        validate_password(new_password)?;

        let claims = self
            .tokens
            .verify_purpose(token, TokenKind::PasswordReset)
            .map_err(|_| AuthError::InvalidOrExpiredToken)?;

        // A reset token dies with every other token at the previous reset.
        if self.tokens.is_revoked_for_subject(&claims).await? {
            return Err(AuthError::InvalidOrExpiredToken);
        }

        let user = self
            .find_by_id(claims.sub)
            .await?
            .filter(|user| user.is_active)
            .ok_or(AuthError::InvalidOrExpiredToken)?;

        if !self.tokens.consume(token, claims.exp).await? {
            self.record(
                client,
                SecurityEvent::failure(SecurityEventKind::PasswordReset)
                    .actor(user.id)
                    .detail("reset token reused"),
            )
            .await;
            return Err(AuthError::InvalidOrExpiredToken);
        }

        let password_hash = self.hasher.hash(new_password).await?;
        bounded(
            self.timeouts.store(),
            "credential store",
            self.store.update_password(user.id, &password_hash),
        )
        .await?;

        self.tokens.revoke_all_for_subject(user.id).await?;

        info!(user_id = user.id, "Password reset, all sessions revoked");
        self.record(
            client,
            SecurityEvent::success(SecurityEventKind::PasswordReset).actor(user.id),
        )
        .await;
        Ok(())
    }

    /// Load the caller's user record.
    pub async fn current_user(&self, ctx: &AuthContext) -> Result<User, AuthError> {
        self.find_by_id(ctx.principal.id)
            .await?
            .ok_or(AuthError::UserUnavailable)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    use async_trait::async_trait;
    use tokio::sync::Notify;

    use crate::auth::{Argon2Hasher, PasswordError};
    use crate::cache::{MemoryCache, RevocationCache};
    use crate::config::{CsrfConfig, PasswordConfig, TokenConfig};
    use crate::db::Database;
    use crate::Result;

    const PASSWORD: &str = "Sw0rdfish!pass";

    #[derive(Default)]
    struct Events(Mutex<Vec<SecurityEvent>>);

    impl Events {
        fn count(&self, kind: SecurityEventKind) -> usize {
            self.0.lock().unwrap().iter().filter(|e| e.kind == kind).count()
        }

        fn last(&self, kind: SecurityEventKind) -> Option<SecurityEvent> {
            self.0
                .lock()
                .unwrap()
                .iter()
                .rev()
                .find(|e| e.kind == kind)
                .cloned()
        }
    }

    #[async_trait]
    impl SecurityEventSink for Events {
        async fn record(&self, event: SecurityEvent) {
            self.0.lock().unwrap().push(event);
        }
    }

    struct CountingHasher {
        inner: Argon2Hasher,
        verifies: AtomicUsize,
    }

    #[async_trait]
    impl SecretHasher for CountingHasher {
        async fn hash(&self, secret: &str) -> std::result::Result<String, PasswordError> {
            self.inner.hash(secret).await
        }

        async fn verify(
            &self,
            secret: &str,
            digest: &str,
        ) -> std::result::Result<bool, PasswordError> {
            self.verifies.fetch_add(1, Ordering::SeqCst);
            self.inner.verify(secret, digest).await
        }
    }

    /// Holds every message until released.
    #[derive(Default)]
    struct GatedMailer {
        gate: Notify,
        sent: Mutex<Vec<OutboundMail>>,
    }

    #[async_trait]
    impl Mailer for GatedMailer {
        async fn send(&self, mail: &OutboundMail) -> Result<()> {
            self.gate.notified().await;
            self.sent.lock().unwrap().push(mail.clone());
            Ok(())
        }
    }

    struct DownMailer;

    #[async_trait]
    impl Mailer for DownMailer {
        async fn send(&self, _mail: &OutboundMail) -> Result<()> {
            Err(WardenError::Mail("connection refused".to_string()))
        }
    }

    #[derive(Default)]
    struct Outbox(Mutex<Vec<OutboundMail>>);

    #[async_trait]
    impl Mailer for Outbox {
        async fn send(&self, mail: &OutboundMail) -> Result<()> {
            self.0.lock().unwrap().push(mail.clone());
            Ok(())
        }
    }

    struct DownCache;

    #[async_trait]
    impl RevocationCache for DownCache {
        async fn get(&self, _key: &str) -> Result<Option<String>> {
            Err(WardenError::Cache("unreachable".to_string()))
        }
        async fn set_ex(&self, _key: &str, _value: &str, _ttl: Duration) -> Result<()> {
            Err(WardenError::Cache("unreachable".to_string()))
        }
        async fn set_nx_ex(&self, _key: &str, _value: &str, _ttl: Duration) -> Result<bool> {
            Err(WardenError::Cache("unreachable".to_string()))
        }
        async fn delete(&self, _key: &str) -> Result<()> {
            Err(WardenError::Cache("unreachable".to_string()))
        }
    }

    struct Fixture {
        service: AuthService,
        events: Arc<Events>,
        hasher: Arc<CountingHasher>,
        db: Database,
    }

    async fn fixture(
        cache: Arc<dyn RevocationCache>,
        mailer: Arc<dyn Mailer>,
        require_verified_email: bool,
    ) -> Fixture {
        let db = Database::open_in_memory().await.unwrap();
        let timeouts = TimeoutConfig::default();
        let tokens = Arc::new(TokenService::new(
            TokenConfig {
                secret: "0123456789abcdef0123456789abcdef".to_string(),
                ..TokenConfig::default()
            },
            cache.clone(),
            timeouts.cache(),
        ));
        let csrf = Arc::new(CsrfGuard::new(
            cache,
            CsrfConfig::default(),
            false,
            timeouts.cache(),
        ));
        let hasher = Arc::new(CountingHasher {
            inner: Argon2Hasher::new(&PasswordConfig {
                memory_kib: 1024,
                iterations: 1,
                parallelism: 1,
            })
            .unwrap(),
            verifies: AtomicUsize::new(0),
        });
        let events = Arc::new(Events::default());

        let service = AuthService::new(
            AuthServiceDeps {
                store: Arc::new(db.clone()),
                tokens,
                hasher: hasher.clone(),
                csrf,
                mailer,
                composer: MailComposer::new("http://localhost:8080", "noreply@example.com")
                    .unwrap(),
                events: events.clone(),
            },
            timeouts,
            require_verified_email,
        );

        Fixture {
            service,
            events,
            hasher,
            db,
        }
    }

    fn input(email: &str) -> RegisterInput {
        RegisterInput {
            email: email.to_string(),
            password: PASSWORD.to_string(),
            name: "Test".to_string(),
        }
    }

    #[tokio::test]
    async fn test_register_survives_mail_failure() {
        let f = fixture(Arc::new(MemoryCache::new()), Arc::new(DownMailer), true).await;

        let registration = f
            .service
            .register(input("alice@example.com"), &ClientInfo::default())
            .await
            .unwrap();

        assert!(!registration.user.email_verified);
        assert!(!registration.verification_token.is_empty());
        assert_eq!(f.events.count(SecurityEventKind::DependencyFailure), 1);
        assert_eq!(f.events.count(SecurityEventKind::Registration), 1);
    }

    #[tokio::test]
    async fn test_register_rejects_weak_password() {
        let f = fixture(Arc::new(MemoryCache::new()), Arc::new(Outbox::default()), true).await;

        let mut weak = input("bob@example.com");
        weak.password = "short".to_string();
        let err = f
            .service
            .register(weak, &ClientInfo::default())
            .await
            .unwrap_err();

        assert!(matches!(err, AuthError::Validation(ref fields) if fields.contains_key("password")));
    }

    #[tokio::test]
    async fn test_unverified_login_allowed_when_not_required() {
        let f = fixture(Arc::new(MemoryCache::new()), Arc::new(Outbox::default()), false).await;
        let client = ClientInfo::default();
        f.service
            .register(input("carol@example.com"), &client)
            .await
            .unwrap();

        let outcome = f
            .service
            .login("Carol@Example.com", PASSWORD, &client)
            .await
            .unwrap();

        assert_eq!(outcome.user.email, "carol@example.com");
        assert_eq!(outcome.principal.role_name, "student");
        assert_eq!(outcome.csrf_token.len(), 64);
    }

    #[tokio::test]
    async fn test_login_fails_closed_when_cache_down() {
        let f = fixture(Arc::new(DownCache), Arc::new(Outbox::default()), false).await;
        let client = ClientInfo::default();
        f.service
            .register(input("dave@example.com"), &client)
            .await
            .unwrap();

        let err = f
            .service
            .login("dave@example.com", PASSWORD, &client)
            .await
            .unwrap_err();

        assert!(matches!(err, AuthError::Dependency(_)));
    }

    #[tokio::test]
    async fn test_logout_ignores_foreign_refresh_token() {
        let f = fixture(Arc::new(MemoryCache::new()), Arc::new(Outbox::default()), false).await;
        let client = ClientInfo::default();
        f.service.register(input("erin@example.com"), &client).await.unwrap();
        f.service.register(input("frank@example.com"), &client).await.unwrap();

        let erin = f.service.login("erin@example.com", PASSWORD, &client).await.unwrap();
        let frank = f.service.login("frank@example.com", PASSWORD, &client).await.unwrap();

        let claims = f.service.tokens().verify_access(&erin.tokens.access.token).unwrap();
        let ctx = AuthContext {
            principal: erin.principal.clone(),
            token: erin.tokens.access.token.clone(),
            claims,
        };
        f.service
            .logout(&ctx, Some(&frank.tokens.refresh.token), &client)
            .await
            .unwrap();

        assert!(f
            .service
            .tokens()
            .is_blacklisted(&erin.tokens.access.token)
            .await
            .unwrap());
        assert!(f
            .service
            .refresh_token(&frank.tokens.refresh.token, &client)
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_forgot_password_unknown_email_is_ok() {
        let outbox = Arc::new(Outbox::default());
        let f = fixture(Arc::new(MemoryCache::new()), outbox.clone(), true).await;

        f.service
            .forgot_password("ghost@example.com", &ClientInfo::default())
            .await
            .unwrap();

        assert!(outbox.0.lock().unwrap().is_empty());
        assert_eq!(f.events.count(SecurityEventKind::PasswordResetRequest), 1);
    }

    #[tokio::test]
    async fn test_unknown_email_costs_a_password_check() {
        let f = fixture(Arc::new(MemoryCache::new()), Arc::new(Outbox::default()), false).await;
        let client = ClientInfo::default();
        f.service
            .register(input("ivy@example.com"), &client)
            .await
            .unwrap();

        let err = f
            .service
            .login("nobody@example.com", PASSWORD, &client)
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::InvalidCredentials));
        assert_eq!(f.hasher.verifies.load(Ordering::SeqCst), 1);

        let err = f
            .service
            .login("ivy@example.com", "WrongPass123", &client)
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::InvalidCredentials));
        assert_eq!(f.hasher.verifies.load(Ordering::SeqCst), 2);

        f.service
            .login("nobody@example.com", PASSWORD, &client)
            .await
            .unwrap_err();
        assert_eq!(f.hasher.verifies.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_forgot_password_does_not_wait_for_mail() {
        let mailer = Arc::new(GatedMailer::default());
        let f = fixture(Arc::new(MemoryCache::new()), mailer.clone(), true).await;
        f.db
            .create_user(&NewUser::new("judy@example.com", "digest", "Judy"))
            .await
            .unwrap();

        let result = tokio::time::timeout(
            Duration::from_secs(2),
            f.service
                .forgot_password("judy@example.com", &ClientInfo::default()),
        )
        .await;
        assert!(matches!(result, Ok(Ok(()))));
        assert!(mailer.sent.lock().unwrap().is_empty());

        mailer.gate.notify_one();
        for _ in 0..100 {
            if !mailer.sent.lock().unwrap().is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        let sent = mailer.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].to, "judy@example.com");
    }

    #[tokio::test]
    async fn test_events_carry_user_agent() {
        let f = fixture(Arc::new(MemoryCache::new()), Arc::new(Outbox::default()), false).await;
        let client = ClientInfo {
            ip: Some("198.51.100.7".to_string()),
            user_agent: Some("Mozilla/5.0".to_string()),
            path: Some("/api/auth/login".to_string()),
        };
        f.service
            .register(input("kim@example.com"), &client)
            .await
            .unwrap();
        f.service
            .login("kim@example.com", PASSWORD, &client)
            .await
            .unwrap();

        let event = f.events.last(SecurityEventKind::Login).unwrap();
        assert_eq!(event.user_agent.as_deref(), Some("Mozilla/5.0"));
        assert_eq!(event.ip.as_deref(), Some("198.51.100.7"));
    }
}
