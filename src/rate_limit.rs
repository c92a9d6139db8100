//! Per-action request budgets.
//!
//! Each sensitive action gets its own keyed limiter so that, for example,
//! exhausting the login budget does not block registration. Keys are the
//! principal id when known, else the client IP.

use std::collections::HashMap;
use std::fmt;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use governor::{
    clock::{Clock, DefaultClock},
    DefaultKeyedRateLimiter, Quota, RateLimiter,
};
use tracing::debug;

use crate::config::RateLimitSettings;

/// Rate-limited action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RateAction {
    /// Account creation.
    Register,
    /// Password login.
    Login,
    /// Password reset request and submission.
    PasswordReset,
    /// Email verification.
    EmailVerification,
    /// Any other API call.
    Api,
}

impl RateAction {
    /// All actions.
    pub const ALL: [RateAction; 5] = [
        RateAction::Register,
        RateAction::Login,
        RateAction::PasswordReset,
        RateAction::EmailVerification,
        RateAction::Api,
    ];

    /// Stable name for logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            RateAction::Register => "register",
            RateAction::Login => "login",
            RateAction::PasswordReset => "password_reset",
            RateAction::EmailVerification => "email_verification",
            RateAction::Api => "api",
        }
    }

    fn per_minute(&self, settings: &RateLimitSettings) -> u32 {
        match self {
            RateAction::Register => settings.register_per_minute,
            RateAction::Login => settings.login_per_minute,
            RateAction::PasswordReset => settings.password_reset_per_minute,
            RateAction::EmailVerification => settings.email_verification_per_minute,
            RateAction::Api => settings.api_per_minute,
        }
    }
}

impl fmt::Display for RateAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Who a budget belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RateKey {
    /// Authenticated caller.
    Principal(i64),
    /// Anonymous caller by address.
    Ip(String),
}

impl fmt::Display for RateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RateKey::Principal(id) => write!(f, "user:{id}"),
            RateKey::Ip(ip) => write!(f, "ip:{ip}"),
        }
    }
}

/// Keyed limiters, one per action.
pub struct RateGovernor {
    limiters: HashMap<RateAction, DefaultKeyedRateLimiter<RateKey>>,
    clock: DefaultClock,
}

impl RateGovernor {
    /// Build limiters from per-minute budgets. A zero budget is treated as one.
    pub fn new(settings: &RateLimitSettings) -> Self {
        let limiters = RateAction::ALL
            .iter()
            .map(|action| {
                let per_minute =
                    NonZeroU32::new(action.per_minute(settings)).unwrap_or(NonZeroU32::MIN);
                (*action, RateLimiter::keyed(Quota::per_minute(per_minute)))
            })
            .collect();

        Self {
            limiters,
            clock: DefaultClock::default(),
        }
    }

    /// Spend one unit of `action` budget for `key`.
    ///
    /// Returns how long to wait when the budget is exhausted.
    pub fn check(&self, action: RateAction, key: &RateKey) -> Result<(), Duration> {
        let Some(limiter) = self.limiters.get(&action) else {
            return Ok(());
        };
        limiter
            .check_key(key)
            .map_err(|not_until| not_until.wait_time_from(self.clock.now()))
    }

    /// Forget keys whose budget has fully replenished.
    pub fn cleanup(&self) {
        for (action, limiter) in &self.limiters {
            limiter.retain_recent();
            limiter.shrink_to_fit();
            debug!(action = %action, keys = limiter.len(), "Rate limiter cleanup");
        }
    }

    /// Run [`RateGovernor::cleanup`] periodically in the background.
    pub fn start_cleanup_task(self: Arc<Self>, every: Duration) {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(every);
            interval.tick().await;
            loop {
                interval.tick().await;
                self.cleanup();
            }
        });
    }
}

/// Round a wait up to whole seconds for `Retry-After`, at least one.
pub fn retry_after_secs(wait: Duration) -> u64 {
    let secs = wait.as_secs() + u64::from(wait.subsec_nanos() > 0);
    secs.max(1)
}
