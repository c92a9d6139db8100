//! Rate limiting middleware.

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::warn;

use super::client::client_ip;
use crate::audit::{SecurityEvent, SecurityEventKind};
use crate::auth::{AuthContext, AuthError};
use crate::rate_limit::{RateAction, RateKey};
use crate::web::error::ApiError;
use crate::web::state::AppState;

/// Budget a request path is charged against.
pub fn action_for_path(path: &str) -> RateAction {
    match path {
        "/api/auth/register" => RateAction::Register,
        "/api/auth/login" => RateAction::Login,
        "/api/auth/forgot-password" | "/api/auth/reset-password" => RateAction::PasswordReset,
        "/api/auth/verify-email" => RateAction::EmailVerification,
        _ => RateAction::Api,
    }
}

/// Charge the request against its action budget.
///
/// Authenticated requests are keyed by principal id, anonymous ones by
/// client IP. On protected routes this runs after [`identify`] and before
/// [`require_auth`], so callers without a valid token are still charged.
///
/// [`identify`]: super::identify
/// [`require_auth`]: super::require_auth
pub async fn rate_limit(State(state): State<AppState>, req: Request, next: Next) -> Response {
    let action = action_for_path(req.uri().path());
    let key = match req.extensions().get::<AuthContext>() {
        Some(ctx) => RateKey::Principal(ctx.principal.id),
        None => RateKey::Ip(
            client_ip(req.headers(), req.extensions(), state.trust_proxy)
                .unwrap_or_else(|| "unknown".to_string()),
        ),
    };

    match state.governor.check(action, &key) {
        Ok(()) => next.run(req).await,
        Err(retry_after) => {
            warn!(
                action = action.as_str(),
                key = %key,
                path = %req.uri().path(),
                "Rate limit exceeded"
            );

            let mut event = SecurityEvent::failure(SecurityEventKind::RateLimited)
                .path(req.uri().path())
                .detail(action.as_str());
            match &key {
                RateKey::Principal(id) => event = event.actor(*id),
                RateKey::Ip(ip) => event = event.ip(ip.clone()),
            }
            state.events.record(event).await;

            ApiError::from(AuthError::RateLimited { retry_after }).into_response()
        }
    }
}
