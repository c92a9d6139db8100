//! CSRF double-submit middleware.

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use axum_extra::extract::cookie::CookieJar;

use super::client::client_info;
use crate::audit::{SecurityEvent, SecurityEventKind};
use crate::auth::AuthContext;
use crate::web::error::ApiError;
use crate::web::state::AppState;

/// Verify the CSRF header against the cookie, and against the stored hash
/// when the caller is authenticated.
///
/// Safe methods and exempt paths pass through untouched.
pub async fn csrf_protect(State(state): State<AppState>, req: Request, next: Next) -> Response {
    if !state.csrf.requires_check(req.method(), req.uri().path()) {
        return next.run(req).await;
    }

    let header = req
        .headers()
        .get(state.csrf.header_name())
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let cookie = CookieJar::from_headers(req.headers())
        .get(state.csrf.cookie_name())
        .map(|c| c.value().to_string());
    let user_id = req
        .extensions()
        .get::<AuthContext>()
        .map(|ctx| ctx.principal.id);

    match state
        .csrf
        .validate(header.as_deref(), cookie.as_deref(), user_id)
        .await
    {
        Ok(()) => next.run(req).await,
        Err(err) => {
            let client = client_info(
                req.headers(),
                req.extensions(),
                req.uri().path(),
                state.trust_proxy,
            );
            let mut event = client.stamp(
                SecurityEvent::failure(SecurityEventKind::CsrfRejected).detail(err.to_string()),
            );
            if let Some(id) = user_id {
                event = event.actor(id);
            }
            state.events.record(event).await;
            ApiError::from(err).into_response()
        }
    }
}
