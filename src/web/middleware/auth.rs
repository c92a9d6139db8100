//! Authentication gateway middleware.
//!
//! Split in two so the rate limiter can sit between them: [`identify`]
//! runs the gateway and records its verdict, [`require_auth`] turns a
//! failed verdict into the response.

use axum::{
    async_trait,
    extract::{FromRequestParts, Request, State},
    http::{header::AUTHORIZATION, request::Parts},
    middleware::Next,
    response::{IntoResponse, Response},
};

use super::client::client_info;
use crate::audit::{SecurityEvent, SecurityEventKind};
use crate::auth::{AuthContext, AuthError};
use crate::web::error::ApiError;
use crate::web::state::AppState;

/// Why the gateway refused the request.
#[derive(Debug, Clone)]
struct AuthRejection(AuthError);

/// Authenticate the request without rejecting it.
///
/// On success the [`AuthContext`] is attached; on failure the gateway
/// error is kept for [`require_auth`].
pub async fn identify(State(state): State<AppState>, mut req: Request, next: Next) -> Response {
    let authorization = req
        .headers()
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    match state.gateway.authenticate(authorization.as_deref()).await {
        Ok(ctx) => {
            req.extensions_mut().insert(ctx);
        }
        Err(err) => {
            req.extensions_mut().insert(AuthRejection(err));
        }
    }

    next.run(req).await
}

/// Refuse requests [`identify`] could not authenticate.
///
/// Nothing downstream runs without a principal.
pub async fn require_auth(State(state): State<AppState>, req: Request, next: Next) -> Response {
    if req.extensions().get::<AuthContext>().is_some() {
        return next.run(req).await;
    }

    let err = req
        .extensions()
        .get::<AuthRejection>()
        .map(|rejection| rejection.0.clone())
        .unwrap_or(AuthError::MissingToken);
    let client = client_info(
        req.headers(),
        req.extensions(),
        req.uri().path(),
        state.trust_proxy,
    );

    state
        .events
        .record(client.stamp(
            SecurityEvent::failure(SecurityEventKind::AccessDenied).detail(err.to_string()),
        ))
        .await;
    ApiError::from(err).into_response()
}

/// Extractor for the authenticated caller.
///
/// Only valid behind [`require_auth`]; elsewhere it rejects with 401.
#[derive(Debug, Clone)]
pub struct AuthUser(pub AuthContext);

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthContext>()
            .cloned()
            .map(AuthUser)
            .ok_or_else(|| AuthError::Unauthenticated.into())
    }
}
