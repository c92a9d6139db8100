//! Maintenance mode gate.

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::error;

use crate::auth::AuthContext;
use crate::web::error::ApiError;
use crate::web::state::AppState;

/// Paths reachable while maintenance mode is on, so administrators can
/// still sign in and out.
pub const MAINTENANCE_EXEMPT_PATHS: &[&str] = &[
    "/health",
    "/api/auth/login",
    "/api/auth/refresh-token",
    "/api/auth/logout",
];

/// Refuse non-admin traffic with 503 while maintenance mode is on.
///
/// If the settings cannot be read the request proceeds; the gateway still
/// applies.
pub async fn maintenance_gate(State(state): State<AppState>, req: Request, next: Next) -> Response {
    if MAINTENANCE_EXEMPT_PATHS.contains(&req.uri().path()) {
        return next.run(req).await;
    }

    let settings = match state.settings.get().await {
        Ok(settings) => settings,
        Err(e) => {
            error!(error = %e, "Failed to load platform settings");
            return next.run(req).await;
        }
    };

    let is_admin = req
        .extensions()
        .get::<AuthContext>()
        .is_some_and(|ctx| ctx.principal.is_admin());

    if settings.maintenance_mode && !is_admin {
        return ApiError::unavailable("Service is under maintenance, please try again later")
            .into_response();
    }

    next.run(req).await
}
