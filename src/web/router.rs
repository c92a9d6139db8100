//! Router configuration.
//!
//! Anonymous routes run rate limit, then CSRF, then the maintenance gate.
//! Protected routes identify the caller, charge the rate limit (by
//! principal, or by IP when the token is bad), then reject unauthenticated
//! requests before CSRF and the maintenance gate.

use axum::{
    middleware::{self, from_fn_with_state},
    routing::{get, post},
    Router,
};
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

use super::handlers::{
    create_ban, forgot_password, get_maintenance, health, login, logout, me, refresh_token,
    register, reset_password, set_maintenance, verify_email,
};
use super::middleware::{
    authorize, create_cors_layer, csrf_protect, identify, maintenance_gate, rate_limit,
    require_auth, security_headers, Requirement,
};
use super::state::AppState;

const BAN_USERS: Requirement = Requirement::roles(&["admin"]).and_permissions(&["users:ban"]);
const MANAGE_SETTINGS: Requirement = Requirement::permissions(&["settings:write"]);

/// Create the application router.
pub fn create_router(state: AppState, cors_origins: &[String]) -> Router {
    let public_routes = Router::new()
        .route("/api/auth/register", post(register))
        .route("/api/auth/verify-email", post(verify_email))
        .route("/api/auth/login", post(login))
        .route("/api/auth/refresh-token", post(refresh_token))
        .route("/api/auth/forgot-password", post(forgot_password))
        .route("/api/auth/reset-password", post(reset_password))
        .route_layer(from_fn_with_state(state.clone(), maintenance_gate))
        .route_layer(from_fn_with_state(state.clone(), csrf_protect))
        .route_layer(from_fn_with_state(state.clone(), rate_limit));

    let protected_routes = Router::new()
        .route("/api/auth/logout", post(logout))
        .route("/api/auth/me", get(me))
        .route(
            "/api/admin/users/:id/bans",
            post(create_ban).route_layer(from_fn_with_state(BAN_USERS, authorize)),
        )
        .route(
            "/api/admin/settings/maintenance",
            get(get_maintenance)
                .put(set_maintenance)
                .route_layer(from_fn_with_state(MANAGE_SETTINGS, authorize)),
        )
        .route_layer(from_fn_with_state(state.clone(), maintenance_gate))
        .route_layer(from_fn_with_state(state.clone(), csrf_protect))
        .route_layer(from_fn_with_state(state.clone(), require_auth))
        .route_layer(from_fn_with_state(state.clone(), rate_limit))
        .route_layer(from_fn_with_state(state.clone(), identify));

    let csrf_header = state.csrf.header_name().to_string();

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .route("/health", get(health))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(create_cors_layer(cors_origins, &csrf_header))
                .layer(middleware::from_fn(security_headers)),
        )
        .with_state(state)
}
