//! Middleware for the HTTP surface.

pub mod auth;
pub mod client;
pub mod cors;
pub mod csrf;
pub mod maintenance;
pub mod rate_limit;
pub mod rbac;
pub mod security;

pub use auth::{identify, require_auth, AuthUser};
pub use client::{client_info, client_ip, ClientMeta};
pub use cors::create_cors_layer;
pub use csrf::csrf_protect;
pub use maintenance::{maintenance_gate, MAINTENANCE_EXEMPT_PATHS};
pub use rate_limit::{action_for_path, rate_limit};
pub use rbac::{authorize, Requirement};
pub use security::security_headers;
