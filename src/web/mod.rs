//! HTTP surface for warden.
//!
//! A JSON API over the account service, with the gateway, CSRF guard, rate
//! limits and maintenance gate applied as middleware.

pub mod dto;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod router;
pub mod server;
pub mod state;

pub use error::ApiError;
pub use router::create_router;
pub use server::WebServer;
pub use state::{AppState, Collaborators};
