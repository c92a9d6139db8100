//! warden - authentication and session security core.
//!
//! Issues and rotates signed access and refresh tokens, revokes them
//! through a shared cache, authenticates every protected request, enforces
//! roles and permissions, bans, CSRF double-submit and per-action rate
//! limits, and runs the account lifecycle (registration, email
//! verification, login, logout, password reset) over a JSON HTTP API.

pub mod audit;
pub mod auth;
pub mod cache;
pub mod config;
pub mod db;
pub mod error;
pub mod logging;
pub mod mailer;
pub mod rate_limit;
pub mod settings;
pub mod timeout;
pub mod web;

pub use audit::{SecurityEvent, SecurityEventKind, SecurityEventSink};
pub use auth::{
    AuthContext, AuthError, AuthService, Authenticator, CsrfGuard, Principal, TokenService,
};
pub use cache::{MemoryCache, RevocationCache};
pub use config::Config;
pub use db::{Ban, BanType, CredentialStore, Database, NewBan, NewUser, Role, User};
pub use error::{Result, WardenError};
pub use web::{AppState, Collaborators, WebServer};
