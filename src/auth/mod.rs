//! Authentication module for warden.
//!
//! Token minting and revocation, the per-request gateway, role and
//! permission checks, CSRF protection, password hashing and the account
//! service that ties them together.

mod csrf;
mod error;
mod gateway;
mod password;
mod rbac;
mod service;
mod token;

pub use csrf::{is_state_changing, CsrfGuard};
pub use error::{AuthError, BanInfo, ErrorClass};
pub use gateway::{extract_bearer, AuthContext, Authenticator, Principal};
pub use password::{
    validate_password, Argon2Hasher, PasswordError, SecretHasher, MAX_PASSWORD_LENGTH,
    MIN_PASSWORD_LENGTH,
};
pub use rbac::{require_permissions, require_roles};
pub use service::{
    AuthService, AuthServiceDeps, ClientInfo, LoginOutcome, RegisterInput, Registration,
};
pub use token::{Claims, IssuedToken, Rotation, TokenKind, TokenPair, TokenService};
