//! Route-level role and permission requirements.

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::warn;

use crate::auth::{require_permissions, require_roles, AuthContext, AuthError};
use crate::logging::SECURITY_TARGET;
use crate::web::error::ApiError;

/// What a route demands of its caller.
///
/// Roles are any-of; permissions are all-of.
#[derive(Debug, Clone, Copy, Default)]
pub struct Requirement {
    roles: &'static [&'static str],
    permissions: &'static [&'static str],
}

impl Requirement {
    /// Require one of `roles`.
    pub const fn roles(roles: &'static [&'static str]) -> Self {
        Self {
            roles,
            permissions: &[],
        }
    }

    /// Require every one of `permissions`.
    pub const fn permissions(permissions: &'static [&'static str]) -> Self {
        Self {
            roles: &[],
            permissions,
        }
    }

    /// Add a permission requirement.
    pub const fn and_permissions(self, permissions: &'static [&'static str]) -> Self {
        Self {
            roles: self.roles,
            permissions,
        }
    }

    fn check(&self, ctx: Option<&AuthContext>) -> Result<(), AuthError> {
        let principal = ctx.map(|ctx| &ctx.principal);
        if !self.roles.is_empty() {
            require_roles(principal, self.roles)?;
        }
        if !self.permissions.is_empty() {
            require_permissions(principal, self.permissions)?;
        }
        if principal.is_none() {
            return Err(AuthError::Unauthenticated);
        }
        Ok(())
    }
}

/// Enforce a [`Requirement`] on the authenticated principal.
pub async fn authorize(State(requirement): State<Requirement>, req: Request, next: Next) -> Response {
    let user_id = req
        .extensions()
        .get::<AuthContext>()
        .map(|ctx| ctx.principal.id);

    if let Err(err) = requirement.check(req.extensions().get::<AuthContext>()) {
        warn!(
            target: SECURITY_TARGET,
            user_id,
            path = %req.uri().path(),
            error = %err,
            "Authorization denied"
        );
        return ApiError::from(err).into_response();
    }

    next.run(req).await
}
