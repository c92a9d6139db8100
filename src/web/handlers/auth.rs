//! Authentication handlers.

use axum::{
    extract::State,
    http::{header::SET_COOKIE, StatusCode},
    response::{IntoResponse, Response},
    Json,
};

use crate::auth::RegisterInput;
use crate::web::dto::{
    require_not_blank, ApiResponse, ForgotPasswordRequest, LoginRequest, LoginResponse,
    LogoutRequest, MeResponse, RefreshRequest, RegisterRequest, RegisterResponse,
    ResetPasswordRequest, TokensResponse, UserInfo, ValidatedJson, VerifyEmailRequest,
};
use crate::web::error::ApiError;
use crate::web::middleware::{AuthUser, ClientMeta};
use crate::web::state::AppState;

/// Message returned by forgot-password whether or not the account exists.
pub const RESET_REQUESTED_MESSAGE: &str =
    "If an account with that email exists, a password reset link has been sent";

/// POST /api/auth/register - Create an account.
pub async fn register(
    State(state): State<AppState>,
    ClientMeta(client): ClientMeta,
    ValidatedJson(req): ValidatedJson<RegisterRequest>,
) -> Result<(StatusCode, Json<ApiResponse<RegisterResponse>>), ApiError> {
    require_not_blank("name", &req.name)?;

    let registration = state
        .auth
        .register(
            RegisterInput {
                email: req.email,
                password: req.password,
                name: req.name,
            },
            &client,
        )
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::with_message(
            RegisterResponse {
                user: UserInfo::from(&registration.user),
            },
            "Registration successful, please check your email to verify your account",
        )),
    ))
}

/// POST /api/auth/verify-email - Confirm an email address.
pub async fn verify_email(
    State(state): State<AppState>,
    ClientMeta(client): ClientMeta,
    ValidatedJson(req): ValidatedJson<VerifyEmailRequest>,
) -> Result<Json<ApiResponse<UserInfo>>, ApiError> {
    let user = state.auth.verify_email(&req.token, &client).await?;
    Ok(Json(ApiResponse::with_message(
        UserInfo::from(&user),
        "Email verified",
    )))
}

/// POST /api/auth/login - Log in and receive tokens plus a CSRF secret.
pub async fn login(
    State(state): State<AppState>,
    ClientMeta(client): ClientMeta,
    ValidatedJson(req): ValidatedJson<LoginRequest>,
) -> Result<Response, ApiError> {
    let outcome = state.auth.login(&req.email, &req.password, &client).await?;
    let cookie = state.csrf.set_cookie(&outcome.csrf_token);

    let body = LoginResponse {
        user: UserInfo::from(&outcome.user),
        principal: outcome.principal,
        tokens: TokensResponse::from(outcome.tokens),
        csrf_token: outcome.csrf_token,
    };

    Ok(([(SET_COOKIE, cookie)], Json(ApiResponse::new(body))).into_response())
}

/// POST /api/auth/refresh-token - Rotate a refresh token.
pub async fn refresh_token(
    State(state): State<AppState>,
    ClientMeta(client): ClientMeta,
    ValidatedJson(req): ValidatedJson<RefreshRequest>,
) -> Result<Json<ApiResponse<TokensResponse>>, ApiError> {
    let pair = state.auth.refresh_token(&req.refresh_token, &client).await?;
    Ok(Json(ApiResponse::new(TokensResponse::from(pair))))
}

/// POST /api/auth/logout - Revoke the caller's tokens.
pub async fn logout(
    State(state): State<AppState>,
    AuthUser(ctx): AuthUser,
    ClientMeta(client): ClientMeta,
    body: Option<Json<LogoutRequest>>,
) -> Result<Response, ApiError> {
    let Json(req) = body.unwrap_or_default();
    state
        .auth
        .logout(&ctx, req.refresh_token.as_deref(), &client)
        .await?;

    Ok((
        [(SET_COOKIE, state.csrf.clear_cookie())],
        Json(ApiResponse::<()>::message("Logged out")),
    )
        .into_response())
}

/// POST /api/auth/forgot-password - Request a password reset link.
pub async fn forgot_password(
    State(state): State<AppState>,
    ClientMeta(client): ClientMeta,
    ValidatedJson(req): ValidatedJson<ForgotPasswordRequest>,
) -> Result<Json<ApiResponse<()>>, ApiError> {
    state.auth.forgot_password(&req.email, &client).await?;
    Ok(Json(ApiResponse::<()>::message(RESET_REQUESTED_MESSAGE)))
}

/// POST /api/auth/reset-password - Set a new password with a reset token.
pub async fn reset_password(
    State(state): State<AppState>,
    ClientMeta(client): ClientMeta,
    ValidatedJson(req): ValidatedJson<ResetPasswordRequest>,
) -> Result<Json<ApiResponse<()>>, ApiError> {
    state
        .auth
        .reset_password(&req.token, &req.password, &client)
        .await?;
    Ok(Json(ApiResponse::<()>::message(
        "Password has been reset, please log in again",
    )))
}

/// GET /api/auth/me - Current user with role and permissions.
pub async fn me(
    State(state): State<AppState>,
    AuthUser(ctx): AuthUser,
) -> Result<Json<ApiResponse<MeResponse>>, ApiError> {
    let user = state.auth.current_user(&ctx).await?;
    Ok(Json(ApiResponse::new(MeResponse {
        user: UserInfo::from(&user),
        role: ctx.principal.role_name.clone(),
        permissions: ctx.principal.permissions.iter().cloned().collect(),
    })))
}
