//! Admin handlers.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use tracing::info;

use crate::audit::{SecurityEvent, SecurityEventKind};
use crate::db::NewBan;
use crate::timeout::bounded;
use crate::web::dto::{
    require_not_blank, ApiResponse, BanResponse, CreateBanRequest, FieldError, MaintenanceRequest,
    MaintenanceResponse, ValidatedJson,
};
use crate::web::error::ApiError;
use crate::web::middleware::{AuthUser, ClientMeta};
use crate::web::state::AppState;

/// POST /api/admin/users/:id/bans - Ban a user.
///
/// With `expiresAt` the ban is temporary, otherwise permanent.
pub async fn create_ban(
    State(state): State<AppState>,
    AuthUser(ctx): AuthUser,
    ClientMeta(client): ClientMeta,
    Path(user_id): Path<i64>,
    ValidatedJson(req): ValidatedJson<CreateBanRequest>,
) -> Result<(StatusCode, Json<ApiResponse<BanResponse>>), ApiError> {
    require_not_blank("reason", &req.reason)?;
    if matches!(req.expires_at, Some(at) if at <= Utc::now()) {
        return Err(ApiError::validation(vec![FieldError {
            field: "expiresAt".to_string(),
            message: "Must be in the future".to_string(),
        }]));
    }

    let target = bounded(
        state.store_timeout,
        "credential store",
        state.store.find_user_by_id(user_id),
    )
    .await?;
    if target.is_none() {
        return Err(ApiError::not_found("User not found"));
    }

    let new_ban = NewBan {
        user_id,
        reason: req.reason.trim().to_string(),
        expires_at: req.expires_at,
        created_by: Some(ctx.principal.id),
    };
    let ban = bounded(
        state.store_timeout,
        "credential store",
        state.store.create_ban(&new_ban),
    )
    .await?;

    info!(
        ban_id = ban.id,
        user_id,
        admin_id = ctx.principal.id,
        ban_type = %ban.ban_type,
        "Ban issued"
    );
    let event = client.stamp(
        SecurityEvent::success(SecurityEventKind::BanIssued)
            .actor(ctx.principal.id)
            .detail(format!("user {user_id}, {}", ban.ban_type)),
    );
    state.events.record(event).await;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::with_message(
            BanResponse::from(ban),
            "Ban issued",
        )),
    ))
}

/// GET /api/admin/settings/maintenance - Read the maintenance flag.
pub async fn get_maintenance(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<MaintenanceResponse>>, ApiError> {
    let settings = state.settings.get().await?;
    Ok(Json(ApiResponse::new(MaintenanceResponse {
        maintenance_mode: settings.maintenance_mode,
    })))
}

/// PUT /api/admin/settings/maintenance - Toggle maintenance mode.
pub async fn set_maintenance(
    State(state): State<AppState>,
    AuthUser(ctx): AuthUser,
    ValidatedJson(req): ValidatedJson<MaintenanceRequest>,
) -> Result<Json<ApiResponse<MaintenanceResponse>>, ApiError> {
    state.settings.set_maintenance_mode(req.enabled).await?;
    info!(
        admin_id = ctx.principal.id,
        enabled = req.enabled,
        "Maintenance mode changed"
    );

    Ok(Json(ApiResponse::new(MaintenanceResponse {
        maintenance_mode: req.enabled,
    })))
}
