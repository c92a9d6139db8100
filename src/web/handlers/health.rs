//! Health check.

use axum::Json;

use crate::web::dto::{ApiResponse, HealthResponse};

/// GET /health - Liveness check.
pub async fn health() -> Json<ApiResponse<HealthResponse>> {
    Json(ApiResponse::new(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    }))
}
