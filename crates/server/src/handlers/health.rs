//! Liveness endpoint.

use crate::error::ApiResult;
use crate::state::AppState;
use axum::Json;
use axum::extract::State;
use serde::Serialize;

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    /// Name of the blob storage backend.
    pub storage: &'static str,
    /// Whether manifests are signed.
    pub signing: bool,
}

/// GET /v1/health
pub async fn health_check(State(state): State<AppState>) -> ApiResult<Json<HealthResponse>> {
    Ok(Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        storage: state.store().backend_name(),
        signing: state.key_manager().is_some(),
    }))
}
