//! Service information and health endpoints.

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
}

/// Registry summary.
#[derive(Debug, Serialize)]
pub struct InfoResponse {
    pub name: &'static str,
    pub version: &'static str,
    pub packages: u64,
    pub users: u64,
}

/// GET /v1
pub async fn get_info(State(state): State<AppState>) -> ApiResult<Json<InfoResponse>> {
    Ok(Json(InfoResponse {
        name: "lode",
        version: env!("CARGO_PKG_VERSION"),
        packages: state.metadata.count_packages().await?,
        users: state.metadata.count_users().await?,
    }))
}

/// GET /v1/health
pub async fn health_check(State(state): State<AppState>) -> ApiResult<Json<HealthResponse>> {
    // Check metadata store connectivity
    state.metadata.health_check().await?;

    Ok(Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    }))
}
