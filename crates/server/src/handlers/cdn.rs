//! Stylesheet CDN.
//!
//! Serves the stylesheet derived from a version's artifact by the
//! post-publish stylesheet hook. Versions without one are 404.

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;
use axum::Json;
use axum::extract::{Path, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use lode_core::TagName;
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct CdnIndex {
    pub name: &'static str,
    pub version: &'static str,
    pub packages: u64,
}

/// GET /cdn
pub async fn cdn_index(State(state): State<AppState>) -> ApiResult<Json<CdnIndex>> {
    Ok(Json(CdnIndex {
        name: "lode-cdn",
        version: env!("CARGO_PKG_VERSION"),
        packages: state.metadata.count_packages().await?,
    }))
}

/// GET /cdn/{name} - Stylesheet of `latest`.
pub async fn cdn_latest(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> ApiResult<Response> {
    serve_stylesheet(&state, &name, TagName::LATEST).await
}

/// GET /cdn/{name}/{version_or_tag}
pub async fn cdn_version(
    State(state): State<AppState>,
    Path((name, key)): Path<(String, String)>,
) -> ApiResult<Response> {
    serve_stylesheet(&state, &name, &key).await
}

async fn serve_stylesheet(
    state: &AppState,
    name: &str,
    key: &str,
) -> ApiResult<Response> {
    let version = state.registry.resolve(name, key).await?;
    let stylesheet = state
        .metadata
        .get_cdn(&version.package, &version.version)
        .await?
        .ok_or_else(|| {
            ApiError::NotFound(format!(
                "no stylesheet for {}@{}",
                version.package, version.version
            ))
        })?;

    let body = format!(
        "/* {}@{} - Served by lode CDN */\n\n{stylesheet}",
        version.package, version.version
    );
    Ok(([(header::CONTENT_TYPE, "text/css; charset=utf-8")], body).into_response())
}
