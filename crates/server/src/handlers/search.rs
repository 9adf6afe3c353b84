//! Package and user search.

use crate::error::{ApiError, ApiResult};
use crate::handlers::common::format_timestamp;
use crate::state::AppState;
use axum::Json;
use axum::extract::{Query, State};
use lode_metadata::search_pattern;
use serde::{Deserialize, Serialize};

/// Most results a search returns.
pub const MAX_SEARCH_RESULTS: u32 = 100;

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub q: String,
    pub limit: Option<u32>,
}

impl SearchQuery {
    fn pattern(&self) -> ApiResult<String> {
        if self.q.trim().is_empty() {
            return Err(ApiError::BadRequest("search query cannot be empty".to_string()));
        }
        Ok(search_pattern(&self.q))
    }

    fn limit(&self) -> u32 {
        self.limit
            .unwrap_or(MAX_SEARCH_RESULTS)
            .clamp(1, MAX_SEARCH_RESULTS)
    }
}

#[derive(Debug, Serialize)]
pub struct PackageSummary {
    pub name: String,
    pub description: Option<String>,
    pub downloads: i64,
    pub updated_at: String,
}

#[derive(Debug, Serialize)]
pub struct UserSummary {
    pub username: String,
    pub created_at: String,
}

#[derive(Debug, Serialize)]
pub struct SearchResponse<T> {
    pub results: Vec<T>,
}

/// GET /v1/search/package?q=
pub async fn search_packages(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> ApiResult<Json<SearchResponse<PackageSummary>>> {
    let rows = state
        .metadata
        .search_packages(&query.pattern()?, query.limit())
        .await?;

    let results = rows
        .into_iter()
        .map(|p| -> ApiResult<_> {
            Ok(PackageSummary {
                updated_at: format_timestamp(p.updated_at)?,
                name: p.name,
                description: p.description,
                downloads: p.downloads,
            })
        })
        .collect::<ApiResult<Vec<_>>>()?;
    Ok(Json(SearchResponse { results }))
}

/// GET /v1/search/user?q=
pub async fn search_users(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> ApiResult<Json<SearchResponse<UserSummary>>> {
    let rows = state
        .metadata
        .search_users(&query.pattern()?, query.limit())
        .await?;

    let results = rows
        .into_iter()
        .map(|u| -> ApiResult<_> {
            Ok(UserSummary {
                created_at: format_timestamp(u.created_at)?,
                username: u.username,
            })
        })
        .collect::<ApiResult<Vec<_>>>()?;
    Ok(Json(SearchResponse { results }))
}
