//! Package endpoints: views, publish, unpublish, tags and authors.

use crate::auth::require_auth;
use crate::error::{ApiError, ApiResult};
use crate::handlers::common::{format_timestamp, read_json};
use crate::registry::PublishRequest;
use crate::state::AppState;
use axum::Json;
use axum::body::Body;
use axum::extract::{FromRequest, Multipart, Path, Request, State};
use axum::http::{StatusCode, header};
use axum::response::Response;
use bytes::Bytes;
use lode_core::PackageName;
use lode_metadata::models::{PackageDetail, VersionRow};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Header carrying the artifact's hex SHA-256.
pub const CHECKSUM_HEADER: &str = "x-checksum-sha256";

/// Where a version's artifact can be fetched and how to check it.
#[derive(Debug, Serialize)]
pub struct Dist {
    pub shasum: String,
    pub url: String,
}

#[derive(Debug, Serialize)]
pub struct VersionView {
    pub version: String,
    pub manifest: Value,
    pub readme: String,
    pub size: i64,
    /// Whether a stylesheet is served from the CDN for this version.
    pub cdn: bool,
    pub created_at: String,
    pub dist: Dist,
}

#[derive(Debug, Serialize)]
pub struct PackageView {
    pub name: String,
    pub description: Option<String>,
    pub downloads: i64,
    pub weekly_downloads: i64,
    pub created_at: String,
    pub updated_at: String,
    /// Tag name to version.
    pub tags: BTreeMap<String, String>,
    pub authors: Vec<String>,
    pub versions: BTreeMap<String, VersionView>,
}

#[derive(Debug, Serialize)]
pub struct PublishResponse {
    pub name: String,
    pub version: String,
    /// The publish brought the package into existence.
    pub created: bool,
    pub dist: Dist,
}

#[derive(Debug, Serialize)]
pub struct UnpublishResponse {
    pub name: String,
    pub version: String,
    /// New target of `latest`, when it moved.
    pub latest: Option<String>,
    pub package_deleted: bool,
}

#[derive(Debug, Serialize)]
pub struct DeletePackageResponse {
    pub name: String,
    pub versions_deleted: u64,
}

#[derive(Deserialize)]
pub struct SetTagRequest {
    pub version: String,
}

#[derive(Debug, Serialize)]
pub struct TagResponse {
    pub name: String,
    pub tag: String,
    pub version: String,
}

#[derive(Debug, Serialize)]
pub struct AuthorsResponse {
    pub name: String,
    pub authors: Vec<String>,
}

fn version_view(state: &AppState, row: VersionRow) -> ApiResult<VersionView> {
    let manifest: Value = serde_json::from_str(&row.manifest)
        .map_err(|e| ApiError::Internal(format!("stored manifest is corrupt: {e}")))?;
    Ok(VersionView {
        dist: Dist {
            url: state.dist_url(&row.package, &row.version),
            shasum: row.shasum,
        },
        created_at: format_timestamp(row.created_at)?,
        version: row.version,
        manifest,
        readme: row.readme,
        size: row.size_bytes,
        cdn: row.has_cdn,
    })
}

async fn authors_of(state: &AppState, package: &str) -> ApiResult<Vec<String>> {
    Ok(state
        .metadata
        .list_authors(package)
        .await?
        .into_iter()
        .map(|a| a.username)
        .collect())
}

/// GET /v1/package/{name}
pub async fn get_package(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> ApiResult<Json<PackageView>> {
    let name = PackageName::parse(&name)?;
    let PackageDetail {
        package,
        versions,
        tags,
        authors,
    } = state
        .metadata
        .get_package_detail(name.as_str())
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("package '{name}' not found")))?;

    let tags = tags.into_iter().map(|t| (t.name, t.version)).collect();
    let authors = authors.into_iter().map(|a| a.username).collect();
    let versions = versions
        .into_iter()
        .map(|row| -> ApiResult<_> { Ok((row.version.clone(), version_view(&state, row)?)) })
        .collect::<ApiResult<BTreeMap<_, _>>>()?;

    Ok(Json(PackageView {
        name: package.name,
        description: package.description,
        downloads: package.downloads,
        weekly_downloads: package.weekly_downloads,
        created_at: format_timestamp(package.created_at)?,
        updated_at: format_timestamp(package.updated_at)?,
        tags,
        authors,
        versions,
    }))
}

/// GET /v1/package/{name}/{version_or_tag} - Artifact bytes.
pub async fn get_artifact(
    State(state): State<AppState>,
    Path((name, key)): Path<(String, String)>,
) -> ApiResult<Response> {
    let artifact = state.registry.fetch_artifact(&name, &key).await?;
    tracing::debug!(
        package = %artifact.package,
        version = %artifact.version,
        "serving artifact"
    );

    let disposition = format!(
        "attachment; filename=\"{}-{}.tgz\"",
        artifact.package, artifact.version
    );
    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "application/octet-stream")
        .header(header::CONTENT_DISPOSITION, disposition)
        .header(CHECKSUM_HEADER, &artifact.shasum)
        .body(Body::from(artifact.artifact))
        .map_err(|e| ApiError::Internal(format!("failed to build response: {e}")))
}

/// Fields of a publish form.
struct PublishForm {
    manifest: Value,
    artifact: Bytes,
    readme: Option<String>,
}

async fn read_publish_form(mut multipart: Multipart, max_size: u64) -> ApiResult<PublishForm> {
    let mut manifest = None;
    let mut artifact = None;
    let mut readme = None;

    let bad_field = |e: axum::extract::multipart::MultipartError| {
        ApiError::BadRequest(format!("malformed form: {}", e.body_text()))
    };

    while let Some(field) = multipart.next_field().await.map_err(bad_field)? {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("package") => {
                let text = field.text().await.map_err(bad_field)?;
                let value: Value = serde_json::from_str(&text)
                    .map_err(|e| ApiError::BadRequest(format!("invalid package JSON: {e}")))?;
                manifest = Some(value);
            }
            Some("dist") => {
                artifact = Some(field.bytes().await.map_err(bad_field)?);
            }
            Some("readme") => {
                readme = Some(field.text().await.map_err(bad_field)?);
            }
            other => {
                tracing::debug!(field = ?other, "ignoring unknown publish field");
            }
        }
    }

    let manifest =
        manifest.ok_or_else(|| ApiError::BadRequest("missing 'package' field".to_string()))?;
    let artifact =
        artifact.ok_or_else(|| ApiError::BadRequest("missing 'dist' field".to_string()))?;
    if artifact.len() as u64 > max_size {
        return Err(ApiError::BadRequest(format!(
            "artifact exceeds {max_size} bytes"
        )));
    }

    Ok(PublishForm {
        manifest,
        artifact,
        readme,
    })
}

/// POST /v1/package/{name} - Publish a version (multipart form).
pub async fn publish(
    State(state): State<AppState>,
    Path(name): Path<String>,
    req: Request,
) -> ApiResult<(StatusCode, Json<PublishResponse>)> {
    let principal = require_auth(&req)?;
    let multipart = Multipart::from_request(req, &state)
        .await
        .map_err(|e| ApiError::BadRequest(format!("expected multipart form: {}", e.body_text())))?;
    let form = read_publish_form(multipart, state.config.server.max_artifact_size).await?;

    let outcome = state
        .registry
        .publish(
            PublishRequest {
                package: name,
                manifest: form.manifest,
                artifact: form.artifact,
                readme: form.readme,
            },
            &principal,
        )
        .await?;

    let version = outcome.version;
    Ok((
        StatusCode::CREATED,
        Json(PublishResponse {
            dist: Dist {
                url: state.dist_url(&version.package, &version.version),
                shasum: version.shasum,
            },
            name: version.package,
            version: version.version,
            created: outcome.package_created,
        }),
    ))
}

/// DELETE /v1/package/{name}
pub async fn delete_package(
    State(state): State<AppState>,
    Path(name): Path<String>,
    req: Request,
) -> ApiResult<Json<DeletePackageResponse>> {
    let principal = require_auth(&req)?;
    let stats = state.registry.delete_package(&name, &principal).await?;
    Ok(Json(DeletePackageResponse {
        name: PackageName::parse(&name)?.to_string(),
        versions_deleted: stats.versions,
    }))
}

/// DELETE /v1/package/{name}/{version}
pub async fn unpublish(
    State(state): State<AppState>,
    Path((name, version)): Path<(String, String)>,
    req: Request,
) -> ApiResult<Json<UnpublishResponse>> {
    let principal = require_auth(&req)?;
    let outcome = state
        .registry
        .unpublish(&name, &version, &principal)
        .await?;
    Ok(Json(UnpublishResponse {
        name: PackageName::parse(&name)?.to_string(),
        version: version.trim().to_string(),
        latest: outcome.latest_reelected,
        package_deleted: outcome.package_destroyed,
    }))
}

/// POST /v1/package/{name}/tag/{tag} - Create or repoint a tag.
pub async fn set_tag(
    State(state): State<AppState>,
    Path((name, tag)): Path<(String, String)>,
    req: Request,
) -> ApiResult<Json<TagResponse>> {
    let principal = require_auth(&req)?;
    let body: SetTagRequest = read_json(req).await?;
    let row = state
        .registry
        .set_tag(&name, &tag, &body.version, &principal)
        .await?;
    Ok(Json(TagResponse {
        name: row.package,
        tag: row.name,
        version: row.version,
    }))
}

/// DELETE /v1/package/{name}/tag/{tag}
pub async fn remove_tag(
    State(state): State<AppState>,
    Path((name, tag)): Path<(String, String)>,
    req: Request,
) -> ApiResult<StatusCode> {
    let principal = require_auth(&req)?;
    state.registry.remove_tag(&name, &tag, &principal).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /v1/package/{name}/author/{user}
pub async fn add_author(
    State(state): State<AppState>,
    Path((name, user)): Path<(String, String)>,
    req: Request,
) -> ApiResult<Json<AuthorsResponse>> {
    let principal = require_auth(&req)?;
    state.registry.add_author(&name, &user, &principal).await?;
    let name = PackageName::parse(&name)?.to_string();
    let authors = authors_of(&state, &name).await?;
    Ok(Json(AuthorsResponse { name, authors }))
}

/// DELETE /v1/package/{name}/author/{user}
pub async fn remove_author(
    State(state): State<AppState>,
    Path((name, user)): Path<(String, String)>,
    req: Request,
) -> ApiResult<Json<AuthorsResponse>> {
    let principal = require_auth(&req)?;
    state
        .registry
        .remove_author(&name, &user, &principal)
        .await?;
    let name = PackageName::parse(&name)?.to_string();
    let authors = authors_of(&state, &name).await?;
    Ok(Json(AuthorsResponse { name, authors }))
}
