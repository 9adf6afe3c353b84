//! Account endpoints: register, verify, login and user views.

use crate::auth::require_auth;
use crate::error::{ApiError, ApiResult};
use crate::handlers::common::{format_timestamp, read_json};
use crate::state::AppState;
use axum::Json;
use axum::extract::{Path, Request, State};
use axum::http::StatusCode;
use lode_core::Username;
use lode_metadata::models::UserRow;
use serde::{Deserialize, Serialize};

#[derive(Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct RegisterResponse {
    pub username: String,
    pub email: String,
    pub verified: bool,
    /// Only returned when `auth.expose_verification_token` is set.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verification_token: Option<String>,
}

#[derive(Deserialize)]
pub struct VerifyRequest {
    pub username: String,
    pub token: String,
}

#[derive(Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub user: UserView,
}

/// Public view of an account. Never carries secrets.
#[derive(Debug, Serialize)]
pub struct UserView {
    pub username: String,
    /// Only shown to the account itself.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub verified: bool,
    pub created_at: String,
    /// Packages the user is an author of.
    pub packages: Vec<String>,
}

async fn user_view(state: &AppState, user: UserRow, include_email: bool) -> ApiResult<UserView> {
    let packages = state
        .metadata
        .list_packages_by_author(&user.username)
        .await?
        .into_iter()
        .map(|p| p.name)
        .collect();

    Ok(UserView {
        created_at: format_timestamp(user.created_at)?,
        email: include_email.then_some(user.email),
        username: user.username,
        verified: user.verified,
        packages,
    })
}

/// POST /v1/register
pub async fn register(
    State(state): State<AppState>,
    req: Request,
) -> ApiResult<(StatusCode, Json<RegisterResponse>)> {
    let body: RegisterRequest = read_json(req).await?;
    let registration = state
        .identity
        .register(&body.username, &body.email, &body.password)
        .await?;

    // Delivery of the token is out of band unless explicitly exposed.
    let verification_token = state
        .config
        .auth
        .expose_verification_token
        .then(|| registration.verification_token.into_string());

    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            username: registration.user.username,
            email: registration.user.email,
            verified: registration.user.verified,
            verification_token,
        }),
    ))
}

/// POST /v1/verify
pub async fn verify(State(state): State<AppState>, req: Request) -> ApiResult<Json<UserView>> {
    let body: VerifyRequest = read_json(req).await?;
    state.identity.verify(&body.username, &body.token).await?;

    let username = Username::parse(&body.username)?;
    let user = state
        .metadata
        .get_user(username.as_str())
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("user '{username}' not found")))?;
    Ok(Json(user_view(&state, user, true).await?))
}

/// POST /v1/login
pub async fn login(State(state): State<AppState>, req: Request) -> ApiResult<Json<LoginResponse>> {
    let body: LoginRequest = read_json(req).await?;
    let (token, user) = state
        .identity
        .issue_token(&body.username, &body.password)
        .await
        .inspect_err(|e| {
            if matches!(e, ApiError::Unauthorized(_)) {
                crate::metrics::record_auth_failure("login");
            }
        })
        .map_err(|e| match e {
            // Same answer for unknown, unverified and wrong-password accounts.
            ApiError::Unauthorized(_) => ApiError::Unauthorized("invalid credentials".to_string()),
            other => other,
        })?;

    Ok(Json(LoginResponse {
        token,
        user: user_view(&state, user, true).await?,
    }))
}

/// GET /v1/user - The authenticated caller.
pub async fn get_self(State(state): State<AppState>, req: Request) -> ApiResult<Json<UserView>> {
    let principal = require_auth(&req)?;
    let user = state
        .metadata
        .get_user(&principal.username)
        .await?
        .ok_or_else(|| ApiError::Unauthorized("unknown account".to_string()))?;
    Ok(Json(user_view(&state, user, true).await?))
}

/// GET /v1/user/{name}
pub async fn get_user(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> ApiResult<Json<UserView>> {
    let username = Username::parse(&name)
        .map_err(|_| ApiError::NotFound(format!("user '{name}' not found")))?;
    let user = state
        .metadata
        .get_user(username.as_str())
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("user '{username}' not found")))?;
    Ok(Json(user_view(&state, user, false).await?))
}
