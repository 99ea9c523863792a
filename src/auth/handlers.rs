use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::auth::{resolve_login_email, AuthError, AuthSession};
use crate::db::models::Profile;
use crate::error::{AppError, AppResult};
use crate::extractors::{BearerToken, CurrentUser};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub username: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    /// Email address or username.
    pub identifier: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct SessionResponse {
    #[serde(flatten)]
    pub session: AuthSession,
    pub profile: Option<Profile>,
}

#[derive(Debug, Serialize)]
pub struct WhoAmIResponse {
    pub user_id: String,
    pub email: String,
    pub profile: Option<Profile>,
}

/// POST /api/auth/register
pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> AppResult<Response> {
    let session = state
        .identity
        .sign_up(&req.email, &req.password, &req.username)
        .await?;
    let profile = state.profiles.get(&session.user.id).await?;

    tracing::info!(user_id = %session.user.id, "Registered new account");
    Ok((StatusCode::CREATED, Json(SessionResponse { session, profile })).into_response())
}

/// POST /api/auth/login
pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> AppResult<Json<SessionResponse>> {
    let email = resolve_login_email(state.profiles.as_ref(), &req.identifier)
        .await
        .map_err(|e| match e {
            AuthError::UserNotFound(msg) => AppError::Unauthorized(msg),
            other => other.into(),
        })?;
    let session = state.identity.sign_in(&email, &req.password).await?;
    let profile = state.profiles.get(&session.user.id).await?;

    Ok(Json(SessionResponse { session, profile }))
}

/// POST /api/auth/logout
pub async fn logout(State(state): State<AppState>, bearer: BearerToken) -> AppResult<Response> {
    if let Some(token) = bearer.as_deref() {
        if let Err(e) = state.identity.sign_out(token).await {
            tracing::warn!("Sign-out failed: {}", e);
        }
    }
    Ok(StatusCode::NO_CONTENT.into_response())
}

/// GET /api/auth/session
pub async fn session(
    State(state): State<AppState>,
    user: CurrentUser,
) -> AppResult<Json<WhoAmIResponse>> {
    let profile = state.profiles.get(&user.id).await?;
    Ok(Json(WhoAmIResponse {
        user_id: user.id,
        email: user.email,
        profile,
    }))
}
