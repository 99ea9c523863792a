use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use serde_json::{json, Value};

use crate::auth::privileged::{
    self, ChangePasswordRequest, UpdateEmailRequest, UpdatePasswordRequest,
};
use crate::error::AppResult;
use crate::extractors::BearerToken;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/admin/change-password", post(admin_change_password))
        .route("/api/user/update-email", post(update_email))
        .route("/api/user/update-password", post(update_password))
}

/// Unparseable bodies are treated as empty so field validation reports them.
fn body_or_default<T: Default>(body: Result<Json<T>, JsonRejection>) -> T {
    body.map(|Json(v)| v).unwrap_or_default()
}

fn success() -> Json<Value> {
    Json(json!({ "success": true }))
}

/// POST /api/admin/change-password
async fn admin_change_password(
    State(state): State<AppState>,
    bearer: BearerToken,
    body: Result<Json<ChangePasswordRequest>, JsonRejection>,
) -> AppResult<Json<Value>> {
    let req = body_or_default(body);
    privileged::change_user_password(
        state.identity.as_ref(),
        state.profiles.as_ref(),
        bearer.as_deref(),
        &req,
    )
    .await?;
    Ok(success())
}

/// POST /api/user/update-email
async fn update_email(
    State(state): State<AppState>,
    bearer: BearerToken,
    body: Result<Json<UpdateEmailRequest>, JsonRejection>,
) -> AppResult<Json<Value>> {
    let req = body_or_default(body);
    privileged::update_own_email(
        state.identity.as_ref(),
        state.profiles.as_ref(),
        bearer.as_deref(),
        &req,
    )
    .await?;
    Ok(success())
}

/// POST /api/user/update-password
async fn update_password(
    State(state): State<AppState>,
    bearer: BearerToken,
    body: Result<Json<UpdatePasswordRequest>, JsonRejection>,
) -> AppResult<Json<Value>> {
    let req = body_or_default(body);
    privileged::update_own_password(state.identity.as_ref(), bearer.as_deref(), &req).await?;
    Ok(success())
}
