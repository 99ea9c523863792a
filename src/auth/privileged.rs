//! Account mutations that must be authorised from the caller's own token.
//!
//! The HTTP handlers and the in-process admin panel both go through these
//! functions, so the admin and owner checks are re-derived from the store on
//! every call regardless of what the caller believes about itself.

use serde::Deserialize;

use crate::auth::{validate_password, AuthError, AuthUser, IdentityProvider, UserUpdate};
use crate::client::gate;
use crate::db::repository::ProfileRepository;
use crate::error::{AppError, AppResult};

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    pub user_id: Option<String>,
    pub new_password: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateEmailRequest {
    pub new_email: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePasswordRequest {
    pub current_password: Option<String>,
    pub new_password: Option<String>,
}

fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

async fn authenticate(
    identity: &dyn IdentityProvider,
    bearer: Option<&str>,
) -> AppResult<AuthUser> {
    let token = bearer.ok_or_else(|| AppError::Unauthorized("No authorization header".into()))?;
    identity
        .get_user(token)
        .await
        .map_err(|_| AppError::Unauthorized("Unauthorized".into()))
}

/// Any failure of the identity update itself is a 500 carrying the provider's message.
fn update_failed(err: AuthError) -> AppError {
    AppError::Internal(err.to_string())
}

/// Owner-only reset of another account's password.
pub async fn change_user_password(
    identity: &dyn IdentityProvider,
    profiles: &dyn ProfileRepository,
    bearer: Option<&str>,
    request: &ChangePasswordRequest,
) -> AppResult<()> {
    let (Some(user_id), Some(new_password)) =
        (present(&request.user_id), present(&request.new_password))
    else {
        return Err(AppError::BadRequest("Missing userId or newPassword".into()));
    };
    validate_password(new_password).map_err(|e| AppError::BadRequest(e.to_string()))?;

    let caller = authenticate(identity, bearer).await?;

    let profile = profiles.get(&caller.id).await?;
    let Some(profile) = profile.filter(|p| p.is_admin) else {
        tracing::warn!(caller = %caller.id, "Password reset refused: not an admin");
        return Err(AppError::Forbidden("Admin access required".into()));
    };
    if !gate::is_owner_username(&profile.username) {
        tracing::warn!(caller = %caller.id, "Password reset refused: not the owner");
        return Err(AppError::Forbidden(
            "Only the owner can change other users' passwords".into(),
        ));
    }

    identity
        .admin_update_user_by_id(
            user_id,
            &UserUpdate {
                password: Some(new_password.to_string()),
                ..Default::default()
            },
        )
        .await
        .map_err(update_failed)?;

    tracing::info!(caller = %caller.id, target = %user_id, "Owner changed a user's password");
    Ok(())
}

/// Self-service email change, confirmed immediately and mirrored onto the profile.
pub async fn update_own_email(
    identity: &dyn IdentityProvider,
    profiles: &dyn ProfileRepository,
    bearer: Option<&str>,
    request: &UpdateEmailRequest,
) -> AppResult<()> {
    let new_email = present(&request.new_email)
        .ok_or_else(|| AppError::BadRequest("Missing newEmail".into()))?;

    let caller = authenticate(identity, bearer).await?;

    identity
        .admin_update_user_by_id(
            &caller.id,
            &UserUpdate {
                email: Some(new_email.to_string()),
                ..Default::default()
            },
        )
        .await
        .map_err(update_failed)?;

    // The identity record is authoritative; a stale profile copy is tolerated
    if let Err(e) = profiles.set_email(&caller.id, new_email.trim()).await {
        tracing::error!(user_id = %caller.id, "Profile email sync failed: {}", e);
    }

    Ok(())
}

/// Self-service password change gated on the current password.
pub async fn update_own_password(
    identity: &dyn IdentityProvider,
    bearer: Option<&str>,
    request: &UpdatePasswordRequest,
) -> AppResult<()> {
    let (Some(current_password), Some(new_password)) = (
        present(&request.current_password),
        present(&request.new_password),
    ) else {
        return Err(AppError::BadRequest(
            "Missing currentPassword or newPassword".into(),
        ));
    };
    if validate_password(new_password).is_err() {
        return Err(AppError::BadRequest(
            "New password must be at least 6 characters long".into(),
        ));
    }

    let caller = authenticate(identity, bearer).await?;

    if !identity.verify_password(&caller.id, current_password).await? {
        return Err(AppError::Forbidden("Current password is incorrect".into()));
    }

    identity
        .admin_update_user_by_id(
            &caller.id,
            &UserUpdate {
                password: Some(new_password.to_string()),
                ..Default::default()
            },
        )
        .await
        .map_err(update_failed)?;

    Ok(())
}
