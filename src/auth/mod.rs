pub mod handlers;
pub mod privileged;
pub mod provider;
pub mod session;

pub use provider::{
    AuthEvent, AuthSession, AuthUser, IdentityProvider, SqliteIdentityProvider, UserUpdate,
};

use thiserror::Error;

use crate::db::repository::{ProfileRepository, RepositoryError};

/// Enforced on sign-up, self-service changes and admin resets alike.
pub const MIN_PASSWORD_LEN: usize = 6;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Invalid login credentials")]
    InvalidCredentials,

    #[error("Invalid or expired session")]
    InvalidToken,

    #[error("{0}")]
    UserNotFound(String),

    #[error("Password must be at least 6 characters long")]
    WeakPassword,

    #[error("Email is already registered")]
    EmailTaken,

    #[error("Username is already taken")]
    UsernameTaken,

    #[error("{0} is required")]
    MissingField(&'static str),

    #[error(transparent)]
    Repository(#[from] RepositoryError),

    #[error("Password hashing failed: {0}")]
    Hash(#[from] bcrypt::BcryptError),
}

impl From<rusqlite::Error> for AuthError {
    fn from(err: rusqlite::Error) -> Self {
        AuthError::Repository(err.into())
    }
}

impl From<r2d2::Error> for AuthError {
    fn from(err: r2d2::Error) -> Self {
        AuthError::Repository(err.into())
    }
}

pub fn validate_password(password: &str) -> Result<(), AuthError> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AuthError::WeakPassword);
    }
    Ok(())
}

/// Login accepts an email or a username; usernames are resolved to the profile email.
pub async fn resolve_login_email(
    profiles: &dyn ProfileRepository,
    identifier: &str,
) -> Result<String, AuthError> {
    let identifier = identifier.trim();
    if identifier.is_empty() {
        return Err(AuthError::MissingField("Email or username"));
    }
    if identifier.contains('@') {
        return Ok(identifier.to_string());
    }

    profiles
        .find_by_username(identifier)
        .await?
        .map(|profile| profile.email)
        .ok_or_else(|| AuthError::UserNotFound("Username not found".into()))
}
