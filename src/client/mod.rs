//! Stateful client components: the session cache, feed and comment caches,
//! permission gate, profile and admin services, and view state.
//!
//! Every component is constructed explicitly with the seams it talks to, so
//! tests swap in doubles instead of patching globals.

pub mod admin;
pub mod comments;
pub mod feed;
pub mod gate;
pub mod identity;
pub mod kv;
pub mod profile;
pub mod views;

use thiserror::Error;

use crate::auth::AuthError;
use crate::db::repository::RepositoryError;
use crate::error::AppError;
use crate::storage::StorageError;

/// Failures surfaced to the user as a banner or inline message.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("You must be logged in")]
    NotAuthenticated,

    #[error("Post must have content or an image")]
    EmptyPost,

    #[error("Comment cannot be empty")]
    EmptyComment,

    #[error("File size must be less than {limit_mb}MB")]
    FileTooLarge { limit_mb: u64 },

    #[error("User not found")]
    UserNotFound,

    #[error("Post not found")]
    PostNotFound,

    #[error("Comment not found")]
    CommentNotFound,

    #[error("Replies cannot be nested more than one level")]
    ReplyTooDeep,

    #[error("A like for this item is already being saved")]
    ToggleInFlight,

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    Validation(String),

    #[error(transparent)]
    Repository(#[from] RepositoryError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Server(#[from] AppError),
}

pub type ClientResult<T> = Result<T, ClientError>;
