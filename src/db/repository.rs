// Repository pattern - every remote store access goes through these traits
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashSet;
use thiserror::Error;

use crate::db::models::*;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("Database error: {0}")]
    Database(#[from] r2d2::Error),

    #[error("SQL error: {0}")]
    Sql(#[from] rusqlite::Error),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),
}

#[async_trait]
pub trait ProfileRepository: Send + Sync {
    async fn get(&self, id: &str) -> Result<Option<Profile>, RepositoryError>;

    /// Case-insensitive exact match.
    async fn find_by_username(&self, username: &str) -> Result<Option<Profile>, RepositoryError>;

    /// Batched lookup; ids with no profile are skipped.
    async fn summaries(&self, ids: &[String]) -> Result<Vec<ProfileSummary>, RepositoryError>;

    /// Usernames containing `query`, case-insensitive.
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<Profile>, RepositoryError>;

    /// All profiles ordered by username.
    async fn list_all(&self) -> Result<Vec<Profile>, RepositoryError>;

    async fn update_details(&self, id: &str, edit: &ProfileEdit) -> Result<(), RepositoryError>;

    async fn set_avatar(&self, id: &str, avatar_url: &str) -> Result<(), RepositoryError>;

    async fn set_email(&self, id: &str, email: &str) -> Result<(), RepositoryError>;

    async fn set_role(&self, id: &str, role: Role) -> Result<(), RepositoryError>;

    async fn set_admin(&self, id: &str, is_admin: bool) -> Result<(), RepositoryError>;
}

#[async_trait]
pub trait PostRepository: Send + Sync {
    /// Newest first.
    async fn list_by_author(&self, user_id: &str) -> Result<Vec<Post>, RepositoryError>;

    async fn get(&self, id: &str) -> Result<Option<Post>, RepositoryError>;

    async fn insert(&self, post: &NewPost) -> Result<Post, RepositoryError>;

    /// Only touches a post authored by `author_id`.
    async fn update_content(
        &self,
        id: &str,
        author_id: &str,
        content: &str,
        updated_at: DateTime<Utc>,
    ) -> Result<Post, RepositoryError>;

    /// Only deletes a post authored by `author_id`.
    async fn delete(&self, id: &str, author_id: &str) -> Result<(), RepositoryError>;

    async fn liked_post_ids(&self, user_id: &str) -> Result<HashSet<String>, RepositoryError>;

    /// Returns false when the like row already existed.
    async fn like(&self, post_id: &str, user_id: &str) -> Result<bool, RepositoryError>;

    /// Returns false when there was no like row to remove.
    async fn unlike(&self, post_id: &str, user_id: &str) -> Result<bool, RepositoryError>;
}

#[async_trait]
pub trait CommentRepository: Send + Sync {
    /// Top-level comments of a post, oldest first.
    async fn top_level(&self, post_id: &str) -> Result<Vec<Comment>, RepositoryError>;

    /// Replies to a comment, oldest first.
    async fn replies(&self, parent_comment_id: &str) -> Result<Vec<Comment>, RepositoryError>;

    async fn get(&self, id: &str) -> Result<Option<Comment>, RepositoryError>;

    /// Rejects a parent that is itself a reply or belongs to another post.
    async fn insert(&self, comment: &NewComment) -> Result<Comment, RepositoryError>;

    /// Deletes a comment authored by `author_id` together with its replies.
    /// Returns the number of rows removed.
    async fn delete(&self, id: &str, author_id: &str) -> Result<u64, RepositoryError>;

    /// The subset of `comment_ids` liked by `user_id`.
    async fn liked_comment_ids(
        &self,
        user_id: &str,
        comment_ids: &[String],
    ) -> Result<HashSet<String>, RepositoryError>;

    async fn like(&self, comment_id: &str, user_id: &str) -> Result<bool, RepositoryError>;

    async fn unlike(&self, comment_id: &str, user_id: &str) -> Result<bool, RepositoryError>;
}
