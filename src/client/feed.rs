//! Posts on the profile being viewed, with the viewer's like state.

use std::collections::HashSet;
use std::sync::Arc;

use bytes::Bytes;
use chrono::Utc;
use serde::Serialize;
use tokio::sync::{watch, Mutex};

use crate::client::identity::{SessionState, Viewer};
use crate::client::{ClientError, ClientResult};
use crate::db::models::{NewPost, Post};
use crate::db::repository::{PostRepository, RepositoryError};
use crate::storage::{extension_of, object_path_from_url, Bucket, ObjectStore};

pub const DELETE_POST_PROMPT: &str = "Are you sure you want to delete this post?";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeedPost {
    #[serde(flatten)]
    pub post: Post,
    pub user_liked: bool,
}

/// A file picked for upload alongside a post or as an avatar.
#[derive(Debug, Clone)]
pub struct MediaUpload {
    pub file_name: String,
    pub data: Bytes,
}

#[derive(Default)]
struct FeedState {
    target: Option<String>,
    posts: Vec<FeedPost>,
    likes_in_flight: HashSet<String>,
}

pub struct FeedStore {
    posts: Arc<dyn PostRepository>,
    media: Arc<dyn ObjectStore>,
    session: watch::Receiver<SessionState>,
    state: Mutex<FeedState>,
}

fn not_found_as(err: RepositoryError, mapped: ClientError) -> ClientError {
    match err {
        RepositoryError::NotFound(_) => mapped,
        other => other.into(),
    }
}

pub(crate) fn check_upload_size(media: &dyn ObjectStore, len: usize) -> ClientResult<()> {
    let limit = media.max_bytes();
    if len as u64 > limit {
        return Err(ClientError::FileTooLarge {
            limit_mb: limit / (1024 * 1024),
        });
    }
    Ok(())
}

impl FeedStore {
    pub fn new(
        posts: Arc<dyn PostRepository>,
        media: Arc<dyn ObjectStore>,
        session: watch::Receiver<SessionState>,
    ) -> Self {
        Self {
            posts,
            media,
            session,
            state: Mutex::new(FeedState::default()),
        }
    }

    fn viewer(&self) -> ClientResult<Viewer> {
        self.session
            .borrow()
            .viewer()
            .cloned()
            .ok_or(ClientError::NotAuthenticated)
    }

    pub async fn posts(&self) -> Vec<FeedPost> {
        self.state.lock().await.posts.clone()
    }

    pub async fn get(&self, post_id: &str) -> Option<FeedPost> {
        let state = self.state.lock().await;
        state.posts.iter().find(|p| p.post.id == post_id).cloned()
    }

    /// Replace the cache with `target_user_id`'s posts, newest first.
    pub async fn load(&self, target_user_id: &str) -> ClientResult<Vec<FeedPost>> {
        let posts = self.posts.list_by_author(target_user_id).await?;
        let viewer_id = self.session.borrow().viewer().map(|v| v.id.clone());
        let liked = match viewer_id {
            Some(viewer_id) => self.posts.liked_post_ids(&viewer_id).await?,
            None => HashSet::new(),
        };

        let posts: Vec<FeedPost> = posts
            .into_iter()
            .map(|post| FeedPost {
                user_liked: liked.contains(&post.id),
                post,
            })
            .collect();

        let mut state = self.state.lock().await;
        state.target = Some(target_user_id.to_string());
        state.posts = posts.clone();
        Ok(posts)
    }

    /// Publish a post; media, if any, is uploaded before the row is written.
    pub async fn create(&self, content: &str, media: Option<MediaUpload>) -> ClientResult<FeedPost> {
        let viewer = self.viewer()?;
        let content = content.trim();
        if content.is_empty() && media.is_none() {
            return Err(ClientError::EmptyPost);
        }

        let image_url = match media {
            Some(upload) => {
                check_upload_size(self.media.as_ref(), upload.data.len())?;
                let path = format!(
                    "post-images/{}-{}.{}",
                    viewer.id,
                    Utc::now().timestamp_millis(),
                    extension_of(&upload.file_name)
                );
                self.media
                    .upload(Bucket::Posts, &path, upload.data, false)
                    .await?;
                Some(self.media.public_url(Bucket::Posts, &path))
            }
            None => None,
        };

        let post = self
            .posts
            .insert(&NewPost {
                user_id: viewer.id.clone(),
                content: content.to_string(),
                image_url,
            })
            .await?;
        tracing::debug!(post_id = %post.id, "Created post");

        let created = FeedPost {
            post,
            user_liked: false,
        };
        let mut state = self.state.lock().await;
        if state.target.as_deref().map_or(true, |t| t == viewer.id) {
            state.posts.insert(0, created.clone());
        }
        Ok(created)
    }

    /// Edit a post's text. Blank content leaves the post untouched.
    pub async fn update(&self, post_id: &str, content: &str) -> ClientResult<Option<FeedPost>> {
        let content = content.trim();
        if content.is_empty() {
            return Ok(None);
        }
        let viewer = self.viewer()?;

        let post = self
            .posts
            .update_content(post_id, &viewer.id, content, Utc::now())
            .await
            .map_err(|e| not_found_as(e, ClientError::PostNotFound))?;

        let mut state = self.state.lock().await;
        let user_liked = match state.posts.iter_mut().find(|p| p.post.id == post_id) {
            Some(cached) => {
                cached.post = post.clone();
                cached.user_liked
            }
            None => false,
        };
        Ok(Some(FeedPost { post, user_liked }))
    }

    /// Delete a post after `confirm` accepts the prompt. Returns whether it was deleted.
    ///
    /// Only the author's own posts are touched. The image is removed first and
    /// its failure is only logged, so a failed row delete can leave a post
    /// without its image.
    pub async fn delete(&self, post_id: &str, confirm: impl FnOnce(&str) -> bool) -> ClientResult<bool> {
        let viewer = self.viewer()?;
        if !confirm(DELETE_POST_PROMPT) {
            return Ok(false);
        }

        let post = self
            .posts
            .get(post_id)
            .await?
            .filter(|post| post.user_id == viewer.id)
            .ok_or(ClientError::PostNotFound)?;

        if let Some(path) = post
            .image_url
            .as_deref()
            .and_then(|url| object_path_from_url(Bucket::Posts, url))
        {
            if let Err(e) = self.media.remove(Bucket::Posts, &[path]).await {
                tracing::warn!(post_id, "Failed to remove post image: {}", e);
            }
        }

        self.posts
            .delete(post_id, &viewer.id)
            .await
            .map_err(|e| not_found_as(e, ClientError::PostNotFound))?;

        let mut state = self.state.lock().await;
        state.posts.retain(|p| p.post.id != post_id);
        Ok(true)
    }

    /// Like or unlike based on the cached flag, then adopt the stored counters.
    ///
    /// A second toggle while the first is still saving is refused.
    pub async fn toggle_like(&self, post_id: &str) -> ClientResult<FeedPost> {
        let viewer = self.viewer()?;

        let was_liked = {
            let mut state = self.state.lock().await;
            let liked = state
                .posts
                .iter()
                .find(|p| p.post.id == post_id)
                .map(|p| p.user_liked)
                .ok_or(ClientError::PostNotFound)?;
            if !state.likes_in_flight.insert(post_id.to_string()) {
                return Err(ClientError::ToggleInFlight);
            }
            liked
        };

        let outcome = self.write_like(post_id, &viewer.id, was_liked).await;

        let mut state = self.state.lock().await;
        state.likes_in_flight.remove(post_id);
        let refreshed = outcome?;
        let cached = state
            .posts
            .iter_mut()
            .find(|p| p.post.id == post_id)
            .ok_or(ClientError::PostNotFound)?;
        cached.post = refreshed;
        cached.user_liked = !was_liked;
        Ok(cached.clone())
    }

    async fn write_like(&self, post_id: &str, viewer_id: &str, was_liked: bool) -> ClientResult<Post> {
        if was_liked {
            self.posts.unlike(post_id, viewer_id).await?;
        } else {
            self.posts.like(post_id, viewer_id).await?;
        }
        self.posts
            .get(post_id)
            .await?
            .ok_or(ClientError::PostNotFound)
    }

    /// Shift a cached post's comment counter; used by the comment tree.
    pub async fn adjust_comments_count(&self, post_id: &str, delta: i64) {
        let mut state = self.state.lock().await;
        if let Some(cached) = state.posts.iter_mut().find(|p| p.post.id == post_id) {
            cached.post.comments_count = (cached.post.comments_count + delta).max(0);
        }
    }

    pub async fn reset(&self) {
        *self.state.lock().await = FeedState::default();
    }
}
