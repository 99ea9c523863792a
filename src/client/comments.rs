//! Lazily loaded comment threads, two levels deep.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{watch, Mutex};

use crate::client::feed::FeedStore;
use crate::client::identity::{SessionState, Viewer};
use crate::client::{ClientError, ClientResult};
use crate::db::models::{Comment, NewComment, ProfileSummary};
use crate::db::repository::{CommentRepository, ProfileRepository, RepositoryError};

/// A reply. Replies have no children of their own.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Reply {
    #[serde(flatten)]
    pub comment: Comment,
    pub author: Option<ProfileSummary>,
}

/// A top-level comment; `replies` is `None` until the thread is opened.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommentNode {
    #[serde(flatten)]
    pub comment: Comment,
    pub author: Option<ProfileSummary>,
    pub replies: Option<Vec<Reply>>,
}

impl CommentNode {
    fn reply_mut(&mut self, comment_id: &str) -> Option<&mut Reply> {
        self.replies
            .as_mut()?
            .iter_mut()
            .find(|r| r.comment.id == comment_id)
    }
}

#[derive(Default)]
struct ThreadState {
    threads: HashMap<String, Vec<CommentNode>>,
    /// Every comment the viewer has liked among those loaded this session.
    liked: HashSet<String>,
    likes_in_flight: HashSet<String>,
}

impl ThreadState {
    fn likes_count_mut(&mut self, post_id: &str, comment_id: &str) -> Option<&mut i64> {
        let nodes = self.threads.get_mut(post_id)?;
        for node in nodes.iter_mut() {
            if node.comment.id == comment_id {
                return Some(&mut node.comment.likes_count);
            }
            if let Some(reply) = node.reply_mut(comment_id) {
                return Some(&mut reply.comment.likes_count);
            }
        }
        None
    }

    fn is_reply(&self, post_id: &str, comment_id: &str) -> bool {
        self.threads.get(post_id).is_some_and(|nodes| {
            nodes.iter().any(|node| {
                node.replies
                    .as_ref()
                    .is_some_and(|replies| replies.iter().any(|r| r.comment.id == comment_id))
            })
        })
    }
}

pub struct CommentTree {
    comments: Arc<dyn CommentRepository>,
    profiles: Arc<dyn ProfileRepository>,
    feed: Arc<FeedStore>,
    session: watch::Receiver<SessionState>,
    state: Mutex<ThreadState>,
}

impl CommentTree {
    pub fn new(
        comments: Arc<dyn CommentRepository>,
        profiles: Arc<dyn ProfileRepository>,
        feed: Arc<FeedStore>,
        session: watch::Receiver<SessionState>,
    ) -> Self {
        Self {
            comments,
            profiles,
            feed,
            session,
            state: Mutex::new(ThreadState::default()),
        }
    }

    fn viewer(&self) -> ClientResult<Viewer> {
        self.session
            .borrow()
            .viewer()
            .cloned()
            .ok_or(ClientError::NotAuthenticated)
    }

    /// Merge the viewer's likes among `comments` and fetch their authors.
    async fn decorate(
        &self,
        comments: &[Comment],
    ) -> ClientResult<(HashSet<String>, HashMap<String, ProfileSummary>)> {
        let ids: Vec<String> = comments.iter().map(|c| c.id.clone()).collect();
        let viewer_id = self.session.borrow().viewer().map(|v| v.id.clone());
        let mut author_ids: Vec<String> = comments.iter().map(|c| c.user_id.clone()).collect();
        author_ids.sort();
        author_ids.dedup();

        let likes = async {
            match viewer_id {
                Some(viewer_id) if !ids.is_empty() => {
                    self.comments.liked_comment_ids(&viewer_id, &ids).await
                }
                _ => Ok(HashSet::new()),
            }
        };
        let summaries = async {
            if author_ids.is_empty() {
                Ok(Vec::new())
            } else {
                self.profiles.summaries(&author_ids).await
            }
        };
        let (liked, summaries) = futures::try_join!(likes, summaries)?;
        let authors = summaries.into_iter().map(|s| (s.id.clone(), s)).collect();

        Ok((liked, authors))
    }

    /// Fetch a post's top-level comments, oldest first.
    pub async fn load_top_level(&self, post_id: &str) -> ClientResult<Vec<CommentNode>> {
        let comments = self.comments.top_level(post_id).await?;
        let (liked, authors) = self.decorate(&comments).await?;

        let nodes: Vec<CommentNode> = comments
            .into_iter()
            .map(|comment| CommentNode {
                author: authors.get(&comment.user_id).cloned(),
                comment,
                replies: None,
            })
            .collect();

        let mut state = self.state.lock().await;
        state.liked.extend(liked);
        state.threads.insert(post_id.to_string(), nodes.clone());
        Ok(nodes)
    }

    /// Fetch the replies under `parent_id` and attach them to the cached parent.
    pub async fn load_replies(&self, post_id: &str, parent_id: &str) -> ClientResult<Vec<Reply>> {
        let replies = self.comments.replies(parent_id).await?;
        let replies: Vec<Comment> = replies
            .into_iter()
            .filter(|c| c.parent_comment_id.as_deref() == Some(parent_id))
            .collect();
        let (liked, authors) = self.decorate(&replies).await?;

        let replies: Vec<Reply> = replies
            .into_iter()
            .map(|comment| Reply {
                author: authors.get(&comment.user_id).cloned(),
                comment,
            })
            .collect();

        let mut state = self.state.lock().await;
        state.liked.extend(liked);
        if let Some(parent) = state
            .threads
            .get_mut(post_id)
            .and_then(|nodes| nodes.iter_mut().find(|n| n.comment.id == parent_id))
        {
            parent.replies = Some(replies.clone());
        }
        Ok(replies)
    }

    /// Show a post's comments, loading them on first open.
    pub async fn expand(&self, post_id: &str) -> ClientResult<Vec<CommentNode>> {
        if let Some(nodes) = self.comments(post_id).await {
            return Ok(nodes);
        }
        self.load_top_level(post_id).await
    }

    /// Show a thread's replies, loading them on first open.
    pub async fn open_replies(&self, post_id: &str, parent_id: &str) -> ClientResult<Vec<Reply>> {
        let cached = {
            let state = self.state.lock().await;
            state
                .threads
                .get(post_id)
                .and_then(|nodes| nodes.iter().find(|n| n.comment.id == parent_id))
                .and_then(|n| n.replies.clone())
        };
        match cached {
            Some(replies) => Ok(replies),
            None => self.load_replies(post_id, parent_id).await,
        }
    }

    /// Post a comment, or a reply when `parent_id` is given.
    pub async fn add_comment(
        &self,
        post_id: &str,
        content: &str,
        parent_id: Option<&str>,
    ) -> ClientResult<Comment> {
        let viewer = self.viewer()?;
        let content = content.trim();
        if content.is_empty() {
            return Err(ClientError::EmptyComment);
        }
        if let Some(parent_id) = parent_id {
            if self.state.lock().await.is_reply(post_id, parent_id) {
                return Err(ClientError::ReplyTooDeep);
            }
        }

        let comment = self
            .comments
            .insert(&NewComment {
                post_id: post_id.to_string(),
                user_id: viewer.id.clone(),
                content: content.to_string(),
                parent_comment_id: parent_id.map(str::to_string),
            })
            .await
            .map_err(|e| match e {
                RepositoryError::NotFound(_) => ClientError::CommentNotFound,
                other => other.into(),
            })?;

        let author = self
            .profiles
            .summaries(std::slice::from_ref(&viewer.id))
            .await?
            .into_iter()
            .next();

        {
            let mut state = self.state.lock().await;
            if let Some(nodes) = state.threads.get_mut(post_id) {
                match parent_id {
                    None => nodes.push(CommentNode {
                        comment: comment.clone(),
                        author,
                        replies: Some(Vec::new()),
                    }),
                    Some(parent_id) => {
                        let replies = nodes
                            .iter_mut()
                            .find(|n| n.comment.id == parent_id)
                            .and_then(|n| n.replies.as_mut());
                        // An unopened thread fetches the new reply with the rest
                        if let Some(replies) = replies {
                            replies.push(Reply {
                                comment: comment.clone(),
                                author,
                            });
                        }
                    }
                }
            }
        }

        self.feed.adjust_comments_count(post_id, 1).await;
        Ok(comment)
    }

    /// Delete one of the viewer's comments. A top-level comment takes its
    /// replies with it; returns how many comments were removed.
    pub async fn delete_comment(
        &self,
        post_id: &str,
        comment_id: &str,
        parent_id: Option<&str>,
    ) -> ClientResult<u64> {
        let viewer = self.viewer()?;
        let removed = self
            .comments
            .delete(comment_id, &viewer.id)
            .await
            .map_err(|e| match e {
                RepositoryError::NotFound(_) => ClientError::CommentNotFound,
                other => other.into(),
            })?;

        {
            let mut state = self.state.lock().await;
            if let Some(nodes) = state.threads.get_mut(post_id) {
                match parent_id {
                    None => nodes.retain(|n| n.comment.id != comment_id),
                    Some(parent_id) => {
                        if let Some(replies) = nodes
                            .iter_mut()
                            .find(|n| n.comment.id == parent_id)
                            .and_then(|n| n.replies.as_mut())
                        {
                            replies.retain(|r| r.comment.id != comment_id);
                        }
                    }
                }
            }
        }

        self.feed
            .adjust_comments_count(post_id, -(removed as i64))
            .await;
        Ok(removed)
    }

    /// Like or unlike a comment based on the session's liked set. Returns the new state.
    pub async fn toggle_comment_like(&self, comment_id: &str, post_id: &str) -> ClientResult<bool> {
        let viewer = self.viewer()?;

        let was_liked = {
            let mut state = self.state.lock().await;
            if !state.likes_in_flight.insert(comment_id.to_string()) {
                return Err(ClientError::ToggleInFlight);
            }
            state.liked.contains(comment_id)
        };

        let outcome = self.write_like(comment_id, &viewer.id, was_liked).await;

        let mut state = self.state.lock().await;
        state.likes_in_flight.remove(comment_id);
        let stored_count = outcome?;

        if was_liked {
            state.liked.remove(comment_id);
        } else {
            state.liked.insert(comment_id.to_string());
        }
        if let Some(count) = state.likes_count_mut(post_id, comment_id) {
            *count = stored_count.unwrap_or(if was_liked { *count - 1 } else { *count + 1 });
        }
        Ok(!was_liked)
    }

    async fn write_like(
        &self,
        comment_id: &str,
        viewer_id: &str,
        was_liked: bool,
    ) -> ClientResult<Option<i64>> {
        if was_liked {
            self.comments.unlike(comment_id, viewer_id).await?;
        } else {
            self.comments.like(comment_id, viewer_id).await?;
        }
        Ok(self
            .comments
            .get(comment_id)
            .await?
            .map(|c| c.likes_count))
    }

    pub async fn is_liked(&self, comment_id: &str) -> bool {
        self.state.lock().await.liked.contains(comment_id)
    }

    /// Cached top-level comments for a post, if loaded.
    pub async fn comments(&self, post_id: &str) -> Option<Vec<CommentNode>> {
        self.state.lock().await.threads.get(post_id).cloned()
    }

    pub async fn reset(&self) {
        *self.state.lock().await = ThreadState::default();
    }
}
