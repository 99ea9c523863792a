mod common;

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Notify;

use common::{signed_in, Harness};
use tradehall::client::comments::CommentTree;
use tradehall::client::feed::FeedStore;
use tradehall::client::identity::Viewer;
use tradehall::client::ClientError;
use tradehall::db::models::{Comment, NewComment};
use tradehall::db::repository::{CommentRepository, PostRepository, RepositoryError};

struct Fixture {
    h: Harness,
    alice: Viewer,
    feed: Arc<FeedStore>,
    tree: CommentTree,
    post_id: String,
}

async fn fixture() -> Fixture {
    let h = Harness::new();
    let alice = h.viewer("alice").await;
    let feed = Arc::new(FeedStore::new(h.posts.clone(), h.media.clone(), signed_in(&alice)));
    feed.load(&alice.id).await.unwrap();
    let post_id = feed.create("thesis", None).await.unwrap().post.id;
    let tree = CommentTree::new(
        h.comments.clone(),
        h.profiles.clone(),
        feed.clone(),
        signed_in(&alice),
    );
    Fixture {
        h,
        alice,
        feed,
        tree,
        post_id,
    }
}

async fn comments_count(f: &Fixture) -> i64 {
    f.feed.get(&f.post_id).await.unwrap().post.comments_count
}

#[tokio::test]
async fn test_comments_attach_authors_and_bump_counter() {
    let f = fixture().await;
    assert!(f.tree.expand(&f.post_id).await.unwrap().is_empty());

    let top = f.tree.add_comment(&f.post_id, "nice", None).await.unwrap();
    f.tree
        .add_comment(&f.post_id, "agreed", Some(&top.id))
        .await
        .unwrap();

    let nodes = f.tree.comments(&f.post_id).await.unwrap();
    assert_eq!(nodes.len(), 1);
    assert_eq!(nodes[0].author.as_ref().unwrap().username, "alice");
    assert_eq!(nodes[0].replies.as_ref().unwrap().len(), 1);
    assert_eq!(comments_count(&f).await, 2);

    let stored = f.h.posts.get(&f.post_id).await.unwrap().unwrap();
    assert_eq!(stored.comments_count, 2);
}

#[tokio::test]
async fn test_replies_belong_to_their_parent() {
    let f = fixture().await;
    let a = f.tree.add_comment(&f.post_id, "a", None).await.unwrap();
    let b = f.tree.add_comment(&f.post_id, "b", None).await.unwrap();
    for (parent, n) in [(&a, 3), (&b, 2)] {
        for i in 0..n {
            f.h.comments
                .insert(&NewComment {
                    post_id: f.post_id.clone(),
                    user_id: f.alice.id.clone(),
                    content: format!("reply {i}"),
                    parent_comment_id: Some(parent.id.clone()),
                })
                .await
                .unwrap();
        }
    }

    f.tree.load_top_level(&f.post_id).await.unwrap();
    for (parent, n) in [(&a, 3), (&b, 2)] {
        let replies = f.tree.open_replies(&f.post_id, &parent.id).await.unwrap();
        assert_eq!(replies.len(), n);
        assert!(replies
            .iter()
            .all(|r| r.comment.parent_comment_id.as_deref() == Some(parent.id.as_str())));
    }
}

#[tokio::test]
async fn test_reply_to_reply_is_rejected() {
    let f = fixture().await;
    f.tree.expand(&f.post_id).await.unwrap();
    let top = f.tree.add_comment(&f.post_id, "top", None).await.unwrap();
    let reply = f
        .tree
        .add_comment(&f.post_id, "reply", Some(&top.id))
        .await
        .unwrap();

    let err = f
        .tree
        .add_comment(&f.post_id, "deeper", Some(&reply.id))
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::ReplyTooDeep));
    assert_eq!(comments_count(&f).await, 2);
}

#[tokio::test]
async fn test_deleting_parent_takes_replies_with_it() {
    let f = fixture().await;
    f.tree.expand(&f.post_id).await.unwrap();
    let keep = f.tree.add_comment(&f.post_id, "keep", None).await.unwrap();
    let doomed = f.tree.add_comment(&f.post_id, "doomed", None).await.unwrap();
    f.tree
        .add_comment(&f.post_id, "r1", Some(&doomed.id))
        .await
        .unwrap();
    f.tree
        .add_comment(&f.post_id, "r2", Some(&doomed.id))
        .await
        .unwrap();
    assert_eq!(comments_count(&f).await, 4);

    let removed = f
        .tree
        .delete_comment(&f.post_id, &doomed.id, None)
        .await
        .unwrap();
    assert_eq!(removed, 3);

    let nodes = f.tree.comments(&f.post_id).await.unwrap();
    assert_eq!(nodes.len(), 1);
    assert_eq!(nodes[0].comment.id, keep.id);
    assert_eq!(comments_count(&f).await, 1);

    // Nothing orphaned remains to be reloaded
    let reloaded = f.tree.load_top_level(&f.post_id).await.unwrap();
    assert_eq!(reloaded.len(), 1);
    assert!(f.h.comments.replies(&doomed.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_deleting_reply_keeps_parent() {
    let f = fixture().await;
    f.tree.expand(&f.post_id).await.unwrap();
    let top = f.tree.add_comment(&f.post_id, "top", None).await.unwrap();
    let reply = f
        .tree
        .add_comment(&f.post_id, "reply", Some(&top.id))
        .await
        .unwrap();

    let removed = f
        .tree
        .delete_comment(&f.post_id, &reply.id, Some(&top.id))
        .await
        .unwrap();
    assert_eq!(removed, 1);
    let nodes = f.tree.comments(&f.post_id).await.unwrap();
    assert!(nodes[0].replies.as_ref().unwrap().is_empty());
    assert_eq!(comments_count(&f).await, 1);
}

#[tokio::test]
async fn test_comment_likes_reach_into_replies_and_persist_across_posts() {
    let f = fixture().await;
    f.tree.expand(&f.post_id).await.unwrap();
    let top = f.tree.add_comment(&f.post_id, "top", None).await.unwrap();
    let reply = f
        .tree
        .add_comment(&f.post_id, "reply", Some(&top.id))
        .await
        .unwrap();

    assert!(f.tree.toggle_comment_like(&reply.id, &f.post_id).await.unwrap());
    let nodes = f.tree.comments(&f.post_id).await.unwrap();
    assert_eq!(nodes[0].replies.as_ref().unwrap()[0].comment.likes_count, 1);
    assert_eq!(nodes[0].comment.likes_count, 0);

    // Loading another post's thread does not forget earlier likes
    let other = f.feed.create("another", None).await.unwrap();
    f.tree.load_top_level(&other.post.id).await.unwrap();
    assert!(f.tree.is_liked(&reply.id).await);

    assert!(!f.tree.toggle_comment_like(&reply.id, &f.post_id).await.unwrap());
    let nodes = f.tree.comments(&f.post_id).await.unwrap();
    assert_eq!(nodes[0].replies.as_ref().unwrap()[0].comment.likes_count, 0);
    assert!(!f.tree.is_liked(&reply.id).await);
}

#[tokio::test]
async fn test_liked_set_is_seeded_from_store() {
    let f = fixture().await;
    let top = f.tree.add_comment(&f.post_id, "top", None).await.unwrap();
    f.h.comments.like(&top.id, &f.alice.id).await.unwrap();

    f.tree.reset().await;
    assert!(!f.tree.is_liked(&top.id).await);
    let nodes = f.tree.load_top_level(&f.post_id).await.unwrap();
    assert_eq!(nodes[0].comment.likes_count, 1);
    assert!(f.tree.is_liked(&top.id).await);
}

#[tokio::test]
async fn test_empty_comment_is_rejected() {
    let f = fixture().await;
    let err = f.tree.add_comment(&f.post_id, "  ", None).await.unwrap_err();
    assert!(matches!(err, ClientError::EmptyComment));
}

/// Holds `like` until released; optionally fails it afterwards.
struct GatedComments {
    inner: Arc<dyn CommentRepository>,
    entered: Notify,
    release: Notify,
    fail_like: AtomicBool,
}

#[async_trait]
impl CommentRepository for GatedComments {
    async fn top_level(&self, post_id: &str) -> Result<Vec<Comment>, RepositoryError> {
        self.inner.top_level(post_id).await
    }

    async fn replies(&self, parent_comment_id: &str) -> Result<Vec<Comment>, RepositoryError> {
        self.inner.replies(parent_comment_id).await
    }

    async fn get(&self, id: &str) -> Result<Option<Comment>, RepositoryError> {
        self.inner.get(id).await
    }

    async fn insert(&self, comment: &NewComment) -> Result<Comment, RepositoryError> {
        self.inner.insert(comment).await
    }

    async fn delete(&self, id: &str, author_id: &str) -> Result<u64, RepositoryError> {
        self.inner.delete(id, author_id).await
    }

    async fn liked_comment_ids(
        &self,
        user_id: &str,
        comment_ids: &[String],
    ) -> Result<HashSet<String>, RepositoryError> {
        self.inner.liked_comment_ids(user_id, comment_ids).await
    }

    async fn like(&self, comment_id: &str, user_id: &str) -> Result<bool, RepositoryError> {
        self.entered.notify_one();
        self.release.notified().await;
        if self.fail_like.swap(false, Ordering::SeqCst) {
            return Err(RepositoryError::Conflict("like rejected".into()));
        }
        self.inner.like(comment_id, user_id).await
    }

    async fn unlike(&self, comment_id: &str, user_id: &str) -> Result<bool, RepositoryError> {
        self.inner.unlike(comment_id, user_id).await
    }
}

async fn gated_tree(f: &Fixture, fail_like: bool) -> (Arc<GatedComments>, Arc<CommentTree>) {
    let gated = Arc::new(GatedComments {
        inner: f.h.comments.clone(),
        entered: Notify::new(),
        release: Notify::new(),
        fail_like: AtomicBool::new(fail_like),
    });
    let tree = Arc::new(CommentTree::new(
        gated.clone(),
        f.h.profiles.clone(),
        f.feed.clone(),
        signed_in(&f.alice),
    ));
    tree.load_top_level(&f.post_id).await.unwrap();
    (gated, tree)
}

#[tokio::test]
async fn test_overlapping_comment_like_is_rejected_until_first_settles() {
    let f = fixture().await;
    let top = f.tree.add_comment(&f.post_id, "top", None).await.unwrap();
    let (gated, tree) = gated_tree(&f, false).await;

    let first = {
        let tree = tree.clone();
        let (comment_id, post_id) = (top.id.clone(), f.post_id.clone());
        tokio::spawn(async move { tree.toggle_comment_like(&comment_id, &post_id).await })
    };
    gated.entered.notified().await;

    let second = tree.toggle_comment_like(&top.id, &f.post_id).await;
    assert!(matches!(second, Err(ClientError::ToggleInFlight)));

    gated.release.notify_one();
    assert!(first.await.unwrap().unwrap());
    let nodes = tree.comments(&f.post_id).await.unwrap();
    assert_eq!(nodes[0].comment.likes_count, 1);

    // Guard is released once the first toggle lands
    assert!(!tree.toggle_comment_like(&top.id, &f.post_id).await.unwrap());
    let nodes = tree.comments(&f.post_id).await.unwrap();
    assert_eq!(nodes[0].comment.likes_count, 0);
}

#[tokio::test]
async fn test_failed_comment_like_releases_guard() {
    let f = fixture().await;
    let top = f.tree.add_comment(&f.post_id, "top", None).await.unwrap();
    let (gated, tree) = gated_tree(&f, true).await;

    let first = {
        let tree = tree.clone();
        let (comment_id, post_id) = (top.id.clone(), f.post_id.clone());
        tokio::spawn(async move { tree.toggle_comment_like(&comment_id, &post_id).await })
    };
    gated.entered.notified().await;
    gated.release.notify_one();
    assert!(matches!(
        first.await.unwrap(),
        Err(ClientError::Repository(_))
    ));
    assert!(!tree.is_liked(&top.id).await);
    assert_eq!(tree.comments(&f.post_id).await.unwrap()[0].comment.likes_count, 0);

    let retry = {
        let tree = tree.clone();
        let (comment_id, post_id) = (top.id.clone(), f.post_id.clone());
        tokio::spawn(async move { tree.toggle_comment_like(&comment_id, &post_id).await })
    };
    gated.entered.notified().await;
    gated.release.notify_one();
    assert!(retry.await.unwrap().unwrap());
    assert_eq!(tree.comments(&f.post_id).await.unwrap()[0].comment.likes_count, 1);
}
