#![allow(dead_code)]

use std::sync::Arc;

use tempfile::TempDir;
use tokio::sync::watch;

use tradehall::auth::{IdentityProvider, SqliteIdentityProvider};
use tradehall::client::identity::{SessionState, Viewer};
use tradehall::db;
use tradehall::db::sqlite::{SqliteCommentRepository, SqlitePostRepository, SqliteProfileRepository};
use tradehall::state::DbPool;
use tradehall::storage::FsObjectStore;

pub struct Harness {
    pub dir: TempDir,
    pub pool: DbPool,
    pub identity: Arc<SqliteIdentityProvider>,
    pub profiles: Arc<SqliteProfileRepository>,
    pub posts: Arc<SqlitePostRepository>,
    pub comments: Arc<SqliteCommentRepository>,
    pub media: Arc<FsObjectStore>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_upload_limit(1024 * 1024)
    }

    pub fn with_upload_limit(max_bytes: u64) -> Self {
        let dir = TempDir::new().unwrap();
        let pool = db::create_pool(&dir.path().join("test.db")).expect("Failed to create test database");
        db::run_migrations(&pool).expect("Failed to run migrations");

        let media = FsObjectStore::new(dir.path().join("storage"), "http://localhost:3000", max_bytes);
        Self {
            identity: Arc::new(SqliteIdentityProvider::new(pool.clone(), 1).with_hash_cost(4)),
            profiles: Arc::new(SqliteProfileRepository::new(pool.clone())),
            posts: Arc::new(SqlitePostRepository::new(pool.clone())),
            comments: Arc::new(SqliteCommentRepository::new(pool.clone())),
            media: Arc::new(media),
            pool,
            dir,
        }
    }

    /// Register an account and return it as a signed-in viewer.
    pub async fn viewer(&self, username: &str) -> Viewer {
        let session = self
            .identity
            .sign_up(&format!("{}@example.com", username.to_lowercase()), "secret1", username)
            .await
            .unwrap();
        Viewer {
            id: session.user.id,
            username: username.to_string(),
            is_admin: false,
            access_token: session.access_token,
        }
    }

    pub async fn admin(&self, username: &str) -> Viewer {
        use tradehall::db::repository::ProfileRepository;
        let mut viewer = self.viewer(username).await;
        self.profiles.set_admin(&viewer.id, true).await.unwrap();
        viewer.is_admin = true;
        viewer
    }
}

pub fn signed_in(viewer: &Viewer) -> watch::Receiver<SessionState> {
    watch::channel(SessionState::Authenticated(viewer.clone())).1
}

pub fn anonymous() -> watch::Receiver<SessionState> {
    watch::channel(SessionState::Anonymous).1
}
