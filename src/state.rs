use std::sync::Arc;

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;

use crate::auth::{IdentityProvider, SqliteIdentityProvider};
use crate::client::identity::IdentityCache;
use crate::client::kv::KeyValueStore;
use crate::config::Config;
use crate::db::repository::{CommentRepository, PostRepository, ProfileRepository};
use crate::db::sqlite::{SqliteCommentRepository, SqlitePostRepository, SqliteProfileRepository};
use crate::storage::{FsObjectStore, ObjectStore};

pub type DbPool = Pool<SqliteConnectionManager>;

#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub identity: Arc<dyn IdentityProvider>,
    pub profiles: Arc<dyn ProfileRepository>,
    pub posts: Arc<dyn PostRepository>,
    pub comments: Arc<dyn CommentRepository>,
    pub media: Arc<dyn ObjectStore>,
}

impl AppState {
    /// Wire the SQLite-backed services and the on-disk object store.
    pub fn new(db: DbPool, config: Config) -> Self {
        let identity = SqliteIdentityProvider::new(db.clone(), config.auth.session_hours)
            .with_hash_cost(config.auth.bcrypt_cost);
        let media = FsObjectStore::new(
            config.storage_path(),
            config.public_url(),
            config.max_upload_bytes(),
        );

        Self {
            identity: Arc::new(identity),
            profiles: Arc::new(SqliteProfileRepository::new(db.clone())),
            posts: Arc::new(SqlitePostRepository::new(db.clone())),
            comments: Arc::new(SqliteCommentRepository::new(db.clone())),
            media: Arc::new(media),
            config,
        }
    }

    /// An identity cache over these services, using the configured check timeout.
    pub fn identity_cache(&self, kv: Arc<dyn KeyValueStore>) -> IdentityCache {
        IdentityCache::new(
            self.identity.clone(),
            self.profiles.clone(),
            kv,
            self.config.auth_check_timeout(),
        )
    }
}
