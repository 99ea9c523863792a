//! Public object storage for avatars and post media.

use async_trait::async_trait;
use bytes::Bytes;
use std::fmt;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};
use std::str::FromStr;
use tokio::io::AsyncWriteExt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Bucket {
    Avatars,
    Posts,
}

impl Bucket {
    pub fn as_str(&self) -> &'static str {
        match self {
            Bucket::Avatars => "avatars",
            Bucket::Posts => "posts",
        }
    }
}

impl fmt::Display for Bucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Bucket {
    type Err = StorageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "avatars" => Ok(Bucket::Avatars),
            "posts" => Ok(Bucket::Posts),
            _ => Err(StorageError::NotFound),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("The resource already exists")]
    AlreadyExists,

    #[error("File size must be less than {}MB", .limit / (1024 * 1024))]
    TooLarge { limit: u64 },

    #[error("Object not found")]
    NotFound,

    #[error("Invalid object path: {0}")]
    InvalidPath(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Store `data` at `path`. Without `upsert` an existing object is an error.
    async fn upload(
        &self,
        bucket: Bucket,
        path: &str,
        data: Bytes,
        upsert: bool,
    ) -> Result<(), StorageError>;

    async fn download(&self, bucket: Bucket, path: &str) -> Result<Bytes, StorageError>;

    /// Remove objects; missing paths are skipped. Returns how many were removed.
    async fn remove(&self, bucket: Bucket, paths: &[String]) -> Result<usize, StorageError>;

    fn public_url(&self, bucket: Bucket, path: &str) -> String;

    /// Largest accepted object in bytes.
    fn max_bytes(&self) -> u64;
}

/// Objects laid out as `<root>/<bucket>/<path>` on local disk.
pub struct FsObjectStore {
    root: PathBuf,
    base_url: String,
    max_bytes: u64,
}

impl FsObjectStore {
    pub fn new(root: impl Into<PathBuf>, base_url: impl Into<String>, max_bytes: u64) -> Self {
        Self {
            root: root.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            max_bytes,
        }
    }

    fn resolve(&self, bucket: Bucket, path: &str) -> Result<PathBuf, StorageError> {
        let relative = Path::new(path);
        let clean = !path.is_empty()
            && relative
                .components()
                .all(|c| matches!(c, Component::Normal(_)));
        if !clean {
            return Err(StorageError::InvalidPath(path.to_string()));
        }
        Ok(self.root.join(bucket.as_str()).join(relative))
    }
}

#[async_trait]
impl ObjectStore for FsObjectStore {
    async fn upload(
        &self,
        bucket: Bucket,
        path: &str,
        data: Bytes,
        upsert: bool,
    ) -> Result<(), StorageError> {
        if data.len() as u64 > self.max_bytes {
            return Err(StorageError::TooLarge {
                limit: self.max_bytes,
            });
        }
        let target = self.resolve(bucket, path)?;
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let mut options = tokio::fs::OpenOptions::new();
        options.write(true);
        if upsert {
            options.create(true).truncate(true);
        } else {
            options.create_new(true);
        }
        let mut file = match options.open(&target).await {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                return Err(StorageError::AlreadyExists)
            }
            Err(e) => return Err(e.into()),
        };
        file.write_all(&data).await?;
        file.flush().await?;
        tracing::debug!(%bucket, path, bytes = data.len(), "Stored object");
        Ok(())
    }

    async fn download(&self, bucket: Bucket, path: &str) -> Result<Bytes, StorageError> {
        let target = self.resolve(bucket, path)?;
        match tokio::fs::read(&target).await {
            Ok(data) => Ok(Bytes::from(data)),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(StorageError::NotFound),
            Err(e) => Err(e.into()),
        }
    }

    async fn remove(&self, bucket: Bucket, paths: &[String]) -> Result<usize, StorageError> {
        let mut removed = 0;
        for path in paths {
            let target = self.resolve(bucket, path)?;
            match tokio::fs::remove_file(&target).await {
                Ok(()) => removed += 1,
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(removed)
    }

    fn public_url(&self, bucket: Bucket, path: &str) -> String {
        format!("{}/storage/{}/{}", self.base_url, bucket, path)
    }

    fn max_bytes(&self) -> u64 {
        self.max_bytes
    }
}

/// Recover the object path from a public URL: everything after `/<bucket>/`.
pub fn object_path_from_url(bucket: Bucket, public_url: &str) -> Option<String> {
    let parsed = url::Url::parse(public_url).ok()?;
    let marker = format!("/{}/", bucket);
    let (_, path) = parsed.path().split_once(&marker)?;
    if path.is_empty() {
        return None;
    }
    Some(path.to_string())
}

/// File extension used when naming uploaded objects.
pub fn extension_of(file_name: &str) -> &str {
    Path::new(file_name)
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("bin")
}
