//! Byte transfer abstraction used by the composition and generation flows.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::debug;
use url::Url;

use crate::client::S3Client;
use crate::error::{StorageError, StorageResult};
use crate::keys::upload_key;
use crate::remote_ref::RemoteRef;

/// Moves asset bytes between remote storage and the local workspace.
#[async_trait]
pub trait ObjectTransfer: Send + Sync {
    /// Copy the object named by `reference` to `dest`, returning `dest`.
    async fn fetch(&self, reference: &str, dest: &Path) -> StorageResult<PathBuf>;

    /// Publish a local file and return a reference a client can download.
    async fn store(&self, local: &Path) -> StorageResult<String>;
}

#[async_trait]
impl ObjectTransfer for S3Client {
    async fn fetch(&self, reference: &str, dest: &Path) -> StorageResult<PathBuf> {
        let remote = RemoteRef::parse(reference)?;
        self.download_to(&remote, dest).await
    }

    async fn store(&self, local: &Path) -> StorageResult<String> {
        self.upload_and_presign(local).await
    }
}

/// Filesystem-backed transfer for development and tests.
///
/// References are plain paths or `file://` URLs. Stored files are copied
/// under `root` using the same key layout as S3 uploads.
#[derive(Debug, Clone)]
pub struct LocalTransfer {
    root: PathBuf,
}

impl LocalTransfer {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(reference: &str) -> StorageResult<PathBuf> {
        if reference.starts_with("file://") {
            let url = Url::parse(reference)
                .map_err(|e| StorageError::invalid_url(format!("{}: {}", reference, e)))?;
            url.to_file_path()
                .map_err(|_| StorageError::invalid_url(reference.to_string()))
        } else if reference.trim().is_empty() {
            Err(StorageError::invalid_url("empty reference"))
        } else {
            Ok(PathBuf::from(reference))
        }
    }
}

#[async_trait]
impl ObjectTransfer for LocalTransfer {
    async fn fetch(&self, reference: &str, dest: &Path) -> StorageResult<PathBuf> {
        let source = Self::resolve(reference)?;
        if !tokio::fs::try_exists(&source).await? {
            return Err(StorageError::not_found(reference));
        }
        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::copy(&source, dest).await?;
        debug!("Copied {} to {}", source.display(), dest.display());
        Ok(dest.to_path_buf())
    }

    async fn store(&self, local: &Path) -> StorageResult<String> {
        if !tokio::fs::try_exists(local).await? {
            return Err(StorageError::upload_failed(format!(
                "{} does not exist",
                local.display()
            )));
        }

        let key = upload_key(local, chrono::Utc::now());
        let dest = self.root.join(&key);
        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::copy(local, &dest).await?;

        let absolute = std::path::absolute(&dest)?;
        Url::from_file_path(&absolute)
            .map(|u| u.to_string())
            .map_err(|_| StorageError::upload_failed(absolute.display().to_string()))
    }
}
