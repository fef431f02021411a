//! S3 client implementation.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use aws_config::BehaviorVersion;
use aws_credential_types::Credentials;
use aws_sdk_s3::config::{Builder, Region};
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use metrics::histogram;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

use crate::error::{StorageError, StorageResult};
use crate::keys::{content_type_for, upload_key};
use crate::remote_ref::RemoteRef;

/// Lifetime of the presigned URLs returned by uploads.
pub const DEFAULT_PRESIGN_EXPIRY: Duration = Duration::from_secs(3600);

/// Configuration for the S3 client.
#[derive(Debug, Clone)]
pub struct S3Config {
    /// Bucket uploads go to
    pub bucket_name: String,
    pub region: String,
    /// Custom endpoint (MinIO, R2, LocalStack)
    pub endpoint_url: Option<String>,
    /// Static credentials; the default AWS provider chain is used when absent
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
    /// Lifetime of returned presigned URLs
    pub presign_expiry: Duration,
}

impl S3Config {
    /// Create config from environment variables.
    pub fn from_env() -> StorageResult<Self> {
        Ok(Self {
            bucket_name: std::env::var("S3_BUCKET_NAME")
                .map_err(|_| StorageError::config_error("S3_BUCKET_NAME not set"))?,
            region: std::env::var("AWS_REGION").unwrap_or_else(|_| "us-east-1".to_string()),
            endpoint_url: std::env::var("S3_ENDPOINT_URL").ok(),
            access_key_id: std::env::var("AWS_ACCESS_KEY_ID").ok(),
            secret_access_key: std::env::var("AWS_SECRET_ACCESS_KEY").ok(),
            presign_expiry: Duration::from_secs(
                std::env::var("S3_PRESIGN_EXPIRY_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(DEFAULT_PRESIGN_EXPIRY.as_secs()),
            ),
        })
    }
}

/// S3 storage client.
#[derive(Clone)]
pub struct S3Client {
    client: Client,
    bucket: String,
    presign_expiry: Duration,
}

impl S3Client {
    /// Create a new S3 client from configuration.
    pub async fn new(config: S3Config) -> StorageResult<Self> {
        let region = Region::new(config.region.clone());

        let mut builder = match (&config.access_key_id, &config.secret_access_key) {
            (Some(key), Some(secret)) => Builder::new()
                .behavior_version(BehaviorVersion::latest())
                .region(region)
                .credentials_provider(Credentials::new(key, secret, None, None, "env")),
            _ => {
                let shared = aws_config::defaults(BehaviorVersion::latest())
                    .region(region)
                    .load()
                    .await;
                Builder::from(&shared)
            }
        };

        if let Some(endpoint) = &config.endpoint_url {
            builder = builder.endpoint_url(endpoint).force_path_style(true);
        }

        Ok(Self {
            client: Client::from_conf(builder.build()),
            bucket: config.bucket_name,
            presign_expiry: config.presign_expiry,
        })
    }

    /// Create from environment variables.
    pub async fn from_env() -> StorageResult<Self> {
        Self::new(S3Config::from_env()?).await
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// Stream an object into a local file.
    ///
    /// Bytes land in a `.part` sibling first and are renamed into place once
    /// complete, so a failed transfer never leaves a truncated `dest`.
    pub async fn download_to(&self, remote: &RemoteRef, dest: &Path) -> StorageResult<PathBuf> {
        debug!("Downloading {} to {}", remote, dest.display());
        let started = Instant::now();

        let response = self
            .client
            .get_object()
            .bucket(&remote.bucket)
            .key(&remote.key)
            .send()
            .await
            .map_err(|e| {
                let message = aws_sdk_s3::error::DisplayErrorContext(&e).to_string();
                if message.contains("NoSuchKey") {
                    StorageError::not_found(remote.to_string())
                } else {
                    StorageError::download_failed(message)
                }
            })?;

        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let partial = dest.with_extension("part");
        let mut file = tokio::fs::File::create(&partial).await?;
        let mut body = response.body.into_async_read();
        let written = tokio::io::copy(&mut body, &mut file).await.map_err(|e| {
            StorageError::download_failed(format!("{}: {}", remote, e))
        })?;
        file.flush().await?;
        drop(file);
        tokio::fs::rename(&partial, dest).await?;

        histogram!("adreel_download_duration_seconds").record(started.elapsed().as_secs_f64());
        info!(bytes = written, "Downloaded {} to {}", remote, dest.display());
        Ok(dest.to_path_buf())
    }

    /// Upload a file to `key`.
    pub async fn upload_file(&self, path: &Path, key: &str) -> StorageResult<()> {
        debug!("Uploading {} to {}", path.display(), key);
        let started = Instant::now();

        let body = ByteStream::from_path(path)
            .await
            .map_err(|e| StorageError::upload_failed(e.to_string()))?;

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(body)
            .content_type(content_type_for(path))
            .send()
            .await
            .map_err(|e| {
                StorageError::upload_failed(aws_sdk_s3::error::DisplayErrorContext(&e).to_string())
            })?;

        histogram!("adreel_upload_duration_seconds").record(started.elapsed().as_secs_f64());
        info!("Uploaded {} to s3://{}/{}", path.display(), self.bucket, key);
        Ok(())
    }

    /// Generate a presigned GET URL.
    pub async fn presign_get(&self, key: &str, expires_in: Duration) -> StorageResult<String> {
        let presign_config = PresigningConfig::expires_in(expires_in)
            .map_err(|e| StorageError::PresignFailed(e.to_string()))?;

        let request = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .presigned(presign_config)
            .await
            .map_err(|e| StorageError::PresignFailed(e.to_string()))?;

        Ok(request.uri().to_string())
    }

    /// Upload under a timestamped key and return a presigned GET URL.
    pub async fn upload_and_presign(&self, path: &Path) -> StorageResult<String> {
        if !path.is_file() {
            return Err(StorageError::upload_failed(format!(
                "{} does not exist",
                path.display()
            )));
        }

        let key = upload_key(path, chrono::Utc::now());
        self.upload_file(path, &key).await?;
        self.presign_get(&key, self.presign_expiry).await
    }
}
