//! The remote generation seam used by the job engine.

use std::path::Path;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;

use crate::error::GenResult;
use crate::types::PollResult;

/// Remote image-to-video service.
#[async_trait]
pub trait GenerationService: Send + Sync {
    /// Submit a job, returning the remote task id.
    async fn create_job(&self, image_data_url: &str, prompt: &str) -> GenResult<String>;

    /// Query a job's status.
    async fn poll_job(&self, task_id: &str) -> GenResult<PollResult>;

    /// Resolve a finished job's file id to a download URL.
    async fn fetch_result(&self, file_id: &str) -> GenResult<String>;

    /// Download `url` to `dest`.
    async fn download(&self, url: &str, dest: &Path) -> GenResult<()>;
}

/// Encode image bytes as a `data:` URL.
pub fn image_data_url(mime_type: &str, bytes: &[u8]) -> String {
    format!("data:{};base64,{}", mime_type, STANDARD.encode(bytes))
}
