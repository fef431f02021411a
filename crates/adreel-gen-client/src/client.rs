//! MiniMax HTTP client.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use crate::error::{GenError, GenResult};
use crate::service::GenerationService;
use crate::types::{
    CreateJobRequest, CreateJobResponse, PollResult, QueryJobResponse, RemoteStatus,
    RetrieveFileResponse, GENERATION_MODEL,
};

pub const DEFAULT_BASE_URL: &str = "https://api.minimaxi.chat/v1";

/// Configuration for the generation client.
#[derive(Debug, Clone)]
pub struct GenClientConfig {
    /// Base URL of the generation API
    pub base_url: String,
    /// Bearer token
    pub api_key: String,
    /// Request timeout
    pub timeout: Duration,
    /// Max retries for idempotent calls
    pub max_retries: u32,
}

impl Default for GenClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: String::new(),
            timeout: Duration::from_secs(120),
            max_retries: 2,
        }
    }
}

impl GenClientConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self {
            base_url: std::env::var("MINIMAX_BASE_URL")
                .unwrap_or_else(|_| DEFAULT_BASE_URL.to_string()),
            api_key: std::env::var("MINIMAX_API_KEY").unwrap_or_default(),
            timeout: Duration::from_secs(
                std::env::var("MINIMAX_TIMEOUT_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(120),
            ),
            max_retries: std::env::var("MINIMAX_RETRIES")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(2),
        }
    }
}

/// Client for the MiniMax video generation API.
pub struct MinimaxClient {
    http: Client,
    config: GenClientConfig,
}

impl MinimaxClient {
    /// Create a new client. Fails without an API key.
    pub fn new(config: GenClientConfig) -> GenResult<Self> {
        if config.api_key.trim().is_empty() {
            return Err(GenError::Config("MINIMAX_API_KEY not set".to_string()));
        }

        let http = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(GenError::Network)?;

        Ok(Self { http, config })
    }

    /// Create from environment variables.
    pub fn from_env() -> GenResult<Self> {
        Self::new(GenClientConfig::from_env())
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str, query: &[(&str, &str)]) -> GenResult<T> {
        let url = self.url(path);
        let response = self
            .with_retry(|| async {
                let response = self
                    .http
                    .get(&url)
                    .bearer_auth(&self.config.api_key)
                    .query(query)
                    .send()
                    .await
                    .map_err(GenError::Network)?;
                ensure_success(response).await
            })
            .await?;

        let body = response.text().await?;
        debug!(url = %url, body = %body, "Generation API response");
        Ok(serde_json::from_str(&body)?)
    }

    /// Execute with retry logic.
    async fn with_retry<F, Fut, T>(&self, operation: F) -> GenResult<T>
    where
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = GenResult<T>>,
    {
        let mut last_error = None;

        for attempt in 0..=self.config.max_retries {
            match operation().await {
                Ok(result) => return Ok(result),
                Err(e) if e.is_retryable() && attempt < self.config.max_retries => {
                    let delay = Duration::from_millis(500 * 2u64.pow(attempt));
                    warn!(
                        "Generation request failed (attempt {}), retrying in {:?}: {}",
                        attempt + 1,
                        delay,
                        e
                    );
                    tokio::time::sleep(delay).await;
                    last_error = Some(e);
                }
                Err(e) => return Err(e),
            }
        }

        Err(last_error.unwrap_or(GenError::RequestFailed("Unknown error".to_string())))
    }
}

pub(crate) async fn ensure_success(response: Response) -> GenResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let message = format!("generation service returned {}: {}", status, body);
    if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
        Err(GenError::ServiceUnavailable(message))
    } else {
        Err(GenError::RequestFailed(message))
    }
}

#[async_trait]
impl GenerationService for MinimaxClient {
    async fn create_job(&self, image_data_url: &str, prompt: &str) -> GenResult<String> {
        let url = self.url("/video_generation");
        let request = CreateJobRequest {
            model: GENERATION_MODEL,
            prompt,
            first_frame_image: image_data_url,
            prompt_optimizer: true,
        };

        // Submitted exactly once, never retried
        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .json(&request)
            .send()
            .await?;
        let response = ensure_success(response).await?;
        let body: CreateJobResponse = response.json().await?;
        body.base_resp.check()?;

        let task_id = body
            .task_id
            .filter(|id| !id.is_empty())
            .ok_or_else(|| GenError::invalid_response("No task_id returned from API"))?;

        info!(task_id = %task_id, "Generation task submitted");
        Ok(task_id)
    }

    async fn poll_job(&self, task_id: &str) -> GenResult<PollResult> {
        let body: QueryJobResponse = self
            .get_json("/query/video_generation", &[("task_id", task_id)])
            .await?;
        body.base_resp.check()?;

        let status = RemoteStatus::parse(body.status.as_deref().unwrap_or_default());
        let file_id = body.file_id.filter(|id| !id.is_empty());
        if status == RemoteStatus::Success && file_id.is_none() {
            return Err(GenError::invalid_response(
                "No file_id returned for successful task",
            ));
        }

        Ok(PollResult { status, file_id })
    }

    async fn fetch_result(&self, file_id: &str) -> GenResult<String> {
        let body: RetrieveFileResponse = self
            .get_json("/files/retrieve", &[("file_id", file_id)])
            .await?;
        body.base_resp.check()?;

        body.file
            .and_then(|f| f.download_url)
            .filter(|u| !u.is_empty())
            .ok_or_else(|| GenError::invalid_response("No download_url returned from API"))
    }

    async fn download(&self, url: &str, dest: &Path) -> GenResult<()> {
        debug!("Downloading generated video to {}", dest.display());

        let response = self.http.get(url).send().await?;
        let response = ensure_success(response).await?;

        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let mut file = tokio::fs::File::create(dest).await?;
        let mut stream = response.bytes_stream();
        let mut written = 0u64;
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            written += chunk.len() as u64;
            file.write_all(&chunk).await?;
        }
        file.flush().await?;

        info!(bytes = written, "Downloaded generated video to {}", dest.display());
        Ok(())
    }
}
