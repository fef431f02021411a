//! Text-to-image client for generating source stills.
//!
//! Stills feed the image-to-video flow as first frames. Two Segmind models are
//! supported: Juggernaut Pro Flux, which renders a portrait 576x1024 frame from
//! a photorealistic-selfie system prompt, and GPT-Image-1.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use tracing::{info, warn};

use crate::client::ensure_success;
use crate::error::{GenError, GenResult};

pub const SEGMIND_BASE_URL: &str = "https://api.segmind.com/v1";

/// Prepended to every Flux prompt.
pub const STILL_SYSTEM_PROMPT: &str = "A photorealistic selfie of a person facing the camera \
zoomed out a bit, with a friendly smile, in a realistic setting like a cafe or park, with natural \
lighting, sharp details, shot with a high-end smartphone";

pub const STILL_NEGATIVE_PROMPT: &str = "cartoon, blurry, low quality, extra limbs, deformed";

/// Portrait still size, 9:16.
pub const STILL_WIDTH: u32 = 576;
pub const STILL_HEIGHT: u32 = 1024;

const FLUX_STEPS: u32 = 25;
const FLUX_SEED: u64 = 1_184_522;
const FLUX_CFG_SCALE: u32 = 7;

/// Remote text-to-image model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StillModel {
    #[default]
    JuggernautFlux,
    GptImage,
}

impl StillModel {
    pub fn endpoint(&self) -> &'static str {
        match self {
            StillModel::JuggernautFlux => "/juggernaut-pro-flux",
            StillModel::GptImage => "/gpt-image-1",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "flux" | "juggernaut-pro-flux" => Some(StillModel::JuggernautFlux),
            "gpt-image-1" | "gpt-image" => Some(StillModel::GptImage),
            _ => None,
        }
    }
}

/// Body of `POST /juggernaut-pro-flux`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FluxRequest {
    pub positive_prompt: String,
    pub negative_prompt: &'static str,
    pub width: u32,
    pub height: u32,
    pub steps: u32,
    pub seed: u64,
    #[serde(rename = "CFGScale")]
    pub cfg_scale: u32,
    pub output_format: &'static str,
    pub scheduler: &'static str,
}

impl FluxRequest {
    pub fn new(prompt: &str) -> Self {
        Self {
            positive_prompt: format!("{}. {}", STILL_SYSTEM_PROMPT, prompt.trim()),
            negative_prompt: STILL_NEGATIVE_PROMPT,
            width: STILL_WIDTH,
            height: STILL_HEIGHT,
            steps: FLUX_STEPS,
            seed: FLUX_SEED,
            cfg_scale: FLUX_CFG_SCALE,
            output_format: "JPG",
            scheduler: "Euler",
        }
    }
}

/// Body of `POST /gpt-image-1`.
#[derive(Debug, Clone, Serialize)]
pub struct GptImageRequest<'a> {
    pub prompt: &'a str,
    pub size: &'static str,
    pub quality: &'static str,
    pub background: &'static str,
    pub output_compression: u8,
    pub output_format: &'static str,
}

impl<'a> GptImageRequest<'a> {
    pub fn new(prompt: &'a str) -> Self {
        Self {
            prompt,
            size: "auto",
            quality: "auto",
            background: "opaque",
            output_compression: 100,
            output_format: "png",
        }
    }
}

/// A still written to disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedStill {
    pub path: PathBuf,
    pub bytes: u64,
    /// `x-remaining-credits` reported by the service
    pub remaining_credits: Option<String>,
}

/// Remote text-to-image service.
#[async_trait]
pub trait StillGenerationService: Send + Sync {
    /// Render `prompt` and write the image bytes to `dest`.
    async fn generate_still(&self, prompt: &str, dest: &Path) -> GenResult<GeneratedStill>;
}

#[derive(Debug, Clone)]
pub struct StillClientConfig {
    pub base_url: String,
    pub api_key: String,
    pub model: StillModel,
    pub timeout: Duration,
}

impl Default for StillClientConfig {
    fn default() -> Self {
        Self {
            base_url: SEGMIND_BASE_URL.to_string(),
            api_key: String::new(),
            model: StillModel::default(),
            timeout: Duration::from_secs(30),
        }
    }
}

impl StillClientConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let model = match std::env::var("SEGMIND_MODEL") {
            Ok(value) => StillModel::parse(&value).unwrap_or_else(|| {
                warn!("Unknown SEGMIND_MODEL '{}', using juggernaut-pro-flux", value);
                StillModel::default()
            }),
            Err(_) => StillModel::default(),
        };

        Self {
            base_url: std::env::var("SEGMIND_BASE_URL")
                .unwrap_or_else(|_| SEGMIND_BASE_URL.to_string()),
            api_key: std::env::var("SEGMIND_API_KEY").unwrap_or_default(),
            model,
            timeout: Duration::from_secs(
                std::env::var("SEGMIND_TIMEOUT_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(30),
            ),
        }
    }
}

/// Client for Segmind's text-to-image endpoints.
pub struct SegmindClient {
    http: Client,
    config: StillClientConfig,
}

impl SegmindClient {
    /// Create a new client. Fails without an API key.
    pub fn new(config: StillClientConfig) -> GenResult<Self> {
        if config.api_key.trim().is_empty() {
            return Err(GenError::Config("SEGMIND_API_KEY not set".to_string()));
        }

        let http = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(GenError::Network)?;

        Ok(Self { http, config })
    }

    pub fn from_env() -> GenResult<Self> {
        Self::new(StillClientConfig::from_env())
    }

    pub fn model(&self) -> StillModel {
        self.config.model
    }

    fn url(&self) -> String {
        format!(
            "{}{}",
            self.config.base_url.trim_end_matches('/'),
            self.config.model.endpoint()
        )
    }
}

#[async_trait]
impl StillGenerationService for SegmindClient {
    async fn generate_still(&self, prompt: &str, dest: &Path) -> GenResult<GeneratedStill> {
        if prompt.trim().is_empty() {
            return Err(GenError::RequestFailed("prompt is empty".to_string()));
        }

        let request = self.http.post(self.url()).header("x-api-key", &self.config.api_key);
        let request = match self.config.model {
            StillModel::JuggernautFlux => request.json(&FluxRequest::new(prompt)),
            StillModel::GptImage => request.json(&GptImageRequest::new(prompt)),
        };

        // Sent once, never retried
        let response = ensure_success(request.send().await?).await?;
        let remaining_credits = response
            .headers()
            .get("x-remaining-credits")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        let body = response.bytes().await?;
        if body.is_empty() {
            return Err(GenError::invalid_response("Empty image body"));
        }

        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(dest, &body).await?;

        info!(
            model = ?self.config.model,
            bytes = body.len(),
            remaining_credits = remaining_credits.as_deref().unwrap_or("N/A"),
            "Generated still {}",
            dest.display()
        );

        Ok(GeneratedStill {
            path: dest.to_path_buf(),
            bytes: body.len() as u64,
            remaining_credits,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_json, body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer, model: StillModel) -> SegmindClient {
        SegmindClient::new(StillClientConfig {
            base_url: server.uri(),
            api_key: "seg-key".to_string(),
            model,
            timeout: Duration::from_secs(5),
        })
        .unwrap()
    }

    #[test]
    fn test_flux_request_wire_names() {
        let value = serde_json::to_value(FluxRequest::new("diner at 3am")).unwrap();
        assert_eq!(value["width"], 576);
        assert_eq!(value["height"], 1024);
        assert_eq!(value["CFGScale"], 7);
        assert_eq!(value["outputFormat"], "JPG");
        assert_eq!(value["negativePrompt"], STILL_NEGATIVE_PROMPT);
        let positive = value["positivePrompt"].as_str().unwrap();
        assert!(positive.starts_with(STILL_SYSTEM_PROMPT));
        assert!(positive.ends_with(". diner at 3am"));
    }

    #[test]
    fn test_model_parse() {
        assert_eq!(StillModel::parse("GPT-Image-1"), Some(StillModel::GptImage));
        assert_eq!(StillModel::parse("flux"), Some(StillModel::JuggernautFlux));
        assert_eq!(StillModel::parse("sdxl"), None);
    }

    #[test]
    fn test_missing_api_key_rejected() {
        assert!(matches!(
            SegmindClient::new(StillClientConfig::default()),
            Err(GenError::Config(_))
        ));
    }

    #[tokio::test]
    async fn test_flux_still_written_to_disk() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/juggernaut-pro-flux"))
            .and(header("x-api-key", "seg-key"))
            .and(body_partial_json(json!({
                "width": 576,
                "height": 1024,
                "seed": 1184522,
                "scheduler": "Euler"
            })))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("x-remaining-credits", "41.5")
                    .set_body_bytes(b"\xff\xd8jpeg".to_vec()),
            )
            .expect(1)
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("stills/selfie.jpg");
        let still = client_for(&server, StillModel::JuggernautFlux)
            .generate_still("woman on a park bench", &dest)
            .await
            .unwrap();

        assert_eq!(still.bytes, 6);
        assert_eq!(still.remaining_credits.as_deref(), Some("41.5"));
        assert_eq!(std::fs::read(&dest).unwrap(), b"\xff\xd8jpeg");
    }

    #[tokio::test]
    async fn test_gpt_image_sends_prompt_verbatim() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/gpt-image-1"))
            .and(body_json(json!({
                "prompt": "a red bicycle",
                "size": "auto",
                "quality": "auto",
                "background": "opaque",
                "output_compression": 100,
                "output_format": "png"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"\x89PNG".to_vec()))
            .expect(1)
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("bike.png");
        let still = client_for(&server, StillModel::GptImage)
            .generate_still("a red bicycle", &dest)
            .await
            .unwrap();
        assert!(still.remaining_credits.is_none());
        assert!(dest.exists());
    }

    #[tokio::test]
    async fn test_server_error_is_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/juggernaut-pro-flux"))
            .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
            .expect(1)
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("out.jpg");
        let err = client_for(&server, StillModel::JuggernautFlux)
            .generate_still("anything", &dest)
            .await
            .unwrap_err();
        assert!(matches!(err, GenError::ServiceUnavailable(_)));
        assert!(!dest.exists());
    }

    #[tokio::test]
    async fn test_rejected_request_and_empty_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/gpt-image-1"))
            .respond_with(ResponseTemplate::new(401).set_body_string("bad key"))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/juggernaut-pro-flux"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("out.img");

        let err = client_for(&server, StillModel::GptImage)
            .generate_still("x", &dest)
            .await
            .unwrap_err();
        assert!(matches!(err, GenError::RequestFailed(_)));

        let err = client_for(&server, StillModel::JuggernautFlux)
            .generate_still("x", &dest)
            .await
            .unwrap_err();
        assert!(matches!(err, GenError::InvalidResponse(_)));
    }

    #[tokio::test]
    async fn test_empty_prompt_never_sent() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"img".to_vec()))
            .expect(0)
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let err = client_for(&server, StillModel::JuggernautFlux)
            .generate_still("   ", &dir.path().join("out.jpg"))
            .await
            .unwrap_err();
        assert!(matches!(err, GenError::RequestFailed(_)));
    }
}
