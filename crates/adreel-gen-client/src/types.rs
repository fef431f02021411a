//! Generation service request/response types.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{GenError, GenResult};

/// Remote model used for image-to-video generation.
pub const GENERATION_MODEL: &str = "I2V-01-Director";

/// Prompt used when the caller does not supply one.
pub const DEFAULT_PROMPT: &str = "A romantic scene grows out of the input image in a vertical 9:16 \
frame: an elegant restaurant at dusk, lit by flickering candles. The girl sits at a finely set \
table, smiles softly and raises a wine glass, eyes bright with warmth. She tucks a strand of hair \
behind her ear while her date leans in and they share a quiet laugh. The vertical framing keeps \
the intimate table and the chandeliers overhead in view. The camera opens on a [Static shot] of \
the tender moment, [Pushes in] on the girl's glowing smile, and finishes with a [Tilt up] across \
the warm restaurant decor, with cinematic lighting and smooth, fluid motion.";

/// Status block present on every response.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BaseResp {
    #[serde(default = "unknown_code")]
    pub status_code: i64,
    #[serde(default)]
    pub status_msg: String,
}

fn unknown_code() -> i64 {
    -1
}

impl BaseResp {
    /// Fail on any non-zero status code.
    pub fn check(&self) -> GenResult<()> {
        if self.status_code == 0 {
            Ok(())
        } else {
            let message = if self.status_msg.is_empty() {
                "Unknown error".to_string()
            } else {
                self.status_msg.clone()
            };
            Err(GenError::remote(self.status_code, message))
        }
    }
}

/// Body of `POST /video_generation`.
#[derive(Debug, Clone, Serialize)]
pub struct CreateJobRequest<'a> {
    pub model: &'a str,
    pub prompt: &'a str,
    pub first_frame_image: &'a str,
    pub prompt_optimizer: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateJobResponse {
    #[serde(default)]
    pub task_id: Option<String>,
    #[serde(default = "missing_base_resp")]
    pub base_resp: BaseResp,
}

#[derive(Debug, Clone, Deserialize)]
pub struct QueryJobResponse {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub file_id: Option<String>,
    #[serde(default = "missing_base_resp")]
    pub base_resp: BaseResp,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FileInfo {
    #[serde(default)]
    pub download_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RetrieveFileResponse {
    #[serde(default)]
    pub file: Option<FileInfo>,
    #[serde(default = "missing_base_resp")]
    pub base_resp: BaseResp,
}

fn missing_base_resp() -> BaseResp {
    BaseResp {
        status_code: -1,
        status_msg: "Unknown error".to_string(),
    }
}

/// Remote job status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteStatus {
    Queueing,
    Preparing,
    Processing,
    Success,
    Fail,
    Unknown,
    /// Any string the service is not known to send
    Unrecognized(String),
}

impl RemoteStatus {
    pub fn parse(value: &str) -> Self {
        match value {
            "Queueing" => Self::Queueing,
            "Preparing" => Self::Preparing,
            "Processing" => Self::Processing,
            "Success" => Self::Success,
            "Fail" => Self::Fail,
            "Unknown" => Self::Unknown,
            other => Self::Unrecognized(other.to_string()),
        }
    }

    /// The job is still running remotely.
    pub fn is_in_flight(&self) -> bool {
        matches!(self, Self::Queueing | Self::Preparing | Self::Processing)
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Queueing => "Queueing",
            Self::Preparing => "Preparing",
            Self::Processing => "Processing",
            Self::Success => "Success",
            Self::Fail => "Fail",
            Self::Unknown => "Unknown",
            Self::Unrecognized(s) => s,
        }
    }
}

impl fmt::Display for RemoteStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of one status query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollResult {
    pub status: RemoteStatus,
    /// Set once the job succeeded
    pub file_id: Option<String>,
}

impl PollResult {
    pub fn new(status: RemoteStatus) -> Self {
        Self {
            status,
            file_id: None,
        }
    }

    pub fn success(file_id: impl Into<String>) -> Self {
        Self {
            status: RemoteStatus::Success,
            file_id: Some(file_id.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_parse() {
        assert_eq!(RemoteStatus::parse("Queueing"), RemoteStatus::Queueing);
        assert_eq!(RemoteStatus::parse("Success"), RemoteStatus::Success);
        assert_eq!(
            RemoteStatus::parse("success"),
            RemoteStatus::Unrecognized("success".to_string())
        );
        assert!(RemoteStatus::parse("Preparing").is_in_flight());
        assert!(!RemoteStatus::parse("Unknown").is_in_flight());
    }

    #[test]
    fn test_base_resp_check() {
        let ok: QueryJobResponse =
            serde_json::from_str(r#"{"status":"Processing","base_resp":{"status_code":0,"status_msg":"success"}}"#)
                .unwrap();
        assert!(ok.base_resp.check().is_ok());

        let missing: QueryJobResponse = serde_json::from_str(r#"{"status":"Processing"}"#).unwrap();
        assert!(matches!(
            missing.base_resp.check(),
            Err(GenError::RemoteService { code: -1, .. })
        ));

        let denied: CreateJobResponse = serde_json::from_str(
            r#"{"task_id":"","base_resp":{"status_code":1008,"status_msg":"insufficient balance"}}"#,
        )
        .unwrap();
        match denied.base_resp.check() {
            Err(GenError::RemoteService { code, message }) => {
                assert_eq!(code, 1008);
                assert_eq!(message, "insufficient balance");
            }
            other => panic!("unexpected {:?}", other),
        }
    }
}
