//! Structured failure details.
//!
//! Every failure surfaced to a caller separates *which step* failed
//! ([`Stage`]) from *why* ([`FailureKind`] plus a message).

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Logical stage of a composition run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Download,
    Overlay,
    Combine,
    Bgm,
    Upload,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Download => "download",
            Stage::Overlay => "overlay",
            Stage::Combine => "combine",
            Stage::Bgm => "bgm",
            Stage::Upload => "upload",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Error taxonomy shared by the pipeline, the job engine and the API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Validation,
    MissingAsset,
    InvalidConfiguration,
    Transfer,
    RemoteService,
    CompositionStage,
    Timeout,
    Internal,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::Validation => "validation",
            FailureKind::MissingAsset => "missing_asset",
            FailureKind::InvalidConfiguration => "invalid_configuration",
            FailureKind::Transfer => "transfer",
            FailureKind::RemoteService => "remote_service",
            FailureKind::CompositionStage => "composition_stage",
            FailureKind::Timeout => "timeout",
            FailureKind::Internal => "internal",
        }
    }
}

/// Captured failure, as stored on jobs and returned to callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct FailureDetail {
    pub kind: FailureKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stage: Option<Stage>,
    /// Application status code reported by a remote service
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<i64>,
    pub message: String,
}

impl FailureDetail {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            stage: None,
            code: None,
            message: message.into(),
        }
    }

    pub fn with_stage(mut self, stage: Stage) -> Self {
        self.stage = Some(stage);
        self
    }

    pub fn with_code(mut self, code: i64) -> Self {
        self.code = Some(code);
        self
    }
}

impl std::fmt::Display for FailureDetail {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(stage) = self.stage {
            write!(f, "[{}] ", stage)?;
        }
        write!(f, "{}: {}", self.kind.as_str(), self.message)
    }
}
