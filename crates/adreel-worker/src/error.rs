//! Worker error types.
//!
//! Every lower-level error is folded into one taxonomy so callers can
//! report `{stage?, kind, detail}` without knowing which crate failed.

use adreel_gen_client::GenError;
use adreel_media::MediaError;
use adreel_models::{
    CompositionSpecError, FailureDetail, FailureKind, FontError, JobTransitionError, Stage,
};
use adreel_queue::QueueError;
use adreel_storage::StorageError;
use thiserror::Error;

pub type WorkerResult<T> = Result<T, WorkerError>;

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Missing asset: {0}")]
    MissingAsset(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Transfer failed: {0}")]
    Transfer(String),

    /// `code` is the remote application status, absent for HTTP-level failures
    #[error("Remote service error: {message}")]
    RemoteService { code: Option<i64>, message: String },

    #[error("Processing failed: {0}")]
    Processing(String),

    #[error("{stage} stage failed: {source}")]
    Stage {
        stage: Stage,
        #[source]
        source: Box<WorkerError>,
    },

    #[error("Timed out waiting for video generation after {attempts} attempts")]
    Timeout { attempts: u32 },

    #[error("Queue error: {0}")]
    Queue(#[from] QueueError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl WorkerError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn remote(code: Option<i64>, message: impl Into<String>) -> Self {
        Self::RemoteService {
            code,
            message: message.into(),
        }
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Tag an error with the pipeline stage it happened in.
    pub fn at_stage(self, stage: Stage) -> Self {
        match self {
            tagged @ WorkerError::Stage { .. } => tagged,
            other => WorkerError::Stage {
                stage,
                source: Box::new(other),
            },
        }
    }

    /// Stage the error is attributed to, if any.
    pub fn stage(&self) -> Option<Stage> {
        match self {
            WorkerError::Stage { stage, .. } => Some(*stage),
            _ => None,
        }
    }

    pub fn kind(&self) -> FailureKind {
        match self {
            WorkerError::Validation(_) => FailureKind::Validation,
            WorkerError::MissingAsset(_) => FailureKind::MissingAsset,
            WorkerError::InvalidConfiguration(_) => FailureKind::InvalidConfiguration,
            WorkerError::Transfer(_) => FailureKind::Transfer,
            WorkerError::RemoteService { .. } => FailureKind::RemoteService,
            WorkerError::Processing(_) => FailureKind::CompositionStage,
            WorkerError::Stage { source, .. } => source.kind(),
            WorkerError::Timeout { .. } => FailureKind::Timeout,
            WorkerError::Queue(_) | WorkerError::Io(_) | WorkerError::Internal(_) => {
                FailureKind::Internal
            }
        }
    }

    /// Message without the stage prefix.
    pub fn detail(&self) -> String {
        match self {
            WorkerError::Validation(msg)
            | WorkerError::MissingAsset(msg)
            | WorkerError::InvalidConfiguration(msg)
            | WorkerError::Transfer(msg)
            | WorkerError::Processing(msg)
            | WorkerError::Internal(msg) => msg.clone(),
            WorkerError::RemoteService { message, .. } => message.clone(),
            WorkerError::Stage { source, .. } => source.detail(),
            other => other.to_string(),
        }
    }

    fn remote_code(&self) -> Option<i64> {
        match self {
            WorkerError::RemoteService { code, .. } => *code,
            WorkerError::Stage { source, .. } => source.remote_code(),
            _ => None,
        }
    }

    /// Structured form stored on jobs and returned to callers.
    pub fn to_failure_detail(&self) -> FailureDetail {
        let mut detail = FailureDetail::new(self.kind(), self.detail());
        if let Some(stage) = self.stage() {
            detail = detail.with_stage(stage);
        }
        if let Some(code) = self.remote_code() {
            detail = detail.with_code(code);
        }
        detail
    }

    /// Check if error is retryable.
    pub fn is_retryable(&self) -> bool {
        match self {
            WorkerError::Transfer(_) | WorkerError::Io(_) => true,
            WorkerError::Queue(e) => e.is_retryable(),
            WorkerError::Stage { source, .. } => source.is_retryable(),
            _ => false,
        }
    }
}

impl From<MediaError> for WorkerError {
    fn from(err: MediaError) -> Self {
        match err {
            MediaError::FileNotFound(path) => {
                WorkerError::MissingAsset(format!("{} does not exist", path.display()))
            }
            MediaError::Validation(msg) => WorkerError::Validation(msg),
            MediaError::InvalidConfiguration(msg) => WorkerError::InvalidConfiguration(msg),
            missing @ (MediaError::FfmpegNotFound | MediaError::FfprobeNotFound) => {
                WorkerError::InvalidConfiguration(missing.to_string())
            }
            MediaError::FfmpegFailed {
                message, stderr, ..
            } => match stderr {
                Some(tail) if !tail.is_empty() => {
                    WorkerError::Processing(format!("{}: {}", message, tail))
                }
                _ => WorkerError::Processing(message),
            },
            other => WorkerError::Processing(other.to_string()),
        }
    }
}

impl From<StorageError> for WorkerError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound(key) => WorkerError::MissingAsset(key),
            StorageError::InvalidUrl(msg) => {
                WorkerError::Validation(format!("invalid asset reference: {}", msg))
            }
            StorageError::ConfigError(msg) => WorkerError::InvalidConfiguration(msg),
            other => WorkerError::Transfer(other.to_string()),
        }
    }
}

impl From<GenError> for WorkerError {
    fn from(err: GenError) -> Self {
        match err {
            GenError::RemoteService { code, message } => WorkerError::remote(Some(code), message),
            GenError::Config(msg) => WorkerError::InvalidConfiguration(msg),
            GenError::Io(e) => WorkerError::Io(e),
            other => WorkerError::remote(None, other.to_string()),
        }
    }
}

impl From<CompositionSpecError> for WorkerError {
    fn from(err: CompositionSpecError) -> Self {
        WorkerError::Validation(err.to_string())
    }
}

impl From<FontError> for WorkerError {
    fn from(err: FontError) -> Self {
        MediaError::from(err).into()
    }
}

impl From<JobTransitionError> for WorkerError {
    fn from(err: JobTransitionError) -> Self {
        WorkerError::Internal(err.to_string())
    }
}
