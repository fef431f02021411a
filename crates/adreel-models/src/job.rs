//! Image-to-video generation jobs.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

use crate::failure::FailureDetail;

/// Unique identifier for a job.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct JobId(pub String);

impl JobId {
    /// Generate a new random job ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Create from an existing string.
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get the inner string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle of a generation job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum GenerationState {
    /// Remote job created, no poll has completed yet
    #[default]
    Pending,
    /// At least one poll reported the remote job as still running
    Polling,
    Succeeded,
    Failed,
}

impl GenerationState {
    pub fn as_str(&self) -> &'static str {
        match self {
            GenerationState::Pending => "pending",
            GenerationState::Polling => "polling",
            GenerationState::Succeeded => "succeeded",
            GenerationState::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, GenerationState::Succeeded | GenerationState::Failed)
    }
}

impl fmt::Display for GenerationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum JobTransitionError {
    #[error("Job {job_id} is already {state}")]
    AlreadyTerminal { job_id: JobId, state: GenerationState },
}

/// One remote generation request, from submission to terminal state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct GenerationJob {
    pub job_id: JobId,
    /// Reference the source image was submitted as
    pub source_image: String,
    pub prompt: String,
    pub state: GenerationState,
    /// Identifier the remote service assigned on creation
    pub remote_task_id: String,
    /// Polls performed so far
    pub attempts: u32,
    pub max_attempts: u32,
    /// Reference to the normalized result (Succeeded only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
    /// Captured failure (Failed only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<FailureDetail>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl GenerationJob {
    pub fn new(
        source_image: impl Into<String>,
        prompt: impl Into<String>,
        remote_task_id: impl Into<String>,
        max_attempts: u32,
    ) -> Self {
        let now = Utc::now();
        Self {
            job_id: JobId::new(),
            source_image: source_image.into(),
            prompt: prompt.into(),
            state: GenerationState::Pending,
            remote_task_id: remote_task_id.into(),
            attempts: 0,
            max_attempts,
            result: None,
            error: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_id(mut self, job_id: JobId) -> Self {
        self.job_id = job_id;
        self
    }

    fn ensure_open(&self) -> Result<(), JobTransitionError> {
        if self.state.is_terminal() {
            return Err(JobTransitionError::AlreadyTerminal {
                job_id: self.job_id.clone(),
                state: self.state,
            });
        }
        Ok(())
    }

    /// Record a poll that found the remote job still running.
    pub fn record_attempt(&mut self, attempt: u32) -> Result<(), JobTransitionError> {
        self.ensure_open()?;
        self.state = GenerationState::Polling;
        self.attempts = attempt;
        self.updated_at = Utc::now();
        Ok(())
    }

    pub fn succeed(&mut self, result: impl Into<String>) -> Result<(), JobTransitionError> {
        self.ensure_open()?;
        self.state = GenerationState::Succeeded;
        self.result = Some(result.into());
        self.updated_at = Utc::now();
        Ok(())
    }

    pub fn fail(&mut self, detail: FailureDetail) -> Result<(), JobTransitionError> {
        self.ensure_open()?;
        self.state = GenerationState::Failed;
        self.error = Some(detail);
        self.updated_at = Utc::now();
        Ok(())
    }

    pub fn attempts_exhausted(&self) -> bool {
        self.attempts >= self.max_attempts
    }

    /// Human-readable progress, e.g. "attempt 3 of 30".
    pub fn progress_marker(&self) -> String {
        format!("attempt {} of {}", self.attempts, self.max_attempts)
    }

    /// Outward-facing view of this job.
    pub fn status(&self) -> GenerationStatus {
        match self.state {
            GenerationState::Pending => GenerationStatus::Pending,
            GenerationState::Polling => GenerationStatus::InProgress {
                progress: self.progress_marker(),
            },
            GenerationState::Succeeded => GenerationStatus::Succeeded {
                result: self.result.clone().unwrap_or_default(),
            },
            GenerationState::Failed => GenerationStatus::Failed {
                error: self.error.clone().unwrap_or_else(|| {
                    FailureDetail::new(crate::FailureKind::Internal, "no error detail recorded")
                }),
            },
        }
    }
}

/// Status query answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum GenerationStatus {
    Pending,
    InProgress { progress: String },
    Succeeded { result: String },
    Failed { error: FailureDetail },
    /// The id was never issued or its record outlived the retention window
    Unknown,
}

impl GenerationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            GenerationStatus::Pending => "pending",
            GenerationStatus::InProgress { .. } => "in_progress",
            GenerationStatus::Succeeded { .. } => "succeeded",
            GenerationStatus::Failed { .. } => "failed",
            GenerationStatus::Unknown => "unknown",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::FailureKind;

    fn job() -> GenerationJob {
        GenerationJob::new("s3://bucket/photo.png", "a prompt", "task-1", 30)
    }

    #[test]
    fn test_new_job_is_pending() {
        let job = job();
        assert_eq!(job.state, GenerationState::Pending);
        assert_eq!(job.status(), GenerationStatus::Pending);
        assert_eq!(job.attempts, 0);
    }

    #[test]
    fn test_progress_marker() {
        let mut job = job();
        job.record_attempt(3).unwrap();
        assert_eq!(
            job.status(),
            GenerationStatus::InProgress {
                progress: "attempt 3 of 30".to_string()
            }
        );
    }

    #[test]
    fn test_terminal_states_are_immutable() {
        let mut job = job();
        job.succeed("https://cdn/result.mp4").unwrap();

        assert!(matches!(
            job.fail(FailureDetail::new(FailureKind::Timeout, "late")),
            Err(JobTransitionError::AlreadyTerminal {
                state: GenerationState::Succeeded,
                ..
            })
        ));
        assert!(job.record_attempt(4).is_err());
        assert_eq!(job.result.as_deref(), Some("https://cdn/result.mp4"));
        assert!(job.error.is_none());
    }

    #[test]
    fn test_status_serialization() {
        let mut job = job();
        job.fail(
            FailureDetail::new(FailureKind::RemoteService, "invalid api key").with_code(1004),
        )
        .unwrap();
        let json = serde_json::to_value(job.status()).unwrap();
        assert_eq!(json["status"], "failed");
        assert_eq!(json["error"]["code"], 1004);
        assert_eq!(json["error"]["message"], "invalid api key");

        let unknown = serde_json::to_value(GenerationStatus::Unknown).unwrap();
        assert_eq!(unknown, serde_json::json!({ "status": "unknown" }));
    }

    #[test]
    fn test_job_id_roundtrip() {
        let id = JobId::new();
        let json = serde_json::to_string(&id).unwrap();
        let back: JobId = serde_json::from_str(&json).unwrap();
        assert_eq!(id, back);
    }
}
