//! Job types for the queue.

use adreel_models::JobId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One status query against the remote generation service.
///
/// Each poll is its own unit of work; a poll that finds the remote job still
/// running schedules the next attempt instead of sleeping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollGenerationJob {
    pub job_id: JobId,
    /// 1-based attempt number
    pub attempt: u32,
    pub scheduled_at: DateTime<Utc>,
}

impl PollGenerationJob {
    /// First poll for a freshly submitted job.
    pub fn first(job_id: JobId) -> Self {
        Self {
            job_id,
            attempt: 1,
            scheduled_at: Utc::now(),
        }
    }

    /// The poll that follows this one.
    pub fn next(&self) -> Self {
        Self {
            job_id: self.job_id.clone(),
            attempt: self.attempt + 1,
            scheduled_at: Utc::now(),
        }
    }

    /// Generate idempotency key for deduplication.
    pub fn idempotency_key(&self) -> String {
        format!("poll:{}:{}", self.job_id, self.attempt)
    }
}

/// Generic job wrapper for queue storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum QueueJob {
    PollGeneration(PollGenerationJob),
}

impl QueueJob {
    pub fn job_id(&self) -> &JobId {
        match self {
            QueueJob::PollGeneration(j) => &j.job_id,
        }
    }

    pub fn idempotency_key(&self) -> String {
        match self {
            QueueJob::PollGeneration(j) => j.idempotency_key(),
        }
    }
}
