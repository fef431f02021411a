//! Structured logging for generation jobs.
//!
//! Every line carries the job id and the remote task id so one job can be
//! followed across the submit call and its queued polls.

use tracing::{error, info, warn, Span};

use adreel_models::{GenerationJob, JobId};

/// Job logger with consistent fields.
#[derive(Debug, Clone)]
pub struct JobLogger {
    job_id: String,
    operation: String,
}

impl JobLogger {
    /// Create a logger for a job and operation (e.g. "submit", "poll").
    pub fn new(job_id: &JobId, operation: &str) -> Self {
        Self {
            job_id: job_id.to_string(),
            operation: operation.to_string(),
        }
    }

    pub fn from_string(job_id: &str, operation: &str) -> Self {
        Self {
            job_id: job_id.to_string(),
            operation: operation.to_string(),
        }
    }

    pub fn log_start(&self, message: &str) {
        info!(
            job_id = %self.job_id,
            operation = %self.operation,
            "Job started: {}", message
        );
    }

    /// Log a poll that found the remote job still running.
    pub fn log_attempt(&self, job: &GenerationJob, remote_status: &str) {
        info!(
            job_id = %self.job_id,
            operation = %self.operation,
            task_id = %job.remote_task_id,
            attempt = job.attempts,
            max_attempts = job.max_attempts,
            remote_status,
            "Job progress: {}", job.progress_marker()
        );
    }

    pub fn log_warning(&self, message: &str) {
        warn!(
            job_id = %self.job_id,
            operation = %self.operation,
            "Job warning: {}", message
        );
    }

    pub fn log_error(&self, message: &str) {
        error!(
            job_id = %self.job_id,
            operation = %self.operation,
            "Job error: {}", message
        );
    }

    pub fn log_completion(&self, message: &str) {
        info!(
            job_id = %self.job_id,
            operation = %self.operation,
            "Job completed: {}", message
        );
    }

    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    pub fn operation(&self) -> &str {
        &self.operation
    }

    /// Span covering one unit of work on this job.
    pub fn create_span(&self) -> Span {
        tracing::info_span!(
            "generation_job",
            job_id = %self.job_id,
            operation = %self.operation
        )
    }
}
