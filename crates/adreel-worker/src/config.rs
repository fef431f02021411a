//! Worker configuration.

use std::path::PathBuf;
use std::time::Duration;

/// Worker configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Maximum concurrent poll jobs
    pub max_concurrent_jobs: usize,
    /// Root for per-run workspaces and generation downloads
    pub work_dir: PathBuf,
    /// Directory holding the caption font files
    pub fonts_dir: PathBuf,
    /// Delay between consecutive polls of one generation job
    pub poll_interval: Duration,
    /// Poll budget per generation job
    pub poll_max_attempts: u32,
    /// How long job records survive their last update
    pub job_retention: Duration,
    /// How often due polls are moved onto the stream
    pub promote_interval: Duration,
    /// How often the worker should scan for orphaned pending jobs
    pub claim_interval: Duration,
    /// Graceful shutdown timeout
    pub shutdown_timeout: Duration,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            max_concurrent_jobs: 4,
            work_dir: PathBuf::from("/tmp/adreel"),
            fonts_dir: PathBuf::from("fonts"),
            poll_interval: Duration::from_secs(20),
            poll_max_attempts: 30,
            job_retention: Duration::from_secs(3600),
            promote_interval: Duration::from_secs(1),
            claim_interval: Duration::from_secs(30),
            shutdown_timeout: Duration::from_secs(60),
        }
    }
}

impl WorkerConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            max_concurrent_jobs: std::env::var("WORKER_MAX_JOBS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.max_concurrent_jobs),
            work_dir: std::env::var("WORK_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.work_dir),
            fonts_dir: std::env::var("FONTS_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.fonts_dir),
            poll_interval: Duration::from_secs(
                std::env::var("POLL_INTERVAL_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(20),
            ),
            poll_max_attempts: std::env::var("POLL_MAX_ATTEMPTS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.poll_max_attempts),
            job_retention: Duration::from_secs(
                std::env::var("JOB_RETENTION_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(3600),
            ),
            promote_interval: Duration::from_millis(
                std::env::var("WORKER_PROMOTE_INTERVAL_MS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(1000),
            ),
            claim_interval: Duration::from_secs(
                std::env::var("WORKER_CLAIM_INTERVAL_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(30),
            ),
            shutdown_timeout: Duration::from_secs(
                std::env::var("WORKER_SHUTDOWN_TIMEOUT")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(60),
            ),
        }
    }

    /// Directory generation results are downloaded and normalized in.
    pub fn generation_dir(&self) -> PathBuf {
        self.work_dir.join("generated")
    }

    /// Fresh workspace directory for one composition run.
    pub fn run_dir(&self, run_id: &str) -> PathBuf {
        self.work_dir.join("runs").join(run_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_poll_budget() {
        let config = WorkerConfig::default();
        assert_eq!(config.poll_interval, Duration::from_secs(20));
        assert_eq!(config.poll_max_attempts, 30);
        assert_eq!(config.job_retention, Duration::from_secs(3600));
    }

    #[test]
    fn test_run_dirs_are_distinct() {
        let config = WorkerConfig::default();
        assert_ne!(config.run_dir("a"), config.run_dir("b"));
        assert!(config.run_dir("a").starts_with(&config.work_dir));
    }
}
