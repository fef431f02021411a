//! Composition and generation worker.
//!
//! This crate provides:
//! - The composition pipeline (concat and vertical stack, optional caption and bgm)
//! - The image-to-video generation engine with queued, self-rescheduling polls
//! - The poll executor with claim/retry/DLQ handling and graceful shutdown
//! - The worker error taxonomy shared with the HTTP surface

pub mod composition;
pub mod config;
pub mod error;
pub mod executor;
pub mod generation;
pub mod logging;
pub mod metrics;
pub mod services;

pub use composition::{CompositionOutcome, CompositionPipeline, RunState};
pub use config::WorkerConfig;
pub use error::{WorkerError, WorkerResult};
pub use executor::JobExecutor;
pub use generation::{FfmpegNormalizer, GenerationEngine, PollOutcome, ResultNormalizer};
pub use logging::JobLogger;
pub use services::Services;
