//! Redis task backend for AdReel generation jobs.
//!
//! This crate provides:
//! - Generation job records with a retention window
//! - Delayed scheduling of poll units via a Redis sorted set
//! - Stream consumption with claim/retry/DLQ

pub mod error;
pub mod job;
pub mod queue;
pub mod store;

pub use error::{QueueError, QueueResult};
pub use job::{PollGenerationJob, QueueJob};
pub use queue::{JobQueue, PollScheduler, QueueConfig};
pub use store::{JobStore, MemoryJobStore, RedisJobStore, DEFAULT_RETENTION};
