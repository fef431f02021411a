//! Application state.

use std::sync::Arc;

use adreel_queue::JobQueue;
use adreel_worker::{CompositionPipeline, GenerationEngine, Services, WorkerConfig, WorkerResult};

use crate::config::ApiConfig;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: ApiConfig,
    pub worker: WorkerConfig,
    pub queue: Arc<JobQueue>,
    pub pipeline: CompositionPipeline,
    pub engine: Arc<GenerationEngine>,
}

impl AppState {
    /// Create new application state from environment variables.
    pub async fn new(config: ApiConfig) -> WorkerResult<Self> {
        let services = Services::from_env(WorkerConfig::from_env()).await?;
        Ok(Self::from_services(config, services))
    }

    pub fn from_services(config: ApiConfig, services: Services) -> Self {
        Self {
            config,
            worker: services.config,
            queue: services.queue,
            pipeline: services.pipeline,
            engine: services.engine,
        }
    }
}
