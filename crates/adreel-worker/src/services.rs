//! Wiring of the collaborators shared by the worker and the API binaries.

use std::sync::Arc;

use adreel_gen_client::MinimaxClient;
use adreel_models::FontRegistry;
use adreel_queue::{JobQueue, JobStore, RedisJobStore};
use adreel_storage::{LocalTransfer, ObjectTransfer, S3Client};
use tracing::{info, warn};

use crate::composition::CompositionPipeline;
use crate::config::WorkerConfig;
use crate::error::WorkerResult;
use crate::generation::GenerationEngine;

/// Everything needed to run compositions and generation jobs.
#[derive(Clone)]
pub struct Services {
    pub config: WorkerConfig,
    pub queue: Arc<JobQueue>,
    pub transfer: Arc<dyn ObjectTransfer>,
    pub pipeline: CompositionPipeline,
    pub engine: Arc<GenerationEngine>,
}

impl Services {
    /// Build from environment variables.
    ///
    /// `LOCAL_STORAGE_DIR` switches byte transfer to the local filesystem;
    /// otherwise S3 is configured from `S3_*`/`AWS_*`.
    pub async fn from_env(config: WorkerConfig) -> WorkerResult<Self> {
        let queue = Arc::new(JobQueue::from_env()?);

        let transfer: Arc<dyn ObjectTransfer> = match std::env::var("LOCAL_STORAGE_DIR") {
            Ok(dir) if !dir.is_empty() => {
                warn!("Using local filesystem storage at {}", dir);
                Arc::new(LocalTransfer::new(dir))
            }
            _ => {
                let s3 = S3Client::from_env().await?;
                info!("Using S3 bucket {}", s3.bucket());
                Arc::new(s3)
            }
        };

        let store: Arc<dyn JobStore> = Arc::new(RedisJobStore::new(
            &queue.config().redis_url,
            config.job_retention,
        )?);
        let service = Arc::new(MinimaxClient::from_env()?);

        let fonts = Arc::new(FontRegistry::builtin(&config.fonts_dir));
        let pipeline = CompositionPipeline::new(Arc::clone(&transfer), fonts);

        let engine = Arc::new(GenerationEngine::new(
            service,
            store,
            queue.clone(),
            Arc::clone(&transfer),
            &config,
        ));

        Ok(Self {
            config,
            queue,
            transfer,
            pipeline,
            engine,
        })
    }
}
