//! Generation job records.

use std::collections::HashMap;
use std::time::Duration;

use adreel_models::{GenerationJob, JobId};
use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use crate::error::QueueResult;

/// How long a job record outlives its last update.
pub const DEFAULT_RETENTION: Duration = Duration::from_secs(3600);

/// Persistence for generation job records.
#[async_trait]
pub trait JobStore: Send + Sync {
    async fn get(&self, job_id: &JobId) -> QueueResult<Option<GenerationJob>>;

    /// Insert or overwrite a record, restarting its retention window.
    async fn put(&self, job: &GenerationJob) -> QueueResult<()>;
}

/// Job records as JSON strings with a Redis TTL.
pub struct RedisJobStore {
    client: redis::Client,
    retention: Duration,
}

impl RedisJobStore {
    pub fn new(redis_url: &str, retention: Duration) -> QueueResult<Self> {
        let client = redis::Client::open(redis_url)?;
        Ok(Self { client, retention })
    }

    pub fn key(job_id: &JobId) -> String {
        format!("adreel:generation:{}", job_id)
    }
}

#[async_trait]
impl JobStore for RedisJobStore {
    async fn get(&self, job_id: &JobId) -> QueueResult<Option<GenerationJob>> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let payload: Option<String> = redis::cmd("GET")
            .arg(Self::key(job_id))
            .query_async(&mut conn)
            .await?;

        match payload {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    async fn put(&self, job: &GenerationJob) -> QueueResult<()> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let payload = serde_json::to_string(job)?;

        redis::cmd("SET")
            .arg(Self::key(&job.job_id))
            .arg(payload)
            .arg("EX")
            .arg(self.retention.as_secs().max(1))
            .query_async::<()>(&mut conn)
            .await?;

        debug!(job_id = %job.job_id, state = %job.state, "Stored generation job");
        Ok(())
    }
}

/// Process-local store for development and tests. Records never expire.
#[derive(Default)]
pub struct MemoryJobStore {
    jobs: RwLock<HashMap<JobId, GenerationJob>>,
}

impl MemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.jobs.read().await.len()
    }
}

#[async_trait]
impl JobStore for MemoryJobStore {
    async fn get(&self, job_id: &JobId) -> QueueResult<Option<GenerationJob>> {
        Ok(self.jobs.read().await.get(job_id).cloned())
    }

    async fn put(&self, job: &GenerationJob) -> QueueResult<()> {
        self.jobs
            .write()
            .await
            .insert(job.job_id.clone(), job.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_store_overwrites() {
        let store = MemoryJobStore::new();
        let mut job = GenerationJob::new("s3://b/photo.png", "prompt", "task-1", 30);

        assert!(store.get(&job.job_id).await.unwrap().is_none());
        store.put(&job).await.unwrap();

        job.record_attempt(1).unwrap();
        store.put(&job).await.unwrap();

        let loaded = store.get(&job.job_id).await.unwrap().unwrap();
        assert_eq!(loaded.attempts, 1);
        assert_eq!(store.len().await, 1);
    }

    #[test]
    fn test_redis_key() {
        assert_eq!(
            RedisJobStore::key(&JobId::from_string("abc")),
            "adreel:generation:abc"
        );
    }
}
