//! Poll queue on Redis.
//!
//! Work that is due now lives in a Redis stream consumed through a consumer
//! group. Work scheduled for later waits in a sorted set scored by its due
//! time (epoch milliseconds) until [`JobQueue::promote_due`] moves it onto
//! the stream.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use redis::{AsyncCommands, Script};
use tracing::{debug, info, warn};

use crate::error::{QueueError, QueueResult};
use crate::job::{PollGenerationJob, QueueJob};

/// Removes a delayed entry and publishes it to the stream, or does nothing
/// when another worker already took it.
const PROMOTE_SCRIPT: &str = r#"
if redis.call('ZREM', KEYS[1], ARGV[1]) == 1 then
    return redis.call('XADD', KEYS[2], '*', 'job', ARGV[1], 'key', ARGV[2])
end
return false
"#;

/// Queue configuration.
#[derive(Debug, Clone)]
pub struct QueueConfig {
    /// Redis URL
    pub redis_url: String,
    /// Stream name for due jobs
    pub stream_name: String,
    /// Sorted set holding scheduled jobs
    pub delayed_set_name: String,
    /// Consumer group name
    pub consumer_group: String,
    /// Dead letter queue stream name
    pub dlq_stream_name: String,
    /// Max retries before DLQ
    pub max_retries: u32,
    /// Idle time after which another worker may claim a message
    pub visibility_timeout: Duration,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            redis_url: "redis://localhost:6379".to_string(),
            stream_name: "adreel:jobs".to_string(),
            delayed_set_name: "adreel:delayed".to_string(),
            consumer_group: "adreel:workers".to_string(),
            dlq_stream_name: "adreel:dlq".to_string(),
            max_retries: 3,
            visibility_timeout: Duration::from_secs(300),
        }
    }
}

impl QueueConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            redis_url: std::env::var("REDIS_URL").unwrap_or(defaults.redis_url),
            stream_name: std::env::var("QUEUE_STREAM").unwrap_or(defaults.stream_name),
            delayed_set_name: std::env::var("QUEUE_DELAYED_SET")
                .unwrap_or(defaults.delayed_set_name),
            consumer_group: std::env::var("QUEUE_CONSUMER_GROUP")
                .unwrap_or(defaults.consumer_group),
            dlq_stream_name: std::env::var("QUEUE_DLQ_STREAM").unwrap_or(defaults.dlq_stream_name),
            max_retries: std::env::var("QUEUE_MAX_RETRIES")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.max_retries),
            visibility_timeout: Duration::from_secs(
                std::env::var("QUEUE_VISIBILITY_TIMEOUT")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(defaults.visibility_timeout.as_secs()),
            ),
        }
    }
}

/// Schedules the next poll of a generation job.
#[async_trait]
pub trait PollScheduler: Send + Sync {
    async fn schedule(&self, job: PollGenerationJob, delay: Duration) -> QueueResult<()>;
}

/// Job queue client.
pub struct JobQueue {
    client: redis::Client,
    config: QueueConfig,
}

impl JobQueue {
    /// Create a new job queue.
    pub fn new(config: QueueConfig) -> QueueResult<Self> {
        let client = redis::Client::open(config.redis_url.as_str())?;
        Ok(Self { client, config })
    }

    /// Create from environment variables.
    pub fn from_env() -> QueueResult<Self> {
        Self::new(QueueConfig::from_env())
    }

    pub fn config(&self) -> &QueueConfig {
        &self.config
    }

    async fn connection(&self) -> QueueResult<redis::aio::MultiplexedConnection> {
        self.client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| QueueError::connection_failed(e.to_string()))
    }

    /// Initialize the queue (create consumer group if not exists).
    pub async fn init(&self) -> QueueResult<()> {
        let mut conn = self.connection().await?;

        let result: Result<(), redis::RedisError> = redis::cmd("XGROUP")
            .arg("CREATE")
            .arg(&self.config.stream_name)
            .arg(&self.config.consumer_group)
            .arg("$")
            .arg("MKSTREAM")
            .query_async(&mut conn)
            .await;

        match result {
            Ok(_) => info!("Created consumer group: {}", self.config.consumer_group),
            Err(e) if e.to_string().contains("BUSYGROUP") => {
                debug!("Consumer group already exists: {}", self.config.consumer_group);
            }
            Err(e) => return Err(QueueError::Redis(e)),
        }

        Ok(())
    }

    /// Check the Redis connection.
    pub async fn ping(&self) -> QueueResult<()> {
        let mut conn = self.connection().await?;
        redis::cmd("PING").query_async::<String>(&mut conn).await?;
        Ok(())
    }

    /// Add a job to the stream for immediate consumption.
    pub async fn enqueue(&self, job: &QueueJob) -> QueueResult<String> {
        let mut conn = self.connection().await?;
        let payload = serde_json::to_string(job)?;

        let message_id: String = redis::cmd("XADD")
            .arg(&self.config.stream_name)
            .arg("*")
            .arg("job")
            .arg(&payload)
            .arg("key")
            .arg(job.idempotency_key())
            .query_async(&mut conn)
            .await?;

        debug!("Enqueued job {} with message ID {}", job.job_id(), message_id);
        Ok(message_id)
    }

    /// Schedule a job to become consumable after `delay`.
    ///
    /// Returns `false` without scheduling when the same idempotency key was
    /// already scheduled within the last hour.
    pub async fn enqueue_delayed(&self, job: &QueueJob, delay: Duration) -> QueueResult<bool> {
        let mut conn = self.connection().await?;

        let dedup_key = dedup_key(&job.idempotency_key());
        let fresh: Option<String> = redis::cmd("SET")
            .arg(&dedup_key)
            .arg("1")
            .arg("NX")
            .arg("EX")
            .arg(3600)
            .query_async(&mut conn)
            .await?;
        if fresh.is_none() {
            warn!("Duplicate job skipped: {}", job.idempotency_key());
            return Ok(false);
        }

        let due = due_score(Utc::now().timestamp_millis(), delay);
        let payload = serde_json::to_string(job)?;
        redis::cmd("ZADD")
            .arg(&self.config.delayed_set_name)
            .arg(due)
            .arg(&payload)
            .query_async::<()>(&mut conn)
            .await?;

        debug!(
            job_id = %job.job_id(),
            delay_secs = delay.as_secs(),
            "Scheduled delayed job"
        );
        Ok(true)
    }

    /// Move up to `count` due jobs from the delayed set onto the stream.
    ///
    /// Each entry is removed and published in one script, so a failed
    /// publish leaves it in the delayed set and concurrent workers publish
    /// it once.
    pub async fn promote_due(&self, count: usize) -> QueueResult<usize> {
        let mut conn = self.connection().await?;
        let now = Utc::now().timestamp_millis();

        let due: Vec<String> = redis::cmd("ZRANGEBYSCORE")
            .arg(&self.config.delayed_set_name)
            .arg("-inf")
            .arg(now)
            .arg("LIMIT")
            .arg(0)
            .arg(count)
            .query_async(&mut conn)
            .await?;

        let script = Script::new(PROMOTE_SCRIPT);
        let mut promoted = 0;
        for payload in due {
            let job = match serde_json::from_str::<QueueJob>(&payload) {
                Ok(job) => job,
                Err(e) => {
                    warn!("Dropping malformed delayed job: {}", e);
                    let _: i64 = conn.zrem(&self.config.delayed_set_name, &payload).await?;
                    continue;
                }
            };

            let message_id: Option<String> = script
                .key(&self.config.delayed_set_name)
                .key(&self.config.stream_name)
                .arg(&payload)
                .arg(job.idempotency_key())
                .invoke_async(&mut conn)
                .await?;
            if let Some(message_id) = message_id {
                debug!("Promoted job {} as message {}", job.job_id(), message_id);
                promoted += 1;
            }
        }

        if promoted > 0 {
            debug!("Promoted {} due jobs", promoted);
        }
        Ok(promoted)
    }

    /// Acknowledge a job (mark as completed).
    pub async fn ack(&self, message_id: &str) -> QueueResult<()> {
        let mut conn = self.connection().await?;

        redis::cmd("XACK")
            .arg(&self.config.stream_name)
            .arg(&self.config.consumer_group)
            .arg(message_id)
            .query_async::<()>(&mut conn)
            .await?;

        redis::cmd("XDEL")
            .arg(&self.config.stream_name)
            .arg(message_id)
            .query_async::<()>(&mut conn)
            .await?;

        debug!("Acknowledged job: {}", message_id);
        Ok(())
    }

    /// Move a job to the dead letter queue.
    pub async fn dlq(&self, message_id: &str, job: &QueueJob, error: &str) -> QueueResult<()> {
        let mut conn = self.connection().await?;
        let payload = serde_json::to_string(job)?;

        redis::cmd("XADD")
            .arg(&self.config.dlq_stream_name)
            .arg("*")
            .arg("job")
            .arg(&payload)
            .arg("error")
            .arg(error)
            .arg("original_id")
            .arg(message_id)
            .query_async::<()>(&mut conn)
            .await?;

        self.ack(message_id).await?;

        warn!("Moved job {} to DLQ: {}", job.job_id(), error);
        Ok(())
    }

    /// Get queue length.
    pub async fn len(&self) -> QueueResult<u64> {
        let mut conn = self.connection().await?;
        let len: u64 = conn.xlen(&self.config.stream_name).await?;
        Ok(len)
    }

    /// Number of jobs waiting for their due time.
    pub async fn delayed_len(&self) -> QueueResult<u64> {
        let mut conn = self.connection().await?;
        let len: u64 = conn.zcard(&self.config.delayed_set_name).await?;
        Ok(len)
    }

    /// Get DLQ length.
    pub async fn dlq_len(&self) -> QueueResult<u64> {
        let mut conn = self.connection().await?;
        let len: u64 = conn.xlen(&self.config.dlq_stream_name).await?;
        Ok(len)
    }

    /// Consume new jobs from the stream.
    pub async fn consume(
        &self,
        consumer_name: &str,
        block_ms: u64,
        count: usize,
    ) -> QueueResult<Vec<(String, QueueJob)>> {
        let mut conn = self.connection().await?;

        let result: redis::streams::StreamReadReply = redis::cmd("XREADGROUP")
            .arg("GROUP")
            .arg(&self.config.consumer_group)
            .arg(consumer_name)
            .arg("COUNT")
            .arg(count)
            .arg("BLOCK")
            .arg(block_ms)
            .arg("STREAMS")
            .arg(&self.config.stream_name)
            .arg(">")
            .query_async(&mut conn)
            .await?;

        let mut jobs = Vec::new();
        for stream_key in result.keys {
            for entry in stream_key.ids {
                if let Some(job) = self.decode_entry(&entry.id, &entry.map).await {
                    debug!("Consumed job {} from stream", job.job_id());
                    jobs.push((entry.id, job));
                }
            }
        }

        Ok(jobs)
    }

    /// Claim messages another consumer left pending for too long.
    pub async fn claim_pending(
        &self,
        consumer_name: &str,
        count: usize,
    ) -> QueueResult<Vec<(String, QueueJob)>> {
        let mut conn = self.connection().await?;

        let pending: redis::streams::StreamPendingReply = redis::cmd("XPENDING")
            .arg(&self.config.stream_name)
            .arg(&self.config.consumer_group)
            .query_async(&mut conn)
            .await?;

        if pending.count() == 0 {
            return Ok(Vec::new());
        }

        let ids: Vec<String> = match pending {
            redis::streams::StreamPendingReply::Data(_) => {
                let detail: redis::streams::StreamPendingCountReply = redis::cmd("XPENDING")
                    .arg(&self.config.stream_name)
                    .arg(&self.config.consumer_group)
                    .arg("-")
                    .arg("+")
                    .arg(count)
                    .query_async(&mut conn)
                    .await?;
                detail.ids.into_iter().map(|p| p.id).collect()
            }
            redis::streams::StreamPendingReply::Empty => Vec::new(),
        };
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let result: redis::streams::StreamClaimReply = redis::cmd("XCLAIM")
            .arg(&self.config.stream_name)
            .arg(&self.config.consumer_group)
            .arg(consumer_name)
            .arg(self.config.visibility_timeout.as_millis() as u64)
            .arg(&ids)
            .query_async(&mut conn)
            .await?;

        let mut jobs = Vec::new();
        for entry in result.ids {
            if let Some(job) = self.decode_entry(&entry.id, &entry.map).await {
                info!("Claimed pending job {} from stream", job.job_id());
                jobs.push((entry.id, job));
            }
        }

        Ok(jobs)
    }

    async fn decode_entry(
        &self,
        message_id: &str,
        fields: &std::collections::HashMap<String, redis::Value>,
    ) -> Option<QueueJob> {
        let Some(redis::Value::BulkString(payload)) = fields.get("job") else {
            return None;
        };

        match serde_json::from_slice::<QueueJob>(payload) {
            Ok(job) => Some(job),
            Err(e) => {
                warn!("Failed to parse job payload: {}", e);
                // Ack the malformed message to prevent reprocessing
                self.ack(message_id).await.ok();
                None
            }
        }
    }

    /// Increment the delivery failure count of a message.
    pub async fn increment_retry(&self, message_id: &str) -> QueueResult<u32> {
        let mut conn = self.connection().await?;

        let key = format!("adreel:retry:{}", message_id);
        let count: u32 = conn.incr(&key, 1).await?;
        conn.expire::<_, ()>(&key, 86400).await?;
        Ok(count)
    }

    /// Get max retries from config.
    pub fn max_retries(&self) -> u32 {
        self.config.max_retries
    }
}

#[async_trait]
impl PollScheduler for JobQueue {
    async fn schedule(&self, job: PollGenerationJob, delay: Duration) -> QueueResult<()> {
        // A redelivered poll may schedule the same successor twice
        self.enqueue_delayed(&QueueJob::PollGeneration(job), delay)
            .await
            .map(|_| ())
    }
}

fn dedup_key(idempotency_key: &str) -> String {
    format!("adreel:dedup:{}", idempotency_key)
}

/// Sorted-set score (epoch ms) of a job due `delay` after `now_ms`.
fn due_score(now_ms: i64, delay: Duration) -> i64 {
    now_ms.saturating_add(delay.as_millis() as i64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = QueueConfig::default();
        assert_eq!(config.stream_name, "adreel:jobs");
        assert_eq!(config.delayed_set_name, "adreel:delayed");
        assert_eq!(config.max_retries, 3);
    }

    #[test]
    fn test_due_score() {
        assert_eq!(due_score(1_000, Duration::from_secs(20)), 21_000);
        assert_eq!(due_score(1_000, Duration::ZERO), 1_000);
    }

    #[test]
    fn test_promote_script_publishes_only_what_it_removed() {
        let zrem = PROMOTE_SCRIPT.find("ZREM").unwrap();
        let xadd = PROMOTE_SCRIPT.find("XADD").unwrap();
        assert!(zrem < xadd);
        assert!(PROMOTE_SCRIPT.contains("'job', ARGV[1], 'key', ARGV[2]"));
    }

    #[test]
    fn test_dedup_key() {
        assert_eq!(dedup_key("poll:job-1:3"), "adreel:dedup:poll:job-1:3");
    }
}
