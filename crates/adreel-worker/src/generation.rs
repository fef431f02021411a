//! Image-to-video generation job engine.
//!
//! `submit` validates the source image, creates the remote job exactly once
//! and schedules the first poll. Each poll is its own queued unit of work:
//! while the remote job is in flight the poll schedules its successor one
//! interval later, until the remote service reports a terminal status or the
//! attempt budget runs out. The poll that observes `Success` downloads,
//! normalizes and stores the result before the job is reported ready.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use adreel_gen_client::{image_data_url, GenerationService, RemoteStatus, DEFAULT_PROMPT};
use adreel_media::{fit_video, probe_video, validate_image, AudioHandling};
use adreel_models::{
    EncodingConfig, FailureDetail, FailureKind, GenerationJob, GenerationStatus, JobId,
    MediaAsset, TargetFrame,
};
use adreel_queue::{JobStore, PollGenerationJob, PollScheduler};
use adreel_storage::ObjectTransfer;
use async_trait::async_trait;
use chrono::Utc;
use tracing::{debug, warn};

use crate::config::WorkerConfig;
use crate::error::{WorkerError, WorkerResult};
use crate::logging::JobLogger;
use crate::metrics;

/// Brings a downloaded generation result to the delivery frame.
#[async_trait]
pub trait ResultNormalizer: Send + Sync {
    async fn normalize(&self, raw: &Path, output: &Path) -> WorkerResult<MediaAsset>;
}

/// Fits results to 576x1024 at 24 fps with FFmpeg, keeping any audio.
#[derive(Debug, Clone, Copy, Default)]
pub struct FfmpegNormalizer;

#[async_trait]
impl ResultNormalizer for FfmpegNormalizer {
    async fn normalize(&self, raw: &Path, output: &Path) -> WorkerResult<MediaAsset> {
        let source = probe_video(raw).await?;
        let fitted = fit_video(
            &source,
            output,
            TargetFrame::GENERATION,
            AudioHandling::Keep,
            &EncodingConfig::for_generation(),
        )
        .await?;
        Ok(fitted)
    }
}

/// What a single poll did.
#[derive(Debug, Clone, PartialEq)]
pub enum PollOutcome {
    /// Remote job still running; the next attempt is scheduled
    Rescheduled { attempt: u32 },
    Succeeded { result: String },
    Failed { detail: FailureDetail },
    /// Job expired, already terminal, or this attempt was already processed
    Skipped,
}

/// Drives generation jobs from submission to a terminal state.
#[derive(Clone)]
pub struct GenerationEngine {
    service: Arc<dyn GenerationService>,
    store: Arc<dyn JobStore>,
    scheduler: Arc<dyn PollScheduler>,
    transfer: Arc<dyn ObjectTransfer>,
    normalizer: Arc<dyn ResultNormalizer>,
    poll_interval: Duration,
    max_attempts: u32,
    work_dir: PathBuf,
}

impl GenerationEngine {
    pub fn new(
        service: Arc<dyn GenerationService>,
        store: Arc<dyn JobStore>,
        scheduler: Arc<dyn PollScheduler>,
        transfer: Arc<dyn ObjectTransfer>,
        config: &WorkerConfig,
    ) -> Self {
        Self {
            service,
            store,
            scheduler,
            transfer,
            normalizer: Arc::new(FfmpegNormalizer),
            poll_interval: config.poll_interval,
            max_attempts: config.poll_max_attempts,
            work_dir: config.generation_dir(),
        }
    }

    pub fn with_normalizer(mut self, normalizer: Arc<dyn ResultNormalizer>) -> Self {
        self.normalizer = normalizer;
        self
    }

    /// Submit a local image. `source_ref` is what the job record reports as
    /// its source.
    pub async fn submit(
        &self,
        image: &Path,
        source_ref: &str,
        prompt: Option<&str>,
    ) -> WorkerResult<JobId> {
        let facts = validate_image(image).await?;
        let bytes = tokio::fs::read(&facts.path).await?;
        let data_url = image_data_url(facts.kind.mime_type(), &bytes);

        let prompt = prompt
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .unwrap_or(DEFAULT_PROMPT);

        // Submitted exactly once, never retried
        let task_id = self.service.create_job(&data_url, prompt).await?;

        let job = GenerationJob::new(source_ref, prompt, task_id, self.max_attempts);
        let logger = JobLogger::new(&job.job_id, "submit");
        self.store.put(&job).await?;
        self.scheduler
            .schedule(PollGenerationJob::first(job.job_id.clone()), self.poll_interval)
            .await?;

        metrics::record_generation_submitted();
        logger.log_start(&format!(
            "task {} created for {} ({}x{} {})",
            job.remote_task_id,
            source_ref,
            facts.width,
            facts.height,
            facts.kind.mime_type()
        ));
        Ok(job.job_id)
    }

    /// Fetch a remote image into the work directory and submit it.
    pub async fn submit_reference(
        &self,
        reference: &str,
        prompt: Option<&str>,
    ) -> WorkerResult<JobId> {
        let local = self.work_dir.join("inputs").join(format!(
            "{}.{}",
            uuid::Uuid::new_v4(),
            reference_extension(reference)
        ));
        self.transfer.fetch(reference, &local).await?;

        let result = self.submit(&local, reference, prompt).await;
        if let Err(e) = tokio::fs::remove_file(&local).await {
            debug!("Failed to remove {}: {}", local.display(), e);
        }
        result
    }

    /// Perform one poll.
    ///
    /// Terminal failures are recorded on the job and returned as
    /// [`PollOutcome::Failed`]; `Err` is reserved for store and queue errors
    /// the executor should retry.
    pub async fn poll(&self, unit: &PollGenerationJob) -> WorkerResult<PollOutcome> {
        let logger = JobLogger::new(&unit.job_id, "poll");

        let Some(mut job) = self.store.get(&unit.job_id).await? else {
            logger.log_warning("job record not found, dropping poll");
            return Ok(PollOutcome::Skipped);
        };
        if job.state.is_terminal() || unit.attempt <= job.attempts {
            debug!(
                job_id = %job.job_id,
                attempt = unit.attempt,
                state = %job.state,
                "Skipping stale poll"
            );
            return Ok(PollOutcome::Skipped);
        }

        let polled = match self.service.poll_job(&job.remote_task_id).await {
            Ok(polled) => polled,
            Err(e) => {
                metrics::record_generation_poll("error");
                let detail = WorkerError::from(e).to_failure_detail();
                return self.finish_failed(job, detail, &logger).await;
            }
        };
        metrics::record_generation_poll(match &polled.status {
            RemoteStatus::Unrecognized(_) => "unrecognized",
            status => status.as_str(),
        });

        match &polled.status {
            status if status.is_in_flight() => {
                job.record_attempt(unit.attempt)?;
                logger.log_attempt(&job, status.as_str());

                if job.attempts_exhausted() {
                    let detail = WorkerError::Timeout {
                        attempts: job.attempts,
                    }
                    .to_failure_detail();
                    return self.finish_failed(job, detail, &logger).await;
                }

                // Schedule before recording, so a retried poll still reschedules
                let next = unit.next();
                let attempt = next.attempt;
                self.scheduler.schedule(next, self.poll_interval).await?;
                self.store.put(&job).await?;
                Ok(PollOutcome::Rescheduled { attempt })
            }
            RemoteStatus::Success => {
                // Not persisted until the terminal write, so a retried unit
                // polls and delivers again instead of being skipped
                job.record_attempt(unit.attempt)?;
                logger.log_attempt(&job, RemoteStatus::Success.as_str());

                match self.deliver(&job, polled.file_id.as_deref()).await {
                    Ok(result) => {
                        job.succeed(result.clone())?;
                        self.store.put(&job).await?;
                        metrics::record_generation_outcome("succeeded");
                        logger.log_completion(&result);
                        Ok(PollOutcome::Succeeded { result })
                    }
                    Err(e) => {
                        let detail = e.to_failure_detail();
                        self.finish_failed(job, detail, &logger).await
                    }
                }
            }
            RemoteStatus::Unrecognized(raw) => {
                let detail =
                    WorkerError::remote(None, format!("Unknown task status: {}", raw))
                        .to_failure_detail();
                self.finish_failed(job, detail, &logger).await
            }
            status => {
                let detail = WorkerError::remote(
                    None,
                    format!("Video generation failed with status: {}", status),
                )
                .to_failure_detail();
                self.finish_failed(job, detail, &logger).await
            }
        }
    }

    /// Fail a job whose poll unit was given up on by the queue.
    ///
    /// No-op for jobs that are gone or already terminal.
    pub async fn abandon(&self, job_id: &JobId, reason: &str) -> WorkerResult<()> {
        let Some(job) = self.store.get(job_id).await? else {
            return Ok(());
        };
        if job.state.is_terminal() {
            return Ok(());
        }

        let logger = JobLogger::new(job_id, "poll");
        let detail = FailureDetail::new(
            FailureKind::Internal,
            format!("Polling abandoned after repeated failures: {}", reason),
        );
        self.finish_failed(job, detail, &logger).await?;
        Ok(())
    }

    /// Status view of a job, `Unknown` once its record is gone.
    pub async fn status(&self, job_id: &JobId) -> WorkerResult<GenerationStatus> {
        Ok(self
            .store
            .get(job_id)
            .await?
            .map(|job| job.status())
            .unwrap_or(GenerationStatus::Unknown))
    }

    /// Download, normalize and store a finished result.
    async fn deliver(&self, job: &GenerationJob, file_id: Option<&str>) -> WorkerResult<String> {
        let file_id = file_id
            .ok_or_else(|| WorkerError::remote(None, "generation succeeded without a file id"))?;
        let url = self.service.fetch_result(file_id).await?;

        let job_dir = self.work_dir.join(job.job_id.as_str());
        tokio::fs::create_dir_all(&job_dir).await?;
        let stamp = Utc::now().format("%Y%m%d_%H%M%S");
        let raw = job_dir.join(format!("temp_video_{}.mp4", stamp));
        let output = job_dir.join(format!("video_{}.mp4", stamp));

        self.service.download(&url, &raw).await?;
        let normalized = self.normalizer.normalize(&raw, &output).await?;
        if let Err(e) = tokio::fs::remove_file(&raw).await {
            warn!("Failed to remove raw result {}: {}", raw.display(), e);
        }

        Ok(self.transfer.store(&normalized.path).await?)
    }

    async fn finish_failed(
        &self,
        mut job: GenerationJob,
        detail: FailureDetail,
        logger: &JobLogger,
    ) -> WorkerResult<PollOutcome> {
        logger.log_error(&format!("{} ({})", detail.message, detail.kind.as_str()));
        job.fail(detail.clone())?;
        self.store.put(&job).await?;
        metrics::record_generation_outcome(detail.kind.as_str());
        Ok(PollOutcome::Failed { detail })
    }
}

/// File extension of a reference, ignoring any query string.
fn reference_extension(reference: &str) -> String {
    let path = reference.split(['?', '#']).next().unwrap_or(reference);
    Path::new(path)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_else(|| "bin".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use adreel_gen_client::{GenError, GenResult, PollResult};
    use adreel_models::GenerationState;
    use adreel_queue::{MemoryJobStore, QueueError, QueueResult};
    use adreel_storage::LocalTransfer;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Service that answers polls from a script, then reports `Processing`.
    #[derive(Default)]
    struct ScriptedService {
        script: Mutex<VecDeque<GenResult<PollResult>>>,
        creates: AtomicUsize,
        polls: AtomicUsize,
    }

    impl ScriptedService {
        fn with_script(script: Vec<GenResult<PollResult>>) -> Self {
            Self {
                script: Mutex::new(script.into()),
                ..Default::default()
            }
        }
    }

    #[async_trait]
    impl GenerationService for ScriptedService {
        async fn create_job(&self, image_data_url: &str, _prompt: &str) -> GenResult<String> {
            assert!(image_data_url.starts_with("data:image/png;base64,"));
            self.creates.fetch_add(1, Ordering::SeqCst);
            Ok("task-42".to_string())
        }

        async fn poll_job(&self, task_id: &str) -> GenResult<PollResult> {
            assert_eq!(task_id, "task-42");
            self.polls.fetch_add(1, Ordering::SeqCst);
            self.script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(PollResult::new(RemoteStatus::Processing)))
        }

        async fn fetch_result(&self, file_id: &str) -> GenResult<String> {
            Ok(format!("https://files.example.com/{}.mp4", file_id))
        }

        async fn download(&self, _url: &str, dest: &Path) -> GenResult<()> {
            tokio::fs::write(dest, b"raw video").await?;
            Ok(())
        }
    }

    #[derive(Default)]
    struct RecordingScheduler {
        scheduled: Mutex<Vec<(PollGenerationJob, Duration)>>,
    }

    impl RecordingScheduler {
        fn last(&self) -> Option<PollGenerationJob> {
            self.scheduled.lock().unwrap().last().map(|(j, _)| j.clone())
        }

        fn count(&self) -> usize {
            self.scheduled.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl PollScheduler for RecordingScheduler {
        async fn schedule(&self, job: PollGenerationJob, delay: Duration) -> QueueResult<()> {
            self.scheduled.lock().unwrap().push((job, delay));
            Ok(())
        }
    }

    /// Copies the raw file instead of re-encoding it.
    struct CopyNormalizer;

    #[async_trait]
    impl ResultNormalizer for CopyNormalizer {
        async fn normalize(&self, raw: &Path, output: &Path) -> WorkerResult<MediaAsset> {
            tokio::fs::copy(raw, output).await?;
            Ok(MediaAsset {
                path: output.to_path_buf(),
                width: 576,
                height: 1024,
                duration_secs: 6.0,
                has_audio: false,
                audio_sample_rate: None,
            })
        }
    }

    struct Harness {
        _dir: tempfile::TempDir,
        root: PathBuf,
        engine: GenerationEngine,
        service: Arc<ScriptedService>,
        store: Arc<MemoryJobStore>,
        scheduler: Arc<RecordingScheduler>,
    }

    fn harness(script: Vec<GenResult<PollResult>>) -> Harness {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().to_path_buf();
        let config = WorkerConfig {
            work_dir: root.join("work"),
            ..WorkerConfig::default()
        };
        let service = Arc::new(ScriptedService::with_script(script));
        let store = Arc::new(MemoryJobStore::new());
        let scheduler = Arc::new(RecordingScheduler::default());
        let transfer = Arc::new(LocalTransfer::new(root.join("published")));

        let engine = GenerationEngine::new(
            service.clone(),
            store.clone(),
            scheduler.clone(),
            transfer,
            &config,
        )
        .with_normalizer(Arc::new(CopyNormalizer));

        Harness {
            _dir: dir,
            root,
            engine,
            service,
            store,
            scheduler,
        }
    }

    fn write_png(path: &Path, width: u32, height: u32) {
        image::RgbImage::new(width, height).save(path).unwrap();
    }

    async fn submit_photo(h: &Harness) -> JobId {
        let photo = h.root.join("photo.png");
        write_png(&photo, 800, 1000);
        h.engine
            .submit(&photo, "s3://bucket/photo.png", None)
            .await
            .unwrap()
    }

    /// Keep polling the most recently scheduled unit until the job stops
    /// rescheduling.
    async fn drive(h: &Harness) -> PollOutcome {
        loop {
            let unit = h.scheduler.last().unwrap();
            match h.engine.poll(&unit).await.unwrap() {
                PollOutcome::Rescheduled { .. } => continue,
                other => return other,
            }
        }
    }

    #[tokio::test]
    async fn test_submit_persists_pending_job() {
        let h = harness(vec![]);
        let job_id = submit_photo(&h).await;

        assert_eq!(h.service.creates.load(Ordering::SeqCst), 1);
        assert_eq!(h.engine.status(&job_id).await.unwrap(), GenerationStatus::Pending);

        let scheduled = h.scheduler.scheduled.lock().unwrap().clone();
        assert_eq!(scheduled.len(), 1);
        assert_eq!(scheduled[0].0.attempt, 1);
        assert_eq!(scheduled[0].1, Duration::from_secs(20));

        let job = h.store.get(&job_id).await.unwrap().unwrap();
        assert_eq!(job.prompt, DEFAULT_PROMPT);
        assert_eq!(job.source_image, "s3://bucket/photo.png");
    }

    #[tokio::test]
    async fn test_oversized_aspect_rejected_before_remote_call() {
        let h = harness(vec![]);
        let photo = h.root.join("wide.png");
        write_png(&photo, 4000, 1000);

        let err = h
            .engine
            .submit(&photo, "s3://bucket/wide.png", Some("pan left"))
            .await
            .unwrap_err();

        assert_eq!(err.kind(), FailureKind::Validation);
        assert_eq!(h.service.creates.load(Ordering::SeqCst), 0);
        assert_eq!(h.store.len().await, 0);
        assert_eq!(h.scheduler.count(), 0);
    }

    #[tokio::test]
    async fn test_success_after_four_polls() {
        let h = harness(vec![
            Ok(PollResult::new(RemoteStatus::Queueing)),
            Ok(PollResult::new(RemoteStatus::Processing)),
            Ok(PollResult::new(RemoteStatus::Processing)),
            Ok(PollResult::success("file-7")),
        ]);
        let job_id = submit_photo(&h).await;

        let outcome = drive(&h).await;

        let PollOutcome::Succeeded { result } = outcome else {
            panic!("expected success, got {:?}", outcome);
        };
        assert!(result.starts_with("file://"));
        assert_eq!(h.service.polls.load(Ordering::SeqCst), 4);

        let job = h.store.get(&job_id).await.unwrap().unwrap();
        assert_eq!(job.state, GenerationState::Succeeded);
        assert_eq!(job.attempts, 4);
        assert_eq!(
            h.engine.status(&job_id).await.unwrap(),
            GenerationStatus::Succeeded { result }
        );

        // Only the normalized file is left behind
        let job_dir = h.root.join("work/generated").join(job_id.as_str());
        let names: Vec<String> = std::fs::read_dir(job_dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names.len(), 1);
        assert!(names[0].starts_with("video_"));
    }

    #[tokio::test]
    async fn test_in_progress_reports_attempt() {
        let h = harness(vec![Ok(PollResult::new(RemoteStatus::Preparing))]);
        let job_id = submit_photo(&h).await;

        let unit = h.scheduler.last().unwrap();
        assert_eq!(
            h.engine.poll(&unit).await.unwrap(),
            PollOutcome::Rescheduled { attempt: 2 }
        );
        assert_eq!(
            h.engine.status(&job_id).await.unwrap(),
            GenerationStatus::InProgress {
                progress: "attempt 1 of 30".to_string()
            }
        );

        // Redelivery of the same unit is a no-op
        assert_eq!(h.engine.poll(&unit).await.unwrap(), PollOutcome::Skipped);
        assert_eq!(h.service.polls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_budget_exhausted_times_out() {
        let h = harness(vec![]);
        let job_id = submit_photo(&h).await;

        let outcome = drive(&h).await;

        let PollOutcome::Failed { detail } = outcome else {
            panic!("expected failure, got {:?}", outcome);
        };
        assert_eq!(detail.kind, FailureKind::Timeout);
        assert_eq!(h.service.polls.load(Ordering::SeqCst), 30);
        // The first poll plus 29 reschedules
        assert_eq!(h.scheduler.count(), 30);

        let job = h.store.get(&job_id).await.unwrap().unwrap();
        assert_eq!(job.state, GenerationState::Failed);
        assert_eq!(job.attempts, 30);
    }

    #[tokio::test]
    async fn test_remote_fail_is_immediate() {
        let h = harness(vec![Ok(PollResult::new(RemoteStatus::Fail))]);
        let job_id = submit_photo(&h).await;

        let outcome = drive(&h).await;

        assert_eq!(h.service.polls.load(Ordering::SeqCst), 1);
        let GenerationStatus::Failed { error } = h.engine.status(&job_id).await.unwrap() else {
            panic!("expected failed status");
        };
        assert_eq!(error.kind, FailureKind::RemoteService);
        assert_eq!(error.message, "Video generation failed with status: Fail");
        assert_eq!(outcome, PollOutcome::Failed { detail: error });
    }

    #[tokio::test]
    async fn test_unrecognized_status_fails_closed() {
        let h = harness(vec![Ok(PollResult::new(RemoteStatus::parse("Exploded")))]);
        submit_photo(&h).await;

        let PollOutcome::Failed { detail } = drive(&h).await else {
            panic!("expected failure");
        };
        assert_eq!(detail.message, "Unknown task status: Exploded");
    }

    #[tokio::test]
    async fn test_poll_error_keeps_remote_message() {
        let h = harness(vec![Err(GenError::remote(1004, "authorization failed"))]);
        submit_photo(&h).await;

        let PollOutcome::Failed { detail } = drive(&h).await else {
            panic!("expected failure");
        };
        assert_eq!(detail.kind, FailureKind::RemoteService);
        assert_eq!(detail.code, Some(1004));
        assert_eq!(detail.message, "authorization failed");
    }

    #[tokio::test]
    async fn test_unknown_job() {
        let h = harness(vec![]);
        let id = JobId::from_string("never-issued");

        assert_eq!(h.engine.status(&id).await.unwrap(), GenerationStatus::Unknown);
        assert_eq!(
            h.engine.poll(&PollGenerationJob::first(id)).await.unwrap(),
            PollOutcome::Skipped
        );
    }

    #[tokio::test]
    async fn test_submit_reference_fetches_image() {
        let h = harness(vec![]);
        let photo = h.root.join("source.png");
        write_png(&photo, 800, 1000);

        let reference = photo.to_string_lossy().into_owned();
        let job_id = h.engine.submit_reference(&reference, None).await.unwrap();

        let job = h.store.get(&job_id).await.unwrap().unwrap();
        assert_eq!(job.source_image, reference);
        assert_eq!(h.service.creates.load(Ordering::SeqCst), 1);
    }

    /// Fails the first write that would make a job `Succeeded`.
    struct FlakyStore {
        inner: Arc<MemoryJobStore>,
        tripped: AtomicUsize,
    }

    #[async_trait]
    impl JobStore for FlakyStore {
        async fn get(&self, job_id: &JobId) -> QueueResult<Option<GenerationJob>> {
            self.inner.get(job_id).await
        }

        async fn put(&self, job: &GenerationJob) -> QueueResult<()> {
            if job.state == GenerationState::Succeeded
                && self.tripped.fetch_add(1, Ordering::SeqCst) == 0
            {
                return Err(QueueError::connection_failed("blip"));
            }
            self.inner.put(job).await
        }
    }

    #[tokio::test]
    async fn test_failed_success_write_is_retried() {
        let h = harness(vec![
            Ok(PollResult::success("file-7")),
            Ok(PollResult::success("file-7")),
        ]);
        let store = Arc::new(FlakyStore {
            inner: h.store.clone(),
            tripped: AtomicUsize::new(0),
        });
        let config = WorkerConfig {
            work_dir: h.root.join("work"),
            ..WorkerConfig::default()
        };
        let engine = GenerationEngine::new(
            h.service.clone(),
            store,
            h.scheduler.clone(),
            Arc::new(LocalTransfer::new(h.root.join("published"))),
            &config,
        )
        .with_normalizer(Arc::new(CopyNormalizer));

        let photo = h.root.join("photo.png");
        write_png(&photo, 800, 1000);
        let job_id = engine.submit(&photo, "s3://bucket/photo.png", None).await.unwrap();
        let unit = h.scheduler.last().unwrap();

        assert!(engine.poll(&unit).await.is_err());
        assert_eq!(
            engine.status(&job_id).await.unwrap(),
            GenerationStatus::Pending
        );

        // The queue redelivers the same unit
        let outcome = engine.poll(&unit).await.unwrap();
        assert!(matches!(outcome, PollOutcome::Succeeded { .. }));
        assert!(matches!(
            engine.status(&job_id).await.unwrap(),
            GenerationStatus::Succeeded { .. }
        ));
        assert_eq!(h.scheduler.count(), 1);
    }

    #[tokio::test]
    async fn test_abandoned_job_is_failed() {
        let h = harness(vec![]);
        let job_id = submit_photo(&h).await;
        let unit = h.scheduler.last().unwrap();
        h.engine.poll(&unit).await.unwrap();

        h.engine.abandon(&job_id, "redis unavailable").await.unwrap();

        let GenerationStatus::Failed { error } = h.engine.status(&job_id).await.unwrap() else {
            panic!("expected failed status");
        };
        assert_eq!(error.kind, FailureKind::Internal);
        assert!(error.message.contains("redis unavailable"));

        // Terminal jobs and missing jobs are left alone
        h.engine.abandon(&job_id, "again").await.unwrap();
        h.engine
            .abandon(&JobId::from_string("never-issued"), "gone")
            .await
            .unwrap();
        let job = h.store.get(&job_id).await.unwrap().unwrap();
        assert!(job.error.unwrap().message.contains("redis unavailable"));
    }

    #[test]
    fn test_reference_extension() {
        assert_eq!(reference_extension("s3://b/photos/cat.JPG"), "jpg");
        assert_eq!(
            reference_extension("https://b.s3.us-east-1.amazonaws.com/a.png?X-Amz-Expires=60"),
            "png"
        );
        assert_eq!(reference_extension("s3://b/noext"), "bin");
    }
}
