//! Composition pipeline.
//!
//! A run moves through `Downloaded -> Overlaid -> Combined -> BgmApplied -> Final`
//! strictly in order, each stage consuming the previous stage's output file.
//! A failing stage aborts the run and the error is tagged with that stage.
//! Intermediates stay in the workspace.

use std::fmt;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use adreel_media::{
    concat_clips, fit_video, mix_background_music, overlay_caption, probe_media, probe_video,
    resolve_font, stack_clips, AudioHandling,
};
use adreel_models::{
    CaptionPosition, CompositionMode, CompositionSpec, EncodingConfig, FontRegistry, MediaAsset,
    ResolvedFont, Stage, TargetFrame,
};
use adreel_storage::ObjectTransfer;
use tracing::{info, warn};

use crate::error::{WorkerError, WorkerResult};
use crate::metrics;

const AVATAR_FILE: &str = "avatar.mp4";
const REAL_VIDEO_FILE: &str = "real_video.mp4";
const GAME_VIDEO_FILE: &str = "game_video.mp4";
const BGM_FILE: &str = "bgm_1.mp3";
const CAPTIONED_FILE: &str = "avatar_with_text.mp4";
const CONCAT_OUTPUT_FILE: &str = "combined_vid.mp4";
const STACK_OUTPUT_FILE: &str = "vertical_combined_vid.mp4";

/// Progress marker of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Downloaded,
    Overlaid,
    Combined,
    BgmApplied,
    Final,
}

impl RunState {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunState::Downloaded => "downloaded",
            RunState::Overlaid => "overlaid",
            RunState::Combined => "combined",
            RunState::BgmApplied => "bgm_applied",
            RunState::Final => "final",
        }
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Result of a finished run.
#[derive(Debug, Clone)]
pub struct CompositionOutcome {
    /// Retrievable reference returned by the byte-transfer collaborator
    pub result_ref: String,
    /// Final local file, before upload
    pub final_asset: MediaAsset,
    /// States passed through, in order
    pub states: Vec<RunState>,
}

/// Caption work resolved before any download happens.
struct CaptionJob<'a> {
    text: &'a str,
    position: CaptionPosition,
    font: ResolvedFont,
}

struct Inputs {
    primary: MediaAsset,
    secondary: MediaAsset,
    bgm: Option<MediaAsset>,
}

/// Runs concat and vertical-stack compositions.
#[derive(Clone)]
pub struct CompositionPipeline {
    transfer: Arc<dyn ObjectTransfer>,
    fonts: Arc<FontRegistry>,
}

impl CompositionPipeline {
    pub fn new(transfer: Arc<dyn ObjectTransfer>, fonts: Arc<FontRegistry>) -> Self {
        Self { transfer, fonts }
    }

    pub fn fonts(&self) -> &FontRegistry {
        &self.fonts
    }

    /// Run one composition inside `workspace`.
    pub async fn run(
        &self,
        spec: &CompositionSpec,
        workspace: &Path,
    ) -> WorkerResult<CompositionOutcome> {
        let started = Instant::now();
        let result = self.execute(spec, workspace).await;

        match &result {
            Ok(outcome) => {
                metrics::record_composition_run(spec.mode, "success");
                info!(
                    mode = %spec.mode,
                    result = %outcome.result_ref,
                    duration_secs = outcome.final_asset.duration_secs,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Composition finished"
                );
            }
            Err(e) => {
                metrics::record_composition_run(spec.mode, "failure");
                warn!(
                    mode = %spec.mode,
                    stage = e.stage().map(|s| s.as_str()).unwrap_or("validation"),
                    kind = %e.kind().as_str(),
                    "Composition failed: {}",
                    e.detail()
                );
            }
        }

        result
    }

    async fn execute(
        &self,
        spec: &CompositionSpec,
        workspace: &Path,
    ) -> WorkerResult<CompositionOutcome> {
        // Nothing is fetched until the description is known to be usable
        spec.validate()?;
        let caption = self.caption_job(spec)?;

        let mut states = Vec::with_capacity(5);

        let inputs = timed(Stage::Download, self.download(spec, workspace)).await?;
        transition(&mut states, spec, RunState::Downloaded, &inputs.primary);

        let mut primary = inputs.primary;
        if let Some(caption) = &caption {
            primary = timed(Stage::Overlay, async {
                let output = workspace.join(CAPTIONED_FILE);
                Ok::<_, WorkerError>(overlay_caption(
                    &primary,
                    &output,
                    caption.text,
                    caption.position,
                    &caption.font,
                    &EncodingConfig::for_caption(),
                )
                .await?)
            })
            .await?;
            transition(&mut states, spec, RunState::Overlaid, &primary);
        }

        let combined = timed(
            Stage::Combine,
            combine(spec, &primary, &inputs.secondary, workspace),
        )
        .await?;
        transition(&mut states, spec, RunState::Combined, &combined);

        let final_asset = match (&inputs.bgm, spec.effective_bgm_volume()) {
            (Some(bgm), Some(volume)) => {
                let mixed = timed(Stage::Bgm, async {
                    let output = with_suffix(&combined.path, "with_bgm");
                    Ok::<_, WorkerError>(mix_background_music(
                        &combined,
                        bgm,
                        volume,
                        &output,
                        &EncodingConfig::new(),
                    )
                    .await?)
                })
                .await?;
                transition(&mut states, spec, RunState::BgmApplied, &mixed);
                mixed
            }
            _ => combined,
        };

        let result_ref = timed(Stage::Upload, async {
            Ok::<_, WorkerError>(self.transfer.store(&final_asset.path).await?)
        })
        .await?;
        transition(&mut states, spec, RunState::Final, &final_asset);

        Ok(CompositionOutcome {
            result_ref,
            final_asset,
            states,
        })
    }

    fn caption_job<'a>(&self, spec: &'a CompositionSpec) -> WorkerResult<Option<CaptionJob<'a>>> {
        if spec.mode != CompositionMode::Concat {
            return Ok(None);
        }
        let Some(text) = spec.caption() else {
            return Ok(None);
        };
        let style = spec
            .font_style
            .as_deref()
            .ok_or_else(|| WorkerError::validation("font_style is required with a caption"))?;

        Ok(Some(CaptionJob {
            text,
            position: spec.caption_position.unwrap_or_default(),
            font: resolve_font(&self.fonts, style)?,
        }))
    }

    async fn download(&self, spec: &CompositionSpec, workspace: &Path) -> WorkerResult<Inputs> {
        tokio::fs::create_dir_all(workspace).await?;

        let (primary_name, secondary_name) = match spec.mode {
            CompositionMode::Concat => (AVATAR_FILE, REAL_VIDEO_FILE),
            CompositionMode::VerticalStack => (REAL_VIDEO_FILE, GAME_VIDEO_FILE),
        };
        let primary_path = workspace.join(primary_name);
        let secondary_path = workspace.join(secondary_name);
        let bgm_path = workspace.join(BGM_FILE);

        let bgm_fetch = async {
            match &spec.bgm {
                Some(reference) => self.transfer.fetch(reference, &bgm_path).await.map(Some),
                None => Ok(None),
            }
        };

        let (primary, secondary, bgm) = tokio::try_join!(
            self.transfer.fetch(&spec.primary, &primary_path),
            self.transfer.fetch(&spec.secondary, &secondary_path),
            bgm_fetch,
        )?;

        let (primary, secondary) = tokio::try_join!(probe_video(&primary), probe_video(&secondary))?;
        let bgm = match bgm {
            Some(path) => Some(probe_media(&path).await?),
            None => None,
        };

        Ok(Inputs {
            primary,
            secondary,
            bgm,
        })
    }
}

async fn combine(
    spec: &CompositionSpec,
    primary: &MediaAsset,
    secondary: &MediaAsset,
    workspace: &Path,
) -> WorkerResult<MediaAsset> {
    match spec.mode {
        CompositionMode::Concat => {
            let encoding = EncodingConfig::for_concat();
            // The avatar's own audio is replaced by silence in the concat plan
            let (first, second) = tokio::try_join!(
                fit_video(
                    primary,
                    fitted_path(primary),
                    TargetFrame::CONCAT,
                    AudioHandling::Drop,
                    &encoding,
                ),
                fit_video(
                    secondary,
                    fitted_path(secondary),
                    TargetFrame::CONCAT,
                    AudioHandling::Keep,
                    &encoding,
                ),
            )?;
            Ok(concat_clips(&first, &second, workspace.join(CONCAT_OUTPUT_FILE), &encoding).await?)
        }
        CompositionMode::VerticalStack => {
            let encoding = EncodingConfig::for_stack();
            let (top, bottom) = tokio::try_join!(
                fit_video(
                    primary,
                    fitted_path(primary),
                    TargetFrame::STACK_PRIMARY,
                    AudioHandling::Keep,
                    &encoding,
                ),
                fit_video(
                    secondary,
                    fitted_path(secondary),
                    TargetFrame::STACK_SECONDARY,
                    AudioHandling::Drop,
                    &encoding,
                ),
            )?;
            Ok(stack_clips(
                &top,
                &bottom,
                spec.stack_position.unwrap_or_default(),
                workspace.join(STACK_OUTPUT_FILE),
                &encoding,
            )
            .await?)
        }
    }
}

/// Await a stage, tag its error and record how long it took.
async fn timed<T, F>(stage: Stage, fut: F) -> WorkerResult<T>
where
    F: Future<Output = WorkerResult<T>>,
{
    let started = Instant::now();
    let result = fut.await.map_err(|e| e.at_stage(stage));
    metrics::record_stage_duration(stage, started.elapsed().as_secs_f64());
    result
}

fn transition(
    states: &mut Vec<RunState>,
    spec: &CompositionSpec,
    state: RunState,
    asset: &MediaAsset,
) {
    info!(
        mode = %spec.mode,
        state = %state,
        path = %asset.path.display(),
        size = %format!("{}x{}", asset.width, asset.height),
        duration_secs = asset.duration_secs,
        "Composition state reached"
    );
    states.push(state);
}

fn fitted_path(asset: &MediaAsset) -> PathBuf {
    with_suffix(&asset.path, "fitted")
}

/// `dir/name.ext` -> `dir/name_{suffix}.mp4`
fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("output");
    path.with_file_name(format!("{}_{}.mp4", stem, suffix))
}

#[cfg(test)]
mod tests {
    use super::*;
    use adreel_media::{FfmpegCommand, FfmpegRunner};
    use adreel_models::{FailureKind, StackPosition};
    use adreel_storage::{LocalTransfer, StorageError, StorageResult};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Transfer that counts calls and never finds anything.
    #[derive(Default)]
    struct CountingTransfer {
        fetches: AtomicUsize,
    }

    #[async_trait]
    impl ObjectTransfer for CountingTransfer {
        async fn fetch(&self, reference: &str, _dest: &Path) -> StorageResult<PathBuf> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            Err(StorageError::not_found(reference))
        }

        async fn store(&self, _local: &Path) -> StorageResult<String> {
            Ok("file:///unused".to_string())
        }
    }

    fn pipeline(fonts_dir: &Path) -> (CompositionPipeline, Arc<CountingTransfer>) {
        let transfer = Arc::new(CountingTransfer::default());
        let pipeline = CompositionPipeline::new(
            transfer.clone(),
            Arc::new(FontRegistry::builtin(fonts_dir)),
        );
        (pipeline, transfer)
    }

    #[tokio::test]
    async fn test_bgm_volume_rejected_before_download() {
        let dir = tempfile::tempdir().unwrap();
        let (pipeline, transfer) = pipeline(dir.path());
        let spec = CompositionSpec::concat("s3://b/avatar.mp4", "s3://b/demo.mp4")
            .with_bgm("s3://b/music.mp3", Some(1.5));

        let err = pipeline.run(&spec, dir.path()).await.unwrap_err();

        assert_eq!(err.kind(), FailureKind::Validation);
        assert_eq!(err.stage(), None);
        assert_eq!(transfer.fetches.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_unknown_font_is_configuration_error() {
        let dir = tempfile::tempdir().unwrap();
        let (pipeline, transfer) = pipeline(dir.path());
        let spec = CompositionSpec::concat("s3://b/avatar.mp4", "s3://b/demo.mp4").with_caption(
            "Try it today",
            CaptionPosition::Top,
            "comicSans",
        );

        let err = pipeline.run(&spec, dir.path()).await.unwrap_err();

        assert_eq!(err.kind(), FailureKind::InvalidConfiguration);
        assert_eq!(transfer.fetches.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_missing_font_file_is_missing_asset() {
        let dir = tempfile::tempdir().unwrap();
        let (pipeline, transfer) = pipeline(dir.path());
        let spec = CompositionSpec::concat("s3://b/avatar.mp4", "s3://b/demo.mp4").with_caption(
            "Try it today",
            CaptionPosition::Bottom,
            "poppins",
        );

        let err = pipeline.run(&spec, dir.path()).await.unwrap_err();

        assert_eq!(err.kind(), FailureKind::MissingAsset);
        assert_eq!(err.stage(), None);
        assert_eq!(transfer.fetches.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_caption_not_allowed_in_stack_mode() {
        let dir = tempfile::tempdir().unwrap();
        let (pipeline, transfer) = pipeline(dir.path());
        let spec =
            CompositionSpec::vertical_stack("s3://b/real.mp4", "s3://b/game.mp4", StackPosition::Top)
                .with_caption("hello", CaptionPosition::Top, "poppins");

        let err = pipeline.run(&spec, dir.path()).await.unwrap_err();

        assert_eq!(err.kind(), FailureKind::Validation);
        assert_eq!(transfer.fetches.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_missing_input_fails_download_stage() {
        let dir = tempfile::tempdir().unwrap();
        let (pipeline, transfer) = pipeline(dir.path());
        let spec = CompositionSpec::concat("s3://b/avatar.mp4", "s3://b/demo.mp4");

        let err = pipeline
            .run(&spec, &dir.path().join("run-1"))
            .await
            .unwrap_err();

        assert_eq!(err.stage(), Some(Stage::Download));
        assert_eq!(err.kind(), FailureKind::MissingAsset);
        assert!(transfer.fetches.load(Ordering::SeqCst) >= 1);

        let detail = err.to_failure_detail();
        assert_eq!(detail.stage, Some(Stage::Download));
    }

    #[tokio::test]
    async fn test_unreadable_input_fails_download_stage() {
        let dir = tempfile::tempdir().unwrap();
        let notes = dir.path().join("notes.mp4");
        std::fs::write(&notes, b"not a video").unwrap();
        let pipeline = CompositionPipeline::new(
            Arc::new(LocalTransfer::new(dir.path().join("bucket"))),
            Arc::new(FontRegistry::builtin(dir.path())),
        );
        let reference = notes.to_string_lossy().into_owned();
        let spec = CompositionSpec::concat(reference.clone(), reference);

        let err = pipeline
            .run(&spec, &dir.path().join("run"))
            .await
            .unwrap_err();

        assert_eq!(err.stage(), Some(Stage::Download));
    }

    #[tokio::test]
    async fn test_stage_tag_follows_the_failing_stage() {
        for stage in [Stage::Overlay, Stage::Combine, Stage::Bgm, Stage::Upload] {
            let err = timed(stage, async {
                Err::<(), _>(WorkerError::Processing("ffmpeg exited with 1".into()))
            })
            .await
            .unwrap_err();

            assert_eq!(err.stage(), Some(stage));
            assert_eq!(err.to_failure_detail().stage, Some(stage));
        }
    }

    /// Fetches from the local filesystem, refuses every upload.
    struct UploadRefused {
        inner: LocalTransfer,
    }

    #[async_trait]
    impl ObjectTransfer for UploadRefused {
        async fn fetch(&self, reference: &str, dest: &Path) -> StorageResult<PathBuf> {
            self.inner.fetch(reference, dest).await
        }

        async fn store(&self, local: &Path) -> StorageResult<String> {
            Err(StorageError::upload_failed(format!("{} refused", local.display())))
        }
    }

    /// Render a test pattern clip, optionally with a tone.
    async fn synthetic_clip(dir: &Path, name: &str, size: &str, secs: u32, audio: bool) -> String {
        let output = dir.join(name);
        let mut cmd = FfmpegCommand::without_inputs(&output)
            .lavfi_input(format!("testsrc=size={}:rate=25:duration={}", size, secs));
        if audio {
            cmd = cmd.lavfi_input(format!("sine=frequency=440:duration={}", secs));
        }
        let cmd = cmd.output_args(["-c:v", "libx264", "-pix_fmt", "yuv420p"]);
        let cmd = if audio {
            cmd.output_args(["-c:a", "aac", "-shortest"])
        } else {
            cmd.no_audio()
        };
        FfmpegRunner::new().run(&cmd).await.unwrap();
        output.to_string_lossy().into_owned()
    }

    async fn synthetic_tone(dir: &Path, secs: u32) -> String {
        let output = dir.join("music.m4a");
        let cmd = FfmpegCommand::without_inputs(&output)
            .lavfi_input(format!("sine=frequency=220:duration={}", secs))
            .output_args(["-c:a", "aac"]);
        FfmpegRunner::new().run(&cmd).await.unwrap();
        output.to_string_lossy().into_owned()
    }

    /// Install a system TrueType font under the `poppins` file name.
    fn install_font(fonts_dir: &Path) {
        let font = [
            "/usr/share/fonts/truetype/dejavu/DejaVuSans-Bold.ttf",
            "/usr/share/fonts/TTF/DejaVuSans-Bold.ttf",
            "/usr/share/fonts/dejavu/DejaVuSans-Bold.ttf",
            "/Library/Fonts/Arial.ttf",
        ]
        .iter()
        .map(PathBuf::from)
        .find(|p| p.exists())
        .expect("a TrueType font is needed for caption tests");
        std::fs::create_dir_all(fonts_dir).unwrap();
        std::fs::copy(font, fonts_dir.join("Poppins-ExtraBold.ttf")).unwrap();
    }

    #[tokio::test]
    #[ignore = "requires ffmpeg"]
    async fn test_concat_run_passes_every_state() {
        let dir = tempfile::tempdir().unwrap();
        let fonts = dir.path().join("fonts");
        install_font(&fonts);
        let pipeline = CompositionPipeline::new(
            Arc::new(LocalTransfer::new(dir.path().join("bucket"))),
            Arc::new(FontRegistry::builtin(&fonts)),
        );

        let avatar = synthetic_clip(dir.path(), "avatar_src.mp4", "1280x720", 2, true).await;
        let demo = synthetic_clip(dir.path(), "demo_src.mp4", "720x1280", 3, true).await;
        let music = synthetic_tone(dir.path(), 8).await;
        let spec = CompositionSpec::concat(avatar, demo)
            .with_caption("Try it today", CaptionPosition::Bottom, "poppins")
            .with_bgm(music, None);

        let outcome = pipeline.run(&spec, &dir.path().join("run")).await.unwrap();

        assert_eq!(
            outcome.states,
            vec![
                RunState::Downloaded,
                RunState::Overlaid,
                RunState::Combined,
                RunState::BgmApplied,
                RunState::Final,
            ]
        );
        assert!(outcome.result_ref.starts_with("file://"));
        assert_eq!(
            (outcome.final_asset.width, outcome.final_asset.height),
            (720, 1280)
        );
        assert!((outcome.final_asset.duration_secs - 5.0).abs() < 0.3);
        assert!(dir.path().join("run").join(CAPTIONED_FILE).exists());
    }

    #[tokio::test]
    #[ignore = "requires ffmpeg"]
    async fn test_broken_font_fails_overlay_stage() {
        let dir = tempfile::tempdir().unwrap();
        let fonts = dir.path().join("fonts");
        std::fs::create_dir_all(&fonts).unwrap();
        std::fs::write(fonts.join("Poppins-ExtraBold.ttf"), b"not a font").unwrap();
        let pipeline = CompositionPipeline::new(
            Arc::new(LocalTransfer::new(dir.path().join("bucket"))),
            Arc::new(FontRegistry::builtin(&fonts)),
        );

        let avatar = synthetic_clip(dir.path(), "avatar_src.mp4", "720x1280", 1, true).await;
        let demo = synthetic_clip(dir.path(), "demo_src.mp4", "720x1280", 1, true).await;
        let spec = CompositionSpec::concat(avatar, demo).with_caption(
            "Try it today",
            CaptionPosition::Top,
            "poppins",
        );

        let err = pipeline
            .run(&spec, &dir.path().join("run"))
            .await
            .unwrap_err();

        assert_eq!(err.stage(), Some(Stage::Overlay));
    }

    #[tokio::test]
    #[ignore = "requires ffmpeg"]
    async fn test_refused_upload_fails_upload_stage() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = CompositionPipeline::new(
            Arc::new(UploadRefused {
                inner: LocalTransfer::new(dir.path().join("bucket")),
            }),
            Arc::new(FontRegistry::builtin(dir.path())),
        );

        let real = synthetic_clip(dir.path(), "real_src.mp4", "1080x1920", 2, true).await;
        let game = synthetic_clip(dir.path(), "game_src.mp4", "1280x720", 1, false).await;
        let spec = CompositionSpec::vertical_stack(real, game, StackPosition::Bottom);

        let err = pipeline
            .run(&spec, &dir.path().join("run"))
            .await
            .unwrap_err();

        assert_eq!(err.stage(), Some(Stage::Upload));
        assert_eq!(err.kind(), FailureKind::Transfer);
        assert!(dir.path().join("run").join(STACK_OUTPUT_FILE).exists());
    }

    #[test]
    fn test_intermediate_names() {
        assert_eq!(
            with_suffix(Path::new("/w/combined_vid.mp4"), "with_bgm"),
            PathBuf::from("/w/combined_vid_with_bgm.mp4")
        );
        assert_eq!(
            fitted_path(&MediaAsset {
                path: PathBuf::from("/w/avatar_with_text.mp4"),
                width: 1080,
                height: 1920,
                duration_secs: 5.0,
                has_audio: true,
                audio_sample_rate: Some(44_100),
            }),
            PathBuf::from("/w/avatar_with_text_fitted.mp4")
        );
    }
}
