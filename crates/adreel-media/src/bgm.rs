//! Background music.

use std::path::Path;

use adreel_models::{EncodingConfig, MediaAsset};
use tracing::info;

use crate::audio::{compose, AudioInput, TrackPlan};
use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::{MediaError, MediaResult};
use crate::probe::probe_video;

/// Audio plan for adding `bgm` to `video` at `volume`.
pub fn bgm_plan(video: &MediaAsset, bgm: &MediaAsset, volume: f32) -> MediaResult<TrackPlan> {
    if !(0.0..=1.0).contains(&volume) {
        return Err(MediaError::validation(format!(
            "bgm volume must be within [0, 1], got {}",
            volume
        )));
    }
    if !bgm.has_audio {
        return Err(MediaError::invalid_media(format!(
            "background music {} has no audio stream",
            bgm.path.display()
        )));
    }

    let existing = video.has_audio.then(|| {
        AudioInput::new("0:a", video.duration_secs).with_sample_rate(video.audio_sample_rate)
    });
    let music = AudioInput::new("1:a", bgm.duration_secs).with_sample_rate(bgm.audio_sample_rate);

    Ok(TrackPlan::background_music(existing, music, volume, video.duration_secs))
}

/// Mix `bgm` under the video's own audio (or use it alone when the video is
/// silent). The video stream is copied; the output ends with the shorter input.
pub async fn mix_background_music(
    video: &MediaAsset,
    bgm: &MediaAsset,
    volume: f32,
    output: impl AsRef<Path>,
    encoding: &EncodingConfig,
) -> MediaResult<MediaAsset> {
    let output = output.as_ref();
    let audio = compose(&bgm_plan(video, bgm, volume)?)?;

    info!(
        video = %video.path.display(),
        bgm = %bgm.path.display(),
        output = %output.display(),
        volume,
        mixed = video.has_audio,
        duration = audio.duration_secs,
        "Adding background music"
    );

    let cmd = FfmpegCommand::new(&video.path, output)
        .input(&bgm.path)
        .filter_complex(audio.graph.clone())
        .map("0:v:0")
        .map(audio.output_label())
        .video_codec("copy")
        .output_args(encoding.audio_args())
        .output_duration(audio.duration_secs);

    FfmpegRunner::new().with_operation("bgm").run(&cmd).await?;
    probe_video(output).await
}
