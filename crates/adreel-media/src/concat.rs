//! Sequential concatenation of two fitted clips.

use std::path::Path;

use adreel_models::{EncodingConfig, MediaAsset};
use tracing::info;

use crate::audio::{compose, AudioInput, TrackPlan};
use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::{MediaError, MediaResult};
use crate::filters::{concat_video, format_secs};
use crate::probe::probe_video;

/// Audio plan for `first` followed by `second`: the first clip is silenced
/// for exactly its measured duration, the second keeps its own audio.
pub fn concat_audio_plan(first: &MediaAsset, second: &MediaAsset) -> TrackPlan {
    TrackPlan::SilenceThenTrack {
        silence_secs: first.duration_secs,
        follow_secs: second.duration_secs,
        track: second.has_audio.then(|| {
            AudioInput::new("1:a", second.duration_secs).with_sample_rate(second.audio_sample_rate)
        }),
    }
}

/// Play `first` then `second`. Both must already share frame size and rate.
pub async fn concat_clips(
    first: &MediaAsset,
    second: &MediaAsset,
    output: impl AsRef<Path>,
    encoding: &EncodingConfig,
) -> MediaResult<MediaAsset> {
    let output = output.as_ref();
    if (first.width, first.height) != (second.width, second.height) {
        return Err(MediaError::invalid_media(format!(
            "cannot concatenate {}x{} with {}x{}",
            first.width, first.height, second.width, second.height
        )));
    }

    let audio = compose(&concat_audio_plan(first, second))?;

    // Video segments are trimmed to the same measured durations the audio uses
    let graph = format!(
        "[0:v]trim=duration={},setpts=PTS-STARTPTS[v0];[1:v]trim=duration={},setpts=PTS-STARTPTS[v1];{};{}",
        format_secs(first.duration_secs),
        format_secs(second.duration_secs),
        concat_video(&["v0", "v1"], "vout"),
        audio.graph,
    );

    info!(
        first = %first.path.display(),
        second = %second.path.display(),
        output = %output.display(),
        duration = audio.duration_secs,
        audible = audio.audible,
        "Concatenating clips"
    );

    let cmd = FfmpegCommand::new(&first.path, output)
        .input(&second.path)
        .filter_complex(graph)
        .map("[vout]")
        .map(audio.output_label())
        .output_args(encoding.to_ffmpeg_args());

    FfmpegRunner::new().with_operation("concat").run(&cmd).await?;
    probe_video(output).await
}
