//! Vertical stacking of two fitted clips.

use std::path::Path;

use adreel_models::{EncodingConfig, MediaAsset, StackPosition};
use tracing::info;

use crate::audio::{compose, AudioInput, TrackPlan};
use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::{MediaError, MediaResult};
use crate::filters::vstack;
use crate::probe::probe_video;

/// Which input gets repeated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopedTrack {
    Primary,
    Secondary,
}

/// Duration matching for the two stacked clips.
///
/// The shorter clip is repeated whole until it covers the longer one, then
/// the output is cut at exactly the longer clip's duration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LoopPlan {
    pub looped: LoopedTrack,
    /// Additional plays of the looped clip after the first
    pub extra_loops: u32,
    pub looped_secs: f64,
    pub target_secs: f64,
}

impl LoopPlan {
    pub fn compute(primary_secs: f64, secondary_secs: f64) -> MediaResult<Self> {
        for (name, secs) in [("primary", primary_secs), ("secondary", secondary_secs)] {
            if !(secs.is_finite() && secs > 0.0) {
                return Err(MediaError::invalid_media(format!(
                    "{} clip has no usable duration ({})",
                    name, secs
                )));
            }
        }

        let (looped, shorter, target) = if secondary_secs <= primary_secs {
            (LoopedTrack::Secondary, secondary_secs, primary_secs)
        } else {
            (LoopedTrack::Primary, primary_secs, secondary_secs)
        };

        let plays = (target / shorter).ceil().max(1.0) as u32;
        Ok(Self {
            looped,
            extra_loops: plays - 1,
            looped_secs: shorter,
            target_secs: target,
        })
    }

    /// Total length of the looped clip after repetition.
    pub fn covered_secs(&self) -> f64 {
        self.looped_secs * (self.extra_loops + 1) as f64
    }

    fn loops_for(&self, track: LoopedTrack) -> u32 {
        if self.looped == track {
            self.extra_loops
        } else {
            0
        }
    }
}

/// Stack `primary` (900x960) and `secondary` (900x640) on one canvas.
///
/// Only the primary clip's audio is kept.
pub async fn stack_clips(
    primary: &MediaAsset,
    secondary: &MediaAsset,
    position: StackPosition,
    output: impl AsRef<Path>,
    encoding: &EncodingConfig,
) -> MediaResult<MediaAsset> {
    let output = output.as_ref();
    if primary.width != secondary.width {
        return Err(MediaError::invalid_media(format!(
            "cannot stack clips of width {} and {}",
            primary.width, secondary.width
        )));
    }

    let plan = LoopPlan::compute(primary.duration_secs, secondary.duration_secs)?;
    let (top, bottom) = match position {
        StackPosition::Top => ("p", "s"),
        StackPosition::Bottom => ("s", "p"),
    };

    let mut graph = format!(
        "[0:v]setpts=PTS-STARTPTS[p];[1:v]setpts=PTS-STARTPTS[s];{}",
        vstack(top, bottom, "vout")
    );

    let audio = if primary.has_audio {
        let primary_audio_secs = match plan.looped {
            LoopedTrack::Primary => plan.covered_secs(),
            LoopedTrack::Secondary => primary.duration_secs,
        };
        Some(compose(&TrackPlan::PassThrough {
            primary: Some(AudioInput::new("0:a", primary_audio_secs)),
            fallback: None,
            gain: 1.0,
            video_secs: plan.target_secs,
        })?)
    } else {
        None
    };

    info!(
        primary = %primary.path.display(),
        secondary = %secondary.path.display(),
        output = %output.display(),
        looped = ?plan.looped,
        extra_loops = plan.extra_loops,
        target_secs = plan.target_secs,
        "Stacking clips"
    );

    let mut cmd = FfmpegCommand::without_inputs(output)
        .input(&primary.path)
        .stream_loop(plan.loops_for(LoopedTrack::Primary))
        .input(&secondary.path)
        .stream_loop(plan.loops_for(LoopedTrack::Secondary));

    match &audio {
        Some(audio) => {
            graph = format!("{};{}", graph, audio.graph);
            cmd = cmd
                .filter_complex(graph)
                .map("[vout]")
                .map(audio.output_label())
                .output_args(encoding.to_ffmpeg_args());
        }
        None => {
            cmd = cmd
                .filter_complex(graph)
                .map("[vout]")
                .output_args(encoding.video_args())
                .no_audio();
        }
    }

    let cmd = cmd.output_duration(plan.target_secs);
    FfmpegRunner::new().with_operation("stack").run(&cmd).await?;
    probe_video(output).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shorter_secondary_loops_to_primary() {
        let plan = LoopPlan::compute(30.0, 7.0).unwrap();
        assert_eq!(plan.looped, LoopedTrack::Secondary);
        assert_eq!(plan.extra_loops, 4);
        assert_eq!(plan.target_secs, 30.0);
        assert!(plan.covered_secs() >= plan.target_secs);
    }

    #[test]
    fn test_shorter_primary_loops_to_secondary() {
        let plan = LoopPlan::compute(4.0, 10.0).unwrap();
        assert_eq!(plan.looped, LoopedTrack::Primary);
        assert_eq!(plan.extra_loops, 2);
        assert_eq!(plan.target_secs, 10.0);
        assert_eq!(plan.loops_for(LoopedTrack::Secondary), 0);
    }

    #[test]
    fn test_exact_multiple_needs_no_ragged_tail() {
        let plan = LoopPlan::compute(21.0, 7.0).unwrap();
        assert_eq!(plan.extra_loops, 2);
        assert_eq!(plan.covered_secs(), 21.0);
    }

    #[test]
    fn test_equal_durations_do_not_loop() {
        let plan = LoopPlan::compute(12.0, 12.0).unwrap();
        assert_eq!(plan.extra_loops, 0);
        assert_eq!(plan.target_secs, 12.0);
    }

    #[test]
    fn test_target_is_always_the_longer_track() {
        for (a, b) in [(1.5, 9.25), (60.0, 0.5), (33.3, 33.4), (5.0, 5.0)] {
            let plan = LoopPlan::compute(a, b).unwrap();
            assert_eq!(plan.target_secs, f64::max(a, b));
            assert!(plan.covered_secs() >= plan.target_secs);
            // One play fewer would not have been enough
            assert!(plan.looped_secs * (plan.extra_loops as f64) < plan.target_secs);
        }
    }

    #[test]
    fn test_zero_duration_rejected() {
        assert!(LoopPlan::compute(0.0, 5.0).is_err());
        assert!(LoopPlan::compute(5.0, f64::NAN).is_err());
    }
}
