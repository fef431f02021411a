//! Audio composition planning.
//!
//! A [`TrackPlan`] describes how the audio of one output is assembled from
//! the available inputs. [`compose`] turns it into a `filter_complex`
//! fragment that always ends in the `[aout]` label, together with the exact
//! duration the emitted track will have.

use crate::error::{MediaError, MediaResult};
use crate::filters::format_secs;

/// Sample rate every mixed or passed-through track is resampled to.
pub const MIX_SAMPLE_RATE: u32 = 44_100;

/// Output label of every composed graph.
pub const AUDIO_OUTPUT_LABEL: &str = "aout";

/// An audio stream available to the filter graph.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioInput {
    /// Stream specifier or label, e.g. `1:a`
    pub label: String,
    pub duration_secs: f64,
    pub sample_rate: Option<u32>,
}

impl AudioInput {
    pub fn new(label: impl Into<String>, duration_secs: f64) -> Self {
        Self {
            label: label.into(),
            duration_secs,
            sample_rate: None,
        }
    }

    pub fn with_sample_rate(mut self, sample_rate: Option<u32>) -> Self {
        self.sample_rate = sample_rate;
        self
    }
}

/// How to build the audio of one output.
#[derive(Debug, Clone, PartialEq)]
pub enum TrackPlan {
    /// Silence for the first clip's measured duration, then the second
    /// clip's audio. A second clip without audio makes the whole result
    /// silent.
    SilenceThenTrack {
        silence_secs: f64,
        follow_secs: f64,
        track: Option<AudioInput>,
    },
    /// Existing track plus gain-scaled background music, summed.
    Mix {
        base: AudioInput,
        bgm: AudioInput,
        volume: f32,
        video_secs: f64,
    },
    /// Whichever candidate carries audio, `primary` first. `gain` applies
    /// only when the fallback is selected.
    PassThrough {
        primary: Option<AudioInput>,
        fallback: Option<AudioInput>,
        gain: f32,
        video_secs: f64,
    },
}

impl TrackPlan {
    /// Plan for a video that may or may not carry audio, plus background music.
    pub fn background_music(
        existing: Option<AudioInput>,
        bgm: AudioInput,
        volume: f32,
        video_secs: f64,
    ) -> Self {
        match existing {
            Some(base) => TrackPlan::Mix {
                base,
                bgm,
                volume,
                video_secs,
            },
            None => TrackPlan::PassThrough {
                primary: None,
                fallback: Some(bgm),
                gain: volume,
                video_secs,
            },
        }
    }
}

/// Result of [`compose`].
#[derive(Debug, Clone, PartialEq)]
pub struct AudioComposition {
    /// Filter graph fragment ending in `[aout]`
    pub graph: String,
    /// Exact duration of the emitted track
    pub duration_secs: f64,
    /// `false` when the emitted track is pure silence
    pub audible: bool,
}

impl AudioComposition {
    pub fn output_label(&self) -> String {
        format!("[{}]", AUDIO_OUTPUT_LABEL)
    }
}

/// Turn a plan into a filter graph fragment.
pub fn compose(plan: &TrackPlan) -> MediaResult<AudioComposition> {
    match plan {
        TrackPlan::SilenceThenTrack {
            silence_secs,
            follow_secs,
            track,
        } => {
            ensure_duration("silence", *silence_secs)?;
            ensure_duration("follow", *follow_secs)?;

            match track {
                Some(track) => {
                    let rate = track.sample_rate.unwrap_or(MIX_SAMPLE_RATE);
                    let graph = format!(
                        "{silence}[sil];[{label}]atrim=duration={follow},asetpts=PTS-STARTPTS,{norm}[trk];[sil][trk]concat=n=2:v=0:a=1[{out}]",
                        silence = silence_source(rate, *silence_secs),
                        label = track.label,
                        follow = format_secs(*follow_secs),
                        norm = normalize_format(rate),
                        out = AUDIO_OUTPUT_LABEL,
                    );
                    Ok(AudioComposition {
                        graph,
                        duration_secs: silence_secs + follow_secs,
                        audible: true,
                    })
                }
                None => Ok(silence(MIX_SAMPLE_RATE, silence_secs + follow_secs)),
            }
        }

        TrackPlan::Mix {
            base,
            bgm,
            volume,
            video_secs,
        } => {
            ensure_volume(*volume)?;
            let limit = base.duration_secs.min(bgm.duration_secs).min(*video_secs);
            ensure_duration("mix", limit)?;

            let graph = format!(
                "[{base}]{norm}[base];[{bgm}]{norm},volume={volume:.3}[bgm];[base][bgm]amix=inputs=2:duration=shortest:normalize=0,atrim=duration={limit}[{out}]",
                base = base.label,
                bgm = bgm.label,
                norm = normalize_format(MIX_SAMPLE_RATE),
                volume = volume,
                limit = format_secs(limit),
                out = AUDIO_OUTPUT_LABEL,
            );
            Ok(AudioComposition {
                graph,
                duration_secs: limit,
                audible: true,
            })
        }

        TrackPlan::PassThrough {
            primary,
            fallback,
            gain,
            video_secs,
        } => {
            let (selected, gain) = match (primary, fallback) {
                (Some(track), _) => (track, 1.0),
                (None, Some(track)) => {
                    ensure_volume(*gain)?;
                    (track, *gain)
                }
                (None, None) => return Ok(silence(MIX_SAMPLE_RATE, *video_secs)),
            };
            let limit = selected.duration_secs.min(*video_secs);
            ensure_duration("pass-through", limit)?;

            let graph = format!(
                "[{label}]{norm},volume={gain:.3},atrim=duration={limit}[{out}]",
                label = selected.label,
                norm = normalize_format(MIX_SAMPLE_RATE),
                gain = gain,
                limit = format_secs(limit),
                out = AUDIO_OUTPUT_LABEL,
            );
            Ok(AudioComposition {
                graph,
                duration_secs: limit,
                audible: true,
            })
        }
    }
}

fn silence(rate: u32, duration_secs: f64) -> AudioComposition {
    AudioComposition {
        graph: format!("{}[{}]", silence_source(rate, duration_secs), AUDIO_OUTPUT_LABEL),
        duration_secs,
        audible: false,
    }
}

fn silence_source(rate: u32, duration_secs: f64) -> String {
    format!(
        "anullsrc=r={}:cl=stereo,atrim=duration={}",
        rate,
        format_secs(duration_secs)
    )
}

fn normalize_format(rate: u32) -> String {
    format!(
        "aresample={},aformat=sample_fmts=fltp:channel_layouts=stereo",
        rate
    )
}

fn ensure_volume(volume: f32) -> MediaResult<()> {
    if (0.0..=1.0).contains(&volume) {
        Ok(())
    } else {
        Err(MediaError::validation(format!(
            "volume must be within [0, 1], got {}",
            volume
        )))
    }
}

fn ensure_duration(what: &str, secs: f64) -> MediaResult<()> {
    if secs.is_finite() && secs >= 0.0 {
        Ok(())
    } else {
        Err(MediaError::invalid_media(format!(
            "{} duration is not a valid length: {}",
            what, secs
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_silence_then_track() {
        // 5 s silent clip followed by a 10 s clip with audio
        let plan = TrackPlan::SilenceThenTrack {
            silence_secs: 5.0,
            follow_secs: 10.0,
            track: Some(AudioInput::new("1:a", 10.0).with_sample_rate(Some(48_000))),
        };
        let composed = compose(&plan).unwrap();

        assert!((composed.duration_secs - 15.0).abs() < 1e-9);
        assert!(composed.audible);
        assert!(composed
            .graph
            .starts_with("anullsrc=r=48000:cl=stereo,atrim=duration=5.000000[sil]"));
        assert!(composed.graph.contains("[1:a]atrim=duration=10.000000"));
        assert!(composed.graph.ends_with("[sil][trk]concat=n=2:v=0:a=1[aout]"));
    }

    #[test]
    fn test_silence_keeps_measured_duration() {
        let plan = TrackPlan::SilenceThenTrack {
            silence_secs: 4.966_667,
            follow_secs: 2.0,
            track: Some(AudioInput::new("1:a", 2.0)),
        };
        let composed = compose(&plan).unwrap();
        assert!(composed.graph.contains("atrim=duration=4.966667[sil]"));
        assert!(composed.graph.contains("anullsrc=r=44100"));
    }

    #[test]
    fn test_silence_then_nothing_is_silent() {
        let plan = TrackPlan::SilenceThenTrack {
            silence_secs: 5.0,
            follow_secs: 10.0,
            track: None,
        };
        let composed = compose(&plan).unwrap();
        assert!(!composed.audible);
        assert_eq!(
            composed.graph,
            "anullsrc=r=44100:cl=stereo,atrim=duration=15.000000[aout]"
        );
    }

    #[test]
    fn test_mix_duration_is_shorter_input() {
        for (video, bgm, volume) in [(15.0, 180.0, 0.3), (15.0, 8.0, 1.0), (12.5, 12.5, 0.0)] {
            let plan = TrackPlan::background_music(
                Some(AudioInput::new("0:a", video)),
                AudioInput::new("1:a", bgm),
                volume,
                video,
            );
            let composed = compose(&plan).unwrap();
            let expected = f64::min(video, bgm);
            assert!((composed.duration_secs - expected).abs() < 1e-9);
            assert!(composed.duration_secs <= video);
            assert!(composed.graph.contains("amix=inputs=2:duration=shortest:normalize=0"));
            assert!(composed.graph.contains(&format!("volume={:.3}[bgm]", volume)));
        }
    }

    #[test]
    fn test_mix_rejects_out_of_range_volume() {
        let plan = TrackPlan::background_music(
            Some(AudioInput::new("0:a", 10.0)),
            AudioInput::new("1:a", 10.0),
            1.5,
            10.0,
        );
        assert!(matches!(compose(&plan), Err(MediaError::Validation(_))));
    }

    #[test]
    fn test_bgm_only_passes_through_with_gain() {
        let plan = TrackPlan::background_music(None, AudioInput::new("1:a", 60.0), 0.3, 15.0);
        assert!(matches!(plan, TrackPlan::PassThrough { .. }));

        let composed = compose(&plan).unwrap();
        assert_eq!(composed.duration_secs, 15.0);
        assert!(composed.graph.starts_with("[1:a]"));
        assert!(composed.graph.contains("volume=0.300"));
    }

    #[test]
    fn test_pass_through_prefers_primary() {
        let plan = TrackPlan::PassThrough {
            primary: Some(AudioInput::new("0:a", 10.0)),
            fallback: Some(AudioInput::new("1:a", 10.0)),
            gain: 0.2,
            video_secs: 10.0,
        };
        let composed = compose(&plan).unwrap();
        assert!(composed.graph.starts_with("[0:a]"));
        assert!(composed.graph.contains("volume=1.000"));
    }

    #[test]
    fn test_pass_through_nothing_is_silence() {
        let plan = TrackPlan::PassThrough {
            primary: None,
            fallback: None,
            gain: 1.0,
            video_secs: 3.0,
        };
        let composed = compose(&plan).unwrap();
        assert!(!composed.audible);
        assert_eq!(composed.duration_secs, 3.0);
    }
}
