//! Video encoding configuration.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Default video codec (H.264)
pub const DEFAULT_VIDEO_CODEC: &str = "libx264";
/// Default audio codec
pub const DEFAULT_AUDIO_CODEC: &str = "aac";
/// Default encoding preset
pub const DEFAULT_PRESET: &str = "fast";
/// Default CRF (Constant Rate Factor) when no target bitrate is set
pub const DEFAULT_CRF: u8 = 18;
/// Default audio bitrate
pub const DEFAULT_AUDIO_BITRATE: &str = "128k";
/// Video bitrate used by the combine stages
pub const COMBINE_VIDEO_BITRATE: &str = "4000k";

/// Video encoding configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct EncodingConfig {
    /// Video codec (e.g., "libx264")
    #[serde(default = "default_video_codec")]
    pub codec: String,

    /// Encoding preset (e.g., "ultrafast", "fast", "medium")
    #[serde(default = "default_preset")]
    pub preset: String,

    /// Constant Rate Factor, ignored when `video_bitrate` is set
    #[serde(default = "default_crf")]
    pub crf: u8,

    /// Target video bitrate (e.g., "4000k")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video_bitrate: Option<String>,

    /// Audio codec
    #[serde(default = "default_audio_codec")]
    pub audio_codec: String,

    /// Audio bitrate
    #[serde(default = "default_audio_bitrate")]
    pub audio_bitrate: String,

    /// Additional FFmpeg output arguments
    #[serde(default)]
    pub extra_args: Vec<String>,
}

fn default_video_codec() -> String {
    DEFAULT_VIDEO_CODEC.to_string()
}
fn default_preset() -> String {
    DEFAULT_PRESET.to_string()
}
fn default_crf() -> u8 {
    DEFAULT_CRF
}
fn default_audio_codec() -> String {
    DEFAULT_AUDIO_CODEC.to_string()
}
fn default_audio_bitrate() -> String {
    DEFAULT_AUDIO_BITRATE.to_string()
}

impl Default for EncodingConfig {
    fn default() -> Self {
        Self {
            codec: DEFAULT_VIDEO_CODEC.to_string(),
            preset: DEFAULT_PRESET.to_string(),
            crf: DEFAULT_CRF,
            video_bitrate: None,
            audio_codec: DEFAULT_AUDIO_CODEC.to_string(),
            audio_bitrate: DEFAULT_AUDIO_BITRATE.to_string(),
            extra_args: Vec::new(),
        }
    }
}

impl EncodingConfig {
    /// Create a new encoding configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Caption burn-in favours speed; the result is re-encoded by the combine stage.
    pub fn for_caption() -> Self {
        Self {
            preset: "ultrafast".to_string(),
            ..Default::default()
        }
    }

    /// Concat mode combine step.
    pub fn for_concat() -> Self {
        Self {
            preset: "fast".to_string(),
            video_bitrate: Some(COMBINE_VIDEO_BITRATE.to_string()),
            ..Default::default()
        }
    }

    /// Vertical stack combine step.
    pub fn for_stack() -> Self {
        Self {
            preset: "faster".to_string(),
            video_bitrate: Some(COMBINE_VIDEO_BITRATE.to_string()),
            ..Default::default()
        }
    }

    /// Normalization of remote generation results.
    pub fn for_generation() -> Self {
        Self {
            preset: "medium".to_string(),
            ..Default::default()
        }
    }

    /// Returns a new config with updated preset.
    pub fn with_preset(mut self, preset: impl Into<String>) -> Self {
        self.preset = preset.into();
        self
    }

    /// Video codec arguments only.
    pub fn video_args(&self) -> Vec<String> {
        let mut args = vec![
            "-c:v".to_string(),
            self.codec.clone(),
            "-preset".to_string(),
            self.preset.clone(),
        ];

        match &self.video_bitrate {
            Some(bitrate) => args.extend_from_slice(&["-b:v".to_string(), bitrate.clone()]),
            None => args.extend_from_slice(&["-crf".to_string(), self.crf.to_string()]),
        }

        // Every target frame is 4:2:0 compatible
        args.extend_from_slice(&["-pix_fmt".to_string(), "yuv420p".to_string()]);
        args
    }

    /// Audio codec arguments only.
    pub fn audio_args(&self) -> Vec<String> {
        vec![
            "-c:a".to_string(),
            self.audio_codec.clone(),
            "-b:a".to_string(),
            self.audio_bitrate.clone(),
        ]
    }

    /// Convert to FFmpeg command arguments.
    pub fn to_ffmpeg_args(&self) -> Vec<String> {
        let mut args = self.video_args();
        args.extend(self.audio_args());
        args.extend(self.extra_args.clone());
        args
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = EncodingConfig::default();
        assert_eq!(config.codec, "libx264");
        assert_eq!(config.crf, 18);
        assert!(config.video_bitrate.is_none());
    }

    #[test]
    fn test_ffmpeg_args_use_crf_without_bitrate() {
        let args = EncodingConfig::default().to_ffmpeg_args();
        assert!(args.contains(&"-crf".to_string()));
        assert!(!args.contains(&"-b:v".to_string()));
        assert!(args.contains(&"aac".to_string()));
    }

    #[test]
    fn test_combine_presets_use_bitrate() {
        let concat = EncodingConfig::for_concat().to_ffmpeg_args();
        assert!(concat.windows(2).any(|w| w[0] == "-b:v" && w[1] == "4000k"));
        assert!(!concat.contains(&"-crf".to_string()));
        assert_eq!(EncodingConfig::for_stack().preset, "faster");
        assert_eq!(EncodingConfig::for_caption().preset, "ultrafast");
    }
}
