//! Probed media assets.

use std::path::{Path, PathBuf};

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// A video or audio file with the attributes the pipeline depends on.
///
/// Assets are immutable once probed. Every stage produces a fresh asset
/// describing its own output file, even when that file overwrites an
/// earlier one on disk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct MediaAsset {
    /// Local path of the file
    pub path: PathBuf,
    /// Frame width in pixels (0 for audio-only files)
    pub width: u32,
    /// Frame height in pixels (0 for audio-only files)
    pub height: u32,
    /// Measured duration in seconds
    pub duration_secs: f64,
    /// Whether the file carries at least one audio stream
    pub has_audio: bool,
    /// Sample rate of the first audio stream
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio_sample_rate: Option<u32>,
}

impl MediaAsset {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Width over height, or 0.0 for assets without a video stream.
    pub fn aspect(&self) -> f64 {
        if self.height == 0 {
            0.0
        } else {
            self.width as f64 / self.height as f64
        }
    }

    pub fn has_video(&self) -> bool {
        self.width > 0 && self.height > 0
    }

    /// Same media attributes at a new location.
    pub fn relocated(&self, path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            ..self.clone()
        }
    }
}
