//! Error types for media operations.

use std::path::PathBuf;
use thiserror::Error;

/// Result type for media operations.
pub type MediaResult<T> = Result<T, MediaError>;

/// Errors that can occur during media processing.
#[derive(Debug, Error)]
pub enum MediaError {
    #[error("FFmpeg not found in PATH")]
    FfmpegNotFound,

    #[error("FFprobe not found in PATH")]
    FfprobeNotFound,

    #[error("FFmpeg command failed: {message}")]
    FfmpegFailed {
        message: String,
        stderr: Option<String>,
        exit_code: Option<i32>,
    },

    #[error("FFprobe command failed: {message}")]
    FfprobeFailed {
        message: String,
        stderr: Option<String>,
    },

    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Invalid media file: {0}")]
    InvalidMedia(String),

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("Image decode error: {0}")]
    Image(#[from] image::ImageError),
}

impl MediaError {
    /// Create an FFmpeg failure error.
    pub fn ffmpeg_failed(
        message: impl Into<String>,
        stderr: Option<String>,
        exit_code: Option<i32>,
    ) -> Self {
        Self::FfmpegFailed {
            message: message.into(),
            stderr,
            exit_code,
        }
    }

    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Create an invalid configuration error.
    pub fn invalid_configuration(message: impl Into<String>) -> Self {
        Self::InvalidConfiguration(message.into())
    }

    /// Create an invalid media error.
    pub fn invalid_media(message: impl Into<String>) -> Self {
        Self::InvalidMedia(message.into())
    }

    /// Whether the error points at a referenced file that does not exist.
    pub fn is_missing_asset(&self) -> bool {
        matches!(self, MediaError::FileNotFound(_))
    }
}

impl From<adreel_models::FontError> for MediaError {
    fn from(err: adreel_models::FontError) -> Self {
        match err {
            adreel_models::FontError::MissingFile(path) => MediaError::FileNotFound(path),
            unknown @ adreel_models::FontError::UnknownStyle { .. } => {
                MediaError::InvalidConfiguration(unknown.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use adreel_models::FontError;

    #[test]
    fn test_font_errors_map_to_taxonomy() {
        let missing: MediaError = FontError::MissingFile(PathBuf::from("fonts/x.ttf")).into();
        assert!(missing.is_missing_asset());

        let unknown: MediaError = FontError::UnknownStyle {
            requested: "comic".into(),
            available: "poppins".into(),
        }
        .into();
        assert!(matches!(unknown, MediaError::InvalidConfiguration(_)));
    }
}
