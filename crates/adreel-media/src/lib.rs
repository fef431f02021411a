//! FFmpeg CLI wrapper for AdReel composition stages.
//!
//! This crate provides:
//! - Type-safe FFmpeg command building with multi-input support
//! - Progress parsing from `-progress pipe:2`
//! - Geometry normalization (uniform scale + centre crop to a target frame)
//! - Audio composition plans (silence-then-track, mix, pass-through)
//! - Caption wrapping and burn-in
//! - Concat, vertical stack (with duration looping) and background music ops
//! - Source image validation for image-to-video generation

pub mod audio;
pub mod bgm;
pub mod caption;
pub mod command;
pub mod concat;
pub mod error;
pub mod filters;
pub mod geometry;
pub mod image_check;
pub mod probe;
pub mod progress;
pub mod stack;

pub use audio::{compose, AudioComposition, AudioInput, TrackPlan};
pub use bgm::mix_background_music;
pub use caption::{overlay_caption, resolve_font, wrap_caption, CaptionLayout};
pub use command::{check_ffmpeg, check_ffprobe, FfmpegCommand, FfmpegRunner};
pub use concat::concat_clips;
pub use error::{MediaError, MediaResult};
pub use geometry::{fit_video, AudioHandling, FitPlan};
pub use image_check::{validate_image, ImageFacts, ImageKind};
pub use probe::{probe_media, probe_video};
pub use progress::FfmpegProgress;
pub use stack::{stack_clips, LoopPlan};
