//! Shared data models for the AdReel backend.
//!
//! This crate provides Serde-serializable types for:
//! - Probed media assets and fixed target frames
//! - Composition run descriptions (concat and vertical stack)
//! - The caption font registry
//! - Image-to-video generation jobs and their status view
//! - Structured failure details shared by every surface
//! - Encoding presets per stage

pub mod asset;
pub mod composition;
pub mod encoding;
pub mod failure;
pub mod font;
pub mod frame;
pub mod job;

// Re-export common types
pub use asset::MediaAsset;
pub use composition::{
    CaptionPosition, CompositionMode, CompositionSpec, CompositionSpecError, StackPosition,
    DEFAULT_BGM_VOLUME,
};
pub use encoding::EncodingConfig;
pub use failure::{FailureDetail, FailureKind, Stage};
pub use font::{FontError, FontRegistry, FontStyle, ResolvedFont, DEFAULT_FONT_SIZE};
pub use frame::TargetFrame;
pub use job::{GenerationJob, GenerationState, GenerationStatus, JobId, JobTransitionError};
