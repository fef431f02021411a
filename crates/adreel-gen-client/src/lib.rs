//! Clients for the remote generation services.
//!
//! This crate provides:
//! - The [`GenerationService`] trait the job engine polls through
//! - [`MinimaxClient`], its HTTP implementation
//! - Wire types and the closed [`RemoteStatus`] classification
//! - [`SegmindClient`], a text-to-image client for source stills

pub mod client;
pub mod error;
pub mod service;
pub mod still;
pub mod types;

pub use client::{GenClientConfig, MinimaxClient};
pub use error::{GenError, GenResult};
pub use service::{image_data_url, GenerationService};
pub use still::{
    GeneratedStill, SegmindClient, StillClientConfig, StillGenerationService, StillModel,
};
pub use types::{PollResult, RemoteStatus, DEFAULT_PROMPT, GENERATION_MODEL};
