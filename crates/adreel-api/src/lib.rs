//! Axum HTTP API server.
//!
//! This crate provides:
//! - Synchronous composition endpoints (concat and vertical stack)
//! - Asynchronous image-to-video submission and status endpoints
//! - Structured `{success: false, stage?, kind, detail}` failures
//! - Health, readiness and Prometheus metrics

pub mod config;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod routes;
pub mod state;

pub use config::ApiConfig;
pub use error::{ApiError, ApiResult};
pub use routes::create_router;
pub use state::AppState;
