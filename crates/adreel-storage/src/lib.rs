//! S3 storage client for AdReel.
//!
//! This crate provides:
//! - Streaming downloads of input assets into a local workspace
//! - Uploads of finished artifacts with time-based keys and presigned URLs
//! - The [`ObjectTransfer`] seam with S3 and local filesystem backends

pub mod client;
pub mod error;
pub mod keys;
pub mod remote_ref;
pub mod transfer;

pub use client::{S3Client, S3Config, DEFAULT_PRESIGN_EXPIRY};
pub use error::{StorageError, StorageResult};
pub use keys::{content_type_for, upload_key};
pub use remote_ref::RemoteRef;
pub use transfer::{LocalTransfer, ObjectTransfer};
