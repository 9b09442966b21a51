//! Image staging for providers that read inputs by URL.
//!
//! This crate provides:
//! - The `MediaStager` seam used by the orchestrator
//! - Uploads to fal's managed storage
//! - Uploads to Cloudflare R2 with presigned read URLs

pub mod config;
pub mod error;
pub mod fal;
pub mod r2;
pub mod stager;

pub use config::StagingBackend;
pub use error::{StorageError, StorageResult};
pub use fal::{FalStorageConfig, FalStorageStager};
pub use r2::{R2Config, R2Stager};
pub use stager::MediaStager;
