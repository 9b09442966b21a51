//! Video generation backends.
//!
//! This crate provides:
//! - Request normalization per backend
//! - The `BackendAdapter` seam and its status event stream
//! - Replicate (synchronous run) and fal queue (queued subscribe) adapters

pub mod adapter;
pub mod config;
pub mod error;
pub mod fal;
mod http;
pub mod normalize;
pub mod replicate;

pub use adapter::{generate, run_to_terminal, BackendAdapter, GenerationEvent, GenerationEvents};
pub use config::ProviderConfig;
pub use error::{ProviderError, ProviderResult};
pub use fal::{FalQueueAdapter, FalQueueConfig};
pub use normalize::{normalize, DEFAULT_CFG_SCALE, DEFAULT_STEPS};
pub use replicate::{ReplicateAdapter, ReplicateConfig};
