//! Shared data models for the Memory Maker backend.
//!
//! This crate provides:
//! - Generation requests and image inputs
//! - Aspect ratios and the fixed resolution table
//! - Backend identities with their per-provider constants
//! - Normalized backend inputs and the `{videoUrl}` result shape

pub mod aspect;
pub mod backend;
pub mod error;
pub mod request;
pub mod video;

pub use aspect::{AspectRatio, Resolution};
pub use backend::{frames_to_display_seconds, AspectMode, BackendKind, BackendParseError};
pub use error::{InputError, InputResult};
pub use request::{GenerationRequest, ImageInput, ImagePayload};
pub use video::{GeneratedVideo, ImageSource, NormalizedBackendInput, StagedMedia};
