//! Business logic services.

pub mod orchestrator;

pub use orchestrator::{GenerationOrchestrator, GenerationPhase, OrchestrationError};
