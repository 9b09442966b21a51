//! Axum HTTP API server.
//!
//! This crate provides:
//! - `POST /generate-video`: photo and prompt in, video URL out
//! - The generation orchestrator (validate, stage, generate)
//! - Health, readiness and Prometheus metrics endpoints

pub mod config;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod routes;
pub mod services;
pub mod state;

pub use config::ApiConfig;
pub use error::{ApiError, ApiResult};
pub use routes::create_router;
pub use services::{GenerationOrchestrator, OrchestrationError};
pub use state::AppState;
