//! API error types.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;
use tracing::error;

use mmk_models::InputError;

use crate::services::OrchestrationError;

pub type ApiResult<T> = Result<T, ApiError>;

/// Body returned for every staging or generation failure.
pub const GENERATION_FAILED_MESSAGE: &str = "Failed to generate video";

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error(transparent)]
    Orchestration(#[from] OrchestrationError),
}

impl ApiError {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::BadRequest(msg.into())
    }

    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) | ApiError::Orchestration(OrchestrationError::Validation(_)) => {
                StatusCode::BAD_REQUEST
            }
            ApiError::Orchestration(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<InputError> for ApiError {
    fn from(err: InputError) -> Self {
        ApiError::Orchestration(OrchestrationError::Validation(err))
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        // Provider and storage detail stays in the logs
        let message = match &self {
            ApiError::BadRequest(msg) => msg.clone(),
            ApiError::Orchestration(OrchestrationError::Validation(e)) => e.to_string(),
            ApiError::Orchestration(e) => {
                error!(kind = e.kind(), "Video generation failed: {}", e);
                GENERATION_FAILED_MESSAGE.to_string()
            }
        };

        (status, Json(ErrorResponse { error: message })).into_response()
    }
}
