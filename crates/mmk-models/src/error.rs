//! Caller-side input errors.

use thiserror::Error;

pub type InputResult<T> = Result<T, InputError>;

/// A request that cannot be sent to any backend as submitted.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InputError {
    #[error("Prompt is required")]
    MissingPrompt,

    #[error("Image is required for image-to-video generation")]
    MissingImage,

    #[error("Invalid image: {0}")]
    InvalidImage(String),
}

impl InputError {
    pub fn invalid_image(msg: impl Into<String>) -> Self {
        Self::InvalidImage(msg.into())
    }
}
