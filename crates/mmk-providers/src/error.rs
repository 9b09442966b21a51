//! Provider error types.

use thiserror::Error;

pub type ProviderResult<T> = Result<T, ProviderError>;

/// Every way a generation backend can fail, independent of provider.
#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Provider rejected request ({status}): {body}")]
    Rejected { status: u16, body: String },

    #[error("Generation failed: {0}")]
    JobFailed(String),

    #[error("Response missing {0}")]
    MissingOutput(String),

    #[error("Malformed provider response: {0}")]
    Malformed(String),

    #[error("Invalid backend input: {0}")]
    InvalidInput(String),

    #[error("Provider not configured: {0}")]
    Config(String),
}

impl ProviderError {
    pub fn malformed(msg: impl Into<String>) -> Self {
        Self::Malformed(msg.into())
    }

    pub fn missing_output(field: impl Into<String>) -> Self {
        Self::MissingOutput(field.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Short label for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            ProviderError::Transport(_) => "transport",
            ProviderError::Rejected { .. } => "rejected",
            ProviderError::JobFailed(_) => "job_failed",
            ProviderError::MissingOutput(_) => "missing_output",
            ProviderError::Malformed(_) => "malformed",
            ProviderError::InvalidInput(_) => "invalid_input",
            ProviderError::Config(_) => "config",
        }
    }
}

impl From<reqwest::Error> for ProviderError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ProviderError::Malformed(err.to_string())
        } else {
            ProviderError::Transport(err.to_string())
        }
    }
}
