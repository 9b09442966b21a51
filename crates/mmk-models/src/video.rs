//! Backend-ready inputs and generation outputs.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::aspect::Resolution;
use crate::backend::BackendKind;

/// Where the backend should read the input image from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum ImageSource {
    /// Inline data URI (or caller URL) forwarded untouched.
    Inline(String),
    /// URL of an object uploaded for this request.
    Staged(Url),
}

impl ImageSource {
    pub fn as_str(&self) -> &str {
        match self {
            ImageSource::Inline(value) => value,
            ImageSource::Staged(url) => url.as_str(),
        }
    }
}

/// Parameters resolved for one specific backend.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NormalizedBackendInput {
    pub backend: BackendKind,
    pub prompt: String,
    pub negative_prompt: String,
    pub aspect_ratio: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolution: Option<Resolution>,
    pub frame_count: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frame_rate: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub steps: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cfg_scale: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<ImageSource>,
}

impl NormalizedBackendInput {
    /// Same input, pointing at an uploaded image.
    pub fn with_staged_image(self, staged: &StagedMedia) -> Self {
        Self {
            image: Some(ImageSource::Staged(staged.url.clone())),
            ..self
        }
    }

    pub fn image_url(&self) -> Option<&str> {
        self.image.as_ref().map(ImageSource::as_str)
    }
}

/// An uploaded image, owned by a single generation attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedMedia {
    pub url: Url,
}

impl StagedMedia {
    pub fn new(url: Url) -> Self {
        Self { url }
    }
}

/// The one success shape every backend returns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedVideo {
    pub video_url: Url,
}

impl GeneratedVideo {
    pub fn new(video_url: Url) -> Self {
        Self { video_url }
    }
}
