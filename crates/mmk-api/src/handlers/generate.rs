//! Video generation handler.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;
use serde::Deserialize;
use tracing::warn;

use mmk_models::{GeneratedVideo, GenerationRequest, ImageInput, InputError, InputResult};

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// Request body for `POST /generate-video`.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateVideoBody {
    #[serde(default)]
    pub prompt: Option<String>,
    /// Data URI or http(s) URL
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub aspect_ratio: Option<String>,
    /// Frame count
    #[serde(default)]
    pub video_length: Option<u32>,
    #[serde(default)]
    pub steps: Option<u32>,
    #[serde(default)]
    pub cfg_scale: Option<f32>,
}

impl GenerateVideoBody {
    /// Build the domain request. A blank `image` counts as absent.
    pub fn into_request(self) -> InputResult<GenerationRequest> {
        let prompt = self.prompt.unwrap_or_default();
        if prompt.trim().is_empty() {
            return Err(InputError::MissingPrompt);
        }

        let image = self
            .image
            .as_deref()
            .map(str::trim)
            .filter(|raw| !raw.is_empty())
            .map(ImageInput::parse)
            .transpose()?;

        Ok(GenerationRequest::new(prompt)
            .with_image(image)
            .with_aspect_ratio(self.aspect_ratio)
            .with_video_length(self.video_length)
            .with_steps(self.steps)
            .with_cfg_scale(self.cfg_scale))
    }
}

/// Generate a video from a prompt and an optional photo.
pub async fn generate_video(
    State(state): State<AppState>,
    payload: Result<Json<GenerateVideoBody>, JsonRejection>,
) -> ApiResult<Json<GeneratedVideo>> {
    let Json(body) = payload.map_err(|rejection| {
        warn!("Rejected generate-video body: {}", rejection.body_text());
        ApiError::bad_request(rejection.body_text())
    })?;

    let request = body.into_request()?;
    let video = state.orchestrator.handle(request).await?;

    Ok(Json(video))
}
