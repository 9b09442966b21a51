//! Turns a user request into one backend's native parameters.
//!
//! Pure: no I/O and no hidden state, so the same request and backend always
//! produce the same input.

use mmk_models::{
    AspectMode, AspectRatio, BackendKind, GenerationRequest, ImageInput, ImageSource, InputError,
    InputResult, NormalizedBackendInput,
};

/// Sampling steps for backends that accept tuning.
pub const DEFAULT_STEPS: u32 = 30;

/// Guidance scale for backends that accept tuning.
pub const DEFAULT_CFG_SCALE: f32 = 15.0;

/// Resolve `request` for `backend`.
pub fn normalize(
    request: &GenerationRequest,
    backend: BackendKind,
) -> InputResult<NormalizedBackendInput> {
    let prompt = request.trimmed_prompt().ok_or(InputError::MissingPrompt)?;

    let (aspect_ratio, resolution) = match backend.aspect_mode() {
        AspectMode::PassThrough => {
            let ratio = request
                .aspect_ratio()
                .map(str::trim)
                .filter(|r| !r.is_empty())
                .unwrap_or(AspectRatio::default().as_str());
            (ratio.to_string(), None)
        }
        AspectMode::Resolution => {
            let resolution = AspectRatio::from_lenient(request.aspect_ratio()).resolution();
            (resolution.aspect_ratio().as_str().to_string(), Some(resolution))
        }
    };

    // Zero means "unset" on the wire, same as an absent field.
    let requested_frames = request
        .video_length_frames()
        .filter(|frames| *frames > 0)
        .unwrap_or_else(|| backend.default_frames());

    let (steps, cfg_scale) = if backend.supports_tuning() {
        (
            Some(request.steps().filter(|s| *s > 0).unwrap_or(DEFAULT_STEPS)),
            Some(
                request
                    .cfg_scale()
                    .filter(|c| c.is_finite() && *c > 0.0)
                    .unwrap_or(DEFAULT_CFG_SCALE),
            ),
        )
    } else {
        (None, None)
    };

    // Inline uploads for staging backends are attached after staging.
    let image = match request.image() {
        Some(ImageInput::DataUri(_)) if backend.requires_staging() => None,
        Some(image) => Some(ImageSource::Inline(image.as_wire_str().to_string())),
        None => None,
    };

    Ok(NormalizedBackendInput {
        backend,
        prompt: prompt.to_string(),
        negative_prompt: backend.negative_prompt().to_string(),
        aspect_ratio,
        resolution,
        frame_count: backend.clamp_frames(requested_frames),
        frame_rate: backend.frame_rate(),
        steps,
        cfg_scale,
        image,
    })
}
