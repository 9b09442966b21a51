//! Generation requests and the images attached to them.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use url::Url;

use crate::error::{InputError, InputResult};

/// A user's request to animate a photo.
///
/// Built once at the HTTP boundary and only read afterwards; every
/// backend-specific shape is derived from it without mutation.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    prompt: String,
    image: Option<ImageInput>,
    aspect_ratio: Option<String>,
    video_length_frames: Option<u32>,
    steps: Option<u32>,
    cfg_scale: Option<f32>,
}

impl GenerationRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            image: None,
            aspect_ratio: None,
            video_length_frames: None,
            steps: None,
            cfg_scale: None,
        }
    }

    pub fn with_image(mut self, image: Option<ImageInput>) -> Self {
        self.image = image;
        self
    }

    pub fn with_aspect_ratio(mut self, aspect_ratio: Option<String>) -> Self {
        self.aspect_ratio = aspect_ratio;
        self
    }

    pub fn with_video_length(mut self, frames: Option<u32>) -> Self {
        self.video_length_frames = frames;
        self
    }

    pub fn with_steps(mut self, steps: Option<u32>) -> Self {
        self.steps = steps;
        self
    }

    pub fn with_cfg_scale(mut self, cfg_scale: Option<f32>) -> Self {
        self.cfg_scale = cfg_scale;
        self
    }

    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    /// Prompt with surrounding whitespace removed, or `None` if blank.
    pub fn trimmed_prompt(&self) -> Option<&str> {
        let prompt = self.prompt.trim();
        (!prompt.is_empty()).then_some(prompt)
    }

    pub fn image(&self) -> Option<&ImageInput> {
        self.image.as_ref()
    }

    pub fn aspect_ratio(&self) -> Option<&str> {
        self.aspect_ratio.as_deref()
    }

    pub fn video_length_frames(&self) -> Option<u32> {
        self.video_length_frames
    }

    pub fn steps(&self) -> Option<u32> {
        self.steps
    }

    pub fn cfg_scale(&self) -> Option<f32> {
        self.cfg_scale
    }
}

/// Image as received from the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageInput {
    /// `data:<mime>;base64,<payload>`
    DataUri(String),
    /// Already reachable by the provider; no upload needed.
    Url(Url),
}

impl ImageInput {
    /// Classify a raw image string. Does not decode the payload.
    pub fn parse(raw: &str) -> InputResult<Self> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(InputError::MissingImage);
        }

        if raw.starts_with("data:") {
            split_data_uri(raw)?;
            return Ok(ImageInput::DataUri(raw.to_string()));
        }

        match Url::parse(raw) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => Ok(ImageInput::Url(url)),
            _ => Err(InputError::invalid_image(
                "expected a base64 data URI or an http(s) URL",
            )),
        }
    }

    /// Decode the inline bytes. `Ok(None)` for URL images.
    pub fn decode(&self) -> InputResult<Option<ImagePayload>> {
        match self {
            ImageInput::Url(_) => Ok(None),
            ImageInput::DataUri(uri) => {
                let (content_type, encoded) = split_data_uri(uri)?;
                let bytes = STANDARD
                    .decode(encoded)
                    .map_err(|e| InputError::invalid_image(format!("bad base64 payload: {}", e)))?;
                if bytes.is_empty() {
                    return Err(InputError::invalid_image("image payload is empty"));
                }
                Ok(Some(ImagePayload {
                    bytes,
                    content_type: content_type.to_string(),
                }))
            }
        }
    }

    /// String form forwarded to backends that accept inline images.
    pub fn as_wire_str(&self) -> &str {
        match self {
            ImageInput::DataUri(uri) => uri,
            ImageInput::Url(url) => url.as_str(),
        }
    }
}

/// Split `data:<mime>;base64,<payload>` into mime and payload.
fn split_data_uri(uri: &str) -> InputResult<(&str, &str)> {
    let rest = uri
        .strip_prefix("data:")
        .ok_or_else(|| InputError::invalid_image("missing data: prefix"))?;
    let (header, payload) = rest
        .split_once(',')
        .ok_or_else(|| InputError::invalid_image("data URI has no payload"))?;
    let content_type = header
        .strip_suffix(";base64")
        .ok_or_else(|| InputError::invalid_image("data URI must be base64 encoded"))?;

    if !content_type.starts_with("image/") {
        return Err(InputError::invalid_image(format!(
            "unsupported content type '{}'",
            content_type
        )));
    }
    if payload.is_empty() {
        return Err(InputError::invalid_image("image payload is empty"));
    }

    Ok((content_type, payload))
}

/// Decoded image bytes ready for upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImagePayload {
    pub bytes: Vec<u8>,
    pub content_type: String,
}

impl ImagePayload {
    pub fn new(bytes: Vec<u8>, content_type: impl Into<String>) -> Self {
        Self {
            bytes,
            content_type: content_type.into(),
        }
    }

    /// File extension matching the content type.
    pub fn extension(&self) -> &'static str {
        match self.content_type.as_str() {
            "image/png" => "png",
            "image/jpeg" | "image/jpg" => "jpg",
            "image/webp" => "webp",
            "image/gif" => "gif",
            "image/heic" => "heic",
            _ => "bin",
        }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // 1x1 transparent PNG
    const PNG_B64: &str =
        "iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAYAAAAfFcSJAAAADUlEQVR42mNkYPhfDwAChwGA60e6kgAAAABJRU5ErkJggg==";

    #[test]
    fn test_parse_data_uri() {
        let raw = format!("data:image/png;base64,{}", PNG_B64);
        let image = ImageInput::parse(&raw).unwrap();
        assert!(matches!(image, ImageInput::DataUri(_)));

        let payload = image.decode().unwrap().unwrap();
        assert_eq!(payload.content_type, "image/png");
        assert_eq!(payload.extension(), "png");
        assert_eq!(&payload.bytes[1..4], b"PNG");
    }

    #[test]
    fn test_parse_url() {
        let image = ImageInput::parse("https://example.com/cat.jpg").unwrap();
        assert!(matches!(image, ImageInput::Url(_)));
        assert_eq!(image.decode().unwrap(), None);
        assert_eq!(image.as_wire_str(), "https://example.com/cat.jpg");
    }

    #[test]
    fn test_rejects_malformed_images() {
        assert_eq!(ImageInput::parse("  "), Err(InputError::MissingImage));
        assert!(ImageInput::parse("data:image/png,abc").is_err());
        assert!(ImageInput::parse("data:text/plain;base64,aGk=").is_err());
        assert!(ImageInput::parse("data:image/png;base64,").is_err());
        assert!(ImageInput::parse("ftp://example.com/a.png").is_err());
        assert!(ImageInput::parse("not an image").is_err());
    }

    #[test]
    fn test_bad_base64_fails_on_decode() {
        let image = ImageInput::parse("data:image/png;base64,%%%").unwrap();
        assert!(matches!(image.decode(), Err(InputError::InvalidImage(_))));
    }

    #[test]
    fn test_trimmed_prompt() {
        assert_eq!(GenerationRequest::new("  a cat runs ").trimmed_prompt(), Some("a cat runs"));
        assert_eq!(GenerationRequest::new(" \n\t").trimmed_prompt(), None);
        assert_eq!(GenerationRequest::new("").trimmed_prompt(), None);
    }
}
