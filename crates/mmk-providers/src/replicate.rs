//! Synchronous-run backend on Replicate's predictions API.
//!
//! The prediction is created with `Prefer: wait`, so most runs come back
//! finished from the first call. When the provider's wait window elapses
//! first, the same prediction is followed through its `urls.get` link.

use std::time::Duration;

use futures_util::{stream, StreamExt};
use reqwest::header::AUTHORIZATION;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use url::Url;

use mmk_models::{BackendKind, GeneratedVideo, NormalizedBackendInput};

use crate::adapter::{BackendAdapter, GenerationEvent, GenerationEvents};
use crate::error::{ProviderError, ProviderResult};
use crate::http::read_json;
use crate::normalize::{DEFAULT_CFG_SCALE, DEFAULT_STEPS};

const DEFAULT_BASE_URL: &str = "https://api.replicate.com";
const DEFAULT_MODEL_VERSION: &str =
    "8c47da666861d081eeb4d1261853087de23923a268a69b63febdf5dc1dee08e4";
const DEFAULT_POLL_INTERVAL_MS: u64 = 1000;

/// Checkpoint name the model version expects.
const MODEL_CHECKPOINT: &str = "0.9.1";
const TARGET_SIZE: u32 = 640;

/// Replicate connection settings.
#[derive(Debug, Clone)]
pub struct ReplicateConfig {
    pub base_url: String,
    pub api_token: String,
    pub model_version: String,
    /// Delay between follow-up status reads.
    pub poll_interval: Duration,
}

impl ReplicateConfig {
    pub fn new(api_token: impl Into<String>) -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_token: api_token.into(),
            model_version: DEFAULT_MODEL_VERSION.to_string(),
            poll_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
        }
    }

    /// Create config from environment variables.
    pub fn from_env() -> ProviderResult<Self> {
        let api_token = std::env::var("REPLICATE_API_TOKEN")
            .map_err(|_| ProviderError::config("REPLICATE_API_TOKEN not set"))?;

        Ok(Self {
            base_url: std::env::var("REPLICATE_BASE_URL")
                .unwrap_or_else(|_| DEFAULT_BASE_URL.to_string()),
            api_token,
            model_version: std::env::var("REPLICATE_MODEL_VERSION")
                .unwrap_or_else(|_| DEFAULT_MODEL_VERSION.to_string()),
            poll_interval: Duration::from_millis(
                std::env::var("REPLICATE_POLL_INTERVAL_MS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(DEFAULT_POLL_INTERVAL_MS),
            ),
        })
    }
}

#[derive(Debug, Serialize)]
struct CreatePrediction<'a> {
    version: &'a str,
    input: PredictionInput<'a>,
}

#[derive(Debug, Serialize)]
struct PredictionInput<'a> {
    prompt: &'a str,
    negative_prompt: &'a str,
    aspect_ratio: &'a str,
    video_length: u32,
    steps: u32,
    cfg: f32,
    model: &'static str,
    target_size: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    image: Option<&'a str>,
}

impl<'a> PredictionInput<'a> {
    fn from_input(input: &'a NormalizedBackendInput) -> Self {
        Self {
            prompt: &input.prompt,
            negative_prompt: &input.negative_prompt,
            aspect_ratio: &input.aspect_ratio,
            video_length: input.frame_count,
            steps: input.steps.unwrap_or(DEFAULT_STEPS),
            cfg: input.cfg_scale.unwrap_or(DEFAULT_CFG_SCALE),
            model: MODEL_CHECKPOINT,
            target_size: TARGET_SIZE,
            image: input.image_url(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
enum PredictionStatus {
    Starting,
    Processing,
    Succeeded,
    Failed,
    Canceled,
    #[serde(other)]
    Unknown,
}

impl PredictionStatus {
    fn is_terminal(self) -> bool {
        !matches!(self, PredictionStatus::Starting | PredictionStatus::Processing)
    }
}

#[derive(Debug, Deserialize)]
struct PredictionUrls {
    get: String,
}

#[derive(Debug, Deserialize)]
struct Prediction {
    id: String,
    status: PredictionStatus,
    #[serde(default)]
    output: Option<ModelOutput>,
    #[serde(default)]
    error: Option<serde_json::Value>,
    #[serde(default)]
    urls: Option<PredictionUrls>,
}

/// Model output: one handle or a list of them.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ModelOutput {
    Many(Vec<OutputHandle>),
    One(OutputHandle),
}

/// A file reference, either a bare URL or an object carrying one.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum OutputHandle {
    Uri(String),
    File { url: String },
}

impl OutputHandle {
    fn url(&self) -> ProviderResult<Url> {
        let raw = match self {
            OutputHandle::Uri(raw) => raw,
            OutputHandle::File { url } => url,
        };
        Url::parse(raw).map_err(|e| ProviderError::malformed(format!("output URL {raw:?}: {e}")))
    }
}

impl Prediction {
    fn into_video(self) -> ProviderResult<GeneratedVideo> {
        match self.status {
            PredictionStatus::Succeeded => {}
            PredictionStatus::Failed | PredictionStatus::Canceled => {
                let reason = match self.error {
                    Some(serde_json::Value::String(msg)) => msg,
                    Some(serde_json::Value::Null) | None => format!("prediction {:?}", self.status),
                    Some(other) => other.to_string(),
                };
                return Err(ProviderError::JobFailed(reason));
            }
            status => {
                return Err(ProviderError::malformed(format!(
                    "unexpected prediction status {status:?}"
                )))
            }
        }

        let first = match self.output {
            Some(ModelOutput::One(handle)) => Some(handle),
            Some(ModelOutput::Many(handles)) => handles.into_iter().next(),
            None => None,
        };

        let handle = first.ok_or_else(|| ProviderError::missing_output("output"))?;
        Ok(GeneratedVideo::new(handle.url()?))
    }
}

/// Runs generations as Replicate predictions.
#[derive(Clone)]
pub struct ReplicateAdapter {
    client: Client,
    config: ReplicateConfig,
}

impl ReplicateAdapter {
    pub fn new(config: ReplicateConfig) -> Self {
        Self::with_client(Client::new(), config)
    }

    pub fn with_client(client: Client, config: ReplicateConfig) -> Self {
        Self { client, config }
    }

    fn predictions_url(&self) -> String {
        format!("{}/v1/predictions", self.config.base_url.trim_end_matches('/'))
    }

    fn bearer(&self) -> String {
        format!("Bearer {}", self.config.api_token)
    }

    async fn create(&self, input: &NormalizedBackendInput) -> ProviderResult<Prediction> {
        let body = CreatePrediction {
            version: &self.config.model_version,
            input: PredictionInput::from_input(input),
        };

        let response = self
            .client
            .post(self.predictions_url())
            .header(AUTHORIZATION, self.bearer())
            .header("Prefer", "wait")
            .json(&body)
            .send()
            .await?;

        read_json(response).await
    }

    async fn fetch(&self, get_url: &str) -> ProviderResult<Prediction> {
        let response = self
            .client
            .get(get_url)
            .header(AUTHORIZATION, self.bearer())
            .send()
            .await?;

        read_json(response).await
    }

    async fn run(&self, input: NormalizedBackendInput) -> ProviderResult<GeneratedVideo> {
        if input.backend != BackendKind::SynchronousRun {
            return Err(ProviderError::InvalidInput(format!(
                "input normalized for {}",
                input.backend
            )));
        }

        let mut prediction = self.create(&input).await?;
        info!(prediction_id = %prediction.id, status = ?prediction.status, "Prediction created");

        while !prediction.status.is_terminal() {
            let get_url = prediction
                .urls
                .as_ref()
                .map(|urls| urls.get.clone())
                .ok_or_else(|| ProviderError::malformed("running prediction has no status link"))?;

            tokio::time::sleep(self.config.poll_interval).await;
            prediction = self.fetch(&get_url).await?;
            debug!(prediction_id = %prediction.id, status = ?prediction.status, "Prediction polled");
        }

        let id = prediction.id.clone();
        let result = prediction.into_video();
        if let Err(e) = &result {
            warn!(prediction_id = %id, "Prediction did not produce a video: {}", e);
        }
        result
    }
}

impl BackendAdapter for ReplicateAdapter {
    fn kind(&self) -> BackendKind {
        BackendKind::SynchronousRun
    }

    fn submit(&self, input: NormalizedBackendInput) -> GenerationEvents {
        let adapter = self.clone();
        stream::once(async move { GenerationEvent::from(adapter.run(input).await) }).boxed()
    }
}
