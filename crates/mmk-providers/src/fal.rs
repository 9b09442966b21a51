//! Queued-subscribe backend on fal's queue API.
//!
//! A submission returns status and response links. The status link is polled
//! with logs enabled until the job completes, then the response link holds the
//! job's output.

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

const DEFAULT_QUEUE_URL: &str = "https://queue.fal.run";
const DEFAULT_MODEL_ID: &str = "fal-ai/ltx-video-13b-distilled/image-to-video";
const DEFAULT_POLL_INTERVAL_MS: u64 = 1000;

/// Where the video URL sits in the job output.
const VIDEO_URL_POINTERS: [&str; 2] = ["/video/url", "/data/video/url"];

/// fal queue connection settings.
#[derive(Debug, Clone)]
pub struct FalQueueConfig {
    pub queue_url: String,
    pub api_key: String,
    pub model_id: String,
    /// Delay between status reads.
    pub poll_interval: Duration,
}

impl FalQueueConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            queue_url: DEFAULT_QUEUE_URL.to_string(),
            api_key: api_key.into(),
            model_id: DEFAULT_MODEL_ID.to_string(),
            poll_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
        }
    }

    /// Create config from environment variables.
    pub fn from_env() -> ProviderResult<Self> {
        let api_key =
            std::env::var("FAL_KEY").map_err(|_| ProviderError::config("FAL_KEY not set"))?;

        Ok(Self {
            queue_url: std::env::var("FAL_QUEUE_URL")
                .unwrap_or_else(|_| DEFAULT_QUEUE_URL.to_string()),
            api_key,
            model_id: std::env::var("FAL_MODEL_ID")
                .unwrap_or_else(|_| DEFAULT_MODEL_ID.to_string()),
            poll_interval: Duration::from_millis(
                std::env::var("FAL_POLL_INTERVAL_MS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(DEFAULT_POLL_INTERVAL_MS),
            ),
        })
    }
}

#[derive(Debug, Serialize)]
struct QueueSubmission<'a> {
    prompt: &'a str,
    image_url: &'a str,
    negative_prompt: &'a str,
    aspect_ratio: &'a str,
    num_frames: u32,
    frame_rate: u32,
}

#[derive(Debug, Clone, Deserialize)]
struct QueuedJob {
    request_id: String,
    status_url: String,
    response_url: String,
}

#[derive(Debug, Deserialize)]
struct LogLine {
    message: String,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "status", rename_all = "SCREAMING_SNAKE_CASE")]
enum QueueStatus {
    InQueue {
        #[serde(default)]
        queue_position: Option<u32>,
    },
    InProgress {
        #[serde(default)]
        logs: Option<Vec<LogLine>>,
    },
    Completed {
        #[serde(default)]
        logs: Option<Vec<LogLine>>,
        #[serde(default)]
        error: Option<String>,
    },
}

/// Where one subscription currently is.
enum Subscription {
    Submit(NormalizedBackendInput),
    Poll {
        job: QueuedJob,
        first: bool,
        logs_seen: usize,
    },
    Done,
}

/// Log lines past `seen`. The status endpoint repeats the full log each time.
fn fresh_logs(logs: Option<Vec<LogLine>>, seen: usize) -> Vec<String> {
    logs.unwrap_or_default()
        .into_iter()
        .skip(seen)
        .map(|line| line.message)
        .collect()
}

/// Runs generations through fal's request queue.
#[derive(Clone)]
pub struct FalQueueAdapter {
    client: Client,
    config: FalQueueConfig,
}

impl FalQueueAdapter {
    pub fn new(config: FalQueueConfig) -> Self {
        Self::with_client(Client::new(), config)
    }

    pub fn with_client(client: Client, config: FalQueueConfig) -> Self {
        Self { client, config }
    }

    fn submit_url(&self) -> String {
        format!(
            "{}/{}",
            self.config.queue_url.trim_end_matches('/'),
            self.config.model_id.trim_start_matches('/')
        )
    }

    fn key(&self) -> String {
        format!("Key {}", self.config.api_key)
    }

    async fn enqueue(&self, input: &NormalizedBackendInput) -> ProviderResult<QueuedJob> {
        if input.backend != BackendKind::QueuedSubscribe {
            return Err(ProviderError::InvalidInput(format!(
                "input normalized for {}",
                input.backend
            )));
        }
        let image_url = input
            .image_url()
            .ok_or_else(|| ProviderError::InvalidInput("image_url is required".into()))?;

        let body = QueueSubmission {
            prompt: &input.prompt,
            image_url,
            negative_prompt: &input.negative_prompt,
            aspect_ratio: &input.aspect_ratio,
            num_frames: input.frame_count,
            frame_rate: input.frame_rate.unwrap_or(24),
        };

        let response = self
            .client
            .post(self.submit_url())
            .header(AUTHORIZATION, self.key())
            .json(&body)
            .send()
            .await?;

        let job: QueuedJob = read_json(response).await?;
        info!(request_id = %job.request_id, model = %self.config.model_id, "Queued fal job");
        Ok(job)
    }

    async fn status(&self, job: &QueuedJob) -> ProviderResult<QueueStatus> {
        let response = self
            .client
            .get(&job.status_url)
            .query(&[("logs", "1")])
            .header(AUTHORIZATION, self.key())
            .send()
            .await?;

        read_json(response).await
    }

    async fn result(&self, job: &QueuedJob) -> ProviderResult<GeneratedVideo> {
        let response = self
            .client
            .get(&job.response_url)
            .header(AUTHORIZATION, self.key())
            .send()
            .await?;

        let output: serde_json::Value = read_json(response).await?;
        extract_video(&output)
    }

    /// Advance the subscription by one event.
    async fn step(&self, state: Subscription) -> Option<(GenerationEvent, Subscription)> {
        match state {
            Subscription::Submit(input) => match self.enqueue(&input).await {
                Ok(job) => Some((
                    GenerationEvent::Queued { position: None },
                    Subscription::Poll {
                        job,
                        first: true,
                        logs_seen: 0,
                    },
                )),
                Err(e) => Some((GenerationEvent::Failed(e), Subscription::Done)),
            },
            Subscription::Poll {
                job,
                first,
                logs_seen,
            } => {
                if !first {
                    tokio::time::sleep(self.config.poll_interval).await;
                }

                let status = match self.status(&job).await {
                    Ok(status) => status,
                    Err(e) => return Some((GenerationEvent::Failed(e), Subscription::Done)),
                };

                match status {
                    QueueStatus::InQueue { queue_position } => {
                        debug!(request_id = %job.request_id, ?queue_position, "fal job queued");
                        Some((
                            GenerationEvent::Queued {
                                position: queue_position,
                            },
                            Subscription::Poll {
                                job,
                                first: false,
                                logs_seen,
                            },
                        ))
                    }
                    QueueStatus::InProgress { logs } => {
                        let logs = fresh_logs(logs, logs_seen);
                        for line in &logs {
                            debug!(request_id = %job.request_id, "fal: {}", line);
                        }
                        let logs_seen = logs_seen + logs.len();
                        Some((
                            GenerationEvent::Progress { logs },
                            Subscription::Poll {
                                job,
                                first: false,
                                logs_seen,
                            },
                        ))
                    }
                    QueueStatus::Completed { logs, error } => {
                        for line in fresh_logs(logs, logs_seen) {
                            debug!(request_id = %job.request_id, "fal: {}", line);
                        }
                        let outcome = match error {
                            Some(reason) => Err(ProviderError::JobFailed(reason)),
                            None => self.result(&job).await,
                        };
                        if let Err(e) = &outcome {
                            warn!(request_id = %job.request_id, "fal job did not produce a video: {}", e);
                        }
                        Some((GenerationEvent::from(outcome), Subscription::Done))
                    }
                }
            }
            Subscription::Done => None,
        }
    }
}

fn extract_video(output: &serde_json::Value) -> ProviderResult<GeneratedVideo> {
    let raw = VIDEO_URL_POINTERS
        .iter()
        .find_map(|pointer| output.pointer(pointer).and_then(|v| v.as_str()))
        .ok_or_else(|| ProviderError::missing_output("video.url"))?;

    let url = Url::parse(raw)
        .map_err(|e| ProviderError::malformed(format!("video URL {raw:?}: {e}")))?;
    Ok(GeneratedVideo::new(url))
}

impl BackendAdapter for FalQueueAdapter {
    fn kind(&self) -> BackendKind {
        BackendKind::QueuedSubscribe
    }

    fn submit(&self, input: NormalizedBackendInput) -> GenerationEvents {
        let adapter = self.clone();
        stream::unfold(Subscription::Submit(input), move |state| {
            let adapter = adapter.clone();
            async move { adapter.step(state).await }
        })
        .boxed()
    }
}
