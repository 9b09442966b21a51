//! End-to-end handling of one generation request.
//!
//! Each request moves through
//! `Received -> Validated -> (Staging) -> Generating -> Succeeded | Failed`.
//! Nothing is shared between requests: two identical requests stage and
//! submit independently.

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

use mmk_models::{BackendKind, GeneratedVideo, GenerationRequest, ImagePayload, InputError, InputResult};
use mmk_providers::{normalize, run_to_terminal, BackendAdapter, GenerationEvent, ProviderError};
use mmk_storage::{MediaStager, StorageError};

use crate::metrics;

/// Why a request did not produce a video.
#[derive(Debug, Error)]
pub enum OrchestrationError {
    /// The caller's input is unusable. Raised before any external call.
    #[error("{0}")]
    Validation(#[from] InputError),

    #[error("Image staging failed: {0}")]
    Staging(#[from] StorageError),

    #[error("Generation failed: {0}")]
    Generation(#[from] ProviderError),
}

impl OrchestrationError {
    pub fn kind(&self) -> &'static str {
        match self {
            OrchestrationError::Validation(_) => "validation",
            OrchestrationError::Staging(_) => "staging",
            OrchestrationError::Generation(_) => "generation",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenerationPhase {
    Received,
    Validated,
    Staging,
    Generating,
    Succeeded,
    Failed,
}

impl GenerationPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            GenerationPhase::Received => "received",
            GenerationPhase::Validated => "validated",
            GenerationPhase::Staging => "staging",
            GenerationPhase::Generating => "generating",
            GenerationPhase::Succeeded => "succeeded",
            GenerationPhase::Failed => "failed",
        }
    }
}

impl fmt::Display for GenerationPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Phase tracking for one request.
struct GenerationRun {
    id: Uuid,
    backend: BackendKind,
    phase: GenerationPhase,
    history: Vec<GenerationPhase>,
}

impl GenerationRun {
    fn start(backend: BackendKind) -> Self {
        let id = Uuid::new_v4();
        info!(run_id = %id, backend = %backend, "Generation received");
        Self {
            id,
            backend,
            phase: GenerationPhase::Received,
            history: vec![GenerationPhase::Received],
        }
    }

    fn enter(&mut self, next: GenerationPhase) {
        debug!(run_id = %self.id, from = %self.phase, to = %next, "Generation phase change");
        self.phase = next;
        self.history.push(next);
    }
}

/// Check everything that can be checked without calling out.
///
/// Returns the decoded image when the request carries inline bytes.
fn validate(request: &GenerationRequest, backend: BackendKind) -> InputResult<Option<ImagePayload>> {
    request.trimmed_prompt().ok_or(InputError::MissingPrompt)?;

    match request.image() {
        Some(image) => image.decode(),
        None if backend.requires_image() => Err(InputError::MissingImage),
        None => Ok(None),
    }
}

/// Coordinates validation, staging and one backend call per request.
pub struct GenerationOrchestrator {
    adapter: Arc<dyn BackendAdapter>,
    stager: Option<Arc<dyn MediaStager>>,
}

impl GenerationOrchestrator {
    pub fn new(adapter: Arc<dyn BackendAdapter>, stager: Option<Arc<dyn MediaStager>>) -> Self {
        Self { adapter, stager }
    }

    pub fn backend(&self) -> BackendKind {
        self.adapter.kind()
    }

    pub fn stager_name(&self) -> Option<&'static str> {
        self.stager.as_ref().map(|s| s.name())
    }

    /// Run one request to a terminal outcome.
    pub async fn handle(&self, request: GenerationRequest) -> Result<GeneratedVideo, OrchestrationError> {
        self.handle_traced(request).await.0
    }

    /// Same as [`Self::handle`], also returning the phases visited.
    pub(crate) async fn handle_traced(
        &self,
        request: GenerationRequest,
    ) -> (Result<GeneratedVideo, OrchestrationError>, Vec<GenerationPhase>) {
        let started = Instant::now();
        let mut run = GenerationRun::start(self.adapter.kind());

        let result = self.drive(&request, &mut run).await;

        let outcome = match &result {
            Ok(video) => {
                run.enter(GenerationPhase::Succeeded);
                info!(run_id = %run.id, video_url = %video.video_url, "Generation succeeded");
                "succeeded"
            }
            Err(e) => {
                run.enter(GenerationPhase::Failed);
                warn!(run_id = %run.id, kind = e.kind(), "Generation failed: {}", e);
                e.kind()
            }
        };
        metrics::record_generation(run.backend.as_str(), outcome, started.elapsed().as_secs_f64());

        (result, run.history)
    }

    async fn drive(
        &self,
        request: &GenerationRequest,
        run: &mut GenerationRun,
    ) -> Result<GeneratedVideo, OrchestrationError> {
        let backend = run.backend;
        let payload = validate(request, backend)?;
        let mut input = normalize(request, backend)?;
        run.enter(GenerationPhase::Validated);

        if let Some(image) = payload.filter(|_| backend.requires_staging()) {
            run.enter(GenerationPhase::Staging);
            let stager = self
                .stager
                .as_ref()
                .ok_or_else(|| StorageError::config_error("no media stager configured"))?;

            let started = Instant::now();
            let staged = stager.stage(&image).await?;
            metrics::record_staging_duration(stager.name(), started.elapsed().as_secs_f64());
            debug!(run_id = %run.id, url = %staged.url, bytes = image.len(), "Image staged");

            input = input.with_staged_image(&staged);
        }

        run.enter(GenerationPhase::Generating);
        let run_id = run.id;
        let events = self.adapter.submit(input);
        let video = run_to_terminal(events, |event| {
            metrics::record_status_event(backend.as_str(), event.label());
            match event {
                GenerationEvent::Queued { position } => {
                    debug!(run_id = %run_id, ?position, "Generation queued");
                }
                GenerationEvent::Progress { logs } => {
                    for line in logs {
                        debug!(run_id = %run_id, "{}", line);
                    }
                }
                _ => {}
            }
        })
        .await?;

        Ok(video)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use futures_util::{stream, StreamExt};
    use mmk_models::{ImageInput, NormalizedBackendInput, StagedMedia};
    use mmk_providers::GenerationEvents;
    use mmk_storage::StorageResult;
    use mockall::mock;
    use url::Url;

    mock! {
        pub Adapter {}

        impl BackendAdapter for Adapter {
            fn kind(&self) -> BackendKind;
            fn submit(&self, input: NormalizedBackendInput) -> GenerationEvents;
        }
    }

    mock! {
        pub Stager {}

        #[async_trait]
        impl MediaStager for Stager {
            fn name(&self) -> &'static str;
            async fn stage(&self, image: &ImagePayload) -> StorageResult<StagedMedia>;
        }
    }

    const PNG_DATA_URI: &str = "data:image/png;base64,iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAYAAAAfFcSJAAAADUlEQVR42mNkYPhfDwAChwGA60e6kgAAAABJRU5ErkJggg==";

    fn url(raw: &str) -> Url {
        Url::parse(raw).unwrap()
    }

    fn adapter(kind: BackendKind) -> MockAdapter {
        let mut adapter = MockAdapter::new();
        adapter.expect_kind().return_const(kind);
        adapter
    }

    fn stager() -> MockStager {
        let mut stager = MockStager::new();
        stager.expect_name().return_const("mock");
        stager
    }

    fn orchestrator(adapter: MockAdapter, stager: MockStager) -> GenerationOrchestrator {
        GenerationOrchestrator::new(Arc::new(adapter), Some(Arc::new(stager)))
    }

    fn with_image(prompt: &str) -> GenerationRequest {
        GenerationRequest::new(prompt).with_image(Some(ImageInput::parse(PNG_DATA_URI).unwrap()))
    }

    #[tokio::test]
    async fn test_missing_prompt_makes_no_external_calls() {
        for backend in [BackendKind::SynchronousRun, BackendKind::QueuedSubscribe] {
            let mut adapter = adapter(backend);
            adapter.expect_submit().never();
            let mut stager = stager();
            stager.expect_stage().never();

            let (result, phases) = orchestrator(adapter, stager)
                .handle_traced(with_image("   "))
                .await;

            assert!(matches!(
                result,
                Err(OrchestrationError::Validation(InputError::MissingPrompt))
            ));
            assert_eq!(phases, vec![GenerationPhase::Received, GenerationPhase::Failed]);
        }
    }

    #[tokio::test]
    async fn test_image_required_backend_without_image() {
        let mut adapter = adapter(BackendKind::QueuedSubscribe);
        adapter.expect_submit().never();
        let mut stager = stager();
        stager.expect_stage().never();

        let result = orchestrator(adapter, stager)
            .handle(GenerationRequest::new("waves"))
            .await;

        assert!(matches!(
            result,
            Err(OrchestrationError::Validation(InputError::MissingImage))
        ));
    }

    #[tokio::test]
    async fn test_undecodable_image_is_a_validation_error() {
        let mut adapter = adapter(BackendKind::SynchronousRun);
        adapter.expect_submit().never();

        let request = GenerationRequest::new("a cat")
            .with_image(Some(ImageInput::parse("data:image/png;base64,@@@@").unwrap()));
        let result = orchestrator(adapter, stager()).handle(request).await;

        assert!(matches!(
            result,
            Err(OrchestrationError::Validation(InputError::InvalidImage(_)))
        ));
    }

    #[tokio::test]
    async fn test_queued_round_trip_with_staging() {
        let mut stager = stager();
        stager
            .expect_stage()
            .times(1)
            .withf(|image| image.content_type == "image/png")
            .returning(|_| Ok(StagedMedia::new(url("https://storage.example/img.png"))));

        let mut adapter = adapter(BackendKind::QueuedSubscribe);
        adapter
            .expect_submit()
            .times(1)
            .withf(|input| input.image_url() == Some("https://storage.example/img.png"))
            .returning(|_| {
                stream::iter(vec![
                    GenerationEvent::Progress { logs: vec!["step 1".into()] },
                    GenerationEvent::Progress { logs: vec!["step 2".into()] },
                    GenerationEvent::Succeeded(GeneratedVideo::new(url("https://cdn.example/out.mp4"))),
                ])
                .boxed()
            });

        let (result, phases) = orchestrator(adapter, stager)
            .handle_traced(with_image("waves roll in"))
            .await;

        assert_eq!(
            result.unwrap(),
            GeneratedVideo::new(url("https://cdn.example/out.mp4"))
        );
        assert_eq!(
            phases,
            vec![
                GenerationPhase::Received,
                GenerationPhase::Validated,
                GenerationPhase::Staging,
                GenerationPhase::Generating,
                GenerationPhase::Succeeded,
            ]
        );
    }

    #[tokio::test]
    async fn test_synchronous_run_sends_image_inline() {
        let mut stager = stager();
        stager.expect_stage().never();

        let mut adapter = adapter(BackendKind::SynchronousRun);
        adapter
            .expect_submit()
            .times(1)
            .withf(|input| input.image_url() == Some(PNG_DATA_URI) && input.frame_count == 97)
            .returning(|_| {
                stream::iter(vec![GenerationEvent::Succeeded(GeneratedVideo::new(url(
                    "https://cdn.example/video.mp4",
                )))])
                .boxed()
            });

        let (result, phases) = orchestrator(adapter, stager)
            .handle_traced(with_image("a cat runs"))
            .await;

        assert!(result.is_ok());
        assert!(!phases.contains(&GenerationPhase::Staging));
    }

    #[tokio::test]
    async fn test_url_image_skips_staging() {
        let mut stager = stager();
        stager.expect_stage().never();

        let mut adapter = adapter(BackendKind::QueuedSubscribe);
        adapter
            .expect_submit()
            .times(1)
            .withf(|input| input.image_url() == Some("https://example.com/cat.jpg"))
            .returning(|_| {
                stream::iter(vec![GenerationEvent::Succeeded(GeneratedVideo::new(url(
                    "https://cdn.example/out.mp4",
                )))])
                .boxed()
            });

        let request = GenerationRequest::new("a cat")
            .with_image(Some(ImageInput::parse("https://example.com/cat.jpg").unwrap()));
        assert!(orchestrator(adapter, stager).handle(request).await.is_ok());
    }

    #[tokio::test]
    async fn test_staging_failure_stops_before_generation() {
        let mut stager = stager();
        stager
            .expect_stage()
            .times(1)
            .returning(|_| Err(StorageError::upload_failed("bucket unavailable")));

        let mut adapter = adapter(BackendKind::QueuedSubscribe);
        adapter.expect_submit().never();

        let (result, phases) = orchestrator(adapter, stager)
            .handle_traced(with_image("waves"))
            .await;

        assert!(matches!(result, Err(OrchestrationError::Staging(_))));
        assert_eq!(phases.last(), Some(&GenerationPhase::Failed));
        assert!(!phases.contains(&GenerationPhase::Generating));
    }

    #[tokio::test]
    async fn test_backend_failure_is_not_retried() {
        let mut adapter = adapter(BackendKind::SynchronousRun);
        adapter.expect_submit().times(1).returning(|_| {
            stream::iter(vec![GenerationEvent::Failed(ProviderError::Transport(
                "connection reset".into(),
            ))])
            .boxed()
        });

        let result = orchestrator(adapter, stager())
            .handle(GenerationRequest::new("a cat runs"))
            .await;

        assert!(matches!(
            result,
            Err(OrchestrationError::Generation(ProviderError::Transport(_)))
        ));
    }

    #[tokio::test]
    async fn test_success_without_video_url_is_a_generation_error() {
        let mut adapter = adapter(BackendKind::SynchronousRun);
        adapter.expect_submit().times(1).returning(|_| {
            stream::iter(vec![GenerationEvent::Failed(ProviderError::missing_output(
                "output",
            ))])
            .boxed()
        });

        let (result, phases) = orchestrator(adapter, stager())
            .handle_traced(GenerationRequest::new("a cat runs"))
            .await;

        assert!(matches!(
            result,
            Err(OrchestrationError::Generation(ProviderError::MissingOutput(_)))
        ));
        assert_eq!(phases.last(), Some(&GenerationPhase::Failed));
    }

    #[tokio::test]
    async fn test_missing_stager_is_a_staging_error() {
        let mut adapter = adapter(BackendKind::QueuedSubscribe);
        adapter.expect_submit().never();

        let result = GenerationOrchestrator::new(Arc::new(adapter), None)
            .handle(with_image("waves"))
            .await;

        assert!(matches!(result, Err(OrchestrationError::Staging(_))));
    }
}
