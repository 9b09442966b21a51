//! The backend adapter seam and its status event stream.

use futures_util::stream::BoxStream;
use futures_util::StreamExt;

use mmk_models::{BackendKind, GeneratedVideo, NormalizedBackendInput};

use crate::error::{ProviderError, ProviderResult};

/// A status update from a running generation.
#[derive(Debug)]
pub enum GenerationEvent {
    /// Waiting in the provider's queue.
    Queued { position: Option<u32> },
    /// Running; carries only log lines not reported before.
    Progress { logs: Vec<String> },
    /// Terminal: the finished video.
    Succeeded(GeneratedVideo),
    /// Terminal: the attempt failed.
    Failed(ProviderError),
}

impl GenerationEvent {
    pub fn is_terminal(&self) -> bool {
        matches!(self, GenerationEvent::Succeeded(_) | GenerationEvent::Failed(_))
    }

    pub fn label(&self) -> &'static str {
        match self {
            GenerationEvent::Queued { .. } => "queued",
            GenerationEvent::Progress { .. } => "progress",
            GenerationEvent::Succeeded(_) => "succeeded",
            GenerationEvent::Failed(_) => "failed",
        }
    }
}

impl From<ProviderResult<GeneratedVideo>> for GenerationEvent {
    fn from(result: ProviderResult<GeneratedVideo>) -> Self {
        match result {
            Ok(video) => GenerationEvent::Succeeded(video),
            Err(err) => GenerationEvent::Failed(err),
        }
    }
}

/// Lazy status stream for one attempt. Nothing is sent to the provider until
/// it is polled; it ends right after the single terminal event and cannot be
/// restarted.
pub type GenerationEvents = BoxStream<'static, GenerationEvent>;

/// One video generation provider.
pub trait BackendAdapter: Send + Sync {
    fn kind(&self) -> BackendKind;

    /// Start one generation attempt. No retries happen inside.
    fn submit(&self, input: NormalizedBackendInput) -> GenerationEvents;
}

/// Drive `events` to its terminal event.
///
/// Intermediate events are passed to `observe` and dropped immediately.
pub async fn run_to_terminal<F>(
    mut events: GenerationEvents,
    mut observe: F,
) -> ProviderResult<GeneratedVideo>
where
    F: FnMut(&GenerationEvent),
{
    while let Some(event) = events.next().await {
        match event {
            GenerationEvent::Succeeded(video) => return Ok(video),
            GenerationEvent::Failed(err) => return Err(err),
            intermediate => observe(&intermediate),
        }
    }

    Err(ProviderError::malformed(
        "status stream ended without a terminal event",
    ))
}

/// Run one attempt and ignore intermediate updates.
pub async fn generate(
    adapter: &dyn BackendAdapter,
    input: NormalizedBackendInput,
) -> ProviderResult<GeneratedVideo> {
    run_to_terminal(adapter.submit(input), |_| {}).await
}
