//! Application state.

use std::sync::Arc;

use tracing::info;

use mmk_providers::ProviderConfig;
use mmk_storage::StagingBackend;

use crate::config::ApiConfig;
use crate::services::GenerationOrchestrator;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: ApiConfig,
    pub orchestrator: Arc<GenerationOrchestrator>,
}

impl AppState {
    /// Create new application state.
    ///
    /// The stager is only built for backends that read images by URL.
    pub async fn new(config: ApiConfig) -> Result<Self, Box<dyn std::error::Error>> {
        let provider = ProviderConfig::from_env()?;
        let backend = provider.kind();
        let adapter = provider.build();

        let stager = if backend.requires_staging() {
            let staging = StagingBackend::from_env()?;
            Some(staging.build().await?)
        } else {
            None
        };

        info!(
            backend = %backend,
            stager = stager.as_ref().map(|s| s.name()).unwrap_or("none"),
            "Generation backend configured"
        );

        Ok(Self::with_orchestrator(
            config,
            GenerationOrchestrator::new(adapter, stager),
        ))
    }

    pub fn with_orchestrator(config: ApiConfig, orchestrator: GenerationOrchestrator) -> Self {
        Self {
            config,
            orchestrator: Arc::new(orchestrator),
        }
    }
}
