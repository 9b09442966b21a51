//! Selection of the generation backend at startup.

use std::sync::Arc;

use mmk_models::BackendKind;

use crate::adapter::BackendAdapter;
use crate::error::{ProviderError, ProviderResult};
use crate::fal::{FalQueueAdapter, FalQueueConfig};
use crate::replicate::{ReplicateAdapter, ReplicateConfig};

/// The one backend this deployment talks to.
#[derive(Debug, Clone)]
pub enum ProviderConfig {
    Replicate(ReplicateConfig),
    Fal(FalQueueConfig),
}

impl ProviderConfig {
    /// Read `VIDEO_BACKEND` and the matching provider settings.
    pub fn from_env() -> ProviderResult<Self> {
        let kind = match std::env::var("VIDEO_BACKEND") {
            Ok(value) => value
                .parse::<BackendKind>()
                .map_err(|e| ProviderError::config(e.to_string()))?,
            Err(_) => BackendKind::SynchronousRun,
        };

        Ok(match kind {
            BackendKind::SynchronousRun => ProviderConfig::Replicate(ReplicateConfig::from_env()?),
            BackendKind::QueuedSubscribe => ProviderConfig::Fal(FalQueueConfig::from_env()?),
        })
    }

    pub fn kind(&self) -> BackendKind {
        match self {
            ProviderConfig::Replicate(_) => BackendKind::SynchronousRun,
            ProviderConfig::Fal(_) => BackendKind::QueuedSubscribe,
        }
    }

    pub fn build(self) -> Arc<dyn BackendAdapter> {
        match self {
            ProviderConfig::Replicate(config) => Arc::new(ReplicateAdapter::new(config)),
            ProviderConfig::Fal(config) => Arc::new(FalQueueAdapter::new(config)),
        }
    }
}
