//! The staging seam used by the orchestrator.

use async_trait::async_trait;
use mmk_models::{ImagePayload, StagedMedia};

use crate::error::StorageResult;

/// Makes image bytes fetchable by URL.
///
/// Every call uploads a new object. Nothing is cached or deduplicated, so
/// staging the same bytes twice yields two distinct URLs.
#[async_trait]
pub trait MediaStager: Send + Sync {
    /// Short name for logs and readiness output.
    fn name(&self) -> &'static str;

    /// Upload `image` and return where the provider can read it.
    async fn stage(&self, image: &ImagePayload) -> StorageResult<StagedMedia>;
}

/// Object name for a fresh upload.
pub(crate) fn staged_file_name(image: &ImagePayload) -> String {
    format!("{}.{}", uuid::Uuid::new_v4(), image.extension())
}
