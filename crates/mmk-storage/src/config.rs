//! Selection of the staging backend at startup.

use std::sync::Arc;

use crate::error::{StorageError, StorageResult};
use crate::fal::FalStorageStager;
use crate::r2::R2Stager;
use crate::stager::MediaStager;

/// Where staged images are uploaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StagingBackend {
    /// The generation provider's own storage
    Fal,
    /// Our R2 bucket, exposed through presigned URLs
    R2,
}

impl StagingBackend {
    pub fn from_env() -> StorageResult<Self> {
        match std::env::var("STAGING_BACKEND") {
            Ok(value) => value.parse(),
            Err(_) => Ok(StagingBackend::Fal),
        }
    }

    /// Build the configured stager from environment variables.
    pub async fn build(self) -> StorageResult<Arc<dyn MediaStager>> {
        Ok(match self {
            StagingBackend::Fal => Arc::new(FalStorageStager::from_env()?),
            StagingBackend::R2 => {
                let stager = R2Stager::from_env()?;
                stager.check_connectivity().await?;
                Arc::new(stager)
            }
        })
    }
}

impl std::str::FromStr for StagingBackend {
    type Err = StorageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "fal" => Ok(StagingBackend::Fal),
            "r2" => Ok(StagingBackend::R2),
            other => Err(StorageError::config_error(format!(
                "Unknown STAGING_BACKEND '{}'",
                other
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_staging_backend() {
        assert_eq!("fal".parse::<StagingBackend>().unwrap(), StagingBackend::Fal);
        assert_eq!(" R2 ".parse::<StagingBackend>().unwrap(), StagingBackend::R2);
        assert!(matches!(
            "gcs".parse::<StagingBackend>(),
            Err(StorageError::ConfigError(_))
        ));
    }
}
