//! Staging through an S3-compatible bucket (Cloudflare R2).

use std::time::Duration;

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_credential_types::Credentials;
use aws_sdk_s3::config::{Builder, Region};
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use tracing::{debug, info};
use url::Url;

use mmk_models::{ImagePayload, StagedMedia};

use crate::error::{StorageError, StorageResult};
use crate::stager::{staged_file_name, MediaStager};

/// Prefix for every staged object.
const STAGING_PREFIX: &str = "staging";

/// Configuration for R2 client.
#[derive(Debug, Clone)]
pub struct R2Config {
    /// R2 endpoint URL (S3 API endpoint)
    pub endpoint_url: String,
    /// Access key ID
    pub access_key_id: String,
    /// Secret access key
    pub secret_access_key: String,
    /// Bucket name
    pub bucket_name: String,
    /// Region (usually "auto" for R2)
    pub region: String,
    /// Lifetime of the presigned URL handed to the provider
    pub url_ttl: Duration,
}

impl R2Config {
    /// Create config from environment variables.
    pub fn from_env() -> StorageResult<Self> {
        Ok(Self {
            endpoint_url: std::env::var("R2_ENDPOINT_URL")
                .map_err(|_| StorageError::config_error("R2_ENDPOINT_URL not set"))?,
            access_key_id: std::env::var("R2_ACCESS_KEY_ID")
                .map_err(|_| StorageError::config_error("R2_ACCESS_KEY_ID not set"))?,
            secret_access_key: std::env::var("R2_SECRET_ACCESS_KEY")
                .map_err(|_| StorageError::config_error("R2_SECRET_ACCESS_KEY not set"))?,
            bucket_name: std::env::var("R2_BUCKET_NAME")
                .map_err(|_| StorageError::config_error("R2_BUCKET_NAME not set"))?,
            region: std::env::var("R2_REGION").unwrap_or_else(|_| "auto".to_string()),
            url_ttl: Duration::from_secs(
                std::env::var("STAGING_URL_TTL_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(3600),
            ),
        })
    }
}

/// Uploads images to R2 and hands out presigned GET URLs.
#[derive(Clone)]
pub struct R2Stager {
    client: Client,
    bucket: String,
    url_ttl: Duration,
}

impl R2Stager {
    /// Create a new R2 stager from configuration.
    pub fn new(config: R2Config) -> Self {
        let credentials = Credentials::new(
            &config.access_key_id,
            &config.secret_access_key,
            None,
            None,
            "r2",
        );

        let sdk_config = Builder::new()
            .behavior_version(BehaviorVersion::latest())
            .endpoint_url(&config.endpoint_url)
            .region(Region::new(config.region))
            .credentials_provider(credentials)
            .force_path_style(true)
            .build();

        Self {
            client: Client::from_conf(sdk_config),
            bucket: config.bucket_name,
            url_ttl: config.url_ttl,
        }
    }

    /// Create from environment variables.
    pub fn from_env() -> StorageResult<Self> {
        Ok(Self::new(R2Config::from_env()?))
    }

    async fn upload_bytes(&self, data: Vec<u8>, key: &str, content_type: &str) -> StorageResult<()> {
        debug!("Uploading {} bytes to {}", data.len(), key);

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(ByteStream::from(data))
            .content_type(content_type)
            .send()
            .await
            .map_err(|e| StorageError::upload_failed(e.to_string()))?;

        Ok(())
    }

    async fn presign_get(&self, key: &str) -> StorageResult<Url> {
        let presign_config = PresigningConfig::expires_in(self.url_ttl)
            .map_err(|e| StorageError::PresignFailed(e.to_string()))?;

        let presigned = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .presigned(presign_config)
            .await
            .map_err(|e| StorageError::PresignFailed(e.to_string()))?;

        Url::parse(presigned.uri()).map_err(|e| StorageError::PresignFailed(e.to_string()))
    }

    /// Check connectivity to R2 by performing a head bucket operation.
    pub async fn check_connectivity(&self) -> StorageResult<()> {
        self.client
            .head_bucket()
            .bucket(&self.bucket)
            .send()
            .await
            .map_err(|e| StorageError::AwsSdk(format!("R2 connectivity check failed: {}", e)))?;
        Ok(())
    }
}

/// Object key for a staged image.
pub fn staging_key(image: &ImagePayload) -> String {
    format!("{}/{}", STAGING_PREFIX, staged_file_name(image))
}

#[async_trait]
impl MediaStager for R2Stager {
    fn name(&self) -> &'static str {
        "r2"
    }

    async fn stage(&self, image: &ImagePayload) -> StorageResult<StagedMedia> {
        let key = staging_key(image);
        self.upload_bytes(image.bytes.clone(), &key, &image.content_type)
            .await?;
        let url = self.presign_get(&key).await?;

        info!(bytes = image.len(), key = %key, "Staged image in R2");
        Ok(StagedMedia::new(url))
    }
}
