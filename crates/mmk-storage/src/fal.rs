//! Upload to fal's managed storage.
//!
//! Two requests per image: `initiate` hands back a one-shot upload URL plus the
//! public file URL, then the bytes are `PUT` to the upload URL.

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use url::Url;

use mmk_models::{ImagePayload, StagedMedia};

use crate::error::{StorageError, StorageResult};
use crate::stager::{staged_file_name, MediaStager};

const DEFAULT_STORAGE_URL: &str = "https://rest.alpha.fal.ai";

/// Configuration for fal storage uploads.
#[derive(Debug, Clone)]
pub struct FalStorageConfig {
    /// REST base URL
    pub base_url: String,
    /// API key sent as `Authorization: Key ...`
    pub api_key: String,
}

impl FalStorageConfig {
    /// Create config from environment variables.
    pub fn from_env() -> StorageResult<Self> {
        Ok(Self {
            base_url: std::env::var("FAL_STORAGE_URL")
                .unwrap_or_else(|_| DEFAULT_STORAGE_URL.to_string()),
            api_key: std::env::var("FAL_KEY")
                .map_err(|_| StorageError::config_error("FAL_KEY not set"))?,
        })
    }
}

#[derive(Debug, Serialize)]
struct InitiateUploadRequest<'a> {
    content_type: &'a str,
    file_name: String,
}

#[derive(Debug, Deserialize)]
struct InitiateUploadResponse {
    upload_url: String,
    file_url: String,
}

/// Stages images in fal's CDN-backed storage.
#[derive(Clone)]
pub struct FalStorageStager {
    client: Client,
    config: FalStorageConfig,
}

impl FalStorageStager {
    pub fn new(config: FalStorageConfig) -> Self {
        Self::with_client(Client::new(), config)
    }

    pub fn with_client(client: Client, config: FalStorageConfig) -> Self {
        Self { client, config }
    }

    /// Create from environment variables.
    pub fn from_env() -> StorageResult<Self> {
        Ok(Self::new(FalStorageConfig::from_env()?))
    }

    fn initiate_url(&self) -> String {
        format!(
            "{}/storage/upload/initiate?storage_type=fal-cdn-v3",
            self.config.base_url.trim_end_matches('/')
        )
    }

    async fn initiate(&self, image: &ImagePayload) -> StorageResult<InitiateUploadResponse> {
        let request = InitiateUploadRequest {
            content_type: &image.content_type,
            file_name: staged_file_name(image),
        };
        debug!("Initiating fal upload for {}", request.file_name);

        let response = self
            .client
            .post(self.initiate_url())
            .header(AUTHORIZATION, format!("Key {}", self.config.api_key))
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(StorageError::upload_failed(format!(
                "upload initiate returned {}: {}",
                status, body
            )));
        }

        response
            .json()
            .await
            .map_err(|e| StorageError::invalid_response(e.to_string()))
    }
}

#[async_trait]
impl MediaStager for FalStorageStager {
    fn name(&self) -> &'static str {
        "fal"
    }

    async fn stage(&self, image: &ImagePayload) -> StorageResult<StagedMedia> {
        let target = self.initiate(image).await?;
        let file_url = Url::parse(&target.file_url)
            .map_err(|e| StorageError::invalid_response(format!("bad file_url: {}", e)))?;

        debug!("Uploading {} bytes to fal storage", image.len());
        let response = self
            .client
            .put(&target.upload_url)
            .header(CONTENT_TYPE, &image.content_type)
            .body(image.bytes.clone())
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(StorageError::upload_failed(format!(
                "upload returned {}: {}",
                status, body
            )));
        }

        info!(bytes = image.len(), url = %file_url, "Staged image in fal storage");
        Ok(StagedMedia::new(file_url))
    }
}
