//! Shared response handling for provider calls.

use reqwest::Response;
use serde::de::DeserializeOwned;

use crate::error::{ProviderError, ProviderResult};

/// Map a non-2xx status to `Rejected`, otherwise decode the body.
pub(crate) async fn read_json<T: DeserializeOwned>(response: Response) -> ProviderResult<T> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(ProviderError::Rejected {
            status: status.as_u16(),
            body,
        });
    }

    let bytes = response.bytes().await?;
    serde_json::from_slice(&bytes).map_err(|e| ProviderError::malformed(e.to_string()))
}
