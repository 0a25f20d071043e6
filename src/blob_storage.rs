use crate::config::BlobConfig;
use crate::errors::AppError;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

/// Location of a stored file.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct StoredBlob {
    pub url: String,
    pub pathname: String,
}

impl StoredBlob {
    /// Last path segment of the stored name.
    pub fn file_name(&self) -> &str {
        self.pathname.rsplit('/').next().unwrap_or(&self.pathname)
    }
}

#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn put(&self, path: &str, bytes: Vec<u8>, content_type: &str)
        -> Result<StoredBlob, AppError>;
}

/// Blob store speaking the Vercel Blob HTTP API.
pub struct HttpBlobStore {
    client: Client,
    base_url: String,
    token: String,
}

impl HttpBlobStore {
    /// Returns `None` when no read/write token is configured.
    pub fn from_config(config: &BlobConfig, client: Client) -> Option<Self> {
        let token = config.token.clone()?;
        Some(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            token,
        })
    }
}

#[async_trait]
impl BlobStore for HttpBlobStore {
    async fn put(
        &self,
        path: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<StoredBlob, AppError> {
        let url = format!("{}/{}", self.base_url, path.trim_start_matches('/'));
        let size = bytes.len();

        let response = self
            .client
            .put(&url)
            .bearer_auth(&self.token)
            .header("x-content-type", content_type)
            .body(bytes)
            .send()
            .await
            .map_err(|e| AppError::InternalFailure(format!("Blob upload failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(AppError::InternalFailure(format!(
                "Blob store returned status {}: {}",
                status, error_text
            )));
        }

        let blob: StoredBlob = response.json().await.map_err(|e| {
            AppError::InternalFailure(format!("Failed to parse blob store response: {}", e))
        })?;

        tracing::info!("[UPLOAD] ✓ Stored {} ({} bytes)", blob.pathname, size);
        Ok(blob)
    }
}
