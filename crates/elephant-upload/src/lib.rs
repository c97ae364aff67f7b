//! C8 — Uploader.
//!
//! Uploads canonicalized byte payloads to the pinning service with
//! bounded concurrency, verifying the service's returned CID against the
//! one computed locally. Retry/backoff follows the same shape as the
//! HTTP retry policy used elsewhere in this workspace for LLM providers:
//! a fixed attempt budget with exponential backoff between attempts.

use async_trait::async_trait;
use elephant_utils::types::{CidString, ProcessedFile};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Semaphore;

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("upload timed out after {0:?}")]
    Timeout(Duration),
    #[error("upload request failed: {0}")]
    Request(String),
    #[error("pinning service returned a CID that does not match the computed CID")]
    CidMismatch,
}

#[derive(Debug, Clone)]
pub struct UploadResult {
    pub property_id: CidString,
    pub group_id: CidString,
    pub success: bool,
    pub cid: Option<CidString>,
    pub error: Option<String>,
}

/// The pinning service, named only by interface. Production code talks
/// HTTP via `reqwest`; tests substitute an in-memory double.
#[async_trait]
pub trait PinningClient: Send + Sync {
    async fn pin(&self, bytes: &[u8]) -> Result<CidString, UploadError>;
}

pub struct HttpPinningClient {
    client: reqwest::Client,
    endpoint: String,
    jwt: String,
}

impl HttpPinningClient {
    #[must_use]
    pub fn new(endpoint: String, jwt: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint,
            jwt,
        }
    }
}

#[async_trait]
impl PinningClient for HttpPinningClient {
    async fn pin(&self, bytes: &[u8]) -> Result<CidString, UploadError> {
        #[derive(serde::Deserialize)]
        struct PinResponse {
            #[serde(rename = "IpfsHash")]
            ipfs_hash: String,
        }

        let part = reqwest::multipart::Part::bytes(bytes.to_vec()).file_name("data.json");
        let form = reqwest::multipart::Form::new().part("file", part);
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.jwt)
            .multipart(form)
            .send()
            .await
            .map_err(|e| UploadError::Request(redact(&e.to_string())))?
            .error_for_status()
            .map_err(|e| UploadError::Request(redact(&e.to_string())))?;
        let parsed: PinResponse = response
            .json()
            .await
            .map_err(|e| UploadError::Request(e.to_string()))?;
        Ok(parsed.ipfs_hash)
    }
}

fn redact(message: &str) -> String {
    elephant_utils::redact::redact(message)
}

pub struct UploaderConfig {
    pub max_concurrent_uploads: usize,
    pub upload_timeout: Duration,
    pub max_retries: u32,
    pub retry_delay: Duration,
    pub retry_backoff_multiplier: f64,
}

pub struct Uploader<P: PinningClient> {
    client: Arc<P>,
    semaphore: Arc<Semaphore>,
    config: UploaderConfig,
}

impl<P: PinningClient + 'static> Uploader<P> {
    #[must_use]
    pub fn new(client: P, config: UploaderConfig) -> Self {
        let permits = config.max_concurrent_uploads.max(1);
        Self {
            client: Arc::new(client),
            semaphore: Arc::new(Semaphore::new(permits)),
            config,
        }
    }

    async fn upload_one(&self, file: ProcessedFile) -> UploadResult {
        let _permit = self
            .semaphore
            .clone()
            .acquire_owned()
            .await
            .expect("semaphore is never closed");

        let mut attempt = 0;
        loop {
            let fut = self.client.pin(&file.canonical_bytes);
            let outcome = tokio::time::timeout(self.config.upload_timeout, fut).await;

            match outcome {
                Ok(Ok(returned_cid)) => {
                    if returned_cid != file.computed_cid {
                        tracing::warn!(
                            property_id = %file.entry.property_id,
                            group_id = %file.entry.group_id,
                            expected = %file.computed_cid,
                            actual = %returned_cid,
                            "pinning service returned mismatched cid"
                        );
                        return UploadResult {
                            property_id: file.entry.property_id,
                            group_id: file.entry.group_id,
                            success: false,
                            cid: None,
                            error: Some(UploadError::CidMismatch.to_string()),
                        };
                    }
                    return UploadResult {
                        property_id: file.entry.property_id,
                        group_id: file.entry.group_id,
                        success: true,
                        cid: Some(returned_cid),
                        error: None,
                    };
                }
                Ok(Err(e)) => {
                    if attempt >= self.config.max_retries {
                        return UploadResult {
                            property_id: file.entry.property_id,
                            group_id: file.entry.group_id,
                            success: false,
                            cid: None,
                            error: Some(e.to_string()),
                        };
                    }
                    tracing::warn!(
                        property_id = %file.entry.property_id,
                        group_id = %file.entry.group_id,
                        attempt,
                        error = %e,
                        "upload failed, retrying"
                    );
                }
                Err(_) => {
                    if attempt >= self.config.max_retries {
                        return UploadResult {
                            property_id: file.entry.property_id,
                            group_id: file.entry.group_id,
                            success: false,
                            cid: None,
                            error: Some(UploadError::Timeout(self.config.upload_timeout).to_string()),
                        };
                    }
                    tracing::warn!(
                        property_id = %file.entry.property_id,
                        group_id = %file.entry.group_id,
                        attempt,
                        "upload timed out, retrying"
                    );
                }
            }

            let backoff = self
                .config
                .retry_delay
                .mul_f64(self.config.retry_backoff_multiplier.powi(attempt as i32));
            tokio::time::sleep(backoff).await;
            attempt += 1;
        }
    }

    /// Upload the whole batch, returning once every upload has terminated
    /// (success or definitive failure). Concurrency within the batch is
    /// bounded by `max_concurrent_uploads`.
    pub async fn upload_batch(&self, files: Vec<ProcessedFile>) -> Vec<UploadResult> {
        let tasks = files.into_iter().map(|file| self.upload_one(file));
        futures::future::join_all(tasks).await
    }
}

/// Dry-run helper: synthesize successful `UploadResult`s from computed
/// CIDs without calling C8 at all, per §4.8.
#[must_use]
pub fn synthesize_dry_run_results(files: &[ProcessedFile]) -> Vec<UploadResult> {
    files
        .iter()
        .map(|f| UploadResult {
            property_id: f.entry.property_id.clone(),
            group_id: f.entry.group_id.clone(),
            success: true,
            cid: Some(f.computed_cid.clone()),
            error: None,
        })
        .collect()
}
