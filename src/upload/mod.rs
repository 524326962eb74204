//! Media upload coordination: one whole-file transfer to the storage
//! backend, then status polling until the backend confirms completion.
//!
//! On error the in-flight progress state is discarded and the backend's
//! message is surfaced; there is no automatic retry.

use reqwest::multipart;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use tokio::time::{sleep, Instant};
use uuid::Uuid;

use crate::config::UploadConfig;
use crate::shared::PipelineError;
use crate::store::MediaAsset;

/// Transfer granularity of the backend; used to report chunk counts.
pub const UPLOAD_CHUNK_SIZE: u64 = 8 * 1024 * 1024;
pub const UPLOAD_POLL_INTERVAL: Duration = Duration::from_secs(2);
/// Ceiling on status polling. The original left this unbounded; 15 minutes
/// comfortably covers large recordings while keeping the loop finite.
pub const UPLOAD_POLL_CEILING: Duration = Duration::from_secs(900);

#[derive(Debug, Clone, Deserialize)]
pub struct UploadTicket {
    pub upload_id: String,
    #[serde(default)]
    pub filename: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UploadStatus {
    #[serde(default)]
    pub progress: u8,
    #[serde(default)]
    pub completed: bool,
    #[serde(default)]
    pub storage_locator: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Deserialize)]
struct DeleteResponse {
    success: bool,
}

pub struct UploadClient {
    http: reqwest::Client,
    base_url: String,
    pub poll_interval: Duration,
    pub poll_ceiling: Duration,
}

impl UploadClient {
    pub fn new(config: &UploadConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            poll_interval: UPLOAD_POLL_INTERVAL,
            poll_ceiling: UPLOAD_POLL_CEILING,
        }
    }

    /// Issue the whole-file transfer. Returns the backend's upload ticket for
    /// status polling.
    pub async fn begin_upload(
        &self,
        path: &Path,
        meeting_id: Uuid,
    ) -> Result<UploadTicket, PipelineError> {
        let filename = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("recording")
            .to_string();
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| PipelineError::Upload(format!("cannot read {}: {e}", path.display())))?;
        let chunks = (bytes.len() as u64).div_ceil(UPLOAD_CHUNK_SIZE);
        log::info!(
            "Uploading {} ({} bytes, {} chunk(s)) for meeting {}",
            filename,
            bytes.len(),
            chunks,
            meeting_id
        );

        let form = multipart::Form::new()
            .part("file", multipart::Part::bytes(bytes).file_name(filename.clone()))
            .text("meeting_id", meeting_id.to_string());

        let mut ticket: UploadTicket = self
            .http
            .post(format!("{}/upload", self.base_url))
            .multipart(form)
            .send()
            .await?
            .error_for_status()
            .map_err(|e| PipelineError::Upload(e.to_string()))?
            .json()
            .await?;
        if ticket.filename.is_empty() {
            ticket.filename = filename;
        }
        Ok(ticket)
    }

    pub async fn poll_status(&self, upload_id: &str) -> Result<UploadStatus, PipelineError> {
        let status = self
            .http
            .get(format!("{}/upload-status/{}", self.base_url, upload_id))
            .send()
            .await?
            .error_for_status()
            .map_err(|e| PipelineError::Upload(e.to_string()))?
            .json()
            .await?;
        Ok(status)
    }

    /// Poll until the backend reports completion or error. Returns the
    /// storage locator.
    pub async fn await_completion(&self, upload_id: &str) -> Result<String, PipelineError> {
        let started = Instant::now();
        let mut last_progress = 0u8;

        loop {
            if started.elapsed() >= self.poll_ceiling {
                return Err(PipelineError::Upload(format!(
                    "upload status polling timed out after {} seconds",
                    self.poll_ceiling.as_secs()
                )));
            }

            let status = self.poll_status(upload_id).await?;
            if let Some(error) = status.error {
                log::error!("Upload {} failed: {}", upload_id, error);
                return Err(PipelineError::Upload(error));
            }
            if status.completed {
                return status.storage_locator.ok_or_else(|| {
                    PipelineError::Upload(
                        "backend reported completion without a storage locator".to_string(),
                    )
                });
            }
            if status.progress > last_progress {
                log::debug!("Upload {} at {}%", upload_id, status.progress);
                last_progress = status.progress;
            }
            sleep(self.poll_interval).await;
        }
    }

    /// Transfer a local media file end to end and describe the resulting
    /// asset. The caller persists the returned record.
    pub async fn upload(&self, path: &Path, meeting_id: Uuid) -> Result<MediaAsset, PipelineError> {
        let byte_size = tokio::fs::metadata(path)
            .await
            .map_err(|e| PipelineError::Upload(format!("cannot stat {}: {e}", path.display())))?
            .len();
        let ticket = self.begin_upload(path, meeting_id).await?;
        let storage_locator = self.await_completion(&ticket.upload_id).await?;

        Ok(MediaAsset {
            id: Uuid::new_v4(),
            meeting_id,
            storage_locator,
            original_filename: ticket.filename,
            byte_size,
            uploaded_at: chrono::Utc::now(),
        })
    }

    /// Explicit user-driven removal of a stored file.
    pub async fn delete_file(&self, file_id: &str) -> Result<bool, PipelineError> {
        let response: DeleteResponse = self
            .http
            .post(format!("{}/delete-file", self.base_url))
            .json(&serde_json::json!({ "file_id": file_id }))
            .send()
            .await?
            .error_for_status()
            .map_err(|e| PipelineError::Upload(e.to_string()))?
            .json()
            .await?;
        Ok(response.success)
    }
}
