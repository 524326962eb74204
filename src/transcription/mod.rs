//! Speech-to-text client with speaker diarization.
//!
//! Submission is two calls: the media bytes go to the provider's upload
//! endpoint for an `upload_url`, then a job is created against that URL with
//! speaker labels requested. Completion is observed by polling; the poll
//! interval and ceiling are fields so tests can shrink them.

use reqwest::multipart;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::{sleep, Instant};

use crate::config::TranscriptionConfig;
use crate::shared::PipelineError;

pub const TRANSCRIBE_POLL_INTERVAL: Duration = Duration::from_secs(3);
/// Hard ceiling on observation. The provider job may still complete
/// server-side after this elapses; it is simply no longer watched.
pub const TRANSCRIBE_POLL_CEILING: Duration = Duration::from_secs(600);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptSegment {
    pub speaker: String,
    pub start_ms: u64,
    pub text: String,
}

/// Derived text plus per-segment speaker/timing data. Immutable once
/// produced.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Transcript {
    pub text: String,
    #[serde(default)]
    pub segments: Vec<TranscriptSegment>,
}

impl Transcript {
    /// Render the transcript as `[MM:SS] Speaker <label>: <text>` lines.
    /// Without diarization data the raw text is returned behind a notice.
    pub fn formatted(&self) -> String {
        if self.segments.is_empty() {
            return format!("(No speaker diarization data available)\n\n{}", self.text);
        }
        self.segments
            .iter()
            .map(|seg| {
                format!(
                    "{} Speaker {}: {}",
                    format_timestamp(seg.start_ms),
                    seg.speaker,
                    seg.text.trim()
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// `start_ms` floor-divided into minutes and remainder seconds, zero-padded.
pub fn format_timestamp(start_ms: u64) -> String {
    let total_secs = start_ms / 1000;
    format!("[{:02}:{:02}]", total_secs / 60, total_secs % 60)
}

#[derive(Deserialize)]
struct UploadResponse {
    upload_url: String,
}

#[derive(Deserialize)]
struct JobCreated {
    id: String,
}

#[derive(Deserialize)]
struct JobStatus {
    status: String,
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    segments: Option<Vec<TranscriptSegment>>,
    #[serde(default)]
    error: Option<String>,
}

pub struct TranscriptionClient {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    pub poll_interval: Duration,
    pub poll_ceiling: Duration,
}

impl TranscriptionClient {
    pub fn new(config: &TranscriptionConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            poll_interval: TRANSCRIBE_POLL_INTERVAL,
            poll_ceiling: TRANSCRIBE_POLL_CEILING,
        }
    }

    fn authorized(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(key) => req.header("authorization", key),
            None => req,
        }
    }

    /// Upload media bytes and create a diarized transcription job. Returns
    /// the provider job id.
    pub async fn submit(&self, media: Vec<u8>, filename: &str) -> Result<String, PipelineError> {
        let part = multipart::Part::bytes(media).file_name(filename.to_string());
        let form = multipart::Form::new().part("file", part);

        let upload: UploadResponse = self
            .authorized(self.http.post(format!("{}/transcribe/upload", self.base_url)))
            .multipart(form)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let created: JobCreated = self
            .authorized(self.http.post(format!("{}/transcribe/jobs", self.base_url)))
            .json(&serde_json::json!({
                "audio_url": upload.upload_url,
                "speaker_labels": true,
            }))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        log::info!("Transcription job {} submitted for {}", created.id, filename);
        Ok(created.id)
    }

    async fn job_status(&self, job_id: &str) -> Result<JobStatus, PipelineError> {
        let status = self
            .authorized(
                self.http
                    .get(format!("{}/transcribe/jobs/{}", self.base_url, job_id)),
            )
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(status)
    }

    /// Poll the job to a terminal state. Terminal outcomes: a transcript,
    /// `TranscriptionFailed` with the provider's error text, or
    /// `TranscriptionTimeout` once the ceiling elapses. No retry is attempted
    /// here; retries are the caller's call.
    pub async fn await_transcript(&self, job_id: &str) -> Result<Transcript, PipelineError> {
        let started = Instant::now();

        loop {
            if started.elapsed() >= self.poll_ceiling {
                log::error!("Transcription job {} exceeded the poll ceiling", job_id);
                return Err(PipelineError::TranscriptionTimeout(
                    self.poll_ceiling.as_secs(),
                ));
            }

            let status = self.job_status(job_id).await?;
            match status.status.as_str() {
                "completed" => {
                    return Ok(Transcript {
                        text: status.text.unwrap_or_default(),
                        segments: status.segments.unwrap_or_default(),
                    });
                }
                "failed" => {
                    let reason = status
                        .error
                        .unwrap_or_else(|| "provider reported failure".to_string());
                    log::error!("Transcription job {} failed: {}", job_id, reason);
                    return Err(PipelineError::TranscriptionFailed(reason));
                }
                phase => {
                    // queued | processing
                    log::debug!("Transcription job {} is {}, waiting", job_id, phase);
                    sleep(self.poll_interval).await;
                }
            }
        }
    }

    /// Submit-and-wait convenience used by the pipeline.
    pub async fn transcribe(
        &self,
        media: Vec<u8>,
        filename: &str,
    ) -> Result<Transcript, PipelineError> {
        let job_id = self.submit(media, filename).await?;
        self.await_transcript(&job_id).await
    }
}
