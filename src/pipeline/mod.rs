//! End-to-end meeting processing: media upload, transcription, synthesis,
//! rendering, distribution.
//!
//! Stages run strictly in order and each consumes its predecessor's output.
//! A stage failure stops the march but keeps every artifact produced before
//! it, so the outcome always reports the furthest point reached. Synthesis
//! is the one stage allowed to degrade rather than fail: without structured
//! minutes the transcript and summary are still persisted and returned.

use std::path::Path;
use std::sync::Arc;
use uuid::Uuid;

use crate::config::AppConfig;
use crate::distribution::{DistributionClient, EmailRecipient, SendReport};
use crate::render;
use crate::shared::{PipelineError, Stage};
use crate::store::{MediaAsset, MinutesRecord, StateStore};
use crate::synthesis::{MeetingMinutes, SynthesisClient, DEFAULT_SUMMARY_PROMPT};
use crate::transcription::{Transcript, TranscriptionClient};
use crate::upload::UploadClient;

/// Everything a processing run produced before it finished or failed.
#[derive(Debug, Default)]
pub struct PipelineOutcome {
    pub meeting_id: Uuid,
    pub asset: Option<MediaAsset>,
    pub transcript: Option<Transcript>,
    pub formatted_transcript: Option<String>,
    pub summary: Option<String>,
    pub minutes: Option<MeetingMinutes>,
    pub markdown: Option<String>,
    pub document: Option<Vec<u8>>,
    /// The stage that stopped the run, with its reason. `None` means the run
    /// completed every stage up to rendering.
    pub failed: Option<(Stage, String)>,
}

impl PipelineOutcome {
    fn new(meeting_id: Uuid) -> Self {
        Self {
            meeting_id,
            ..Default::default()
        }
    }

    fn fail(mut self, stage: Stage, error: PipelineError) -> Self {
        log::error!("Pipeline stage {} failed: {}", stage, error);
        self.failed = Some((error.stage().unwrap_or(stage), error.to_string()));
        self
    }
}

pub struct MeetingProcessor {
    pub upload: UploadClient,
    pub transcription: TranscriptionClient,
    pub synthesis: SynthesisClient,
    pub distribution: Arc<DistributionClient>,
    store: Arc<dyn StateStore>,
}

impl MeetingProcessor {
    pub fn new(config: &AppConfig, store: Arc<dyn StateStore>) -> Self {
        Self {
            upload: UploadClient::new(&config.upload),
            transcription: TranscriptionClient::new(&config.transcription),
            synthesis: SynthesisClient::new(&config.synthesis),
            distribution: Arc::new(DistributionClient::new(&config.distribution)),
            store,
        }
    }

    /// Run a recording through upload, transcription, synthesis and
    /// rendering. Artifacts are persisted as soon as they exist; the minutes
    /// record is always written `sent = false`, distribution flips it later.
    pub async fn process_recording(&self, meeting_id: Uuid, media_path: &Path) -> PipelineOutcome {
        let mut outcome = PipelineOutcome::new(meeting_id);
        log::info!(
            "Processing recording {} for meeting {}",
            media_path.display(),
            meeting_id
        );

        let asset = match self.upload.upload(media_path, meeting_id).await {
            Ok(asset) => asset,
            Err(e) => return outcome.fail(Stage::Upload, e),
        };
        if let Err(e) = self.store.insert_media_asset(&asset).await {
            return outcome.fail(Stage::Upload, e.into());
        }
        let filename = asset.original_filename.clone();
        outcome.asset = Some(asset);

        let media = match tokio::fs::read(media_path).await {
            Ok(bytes) => bytes,
            Err(e) => {
                return outcome.fail(
                    Stage::Transcription,
                    PipelineError::TranscriptionFailed(format!(
                        "cannot read {}: {e}",
                        media_path.display()
                    )),
                )
            }
        };
        let transcript = match self.transcription.transcribe(media, &filename).await {
            Ok(transcript) => transcript,
            Err(e) => return outcome.fail(Stage::Transcription, e),
        };
        let formatted = transcript.formatted();
        outcome.transcript = Some(transcript);
        outcome.formatted_transcript = Some(formatted.clone());

        let summary = self
            .synthesis
            .summarize(&formatted, DEFAULT_SUMMARY_PROMPT)
            .await;
        outcome.summary = summary.clone();

        let minutes = match self.synthesis.derive_minutes(&formatted).await {
            Some(mut minutes) => {
                if minutes.summary.is_empty() {
                    if let Some(summary) = &summary {
                        minutes.summary = summary.clone();
                    }
                }
                minutes
            }
            None => {
                // Degraded synthesis: keep the transcript and summary.
                let record = MinutesRecord {
                    meeting_id,
                    transcript: formatted,
                    summary: summary.unwrap_or_default(),
                    full_minutes_json: String::new(),
                    sent: false,
                };
                if let Err(e) = self.store.upsert_minutes(&record).await {
                    return outcome.fail(Stage::Synthesis, e.into());
                }
                outcome.failed = Some((
                    Stage::Synthesis,
                    "structured minutes unavailable".to_string(),
                ));
                return outcome;
            }
        };

        let full_minutes_json = match serde_json::to_string(&minutes) {
            Ok(json) => json,
            Err(e) => {
                return outcome.fail(
                    Stage::Synthesis,
                    PipelineError::Store(anyhow::anyhow!("minutes are not encodable: {e}")),
                )
            }
        };
        outcome.minutes = Some(minutes.clone());

        let record = MinutesRecord {
            meeting_id,
            transcript: formatted,
            summary: summary.unwrap_or_default(),
            full_minutes_json,
            sent: false,
        };
        if let Err(e) = self.store.upsert_minutes(&record).await {
            return outcome.fail(Stage::Synthesis, e.into());
        }

        match render::render(&minutes) {
            Ok((document, markdown)) => {
                outcome.document = Some(document);
                outcome.markdown = Some(markdown);
                log::info!("Processing complete for meeting {}", meeting_id);
                outcome
            }
            Err(e) => outcome.fail(Stage::Rendering, e),
        }
    }

    /// Send the persisted minutes to the recipients. The record's `sent`
    /// flag is the idempotency guard: an already-sent record short-circuits
    /// to `Ok(None)` without touching the relay. The flag flips only after
    /// the relay confirms success.
    pub async fn distribute(
        &self,
        meeting_id: Uuid,
        recipients: &[EmailRecipient],
    ) -> Result<Option<SendReport>, PipelineError> {
        let record = self
            .store
            .minutes(meeting_id)
            .await?
            .ok_or_else(|| {
                PipelineError::Distribution(format!("no minutes on record for {meeting_id}"))
            })?;
        if record.sent {
            log::info!("Minutes for {} already distributed, skipping", meeting_id);
            return Ok(None);
        }

        let (minutes, document) = if record.full_minutes_json.is_empty() {
            (MeetingMinutes::default(), None)
        } else {
            let minutes: MeetingMinutes = serde_json::from_str(&record.full_minutes_json)
                .map_err(|e| {
                    PipelineError::Distribution(format!("stored minutes are not decodable: {e}"))
                })?;
            let (document, _) = render::render(&minutes)?;
            (minutes, Some(document))
        };

        let report = self
            .distribution
            .send_minutes(
                recipients,
                &minutes,
                &record.summary,
                &record.transcript,
                document,
            )
            .await?;
        if report.success {
            self.store.mark_minutes_sent(meeting_id).await?;
        }
        Ok(Some(report))
    }

    /// Convenience for the auto-send flow: process, then distribute unless a
    /// stage failed. A distribution failure is folded into the outcome like
    /// any other stage, so the artifacts already rendered stay with the
    /// caller.
    pub async fn process_and_distribute(
        &self,
        meeting_id: Uuid,
        media_path: &Path,
        recipients: &[EmailRecipient],
    ) -> PipelineOutcome {
        let outcome = self.process_recording(meeting_id, media_path).await;
        if outcome.failed.is_none() {
            if let Err(e) = self.distribute(meeting_id, recipients).await {
                return outcome.fail(Stage::Distribution, e);
            }
        }
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::distribution::RecipientKind;
    use crate::store::SqliteStore;

    fn processor_for(base_url: &str, store: Arc<dyn StateStore>) -> MeetingProcessor {
        let config = AppConfig::for_base_url(base_url);
        let mut processor = MeetingProcessor::new(&config, store);
        processor.upload.poll_interval = std::time::Duration::from_millis(10);
        processor.transcription.poll_interval = std::time::Duration::from_millis(10);
        processor
    }

    fn recipient(email: &str) -> EmailRecipient {
        EmailRecipient {
            email: email.to_string(),
            kind: RecipientKind::Internal,
            name: None,
        }
    }

    #[tokio::test]
    async fn degraded_synthesis_keeps_transcript_and_summary() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/upload")
            .with_header("content-type", "application/json")
            .with_body(r#"{"upload_id":"u1","filename":"m.mp4"}"#)
            .create_async()
            .await;
        server
            .mock("GET", "/upload-status/u1")
            .with_header("content-type", "application/json")
            .with_body(r#"{"progress":100,"completed":true,"storage_locator":"drive:1"}"#)
            .create_async()
            .await;
        server
            .mock("POST", "/transcribe/upload")
            .with_header("content-type", "application/json")
            .with_body(r#"{"upload_url":"https://store.example/a"}"#)
            .create_async()
            .await;
        server
            .mock("POST", "/transcribe/jobs")
            .with_header("content-type", "application/json")
            .with_body(r#"{"id":"j1"}"#)
            .create_async()
            .await;
        server
            .mock("GET", "/transcribe/jobs/j1")
            .with_header("content-type", "application/json")
            .with_body(r#"{"status":"completed","text":"we met"}"#)
            .create_async()
            .await;
        server
            .mock("POST", "/generate-summary")
            .with_header("content-type", "application/json")
            .with_body(r#"{"summary":"A short meeting."}"#)
            .create_async()
            .await;
        // No JSON object anywhere in the minutes response.
        server
            .mock("POST", "/generate-mom")
            .with_header("content-type", "application/json")
            .with_body(r#"{"mom":"I cannot produce structured minutes."}"#)
            .create_async()
            .await;

        let store = Arc::new(SqliteStore::open_in_memory().unwrap());
        let processor = processor_for(&server.url(), store.clone());

        let mut media = tempfile::NamedTempFile::new().unwrap();
        std::io::Write::write_all(&mut media, b"media").unwrap();

        let meeting_id = Uuid::new_v4();
        let outcome = processor.process_recording(meeting_id, media.path()).await;

        assert_eq!(outcome.failed.as_ref().map(|(s, _)| *s), Some(Stage::Synthesis));
        assert!(outcome.formatted_transcript.is_some());
        assert_eq!(outcome.summary.as_deref(), Some("A short meeting."));
        assert!(outcome.minutes.is_none());
        assert!(outcome.document.is_none());

        let record = store.minutes(meeting_id).await.unwrap().unwrap();
        assert_eq!(record.summary, "A short meeting.");
        assert!(record.full_minutes_json.is_empty());
        assert!(!record.sent);
    }

    /// Accepts everything except minutes writes, which fail like a full
    /// disk would.
    struct UnwritableMinutesStore;

    #[async_trait::async_trait]
    impl StateStore for UnwritableMinutesStore {
        async fn upsert_meeting(&self, _: &crate::store::Meeting) -> anyhow::Result<()> {
            Ok(())
        }
        async fn meeting(&self, _: Uuid) -> anyhow::Result<Option<crate::store::Meeting>> {
            Ok(None)
        }
        async fn insert_media_asset(&self, _: &MediaAsset) -> anyhow::Result<()> {
            Ok(())
        }
        async fn delete_media_asset(&self, _: Uuid) -> anyhow::Result<()> {
            Ok(())
        }
        async fn media_assets(&self, _: Uuid) -> anyhow::Result<Vec<MediaAsset>> {
            Ok(Vec::new())
        }
        async fn upsert_reminder(&self, _: &crate::store::ReminderRecord) -> anyhow::Result<()> {
            Ok(())
        }
        async fn reminder(
            &self,
            _: Uuid,
        ) -> anyhow::Result<Option<crate::store::ReminderRecord>> {
            Ok(None)
        }
        async fn due_reminders(
            &self,
            _: chrono::DateTime<chrono::Utc>,
        ) -> anyhow::Result<Vec<crate::store::ReminderRecord>> {
            Ok(Vec::new())
        }
        async fn mark_reminder_sent(
            &self,
            _: Uuid,
            _: chrono::DateTime<chrono::Utc>,
        ) -> anyhow::Result<()> {
            Ok(())
        }
        async fn upsert_minutes(&self, _: &MinutesRecord) -> anyhow::Result<()> {
            anyhow::bail!("database is read-only")
        }
        async fn minutes(&self, _: Uuid) -> anyhow::Result<Option<MinutesRecord>> {
            Ok(None)
        }
        async fn mark_minutes_sent(&self, _: Uuid) -> anyhow::Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn minutes_persist_failure_is_reported_against_synthesis() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/upload")
            .with_header("content-type", "application/json")
            .with_body(r#"{"upload_id":"u9","filename":"m.mp4"}"#)
            .create_async()
            .await;
        server
            .mock("GET", "/upload-status/u9")
            .with_header("content-type", "application/json")
            .with_body(r#"{"progress":100,"completed":true,"storage_locator":"drive:9"}"#)
            .create_async()
            .await;
        server
            .mock("POST", "/transcribe/upload")
            .with_header("content-type", "application/json")
            .with_body(r#"{"upload_url":"https://store.example/c"}"#)
            .create_async()
            .await;
        server
            .mock("POST", "/transcribe/jobs")
            .with_header("content-type", "application/json")
            .with_body(r#"{"id":"j9"}"#)
            .create_async()
            .await;
        server
            .mock("GET", "/transcribe/jobs/j9")
            .with_header("content-type", "application/json")
            .with_body(r#"{"status":"completed","text":"we met"}"#)
            .create_async()
            .await;
        server
            .mock("POST", "/generate-summary")
            .with_header("content-type", "application/json")
            .with_body(r#"{"summary":"Quick sync."}"#)
            .create_async()
            .await;
        server
            .mock("POST", "/generate-mom")
            .with_header("content-type", "application/json")
            .with_body(r#"{"mom":"{\"title\":\"Sync\"}"}"#)
            .create_async()
            .await;

        let processor = processor_for(&server.url(), Arc::new(UnwritableMinutesStore));

        let mut media = tempfile::NamedTempFile::new().unwrap();
        std::io::Write::write_all(&mut media, b"media").unwrap();

        let outcome = processor
            .process_recording(Uuid::new_v4(), media.path())
            .await;

        // The minutes were derived; only the write failed, before any
        // rendering began.
        let (stage, reason) = outcome.failed.unwrap();
        assert_eq!(stage, Stage::Synthesis);
        assert!(reason.contains("read-only"));
        assert!(outcome.minutes.is_some());
        assert!(outcome.document.is_none());
    }

    #[tokio::test]
    async fn distribute_skips_when_already_sent() {
        let mut server = mockito::Server::new_async().await;
        let relay = server
            .mock("POST", "/send-artifact")
            .expect(0)
            .create_async()
            .await;

        let store = Arc::new(SqliteStore::open_in_memory().unwrap());
        let processor = processor_for(&server.url(), store.clone());

        let meeting_id = Uuid::new_v4();
        store
            .upsert_minutes(&MinutesRecord {
                meeting_id,
                transcript: "t".into(),
                summary: "s".into(),
                full_minutes_json: String::new(),
                sent: false,
            })
            .await
            .unwrap();
        store.mark_minutes_sent(meeting_id).await.unwrap();

        let report = processor
            .distribute(meeting_id, &[recipient("a@x.com")])
            .await
            .unwrap();
        assert!(report.is_none());
        relay.assert_async().await;
    }

    #[tokio::test]
    async fn distribute_without_minutes_record_is_an_error() {
        let server = mockito::Server::new_async().await;
        let store = Arc::new(SqliteStore::open_in_memory().unwrap());
        let processor = processor_for(&server.url(), store);

        let err = processor
            .distribute(Uuid::new_v4(), &[recipient("a@x.com")])
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::Distribution(_)));
    }

    #[tokio::test]
    async fn failed_distribution_leaves_the_record_unsent() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/send-artifact")
            .with_header("content-type", "application/json")
            .with_body(r#"{"success":false,"sent_count":0,"total_count":1}"#)
            .create_async()
            .await;

        let store = Arc::new(SqliteStore::open_in_memory().unwrap());
        let processor = processor_for(&server.url(), store.clone());

        let meeting_id = Uuid::new_v4();
        store
            .upsert_minutes(&MinutesRecord {
                meeting_id,
                transcript: "t".into(),
                summary: "s".into(),
                full_minutes_json: String::new(),
                sent: false,
            })
            .await
            .unwrap();

        let report = processor
            .distribute(meeting_id, &[recipient("a@x.com")])
            .await
            .unwrap()
            .unwrap();
        assert!(!report.success);
        assert!(!store.minutes(meeting_id).await.unwrap().unwrap().sent);
    }
}
