//! Artifact and reminder distribution through the mail-relay endpoints.
//!
//! A distribution call is single-shot: one HTTP request carrying every
//! recipient and every artifact. There is no per-recipient retry and no
//! idempotency guard here; callers that need exactly-once check the owning
//! record's `sent` flag before calling.

use reqwest::multipart;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::config::DistributionConfig;
use crate::shared::PipelineError;
use crate::store::{Attendee, Meeting};
use crate::synthesis::MeetingMinutes;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecipientKind {
    Internal,
    External,
}

/// A distribution target, supplied per call and never persisted on its own.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmailRecipient {
    pub email: String,
    #[serde(rename = "type")]
    pub kind: RecipientKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// An address is deliverable when it is non-empty and carries an '@'. Deeper
/// validation is the relay's business.
pub fn has_valid_address(email: &str) -> bool {
    !email.trim().is_empty() && email.contains('@')
}

/// Drop recipients with empty or malformed addresses before the call is
/// issued; the reported totals cover only the survivors.
pub fn valid_recipients(recipients: &[EmailRecipient]) -> Vec<EmailRecipient> {
    recipients
        .iter()
        .filter(|r| has_valid_address(&r.email))
        .cloned()
        .collect()
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SendReport {
    pub success: bool,
    #[serde(default)]
    pub sent_count: u32,
    #[serde(default)]
    pub total_count: u32,
}

#[derive(Deserialize)]
struct ReminderResponse {
    success: bool,
}

/// Subject and body for a reminder notification, derived from the meeting.
#[derive(Debug, Clone)]
pub struct ReminderEmail {
    pub subject: String,
    pub body: String,
    pub meeting_data: serde_json::Value,
}

pub fn build_reminder_email(meeting: &Meeting) -> ReminderEmail {
    let date = meeting.scheduled_at.format("%A, %B %-d, %Y").to_string();
    let time = meeting.scheduled_at.format("%I:%M %p").to_string();
    let duration = format!("{} minutes", meeting.duration_mins);

    let mut body = format!(
        "Your meeting \"{}\" is scheduled to start in 30 minutes.\n\n\
         Date: {}\nTime: {}\nDuration: {}\n",
        meeting.title, date, time, duration
    );
    if let Some(link) = &meeting.meeting_link {
        body.push_str(&format!("Join: {link}\n"));
    }
    if let Some(description) = &meeting.description {
        body.push_str(&format!("\n{description}\n"));
    }
    body.push_str("\nPlease ensure you're ready and have all necessary materials prepared.\n");

    ReminderEmail {
        subject: format!("Meeting Reminder: {}", meeting.title),
        body,
        meeting_data: json!({
            "title": meeting.title,
            "date": date,
            "time": time,
            "duration": duration,
            "meeting_link": meeting.meeting_link,
            "description": meeting.description,
        }),
    }
}

pub struct DistributionClient {
    http: reqwest::Client,
    base_url: String,
}

impl DistributionClient {
    pub fn new(config: &DistributionConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Send minutes artifacts to the filtered recipient set in one multipart
    /// request. Transport or server failure fails the whole send.
    pub async fn send_minutes(
        &self,
        recipients: &[EmailRecipient],
        minutes: &MeetingMinutes,
        summary: &str,
        transcript: &str,
        document: Option<Vec<u8>>,
    ) -> Result<SendReport, PipelineError> {
        let recipients = valid_recipients(recipients);
        if recipients.is_empty() {
            return Err(PipelineError::Distribution(
                "no valid recipients after filtering".to_string(),
            ));
        }

        let mut form = multipart::Form::new()
            .text("recipients", serde_json::to_string(&recipients).map_err(|e| {
                PipelineError::Distribution(format!("recipient encoding failed: {e}"))
            })?)
            .text("mom", serde_json::to_string(minutes).map_err(|e| {
                PipelineError::Distribution(format!("minutes encoding failed: {e}"))
            })?)
            .text("summary", summary.to_string())
            .text("transcript", transcript.to_string());
        if let Some(bytes) = document {
            let part = multipart::Part::bytes(bytes)
                .file_name("Minutes_of_Meeting.pdf")
                .mime_str("application/pdf")
                .map_err(|e| PipelineError::Distribution(e.to_string()))?;
            form = form.part("document", part);
        }

        let report: SendReport = self
            .http
            .post(format!("{}/send-artifact", self.base_url))
            .multipart(form)
            .send()
            .await?
            .error_for_status()
            .map_err(|e| PipelineError::Distribution(e.to_string()))?
            .json()
            .await?;

        log::info!(
            "Distributed minutes to {}/{} recipients",
            report.sent_count,
            report.total_count
        );
        Ok(report)
    }

    /// Deliver one reminder notification to a meeting's attendees.
    pub async fn send_reminder(
        &self,
        meeting_id: uuid::Uuid,
        attendees: &[Attendee],
        email: &ReminderEmail,
    ) -> Result<bool, PipelineError> {
        let payload = json!({
            "meeting_id": meeting_id,
            "attendees": attendees
                .iter()
                .map(|a| json!({ "name": a.name, "email": a.email }))
                .collect::<Vec<_>>(),
            "subject": email.subject,
            "body": email.body,
            "meeting_data": email.meeting_data,
        });

        let response: ReminderResponse = self
            .http
            .post(format!("{}/send-reminder", self.base_url))
            .json(&payload)
            .send()
            .await?
            .error_for_status()
            .map_err(|e| PipelineError::Distribution(e.to_string()))?
            .json()
            .await?;
        Ok(response.success)
    }
}
