//! Generative synthesis of summaries and structured minutes.
//!
//! The generative service returns prose; structured minutes arrive as a JSON
//! object embedded somewhere in that prose. Decoding is defensive end to end:
//! the service is not contractually obligated to match the field list, so
//! everything optional defaults to empty and a malformed response degrades to
//! `None` instead of failing the pipeline.

pub mod minutes;

pub use minutes::{DiscussionPoint, DiscussionSection, MeetingMinutes};

use serde::Deserialize;
use thiserror::Error;

use crate::config::SynthesisConfig;

pub const DEFAULT_SUMMARY_PROMPT: &str = "Please provide a concise summary of this meeting:";

/// The response carried no decodable JSON object. Surfaces to callers as
/// `None`; the raw text is kept for logging and diagnosis.
#[derive(Debug, Error)]
#[error("minutes response lacked a well-formed JSON object")]
pub struct SynthesisParseError {
    pub raw: String,
}

/// Substring between the first `{` and the last `}`, if any.
fn extract_embedded_json(raw: &str) -> Option<&str> {
    let start = raw.find('{')?;
    let end = raw.rfind('}')?;
    if end < start {
        return None;
    }
    Some(&raw[start..=end])
}

/// Validating decode of a minutes response. Beyond JSON parse success this
/// checks the top level is an object and that list-typed fields, when
/// present, actually are arrays; missing optional fields become empty
/// collections rather than parse failures.
pub fn decode_minutes(raw: &str) -> Result<MeetingMinutes, SynthesisParseError> {
    let err = || SynthesisParseError {
        raw: raw.to_string(),
    };

    let json = extract_embedded_json(raw).ok_or_else(err)?;
    let value: serde_json::Value = serde_json::from_str(json).map_err(|_| err())?;
    if !value.is_object() {
        return Err(err());
    }
    for field in ["attendees", "agenda", "discussions", "actions"] {
        if let Some(v) = value.get(field) {
            if !v.is_null() && !v.is_array() {
                return Err(err());
            }
        }
    }
    serde_json::from_value(value).map_err(|_| err())
}

#[derive(Deserialize)]
struct SummaryResponse {
    #[serde(default)]
    summary: Option<String>,
}

#[derive(Deserialize)]
struct MomResponse {
    #[serde(default)]
    mom: Option<String>,
}

pub struct SynthesisClient {
    http: reqwest::Client,
    base_url: String,
}

impl SynthesisClient {
    pub fn new(config: &SynthesisConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
        }
    }

    /// One request/response round trip; no streaming, no retry. Transport or
    /// server failure degrades to `None`.
    pub async fn summarize(&self, transcript: &str, prompt: &str) -> Option<String> {
        let result = self
            .http
            .post(format!("{}/generate-summary", self.base_url))
            .json(&serde_json::json!({
                "transcript": transcript,
                "prompt": prompt,
            }))
            .send()
            .await
            .and_then(|r| r.error_for_status());

        let response = match result {
            Ok(response) => response,
            Err(e) => {
                log::error!("Summary generation failed: {}", e);
                return None;
            }
        };
        match response.json::<SummaryResponse>().await {
            Ok(body) => body.summary.filter(|s| !s.is_empty()),
            Err(e) => {
                log::error!("Summary response was not decodable: {}", e);
                None
            }
        }
    }

    /// Derive structured minutes. `None` means "synthesis degraded": callers
    /// keep whatever artifacts already exist and continue.
    pub async fn derive_minutes(&self, transcript: &str) -> Option<MeetingMinutes> {
        let result = self
            .http
            .post(format!("{}/generate-mom", self.base_url))
            .json(&serde_json::json!({ "transcript": transcript }))
            .send()
            .await
            .and_then(|r| r.error_for_status());

        let response = match result {
            Ok(response) => response,
            Err(e) => {
                log::error!("Minutes generation failed: {}", e);
                return None;
            }
        };
        let raw = match response.json::<MomResponse>().await {
            Ok(MomResponse { mom: Some(raw) }) => raw,
            Ok(MomResponse { mom: None }) => {
                log::error!("Minutes response carried no content");
                return None;
            }
            Err(e) => {
                log::error!("Minutes response was not decodable: {}", e);
                return None;
            }
        };

        match decode_minutes(&raw) {
            Ok(minutes) => Some(minutes),
            Err(e) => {
                log::error!("Failed to parse minutes JSON; raw response: {}", e.raw);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_accepts_json_wrapped_in_prose() {
        let raw = r#"Sure! Here are the minutes:
        ```json
        {"title":"Sprint Review","attendees":["Ana","Bob"],
         "discussions":[{"title":"Velocity","points":["Down 10%",{"text":"Blockers","subpoints":["CI flakiness"]}]}]}
        ```
        Let me know if you need anything else."#;

        let minutes = decode_minutes(raw).unwrap();
        assert_eq!(minutes.title, "Sprint Review");
        assert_eq!(minutes.attendees, vec!["Ana", "Bob"]);
        assert_eq!(minutes.discussions[0].points[0].text, "Down 10%");
        assert_eq!(
            minutes.discussions[0].points[1].subpoints,
            vec!["CI flakiness"]
        );
        // Fields the service omitted become empty, not errors.
        assert!(minutes.agenda.is_empty());
        assert!(minutes.summary.is_empty());
    }

    #[test]
    fn decode_rejects_text_without_braces() {
        let err = decode_minutes("I could not produce minutes for this meeting.").unwrap_err();
        assert!(err.raw.contains("could not produce"));
    }

    #[test]
    fn decode_rejects_non_array_list_fields() {
        assert!(decode_minutes(r#"{"title":"x","agenda":"not a list"}"#).is_err());
        assert!(decode_minutes(r#"{"title":"x","agenda":null}"#).is_ok());
    }

    #[test]
    fn decode_rejects_non_object_top_level() {
        assert!(decode_minutes("{ this is not json }").is_err());
    }

    #[tokio::test]
    async fn braceless_minutes_degrade_while_summary_survives() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/generate-mom")
            .with_header("content-type", "application/json")
            .with_body(r#"{"mom":"No structured output available."}"#)
            .create_async()
            .await;
        server
            .mock("POST", "/generate-summary")
            .with_header("content-type", "application/json")
            .with_body(r#"{"summary":"The team met and agreed on next steps."}"#)
            .create_async()
            .await;

        let client = SynthesisClient::new(&SynthesisConfig {
            base_url: server.url(),
        });
        assert!(client.derive_minutes("transcript text").await.is_none());
        let summary = client
            .summarize("transcript text", DEFAULT_SUMMARY_PROMPT)
            .await;
        assert_eq!(
            summary.as_deref(),
            Some("The team met and agreed on next steps.")
        );
    }

    #[tokio::test]
    async fn server_error_degrades_to_none() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/generate-summary")
            .with_status(500)
            .create_async()
            .await;

        let client = SynthesisClient::new(&SynthesisConfig {
            base_url: server.url(),
        });
        assert!(client.summarize("t", DEFAULT_SUMMARY_PROMPT).await.is_none());
    }
}
