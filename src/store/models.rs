use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// A meeting participant, validated at the storage boundary.
///
/// The attendee list is persisted as loose JSON; entries are normalized here
/// rather than letting untyped values leak into the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attendee {
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub attended: bool,
}

impl Attendee {
    /// Normalize one raw JSON entry. Entries without a string email are
    /// rejected; a missing name falls back to the email address.
    pub fn normalize(raw: &Value) -> Option<Attendee> {
        let obj = raw.as_object()?;
        let email = obj.get("email")?.as_str()?.trim().to_string();
        if email.is_empty() {
            return None;
        }
        let name = obj
            .get("name")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .unwrap_or(&email)
            .to_string();
        let attended = obj
            .get("attended")
            .and_then(Value::as_bool)
            .unwrap_or(false);
        Some(Attendee {
            name,
            email,
            attended,
        })
    }

    /// Normalize a whole raw list, dropping malformed entries.
    pub fn normalize_list(raw: &Value) -> Vec<Attendee> {
        raw.as_array()
            .map(|items| items.iter().filter_map(Attendee::normalize).collect())
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Meeting {
    pub id: Uuid,
    pub title: String,
    pub scheduled_at: DateTime<Utc>,
    pub duration_mins: i64,
    pub description: Option<String>,
    pub meeting_link: Option<String>,
    pub attendees: Vec<Attendee>,
}

/// One uploaded recording. Immutable once the storage locator is assigned;
/// removed only by explicit user action.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaAsset {
    pub id: Uuid,
    pub meeting_id: Uuid,
    pub storage_locator: String,
    pub original_filename: String,
    pub byte_size: u64,
    pub uploaded_at: DateTime<Utc>,
}

/// Per-meeting scheduled notice, keyed by meeting id (upsert semantics).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReminderRecord {
    pub meeting_id: Uuid,
    pub fire_time: DateTime<Utc>,
    pub sent: bool,
    pub sent_at: Option<DateTime<Utc>>,
}

/// Per-meeting synthesis artifacts plus the distribution sent flag.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MinutesRecord {
    pub meeting_id: Uuid,
    pub transcript: String,
    pub summary: String,
    pub full_minutes_json: String,
    pub sent: bool,
}
