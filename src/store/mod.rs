//! Durable state: meetings, media assets, reminder and minutes records.
//!
//! The persistence engine itself is a collaborator, not part of the pipeline;
//! `StateStore` is the seam. Every write is a point update or upsert keyed by
//! a primary key, so concurrent writers converge last-write-wins and no
//! multi-record transactions are needed.

pub mod models;
pub mod sqlite;

pub use models::{Attendee, MediaAsset, Meeting, MinutesRecord, ReminderRecord};
pub use sqlite::SqliteStore;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

#[async_trait]
pub trait StateStore: Send + Sync {
    async fn upsert_meeting(&self, meeting: &Meeting) -> Result<()>;
    async fn meeting(&self, id: Uuid) -> Result<Option<Meeting>>;

    async fn insert_media_asset(&self, asset: &MediaAsset) -> Result<()>;
    async fn delete_media_asset(&self, id: Uuid) -> Result<()>;
    async fn media_assets(&self, meeting_id: Uuid) -> Result<Vec<MediaAsset>>;

    /// Insert-or-replace keyed by meeting id; a meeting has at most one
    /// reminder and rescheduling overwrites rather than appends.
    async fn upsert_reminder(&self, record: &ReminderRecord) -> Result<()>;
    async fn reminder(&self, meeting_id: Uuid) -> Result<Option<ReminderRecord>>;
    /// Unsent reminders whose fire time is at or before `now`.
    async fn due_reminders(&self, now: DateTime<Utc>) -> Result<Vec<ReminderRecord>>;
    /// Monotonic flip: only ever moves `sent` from false to true.
    async fn mark_reminder_sent(&self, meeting_id: Uuid, at: DateTime<Utc>) -> Result<()>;

    async fn upsert_minutes(&self, record: &MinutesRecord) -> Result<()>;
    async fn minutes(&self, meeting_id: Uuid) -> Result<Option<MinutesRecord>>;
    /// Monotonic flip, mirroring `mark_reminder_sent`.
    async fn mark_minutes_sent(&self, meeting_id: Uuid) -> Result<()>;
}
