//! SQLite-backed `StateStore`.
//!
//! The connection lives behind a mutex; every operation is a short point
//! read/write, so nothing holds the lock across an await point.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde_json::Value;
use std::path::Path;
use std::sync::Mutex;
use uuid::Uuid;

use super::models::{Attendee, MediaAsset, Meeting, MinutesRecord, ReminderRecord};
use super::StateStore;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS meetings (
    id            TEXT PRIMARY KEY,
    title         TEXT NOT NULL,
    scheduled_at  TEXT NOT NULL,
    duration_mins INTEGER NOT NULL,
    description   TEXT,
    meeting_link  TEXT,
    attendees     TEXT NOT NULL DEFAULT '[]'
);

CREATE TABLE IF NOT EXISTS media_assets (
    id                TEXT PRIMARY KEY,
    meeting_id        TEXT NOT NULL,
    storage_locator   TEXT NOT NULL,
    original_filename TEXT NOT NULL,
    byte_size         INTEGER NOT NULL,
    uploaded_at       TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS meeting_reminders (
    meeting_id TEXT PRIMARY KEY,
    fire_time  TEXT NOT NULL,
    sent       INTEGER NOT NULL DEFAULT 0,
    sent_at    TEXT
);

CREATE TABLE IF NOT EXISTS meeting_minutes (
    meeting_id        TEXT PRIMARY KEY,
    transcript        TEXT NOT NULL,
    summary           TEXT NOT NULL,
    full_minutes_json TEXT NOT NULL,
    sent              INTEGER NOT NULL DEFAULT 0
);
"#;

pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create database directory")?;
        }
        let conn = Connection::open(path).context("Failed to open database")?;
        Self::init(conn)
    }

    /// Ephemeral store, used by tests.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("Failed to open in-memory database")?;
        Self::init(conn)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute("PRAGMA foreign_keys = ON", [])
            .context("Failed to enable foreign keys")?;
        conn.execute_batch(SCHEMA)
            .context("Failed to run database migrations")?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn with_connection<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T>,
    {
        let conn = self
            .conn
            .lock()
            .map_err(|e| anyhow!("Failed to lock database connection: {}", e))?;
        f(&conn)
    }
}

fn parse_ts(raw: String) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(&raw)
        .map(|dt| dt.with_timezone(&Utc))
        .with_context(|| format!("Invalid stored timestamp: {raw}"))
}

fn parse_id(raw: String) -> Result<Uuid> {
    Uuid::parse_str(&raw).with_context(|| format!("Invalid stored id: {raw}"))
}

fn reminder_from_row(row: &Row<'_>) -> rusqlite::Result<(String, String, bool, Option<String>)> {
    Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
}

fn build_reminder(raw: (String, String, bool, Option<String>)) -> Result<ReminderRecord> {
    Ok(ReminderRecord {
        meeting_id: parse_id(raw.0)?,
        fire_time: parse_ts(raw.1)?,
        sent: raw.2,
        sent_at: raw.3.map(parse_ts).transpose()?,
    })
}

#[async_trait]
impl StateStore for SqliteStore {
    async fn upsert_meeting(&self, meeting: &Meeting) -> Result<()> {
        let attendees = serde_json::to_string(&meeting.attendees)?;
        self.with_connection(|conn| {
            conn.execute(
                r#"
                INSERT INTO meetings (id, title, scheduled_at, duration_mins, description, meeting_link, attendees)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                ON CONFLICT(id) DO UPDATE SET
                    title = excluded.title,
                    scheduled_at = excluded.scheduled_at,
                    duration_mins = excluded.duration_mins,
                    description = excluded.description,
                    meeting_link = excluded.meeting_link,
                    attendees = excluded.attendees
                "#,
                params![
                    meeting.id.to_string(),
                    meeting.title,
                    meeting.scheduled_at.to_rfc3339(),
                    meeting.duration_mins,
                    meeting.description,
                    meeting.meeting_link,
                    attendees,
                ],
            )
            .context("Failed to upsert meeting")?;
            Ok(())
        })
    }

    async fn meeting(&self, id: Uuid) -> Result<Option<Meeting>> {
        self.with_connection(|conn| {
            let row: Option<(String, String, String, i64, Option<String>, Option<String>, String)> =
                conn.query_row(
                    "SELECT id, title, scheduled_at, duration_mins, description, meeting_link, attendees
                     FROM meetings WHERE id = ?1",
                    params![id.to_string()],
                    |row| {
                        Ok((
                            row.get(0)?,
                            row.get(1)?,
                            row.get(2)?,
                            row.get(3)?,
                            row.get(4)?,
                            row.get(5)?,
                            row.get(6)?,
                        ))
                    },
                )
                .optional()
                .context("Failed to load meeting")?;

            row.map(|(id, title, scheduled_at, duration_mins, description, meeting_link, attendees)| {
                // Attendees are stored as loose JSON; normalize here so the
                // rest of the pipeline only ever sees validated entries.
                let raw: Value = serde_json::from_str(&attendees).unwrap_or(Value::Null);
                Ok(Meeting {
                    id: parse_id(id)?,
                    title,
                    scheduled_at: parse_ts(scheduled_at)?,
                    duration_mins,
                    description,
                    meeting_link,
                    attendees: Attendee::normalize_list(&raw),
                })
            })
            .transpose()
        })
    }

    async fn insert_media_asset(&self, asset: &MediaAsset) -> Result<()> {
        self.with_connection(|conn| {
            conn.execute(
                r#"
                INSERT INTO media_assets (id, meeting_id, storage_locator, original_filename, byte_size, uploaded_at)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                "#,
                params![
                    asset.id.to_string(),
                    asset.meeting_id.to_string(),
                    asset.storage_locator,
                    asset.original_filename,
                    asset.byte_size as i64,
                    asset.uploaded_at.to_rfc3339(),
                ],
            )
            .context("Failed to insert media asset")?;
            Ok(())
        })
    }

    async fn delete_media_asset(&self, id: Uuid) -> Result<()> {
        self.with_connection(|conn| {
            conn.execute(
                "DELETE FROM media_assets WHERE id = ?1",
                params![id.to_string()],
            )
            .context("Failed to delete media asset")?;
            Ok(())
        })
    }

    async fn media_assets(&self, meeting_id: Uuid) -> Result<Vec<MediaAsset>> {
        self.with_connection(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, meeting_id, storage_locator, original_filename, byte_size, uploaded_at
                 FROM media_assets WHERE meeting_id = ?1 ORDER BY uploaded_at",
            )?;
            let rows = stmt
                .query_map(params![meeting_id.to_string()], |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?,
                        row.get::<_, i64>(4)?,
                        row.get::<_, String>(5)?,
                    ))
                })
                .context("Failed to query media assets")?;

            let mut assets = Vec::new();
            for row in rows {
                let (id, meeting_id, locator, filename, size, uploaded_at) = row?;
                assets.push(MediaAsset {
                    id: parse_id(id)?,
                    meeting_id: parse_id(meeting_id)?,
                    storage_locator: locator,
                    original_filename: filename,
                    byte_size: size as u64,
                    uploaded_at: parse_ts(uploaded_at)?,
                });
            }
            Ok(assets)
        })
    }

    async fn upsert_reminder(&self, record: &ReminderRecord) -> Result<()> {
        self.with_connection(|conn| {
            conn.execute(
                r#"
                INSERT INTO meeting_reminders (meeting_id, fire_time, sent, sent_at)
                VALUES (?1, ?2, ?3, ?4)
                ON CONFLICT(meeting_id) DO UPDATE SET
                    fire_time = excluded.fire_time,
                    sent = excluded.sent,
                    sent_at = excluded.sent_at
                "#,
                params![
                    record.meeting_id.to_string(),
                    record.fire_time.to_rfc3339(),
                    record.sent,
                    record.sent_at.map(|t| t.to_rfc3339()),
                ],
            )
            .context("Failed to upsert reminder")?;
            Ok(())
        })
    }

    async fn reminder(&self, meeting_id: Uuid) -> Result<Option<ReminderRecord>> {
        self.with_connection(|conn| {
            conn.query_row(
                "SELECT meeting_id, fire_time, sent, sent_at FROM meeting_reminders WHERE meeting_id = ?1",
                params![meeting_id.to_string()],
                reminder_from_row,
            )
            .optional()
            .context("Failed to load reminder")?
            .map(build_reminder)
            .transpose()
        })
    }

    async fn due_reminders(&self, now: DateTime<Utc>) -> Result<Vec<ReminderRecord>> {
        self.with_connection(|conn| {
            let mut stmt = conn.prepare(
                "SELECT meeting_id, fire_time, sent, sent_at FROM meeting_reminders
                 WHERE sent = 0 AND fire_time <= ?1 ORDER BY fire_time",
            )?;
            let rows = stmt
                .query_map(params![now.to_rfc3339()], reminder_from_row)
                .context("Failed to query due reminders")?;

            let mut due = Vec::new();
            for row in rows {
                due.push(build_reminder(row?)?);
            }
            Ok(due)
        })
    }

    async fn mark_reminder_sent(&self, meeting_id: Uuid, at: DateTime<Utc>) -> Result<()> {
        self.with_connection(|conn| {
            // The sent flag is monotonic; the guard keeps an already-sent
            // record from being rewritten.
            conn.execute(
                "UPDATE meeting_reminders SET sent = 1, sent_at = ?2 WHERE meeting_id = ?1 AND sent = 0",
                params![meeting_id.to_string(), at.to_rfc3339()],
            )
            .context("Failed to mark reminder sent")?;
            Ok(())
        })
    }

    async fn upsert_minutes(&self, record: &MinutesRecord) -> Result<()> {
        self.with_connection(|conn| {
            conn.execute(
                r#"
                INSERT INTO meeting_minutes (meeting_id, transcript, summary, full_minutes_json, sent)
                VALUES (?1, ?2, ?3, ?4, ?5)
                ON CONFLICT(meeting_id) DO UPDATE SET
                    transcript = excluded.transcript,
                    summary = excluded.summary,
                    full_minutes_json = excluded.full_minutes_json,
                    sent = excluded.sent
                "#,
                params![
                    record.meeting_id.to_string(),
                    record.transcript,
                    record.summary,
                    record.full_minutes_json,
                    record.sent,
                ],
            )
            .context("Failed to upsert minutes")?;
            Ok(())
        })
    }

    async fn minutes(&self, meeting_id: Uuid) -> Result<Option<MinutesRecord>> {
        self.with_connection(|conn| {
            conn.query_row(
                "SELECT meeting_id, transcript, summary, full_minutes_json, sent
                 FROM meeting_minutes WHERE meeting_id = ?1",
                params![meeting_id.to_string()],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?,
                        row.get::<_, bool>(4)?,
                    ))
                },
            )
            .optional()
            .context("Failed to load minutes")?
            .map(|(id, transcript, summary, full_minutes_json, sent)| {
                Ok(MinutesRecord {
                    meeting_id: parse_id(id)?,
                    transcript,
                    summary,
                    full_minutes_json,
                    sent,
                })
            })
            .transpose()
        })
    }

    async fn mark_minutes_sent(&self, meeting_id: Uuid) -> Result<()> {
        self.with_connection(|conn| {
            conn.execute(
                "UPDATE meeting_minutes SET sent = 1 WHERE meeting_id = ?1 AND sent = 0",
                params![meeting_id.to_string()],
            )
            .context("Failed to mark minutes sent")?;
            Ok(())
        })
    }
}
