//! Durable reminder scheduling, independent of any user session.
//!
//! One scheduler instance exists per process, constructed at bootstrap and
//! handed by reference to anything that needs a manual trigger. The tick loop
//! scans the store for due, unsent reminders and drives distribution;
//! delivery is at-least-once: a failed send stays `sent = false` and the next
//! tick retries it.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::interval;
use uuid::Uuid;

use crate::distribution::{build_reminder_email, has_valid_address, DistributionClient};
use crate::shared::PipelineError;
use crate::store::{Attendee, ReminderRecord, StateStore};

/// Reminders fire this long before the meeting starts.
pub const REMINDER_LEAD_MINS: i64 = 30;
pub const SCHEDULER_TICK_INTERVAL: Duration = Duration::from_secs(60);

enum SchedulerState {
    Stopped,
    Running(JoinHandle<()>),
}

pub struct ReminderScheduler {
    store: Arc<dyn StateStore>,
    distribution: Arc<DistributionClient>,
    tick_interval: Duration,
    state: Mutex<SchedulerState>,
}

impl ReminderScheduler {
    pub fn new(store: Arc<dyn StateStore>, distribution: Arc<DistributionClient>) -> Self {
        Self::with_tick_interval(store, distribution, SCHEDULER_TICK_INTERVAL)
    }

    pub fn with_tick_interval(
        store: Arc<dyn StateStore>,
        distribution: Arc<DistributionClient>,
        tick_interval: Duration,
    ) -> Self {
        Self {
            store,
            distribution,
            tick_interval,
            state: Mutex::new(SchedulerState::Stopped),
        }
    }

    /// Start the tick loop. Idempotent: starting a running scheduler is a
    /// no-op.
    pub fn start(self: &Arc<Self>) {
        let mut state = self.state.lock().expect("scheduler state lock poisoned");
        if matches!(*state, SchedulerState::Running(_)) {
            log::info!("Reminder scheduler is already running");
            return;
        }

        let scheduler = Arc::clone(self);
        let handle = tokio::spawn(async move {
            let mut ticker = interval(scheduler.tick_interval);
            loop {
                ticker.tick().await;
                match scheduler.process_due_reminders().await {
                    Ok(0) => {}
                    Ok(delivered) => log::info!("Delivered {} reminder(s)", delivered),
                    Err(e) => log::error!("Error processing pending reminders: {}", e),
                }
            }
        });
        *state = SchedulerState::Running(handle);
        log::info!("Reminder scheduler started");
    }

    /// Stop the tick loop. Idempotent: stopping a stopped scheduler is a
    /// no-op.
    pub fn stop(&self) {
        let mut state = self.state.lock().expect("scheduler state lock poisoned");
        match std::mem::replace(&mut *state, SchedulerState::Stopped) {
            SchedulerState::Running(handle) => {
                handle.abort();
                log::info!("Reminder scheduler stopped");
            }
            SchedulerState::Stopped => log::info!("Reminder scheduler is not running"),
        }
    }

    pub fn is_running(&self) -> bool {
        matches!(
            *self.state.lock().expect("scheduler state lock poisoned"),
            SchedulerState::Running(_)
        )
    }

    /// Arm (or re-arm) the reminder for a meeting. The fire time is the
    /// meeting start minus the lead; a fire time already in the past creates
    /// no record and reports `false`. Rescheduling upserts, so a meeting has
    /// at most one pending reminder.
    pub async fn schedule_reminder(
        &self,
        meeting_id: Uuid,
        meeting_start: DateTime<Utc>,
    ) -> Result<bool, PipelineError> {
        let fire_time = meeting_start - ChronoDuration::minutes(REMINDER_LEAD_MINS);
        if fire_time <= Utc::now() {
            log::info!(
                "Reminder time for meeting {} is in the past, skipping scheduling",
                meeting_id
            );
            return Ok(false);
        }

        self.store
            .upsert_reminder(&ReminderRecord {
                meeting_id,
                fire_time,
                sent: false,
                sent_at: None,
            })
            .await?;
        log::info!("Reminder scheduled for {}", fire_time.to_rfc3339());
        Ok(true)
    }

    /// One scan over the due, unsent reminders. A single reminder's failure
    /// is contained to that reminder: it is logged, left unsent for the next
    /// tick, and the scan moves on. Returns the number delivered.
    pub async fn process_due_reminders(&self) -> Result<usize, PipelineError> {
        let due = self.store.due_reminders(Utc::now()).await?;
        let mut delivered = 0;

        for record in due {
            match self.deliver(&record).await {
                Ok(true) => delivered += 1,
                Ok(false) => log::warn!(
                    "Reminder for meeting {} left unsent, retrying next tick",
                    record.meeting_id
                ),
                Err(e) => log::error!(
                    "Failed to send reminder for meeting {}: {}",
                    record.meeting_id,
                    e
                ),
            }
        }
        Ok(delivered)
    }

    /// Manual trigger, outside the tick cadence.
    pub async fn run_now(&self) -> Result<usize, PipelineError> {
        log::info!("Manually processing reminders");
        self.process_due_reminders().await
    }

    async fn deliver(&self, record: &ReminderRecord) -> Result<bool, PipelineError> {
        let Some(meeting) = self.store.meeting(record.meeting_id).await? else {
            log::warn!("No meeting found for reminder {}", record.meeting_id);
            return Ok(false);
        };

        let attendees: Vec<Attendee> = meeting
            .attendees
            .iter()
            .filter(|a| has_valid_address(&a.email))
            .cloned()
            .collect();
        if attendees.is_empty() {
            log::warn!("No attendees found for meeting {}", meeting.id);
            return Ok(false);
        }

        let email = build_reminder_email(&meeting);
        let success = self
            .distribution
            .send_reminder(meeting.id, &attendees, &email)
            .await?;
        if success {
            // Confirmed delivery; the flip is monotonic in the store.
            self.store
                .mark_reminder_sent(record.meeting_id, Utc::now())
                .await?;
            log::info!("Reminder sent successfully for meeting: {}", meeting.title);
        }
        Ok(success)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DistributionConfig;
    use crate::store::{Meeting, SqliteStore};

    fn scheduler_with(base_url: String) -> (Arc<ReminderScheduler>, Arc<SqliteStore>) {
        let store = Arc::new(SqliteStore::open_in_memory().unwrap());
        let distribution = Arc::new(DistributionClient::new(&DistributionConfig { base_url }));
        let scheduler = Arc::new(ReminderScheduler::with_tick_interval(
            store.clone(),
            distribution,
            Duration::from_millis(20),
        ));
        (scheduler, store)
    }

    fn meeting_with_attendees(id: Uuid, start: DateTime<Utc>, emails: &[&str]) -> Meeting {
        Meeting {
            id,
            title: "Standup".into(),
            scheduled_at: start,
            duration_mins: 15,
            description: None,
            meeting_link: None,
            attendees: emails
                .iter()
                .map(|e| Attendee {
                    name: e.to_string(),
                    email: e.to_string(),
                    attended: false,
                })
                .collect(),
        }
    }

    #[tokio::test]
    async fn rescheduling_keeps_exactly_one_record_with_the_new_fire_time() {
        let (scheduler, store) = scheduler_with("http://unused.invalid".into());
        let id = Uuid::new_v4();
        let first = Utc::now() + ChronoDuration::hours(1);
        let second = Utc::now() + ChronoDuration::hours(2);

        assert!(scheduler.schedule_reminder(id, first).await.unwrap());
        assert!(scheduler.schedule_reminder(id, second).await.unwrap());

        let record = store.reminder(id).await.unwrap().unwrap();
        let expected = second - ChronoDuration::minutes(REMINDER_LEAD_MINS);
        assert_eq!(record.fire_time.timestamp(), expected.timestamp());
        assert!(!record.sent);
    }

    #[tokio::test]
    async fn imminent_meeting_forfeits_its_reminder() {
        let (scheduler, store) = scheduler_with("http://unused.invalid".into());
        let id = Uuid::new_v4();
        // Starts in 10 minutes: the 30-minute lead is already in the past.
        let start = Utc::now() + ChronoDuration::minutes(10);

        assert!(!scheduler.schedule_reminder(id, start).await.unwrap());
        assert!(store.reminder(id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn successful_send_flips_sent_exactly_once() {
        let mut server = mockito::Server::new_async().await;
        let relay = server
            .mock("POST", "/send-reminder")
            .with_header("content-type", "application/json")
            .with_body(r#"{"success":true}"#)
            .expect(1)
            .create_async()
            .await;

        let (scheduler, store) = scheduler_with(server.url());
        let id = Uuid::new_v4();
        store
            .upsert_meeting(&meeting_with_attendees(
                id,
                Utc::now() + ChronoDuration::minutes(20),
                &["ana@x.com"],
            ))
            .await
            .unwrap();
        store
            .upsert_reminder(&ReminderRecord {
                meeting_id: id,
                fire_time: Utc::now() - ChronoDuration::minutes(1),
                sent: false,
                sent_at: None,
            })
            .await
            .unwrap();

        assert_eq!(scheduler.process_due_reminders().await.unwrap(), 1);
        assert!(store.reminder(id).await.unwrap().unwrap().sent);

        // A later tick finds nothing due and never re-invokes distribution.
        assert_eq!(scheduler.process_due_reminders().await.unwrap(), 0);
        relay.assert_async().await;
    }

    #[tokio::test]
    async fn failed_send_stays_unsent_for_retry() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/send-reminder")
            .with_header("content-type", "application/json")
            .with_body(r#"{"success":false}"#)
            .create_async()
            .await;

        let (scheduler, store) = scheduler_with(server.url());
        let id = Uuid::new_v4();
        store
            .upsert_meeting(&meeting_with_attendees(
                id,
                Utc::now() + ChronoDuration::minutes(20),
                &["ana@x.com"],
            ))
            .await
            .unwrap();
        store
            .upsert_reminder(&ReminderRecord {
                meeting_id: id,
                fire_time: Utc::now() - ChronoDuration::minutes(1),
                sent: false,
                sent_at: None,
            })
            .await
            .unwrap();

        assert_eq!(scheduler.process_due_reminders().await.unwrap(), 0);
        assert!(!store.reminder(id).await.unwrap().unwrap().sent);
    }

    #[tokio::test]
    async fn one_bad_reminder_does_not_block_the_rest_of_the_tick() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/send-reminder")
            .with_header("content-type", "application/json")
            .with_body(r#"{"success":true}"#)
            .expect(1)
            .create_async()
            .await;

        let (scheduler, store) = scheduler_with(server.url());

        // First reminder points at a meeting that does not exist.
        let orphan = Uuid::new_v4();
        store
            .upsert_reminder(&ReminderRecord {
                meeting_id: orphan,
                fire_time: Utc::now() - ChronoDuration::minutes(5),
                sent: false,
                sent_at: None,
            })
            .await
            .unwrap();

        let healthy = Uuid::new_v4();
        store
            .upsert_meeting(&meeting_with_attendees(
                healthy,
                Utc::now() + ChronoDuration::minutes(25),
                &["bob@y.com"],
            ))
            .await
            .unwrap();
        store
            .upsert_reminder(&ReminderRecord {
                meeting_id: healthy,
                fire_time: Utc::now() - ChronoDuration::minutes(1),
                sent: false,
                sent_at: None,
            })
            .await
            .unwrap();

        assert_eq!(scheduler.process_due_reminders().await.unwrap(), 1);
        assert!(store.reminder(healthy).await.unwrap().unwrap().sent);
        assert!(!store.reminder(orphan).await.unwrap().unwrap().sent);
    }

    #[tokio::test]
    async fn attendees_without_valid_addresses_leave_the_reminder_pending() {
        let (scheduler, store) = scheduler_with("http://unused.invalid".into());
        let id = Uuid::new_v4();
        store
            .upsert_meeting(&meeting_with_attendees(
                id,
                Utc::now() + ChronoDuration::minutes(20),
                &["not-an-email"],
            ))
            .await
            .unwrap();
        store
            .upsert_reminder(&ReminderRecord {
                meeting_id: id,
                fire_time: Utc::now() - ChronoDuration::minutes(1),
                sent: false,
                sent_at: None,
            })
            .await
            .unwrap();

        assert_eq!(scheduler.process_due_reminders().await.unwrap(), 0);
        assert!(!store.reminder(id).await.unwrap().unwrap().sent);
    }

    #[tokio::test]
    async fn start_and_stop_are_idempotent() {
        let (scheduler, _store) = scheduler_with("http://unused.invalid".into());
        assert!(!scheduler.is_running());

        scheduler.start();
        scheduler.start();
        assert!(scheduler.is_running());

        scheduler.stop();
        scheduler.stop();
        assert!(!scheduler.is_running());
    }
}
