pub mod config;
pub mod distribution;
pub mod pipeline;
pub mod render;
pub mod scheduler;
pub mod shared;
pub mod store;
pub mod synthesis;
pub mod transcription;
pub mod upload;

pub use config::AppConfig;
pub use pipeline::{MeetingProcessor, PipelineOutcome};
pub use scheduler::ReminderScheduler;
pub use shared::{PipelineError, Stage};
pub use store::{SqliteStore, StateStore};
