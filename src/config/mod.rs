//! Environment-driven configuration, one section per external collaborator.

use dotenvy::dotenv;
use serde::Deserialize;
use std::env;
use std::path::PathBuf;

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub store: StoreConfig,
    pub upload: UploadConfig,
    pub transcription: TranscriptionConfig,
    pub synthesis: SynthesisConfig,
    pub distribution: DistributionConfig,
    pub scheduler: SchedulerConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    pub path: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UploadConfig {
    pub base_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TranscriptionConfig {
    pub base_url: String,
    /// Provider authorization token, sent as the `authorization` header when
    /// present.
    pub api_key: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SynthesisConfig {
    pub base_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DistributionConfig {
    pub base_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SchedulerConfig {
    pub tick_secs: u64,
}

fn var_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

impl AppConfig {
    pub fn load() -> anyhow::Result<Self> {
        dotenv().ok();

        Ok(Self {
            store: StoreConfig {
                path: PathBuf::from(var_or("MOMSERVER_DB_PATH", "momserver.db")),
            },
            upload: UploadConfig {
                base_url: var_or("UPLOAD_BASE_URL", "http://localhost:5000"),
            },
            transcription: TranscriptionConfig {
                base_url: var_or("TRANSCRIBE_BASE_URL", "http://localhost:5000"),
                api_key: env::var("TRANSCRIBE_API_KEY").ok(),
            },
            synthesis: SynthesisConfig {
                base_url: var_or("SYNTHESIS_BASE_URL", "http://localhost:5000"),
            },
            distribution: DistributionConfig {
                base_url: var_or("DISTRIBUTION_BASE_URL", "http://localhost:5000"),
            },
            scheduler: SchedulerConfig {
                tick_secs: var_or("SCHEDULER_TICK_SECS", "60").parse()?,
            },
        })
    }

    /// Point every collaborator at one base URL. Meant for tests driving a
    /// single stub server.
    pub fn for_base_url(base_url: &str) -> Self {
        Self {
            store: StoreConfig {
                path: PathBuf::from(":memory:"),
            },
            upload: UploadConfig {
                base_url: base_url.to_string(),
            },
            transcription: TranscriptionConfig {
                base_url: base_url.to_string(),
                api_key: None,
            },
            synthesis: SynthesisConfig {
                base_url: base_url.to_string(),
            },
            distribution: DistributionConfig {
                base_url: base_url.to_string(),
            },
            scheduler: SchedulerConfig { tick_secs: 60 },
        }
    }
}
