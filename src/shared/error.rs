//! Failure taxonomy for the meeting-artifact pipeline.
//!
//! Every stage failure carries enough context to tell the caller which stage
//! broke and why; artifacts produced before the failure stay available (see
//! `pipeline::PipelineOutcome`). Synthesis degradation is deliberately not
//! represented here: a minutes response that cannot be decoded surfaces as
//! `None` from the synthesis client, never as an error.

use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// The pipeline stages, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Upload,
    Transcription,
    Synthesis,
    Rendering,
    Distribution,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Upload => "upload",
            Stage::Transcription => "transcription",
            Stage::Synthesis => "synthesis",
            Stage::Rendering => "rendering",
            Stage::Distribution => "distribution",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error)]
pub enum PipelineError {
    /// Transport or server failure during media transfer or status polling.
    #[error("upload failed: {0}")]
    Upload(String),

    /// The transcription poll ceiling was exceeded. The provider job may
    /// still finish server-side; it is simply no longer observed.
    #[error("transcription timed out after {0} seconds")]
    TranscriptionTimeout(u64),

    /// The transcription provider reported a terminal failure.
    #[error("transcription failed: {0}")]
    TranscriptionFailed(String),

    #[error("document rendering failed: {0}")]
    Rendering(String),

    /// All-or-nothing transport failure for a single distribution call.
    #[error("distribution failed: {0}")]
    Distribution(String),

    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

impl PipelineError {
    /// The stage this error belongs to, when it maps onto one.
    pub fn stage(&self) -> Option<Stage> {
        match self {
            PipelineError::Upload(_) => Some(Stage::Upload),
            PipelineError::TranscriptionTimeout(_) | PipelineError::TranscriptionFailed(_) => {
                Some(Stage::Transcription)
            }
            PipelineError::Rendering(_) => Some(Stage::Rendering),
            PipelineError::Distribution(_) => Some(Stage::Distribution),
            PipelineError::Http(_) | PipelineError::Store(_) => None,
        }
    }
}
