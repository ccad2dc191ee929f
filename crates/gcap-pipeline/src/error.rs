//! Pipeline errors.

use gcap_vision::VisionError;
use thiserror::Error;

/// Result type for pipeline operations.
pub type PipelineResult<T> = Result<T, PipelineError>;

/// Errors surfaced to the owner of a [`GuidancePipeline`](crate::GuidancePipeline).
///
/// Per-frame problems never show up here; the workers absorb them.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Vision error: {0}")]
    Vision(#[from] VisionError),

    #[error("Pipeline has been stopped and cannot be restarted")]
    Stopped,

    #[error("Failed to spawn worker thread: {0}")]
    ThreadSpawn(#[source] std::io::Error),
}

impl PipelineError {
    /// Create an invalid-config error.
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig(message.into())
    }
}
