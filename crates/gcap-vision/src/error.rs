//! Error types for motion estimation.

use thiserror::Error;

/// Result type for vision operations.
pub type VisionResult<T> = Result<T, VisionError>;

/// Errors raised inside a single estimation cycle.
///
/// None of these escape the motion worker; each one degrades the cycle to
/// zero raw displacement or forces re-detection on the next cycle.
#[derive(Debug, Error)]
pub enum VisionError {
    #[error("Invalid motion config: {0}")]
    InvalidConfig(String),

    #[error("Empty frame")]
    EmptyFrame,

    #[error("Region of interest is degenerate: {0}")]
    DegenerateRoi(String),

    #[error("Frame size changed from {prev:?} to {next:?}")]
    SizeMismatch {
        prev: (usize, usize),
        next: (usize, usize),
    },

    #[cfg(feature = "opencv")]
    #[error("OpenCV error: {0}")]
    OpenCv(#[from] opencv::Error),
}

impl VisionError {
    /// Create an invalid-config error.
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig(message.into())
    }

    /// Create a degenerate-ROI error.
    pub fn degenerate_roi(message: impl Into<String>) -> Self {
        Self::DegenerateRoi(message.into())
    }
}
