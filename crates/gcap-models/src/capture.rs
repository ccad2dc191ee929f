//! Capture trigger event.

use serde::{Deserialize, Serialize};

use crate::motion::MotionState;

/// Passed to the capture callback each time the trigger fires.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CaptureEvent {
    /// 1-based trigger count for the lifetime of the pipeline.
    pub sequence: u64,
    /// Motion snapshot that satisfied the capture gates.
    pub motion: MotionState,
}
