//! Shared value types for guided capture.
//!
//! This crate provides Serde-serializable types for:
//! - Smoothed motion snapshots produced by the motion estimator
//! - Guidance verdicts (prompt + color class) for the presentation layer
//! - Capture trigger events

pub mod capture;
pub mod guidance;
pub mod motion;

// Re-export common types
pub use capture::CaptureEvent;
pub use guidance::{GuidanceColor, GuidanceKind, GuidanceResult};
pub use motion::MotionState;
