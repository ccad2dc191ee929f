//! Threaded motion-guidance pipeline.
//!
//! This crate provides:
//! - A latest-wins [`Mailbox`] for hand-off between threads
//! - The [`GuidanceController`] stability timer and capture cooldown
//! - The motion and guidance worker threads
//! - The [`GuidancePipeline`] facade used by the camera layer

pub mod clock;
pub mod config;
pub mod controller;
pub mod error;
pub mod mailbox;
pub mod metrics;
pub mod pipeline;
mod worker;

pub use clock::{Clock, ManualClock, MonotonicClock};
pub use config::{GuidanceConfig, PipelineConfig};
pub use controller::{GuidanceController, GuidanceOutcome};
pub use error::{PipelineError, PipelineResult};
pub use mailbox::Mailbox;
pub use pipeline::{CaptureCallback, FrameSource, GuidanceCallback, GuidancePipeline};

pub use gcap_models::{CaptureEvent, GuidanceColor, GuidanceKind, GuidanceResult, MotionState};
