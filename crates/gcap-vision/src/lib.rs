//! Sparse optical-flow motion estimation for guided capture.
//!
//! This crate provides:
//! - ROI crop / downscale / grayscale preprocessing
//! - Shi-Tomasi corner detection and pyramidal Lucas-Kanade tracking
//! - Exponential smoothing of displacement statistics
//! - Two-threshold hysteresis debouncing of speed and stability warnings
//! - An optional OpenCV tracking backend (feature `opencv`)

pub mod config;
pub mod error;
pub mod estimator;
pub mod features;
pub mod flow;
pub mod hysteresis;
#[cfg(feature = "opencv")]
pub mod opencv_tracker;
pub mod preprocess;
pub mod smoothing;
pub mod tracker;

pub use config::{HysteresisThresholds, MotionConfig};
pub use error::{VisionError, VisionResult};
pub use estimator::{CycleKind, MotionEstimator};
pub use features::Point2;
pub use hysteresis::HysteresisDebouncer;
pub use preprocess::prepare_gray;
pub use smoothing::{Ema, RawMotion};
pub use tracker::{default_tracker, FeatureTracker, NativeTracker};

#[cfg(feature = "opencv")]
pub use opencv_tracker::OpenCvTracker;
