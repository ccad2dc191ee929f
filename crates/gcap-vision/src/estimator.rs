//! Per-cycle motion estimation from camera frames.
//!
//! Each call to [`MotionEstimator::process`] runs one cycle:
//!
//! 1. ROI crop, nearest-neighbour downscale, grayscale
//! 2. Re-detect features when none survive (or too few)
//! 3. Every `lk_every_n` cycles, track features into the new frame;
//!    other cycles reuse the previous raw statistics verbatim
//! 4. Exponentially smooth the raw mean / std-dev
//! 5. Feed the speed and stability debouncers
//!
//! Nothing in a cycle is fatal. Empty frames, a degenerate ROI, tracker
//! errors and collapsed feature sets all degrade to zero raw displacement
//! and force re-detection on the following cycle.

use gcap_models::MotionState;
use image::{GrayImage, RgbImage};
use serde::Serialize;
use tracing::{debug, trace, warn};

use crate::config::MotionConfig;
use crate::error::VisionResult;
use crate::features::Point2;
use crate::hysteresis::HysteresisDebouncer;
use crate::preprocess::prepare_gray;
use crate::smoothing::{Ema, RawMotion};
use crate::tracker::{default_tracker, FeatureTracker};

/// Consecutive degraded cycles (no successful tracking in between) before a warning.
const DEGRADED_STREAK_WARN: u32 = 10;

/// What happened during the most recent cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CycleKind {
    /// A fresh feature set was detected; raw displacement is zero.
    Detected { features: usize },
    /// Optical flow ran and enough features survived.
    Tracked { matched: usize },
    /// Optical flow ran but too few features survived; set dropped.
    TrackingLost { matched: usize },
    /// Off-cadence cycle; previous raw statistics reused.
    Reused,
    /// The frame could not be prepared.
    Skipped,
}

impl CycleKind {
    /// Cycles where no usable motion could be measured.
    pub fn is_degraded(&self) -> bool {
        matches!(self, CycleKind::Skipped | CycleKind::TrackingLost { .. })
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CycleKind::Detected { .. } => "detected",
            CycleKind::Tracked { .. } => "tracked",
            CycleKind::TrackingLost { .. } => "tracking_lost",
            CycleKind::Reused => "reused",
            CycleKind::Skipped => "skipped",
        }
    }
}

/// Smoothed motion estimator with debounced speed/stability warnings.
///
/// Owned by a single thread; all state is plain data.
pub struct MotionEstimator {
    config: MotionConfig,
    tracker: Box<dyn FeatureTracker>,
    prev_gray: Option<GrayImage>,
    features: Option<Vec<Point2>>,
    last_raw: RawMotion,
    mu: Ema,
    sigma: Ema,
    speed: HysteresisDebouncer,
    stability: HysteresisDebouncer,
    iteration: u64,
    last_cycle: Option<CycleKind>,
    degraded_streak: u32,
}

impl MotionEstimator {
    /// Create an estimator with the default tracking backend.
    pub fn new(config: MotionConfig) -> VisionResult<Self> {
        let tracker = default_tracker(&config);
        Self::with_tracker(config, tracker)
    }

    /// Create an estimator with an explicit tracking backend.
    pub fn with_tracker(config: MotionConfig, tracker: Box<dyn FeatureTracker>) -> VisionResult<Self> {
        config.validate()?;
        debug!(backend = tracker.name(), "Motion estimator created");
        Ok(Self {
            mu: Ema::new(config.smoothing_factor),
            sigma: Ema::new(config.smoothing_factor),
            speed: HysteresisDebouncer::new(config.speed, config.confirm_count),
            stability: HysteresisDebouncer::new(config.stability, config.confirm_count),
            config,
            tracker,
            prev_gray: None,
            features: None,
            last_raw: RawMotion::ZERO,
            iteration: 0,
            last_cycle: None,
            degraded_streak: 0,
        })
    }

    /// Run one cycle on a full-resolution camera frame.
    pub fn process(&mut self, frame: &RgbImage) -> MotionState {
        match prepare_gray(frame, &self.config) {
            Ok(gray) => self.process_gray(gray),
            Err(e) => {
                debug!(error = %e, "Frame preprocessing failed, treating cycle as still");
                self.prev_gray = None;
                self.features = None;
                self.finish_cycle(RawMotion::ZERO, CycleKind::Skipped)
            }
        }
    }

    /// Run one cycle on an already prepared (cropped, downscaled) frame.
    pub fn process_gray(&mut self, gray: GrayImage) -> MotionState {
        let (raw, kind) = self.estimate_raw(&gray);
        self.prev_gray = Some(gray);
        self.finish_cycle(raw, kind)
    }

    fn estimate_raw(&mut self, gray: &GrayImage) -> (RawMotion, CycleKind) {
        let needs_detection = match (&self.prev_gray, &self.features) {
            (Some(prev), Some(features)) => {
                features.len() < self.config.min_features || prev.dimensions() != gray.dimensions()
            }
            _ => true,
        };

        if needs_detection {
            return match self.tracker.detect(gray) {
                Ok(points) => {
                    let count = points.len();
                    self.features = Some(points);
                    (RawMotion::ZERO, CycleKind::Detected { features: count })
                }
                Err(e) => {
                    debug!(error = %e, "Feature detection failed");
                    self.features = None;
                    (RawMotion::ZERO, CycleKind::Detected { features: 0 })
                }
            };
        }

        if self.iteration % self.config.lk_every_n != 0 {
            return (self.last_raw, CycleKind::Reused);
        }

        let (Some(prev), Some(features)) = (&self.prev_gray, &self.features) else {
            return (RawMotion::ZERO, CycleKind::Skipped);
        };

        let tracked = match self.tracker.track(prev, gray, features) {
            Ok(tracked) => tracked,
            Err(e) => {
                debug!(error = %e, "Feature tracking failed");
                self.features = None;
                return (RawMotion::ZERO, CycleKind::TrackingLost { matched: 0 });
            }
        };

        let pairs: Vec<(Point2, Point2)> = features
            .iter()
            .zip(tracked)
            .filter_map(|(old, new)| new.map(|new| (*old, new)))
            .collect();
        let matched = pairs.len();

        if matched < self.config.min_features {
            self.features = None;
            return (RawMotion::ZERO, CycleKind::TrackingLost { matched });
        }

        let raw = RawMotion::from_pairs(&pairs);
        self.features = Some(pairs.into_iter().map(|(_, new)| new).collect());
        (raw, CycleKind::Tracked { matched })
    }

    fn finish_cycle(&mut self, raw: RawMotion, kind: CycleKind) -> MotionState {
        self.last_raw = raw;
        self.last_cycle = Some(kind);
        self.track_degraded(kind);

        let mu = self.mu.update(raw.mean);
        let sigma = self.sigma.update(raw.std_dev);
        let speed_warning = self.speed.update(mu);
        let stability_warning = self.stability.update(sigma);

        trace!(
            iteration = self.iteration,
            kind = kind.as_str(),
            raw_mean = raw.mean,
            raw_std = raw.std_dev,
            mu,
            sigma,
            speed_warning,
            stability_warning,
            "Motion cycle"
        );
        metrics::counter!("gcap_motion_cycles_total", "kind" => kind.as_str()).increment(1);
        metrics::gauge!("gcap_motion_mu").set(mu);
        metrics::gauge!("gcap_motion_sigma").set(sigma);

        self.iteration += 1;
        MotionState::new(mu, sigma, speed_warning, stability_warning)
    }

    fn track_degraded(&mut self, kind: CycleKind) {
        if kind.is_degraded() {
            self.degraded_streak += 1;
            if self.degraded_streak == DEGRADED_STREAK_WARN {
                warn!(
                    cycles = self.degraded_streak,
                    kind = kind.as_str(),
                    backend = self.tracker.name(),
                    "Motion estimate degraded, reporting the scene as still"
                );
            }
        } else if matches!(kind, CycleKind::Tracked { .. }) {
            if self.degraded_streak >= DEGRADED_STREAK_WARN {
                debug!(cycles = self.degraded_streak, "Motion tracking recovered");
            }
            self.degraded_streak = 0;
        }
    }

    /// Forget all temporal state, as if freshly constructed.
    pub fn reset(&mut self) {
        self.prev_gray = None;
        self.features = None;
        self.last_raw = RawMotion::ZERO;
        self.mu.reset();
        self.sigma.reset();
        self.speed.reset();
        self.stability.reset();
        self.iteration = 0;
        self.last_cycle = None;
        self.degraded_streak = 0;
    }

    pub fn config(&self) -> &MotionConfig {
        &self.config
    }

    pub fn last_cycle(&self) -> Option<CycleKind> {
        self.last_cycle
    }

    /// Raw statistics used by the most recent cycle.
    pub fn last_raw(&self) -> RawMotion {
        self.last_raw
    }

    /// Current feature set, empty when re-detection is pending.
    pub fn features(&self) -> &[Point2] {
        self.features.as_deref().unwrap_or(&[])
    }

    /// Degraded cycles since the last successful tracking cycle.
    pub fn degraded_streak(&self) -> u32 {
        self.degraded_streak
    }

    /// Number of completed cycles since creation or the last reset.
    pub fn iteration(&self) -> u64 {
        self.iteration
    }
}
