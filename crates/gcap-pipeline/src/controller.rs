//! Stability timer, cooldown and guidance verdict for one motion snapshot.

use std::time::Instant;

use gcap_models::{CaptureEvent, GuidanceKind, GuidanceResult, MotionState};
use tracing::debug;

use crate::config::GuidanceConfig;

/// Result of evaluating one motion snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct GuidanceOutcome {
    /// `None` while processing is inactive.
    pub result: Option<GuidanceResult>,
    /// Set when the capture trigger fired this cycle.
    pub capture: Option<CaptureEvent>,
}

impl GuidanceOutcome {
    fn inactive() -> Self {
        Self {
            result: None,
            capture: None,
        }
    }
}

/// Capture timing state owned by the guidance worker.
///
/// Time is passed in explicitly so the rules can be driven by any clock.
#[derive(Debug, Clone)]
pub struct GuidanceController {
    config: GuidanceConfig,
    stable_since: Option<Instant>,
    last_capture: Option<Instant>,
    was_active: bool,
    captures: u64,
}

impl GuidanceController {
    pub fn new(config: GuidanceConfig) -> Self {
        Self {
            config,
            stable_since: None,
            last_capture: None,
            was_active: false,
            captures: 0,
        }
    }

    /// Evaluate one snapshot at time `now`.
    pub fn evaluate(&mut self, motion: MotionState, active: bool, now: Instant) -> GuidanceOutcome {
        if !active {
            self.was_active = false;
            return GuidanceOutcome::inactive();
        }
        if !self.was_active {
            // New scanning phase; the cooldown carries over.
            self.stable_since = None;
            self.was_active = true;
        }

        let is_stable = motion.mu < self.config.capture_speed_threshold
            && motion.sigma < self.config.capture_stability_threshold;

        let mut is_arming = false;
        let mut capture = None;

        if is_stable {
            let since = *self.stable_since.get_or_insert(now);
            if now.saturating_duration_since(since) >= self.config.capture_delay {
                is_arming = true;
                if self.config.auto_capture_enabled && self.cooldown_elapsed(now) {
                    self.captures += 1;
                    self.last_capture = Some(now);
                    self.stable_since = None;
                    is_arming = false;
                    debug!(
                        sequence = self.captures,
                        mu = motion.mu,
                        sigma = motion.sigma,
                        "Capture gates passed"
                    );
                    capture = Some(CaptureEvent {
                        sequence: self.captures,
                        motion,
                    });
                }
            }
        } else {
            self.stable_since = None;
        }

        let kind = GuidanceKind::resolve(&motion, is_arming);
        GuidanceOutcome {
            result: Some(GuidanceResult::new(kind, motion)),
            capture,
        }
    }

    fn cooldown_elapsed(&self, now: Instant) -> bool {
        self.last_capture
            .map_or(true, |last| now.saturating_duration_since(last) >= self.config.capture_cooldown)
    }

    pub fn config(&self) -> &GuidanceConfig {
        &self.config
    }

    /// Start of the current stable run, if any.
    pub fn stable_since(&self) -> Option<Instant> {
        self.stable_since
    }

    pub fn last_capture(&self) -> Option<Instant> {
        self.last_capture
    }

    /// Total captures fired.
    pub fn captures(&self) -> u64 {
        self.captures
    }
}
