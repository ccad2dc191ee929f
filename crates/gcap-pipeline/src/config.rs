//! Pipeline configuration.

use std::str::FromStr;
use std::time::Duration;

use gcap_vision::{HysteresisThresholds, MotionConfig};
use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, PipelineResult};

/// Capture trigger settings for the guidance worker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GuidanceConfig {
    /// Smoothed mean must be strictly below this to count as stable (default: 4.0)
    pub capture_speed_threshold: f64,

    /// Smoothed std-dev must be strictly below this to count as stable (default: 3.0)
    pub capture_stability_threshold: f64,

    /// Continuous stability required before capture (default: 500ms)
    pub capture_delay: Duration,

    /// Minimum time between two captures (default: 1.5s)
    pub capture_cooldown: Duration,

    /// Fire the capture trigger at all; arming is still shown when off (default: true)
    pub auto_capture_enabled: bool,
}

impl Default for GuidanceConfig {
    fn default() -> Self {
        Self {
            capture_speed_threshold: 4.0,
            capture_stability_threshold: 3.0,
            capture_delay: Duration::from_millis(500),
            capture_cooldown: Duration::from_millis(1500),
            auto_capture_enabled: true,
        }
    }
}

impl GuidanceConfig {
    pub fn validate(&self) -> PipelineResult<()> {
        if !(self.capture_speed_threshold > 0.0) {
            return Err(PipelineError::invalid_config(
                "capture_speed_threshold must be positive",
            ));
        }
        if !(self.capture_stability_threshold > 0.0) {
            return Err(PipelineError::invalid_config(
                "capture_stability_threshold must be positive",
            ));
        }
        Ok(())
    }
}

/// Full pipeline configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub motion: MotionConfig,
    pub guidance: GuidanceConfig,
}

impl PipelineConfig {
    /// Load from `GCAP_*` environment variables. Unset or unparsable values
    /// keep their defaults.
    pub fn from_env() -> Self {
        let motion = MotionConfig::default();
        let guidance = GuidanceConfig::default();

        Self {
            motion: MotionConfig {
                target_width: env_or("GCAP_TARGET_WIDTH", motion.target_width),
                max_features: env_or("GCAP_MAX_FEATURES", motion.max_features),
                min_features: env_or("GCAP_MIN_FEATURES", motion.min_features),
                corner_quality: env_or("GCAP_CORNER_QUALITY", motion.corner_quality),
                min_corner_distance: env_or("GCAP_MIN_CORNER_DISTANCE", motion.min_corner_distance),
                lk_every_n: env_or("GCAP_LK_EVERY_N", motion.lk_every_n),
                lk_window: env_or("GCAP_LK_WINDOW", motion.lk_window),
                lk_max_level: env_or("GCAP_LK_MAX_LEVEL", motion.lk_max_level),
                smoothing_factor: env_or("GCAP_SMOOTHING_FACTOR", motion.smoothing_factor),
                speed: HysteresisThresholds::new(
                    env_or("GCAP_SPEED_ENTER", motion.speed.enter),
                    env_or("GCAP_SPEED_CLEAR", motion.speed.clear),
                ),
                stability: HysteresisThresholds::new(
                    env_or("GCAP_STABILITY_ENTER", motion.stability.enter),
                    env_or("GCAP_STABILITY_CLEAR", motion.stability.clear),
                ),
                confirm_count: env_or("GCAP_CONFIRM_COUNT", motion.confirm_count),
                ..motion
            },
            guidance: GuidanceConfig {
                capture_speed_threshold: env_or(
                    "GCAP_CAPTURE_SPEED_THRESHOLD",
                    guidance.capture_speed_threshold,
                ),
                capture_stability_threshold: env_or(
                    "GCAP_CAPTURE_STABILITY_THRESHOLD",
                    guidance.capture_stability_threshold,
                ),
                capture_delay: Duration::from_millis(env_or(
                    "GCAP_CAPTURE_DELAY_MS",
                    guidance.capture_delay.as_millis() as u64,
                )),
                capture_cooldown: Duration::from_millis(env_or(
                    "GCAP_CAPTURE_COOLDOWN_MS",
                    guidance.capture_cooldown.as_millis() as u64,
                )),
                auto_capture_enabled: env_or("GCAP_AUTO_CAPTURE", guidance.auto_capture_enabled),
            },
        }
    }

    pub fn validate(&self) -> PipelineResult<()> {
        self.motion.validate()?;
        self.guidance.validate()
    }
}

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|s| s.trim().parse().ok())
        .unwrap_or(default)
}
