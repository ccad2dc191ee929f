//! Configuration for the motion estimator.

use serde::{Deserialize, Serialize};

use crate::error::{VisionError, VisionResult};

/// Enter/clear thresholds for one debounced warning signal.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HysteresisThresholds {
    /// Value at or above which a sample counts towards raising the warning.
    pub enter: f64,
    /// Value at or below which a sample counts towards clearing the warning.
    pub clear: f64,
}

impl HysteresisThresholds {
    pub const fn new(enter: f64, clear: f64) -> Self {
        Self { enter, clear }
    }
}

/// Configuration for the motion estimator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MotionConfig {
    // === Preprocessing ===
    /// Width of the downscaled analysis frame in pixels (default: 480)
    pub target_width: u32,

    /// Vertical ROI as fractions of frame height (default: 0.2..0.8)
    pub roi_vertical: (f64, f64),

    /// Horizontal ROI as fractions of frame width (default: 0.15..0.85)
    pub roi_horizontal: (f64, f64),

    // === Feature maintenance ===
    /// Maximum corners returned by re-detection (default: 100)
    pub max_features: usize,

    /// Minimum surviving features before re-detection (default: 40)
    pub min_features: usize,

    /// Corner quality relative to the strongest corner (default: 0.01)
    pub corner_quality: f64,

    /// Minimum distance between detected corners in pixels (default: 8.0)
    pub min_corner_distance: f64,

    /// Structure-tensor window for the corner detector (default: 3)
    pub corner_block_size: usize,

    // === Tracking ===
    /// Run optical flow every Nth cycle (default: 3)
    pub lk_every_n: u64,

    /// LK search window side in pixels (default: 15)
    pub lk_window: usize,

    /// Extra pyramid levels above full resolution (default: 2)
    pub lk_max_level: usize,

    /// LK iteration cap per level (default: 30)
    pub lk_max_iterations: usize,

    /// LK convergence threshold in pixels (default: 0.01)
    pub lk_epsilon: f64,

    // === Smoothing / warnings ===
    /// Weight of the previous smoothed value (default: 0.8)
    pub smoothing_factor: f64,

    /// Debounce thresholds fed with the smoothed mean (default: 15.0 / 12.0)
    pub speed: HysteresisThresholds,

    /// Debounce thresholds fed with the smoothed std-dev (default: 10.0 / 8.0)
    pub stability: HysteresisThresholds,

    /// Consecutive qualifying samples required to flip a warning (default: 5)
    pub confirm_count: u32,
}

impl Default for MotionConfig {
    fn default() -> Self {
        Self {
            target_width: 480,
            roi_vertical: (0.2, 0.8),
            roi_horizontal: (0.15, 0.85),
            max_features: 100,
            min_features: 40,
            corner_quality: 0.01,
            min_corner_distance: 8.0,
            corner_block_size: 3,
            lk_every_n: 3,
            lk_window: 15,
            lk_max_level: 2,
            lk_max_iterations: 30,
            lk_epsilon: 0.01,
            smoothing_factor: 0.8,
            speed: HysteresisThresholds::new(15.0, 12.0),
            stability: HysteresisThresholds::new(10.0, 8.0),
            confirm_count: 5,
        }
    }
}

impl MotionConfig {
    /// Reject settings the estimator cannot run with.
    pub fn validate(&self) -> VisionResult<()> {
        if self.target_width == 0 {
            return Err(VisionError::invalid_config("target_width must be positive"));
        }
        check_fraction_range("roi_vertical", self.roi_vertical)?;
        check_fraction_range("roi_horizontal", self.roi_horizontal)?;
        if self.max_features == 0 {
            return Err(VisionError::invalid_config("max_features must be positive"));
        }
        if self.min_features > self.max_features {
            return Err(VisionError::invalid_config(format!(
                "min_features ({}) exceeds max_features ({})",
                self.min_features, self.max_features
            )));
        }
        if !(self.corner_quality > 0.0 && self.corner_quality < 1.0) {
            return Err(VisionError::invalid_config("corner_quality must be in (0, 1)"));
        }
        if self.min_corner_distance < 0.0 {
            return Err(VisionError::invalid_config("min_corner_distance must not be negative"));
        }
        if self.corner_block_size == 0 {
            return Err(VisionError::invalid_config("corner_block_size must be positive"));
        }
        if self.lk_every_n == 0 {
            return Err(VisionError::invalid_config("lk_every_n must be positive"));
        }
        if self.lk_window < 3 || self.lk_window % 2 == 0 {
            return Err(VisionError::invalid_config("lk_window must be odd and at least 3"));
        }
        if self.lk_max_iterations == 0 {
            return Err(VisionError::invalid_config("lk_max_iterations must be positive"));
        }
        if !(0.0..1.0).contains(&self.smoothing_factor) {
            return Err(VisionError::invalid_config("smoothing_factor must be in [0, 1)"));
        }
        check_thresholds("speed", self.speed)?;
        check_thresholds("stability", self.stability)?;
        if self.confirm_count == 0 {
            return Err(VisionError::invalid_config("confirm_count must be positive"));
        }
        Ok(())
    }
}

fn check_fraction_range(name: &str, (start, end): (f64, f64)) -> VisionResult<()> {
    if !(0.0..=1.0).contains(&start) || !(0.0..=1.0).contains(&end) || start >= end {
        return Err(VisionError::invalid_config(format!(
            "{name} must satisfy 0 <= start < end <= 1, got {start}..{end}"
        )));
    }
    Ok(())
}

fn check_thresholds(name: &str, thresholds: HysteresisThresholds) -> VisionResult<()> {
    if thresholds.enter <= thresholds.clear {
        return Err(VisionError::invalid_config(format!(
            "{name} enter threshold ({}) must exceed clear threshold ({})",
            thresholds.enter, thresholds.clear
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        assert!(MotionConfig::default().validate().is_ok());
    }

    #[test]
    fn test_rejects_inverted_thresholds() {
        let config = MotionConfig {
            speed: HysteresisThresholds::new(10.0, 12.0),
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(VisionError::InvalidConfig(_))));
    }

    #[test]
    fn test_rejects_min_above_max_features() {
        let config = MotionConfig {
            min_features: 120,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_zero_cadence_and_bad_roi() {
        let config = MotionConfig {
            lk_every_n: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = MotionConfig {
            roi_horizontal: (0.6, 0.4),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_smoothing_factor_of_one() {
        let config = MotionConfig {
            smoothing_factor: 1.0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
