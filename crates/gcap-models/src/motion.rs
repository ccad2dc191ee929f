//! Motion snapshot published once per estimator cycle.

use serde::{Deserialize, Serialize};

/// Smoothed motion metrics and debounced warning flags.
///
/// `mu` and `sigma` are in downscaled-frame pixels and are never negative.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct MotionState {
    /// Smoothed mean displacement magnitude.
    pub mu: f64,
    /// Smoothed displacement standard deviation.
    pub sigma: f64,
    /// Debounced "moving too fast" flag.
    pub speed_warning: bool,
    /// Debounced "too much jitter" flag.
    pub stability_warning: bool,
}

impl MotionState {
    /// Build a snapshot, clamping negative or non-finite magnitudes to zero.
    pub fn new(mu: f64, sigma: f64, speed_warning: bool, stability_warning: bool) -> Self {
        Self {
            mu: non_negative(mu),
            sigma: non_negative(sigma),
            speed_warning,
            stability_warning,
        }
    }

    /// True when either debounced warning is raised.
    pub fn has_warning(&self) -> bool {
        self.speed_warning || self.stability_warning
    }
}

fn non_negative(value: f64) -> f64 {
    if value.is_finite() && value > 0.0 {
        value
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_clamps_invalid_magnitudes() {
        let state = MotionState::new(-1.0, f64::NAN, false, true);
        assert_eq!(state.mu, 0.0);
        assert_eq!(state.sigma, 0.0);
        assert!(state.has_warning());
    }

    #[test]
    fn test_default_is_still() {
        let state = MotionState::default();
        assert_eq!(state.mu, 0.0);
        assert!(!state.has_warning());
    }

    #[test]
    fn test_serialization() {
        let state = MotionState::new(2.5, 0.5, true, false);
        let json = serde_json::to_string(&state).unwrap();
        assert!(json.contains("\"speed_warning\":true"));
        let back: MotionState = serde_json::from_str(&json).unwrap();
        assert_eq!(back, state);
    }
}
