//! Guidance verdicts shown to the operator.
//!
//! Each guidance cycle resolves to one of five kinds, in priority order:
//!
//! - `SlowDownAndKeepSteady`: both warnings raised (red)
//! - `SlowDown`: speed warning only (amber)
//! - `KeepSteady`: stability warning only (amber)
//! - `Arming`: stable long enough, capture pending (cyan)
//! - `Ready`: nothing to correct (green)

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::motion::MotionState;

/// Color class of the guidance bar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GuidanceColor {
    Green,
    Amber,
    Red,
    Cyan,
}

impl GuidanceColor {
    /// Palette entry as `(r, g, b)`.
    pub fn rgb(&self) -> (u8, u8, u8) {
        match self {
            GuidanceColor::Green => (60, 200, 60),
            GuidanceColor::Amber => (255, 180, 0),
            GuidanceColor::Red => (255, 60, 60),
            GuidanceColor::Cyan => (80, 200, 255),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            GuidanceColor::Green => "green",
            GuidanceColor::Amber => "amber",
            GuidanceColor::Red => "red",
            GuidanceColor::Cyan => "cyan",
        }
    }
}

impl fmt::Display for GuidanceColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Guidance category. Owns the prompt text and color class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GuidanceKind {
    SlowDownAndKeepSteady,
    SlowDown,
    KeepSteady,
    Arming,
    Ready,
}

impl GuidanceKind {
    /// Resolve the kind for a motion snapshot.
    ///
    /// Debounced warnings take precedence over the arming/ready distinction,
    /// even when the instantaneous stability check already passes.
    pub fn resolve(motion: &MotionState, is_arming: bool) -> Self {
        match (motion.speed_warning, motion.stability_warning) {
            (true, true) => GuidanceKind::SlowDownAndKeepSteady,
            (true, false) => GuidanceKind::SlowDown,
            (false, true) => GuidanceKind::KeepSteady,
            (false, false) if is_arming => GuidanceKind::Arming,
            (false, false) => GuidanceKind::Ready,
        }
    }

    /// Operator-facing prompt.
    pub fn prompt(&self) -> &'static str {
        match self {
            GuidanceKind::SlowDownAndKeepSteady => "Slow down & keep steady",
            GuidanceKind::SlowDown => "Slow down",
            GuidanceKind::KeepSteady => "Keep steady",
            GuidanceKind::Arming => "Hold steady to capture...",
            GuidanceKind::Ready => "Ready to capture",
        }
    }

    pub fn color(&self) -> GuidanceColor {
        match self {
            GuidanceKind::SlowDownAndKeepSteady => GuidanceColor::Red,
            GuidanceKind::SlowDown | GuidanceKind::KeepSteady => GuidanceColor::Amber,
            GuidanceKind::Arming => GuidanceColor::Cyan,
            GuidanceKind::Ready => GuidanceColor::Green,
        }
    }
}

impl fmt::Display for GuidanceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.prompt())
    }
}

/// One guidance verdict, produced once per active guidance cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GuidanceResult {
    pub prompt: String,
    pub color: GuidanceColor,
    pub motion: MotionState,
}

impl GuidanceResult {
    pub fn new(kind: GuidanceKind, motion: MotionState) -> Self {
        Self {
            prompt: kind.prompt().to_string(),
            color: kind.color(),
            motion,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn motion(speed: bool, stability: bool) -> MotionState {
        MotionState::new(1.0, 1.0, speed, stability)
    }

    #[test]
    fn test_both_warnings_are_red() {
        let kind = GuidanceKind::resolve(&motion(true, true), false);
        assert_eq!(kind, GuidanceKind::SlowDownAndKeepSteady);
        assert_eq!(kind.prompt(), "Slow down & keep steady");
        assert_eq!(kind.color(), GuidanceColor::Red);
    }

    #[test]
    fn test_single_warnings_are_amber() {
        assert_eq!(GuidanceKind::resolve(&motion(true, false), false).prompt(), "Slow down");
        assert_eq!(GuidanceKind::resolve(&motion(false, true), false).prompt(), "Keep steady");
        assert_eq!(
            GuidanceKind::resolve(&motion(false, true), false).color(),
            GuidanceColor::Amber
        );
    }

    #[test]
    fn test_warnings_dominate_arming() {
        assert_eq!(
            GuidanceKind::resolve(&motion(true, false), true),
            GuidanceKind::SlowDown
        );
        assert_eq!(
            GuidanceKind::resolve(&motion(false, true), true),
            GuidanceKind::KeepSteady
        );
    }

    #[test]
    fn test_arming_and_ready() {
        let arming = GuidanceKind::resolve(&motion(false, false), true);
        assert_eq!(arming.prompt(), "Hold steady to capture...");
        assert_eq!(arming.color(), GuidanceColor::Cyan);

        let ready = GuidanceKind::resolve(&motion(false, false), false);
        assert_eq!(ready.prompt(), "Ready to capture");
        assert_eq!(ready.color(), GuidanceColor::Green);
    }

    #[test]
    fn test_result_serialization() {
        let result = GuidanceResult::new(GuidanceKind::Ready, MotionState::default());
        let json = serde_json::to_string(&result).unwrap();
        assert!(json.contains("\"color\":\"green\""));
        assert!(json.contains("Ready to capture"));
    }
}
