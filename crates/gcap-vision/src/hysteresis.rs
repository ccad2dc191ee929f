//! Two-threshold, confirm-count debounce for noisy scalar signals.
//!
//! A warning is raised only after `confirm_count` consecutive samples at or
//! above `enter`, and cleared only after `confirm_count` consecutive samples
//! at or below `clear`. Any non-qualifying sample restarts the count, so a
//! single outlier never flips the flag.

use crate::config::HysteresisThresholds;

/// Debounced boolean warning derived from a scalar metric.
#[derive(Debug, Clone)]
pub struct HysteresisDebouncer {
    thresholds: HysteresisThresholds,
    confirm_count: u32,
    enter_counter: u32,
    clear_counter: u32,
    is_warning: bool,
}

impl HysteresisDebouncer {
    pub fn new(thresholds: HysteresisThresholds, confirm_count: u32) -> Self {
        Self {
            thresholds,
            confirm_count,
            enter_counter: 0,
            clear_counter: 0,
            is_warning: false,
        }
    }

    /// Feed one sample and return the warning flag after the update.
    pub fn update(&mut self, value: f64) -> bool {
        if !self.is_warning {
            if value >= self.thresholds.enter {
                self.enter_counter += 1;
            } else {
                self.enter_counter = 0;
            }
            if self.enter_counter >= self.confirm_count {
                self.is_warning = true;
                self.enter_counter = 0;
            }
        } else {
            if value <= self.thresholds.clear {
                self.clear_counter += 1;
            } else {
                self.clear_counter = 0;
            }
            if self.clear_counter >= self.confirm_count {
                self.is_warning = false;
                self.clear_counter = 0;
            }
        }
        self.is_warning
    }

    pub fn is_warning(&self) -> bool {
        self.is_warning
    }

    /// Drop back to non-warning with both counters cleared.
    pub fn reset(&mut self) {
        self.is_warning = false;
        self.enter_counter = 0;
        self.clear_counter = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn debouncer() -> HysteresisDebouncer {
        HysteresisDebouncer::new(HysteresisThresholds::new(15.0, 12.0), 5)
    }

    #[test]
    fn test_enters_after_exactly_confirm_count() {
        let mut d = debouncer();
        for _ in 0..4 {
            assert!(!d.update(20.0));
        }
        assert!(d.update(20.0));
    }

    #[test]
    fn test_interruption_restarts_enter_count() {
        let mut d = debouncer();
        for _ in 0..4 {
            d.update(20.0);
        }
        // Below enter but above clear still breaks the streak.
        d.update(14.0);
        for _ in 0..4 {
            assert!(!d.update(15.0));
        }
        assert!(d.update(15.0));
    }

    #[test]
    fn test_clears_after_exactly_confirm_count() {
        let mut d = debouncer();
        for _ in 0..5 {
            d.update(20.0);
        }
        assert!(d.is_warning());
        for _ in 0..4 {
            assert!(d.update(12.0));
        }
        assert!(!d.update(12.0));
    }

    #[test]
    fn test_dead_band_holds_warning() {
        let mut d = debouncer();
        for _ in 0..5 {
            d.update(20.0);
        }
        for _ in 0..50 {
            assert!(d.update(13.5));
        }
        for _ in 0..3 {
            d.update(1.0);
        }
        d.update(13.0);
        for _ in 0..4 {
            assert!(d.update(1.0));
        }
        assert!(!d.update(1.0));
    }

    #[test]
    fn test_reset() {
        let mut d = debouncer();
        for _ in 0..5 {
            d.update(20.0);
        }
        d.reset();
        assert!(!d.is_warning());
        for _ in 0..4 {
            assert!(!d.update(20.0));
        }
        assert!(d.update(20.0));
    }

    #[test]
    fn test_transition_property_over_sequence() {
        // Pseudo-random walk; check every flip against a reference count.
        let mut d = debouncer();
        let mut seed: u64 = 0x2545_f491_4f6c_dd1d;
        let mut run_above = 0;
        let mut run_below = 0;
        for _ in 0..2000 {
            seed ^= seed << 13;
            seed ^= seed >> 7;
            seed ^= seed << 17;
            let value = (seed % 3000) as f64 / 100.0;
            let was = d.is_warning();
            let now = d.update(value);
            if !was {
                run_above = if value >= 15.0 { run_above + 1 } else { 0 };
                assert_eq!(now, run_above == 5);
                if now {
                    run_above = 0;
                    run_below = 0;
                }
            } else {
                run_below = if value <= 12.0 { run_below + 1 } else { 0 };
                assert_eq!(!now, run_below == 5);
                if !now {
                    run_below = 0;
                    run_above = 0;
                }
            }
        }
    }
}
