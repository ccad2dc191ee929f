//! Displacement statistics and exponential smoothing.

use crate::features::Point2;

/// Arithmetic mean; zero for an empty slice.
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Population standard deviation; zero for fewer than two values.
pub fn std_deviation(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let avg = mean(values);
    let variance = values.iter().map(|v| (v - avg).powi(2)).sum::<f64>() / values.len() as f64;
    variance.sqrt()
}

/// Raw per-cycle motion signal: mean and std-dev of point displacements.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RawMotion {
    pub mean: f64,
    pub std_dev: f64,
}

impl RawMotion {
    pub const ZERO: RawMotion = RawMotion {
        mean: 0.0,
        std_dev: 0.0,
    };

    /// Statistics of the Euclidean displacement between matched pairs.
    pub fn from_pairs(pairs: &[(Point2, Point2)]) -> Self {
        let distances: Vec<f64> = pairs.iter().map(|(a, b)| a.distance(b)).collect();
        Self {
            mean: mean(&distances),
            std_dev: std_deviation(&distances),
        }
    }
}

/// Exponential moving average seeded by its first sample.
#[derive(Debug, Clone)]
pub struct Ema {
    factor: f64,
    value: Option<f64>,
}

impl Ema {
    /// `factor` is the weight of the previous smoothed value.
    pub fn new(factor: f64) -> Self {
        Self {
            factor,
            value: None,
        }
    }

    pub fn update(&mut self, sample: f64) -> f64 {
        let next = match self.value {
            None => sample,
            Some(prev) => self.factor * prev + (1.0 - self.factor) * sample,
        };
        self.value = Some(next);
        next
    }

    pub fn value(&self) -> Option<f64> {
        self.value
    }

    pub fn reset(&mut self) {
        self.value = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_population_std() {
        assert_eq!(std_deviation(&[5.0]), 0.0);
        assert!((std_deviation(&[1.0, 3.0]) - 1.0).abs() < 1e-12);
        assert!((std_deviation(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]) - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_raw_motion_from_pairs() {
        let pairs = vec![
            (Point2::new(0.0, 0.0), Point2::new(3.0, 4.0)),
            (Point2::new(10.0, 10.0), Point2::new(10.0, 11.0)),
        ];
        let raw = RawMotion::from_pairs(&pairs);
        assert!((raw.mean - 3.0).abs() < 1e-9);
        assert!((raw.std_dev - 2.0).abs() < 1e-9);

        let single = RawMotion::from_pairs(&pairs[..1]);
        assert_eq!(single.std_dev, 0.0);
        assert_eq!(RawMotion::from_pairs(&[]), RawMotion::ZERO);
    }

    #[test]
    fn test_ema_seeds_then_blends() {
        let mut ema = Ema::new(0.8);
        assert_eq!(ema.update(10.0), 10.0);
        assert!((ema.update(0.0) - 8.0).abs() < 1e-12);
        assert!((ema.update(0.0) - 6.4).abs() < 1e-12);
    }

    #[test]
    fn test_ema_converges_to_constant() {
        let mut ema = Ema::new(0.8);
        ema.update(50.0);
        let mut last = 0.0;
        for _ in 0..200 {
            last = ema.update(3.0);
        }
        assert!((last - 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_ema_reset() {
        let mut ema = Ema::new(0.8);
        ema.update(4.0);
        ema.reset();
        assert_eq!(ema.value(), None);
        assert_eq!(ema.update(1.0), 1.0);
    }
}
