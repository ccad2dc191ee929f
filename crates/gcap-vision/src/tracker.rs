//! Feature detection and tracking backends.
//!
//! The estimator talks to a [`FeatureTracker`] so the pure-Rust
//! implementation and the OpenCV-backed one (feature `opencv`) are
//! interchangeable.

use image::GrayImage;

use crate::config::MotionConfig;
use crate::error::{VisionError, VisionResult};
use crate::features::{detect_corners, gray_to_array, CornerParams, Point2};
use crate::flow::{track_points, FlowParams, Pyramid};

/// Detects corners and tracks them between consecutive frames.
pub trait FeatureTracker: Send {
    /// Backend name for logs.
    fn name(&self) -> &'static str;

    /// Detect a fresh feature set.
    fn detect(&mut self, gray: &GrayImage) -> VisionResult<Vec<Point2>>;

    /// Track `points` from `prev` into `next`; `None` marks a lost point.
    fn track(
        &mut self,
        prev: &GrayImage,
        next: &GrayImage,
        points: &[Point2],
    ) -> VisionResult<Vec<Option<Point2>>>;
}

/// Pure-Rust Shi-Tomasi + pyramidal Lucas-Kanade.
#[derive(Debug, Clone)]
pub struct NativeTracker {
    corners: CornerParams,
    flow: FlowParams,
}

impl NativeTracker {
    pub fn new(config: &MotionConfig) -> Self {
        Self {
            corners: CornerParams {
                max_corners: config.max_features,
                quality: config.corner_quality,
                min_distance: config.min_corner_distance,
                block_size: config.corner_block_size,
            },
            flow: FlowParams {
                window: config.lk_window,
                max_level: config.lk_max_level,
                max_iterations: config.lk_max_iterations,
                epsilon: config.lk_epsilon as f32,
            },
        }
    }
}

impl FeatureTracker for NativeTracker {
    fn name(&self) -> &'static str {
        "native"
    }

    fn detect(&mut self, gray: &GrayImage) -> VisionResult<Vec<Point2>> {
        if gray.width() == 0 || gray.height() == 0 {
            return Err(VisionError::EmptyFrame);
        }
        Ok(detect_corners(&gray_to_array(gray), &self.corners))
    }

    fn track(
        &mut self,
        prev: &GrayImage,
        next: &GrayImage,
        points: &[Point2],
    ) -> VisionResult<Vec<Option<Point2>>> {
        if prev.dimensions() != next.dimensions() {
            return Err(VisionError::SizeMismatch {
                prev: (prev.width() as usize, prev.height() as usize),
                next: (next.width() as usize, next.height() as usize),
            });
        }
        if prev.width() < 2 || prev.height() < 2 {
            return Err(VisionError::EmptyFrame);
        }
        let prev = Pyramid::build(gray_to_array(prev), self.flow.max_level, self.flow.window);
        let next = Pyramid::build(gray_to_array(next), self.flow.max_level, self.flow.window);
        Ok(track_points(&prev, &next, points, &self.flow))
    }
}

/// Tracker used when none is supplied: OpenCV (the default feature), or the
/// native implementation in builds without it.
pub fn default_tracker(config: &MotionConfig) -> Box<dyn FeatureTracker> {
    #[cfg(feature = "opencv")]
    {
        Box::new(crate::opencv_tracker::OpenCvTracker::new(config))
    }
    #[cfg(not(feature = "opencv"))]
    {
        Box::new(NativeTracker::new(config))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    fn textured_gray(shift_x: f32) -> GrayImage {
        GrayImage::from_fn(240, 160, |x, y| {
            let (x, y) = (x as f32 - shift_x, y as f32);
            let v = 128.0
                + 40.0 * (x * 0.21).sin() * (y * 0.17).cos()
                + 30.0 * ((x + 2.0 * y) * 0.093).sin()
                + 20.0 * ((3.0 * x - y) * 0.051).cos();
            Luma([v.clamp(0.0, 255.0).round() as u8])
        })
    }

    /// Behaviour every backend must share.
    fn check_tracker_contract(tracker: &mut dyn FeatureTracker) {
        let config = MotionConfig::default();

        let blank = GrayImage::from_pixel(64, 48, Luma([100]));
        assert!(tracker.detect(&blank).unwrap().is_empty(), "{}", tracker.name());

        let mismatch = tracker.track(
            &GrayImage::new(64, 48),
            &GrayImage::new(48, 64),
            &[Point2::new(10.0, 10.0)],
        );
        assert!(matches!(mismatch, Err(VisionError::SizeMismatch { .. })));

        let prev = textured_gray(0.0);
        let points = tracker.detect(&prev).unwrap();
        assert!(points.len() >= config.min_features, "{} corners", points.len());
        assert!(points.len() <= config.max_features);
        for (i, a) in points.iter().enumerate() {
            assert!(a.x >= 0.0 && a.x < 240.0 && a.y >= 0.0 && a.y < 160.0);
            for b in &points[i + 1..] {
                assert!(a.distance(b) >= config.min_corner_distance - 1e-3);
            }
        }

        let next = textured_gray(2.0);
        let tracked = tracker.track(&prev, &next, &points).unwrap();
        assert_eq!(tracked.len(), points.len());
        let mut dx: Vec<f32> = points
            .iter()
            .zip(&tracked)
            .filter_map(|(old, new)| new.map(|new| new.x - old.x))
            .collect();
        assert!(dx.len() * 10 >= points.len() * 8, "{} of {} tracked", dx.len(), points.len());
        dx.sort_by(f32::total_cmp);
        let median = dx[dx.len() / 2];
        assert!((median - 2.0).abs() < 0.25, "{} median dx {median}", tracker.name());
    }

    #[test]
    fn test_native_tracker_contract() {
        check_tracker_contract(&mut NativeTracker::new(&MotionConfig::default()));
    }

    #[cfg(feature = "opencv")]
    #[test]
    fn test_opencv_tracker_contract() {
        let mut tracker = crate::opencv_tracker::OpenCvTracker::new(&MotionConfig::default());
        check_tracker_contract(&mut tracker);
    }

    #[test]
    fn test_default_tracker_matches_enabled_backend() {
        let tracker = default_tracker(&MotionConfig::default());
        let expected = if cfg!(feature = "opencv") { "opencv" } else { "native" };
        assert_eq!(tracker.name(), expected);
    }
}
