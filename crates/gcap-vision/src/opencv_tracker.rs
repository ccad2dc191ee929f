//! OpenCV-backed feature tracker (`goodFeaturesToTrack` + `calcOpticalFlowPyrLK`).

use image::GrayImage;
use opencv::{
    core::{no_array, Mat, Point2f, Size, TermCriteria, TermCriteria_Type, Vector},
    imgproc,
    prelude::*,
    video,
};

use crate::config::MotionConfig;
use crate::error::{VisionError, VisionResult};
use crate::features::Point2;
use crate::tracker::FeatureTracker;

/// Same contract as the native tracker, delegated to OpenCV.
pub struct OpenCvTracker {
    max_corners: i32,
    quality: f64,
    min_distance: f64,
    block_size: i32,
    window: i32,
    max_level: i32,
    max_iterations: i32,
    epsilon: f64,
}

impl OpenCvTracker {
    pub fn new(config: &MotionConfig) -> Self {
        Self {
            max_corners: config.max_features as i32,
            quality: config.corner_quality,
            min_distance: config.min_corner_distance,
            block_size: config.corner_block_size as i32,
            window: config.lk_window as i32,
            max_level: config.lk_max_level as i32,
            max_iterations: config.lk_max_iterations as i32,
            epsilon: config.lk_epsilon,
        }
    }
}

fn to_mat(gray: &GrayImage) -> VisionResult<Mat> {
    if gray.width() == 0 || gray.height() == 0 {
        return Err(VisionError::EmptyFrame);
    }
    let view = Mat::new_rows_cols_with_data(gray.height() as i32, gray.width() as i32, gray.as_raw())?;
    Ok(view.try_clone()?)
}

impl FeatureTracker for OpenCvTracker {
    fn name(&self) -> &'static str {
        "opencv"
    }

    fn detect(&mut self, gray: &GrayImage) -> VisionResult<Vec<Point2>> {
        let mat = to_mat(gray)?;
        let mut corners: Vector<Point2f> = Vector::new();
        imgproc::good_features_to_track(
            &mat,
            &mut corners,
            self.max_corners,
            self.quality,
            self.min_distance,
            &no_array(),
            self.block_size,
            false,
            0.04,
        )?;
        Ok(corners.iter().map(|p| Point2::new(p.x, p.y)).collect())
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
        if points.is_empty() {
            return Ok(Vec::new());
        }
        let prev_mat = to_mat(prev)?;
        let next_mat = to_mat(next)?;
        let prev_pts: Vector<Point2f> = points.iter().map(|p| Point2f::new(p.x, p.y)).collect();
        let mut next_pts: Vector<Point2f> = Vector::new();
        let mut status: Vector<u8> = Vector::new();
        let mut err: Vector<f32> = Vector::new();
        let criteria = TermCriteria::new(
            TermCriteria_Type::COUNT as i32 + TermCriteria_Type::EPS as i32,
            self.max_iterations,
            self.epsilon,
        )?;

        video::calc_optical_flow_pyr_lk(
            &prev_mat,
            &next_mat,
            &prev_pts,
            &mut next_pts,
            &mut status,
            &mut err,
            Size::new(self.window, self.window),
            self.max_level,
            criteria,
            0,
            1e-4,
        )?;

        Ok(next_pts
            .iter()
            .zip(status.iter())
            .map(|(p, ok)| (ok == 1).then(|| Point2::new(p.x, p.y)))
            .collect())
    }
}
