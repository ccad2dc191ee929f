//! Shi-Tomasi corner detection ("good features to track").
//!
//! # Algorithm
//! 1. Sobel gradients of the grayscale frame
//! 2. Structure tensor summed over a `block_size` window
//! 3. Minimum eigenvalue per pixel as the corner response
//! 4. Keep 3x3 local maxima above `quality * max_response`
//! 5. Greedily accept the strongest candidates at least `min_distance` apart

use image::GrayImage;
use ndarray::{Array2, Zip};
use serde::{Deserialize, Serialize};

/// A feature location in downscaled-frame pixels.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point2 {
    pub x: f32,
    pub y: f32,
}

impl Point2 {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to `other`.
    pub fn distance(&self, other: &Point2) -> f64 {
        let dx = (self.x - other.x) as f64;
        let dy = (self.y - other.y) as f64;
        (dx * dx + dy * dy).sqrt()
    }
}

/// Parameters for [`detect_corners`].
#[derive(Debug, Clone, Copy)]
pub struct CornerParams {
    pub max_corners: usize,
    pub quality: f64,
    pub min_distance: f64,
    pub block_size: usize,
}

/// Convert an 8-bit grayscale image into a row-major float array.
pub fn gray_to_array(gray: &GrayImage) -> Array2<f32> {
    let (width, height) = gray.dimensions();
    Array2::from_shape_fn((height as usize, width as usize), |(y, x)| {
        gray.get_pixel(x as u32, y as u32).0[0] as f32
    })
}

/// Detect up to `max_corners` strong, well-separated corners.
///
/// Returns an empty set for texture-less frames.
pub fn detect_corners(image: &Array2<f32>, params: &CornerParams) -> Vec<Point2> {
    let (height, width) = image.dim();
    if height < 3 || width < 3 || params.max_corners == 0 {
        return Vec::new();
    }

    let response = min_eigen_response(image, params.block_size.max(1));
    let max_response = response.iter().copied().fold(0.0f32, f32::max);
    if max_response <= f32::EPSILON {
        return Vec::new();
    }
    let threshold = (params.quality as f32) * max_response;

    let mut candidates: Vec<(f32, usize, usize)> = Vec::new();
    for y in 1..height - 1 {
        for x in 1..width - 1 {
            let value = response[[y, x]];
            if value < threshold || value <= 0.0 {
                continue;
            }
            if is_local_max(&response, y, x, value) {
                candidates.push((value, y, x));
            }
        }
    }
    candidates.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));

    let min_dist_sq = (params.min_distance * params.min_distance) as f32;
    let mut corners: Vec<Point2> = Vec::with_capacity(params.max_corners);
    for (_, y, x) in candidates {
        let point = Point2::new(x as f32, y as f32);
        let crowded = corners.iter().any(|c| {
            let dx = c.x - point.x;
            let dy = c.y - point.y;
            dx * dx + dy * dy < min_dist_sq
        });
        if crowded {
            continue;
        }
        corners.push(point);
        if corners.len() >= params.max_corners {
            break;
        }
    }
    corners
}

fn is_local_max(response: &Array2<f32>, y: usize, x: usize, value: f32) -> bool {
    for ny in y - 1..=y + 1 {
        for nx in x - 1..=x + 1 {
            if response[[ny, nx]] > value {
                return false;
            }
        }
    }
    true
}

/// Minimum eigenvalue of the gradient structure tensor at every pixel.
fn min_eigen_response(image: &Array2<f32>, block_size: usize) -> Array2<f32> {
    let (height, width) = image.dim();
    let at = |y: isize, x: isize| -> f32 {
        let cy = y.clamp(0, height as isize - 1) as usize;
        let cx = x.clamp(0, width as isize - 1) as usize;
        image[[cy, cx]]
    };

    let mut gxx = Array2::<f32>::zeros((height, width));
    let mut gxy = Array2::<f32>::zeros((height, width));
    let mut gyy = Array2::<f32>::zeros((height, width));
    for y in 0..height as isize {
        for x in 0..width as isize {
            let dx = (at(y - 1, x + 1) + 2.0 * at(y, x + 1) + at(y + 1, x + 1))
                - (at(y - 1, x - 1) + 2.0 * at(y, x - 1) + at(y + 1, x - 1));
            let dy = (at(y + 1, x - 1) + 2.0 * at(y + 1, x) + at(y + 1, x + 1))
                - (at(y - 1, x - 1) + 2.0 * at(y - 1, x) + at(y - 1, x + 1));
            let (dx, dy) = (dx / 8.0, dy / 8.0);
            let idx = [y as usize, x as usize];
            gxx[idx] = dx * dx;
            gxy[idx] = dx * dy;
            gyy[idx] = dy * dy;
        }
    }

    let sxx = box_sum(&gxx, block_size);
    let sxy = box_sum(&gxy, block_size);
    let syy = box_sum(&gyy, block_size);

    let mut response = Array2::<f32>::zeros((height, width));
    Zip::from(&mut response)
        .and(&sxx)
        .and(&sxy)
        .and(&syy)
        .for_each(|out, &a, &b, &c| {
            let half_trace = (a + c) * 0.5;
            let half_diff = (a - c) * 0.5;
            *out = (half_trace - (half_diff * half_diff + b * b).sqrt()).max(0.0);
        });
    response
}

/// Sum over a `size x size` window centred on each pixel, edges clamped.
fn box_sum(values: &Array2<f32>, size: usize) -> Array2<f32> {
    let (height, width) = values.dim();
    let before = (size / 2) as isize;
    let after = (size - 1 - size / 2) as isize;

    let mut rows = Array2::<f32>::zeros((height, width));
    for y in 0..height {
        for x in 0..width as isize {
            let mut sum = 0.0;
            for k in x - before..=x + after {
                sum += values[[y, k.clamp(0, width as isize - 1) as usize]];
            }
            rows[[y, x as usize]] = sum;
        }
    }

    let mut out = Array2::<f32>::zeros((height, width));
    for y in 0..height as isize {
        for x in 0..width {
            let mut sum = 0.0;
            for k in y - before..=y + after {
                sum += rows[[k.clamp(0, height as isize - 1) as usize, x]];
            }
            out[[y as usize, x]] = sum;
        }
    }
    out
}
