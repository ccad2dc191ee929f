//! Sparse pyramidal Lucas-Kanade optical flow.
//!
//! Follows Bouguet's formulation: the flow estimate is refined coarse to
//! fine, each level running Newton iterations on a square window around the
//! feature, and the result is doubled when moving one level down.

use ndarray::Array2;

use crate::features::Point2;

/// Minimum eigenvalue of the window gradient matrix, normalised by window
/// area, below which a feature is considered untrackable.
const MIN_EIG_THRESHOLD: f32 = 1e-2;

/// Parameters for [`track_points`].
#[derive(Debug, Clone, Copy)]
pub struct FlowParams {
    /// Window side length in pixels (odd).
    pub window: usize,
    /// Extra pyramid levels above full resolution.
    pub max_level: usize,
    pub max_iterations: usize,
    pub epsilon: f32,
}

/// One pyramid level: intensities plus Scharr gradients.
#[derive(Debug, Clone)]
pub struct PyramidLevel {
    pub image: Array2<f32>,
    pub grad_x: Array2<f32>,
    pub grad_y: Array2<f32>,
}

impl PyramidLevel {
    fn new(image: Array2<f32>) -> Self {
        let (grad_x, grad_y) = scharr_gradients(&image);
        Self {
            image,
            grad_x,
            grad_y,
        }
    }

    fn width(&self) -> usize {
        self.image.dim().1
    }

    fn height(&self) -> usize {
        self.image.dim().0
    }
}

/// Gaussian-free image pyramid built by 2x2 averaging.
#[derive(Debug, Clone)]
pub struct Pyramid {
    levels: Vec<PyramidLevel>,
}

impl Pyramid {
    /// Build up to `max_level` coarser levels, stopping early once a level
    /// would be narrower than the tracking window.
    pub fn build(image: Array2<f32>, max_level: usize, window: usize) -> Self {
        let mut levels = vec![PyramidLevel::new(image)];
        while levels.len() <= max_level {
            let Some(last) = levels.last() else { break };
            let next_h = last.height() / 2;
            let next_w = last.width() / 2;
            if next_h < window || next_w < window {
                break;
            }
            let src = &last.image;
            let half = Array2::from_shape_fn((next_h, next_w), |(y, x)| {
                let (sy, sx) = (2 * y, 2 * x);
                (src[[sy, sx]] + src[[sy, sx + 1]] + src[[sy + 1, sx]] + src[[sy + 1, sx + 1]])
                    * 0.25
            });
            levels.push(PyramidLevel::new(half));
        }
        Self { levels }
    }

    pub fn depth(&self) -> usize {
        self.levels.len()
    }

    pub fn dim(&self) -> (usize, usize) {
        self.levels[0].image.dim()
    }
}

/// Track `points` from `prev` into `next`.
///
/// Returns one entry per input point, `None` where tracking failed (flat
/// window, or the point left the frame).
pub fn track_points(
    prev: &Pyramid,
    next: &Pyramid,
    points: &[Point2],
    params: &FlowParams,
) -> Vec<Option<Point2>> {
    let depth = prev.depth().min(next.depth());
    points
        .iter()
        .map(|point| track_one(prev, next, depth, *point, params))
        .collect()
}

fn track_one(
    prev: &Pyramid,
    next: &Pyramid,
    depth: usize,
    point: Point2,
    params: &FlowParams,
) -> Option<Point2> {
    let half = (params.window / 2) as isize;
    let area = (params.window * params.window) as f32;
    let mut guess = (0.0f32, 0.0f32);
    let mut flow = (0.0f32, 0.0f32);

    for level in (0..depth).rev() {
        let scale = (1u32 << level) as f32;
        let px = point.x / scale;
        let py = point.y / scale;
        let prev_level = &prev.levels[level];
        let next_level = &next.levels[level];

        // Template and gradients sampled once per level.
        let mut template = Vec::with_capacity(params.window * params.window);
        let (mut gxx, mut gxy, mut gyy) = (0.0f32, 0.0f32, 0.0f32);
        for dy in -half..=half {
            for dx in -half..=half {
                let sx = px + dx as f32;
                let sy = py + dy as f32;
                let value = bilinear(&prev_level.image, sx, sy);
                let ix = bilinear(&prev_level.grad_x, sx, sy);
                let iy = bilinear(&prev_level.grad_y, sx, sy);
                gxx += ix * ix;
                gxy += ix * iy;
                gyy += iy * iy;
                template.push((value, ix, iy));
            }
        }

        let det = gxx * gyy - gxy * gxy;
        let min_eig = ((gxx + gyy) - ((gxx - gyy).powi(2) + 4.0 * gxy * gxy).sqrt()) / (2.0 * area);
        if min_eig < MIN_EIG_THRESHOLD || det.abs() < f32::EPSILON {
            if level == 0 {
                return None;
            }
            guess = (guess.0 * 2.0, guess.1 * 2.0);
            continue;
        }

        let mut v = (0.0f32, 0.0f32);
        for _ in 0..params.max_iterations {
            let qx = px + guess.0 + v.0;
            let qy = py + guess.1 + v.1;
            if !inside(next_level, qx, qy) {
                if level == 0 {
                    return None;
                }
                break;
            }

            let (mut bx, mut by) = (0.0f32, 0.0f32);
            let mut samples = template.iter();
            for dy in -half..=half {
                for dx in -half..=half {
                    let Some(&(value, ix, iy)) = samples.next() else { break };
                    let diff = value - bilinear(&next_level.image, qx + dx as f32, qy + dy as f32);
                    bx += diff * ix;
                    by += diff * iy;
                }
            }

            let step_x = (gyy * bx - gxy * by) / det;
            let step_y = (gxx * by - gxy * bx) / det;
            v = (v.0 + step_x, v.1 + step_y);
            if step_x * step_x + step_y * step_y < params.epsilon * params.epsilon {
                break;
            }
        }

        if level == 0 {
            flow = (guess.0 + v.0, guess.1 + v.1);
        } else {
            guess = ((guess.0 + v.0) * 2.0, (guess.1 + v.1) * 2.0);
        }
    }

    let tracked = Point2::new(point.x + flow.0, point.y + flow.1);
    if !tracked.x.is_finite() || !tracked.y.is_finite() || !inside(&next.levels[0], tracked.x, tracked.y)
    {
        return None;
    }
    Some(tracked)
}

fn inside(level: &PyramidLevel, x: f32, y: f32) -> bool {
    x >= 0.0 && y >= 0.0 && x <= (level.width() - 1) as f32 && y <= (level.height() - 1) as f32
}

/// Bilinear sample with edge clamping.
fn bilinear(image: &Array2<f32>, x: f32, y: f32) -> f32 {
    let (height, width) = image.dim();
    let max_x = (width - 1) as f32;
    let max_y = (height - 1) as f32;
    let x = x.clamp(0.0, max_x);
    let y = y.clamp(0.0, max_y);
    let x0 = x.floor() as usize;
    let y0 = y.floor() as usize;
    let x1 = (x0 + 1).min(width - 1);
    let y1 = (y0 + 1).min(height - 1);
    let fx = x - x0 as f32;
    let fy = y - y0 as f32;
    let top = image[[y0, x0]] * (1.0 - fx) + image[[y0, x1]] * fx;
    let bottom = image[[y1, x0]] * (1.0 - fx) + image[[y1, x1]] * fx;
    top * (1.0 - fy) + bottom * fy
}

/// Scharr derivative kernels normalised to unit gain.
fn scharr_gradients(image: &Array2<f32>) -> (Array2<f32>, Array2<f32>) {
    let (height, width) = image.dim();
    let at = |y: isize, x: isize| -> f32 {
        let cy = y.clamp(0, height as isize - 1) as usize;
        let cx = x.clamp(0, width as isize - 1) as usize;
        image[[cy, cx]]
    };
    let mut grad_x = Array2::<f32>::zeros((height, width));
    let mut grad_y = Array2::<f32>::zeros((height, width));
    for y in 0..height as isize {
        for x in 0..width as isize {
            let gx = 3.0 * (at(y - 1, x + 1) - at(y - 1, x - 1))
                + 10.0 * (at(y, x + 1) - at(y, x - 1))
                + 3.0 * (at(y + 1, x + 1) - at(y + 1, x - 1));
            let gy = 3.0 * (at(y + 1, x - 1) - at(y - 1, x - 1))
                + 10.0 * (at(y + 1, x) - at(y - 1, x))
                + 3.0 * (at(y + 1, x + 1) - at(y - 1, x + 1));
            grad_x[[y as usize, x as usize]] = gx / 32.0;
            grad_y[[y as usize, x as usize]] = gy / 32.0;
        }
    }
    (grad_x, grad_y)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> FlowParams {
        FlowParams {
            window: 15,
            max_level: 2,
            max_iterations: 30,
            epsilon: 0.01,
        }
    }

    /// Smooth, aperiodic-looking texture that can be sampled at any offset.
    fn texture(x: f32, y: f32) -> f32 {
        128.0
            + 40.0 * (x * 0.21).sin() * (y * 0.17).cos()
            + 30.0 * ((x + 2.0 * y) * 0.093).sin()
            + 20.0 * ((3.0 * x - y) * 0.051).cos()
    }

    fn shifted(width: usize, height: usize, shift: (f32, f32)) -> Array2<f32> {
        Array2::from_shape_fn((height, width), |(y, x)| {
            texture(x as f32 - shift.0, y as f32 - shift.1)
        })
    }

    #[test]
    fn test_pyramid_depth() {
        let pyramid = Pyramid::build(Array2::zeros((240, 320)), 2, 15);
        assert_eq!(pyramid.depth(), 3);
        assert_eq!(pyramid.dim(), (240, 320));

        let small = Pyramid::build(Array2::zeros((40, 40)), 2, 15);
        assert_eq!(small.depth(), 2);
    }

    #[test]
    fn test_recovers_subpixel_shift() {
        let prev = Pyramid::build(shifted(200, 160, (0.0, 0.0)), 2, 15);
        let next = Pyramid::build(shifted(200, 160, (2.5, -1.5)), 2, 15);
        let points = vec![
            Point2::new(60.0, 60.0),
            Point2::new(100.0, 80.0),
            Point2::new(140.0, 100.0),
        ];
        let tracked = track_points(&prev, &next, &points, &params());
        for (start, end) in points.iter().zip(tracked) {
            let end = end.expect("textured point should track");
            assert!((end.x - start.x - 2.5).abs() < 0.2, "dx {}", end.x - start.x);
            assert!((end.y - start.y + 1.5).abs() < 0.2, "dy {}", end.y - start.y);
        }
    }

    #[test]
    fn test_larger_shift_uses_pyramid() {
        let prev = Pyramid::build(shifted(240, 200, (0.0, 0.0)), 2, 15);
        let next = Pyramid::build(shifted(240, 200, (9.0, 6.0)), 2, 15);
        let tracked = track_points(&prev, &next, &[Point2::new(120.0, 100.0)], &params());
        let end = tracked[0].expect("should track");
        assert!((end.x - 129.0).abs() < 0.5);
        assert!((end.y - 106.0).abs() < 0.5);
    }

    #[test]
    fn test_flat_window_fails() {
        let flat = Pyramid::build(Array2::from_elem((100, 100), 90.0), 2, 15);
        let tracked = track_points(&flat, &flat, &[Point2::new(50.0, 50.0)], &params());
        assert_eq!(tracked, vec![None]);
    }

    #[test]
    fn test_static_frame_has_zero_flow() {
        let image = shifted(160, 120, (0.0, 0.0));
        let prev = Pyramid::build(image.clone(), 2, 15);
        let next = Pyramid::build(image, 2, 15);
        let start = Point2::new(80.0, 60.0);
        let end = track_points(&prev, &next, &[start], &params())[0].unwrap();
        assert!(start.distance(&end) < 1e-3);
    }

    #[test]
    fn test_bilinear_interpolates() {
        let image = Array2::from_shape_vec((2, 2), vec![0.0, 10.0, 20.0, 30.0]).unwrap();
        assert!((bilinear(&image, 0.5, 0.5) - 15.0).abs() < 1e-5);
        assert_eq!(bilinear(&image, -3.0, 0.0), 0.0);
    }
}
