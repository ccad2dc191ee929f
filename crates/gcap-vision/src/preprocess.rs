//! Frame preprocessing: central ROI crop, fast downscale, grayscale.
//!
//! The ROI drops the frame borders where hands and background tend to
//! appear. Nearest-neighbour resizing is used because the result only feeds
//! corner detection and sparse flow, where speed matters more than quality.

use image::imageops::{self, FilterType};
use image::{GrayImage, RgbImage};

use crate::config::MotionConfig;
use crate::error::{VisionError, VisionResult};

/// Pixel rectangle `(x, y, width, height)` of the ROI inside a frame.
pub fn roi_rect(width: u32, height: u32, config: &MotionConfig) -> (u32, u32, u32, u32) {
    let (top, bottom) = config.roi_vertical;
    let (left, right) = config.roi_horizontal;
    let y0 = (height as f64 * top) as u32;
    let y1 = (height as f64 * bottom) as u32;
    let x0 = (width as f64 * left) as u32;
    let x1 = (width as f64 * right) as u32;
    (x0, y0, x1.saturating_sub(x0), y1.saturating_sub(y0))
}

/// Downscaled size preserving aspect ratio at the configured target width.
pub fn target_size(crop_width: u32, crop_height: u32, target_width: u32) -> (u32, u32) {
    let scale = target_width as f64 / crop_width.max(1) as f64;
    (target_width, (crop_height as f64 * scale) as u32)
}

/// Crop, downscale and convert a camera frame for motion analysis.
pub fn prepare_gray(frame: &RgbImage, config: &MotionConfig) -> VisionResult<GrayImage> {
    let (width, height) = frame.dimensions();
    if width == 0 || height == 0 {
        return Err(VisionError::EmptyFrame);
    }

    let (x, y, crop_w, crop_h) = roi_rect(width, height, config);
    if crop_w == 0 || crop_h == 0 {
        return Err(VisionError::degenerate_roi(format!(
            "{width}x{height} frame leaves an empty ROI"
        )));
    }

    let (out_w, out_h) = target_size(crop_w, crop_h, config.target_width);
    if out_h == 0 {
        return Err(VisionError::degenerate_roi(format!(
            "{crop_w}x{crop_h} ROI scales to zero height"
        )));
    }

    let crop = imageops::crop_imm(frame, x, y, crop_w, crop_h);
    let small = imageops::resize(&*crop, out_w, out_h, FilterType::Nearest);
    Ok(imageops::grayscale(&small))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn test_roi_rect_for_full_hd() {
        let config = MotionConfig::default();
        let (x, y, w, h) = roi_rect(1920, 1080, &config);
        assert_eq!((x, y), (288, 216));
        assert_eq!((w, h), (1344, 648));
    }

    #[test]
    fn test_prepare_gray_output_size() {
        let config = MotionConfig::default();
        let frame = RgbImage::from_pixel(1920, 1080, Rgb([10, 200, 30]));
        let gray = prepare_gray(&frame, &config).unwrap();
        assert_eq!(gray.width(), 480);
        assert_eq!(gray.height(), 231);
    }

    #[test]
    fn test_prepare_gray_rejects_empty_frame() {
        let config = MotionConfig::default();
        let frame = RgbImage::new(0, 0);
        assert!(matches!(prepare_gray(&frame, &config), Err(VisionError::EmptyFrame)));
    }

    #[test]
    fn test_prepare_gray_rejects_degenerate_roi() {
        let config = MotionConfig::default();
        // 1 px tall: the vertical ROI rounds down to nothing.
        let frame = RgbImage::new(640, 1);
        assert!(matches!(
            prepare_gray(&frame, &config),
            Err(VisionError::DegenerateRoi(_))
        ));
    }

    #[test]
    fn test_prepare_gray_samples_centre() {
        let config = MotionConfig::default();
        let mut frame = RgbImage::from_pixel(100, 100, Rgb([0, 0, 0]));
        for y in 20..80 {
            for x in 15..85 {
                frame.put_pixel(x, y, Rgb([255, 255, 255]));
            }
        }
        let gray = prepare_gray(&frame, &config).unwrap();
        assert!(gray.pixels().all(|p| p.0[0] == 255));
    }
}
