//! Motion-based change detection between two frames.
//!
//! Both frames are reduced to BT.601 luma, differenced per pixel and
//! binarized: a pixel is foreground when its difference is non-zero and at
//! least `bw_threshold`. The change ratio is the foreground share of all
//! pixels.
//!
//! The luma weights (0.299, 0.587, 0.114, rounded) are OpenCV's
//! `BGR2GRAY` ones, so thresholds tuned against OpenCV-based analyzers carry
//! over. `image`'s own grayscale conversion uses the Rec. 709 weights and
//! would shift those thresholds.

use image::RgbImage;
use serde::{Deserialize, Serialize};
use vfs_common::error::{VfsError, VfsResult};

/// Result of comparing two frames.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChangeOutcome {
    /// Fraction of changed pixels in `[0, 1]`.
    pub ratio: f64,

    /// Whether `ratio` is strictly above the change threshold.
    pub keep: bool,
}

/// Thresholds for change detection.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChangeDetector {
    /// Luma difference (0-255) from which a pixel counts as changed.
    pub bw_threshold: u8,

    /// Ratio (0-1) that must be exceeded to keep a frame.
    pub change_threshold: f64,
}

impl Default for ChangeDetector {
    fn default() -> Self {
        Self {
            bw_threshold: 128,
            change_threshold: 0.0,
        }
    }
}

impl ChangeDetector {
    pub fn compare(&self, prev: &RgbImage, curr: &RgbImage) -> VfsResult<ChangeOutcome> {
        detect_change(prev, curr, self.bw_threshold, self.change_threshold)
    }
}

#[inline]
fn luma(p: &image::Rgb<u8>) -> u8 {
    let [r, g, b] = p.0;
    ((r as u32 * 299 + g as u32 * 587 + b as u32 * 114 + 500) / 1000) as u8
}

/// Compare two frames and decide whether the second one changed enough.
///
/// Fails with a frame compare error when the frames differ in size or are
/// empty.
pub fn detect_change(
    prev: &RgbImage,
    curr: &RgbImage,
    bw_threshold: u8,
    change_threshold: f64,
) -> VfsResult<ChangeOutcome> {
    if prev.dimensions() != curr.dimensions() {
        let (pw, ph) = prev.dimensions();
        let (cw, ch) = curr.dimensions();
        return Err(VfsError::frame_compare(format!(
            "frame size changed from {pw}x{ph} to {cw}x{ch}"
        )));
    }
    let total = u64::from(prev.width()) * u64::from(prev.height());
    if total == 0 {
        return Err(VfsError::frame_compare("cannot compare empty frames"));
    }

    let changed = prev
        .pixels()
        .zip(curr.pixels())
        .filter(|(a, b)| {
            let diff = luma(a).abs_diff(luma(b));
            diff > 0 && diff >= bw_threshold
        })
        .count() as u64;

    let ratio = changed as f64 / total as f64;
    Ok(ChangeOutcome {
        ratio,
        keep: ratio > change_threshold,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solid(width: u32, height: u32, value: u8) -> RgbImage {
        RgbImage::from_pixel(width, height, image::Rgb([value, value, value]))
    }

    #[test]
    fn test_identical_frames_have_zero_ratio() {
        let img = RgbImage::from_fn(32, 24, |x, y| image::Rgb([x as u8 * 7, y as u8 * 9, 42]));
        for bw in [0u8, 1, 128, 255] {
            let outcome = detect_change(&img, &img, bw, 0.0).unwrap();
            assert_eq!(outcome.ratio, 0.0);
            assert!(!outcome.keep);
        }
    }

    #[test]
    fn test_half_changed() {
        let prev = solid(10, 10, 0);
        let curr = RgbImage::from_fn(10, 10, |x, _| {
            if x < 5 {
                image::Rgb([255, 255, 255])
            } else {
                image::Rgb([0, 0, 0])
            }
        });
        let outcome = detect_change(&prev, &curr, 128, 0.25).unwrap();
        assert!((outcome.ratio - 0.5).abs() < 1e-12);
        assert!(outcome.keep);

        let outcome = detect_change(&prev, &curr, 128, 0.5).unwrap();
        assert!(!outcome.keep, "threshold comparison is strict");
    }

    #[test]
    fn test_small_differences_below_bw_threshold() {
        let prev = solid(4, 4, 100);
        let curr = solid(4, 4, 110);
        assert_eq!(detect_change(&prev, &curr, 128, 0.0).unwrap().ratio, 0.0);
        assert_eq!(detect_change(&prev, &curr, 10, 0.0).unwrap().ratio, 1.0);
    }

    #[test]
    fn test_size_mismatch_is_compare_error() {
        let err = detect_change(&solid(4, 4, 0), &solid(4, 5, 0), 128, 0.0).unwrap_err();
        assert!(matches!(err, VfsError::FrameCompare { .. }));
        assert!(err.is_frame_scoped());
    }

    #[test]
    fn test_empty_frames_are_compare_error() {
        let err = detect_change(&solid(0, 0, 0), &solid(0, 0, 0), 128, 0.0).unwrap_err();
        assert!(matches!(err, VfsError::FrameCompare { .. }));
    }

    #[test]
    fn test_luma_weights() {
        assert_eq!(luma(&image::Rgb([255, 255, 255])), 255);
        assert_eq!(luma(&image::Rgb([0, 0, 0])), 0);
        assert_eq!(luma(&image::Rgb([255, 0, 0])), 76);
        assert_eq!(luma(&image::Rgb([0, 255, 0])), 150);
        assert_eq!(luma(&image::Rgb([0, 0, 255])), 29);
    }
}
