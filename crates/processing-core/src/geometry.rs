//! Content-aware crop geometry.
//!
//! # Algorithm
//!
//! 1. **Record** the frame size in the metadata. Without predictions the
//!    frame passes through untouched.
//! 2. **Enclose** every boxed prediction in one minimal rectangle. If no
//!    prediction has a box, the frame is not cropped.
//! 3. **Grow** the rectangle by `margin` pixels per side, clamped to the
//!    frame.
//! 4. **Correct** a rectangle narrower than `min_width` (or shorter than
//!    `min_height`) by moving its start back by half the shortfall and
//!    placing its end at `start + min_width`, clamped to the frame.
//! 5. **Cut** `[y0, y1) x [x0, x1)` out of the frame.
//!
//! Step 4 computes the new end from the new start, not from the old end,
//! so a corrected crop can extend past the margin box. Step 5 excludes the
//! inclusive `x1`/`y1` coordinates. Both behaviors are relied on by
//! existing consumers of the crop metadata and are kept as-is.

use image::RgbImage;
use serde::{Deserialize, Serialize};
use vfs_frame_model::{BBoxRecord, CropRectangle, FrameMetadata, FrameSize, Prediction};

/// Parameters for content cropping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CropSettings {
    /// Pixels added around the minimal box on every side.
    pub margin: u32,

    /// Minimum crop width in pixels.
    pub min_width: u32,

    /// Minimum crop height in pixels.
    pub min_height: u32,
}

impl Default for CropSettings {
    fn default() -> Self {
        Self {
            margin: 0,
            min_width: 2,
            min_height: 2,
        }
    }
}

/// Compute the crop rectangle for a frame and record the geometry in
/// `metadata`.
///
/// Returns `None` when the frame should stay as it is: either no analysis
/// ran (`predictions` is `None`) or no prediction carried a box.
pub fn compute_crop(
    size: FrameSize,
    predictions: Option<&[Prediction]>,
    settings: &CropSettings,
    metadata: &mut FrameMetadata,
) -> Option<CropRectangle> {
    metadata.frame = Some(size);
    let predictions = predictions?;

    let width = i64::from(size.width);
    let height = i64::from(size.height);

    let mut enclosing: Option<BBoxRecord> = None;
    for c in predictions.iter().filter_map(|p| p.bbox.map(|b| b.corners())) {
        enclosing = Some(match enclosing {
            None => BBoxRecord::new(c.x0, c.y0, c.x1, c.y1),
            Some(acc) => BBoxRecord::new(
                acc.x0.min(c.x0),
                acc.y0.min(c.y0),
                acc.x1.max(c.x1),
                acc.y1.max(c.y1),
            ),
        });
    }

    let Some(minimal) = enclosing else {
        tracing::debug!(width, height, "No boxed predictions, cannot crop");
        metadata.cropped = Some(false);
        return None;
    };
    metadata.cropped = Some(true);
    metadata.minimal_bbox = Some(minimal);

    let mut b = minimal;
    if settings.margin > 0 {
        let margin = i64::from(settings.margin);
        b = BBoxRecord::new(
            b.x0.saturating_sub(margin).max(0),
            b.y0.saturating_sub(margin).max(0),
            b.x1.saturating_add(margin).min(width - 1),
            b.y1.saturating_add(margin).min(height - 1),
        );
        metadata.margin_bbox = Some(b);
    }

    (b.x0, b.x1) = correct_span(b.x0, b.x1, i64::from(settings.min_width), width);
    (b.y0, b.y1) = correct_span(b.y0, b.y1, i64::from(settings.min_height), height);
    metadata.crop_bbox = Some(b);

    let (x0, x1) = slice_span(b.x0, b.x1, size.width);
    let (y0, y1) = slice_span(b.y0, b.y1, size.height);
    tracing::debug!(x0, y0, x1, y1, "Cropping frame");
    Some(CropRectangle { x0, y0, x1, y1 })
}

/// Widen an inclusive `[start, end]` span to at least `min_len` pixels.
///
/// Saturates instead of overflowing on boxes far outside the frame.
fn correct_span(start: i64, end: i64, min_len: i64, extent: i64) -> (i64, i64) {
    let current = end.saturating_sub(start).saturating_add(1);
    if current >= min_len {
        return (start, end);
    }
    let inc = min_len.saturating_sub(current).div_euclid(2);
    let start = start.saturating_sub(inc).max(0);
    let end = start.saturating_add(min_len).min(extent - 1);
    (start, end)
}

/// Turn a corrected span into a non-empty half-open slice inside `[0, extent)`.
fn slice_span(start: i64, end: i64, extent: u32) -> (u32, u32) {
    let extent_i = i64::from(extent);
    let lo = start.clamp(0, (extent_i - 1).max(0));
    let hi = end.clamp(lo + 1, extent_i.max(lo + 1));
    (lo as u32, hi as u32)
}

/// Crop `frame` to the content covered by `predictions`.
///
/// Returns the input frame unchanged when [`compute_crop`] finds nothing
/// to crop to.
pub fn crop_frame(
    frame: RgbImage,
    predictions: Option<&[Prediction]>,
    settings: &CropSettings,
    metadata: &mut FrameMetadata,
) -> RgbImage {
    let size = FrameSize {
        width: frame.width(),
        height: frame.height(),
    };
    match compute_crop(size, predictions, settings, metadata) {
        Some(rect) if !rect.is_full(size) => {
            image::imageops::crop_imm(&frame, rect.x0, rect.y0, rect.width(), rect.height())
                .to_image()
        }
        _ => frame,
    }
}
