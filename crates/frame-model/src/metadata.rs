//! Per-frame diagnostic metadata and crop rectangles.

use serde::{Deserialize, Serialize};

/// Frame dimensions in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameSize {
    pub width: u32,
    pub height: u32,
}

/// An inclusive bounding box as recorded in metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BBoxRecord {
    pub x0: i64,
    pub y0: i64,
    pub x1: i64,
    pub y1: i64,
}

impl BBoxRecord {
    pub fn new(x0: i64, y0: i64, x1: i64, y1: i64) -> Self {
        Self { x0, y0, x1, y1 }
    }

    /// Whether `other` lies entirely within this box.
    pub fn contains(&self, other: &BBoxRecord) -> bool {
        self.x0 <= other.x0 && self.y0 <= other.y0 && self.x1 >= other.x1 && self.y1 >= other.y1
    }
}

/// Diagnostic fields gathered while one frame moves through the pipeline.
///
/// Built fresh for every frame and written once next to the output image.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FrameMetadata {
    /// Source frame dimensions.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frame: Option<FrameSize>,

    /// Number of predictions in the analysis result.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub num_predictions: Option<usize>,

    /// Whether content cropping was applied.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cropped: Option<bool>,

    /// Box enclosing all predictions.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub minimal_bbox: Option<BBoxRecord>,

    /// Minimal box grown by the crop margin.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub margin_bbox: Option<BBoxRecord>,

    /// Final crop box after minimum size correction.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub crop_bbox: Option<BBoxRecord>,
}

impl FrameMetadata {
    /// Serialize as a YAML document.
    pub fn to_yaml(&self) -> Result<String, serde_yaml::Error> {
        serde_yaml::to_string(self)
    }

    /// Parse a YAML document written by [`FrameMetadata::to_yaml`].
    pub fn from_yaml(text: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(text)
    }
}

/// A half-open pixel rectangle `[x0, x1) x [y0, y1)` inside a frame.
///
/// Always satisfies `x0 < x1 <= width` and `y0 < y1 <= height` for the
/// frame it was built for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CropRectangle {
    pub x0: u32,
    pub y0: u32,
    pub x1: u32,
    pub y1: u32,
}

impl CropRectangle {
    /// The whole frame.
    pub fn full(size: FrameSize) -> Self {
        Self {
            x0: 0,
            y0: 0,
            x1: size.width,
            y1: size.height,
        }
    }

    pub fn width(&self) -> u32 {
        self.x1 - self.x0
    }

    pub fn height(&self) -> u32 {
        self.y1 - self.y0
    }

    /// Whether this rectangle covers the full frame.
    pub fn is_full(&self, size: FrameSize) -> bool {
        *self == Self::full(size)
    }
}
