//! Prediction types produced by the analysis wire parsers.

use serde::{Deserialize, Serialize};

/// Field order of the four values stored in a [`BoxCoords`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BoxLayout {
    /// `(x0, y0, x1, y1)`: ROI tables.
    Corners,
    /// `(left, top, bottom, right)`: detection documents.
    LeftTopBottomRight,
}

/// A bounding box exactly as the analyzer reported it.
///
/// The raw tuple keeps the source field order. Use [`BoxCoords::corners`]
/// before doing any geometry with it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoxCoords {
    values: [i64; 4],
    layout: BoxLayout,
}

/// An axis-aligned box in `(x0, y0, x1, y1)` order, inclusive corners.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Corners {
    pub x0: i64,
    pub y0: i64,
    pub x1: i64,
    pub y1: i64,
}

impl BoxCoords {
    /// Box from `(x0, y0, x1, y1)`.
    pub fn from_corners(x0: i64, y0: i64, x1: i64, y1: i64) -> Self {
        Self {
            values: [x0, y0, x1, y1],
            layout: BoxLayout::Corners,
        }
    }

    /// Box from `(left, top, bottom, right)`.
    pub fn from_ltbr(left: i64, top: i64, bottom: i64, right: i64) -> Self {
        Self {
            values: [left, top, bottom, right],
            layout: BoxLayout::LeftTopBottomRight,
        }
    }

    /// The four values in source field order.
    pub fn raw(&self) -> (i64, i64, i64, i64) {
        let [a, b, c, d] = self.values;
        (a, b, c, d)
    }

    pub fn layout(&self) -> BoxLayout {
        self.layout
    }

    /// Normalize to `(x0, y0, x1, y1)` with `x0 <= x1` and `y0 <= y1`,
    /// regardless of source layout or of reversed edges.
    pub fn corners(&self) -> Corners {
        let [a, b, c, d] = self.values;
        let (xa, ya, xb, yb) = match self.layout {
            BoxLayout::Corners => (a, b, c, d),
            BoxLayout::LeftTopBottomRight => (a, b, d, c),
        };
        Corners {
            x0: xa.min(xb),
            y0: ya.min(yb),
            x1: xa.max(xb),
            y1: ya.max(yb),
        }
    }
}

/// One labeled, scored detection for a frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    /// 0-based position in the analyzer output.
    pub index: usize,

    /// Label string, empty when the analyzer reported none.
    pub label: String,

    /// Confidence score.
    pub score: f64,

    /// Bounding box, if the analyzer reported one.
    pub bbox: Option<BoxCoords>,
}

impl Prediction {
    pub fn new(index: usize, label: impl Into<String>, score: f64) -> Self {
        Self {
            index,
            label: label.into(),
            score,
            bbox: None,
        }
    }

    /// Attach a bounding box.
    pub fn with_box(mut self, bbox: BoxCoords) -> Self {
        self.bbox = Some(bbox);
        self
    }
}

impl std::fmt::Display for Prediction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {} = {:.6}", self.index, self.label, self.score)?;
        if let Some(bbox) = &self.bbox {
            let c = bbox.corners();
            write!(f, " [{},{} - {},{}]", c.x0, c.y0, c.x1, c.y1)?;
        }
        Ok(())
    }
}

/// Ordered predictions for one frame, in analyzer output order.
pub type PredictionSet = Vec<Prediction>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ltbr_keeps_raw_order() {
        let bbox = BoxCoords::from_ltbr(10, 20, 80, 60);
        assert_eq!(bbox.raw(), (10, 20, 80, 60));
        assert_eq!(bbox.layout(), BoxLayout::LeftTopBottomRight);
        assert_eq!(
            bbox.corners(),
            Corners {
                x0: 10,
                y0: 20,
                x1: 60,
                y1: 80
            }
        );
    }

    #[test]
    fn test_reversed_ltbr_box_is_ordered() {
        let bbox = BoxCoords::from_ltbr(60, 80, 20, 10);
        assert_eq!(bbox.raw(), (60, 80, 20, 10));
        assert_eq!(
            bbox.corners(),
            Corners {
                x0: 10,
                y0: 20,
                x1: 60,
                y1: 80
            }
        );
    }

    #[test]
    fn test_reversed_corner_box_is_ordered() {
        let c = BoxCoords::from_corners(9, 2, 3, 1).corners();
        assert_eq!((c.x0, c.y0, c.x1, c.y1), (3, 1, 9, 2));
    }

    #[test]
    fn test_corners_identity() {
        let bbox = BoxCoords::from_corners(1, 2, 3, 4);
        assert_eq!(bbox.raw(), (1, 2, 3, 4));
        let c = bbox.corners();
        assert_eq!((c.x0, c.y0, c.x1, c.y1), (1, 2, 3, 4));
    }

    #[test]
    fn test_prediction_display() {
        let p = Prediction::new(0, "cat", 0.5);
        assert_eq!(p.to_string(), "0: cat = 0.500000");
        let p = p.with_box(BoxCoords::from_corners(1, 2, 3, 4));
        assert_eq!(p.to_string(), "0: cat = 0.500000 [1,2 - 3,4]");
    }
}
