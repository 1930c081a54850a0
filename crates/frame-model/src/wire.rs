//! Parsers for the two analyzer output formats.
//!
//! - **ROI table** (CSV): header-driven, recognized columns `score`,
//!   `label_str`, and either `x0,y0,x1,y1` or `x,y,w,h`.
//! - **Detection document** (JSON): `{"objects": [{"label", "score",
//!   "bbox": {"left", "top", "bottom", "right"}}]}`.
//!
//! Both formats can be parsed from a path ([`load_analysis`]) or from memory
//! (`parse_*`). In-memory input may be text or raw bytes; bytes are decoded
//! as UTF-8, replacing invalid sequences.

use std::borrow::Cow;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use vfs_common::error::VfsError;

use crate::kinds::AnalysisFormat;
use crate::prediction::{BoxCoords, Prediction, PredictionSet};

/// Errors raised while parsing analyzer output.
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("Malformed row {row}: {message}")]
    MalformedRow { row: usize, message: String },

    #[error("Malformed document: {message}")]
    MalformedDocument { message: String },

    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

impl ParseError {
    fn row(row: usize, message: impl Into<String>) -> Self {
        Self::MalformedRow {
            row,
            message: message.into(),
        }
    }

    fn document(message: impl Into<String>) -> Self {
        Self::MalformedDocument {
            message: message.into(),
        }
    }
}

impl From<ParseError> for VfsError {
    fn from(err: ParseError) -> Self {
        VfsError::parse(err.to_string())
    }
}

/// Parse analyzer output of the given format from memory.
pub fn parse_analysis(
    format: AnalysisFormat,
    data: impl AsRef<[u8]>,
) -> Result<PredictionSet, ParseError> {
    match format {
        AnalysisFormat::RoisCsv => parse_rois_csv(data),
        AnalysisFormat::OpexJson => parse_detection_json(data),
    }
}

/// Load analyzer output of the given format from a file.
pub fn load_analysis(format: AnalysisFormat, path: &Path) -> Result<PredictionSet, ParseError> {
    parse_analysis(format, read_file(path)?)
}

fn read_file(path: &Path) -> Result<Vec<u8>, ParseError> {
    std::fs::read(path).map_err(|source| ParseError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn decode(data: &[u8]) -> Cow<'_, str> {
    String::from_utf8_lossy(data)
}

/// Largest magnitude accepted for a box coordinate or extent.
pub const MAX_COORDINATE: i64 = i32::MAX as i64;

/// Truncate a finite value toward zero, rejecting anything outside
/// `±MAX_COORDINATE`.
fn to_coordinate(value: f64) -> Option<i64> {
    let v = value.trunc();
    (v.abs() <= MAX_COORDINATE as f64).then_some(v as i64)
}

// ---------------------------------------------------------------------------
// ROI table
// ---------------------------------------------------------------------------

/// Column positions of a four-value box group.
#[derive(Debug, Clone, Copy)]
struct BoxColumns([usize; 4]);

#[derive(Debug)]
enum BoxSchema {
    Corners(BoxColumns),
    Extent(BoxColumns),
    None,
}

#[derive(Debug)]
struct RoiSchema {
    score: Option<usize>,
    label: Option<usize>,
    bbox: BoxSchema,
}

impl RoiSchema {
    fn from_headers(headers: &csv::StringRecord) -> Result<Self, ParseError> {
        let find = |name: &str| headers.iter().position(|h| h == name);
        let group = |names: [&str; 4]| -> Result<Option<BoxColumns>, ParseError> {
            let found = names.map(find);
            match found {
                [Some(a), Some(b), Some(c), Some(d)] => Ok(Some(BoxColumns([a, b, c, d]))),
                [None, None, None, None] => Ok(None),
                _ => Err(ParseError::document(format!(
                    "incomplete column group {}",
                    names.join(",")
                ))),
            }
        };

        let bbox = match (group(["x0", "y0", "x1", "y1"])?, group(["x", "y", "w", "h"])?) {
            (Some(cols), _) => BoxSchema::Corners(cols),
            (None, Some(cols)) => BoxSchema::Extent(cols),
            (None, None) => BoxSchema::None,
        };

        Ok(Self {
            score: find("score"),
            label: find("label_str"),
            bbox,
        })
    }
}

/// Parse a ROI table.
///
/// Score defaults to `1.0` and label to `""` when their columns are absent.
/// When both box groups are present, `x0,y0,x1,y1` wins over `x,y,w,h`.
/// Extent boxes map to `(x, y, x+w-1, y+h-1)`. Box values are read as
/// floating point and truncated toward zero; values beyond
/// [`MAX_COORDINATE`] make the row malformed.
pub fn parse_rois_csv(data: impl AsRef<[u8]>) -> Result<PredictionSet, ParseError> {
    let text = decode(data.as_ref());
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(text.as_bytes());

    let headers = reader
        .headers()
        .map_err(|e| ParseError::document(format!("unreadable header: {e}")))?
        .clone();
    let schema = RoiSchema::from_headers(&headers)?;

    let mut predictions = Vec::new();
    for (row, record) in reader.records().enumerate() {
        let record = record.map_err(|e| ParseError::row(row, e.to_string()))?;
        predictions.push(parse_roi_row(row, &record, &schema)?);
    }
    Ok(predictions)
}

fn parse_roi_row(
    row: usize,
    record: &csv::StringRecord,
    schema: &RoiSchema,
) -> Result<Prediction, ParseError> {
    let field = |col: usize| -> Result<&str, ParseError> {
        record
            .get(col)
            .ok_or_else(|| ParseError::row(row, format!("missing column {col}")))
    };
    let number = |col: usize| -> Result<f64, ParseError> {
        let raw = field(col)?;
        let value: f64 = raw
            .parse()
            .map_err(|_| ParseError::row(row, format!("not a number: {raw:?}")))?;
        if value.is_finite() {
            Ok(value)
        } else {
            Err(ParseError::row(row, format!("not a finite number: {raw:?}")))
        }
    };
    let coord = |col: usize| -> Result<i64, ParseError> {
        let value = number(col)?;
        to_coordinate(value)
            .ok_or_else(|| ParseError::row(row, format!("coordinate out of range: {value}")))
    };

    let score = match schema.score {
        Some(col) => number(col)?,
        None => 1.0,
    };
    let label = match schema.label {
        Some(col) => field(col)?.to_string(),
        None => String::new(),
    };
    let bbox = match schema.bbox {
        BoxSchema::Corners(BoxColumns([x0, y0, x1, y1])) => Some(BoxCoords::from_corners(
            coord(x0)?,
            coord(y0)?,
            coord(x1)?,
            coord(y1)?,
        )),
        BoxSchema::Extent(BoxColumns([x, y, w, h])) => {
            let (x, y) = (coord(x)?, coord(y)?);
            let (w, h) = (coord(w)?, coord(h)?);
            let end = |start: i64, len: i64| {
                start
                    .checked_add(len)
                    .and_then(|v| v.checked_sub(1))
                    .ok_or_else(|| ParseError::row(row, "box extent overflows"))
            };
            Some(BoxCoords::from_corners(x, y, end(x, w)?, end(y, h)?))
        }
        BoxSchema::None => None,
    };

    Ok(Prediction {
        index: row,
        label,
        score,
        bbox,
    })
}

// ---------------------------------------------------------------------------
// Detection document
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct DetectionDocument {
    objects: Vec<DetectedObject>,
}

#[derive(Debug, Deserialize)]
struct DetectedObject {
    label: String,
    score: f64,
    #[serde(default)]
    bbox: Option<DetectedBox>,
}

#[derive(Debug, Deserialize)]
struct DetectedBox {
    left: f64,
    top: f64,
    bottom: f64,
    right: f64,
}

/// Parse a detection document.
///
/// Boxes keep the document's `(left, top, bottom, right)` field order; see
/// [`BoxCoords::corners`] for the normalized form. A box value beyond
/// [`MAX_COORDINATE`] makes the whole document malformed.
pub fn parse_detection_json(data: impl AsRef<[u8]>) -> Result<PredictionSet, ParseError> {
    let text = decode(data.as_ref());
    let doc: DetectionDocument =
        serde_json::from_str(&text).map_err(|e| ParseError::document(e.to_string()))?;

    doc.objects
        .into_iter()
        .enumerate()
        .map(|(index, obj)| {
            let bbox = obj.bbox.map(|b| detected_box(index, &b)).transpose()?;
            Ok(Prediction {
                index,
                label: obj.label,
                score: obj.score,
                bbox,
            })
        })
        .collect()
}

fn detected_box(index: usize, b: &DetectedBox) -> Result<BoxCoords, ParseError> {
    let coord = |name: &str, value: f64| {
        to_coordinate(value).ok_or_else(|| {
            ParseError::document(format!("object {index}: {name} out of range: {value}"))
        })
    };
    Ok(BoxCoords::from_ltbr(
        coord("left", b.left)?,
        coord("top", b.top)?,
        coord("bottom", b.bottom)?,
        coord("right", b.right)?,
    ))
}
