//! Closed kind enumerations and exchange file naming.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Where frames come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputKind {
    /// A directory of `.jpg`/`.png` images, processed in sorted order.
    ImageDir,
    /// A video file.
    Video,
    /// A webcam, identified by its numeric device index.
    Webcam,
}

/// Which result format the analyzer produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisFormat {
    /// ROI table, `-rois.csv` or `.csv`.
    RoisCsv,
    /// Detection document, `.json`.
    OpexJson,
}

/// How kept frames are written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputKind {
    /// One JPEG file per frame in a directory.
    Jpg,
    /// A single MJPEG video container.
    Mjpg,
}

macro_rules! kind_strings {
    ($ty:ty, $what:literal, { $($variant:path => $name:literal),+ $(,)? }) => {
        impl $ty {
            /// Canonical name as used on the command line.
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($variant => $name,)+
                }
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $ty {
            type Err = String;

            /// Accepts the canonical name with either `_` or `-` separators.
            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let normalized = s.trim().to_ascii_lowercase().replace('-', "_");
                match normalized.as_str() {
                    $($name => Ok($variant),)+
                    _ => Err(format!(
                        concat!("unknown ", $what, " '{}' (expected one of: {})"),
                        s,
                        [$($name),+].join(", ")
                    )),
                }
            }
        }
    };
}

kind_strings!(InputKind, "input type", {
    InputKind::ImageDir => "image_dir",
    InputKind::Video => "video",
    InputKind::Webcam => "webcam",
});

kind_strings!(AnalysisFormat, "analysis type", {
    AnalysisFormat::RoisCsv => "rois_csv",
    AnalysisFormat::OpexJson => "opex_json",
});

kind_strings!(OutputKind, "output type", {
    OutputKind::Jpg => "jpg",
    OutputKind::Mjpg => "mjpg",
});

/// File name of a frame handed to the analyzer, e.g. `000042.jpg`.
pub fn exchange_image_name(frame_id: u64) -> String {
    format!("{frame_id:06}.jpg")
}

impl AnalysisFormat {
    /// Candidate result file names for a frame, in lookup priority order.
    pub fn result_names(&self, frame_id: u64) -> Vec<String> {
        match self {
            Self::RoisCsv => vec![
                format!("{frame_id:06}-rois.csv"),
                format!("{frame_id:06}.csv"),
            ],
            Self::OpexJson => vec![format!("{frame_id:06}.json")],
        }
    }
}

/// A printf-style output file name pattern such as `%06d.jpg`.
///
/// Exactly one integer directive (`%d`, `%5d`, `%06d`) is required; `%%`
/// yields a literal percent sign.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputPattern {
    prefix: String,
    suffix: String,
    zero_pad: bool,
    width: usize,
}

impl OutputPattern {
    /// Parse and validate a pattern.
    pub fn parse(pattern: &str) -> Result<Self, String> {
        let mut prefix = String::new();
        let mut suffix = String::new();
        let mut directive: Option<(bool, usize)> = None;
        let mut chars = pattern.chars().peekable();

        while let Some(c) = chars.next() {
            let target = if directive.is_some() {
                &mut suffix
            } else {
                &mut prefix
            };
            if c != '%' {
                target.push(c);
                continue;
            }
            if chars.peek() == Some(&'%') {
                chars.next();
                target.push('%');
                continue;
            }

            let zero_pad = chars.peek() == Some(&'0');
            if zero_pad {
                chars.next();
            }
            let mut digits = String::new();
            while let Some(d) = chars.peek().copied().filter(char::is_ascii_digit) {
                digits.push(d);
                chars.next();
            }
            if chars.next() != Some('d') {
                return Err(format!(
                    "Output format has an unsupported directive: {pattern}"
                ));
            }
            if directive.is_some() {
                return Err(format!(
                    "Output format expands more than one integer: {pattern}"
                ));
            }
            let width = if digits.is_empty() {
                0
            } else {
                digits
                    .parse()
                    .map_err(|_| format!("Output format width is invalid: {pattern}"))?
            };
            directive = Some((zero_pad, width));
        }

        match directive {
            Some((zero_pad, width)) => Ok(Self {
                prefix,
                suffix,
                zero_pad,
                width,
            }),
            None => Err(format!(
                "Output format does not expand integers: {pattern}"
            )),
        }
    }

    /// Expand the pattern for a frame number.
    pub fn expand(&self, frame_no: u64) -> String {
        let number = if self.zero_pad {
            format!("{frame_no:0width$}", width = self.width)
        } else {
            format!("{frame_no:width$}", width = self.width)
        };
        format!("{}{}{}", self.prefix, number, self.suffix)
    }
}

impl Default for OutputPattern {
    fn default() -> Self {
        Self {
            prefix: String::new(),
            suffix: ".jpg".to_string(),
            zero_pad: true,
            width: 6,
        }
    }
}

impl FromStr for OutputPattern {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}
