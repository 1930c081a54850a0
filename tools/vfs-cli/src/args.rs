//! Command-line arguments shared by the selection subcommands.

use std::path::PathBuf;

use clap::Args;
use vfs_analysis_transport::ChannelScope;
use vfs_common::clock::secs_to_duration;
use vfs_frame_model::{AnalysisFormat, InputKind, OutputKind, OutputPattern};
use vfs_processing_core::{ChangeDetector, CropSettings, LabelPolicy};
use vfs_selector::{FrameWindow, OutputSettings, SelectorConfig};

/// Input, frame window, pruning, admission and output options.
#[derive(Args, Debug, Clone)]
pub struct SelectionArgs {
    /// Directory with images, video file, or webcam index
    #[arg(long, value_name = "DIR_OR_FILE_OR_ID")]
    pub input: String,

    /// Type of input: image-dir, video, webcam
    #[arg(long)]
    pub input_type: InputKind,

    /// Every nth frame is considered
    #[arg(long, default_value = "10")]
    pub nth_frame: u64,

    /// Stop after this many frames were written (<= 0 for unlimited)
    #[arg(long, default_value = "0", allow_negative_numbers = true)]
    pub max_frames: i64,

    /// First frame to consider, inclusive (ignored if <= 0)
    #[arg(long, default_value = "-1", allow_negative_numbers = true)]
    pub from_frame: i64,

    /// Last frame to consider, inclusive (ignored if <= 0)
    #[arg(long, default_value = "-1", allow_negative_numbers = true)]
    pub to_frame: i64,

    /// Drop frames that barely changed since the last kept one
    #[arg(long)]
    pub prune: bool,

    /// Luma difference (0-255) from which a pixel counts as changed (requires --prune)
    #[arg(long, default_value = "128")]
    pub bw_threshold: u8,

    /// Share of changed pixels (0.0-1.0) that must be exceeded (requires --prune)
    #[arg(long, default_value = "0.0")]
    pub change_threshold: f64,

    /// Format of the analysis results [default: rois-csv for files, opex-json for redis]
    #[arg(long)]
    pub analysis_type: Option<AnalysisFormat>,

    /// Minimum score for a prediction to count
    #[arg(long, default_value = "0.0")]
    pub min_score: f64,

    /// Comma-separated labels that keep a frame
    #[arg(long, value_delimiter = ',')]
    pub required_labels: Vec<String>,

    /// Comma-separated labels that drop a frame
    #[arg(long, value_delimiter = ',')]
    pub excluded_labels: Vec<String>,

    /// Output directory for images, or output file for video
    #[arg(long)]
    pub output: PathBuf,

    /// Type of output: jpg, mjpg
    #[arg(long, default_value = "jpg")]
    pub output_type: OutputKind,

    /// File name pattern for image output, must expand an integer
    #[arg(long, default_value = "%06d.jpg")]
    pub output_format: OutputPattern,

    /// Write images here first and then move them into the output directory
    #[arg(long)]
    pub output_tmp: Option<PathBuf>,

    /// Frame rate of video output
    #[arg(long, default_value = "25")]
    pub output_fps: u32,

    /// Write a YAML metadata file next to each image
    #[arg(long)]
    pub output_metadata: bool,

    /// Crop kept frames to the boxes of their predictions (image output only)
    #[arg(long)]
    pub crop_to_content: bool,

    /// Pixels added around the predictions when cropping
    #[arg(long, default_value = "0")]
    pub crop_margin: u32,

    /// Minimum width of a cropped frame
    #[arg(long, default_value = "2")]
    pub crop_min_width: u32,

    /// Minimum height of a cropped frame
    #[arg(long, default_value = "2")]
    pub crop_min_height: u32,

    /// Log a progress line every this many frames
    #[arg(long, default_value = "100")]
    pub progress: u64,

    /// Keep the source file names when reading an image directory
    #[arg(long)]
    pub keep_original: bool,
}

impl SelectionArgs {
    pub fn selector_config(&self, analysis_timeout_secs: f64) -> SelectorConfig {
        SelectorConfig {
            window: FrameWindow::from_limits(
                self.nth_frame,
                self.max_frames,
                self.from_frame,
                self.to_frame,
            ),
            prune: self.prune.then_some(ChangeDetector {
                bw_threshold: self.bw_threshold,
                change_threshold: self.change_threshold,
            }),
            analysis_timeout: secs_to_duration(analysis_timeout_secs),
            policy: LabelPolicy {
                min_score: self.min_score,
                required_labels: clean_labels(&self.required_labels),
                excluded_labels: clean_labels(&self.excluded_labels),
            },
            crop: self.crop_to_content.then_some(CropSettings {
                margin: self.crop_margin,
                min_width: self.crop_min_width,
                min_height: self.crop_min_height,
            }),
            output_kind: self.output_type,
            progress: self.progress,
        }
    }

    pub fn output_settings(&self) -> OutputSettings {
        OutputSettings {
            kind: self.output_type,
            path: self.output.clone(),
            pattern: self.output_format.clone(),
            tmp_dir: self.output_tmp.clone(),
            fps: self.output_fps,
            metadata: self.output_metadata,
            keep_original: self.keep_original,
        }
    }
}

fn clean_labels(labels: &[String]) -> Vec<String> {
    labels
        .iter()
        .map(|l| l.trim())
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect()
}

/// Parse a strictly positive, finite number of seconds.
fn positive_seconds(raw: &str) -> Result<f64, String> {
    let secs: f64 = raw
        .parse()
        .map_err(|_| format!("{raw:?} is not a number of seconds"))?;
    if secs.is_finite() && secs > 0.0 {
        Ok(secs)
    } else {
        Err(format!("{raw} must be a positive number of seconds"))
    }
}

/// Directory exchange options.
#[derive(Args, Debug, Clone)]
pub struct FileExchangeArgs {
    /// Directory the analyzer reads images from; without it every frame is accepted
    #[arg(long, value_name = "DIR")]
    pub analysis_input: Option<PathBuf>,

    /// Directory the analyzer writes its results to
    #[arg(long, value_name = "DIR")]
    pub analysis_output: Option<PathBuf>,

    /// Write images here first and then move them into the analysis input directory
    #[arg(long, value_name = "DIR")]
    pub analysis_tmp: Option<PathBuf>,

    /// Seconds to wait for an analysis result, must be positive [default: from config, 10]
    #[arg(long, value_name = "SECONDS", value_parser = positive_seconds)]
    pub analysis_timeout: Option<f64>,

    /// Keep images and result files after the exchange
    #[arg(long)]
    pub analysis_keep_files: bool,

    /// Seconds between checks for a result file, must be positive [default: from config, 0.1]
    #[arg(long, value_name = "SECONDS", value_parser = positive_seconds)]
    pub poll_interval: Option<f64>,
}

/// Redis exchange options.
#[derive(Args, Debug, Clone)]
pub struct RedisArgs {
    /// Redis connection URL [default: from config, redis://localhost:6379/0]
    #[arg(long, env = "VFS_REDIS_URL")]
    pub redis_url: Option<String>,

    /// Channel frames are published on [default: from config, images]
    #[arg(long)]
    pub redis_out: Option<String>,

    /// Channel predictions arrive on [default: from config, predictions]
    #[arg(long)]
    pub redis_in: Option<String>,

    /// Seconds to wait for a reply, must be positive; there is no unbounded wait
    /// [default: from config, 10]
    #[arg(long, value_name = "SECONDS", value_parser = positive_seconds)]
    pub redis_timeout: Option<f64>,

    /// Reply correlation: per-frame channels or the shared channels as given
    #[arg(long, default_value = "per-frame")]
    pub channel_scope: ChannelScope,
}
