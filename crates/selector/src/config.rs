//! Per-run selection settings.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use vfs_common::error::{VfsError, VfsResult};
use vfs_frame_model::OutputKind;
use vfs_processing_core::{ChangeDetector, CropSettings, LabelPolicy};

/// Which source frames are considered at all.
///
/// Frame numbers are 1-based positions in the source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameWindow {
    /// Every nth frame is considered.
    pub nth_frame: u64,

    /// First frame to consider (inclusive).
    pub from_frame: Option<u64>,

    /// Last frame to consider (inclusive).
    pub to_frame: Option<u64>,

    /// Stop after this many frames were emitted.
    pub max_frames: Option<u64>,
}

impl Default for FrameWindow {
    fn default() -> Self {
        Self {
            nth_frame: 10,
            from_frame: None,
            to_frame: None,
            max_frames: None,
        }
    }
}

impl FrameWindow {
    /// Build a window from command-line style values, where anything `<= 0`
    /// means "no limit".
    pub fn from_limits(nth_frame: u64, max_frames: i64, from_frame: i64, to_frame: i64) -> Self {
        Self {
            nth_frame,
            from_frame: positive(from_frame),
            to_frame: positive(to_frame),
            max_frames: positive(max_frames),
        }
    }

    pub fn before_start(&self, frame_no: u64) -> bool {
        self.from_frame.is_some_and(|from| frame_no < from)
    }

    pub fn past_end(&self, frame_no: u64) -> bool {
        self.to_frame.is_some_and(|to| frame_no > to)
    }

    pub fn budget_spent(&self, emitted: u64) -> bool {
        self.max_frames.is_some_and(|max| emitted >= max)
    }
}

fn positive(value: i64) -> Option<u64> {
    u64::try_from(value).ok().filter(|v| *v > 0)
}

/// Everything the selection loop needs to know about one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectorConfig {
    pub window: FrameWindow,

    /// Change detection settings; `None` disables pruning.
    pub prune: Option<ChangeDetector>,

    /// How long to wait for each analysis result.
    pub analysis_timeout: Duration,

    /// Label rules applied to analysis results.
    pub policy: LabelPolicy,

    /// Content crop settings; `None` disables cropping.
    pub crop: Option<CropSettings>,

    /// Kind of output being written. Video output never crops.
    pub output_kind: OutputKind,

    /// Log a progress line every this many source frames (0 = never).
    pub progress: u64,
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            window: FrameWindow::default(),
            prune: None,
            analysis_timeout: Duration::from_secs(10),
            policy: LabelPolicy::default(),
            crop: None,
            output_kind: OutputKind::Jpg,
            progress: 100,
        }
    }
}

impl SelectorConfig {
    /// Check the settings for contradictions before any resource is opened.
    pub fn validate(&self) -> VfsResult<()> {
        let window = &self.window;
        if window.nth_frame == 0 {
            return Err(VfsError::config("nth_frame must be at least 1"));
        }
        if let (Some(from), Some(to)) = (window.from_frame, window.to_frame) {
            if from > to {
                return Err(VfsError::config(format!(
                    "from_frame ({from}) cannot be larger than to_frame ({to})"
                )));
            }
        }

        if let Some(detector) = &self.prune {
            if !(0.0..=1.0).contains(&detector.change_threshold) {
                return Err(VfsError::config(format!(
                    "change_threshold must be within 0.0-1.0, got {}",
                    detector.change_threshold
                )));
            }
        }

        if self.analysis_timeout.is_zero() {
            return Err(VfsError::config("Analysis timeout must be positive"));
        }
        if !self.policy.min_score.is_finite() {
            return Err(VfsError::config(format!(
                "min_score must be a finite number, got {}",
                self.policy.min_score
            )));
        }

        if let Some(crop) = &self.crop {
            if crop.min_width == 0 || crop.min_height == 0 {
                return Err(VfsError::config(format!(
                    "Minimum crop size must be at least 1x1, got {}x{}",
                    crop.min_width, crop.min_height
                )));
            }
        }
        Ok(())
    }

    /// Crop settings in effect, taking the output kind into account.
    ///
    /// Video output needs every frame at the source size, so cropping is
    /// switched off for it.
    pub fn effective_crop(&self) -> Option<&CropSettings> {
        match self.output_kind {
            OutputKind::Mjpg => None,
            OutputKind::Jpg => self.crop.as_ref(),
        }
    }
}
