//! Directory-based exchange with a watcher process.
//!
//! Directory contract, for frame 42 and a ROI table analyzer:
//!
//! ```text
//! tmp/000042.jpg      (optional, renamed into input/ once fully written)
//! input/000042.jpg    picked up by the analyzer
//! output/000042-rois.csv or output/000042.csv   result, first one found wins
//! output/000042.jpg   optional copy the analyzer may leave behind
//! ```
//!
//! Detection document analyzers write `output/000042.json` instead.

use std::path::{Path, PathBuf};
use std::time::Duration;

use image::RgbImage;
use vfs_common::clock::{poll_until, Deadline};
use vfs_common::error::{VfsError, VfsResult};
use vfs_frame_model::{exchange_image_name, load_analysis, AnalysisFormat};

use crate::encode::encode_jpeg;
use crate::{AnalysisReply, AnalysisTransport};

/// Configuration for [`FileExchange`].
#[derive(Debug, Clone)]
pub struct FileExchangeConfig {
    /// Directory the analyzer watches for images.
    pub input_dir: PathBuf,

    /// Directory the analyzer writes results to.
    pub output_dir: PathBuf,

    /// Staging directory for atomic hand-over into `input_dir`.
    pub tmp_dir: Option<PathBuf>,

    /// Result format to look for.
    pub format: AnalysisFormat,

    /// Time between checks for a result file.
    pub poll_interval: Duration,

    /// Keep images and result files after a successful exchange.
    pub keep_files: bool,
}

impl FileExchangeConfig {
    pub fn new(input_dir: impl Into<PathBuf>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            input_dir: input_dir.into(),
            output_dir: output_dir.into(),
            tmp_dir: None,
            format: AnalysisFormat::RoisCsv,
            poll_interval: Duration::from_millis(100),
            keep_files: false,
        }
    }
}

/// Analysis transport over a pair of watched directories.
pub struct FileExchange {
    config: FileExchangeConfig,
}

impl FileExchange {
    /// Create the exchange, checking that all directories exist.
    pub fn new(config: FileExchangeConfig) -> VfsResult<Self> {
        let dirs = [
            Some(("analysis input", &config.input_dir)),
            Some(("analysis output", &config.output_dir)),
            config.tmp_dir.as_ref().map(|d| ("analysis tmp", d)),
        ];
        for (what, dir) in dirs.into_iter().flatten() {
            if !dir.is_dir() {
                return Err(VfsError::config(format!(
                    "{what} directory does not exist: {}",
                    dir.display()
                )));
            }
        }
        Ok(Self { config })
    }

    pub fn config(&self) -> &FileExchangeConfig {
        &self.config
    }

    /// Write the frame into the input directory, staging it in the tmp
    /// directory first when one is configured.
    fn hand_over(&self, frame: &RgbImage, name: &str) -> VfsResult<PathBuf> {
        let bytes = encode_jpeg(frame)?;
        let input_path = self.config.input_dir.join(name);

        match &self.config.tmp_dir {
            Some(tmp_dir) => {
                let tmp_path = tmp_dir.join(name);
                tracing::trace!(path = %tmp_path.display(), "Writing analysis image");
                std::fs::write(&tmp_path, &bytes).map_err(|e| io_failure("write", &tmp_path, e))?;
                std::fs::rename(&tmp_path, &input_path)
                    .map_err(|e| io_failure("rename", &tmp_path, e))?;
            }
            None => {
                tracing::trace!(path = %input_path.display(), "Writing analysis image");
                std::fs::write(&input_path, &bytes)
                    .map_err(|e| io_failure("write", &input_path, e))?;
            }
        }
        Ok(input_path)
    }
}

impl AnalysisTransport for FileExchange {
    fn name(&self) -> &str {
        "file-exchange"
    }

    fn format(&self) -> AnalysisFormat {
        self.config.format
    }

    fn dispatch(
        &mut self,
        frame: &RgbImage,
        frame_id: u64,
        timeout: Duration,
    ) -> VfsResult<AnalysisReply> {
        let name = exchange_image_name(frame_id);
        let deadline = Deadline::after(timeout);
        let input_path = self.hand_over(frame, &name)?;
        let echo_path = self.config.output_dir.join(&name);
        let candidates: Vec<PathBuf> = self
            .config
            .format
            .result_names(frame_id)
            .into_iter()
            .map(|n| self.config.output_dir.join(n))
            .collect();

        let found = poll_until(&deadline, self.config.poll_interval, || {
            candidates.iter().find(|p| p.exists()).cloned()
        });

        let Some(result_path) = found else {
            tracing::debug!(frame = frame_id, "No analysis result before timeout");
            remove_if_present(&input_path);
            remove_if_present(&echo_path);
            for candidate in &candidates {
                remove_if_present(candidate);
            }
            return Err(VfsError::timeout(frame_id, deadline.elapsed()));
        };

        tracing::debug!(frame = frame_id, path = %result_path.display(), "Reading analysis result");
        let parsed = load_analysis(self.config.format, &result_path);

        if !self.config.keep_files {
            remove_if_present(&input_path);
            remove_if_present(&echo_path);
            for candidate in &candidates {
                remove_if_present(candidate);
            }
        }

        Ok(AnalysisReply::new(parsed?))
    }
}

fn io_failure(action: &str, path: &Path, e: std::io::Error) -> VfsError {
    VfsError::transport(format!("Failed to {action} {}: {e}", path.display()))
}

fn remove_if_present(path: &Path) {
    match std::fs::remove_file(path) {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => tracing::warn!(path = %path.display(), error = %e, "Failed to remove exchange file"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_dirs(name: &str) -> (PathBuf, PathBuf, PathBuf) {
        let root = std::env::temp_dir().join(format!("vfs_test_fx_{name}"));
        let _ = std::fs::remove_dir_all(&root);
        let input = root.join("in");
        let output = root.join("out");
        std::fs::create_dir_all(&input).unwrap();
        std::fs::create_dir_all(&output).unwrap();
        (root, input, output)
    }

    #[test]
    fn test_missing_directory_is_config_error() {
        let config = FileExchangeConfig::new("/nonexistent/vfs/in", "/nonexistent/vfs/out");
        let err = FileExchange::new(config).err().unwrap();
        assert!(matches!(err, VfsError::Config { .. }));
    }

    #[test]
    fn test_result_already_present_is_picked_up() {
        let (root, input, output) = temp_dirs("present");
        std::fs::write(output.join("000003.csv"), "label_str,score\ncat,0.8\n").unwrap();

        let mut fx = FileExchange::new(FileExchangeConfig::new(&input, &output)).unwrap();
        let frame = RgbImage::new(8, 8);
        let reply = fx.dispatch(&frame, 3, Duration::from_secs(1)).unwrap();

        assert_eq!(reply.predictions.len(), 1);
        assert_eq!(reply.predictions[0].label, "cat");
        assert_eq!(reply.metadata.num_predictions, Some(1));
        assert!(!output.join("000003.csv").exists());
        assert!(!input.join("000003.jpg").exists());

        let _ = std::fs::remove_dir_all(&root);
    }

    #[test]
    fn test_rois_suffix_preferred() {
        let (root, input, output) = temp_dirs("priority");
        std::fs::write(output.join("000001-rois.csv"), "label_str\nfirst\n").unwrap();
        std::fs::write(output.join("000001.csv"), "label_str\nsecond\n").unwrap();

        let mut fx = FileExchange::new(FileExchangeConfig::new(&input, &output)).unwrap();
        let reply = fx
            .dispatch(&RgbImage::new(4, 4), 1, Duration::from_millis(200))
            .unwrap();
        assert_eq!(reply.predictions[0].label, "first");
        assert!(!output.join("000001-rois.csv").exists());
        assert!(!output.join("000001.csv").exists());

        let _ = std::fs::remove_dir_all(&root);
    }

    #[test]
    fn test_keep_files_retains_artifacts() {
        let (root, input, output) = temp_dirs("keep");
        std::fs::write(output.join("000005.json"), r#"{"objects": []}"#).unwrap();

        let mut config = FileExchangeConfig::new(&input, &output);
        config.format = AnalysisFormat::OpexJson;
        config.keep_files = true;
        let mut fx = FileExchange::new(config).unwrap();
        let reply = fx
            .dispatch(&RgbImage::new(4, 4), 5, Duration::from_millis(200))
            .unwrap();

        assert!(reply.predictions.is_empty());
        assert!(output.join("000005.json").exists());
        assert!(input.join("000005.jpg").exists());

        let _ = std::fs::remove_dir_all(&root);
    }

    #[test]
    fn test_malformed_result_is_parse_error_and_cleaned() {
        let (root, input, output) = temp_dirs("malformed");
        std::fs::write(output.join("000009.json"), "{ nope").unwrap();

        let mut config = FileExchangeConfig::new(&input, &output);
        config.format = AnalysisFormat::OpexJson;
        let mut fx = FileExchange::new(config).unwrap();
        let err = fx
            .dispatch(&RgbImage::new(4, 4), 9, Duration::from_millis(200))
            .unwrap_err();

        assert!(matches!(err, VfsError::Parse { .. }));
        assert!(!output.join("000009.json").exists());
        assert!(!input.join("000009.jpg").exists());

        let _ = std::fs::remove_dir_all(&root);
    }
}
