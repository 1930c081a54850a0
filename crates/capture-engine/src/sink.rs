//! Frame sinks.

use std::path::{Path, PathBuf};

use image::RgbImage;
use vfs_common::error::{VfsError, VfsResult};
use vfs_frame_model::{FrameMetadata, OutputPattern};

/// A kept frame on its way out.
#[derive(Debug, Clone, Copy)]
pub struct EmittedFrame<'a> {
    /// Pixel data, possibly cropped.
    pub image: &'a RgbImage,

    /// 1-based source frame number.
    pub frame_no: u64,

    /// File the frame came from, for image directory sources.
    pub origin: Option<&'a Path>,

    /// Diagnostic record for the frame.
    pub metadata: Option<&'a FrameMetadata>,
}

/// Anything that accepts kept frames.
pub trait FrameSink: Send {
    /// Sink name for logging.
    fn name(&self) -> &str;

    /// Write one frame.
    fn write(&mut self, frame: &EmittedFrame<'_>) -> VfsResult<()>;

    /// Flush and finalize the output. Safe to call more than once.
    fn finish(&mut self) -> VfsResult<()>;
}

/// Writes each frame as an image file in a directory, with an optional YAML
/// metadata file next to it.
///
/// File names come from an [`OutputPattern`] applied to the frame number,
/// or from the source file name when `keep_original` is set. With a tmp
/// directory, files are written there first and then renamed into the
/// output directory.
pub struct ImageDirSink {
    output_dir: PathBuf,
    tmp_dir: Option<PathBuf>,
    pattern: OutputPattern,
    keep_original: bool,
    write_metadata: bool,
    written: u64,
}

impl ImageDirSink {
    pub fn new(output_dir: impl Into<PathBuf>, pattern: OutputPattern) -> VfsResult<Self> {
        let output_dir = output_dir.into();
        if !output_dir.is_dir() {
            return Err(VfsError::config(format!(
                "Output directory does not exist: {}",
                output_dir.display()
            )));
        }
        Ok(Self {
            output_dir,
            tmp_dir: None,
            pattern,
            keep_original: false,
            write_metadata: false,
            written: 0,
        })
    }

    /// Stage files in `tmp_dir` before moving them into place.
    pub fn with_tmp_dir(mut self, tmp_dir: Option<PathBuf>) -> VfsResult<Self> {
        if let Some(dir) = &tmp_dir {
            if !dir.is_dir() {
                return Err(VfsError::config(format!(
                    "Output tmp directory does not exist: {}",
                    dir.display()
                )));
            }
        }
        self.tmp_dir = tmp_dir;
        Ok(self)
    }

    /// Name output files after their source files when available.
    pub fn with_keep_original(mut self, keep_original: bool) -> Self {
        self.keep_original = keep_original;
        self
    }

    /// Write a `.yaml` metadata file next to each image.
    pub fn with_metadata(mut self, write_metadata: bool) -> Self {
        self.write_metadata = write_metadata;
        self
    }

    /// Number of frames written so far.
    pub fn written(&self) -> u64 {
        self.written
    }

    fn file_name(&self, frame: &EmittedFrame<'_>) -> String {
        if self.keep_original {
            if let Some(name) = frame.origin.and_then(|p| p.file_name()) {
                return name.to_string_lossy().into_owned();
            }
        }
        self.pattern.expand(frame.frame_no)
    }

    /// Run `write` against the staging path, then move the result into the
    /// output directory.
    fn place(
        &self,
        name: &str,
        write: impl FnOnce(&Path) -> VfsResult<()>,
    ) -> VfsResult<PathBuf> {
        let out_path = self.output_dir.join(name);
        match &self.tmp_dir {
            Some(tmp_dir) => {
                let tmp_path = tmp_dir.join(name);
                write(&tmp_path)?;
                std::fs::rename(&tmp_path, &out_path).map_err(|e| {
                    VfsError::sink(format!(
                        "Failed to move {} to {}: {e}",
                        tmp_path.display(),
                        out_path.display()
                    ))
                })?;
            }
            None => write(&out_path)?,
        }
        Ok(out_path)
    }
}

impl FrameSink for ImageDirSink {
    fn name(&self) -> &str {
        "image-dir"
    }

    fn write(&mut self, frame: &EmittedFrame<'_>) -> VfsResult<()> {
        let name = self.file_name(frame);
        let image_path = self.place(&name, |path| {
            frame
                .image
                .save(path)
                .map_err(|e| VfsError::sink(format!("Failed to write {}: {e}", path.display())))
        })?;
        tracing::debug!(frame = frame.frame_no, path = %image_path.display(), "Frame written");

        if let (true, Some(metadata)) = (self.write_metadata, frame.metadata) {
            let yaml = metadata
                .to_yaml()
                .map_err(|e| VfsError::sink(format!("Failed to serialize metadata: {e}")))?;
            let yaml_name = Path::new(&name)
                .with_extension("yaml")
                .to_string_lossy()
                .into_owned();
            let yaml_path = self.place(&yaml_name, |path| {
                std::fs::write(path, yaml.as_bytes()).map_err(|e| {
                    VfsError::sink(format!("Failed to write {}: {e}", path.display()))
                })
            })?;
            tracing::debug!(frame = frame.frame_no, path = %yaml_path.display(), "Metadata written");
        }

        self.written += 1;
        Ok(())
    }

    fn finish(&mut self) -> VfsResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vfs_frame_model::FrameSize;

    fn temp_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("vfs_test_sink_{name}"));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn emitted<'a>(
        image: &'a RgbImage,
        frame_no: u64,
        origin: Option<&'a Path>,
        metadata: Option<&'a FrameMetadata>,
    ) -> EmittedFrame<'a> {
        EmittedFrame {
            image,
            frame_no,
            origin,
            metadata,
        }
    }

    #[test]
    fn test_pattern_naming_and_metadata() {
        let dir = temp_dir("pattern");
        let mut sink = ImageDirSink::new(&dir, OutputPattern::default())
            .unwrap()
            .with_metadata(true);

        let image = RgbImage::new(10, 5);
        let meta = FrameMetadata {
            frame: Some(FrameSize {
                width: 10,
                height: 5,
            }),
            ..Default::default()
        };
        sink.write(&emitted(&image, 20, None, Some(&meta))).unwrap();

        assert!(dir.join("000020.jpg").exists());
        let yaml = std::fs::read_to_string(dir.join("000020.yaml")).unwrap();
        assert_eq!(FrameMetadata::from_yaml(&yaml).unwrap(), meta);
        assert_eq!(sink.written(), 1);

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_metadata_skipped_when_disabled() {
        let dir = temp_dir("nometa");
        let mut sink = ImageDirSink::new(&dir, OutputPattern::default()).unwrap();
        let image = RgbImage::new(4, 4);
        let meta = FrameMetadata::default();
        sink.write(&emitted(&image, 1, None, Some(&meta))).unwrap();

        assert!(dir.join("000001.jpg").exists());
        assert!(!dir.join("000001.yaml").exists());

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_keep_original_with_tmp_dir() {
        let dir = temp_dir("original");
        let out = dir.join("out");
        let tmp = dir.join("tmp");
        std::fs::create_dir_all(&out).unwrap();
        std::fs::create_dir_all(&tmp).unwrap();

        let mut sink = ImageDirSink::new(&out, OutputPattern::default())
            .unwrap()
            .with_tmp_dir(Some(tmp.clone()))
            .unwrap()
            .with_keep_original(true)
            .with_metadata(true);

        let image = RgbImage::new(4, 4);
        let meta = FrameMetadata::default();
        let origin = PathBuf::from("/data/frames/cam-0007.png");
        sink.write(&emitted(&image, 7, Some(&origin), Some(&meta)))
            .unwrap();
        // Without an origin the pattern is used.
        sink.write(&emitted(&image, 8, None, None)).unwrap();

        assert!(out.join("cam-0007.png").exists());
        assert!(out.join("cam-0007.yaml").exists());
        assert!(out.join("000008.jpg").exists());
        assert_eq!(std::fs::read_dir(&tmp).unwrap().count(), 0);

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_missing_output_dir_is_config_error() {
        let err = ImageDirSink::new("/nonexistent/vfs/out", OutputPattern::default())
            .err()
            .unwrap();
        assert!(matches!(err, VfsError::Config { .. }));
    }
}
