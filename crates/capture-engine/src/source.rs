//! Frame sources.

use std::path::{Path, PathBuf};

use image::RgbImage;
use vfs_common::error::{VfsError, VfsResult};
use vfs_frame_model::FrameSize;

/// Extensions recognized in image directories (compared case-insensitively).
pub const IMAGE_EXTENSIONS: [&str; 2] = ["jpg", "png"];

/// One frame read from a source.
#[derive(Debug, Clone)]
pub struct SourceFrame {
    /// Pixel data.
    pub image: RgbImage,

    /// File the frame was read from, for image directory sources.
    pub origin: Option<PathBuf>,
}

/// Anything that produces frames in order.
pub trait FrameSource: Send {
    /// Source name for logging.
    fn name(&self) -> &str;

    /// Read the next frame. `Ok(None)` means the source is exhausted.
    fn next_frame(&mut self) -> VfsResult<Option<SourceFrame>>;

    /// Frame dimensions, if known. May read ahead to find out.
    fn dimensions(&mut self) -> VfsResult<Option<FrameSize>>;

    /// Release the source. Safe to call more than once.
    fn close(&mut self) -> VfsResult<()>;
}

/// List the images in a directory, sorted by path.
pub fn list_images(dir: &Path) -> VfsResult<Vec<PathBuf>> {
    let entries = std::fs::read_dir(dir).map_err(|e| {
        VfsError::source(format!("Failed to list images in {}: {e}", dir.display()))
    })?;

    let mut images = Vec::new();
    for entry in entries {
        let path = entry?.path();
        if !path.is_file() {
            continue;
        }
        let matches = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| IMAGE_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
            .unwrap_or(false);
        if matches {
            images.push(path);
        }
    }
    images.sort();
    tracing::debug!(dir = %dir.display(), count = images.len(), "Listed images");
    Ok(images)
}

/// Reads the `.jpg`/`.png` files of a directory in sorted order.
pub struct ImageDirSource {
    files: Vec<PathBuf>,
    next: usize,
}

impl ImageDirSource {
    pub fn open(dir: &Path) -> VfsResult<Self> {
        if !dir.is_dir() {
            return Err(VfsError::FileNotFound {
                path: dir.to_path_buf(),
            });
        }
        Ok(Self::from_files(list_images(dir)?))
    }

    /// Source over an explicit list of files.
    pub fn from_files(files: Vec<PathBuf>) -> Self {
        Self { files, next: 0 }
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

impl FrameSource for ImageDirSource {
    fn name(&self) -> &str {
        "image-dir"
    }

    fn next_frame(&mut self) -> VfsResult<Option<SourceFrame>> {
        let Some(path) = self.files.get(self.next) else {
            return Ok(None);
        };
        self.next += 1;
        let image = image::open(path)
            .map_err(|e| VfsError::source(format!("Failed to read {}: {e}", path.display())))?
            .to_rgb8();
        Ok(Some(SourceFrame {
            image,
            origin: Some(path.clone()),
        }))
    }

    fn dimensions(&mut self) -> VfsResult<Option<FrameSize>> {
        let Some(first) = self.files.first() else {
            return Ok(None);
        };
        let (width, height) = image::image_dimensions(first)
            .map_err(|e| VfsError::source(format!("Failed to read {}: {e}", first.display())))?;
        Ok(Some(FrameSize { width, height }))
    }

    fn close(&mut self) -> VfsResult<()> {
        self.next = self.files.len();
        Ok(())
    }
}
