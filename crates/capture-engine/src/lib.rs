//! VFS Capture Engine
//!
//! Frame input and output for the selection pipeline:
//!
//! ```text
//! ┌──────────────────┐                      ┌──────────────────┐
//! │   FrameSource    │                      │    FrameSink     │
//! │  ImageDirSource  │ ──▶ FrameSelector ──▶│  ImageDirSink    │
//! │  GstVideoSource  │                      │  GstMjpegSink    │
//! └──────────────────┘                      └──────────────────┘
//!   *.jpg / *.png                              %06d.jpg + .yaml
//!   video file, webcam                         MJPEG in AVI
//! ```
//!
//! All frames are 8-bit RGB images.

pub mod pipeline;
pub mod sink;
pub mod source;

pub use pipeline::{GstMjpegSink, GstVideoSource};
pub use sink::{EmittedFrame, FrameSink, ImageDirSink};
pub use source::{list_images, FrameSource, ImageDirSource, SourceFrame};

use std::path::Path;

use vfs_common::error::{VfsError, VfsResult};
use vfs_frame_model::InputKind;

/// Open the frame source for an input of the given kind.
///
/// `input` is a directory for [`InputKind::ImageDir`], a file for
/// [`InputKind::Video`] and a device index for [`InputKind::Webcam`].
pub fn open_source(kind: InputKind, input: &str) -> VfsResult<Box<dyn FrameSource>> {
    match kind {
        InputKind::ImageDir => Ok(Box::new(ImageDirSource::open(Path::new(input))?)),
        InputKind::Video => Ok(Box::new(GstVideoSource::open_file(Path::new(input))?)),
        InputKind::Webcam => {
            let index: u32 = input.trim().parse().map_err(|_| {
                VfsError::config(format!("Webcam input must be a device index, got '{input}'"))
            })?;
            Ok(Box::new(GstVideoSource::open_webcam(index)?))
        }
    }
}
