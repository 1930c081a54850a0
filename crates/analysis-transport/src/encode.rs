//! JPEG encoding of frames sent to the analyzer.

use image::codecs::jpeg::JpegEncoder;
use image::RgbImage;
use vfs_common::error::{VfsError, VfsResult};

/// JPEG quality used for analysis frames.
pub const JPEG_QUALITY: u8 = 95;

/// Encode a frame as JPEG bytes.
pub fn encode_jpeg(frame: &RgbImage) -> VfsResult<Vec<u8>> {
    let mut bytes = Vec::new();
    JpegEncoder::new_with_quality(&mut bytes, JPEG_QUALITY)
        .encode_image(frame)
        .map_err(|e| VfsError::transport(format!("Failed to encode frame as JPEG: {e}")))?;
    Ok(bytes)
}
