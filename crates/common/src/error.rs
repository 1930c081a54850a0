//! Error types shared across the frame selector crates.
//!
//! Errors fall into two classes:
//! - **frame-scoped** (`Parse`, `Timeout`, `FrameCompare`): the current frame
//!   is dropped and the run continues.
//! - **pipeline-fatal** (everything else): the run stops after releasing its
//!   source, sink and transport.

use std::path::PathBuf;
use std::time::Duration;

/// Top-level error type for frame selection.
#[derive(Debug, thiserror::Error)]
pub enum VfsError {
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Parse error: {message}")]
    Parse { message: String },

    #[error("Analysis timed out for frame {frame_id} after {:.2}s", .waited.as_secs_f64())]
    Timeout { frame_id: u64, waited: Duration },

    #[error("Frame compare error: {message}")]
    FrameCompare { message: String },

    #[error("Source error: {message}")]
    Source { message: String },

    #[error("Sink error: {message}")]
    Sink { message: String },

    #[error("Transport error: {message}")]
    Transport { message: String },

    #[error("File not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result type alias using VfsError.
pub type VfsResult<T> = Result<T, VfsError>;

impl VfsError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse {
            message: msg.into(),
        }
    }

    pub fn timeout(frame_id: u64, waited: Duration) -> Self {
        Self::Timeout { frame_id, waited }
    }

    pub fn frame_compare(msg: impl Into<String>) -> Self {
        Self::FrameCompare {
            message: msg.into(),
        }
    }

    pub fn source(msg: impl Into<String>) -> Self {
        Self::Source {
            message: msg.into(),
        }
    }

    pub fn sink(msg: impl Into<String>) -> Self {
        Self::Sink {
            message: msg.into(),
        }
    }

    pub fn transport(msg: impl Into<String>) -> Self {
        Self::Transport {
            message: msg.into(),
        }
    }

    /// Whether this error only affects the frame being processed.
    ///
    /// Frame-scoped errors turn into a drop verdict; all others abort the run.
    pub fn is_frame_scoped(&self) -> bool {
        matches!(
            self,
            Self::Parse { .. } | Self::Timeout { .. } | Self::FrameCompare { .. }
        )
    }

    /// Whether this error is an analysis timeout.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_scoped_classification() {
        assert!(VfsError::parse("bad row").is_frame_scoped());
        assert!(VfsError::timeout(3, Duration::from_secs(1)).is_frame_scoped());
        assert!(VfsError::frame_compare("size mismatch").is_frame_scoped());

        assert!(!VfsError::config("from > to").is_frame_scoped());
        assert!(!VfsError::source("eof").is_frame_scoped());
        assert!(!VfsError::sink("disk full").is_frame_scoped());
        assert!(!VfsError::transport("broker gone").is_frame_scoped());
        let io = VfsError::from(std::io::Error::other("boom"));
        assert!(!io.is_frame_scoped());
    }

    #[test]
    fn test_timeout_message() {
        let err = VfsError::timeout(42, Duration::from_millis(1500));
        assert!(err.is_timeout());
        assert_eq!(err.to_string(), "Analysis timed out for frame 42 after 1.50s");
    }
}
