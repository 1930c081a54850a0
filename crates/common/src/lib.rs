//! VFS Common Utilities
//!
//! Shared infrastructure for all video frame selector crates:
//! - Error taxonomy and result aliases
//! - Deadlines, poll timing and run clocks
//! - Tracing/logging initialization
//! - Configuration loading

pub mod clock;
pub mod config;
pub mod error;
pub mod logging;

pub use clock::*;
pub use config::*;
pub use error::*;
