//! VFS Processing Core
//!
//! Decides what happens to a frame once it has been read:
//! - **Change detection:** skip frames that barely differ from the last kept one
//! - **Label policy:** keep or drop a frame based on the analyzer's predictions
//! - **Geometry:** crop a kept frame to the region its predictions cover
//!
//! This crate is pure computation: no I/O, no transports.
//! All inputs are data; all outputs are data.

pub mod change;
pub mod geometry;
pub mod policy;

pub use change::{detect_change, ChangeDetector, ChangeOutcome};
pub use geometry::{compute_crop, crop_frame, CropSettings};
pub use policy::{should_keep, LabelPolicy};
