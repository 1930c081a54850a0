//! VFS Frame Model
//!
//! Defines the data contracts shared by the selection pipeline:
//! - **Predictions:** labeled, scored, optionally boxed detections
//! - **Wire formats:** ROI tables (CSV) and detection documents (JSON)
//! - **Metadata:** the per-frame diagnostic record written next to outputs
//! - **Kinds and naming:** closed input/analysis/output enumerations and
//!   the file names used for the analysis exchange
//!
//! All coordinates are integer pixel positions in the source frame.

pub mod kinds;
pub mod metadata;
pub mod prediction;
pub mod wire;

pub use kinds::*;
pub use metadata::*;
pub use prediction::*;
pub use wire::*;
