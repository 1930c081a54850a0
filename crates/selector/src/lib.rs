//! VFS Selector
//!
//! Runs the per-frame selection loop:
//!
//! ```text
//! SOURCING ─▶ window/nth ─▶ PRUNE_CHECK ─▶ DISPATCH ─▶ DECIDE ─▶ CROP ─▶ EMIT
//!    ▲            │              │             │           │               │
//!    └────────────┴──── skip ────┴─── drop ────┴── drop ───┴───────────────┘
//! ```
//!
//! Frames are handled one at a time, in source order, on the calling
//! thread. Pruning, analysis and cropping are optional stages.
//! Frame-scoped failures (analysis timeout, unparseable result, frame
//! compare failure) drop the frame; everything else ends the run after the
//! source, sink and transport have been released.

pub mod config;
pub mod pipeline;
pub mod setup;
pub mod summary;

pub use config::{FrameWindow, SelectorConfig};
pub use pipeline::FrameSelector;
pub use setup::{
    file_transport, open_sink, redis_transport, BrokerSettings, ExchangeDirs, OutputSettings,
};
pub use summary::RunSummary;
