//! VFS Analysis Transport
//!
//! Hands a frame to an out-of-process image analyzer and waits, within a
//! time budget, for its predictions. Two transports share one contract:
//!
//! - **FileExchange:** write the frame as JPEG into a watched directory and
//!   poll for the analyzer's result file.
//! - **PubSubExchange:** publish the JPEG bytes on a broker channel and wait
//!   for the reply on a correlated channel.
//!
//! ```text
//!   FrameSelector ──dispatch(frame, id, timeout)──▶ AnalysisTransport
//!                                                   │
//!                    ┌──────────────────────────────┴──────────────┐
//!                    ▼                                             ▼
//!              FileExchange                                 PubSubExchange
//!   in/000042.jpg ─▶ analyzer ─▶ out/000042.json   images:000042 ─▶ analyzer ─▶ predictions:000042
//! ```
//!
//! No result within the budget yields a frame-scoped `Timeout` error;
//! unparseable results yield a frame-scoped `Parse` error. Failures of the
//! exchange itself (unwritable directory, broker down) are pipeline-fatal.

pub mod encode;
pub mod file_exchange;
pub mod pubsub;

use std::time::Duration;

use image::RgbImage;
use vfs_common::error::VfsResult;
use vfs_frame_model::{AnalysisFormat, FrameMetadata, PredictionSet};

pub use file_exchange::{FileExchange, FileExchangeConfig};
pub use pubsub::{
    BrokerMessage, ChannelScope, ExchangeSession, MemoryBroker, PubSubBroker, PubSubConfig,
    PubSubExchange, RedisBroker, Subscription,
};

/// What the analyzer said about one frame.
#[derive(Debug, Clone, Default)]
pub struct AnalysisReply {
    /// Predictions in analyzer order.
    pub predictions: PredictionSet,

    /// Metadata gathered during the exchange (`num_predictions`).
    pub metadata: FrameMetadata,
}

impl AnalysisReply {
    pub fn new(predictions: PredictionSet) -> Self {
        let metadata = FrameMetadata {
            num_predictions: Some(predictions.len()),
            ..Default::default()
        };
        Self {
            predictions,
            metadata,
        }
    }
}

/// A way of getting one frame analyzed.
pub trait AnalysisTransport: Send {
    /// Transport name for logging.
    fn name(&self) -> &str;

    /// The result format the analyzer is expected to produce.
    fn format(&self) -> AnalysisFormat;

    /// Send `frame` for analysis and wait up to `timeout` for the result.
    ///
    /// `frame_id` is the 1-based source frame number; it names every
    /// artifact of the exchange.
    fn dispatch(
        &mut self,
        frame: &RgbImage,
        frame_id: u64,
        timeout: Duration,
    ) -> VfsResult<AnalysisReply>;

    /// Release transport resources. Safe to call more than once.
    fn close(&mut self) -> VfsResult<()> {
        Ok(())
    }
}
