//! Publish/subscribe exchange with an analyzer.
//!
//! For every frame an [`ExchangeSession`] subscribes to the reply channel,
//! the JPEG bytes are published on the outbound channel, and the session
//! waits for the first reply. The subscription is live before the frame is
//! published and is torn down exactly once, whether the reply arrived or
//! the deadline passed.
//!
//! With [`ChannelScope::PerFrame`] (the default) both channel names carry
//! the zero-padded frame number, e.g. `images:000042` and
//! `predictions:000042`, so a late reply for one frame can never be taken
//! for the answer to another.

pub mod memory;
pub mod redis;

use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};
use std::thread::JoinHandle;
use std::time::Duration;

use image::RgbImage;
use vfs_common::clock::{poll_until, Deadline};
use vfs_common::error::{VfsError, VfsResult};
use vfs_frame_model::{parse_analysis, AnalysisFormat};

use crate::encode::encode_jpeg;
use crate::{AnalysisReply, AnalysisTransport};

pub use self::memory::MemoryBroker;
pub use self::redis::RedisBroker;

/// How often the waiting dispatch call checks the reply slot.
const REPLY_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Upper bound for one blocking receive on the delivery thread. Also bounds
/// how long teardown waits for that thread.
const DELIVERY_WAIT: Duration = Duration::from_millis(50);

/// A message received on a subscription.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrokerMessage {
    /// Channel the message was published on.
    pub channel: String,

    /// Raw payload.
    pub payload: Vec<u8>,
}

/// An active pattern subscription. Dropping it unsubscribes.
pub trait Subscription: Send {
    /// Wait up to `wait` for the next message.
    fn next_message(&mut self, wait: Duration) -> VfsResult<Option<BrokerMessage>>;
}

/// A message broker the exchange can publish to and subscribe on.
pub trait PubSubBroker: Send {
    /// Broker name for logging.
    fn name(&self) -> &str;

    /// Subscribe to a channel pattern. The subscription is active when this
    /// returns.
    fn subscribe(&mut self, pattern: &str) -> VfsResult<Box<dyn Subscription>>;

    /// Publish a payload on a channel.
    fn publish(&mut self, channel: &str, payload: &[u8]) -> VfsResult<()>;
}

/// How reply channels are correlated with frames.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ChannelScope {
    /// `<out>:<frame>` / `<in>:<frame>` per frame.
    #[default]
    PerFrame,
    /// The configured channels as-is for every frame.
    Shared,
}

impl ChannelScope {
    /// Outbound and reply channel names for a frame.
    pub fn channels(&self, channel_out: &str, channel_in: &str, frame_id: u64) -> (String, String) {
        match self {
            Self::PerFrame => (
                format!("{channel_out}:{frame_id:06}"),
                format!("{channel_in}:{frame_id:06}"),
            ),
            Self::Shared => (channel_out.to_string(), channel_in.to_string()),
        }
    }
}

impl FromStr for ChannelScope {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "per-frame" => Ok(Self::PerFrame),
            "shared" => Ok(Self::Shared),
            other => Err(format!(
                "unknown channel scope '{other}' (expected one of: per-frame, shared)"
            )),
        }
    }
}

impl std::fmt::Display for ChannelScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::PerFrame => "per-frame",
            Self::Shared => "shared",
        })
    }
}

/// Per-frame correlation state: one subscription, one deadline, one reply.
///
/// A delivery thread owns the subscription and writes the first message it
/// receives into a single-assignment slot; the dispatching thread is the
/// only reader. [`ExchangeSession::teardown`] stops and joins the delivery
/// thread, which drops (and so cancels) the subscription. It is idempotent
/// and also runs on drop.
pub struct ExchangeSession {
    reply_channel: String,
    deadline: Deadline,
    reply: Arc<OnceLock<BrokerMessage>>,
    failure: Arc<OnceLock<String>>,
    stop: Arc<AtomicBool>,
    delivery: Option<JoinHandle<()>>,
}

impl ExchangeSession {
    /// Subscribe to `reply_channel` and start waiting for a reply.
    pub fn open(
        broker: &mut dyn PubSubBroker,
        reply_channel: &str,
        timeout: Duration,
    ) -> VfsResult<Self> {
        let deadline = Deadline::after(timeout);
        let mut subscription = broker.subscribe(reply_channel)?;

        let reply = Arc::new(OnceLock::new());
        let failure = Arc::new(OnceLock::new());
        let stop = Arc::new(AtomicBool::new(false));

        let delivery = {
            let reply = Arc::clone(&reply);
            let failure = Arc::clone(&failure);
            let stop = Arc::clone(&stop);
            std::thread::Builder::new()
                .name("vfs-reply".to_string())
                .spawn(move || {
                    while !stop.load(Ordering::Acquire) {
                        match subscription.next_message(DELIVERY_WAIT) {
                            Ok(Some(message)) => {
                                let _ = reply.set(message);
                                break;
                            }
                            Ok(None) => {}
                            Err(e) => {
                                let _ = failure.set(e.to_string());
                                break;
                            }
                        }
                    }
                    drop(subscription);
                })
                .map_err(|e| VfsError::transport(format!("Failed to spawn reply thread: {e}")))?
        };

        Ok(Self {
            reply_channel: reply_channel.to_string(),
            deadline,
            reply,
            failure,
            stop,
            delivery: Some(delivery),
        })
    }

    /// Block until a reply arrives or the deadline passes.
    ///
    /// Returns `Ok(None)` on timeout. A broken subscription is a transport
    /// error.
    pub fn wait(&mut self) -> VfsResult<Option<BrokerMessage>> {
        let outcome = poll_until(&self.deadline, REPLY_POLL_INTERVAL, || {
            if let Some(message) = self.reply.get() {
                return Some(Ok(message.clone()));
            }
            self.failure.get().map(|e| Err(e.clone()))
        });
        self.teardown();

        match outcome {
            Some(Ok(message)) => Ok(Some(message)),
            Some(Err(e)) => Err(VfsError::transport(format!(
                "Subscription on {} failed: {e}",
                self.reply_channel
            ))),
            None => Ok(self.reply.get().cloned()),
        }
    }

    /// Time spent since the session opened.
    pub fn elapsed(&self) -> Duration {
        self.deadline.elapsed()
    }

    /// Stop the delivery thread and cancel the subscription.
    pub fn teardown(&mut self) {
        self.stop.store(true, Ordering::Release);
        if let Some(handle) = self.delivery.take() {
            if handle.join().is_err() {
                tracing::warn!(channel = %self.reply_channel, "Reply thread panicked");
            }
            tracing::trace!(channel = %self.reply_channel, "Subscription torn down");
        }
    }

    /// Whether the subscription has been torn down.
    pub fn is_closed(&self) -> bool {
        self.delivery.is_none()
    }
}

impl Drop for ExchangeSession {
    fn drop(&mut self) {
        self.teardown();
    }
}

/// Channel configuration for [`PubSubExchange`].
#[derive(Debug, Clone)]
pub struct PubSubConfig {
    /// Channel frames are published on.
    pub channel_out: String,

    /// Channel replies arrive on.
    pub channel_in: String,

    /// Reply correlation.
    pub scope: ChannelScope,

    /// Result format carried by replies.
    pub format: AnalysisFormat,
}

impl Default for PubSubConfig {
    fn default() -> Self {
        Self {
            channel_out: "images".to_string(),
            channel_in: "predictions".to_string(),
            scope: ChannelScope::PerFrame,
            format: AnalysisFormat::OpexJson,
        }
    }
}

/// Analysis transport over a pub/sub broker.
pub struct PubSubExchange {
    broker: Box<dyn PubSubBroker>,
    config: PubSubConfig,
}

impl PubSubExchange {
    pub fn new(broker: Box<dyn PubSubBroker>, config: PubSubConfig) -> Self {
        if config.scope == ChannelScope::Shared {
            tracing::warn!(
                channel_in = %config.channel_in,
                "Shared reply channel: a late reply can be taken as the answer for the next frame"
            );
        }
        tracing::info!(
            broker = %broker.name(),
            channel_out = %config.channel_out,
            channel_in = %config.channel_in,
            scope = %config.scope,
            "Pub/sub exchange ready"
        );
        Self { broker, config }
    }

    pub fn config(&self) -> &PubSubConfig {
        &self.config
    }
}

impl AnalysisTransport for PubSubExchange {
    fn name(&self) -> &str {
        "pubsub-exchange"
    }

    fn format(&self) -> AnalysisFormat {
        self.config.format
    }

    fn dispatch(
        &mut self,
        frame: &RgbImage,
        frame_id: u64,
        timeout: Duration,
    ) -> VfsResult<AnalysisReply> {
        let (channel_out, channel_in) =
            self.config
                .scope
                .channels(&self.config.channel_out, &self.config.channel_in, frame_id);
        let bytes = encode_jpeg(frame)?;

        let mut session = ExchangeSession::open(self.broker.as_mut(), &channel_in, timeout)?;
        tracing::trace!(frame = frame_id, channel = %channel_out, bytes = bytes.len(), "Publishing frame");
        self.broker.publish(&channel_out, &bytes)?;

        let message = session.wait()?;
        let Some(message) = message else {
            return Err(VfsError::timeout(frame_id, session.elapsed()));
        };

        tracing::debug!(frame = frame_id, channel = %message.channel, bytes = message.payload.len(), "Analysis reply received");
        let predictions = parse_analysis(self.config.format, &message.payload)?;
        Ok(AnalysisReply::new(predictions))
    }
}
