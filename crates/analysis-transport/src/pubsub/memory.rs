//! In-process broker.
//!
//! Clones share one hub, so an analyzer stand-in can run on another thread
//! with its own handle. Patterns support `*` (any run of characters) and
//! `?` (one character), like Redis `PSUBSCRIBE`.

use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use vfs_common::error::{VfsError, VfsResult};

use super::{BrokerMessage, PubSubBroker, Subscription};

#[derive(Default)]
struct Hub {
    next_id: u64,
    subscribers: Vec<(u64, String, Sender<BrokerMessage>)>,
}

/// Broker living entirely in this process.
#[derive(Clone, Default)]
pub struct MemoryBroker {
    hub: Arc<Mutex<Hub>>,
}

impl MemoryBroker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of active subscriptions across all handles.
    pub fn subscriber_count(&self) -> usize {
        lock(&self.hub).map(|h| h.subscribers.len()).unwrap_or(0)
    }
}

fn lock(hub: &Mutex<Hub>) -> VfsResult<MutexGuard<'_, Hub>> {
    hub.lock()
        .map_err(|_| VfsError::transport("In-memory broker state poisoned"))
}

impl PubSubBroker for MemoryBroker {
    fn name(&self) -> &str {
        "memory"
    }

    fn subscribe(&mut self, pattern: &str) -> VfsResult<Box<dyn Subscription>> {
        let (tx, rx) = mpsc::channel();
        let mut hub = lock(&self.hub)?;
        hub.next_id += 1;
        let id = hub.next_id;
        hub.subscribers.push((id, pattern.to_string(), tx));
        Ok(Box::new(MemorySubscription {
            id,
            hub: Arc::clone(&self.hub),
            rx,
        }))
    }

    fn publish(&mut self, channel: &str, payload: &[u8]) -> VfsResult<()> {
        let hub = lock(&self.hub)?;
        for (_, pattern, tx) in &hub.subscribers {
            if glob_match(pattern, channel) {
                let _ = tx.send(BrokerMessage {
                    channel: channel.to_string(),
                    payload: payload.to_vec(),
                });
            }
        }
        Ok(())
    }
}

struct MemorySubscription {
    id: u64,
    hub: Arc<Mutex<Hub>>,
    rx: Receiver<BrokerMessage>,
}

impl Subscription for MemorySubscription {
    fn next_message(&mut self, wait: Duration) -> VfsResult<Option<BrokerMessage>> {
        match self.rx.recv_timeout(wait) {
            Ok(message) => Ok(Some(message)),
            Err(RecvTimeoutError::Timeout) => Ok(None),
            Err(RecvTimeoutError::Disconnected) => {
                Err(VfsError::transport("In-memory subscription closed"))
            }
        }
    }
}

impl Drop for MemorySubscription {
    fn drop(&mut self) {
        if let Ok(mut hub) = self.hub.lock() {
            hub.subscribers.retain(|(id, _, _)| *id != self.id);
        }
    }
}

/// Match a channel name against a `*`/`?` glob pattern.
pub fn glob_match(pattern: &str, text: &str) -> bool {
    let p: Vec<char> = pattern.chars().collect();
    let t: Vec<char> = text.chars().collect();
    let (mut pi, mut ti) = (0, 0);
    let mut star: Option<(usize, usize)> = None;

    while ti < t.len() {
        if pi < p.len() && (p[pi] == '?' || p[pi] == t[ti]) {
            pi += 1;
            ti += 1;
        } else if pi < p.len() && p[pi] == '*' {
            star = Some((pi, ti));
            pi += 1;
        } else if let Some((sp, st)) = star {
            pi = sp + 1;
            ti = st + 1;
            star = Some((sp, st + 1));
        } else {
            return false;
        }
    }
    p[pi..].iter().all(|c| *c == '*')
}
