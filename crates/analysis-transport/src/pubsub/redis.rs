//! Redis broker.
//!
//! Publishing goes through one long-lived connection. Every subscription
//! opens its own connection, issues `PSUBSCRIBE`, and waits for the
//! confirmation before returning, so a frame published afterwards cannot
//! be answered before the subscriber is listening. Dropping the
//! subscription closes its connection, which ends the subscription on the
//! server.

use std::time::Duration;

use vfs_common::error::{VfsError, VfsResult};

use super::{BrokerMessage, PubSubBroker, Subscription};

/// Broker backed by a Redis server.
pub struct RedisBroker {
    client: ::redis::Client,
    publisher: ::redis::Connection,
    url: String,
}

impl RedisBroker {
    /// Connect to the server at `url`, e.g. `redis://localhost:6379/0`.
    pub fn connect(url: &str) -> VfsResult<Self> {
        let client = ::redis::Client::open(url)
            .map_err(|e| VfsError::config(format!("Invalid Redis URL {url}: {e}")))?;
        let publisher = client
            .get_connection()
            .map_err(|e| redis_failure("connect to", url, e))?;
        tracing::info!(url = %url, "Connected to Redis");
        Ok(Self {
            client,
            publisher,
            url: url.to_string(),
        })
    }
}

fn redis_failure(action: &str, target: &str, e: ::redis::RedisError) -> VfsError {
    VfsError::transport(format!("Failed to {action} {target}: {e}"))
}

impl PubSubBroker for RedisBroker {
    fn name(&self) -> &str {
        "redis"
    }

    fn subscribe(&mut self, pattern: &str) -> VfsResult<Box<dyn Subscription>> {
        let mut connection = self
            .client
            .get_connection()
            .map_err(|e| redis_failure("connect to", &self.url, e))?;

        let command = ::redis::cmd("PSUBSCRIBE").arg(pattern).get_packed_command();
        connection
            .send_packed_command(&command)
            .map_err(|e| redis_failure("subscribe to", pattern, e))?;
        // ["psubscribe", pattern, count]
        connection
            .recv_response()
            .map_err(|e| redis_failure("confirm subscription to", pattern, e))?;

        tracing::trace!(pattern = %pattern, "Subscribed");
        Ok(Box::new(RedisSubscription {
            connection,
            pattern: pattern.to_string(),
        }))
    }

    fn publish(&mut self, channel: &str, payload: &[u8]) -> VfsResult<()> {
        let receivers: i64 = ::redis::cmd("PUBLISH")
            .arg(channel)
            .arg(payload)
            .query(&mut self.publisher)
            .map_err(|e| redis_failure("publish on", channel, e))?;
        if receivers == 0 {
            tracing::debug!(channel = %channel, "Published frame has no subscribers");
        }
        Ok(())
    }
}

struct RedisSubscription {
    connection: ::redis::Connection,
    pattern: String,
}

impl Subscription for RedisSubscription {
    fn next_message(&mut self, wait: Duration) -> VfsResult<Option<BrokerMessage>> {
        self.connection
            .set_read_timeout(Some(wait.max(Duration::from_millis(1))))
            .map_err(|e| redis_failure("set read timeout on", &self.pattern, e))?;

        match self.connection.recv_response() {
            Ok(value) => Ok(::redis::Msg::from_value(&value).map(|msg| BrokerMessage {
                channel: msg.get_channel_name().to_string(),
                payload: msg.get_payload_bytes().to_vec(),
            })),
            Err(e) if e.is_timeout() => Ok(None),
            Err(e) => Err(redis_failure("receive on", &self.pattern, e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_url_is_config_error() {
        let err = RedisBroker::connect("not-a-url").err().unwrap();
        assert!(matches!(err, VfsError::Config { .. }));
    }
}
