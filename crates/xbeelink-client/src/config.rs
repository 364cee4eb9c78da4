use std::time::Duration;

use serde::Deserialize;

use crate::error::Result;

/// Default wait for a correlated response.
pub const DEFAULT_RESPONSE_TIMEOUT: Duration = Duration::from_millis(1000);

/// Default inbound queue size in bytes.
pub const DEFAULT_QUEUE_CAPACITY: usize = 1024;

/// Largest RF payload of an 802.15.4 module.
pub const DEFAULT_MAX_DATAGRAM_SIZE: usize = 100;

/// What the dispatch loop does when an inbound datagram does not fit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverflowPolicy {
    /// Discard the new datagram and keep dispatching.
    #[default]
    DropNewest,
    /// Wait until consumers free enough space.
    ///
    /// While the dispatch loop waits it reads no further frames, so TX
    /// status and AT command responses are not delivered and correlated
    /// calls may time out until a consumer drains the queue.
    Block,
}

/// Client behavior, fixed at construction.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Wait for a TX status or AT response before giving up.
    #[serde(rename = "response_timeout_ms", with = "millis")]
    pub response_timeout: Duration,
    /// Fail `receive_datagram` immediately when the queue is empty.
    pub non_blocking_read: bool,
    /// Inbound queue size in bytes, record headers included.
    pub queue_capacity: usize,
    /// Behavior when the inbound queue is full.
    pub overflow: OverflowPolicy,
    /// Largest datagram accepted by `send_datagram`.
    pub max_datagram_size: usize,
    /// Emit a trace event for every frame sent and received.
    pub log_frames: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            response_timeout: DEFAULT_RESPONSE_TIMEOUT,
            non_blocking_read: false,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            overflow: OverflowPolicy::default(),
            max_datagram_size: DEFAULT_MAX_DATAGRAM_SIZE,
            log_frames: false,
        }
    }
}

impl ClientConfig {
    /// Parse a JSON configuration. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn with_response_timeout(mut self, timeout: Duration) -> Self {
        self.response_timeout = timeout;
        self
    }

    pub fn with_non_blocking_read(mut self, non_blocking: bool) -> Self {
        self.non_blocking_read = non_blocking;
        self
    }

    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    pub fn with_overflow(mut self, overflow: OverflowPolicy) -> Self {
        self.overflow = overflow;
        self
    }

    pub fn with_max_datagram_size(mut self, size: usize) -> Self {
        self.max_datagram_size = size;
        self
    }

    pub fn with_log_frames(mut self, enabled: bool) -> Self {
        self.log_frames = enabled;
        self
    }
}

mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer};

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
