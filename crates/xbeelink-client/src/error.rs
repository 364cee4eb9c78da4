use std::time::Duration;

/// Errors returned by client operations.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// Frame-level error (transport, codec, malformed command name).
    #[error("frame error: {0}")]
    Frame(#[from] xbeelink_frame::FrameError),

    /// The destination address cannot be transmitted to.
    #[error("invalid address")]
    InvalidAddress,

    /// Malformed frame or negative status reported by the module.
    #[error("protocol violation: {0}")]
    ProtocolViolation(String),

    /// No response arrived within the configured wait.
    #[error("no response within {0:?}")]
    Timeout(Duration),

    /// The pin name or number is not mapped on the module.
    #[error("no such device: {0}")]
    NoDevice(String),

    /// A fixed-width AT parameter had the wrong number of bytes.
    #[error("expected {expected} parameter bytes, got {actual}")]
    LengthMismatch { expected: usize, actual: usize },

    /// The datagram does not fit in one RF packet.
    #[error("datagram too large ({size} bytes, max {max})")]
    PayloadTooLarge { size: usize, max: usize },

    /// Non-blocking read on an empty inbound queue.
    #[error("no datagram available")]
    WouldBlock,

    /// The dispatch loop has stopped; no more frames will be delivered.
    #[error("client disconnected")]
    Disconnected,

    /// The configuration could not be parsed.
    #[error("invalid configuration: {0}")]
    Config(#[from] serde_json::Error),

    /// The dispatch thread could not be started.
    #[error("failed to spawn dispatch thread: {0}")]
    Spawn(#[source] std::io::Error),

    /// A client lock was poisoned by a panicking thread.
    #[error("{0} lock poisoned")]
    LockPoisoned(&'static str),
}

pub type Result<T> = std::result::Result<T, ClientError>;
