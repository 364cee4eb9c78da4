use crate::frame::FrameType;

/// Errors that can occur while building, encoding or moving frames.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The payload exceeds the configured maximum size.
    #[error("payload too large ({size} bytes, max {max})")]
    PayloadTooLarge { size: usize, max: usize },

    /// The frame type does not carry a frame identifier.
    #[error("{0:?} frame does not carry a frame id")]
    MissingFrameId(FrameType),

    /// AT command names are exactly two ASCII characters.
    #[error("invalid AT command name {0:?}")]
    InvalidCommand(String),

    /// The codec rejected the bytes on the wire.
    #[error("frame decode error: {0}")]
    Decode(String),

    /// An I/O error occurred while reading or writing frames.
    #[error("frame I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The transport was closed by the other side.
    #[error("connection closed")]
    ConnectionClosed,
}

pub type Result<T> = std::result::Result<T, FrameError>;
