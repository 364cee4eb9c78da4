//! Blocking request/response client for XBee radio modules in API mode.
//!
//! # Crate Structure
//!
//! - [`frame`]: Typed API frames, addresses and the frame transport boundary
//! - [`client`]: Correlated AT commands, datagram I/O and pin control (behind `client` feature)
//! - [`logging`]: `tracing` subscriber setup for binaries (behind `logging` feature)

/// Re-export frame types.
pub mod frame {
    pub use xbeelink_frame::*;
}

/// Re-export client types (requires `client` feature).
#[cfg(feature = "client")]
pub mod client {
    pub use xbeelink_client::*;
}

#[cfg(feature = "logging")]
pub mod logging;
