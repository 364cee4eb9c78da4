//! Synchronous client for an XBee radio module.
//!
//! Turns the module's asynchronous frame stream into blocking calls:
//! datagrams to and from 16-bit or 64-bit peers, local AT commands with
//! big-endian scalar helpers, and DIO pin control. One [`Dispatcher`]
//! reads the transport and routes frames; any number of threads share the
//! [`Client`].

pub mod client;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod pins;
pub mod queue;
pub mod rpc;

pub use client::{spawn, Client, Delivery, DISPATCH_THREAD_NAME};
pub use config::{ClientConfig, OverflowPolicy, DEFAULT_RESPONSE_TIMEOUT};
pub use dispatch::{DispatchStats, DispatchStatsSnapshot, Dispatcher};
pub use error::{ClientError, Result};
pub use pins::{Pin, PinMode};
pub use queue::{InboundQueue, PushOutcome};
pub use rpc::{FrameIdAllocator, ResponseStatus};
