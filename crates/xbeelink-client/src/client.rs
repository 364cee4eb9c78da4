use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use bytes::Bytes;
use xbeelink_frame::{Address, AtCommand, Frame, FrameSink, FrameSource};

use crate::config::ClientConfig;
use crate::dispatch::{DispatchStats, DispatchStatsSnapshot, Dispatcher, Shared};
use crate::error::{ClientError, Result};
use crate::queue::InboundQueue;
use crate::rpc::{Requester, ResponseSlot};

/// Name of the thread started by [`spawn`].
pub const DISPATCH_THREAD_NAME: &str = "xbee-dispatch";

/// Whether `send_datagram` waits for the module's TX status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Delivery {
    /// Correlated round trip; fails if the module reports a non-zero status.
    #[default]
    Acknowledged,
    /// Sent with the no-ack frame id; returns once the frame is written.
    FireAndForget,
}

/// Synchronous handle to a radio module.
///
/// All methods take `&self`; share the client between threads with an
/// `Arc`. Correlated requests are issued one at a time.
pub struct Client<W> {
    shared: Arc<Shared>,
    requester: Requester<W>,
    pub(crate) pins: Mutex<u16>,
    config: ClientConfig,
}

impl<W: FrameSink> Client<W> {
    /// Create a client and the dispatch loop that feeds it.
    ///
    /// The dispatcher must be run (usually on its own thread) before any
    /// correlated request can complete.
    pub fn new<R: FrameSource>(source: R, sink: W, config: ClientConfig) -> (Self, Dispatcher<R>) {
        let slot = Arc::new(ResponseSlot::new());
        let shared = Arc::new(Shared {
            slot: Arc::clone(&slot),
            inbound: InboundQueue::new(config.queue_capacity, config.overflow),
            stats: DispatchStats::default(),
        });
        let dispatcher = Dispatcher::new(source, Arc::clone(&shared), config.log_frames);
        let requester = Requester::new(sink, slot, config.response_timeout, config.log_frames);

        let client = Self {
            shared,
            requester,
            pins: Mutex::new(0),
            config,
        };
        (client, dispatcher)
    }

    /// Send `data` to `address`.
    ///
    /// Returns the number of payload bytes sent.
    pub fn send_datagram(&self, address: &Address, data: &[u8], delivery: Delivery) -> Result<usize> {
        if data.len() > self.config.max_datagram_size {
            return Err(ClientError::PayloadTooLarge {
                size: data.len(),
                max: self.config.max_datagram_size,
            });
        }

        let frame = match address {
            Address::Short(addr) => Frame::tx_request_short(*addr, data),
            Address::Long(addr) => Frame::tx_request_long(*addr, data),
            Address::Invalid => return Err(ClientError::InvalidAddress),
        };

        match delivery {
            Delivery::Acknowledged => {
                self.requester.request(frame, 0)?;
            }
            Delivery::FireAndForget => self.requester.send_no_ack(frame)?,
        }
        tracing::debug!(%address, len = data.len(), ?delivery, "datagram sent");
        Ok(data.len())
    }

    /// Take the oldest received datagram.
    ///
    /// At most `buf.len()` bytes are copied; the rest of the datagram is
    /// discarded. Blocks while the queue is empty unless the client was
    /// configured with `non_blocking_read`, in which case
    /// [`ClientError::WouldBlock`] is returned.
    pub fn receive_datagram(&self, buf: &mut [u8]) -> Result<(usize, Address)> {
        self.shared
            .inbound
            .pop(buf, !self.config.non_blocking_read)
    }

    /// Like [`Client::receive_datagram`] but waits at most `timeout`.
    pub fn receive_datagram_timeout(
        &self,
        buf: &mut [u8],
        timeout: Duration,
    ) -> Result<(usize, Address)> {
        self.shared.inbound.pop_timeout(buf, timeout)
    }

    /// Execute AT command `command` without parameters and copy its value
    /// into `buf`. Returns the number of bytes copied.
    pub fn at_command_read(&self, command: &str, buf: &mut [u8]) -> Result<usize> {
        let value = self.execute(command, &[], buf.len())?;
        buf[..value.len()].copy_from_slice(&value);
        Ok(value.len())
    }

    /// Execute AT command `command` with `parameter`.
    pub fn at_command_write(&self, command: &str, parameter: &[u8]) -> Result<()> {
        self.execute(command, parameter, 0)?;
        Ok(())
    }

    pub fn read_u8(&self, command: &str) -> Result<u8> {
        self.read_fixed::<1>(command).map(|[b]| b)
    }

    pub fn read_u16(&self, command: &str) -> Result<u16> {
        self.read_fixed(command).map(u16::from_be_bytes)
    }

    pub fn read_u32(&self, command: &str) -> Result<u32> {
        self.read_fixed(command).map(u32::from_be_bytes)
    }

    pub fn write_u8(&self, command: &str, value: u8) -> Result<()> {
        self.at_command_write(command, &[value])
    }

    pub fn write_u16(&self, command: &str, value: u16) -> Result<()> {
        self.at_command_write(command, &value.to_be_bytes())
    }

    pub fn write_u32(&self, command: &str, value: u32) -> Result<()> {
        self.at_command_write(command, &value.to_be_bytes())
    }

    /// Dispatch loop counters.
    pub fn stats(&self) -> DispatchStatsSnapshot {
        self.shared.stats.snapshot()
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    fn execute(&self, command: &str, parameter: &[u8], capacity: usize) -> Result<Bytes> {
        let command = AtCommand::new(command)?;
        self.requester
            .request(Frame::at_command(command, parameter), capacity)
    }

    // The full value is requested so an over-long response is reported
    // instead of silently truncated.
    fn read_fixed<const N: usize>(&self, command: &str) -> Result<[u8; N]> {
        let value = self.execute(command, &[], usize::MAX)?;
        <[u8; N]>::try_from(value.as_ref()).map_err(|_| ClientError::LengthMismatch {
            expected: N,
            actual: value.len(),
        })
    }
}

// Closing the queue releases a dispatch loop parked on a full queue under
// `OverflowPolicy::Block`; nobody is left to drain it.
impl<W> Drop for Client<W> {
    fn drop(&mut self) {
        self.shared.inbound.close();
    }
}

/// Build a client and run its dispatch loop on a dedicated thread.
///
/// The thread exits when `source` reports the connection closed.
pub fn spawn<R, W>(source: R, sink: W, config: ClientConfig) -> Result<(Client<W>, JoinHandle<()>)>
where
    R: FrameSource + Send + 'static,
    W: FrameSink,
{
    let (client, dispatcher) = Client::new(source, sink, config);
    let handle = thread::Builder::new()
        .name(DISPATCH_THREAD_NAME.to_string())
        .spawn(move || dispatcher.run())
        .map_err(ClientError::Spawn)?;
    Ok((client, handle))
}
