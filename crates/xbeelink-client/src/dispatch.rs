//! The dispatch loop: sole reader of the frame transport.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use xbeelink_frame::frame::{
    AT_RESPONSE_HEADER_SIZE, RX_LONG_HEADER_SIZE, RX_SHORT_HEADER_SIZE, TX_STATUS_SIZE,
};
use xbeelink_frame::{Address, Frame, FrameError, FrameSource, FrameType};

use crate::queue::{InboundQueue, PushOutcome};
use crate::rpc::{ResponseSlot, ResponseStatus};

/// Counters maintained by the dispatch loop.
#[derive(Debug, Default)]
pub struct DispatchStats {
    frames: AtomicU64,
    datagrams: AtomicU64,
    responses: AtomicU64,
    protocol_errors: AtomicU64,
    unmatched: AtomicU64,
    dropped: AtomicU64,
    ignored: AtomicU64,
}

/// Point-in-time copy of [`DispatchStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchStatsSnapshot {
    /// Frames read from the transport.
    pub frames: u64,
    /// Datagrams placed in the inbound queue.
    pub datagrams: u64,
    /// Responses delivered to a waiting request.
    pub responses: u64,
    /// Frames dropped for being malformed, plus transport decode errors.
    pub protocol_errors: u64,
    /// Responses with no matching pending request.
    pub unmatched: u64,
    /// Datagrams discarded because the inbound queue was full.
    pub dropped: u64,
    /// Frames of a type the loop does not route.
    pub ignored: u64,
}

impl DispatchStats {
    pub fn snapshot(&self) -> DispatchStatsSnapshot {
        DispatchStatsSnapshot {
            frames: self.frames.load(Ordering::Relaxed),
            datagrams: self.datagrams.load(Ordering::Relaxed),
            responses: self.responses.load(Ordering::Relaxed),
            protocol_errors: self.protocol_errors.load(Ordering::Relaxed),
            unmatched: self.unmatched.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            ignored: self.ignored.load(Ordering::Relaxed),
        }
    }

    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

/// State shared between a client and its dispatch loop.
#[derive(Debug)]
pub(crate) struct Shared {
    pub(crate) slot: Arc<ResponseSlot>,
    pub(crate) inbound: InboundQueue,
    pub(crate) stats: DispatchStats,
}

impl Shared {
    fn shutdown(&self) {
        self.inbound.close();
        self.slot.close();
    }
}

/// Reads frames from the transport and routes them.
///
/// Datagrams go to the inbound queue; TX status and AT command responses
/// complete the pending request. Malformed frames are counted and dropped.
pub struct Dispatcher<R> {
    source: R,
    shared: Arc<Shared>,
    log_frames: bool,
}

impl<R: FrameSource> Dispatcher<R> {
    pub(crate) fn new(source: R, shared: Arc<Shared>, log_frames: bool) -> Self {
        Self {
            source,
            shared,
            log_frames,
        }
    }

    /// Run until the transport closes.
    ///
    /// On exit the inbound queue and the response slot are closed, so
    /// blocked callers fail with `Disconnected` instead of hanging.
    pub fn run(mut self) {
        tracing::info!("dispatch loop started");
        loop {
            match self.source.read_frame() {
                Ok(frame) => self.dispatch(&frame),
                Err(FrameError::ConnectionClosed) => break,
                Err(err) => {
                    DispatchStats::bump(&self.shared.stats.protocol_errors);
                    tracing::warn!(error = %err, "frame read failed");
                }
            }
        }
        self.shared.shutdown();
        tracing::info!("dispatch loop stopped");
    }

    /// Route a single inbound frame.
    pub fn dispatch(&self, frame: &Frame) {
        let stats = &self.shared.stats;
        DispatchStats::bump(&stats.frames);
        if self.log_frames {
            tracing::trace!(
                frame_type = frame.frame_type.name(),
                len = frame.payload.len(),
                "rx frame"
            );
        }

        let payload = frame.payload.as_ref();
        match frame.frame_type {
            FrameType::RxShort => self.on_datagram(frame, RX_SHORT_HEADER_SIZE),
            FrameType::RxLong => self.on_datagram(frame, RX_LONG_HEADER_SIZE),
            FrameType::TxStatus => {
                if payload.len() != TX_STATUS_SIZE {
                    self.malformed(frame);
                    return;
                }
                self.on_response(payload[0], payload[1], &[]);
            }
            FrameType::AtCommandResponse => {
                if payload.len() < AT_RESPONSE_HEADER_SIZE {
                    self.malformed(frame);
                    return;
                }
                self.on_response(
                    payload[0],
                    payload[3],
                    &payload[AT_RESPONSE_HEADER_SIZE..],
                );
            }
            FrameType::AtCommand
            | FrameType::TxRequestShort
            | FrameType::TxRequestLong
            | FrameType::Unknown(_) => {
                DispatchStats::bump(&stats.ignored);
                tracing::trace!(frame_type = frame.frame_type.as_u8(), "ignoring frame");
            }
        }
    }

    fn on_datagram(&self, frame: &Frame, header: usize) {
        if frame.payload.len() < header {
            self.malformed(frame);
            return;
        }
        let stats = &self.shared.stats;
        let address = Address::from_frame(frame);
        let data = &frame.payload[header..];

        match self.shared.inbound.push(&address, data) {
            Ok(PushOutcome::Queued) => DispatchStats::bump(&stats.datagrams),
            Ok(PushOutcome::Dropped) => {
                DispatchStats::bump(&stats.dropped);
                tracing::debug!(
                    %address,
                    len = data.len(),
                    "inbound queue full, datagram dropped"
                );
            }
            Err(err) => {
                DispatchStats::bump(&stats.dropped);
                tracing::warn!(error = %err, "inbound queue unavailable");
            }
        }
    }

    fn on_response(&self, frame_id: u8, status: u8, value: &[u8]) {
        let stats = &self.shared.stats;
        if self
            .shared
            .slot
            .complete(frame_id, ResponseStatus::from_byte(status), value)
        {
            DispatchStats::bump(&stats.responses);
        } else {
            DispatchStats::bump(&stats.unmatched);
        }
    }

    fn malformed(&self, frame: &Frame) {
        DispatchStats::bump(&self.shared.stats.protocol_errors);
        tracing::debug!(
            frame_type = frame.frame_type.name(),
            len = frame.payload.len(),
            "dropping malformed frame"
        );
    }
}
