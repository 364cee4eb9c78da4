//! Request/response correlation.
//!
//! A client has at most one correlated request in flight. The
//! [`Requester`] serializes requests behind one lock that owns both the
//! frame sink and the [`FrameIdAllocator`], and parks the caller on a
//! [`ResponseSlot`] until the dispatch loop completes it or the wait times
//! out.

use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use bytes::Bytes;
use xbeelink_frame::{Frame, FrameSink, FRAME_ID_NO_ACK};

use crate::error::{ClientError, Result};

/// Hands out frame ids, skipping the no-ack sentinel.
#[derive(Debug)]
pub struct FrameIdAllocator {
    current: u8,
}

impl FrameIdAllocator {
    pub fn new() -> Self {
        Self {
            current: FRAME_ID_NO_ACK,
        }
    }

    /// Next frame id. Wraps at 256 and never returns [`FRAME_ID_NO_ACK`].
    pub fn next_id(&mut self) -> u8 {
        self.current = self.current.wrapping_add(1);
        if self.current == FRAME_ID_NO_ACK {
            self.current = self.current.wrapping_add(1);
        }
        self.current
    }
}

impl Default for FrameIdAllocator {
    fn default() -> Self {
        Self::new()
    }
}

/// Status byte reported in a TX status or AT command response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseStatus {
    Ok,
    Failed(u8),
}

impl ResponseStatus {
    pub fn from_byte(status: u8) -> Self {
        if status == 0 {
            ResponseStatus::Ok
        } else {
            ResponseStatus::Failed(status)
        }
    }
}

#[derive(Debug)]
struct Completion {
    frame_id: u8,
    status: ResponseStatus,
    payload: Bytes,
}

#[derive(Debug)]
enum SlotState {
    Idle,
    Awaiting { frame_id: u8, capacity: usize },
    Completed(Completion),
}

#[derive(Debug)]
struct SlotInner {
    state: SlotState,
    closed: bool,
}

/// Handle for a published request, consumed by [`ResponseSlot::wait`] or
/// [`ResponseSlot::cancel`].
#[derive(Debug)]
#[must_use = "a pending request must be waited on or cancelled"]
pub struct PendingRequest {
    frame_id: u8,
}

impl PendingRequest {
    pub fn frame_id(&self) -> u8 {
        self.frame_id
    }
}

/// The single pending-request register shared with the dispatch loop.
#[derive(Debug)]
pub struct ResponseSlot {
    inner: Mutex<SlotInner>,
    ready: Condvar,
}

impl ResponseSlot {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(SlotInner {
                state: SlotState::Idle,
                closed: false,
            }),
            ready: Condvar::new(),
        }
    }

    // Every transition is a single assignment, so a poisoned guard still
    // holds a consistent state.
    fn lock(&self) -> MutexGuard<'_, SlotInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Publish interest in the response to `frame_id`.
    ///
    /// At most `capacity` response bytes are kept.
    pub fn begin_wait(&self, frame_id: u8, capacity: usize) -> Result<PendingRequest> {
        let mut inner = self.lock();
        if inner.closed {
            return Err(ClientError::Disconnected);
        }
        inner.state = SlotState::Awaiting { frame_id, capacity };
        Ok(PendingRequest { frame_id })
    }

    /// Block until the response arrives or `timeout` elapses.
    ///
    /// The slot is empty again when this returns, whatever the outcome.
    pub fn wait(&self, pending: PendingRequest, timeout: Duration) -> Result<Bytes> {
        let deadline = Instant::now() + timeout;
        let mut inner = self.lock();

        loop {
            match std::mem::replace(&mut inner.state, SlotState::Idle) {
                SlotState::Completed(completion) => {
                    return match completion.status {
                        ResponseStatus::Ok => Ok(completion.payload),
                        ResponseStatus::Failed(status) => {
                            Err(ClientError::ProtocolViolation(format!(
                                "negative status {status} for frame id 0x{:02x}",
                                completion.frame_id
                            )))
                        }
                    };
                }
                state => inner.state = state,
            }

            if inner.closed {
                inner.state = SlotState::Idle;
                return Err(ClientError::Disconnected);
            }

            let now = Instant::now();
            if now >= deadline {
                inner.state = SlotState::Idle;
                tracing::debug!(frame_id = pending.frame_id, "response timed out");
                return Err(ClientError::Timeout(timeout));
            }

            let (guard, _) = self
                .ready
                .wait_timeout(inner, deadline - now)
                .unwrap_or_else(PoisonError::into_inner);
            inner = guard;
        }
    }

    /// Withdraw a published request without waiting.
    pub fn cancel(&self, pending: PendingRequest) {
        let mut inner = self.lock();
        if let SlotState::Awaiting { frame_id, .. } = inner.state {
            if frame_id == pending.frame_id {
                inner.state = SlotState::Idle;
            }
        }
    }

    /// Deliver a response. Called by the dispatch loop only.
    ///
    /// Returns false, leaving the slot untouched, if nothing is pending or
    /// the pending request has a different frame id.
    pub fn complete(&self, frame_id: u8, status: ResponseStatus, payload: &[u8]) -> bool {
        let mut inner = self.lock();
        let capacity = match inner.state {
            SlotState::Awaiting {
                frame_id: expected,
                capacity,
            } => {
                if expected != frame_id {
                    tracing::debug!(
                        expected = expected,
                        got = frame_id,
                        "response frame id mismatch"
                    );
                    return false;
                }
                capacity
            }
            SlotState::Idle | SlotState::Completed(_) => {
                tracing::debug!(frame_id, "unexpected response");
                return false;
            }
        };

        if let ResponseStatus::Failed(code) = status {
            tracing::warn!(frame_id, status = code, "negative response status");
        }

        let len = payload.len().min(capacity);
        inner.state = SlotState::Completed(Completion {
            frame_id,
            status,
            payload: Bytes::copy_from_slice(&payload[..len]),
        });
        self.ready.notify_one();
        true
    }

    /// Frame id of the request currently awaiting a response.
    pub fn pending_frame_id(&self) -> Option<u8> {
        match self.lock().state {
            SlotState::Awaiting { frame_id, .. } => Some(frame_id),
            _ => None,
        }
    }

    /// Fail current and future waits with [`ClientError::Disconnected`].
    pub fn close(&self) {
        let mut inner = self.lock();
        inner.closed = true;
        self.ready.notify_all();
    }
}

impl Default for ResponseSlot {
    fn default() -> Self {
        Self::new()
    }
}

struct Outbound<W> {
    sink: W,
    ids: FrameIdAllocator,
}

/// Issues requests one at a time.
///
/// The issuance lock is held from frame id allocation until the response
/// is consumed or the wait times out, so the slot never sees two requests.
pub struct Requester<W> {
    outbound: Mutex<Outbound<W>>,
    slot: Arc<ResponseSlot>,
    timeout: Duration,
    log_frames: bool,
}

impl<W: FrameSink> Requester<W> {
    pub fn new(sink: W, slot: Arc<ResponseSlot>, timeout: Duration, log_frames: bool) -> Self {
        Self {
            outbound: Mutex::new(Outbound {
                sink,
                ids: FrameIdAllocator::new(),
            }),
            slot,
            timeout,
            log_frames,
        }
    }

    /// Send `frame` with a fresh frame id and wait for its response.
    ///
    /// Returns at most `capacity` bytes of response data.
    pub fn request(&self, frame: Frame, capacity: usize) -> Result<Bytes> {
        let mut outbound = self
            .outbound
            .lock()
            .map_err(|_| ClientError::LockPoisoned("request"))?;

        let frame_id = outbound.ids.next_id();
        let frame = frame.with_frame_id(frame_id)?;
        let pending = self.slot.begin_wait(frame_id, capacity)?;

        if self.log_frames {
            tracing::trace!(
                frame_type = frame.frame_type.name(),
                frame_id,
                len = frame.payload.len(),
                "tx frame"
            );
        }
        if let Err(err) = outbound.sink.write_frame(&frame) {
            self.slot.cancel(pending);
            return Err(err.into());
        }

        self.slot.wait(pending, self.timeout)
    }

    /// Send `frame` with the no-ack frame id. Nothing is awaited.
    pub fn send_no_ack(&self, frame: Frame) -> Result<()> {
        let mut outbound = self
            .outbound
            .lock()
            .map_err(|_| ClientError::LockPoisoned("request"))?;

        let frame = frame.with_frame_id(FRAME_ID_NO_ACK)?;
        if self.log_frames {
            tracing::trace!(
                frame_type = frame.frame_type.name(),
                len = frame.payload.len(),
                "tx frame"
            );
        }
        outbound.sink.write_frame(&frame)?;
        Ok(())
    }

    /// The configured response timeout.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}
