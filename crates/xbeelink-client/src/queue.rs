//! Bounded byte queue of inbound datagrams.
//!
//! Records are stored back to back as
//! `length (u16 BE) | address tag | address bytes | payload`.
//! One producer (the dispatch loop) and any number of consumers; a record
//! is always consumed whole under the queue lock.

use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use bytes::{Buf, BufMut, BytesMut};
use xbeelink_frame::Address;

use crate::config::OverflowPolicy;
use crate::error::{ClientError, Result};

/// Bytes of record header before the address bytes.
const RECORD_HEADER_SIZE: usize = 3;

/// Outcome of offering a datagram to the queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushOutcome {
    Queued,
    Dropped,
}

#[derive(Debug)]
struct QueueState {
    buf: BytesMut,
    closed: bool,
}

/// Inbound datagram queue shared by the dispatch loop and consumers.
#[derive(Debug)]
pub struct InboundQueue {
    state: Mutex<QueueState>,
    readable: Condvar,
    writable: Condvar,
    capacity: usize,
    overflow: OverflowPolicy,
}

impl InboundQueue {
    pub fn new(capacity: usize, overflow: OverflowPolicy) -> Self {
        Self {
            state: Mutex::new(QueueState {
                buf: BytesMut::with_capacity(capacity),
                closed: false,
            }),
            readable: Condvar::new(),
            writable: Condvar::new(),
            capacity,
            overflow,
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, QueueState>> {
        self.state
            .lock()
            .map_err(|_| ClientError::LockPoisoned("inbound queue"))
    }

    /// Bytes a datagram occupies in the queue.
    pub fn record_size(address: &Address, payload_len: usize) -> usize {
        RECORD_HEADER_SIZE + address.as_bytes().len() + payload_len
    }

    /// Append one datagram.
    ///
    /// Records that can never fit, and records arriving while the queue is
    /// full under [`OverflowPolicy::DropNewest`], are dropped.
    pub fn push(&self, address: &Address, payload: &[u8]) -> Result<PushOutcome> {
        let size = Self::record_size(address, payload.len());
        if size > self.capacity || payload.len() > u16::MAX as usize {
            return Ok(PushOutcome::Dropped);
        }

        let mut state = self.lock()?;
        while state.buf.len() + size > self.capacity {
            if state.closed {
                return Ok(PushOutcome::Dropped);
            }
            match self.overflow {
                OverflowPolicy::DropNewest => return Ok(PushOutcome::Dropped),
                OverflowPolicy::Block => {
                    state = self
                        .writable
                        .wait(state)
                        .map_err(|_| ClientError::LockPoisoned("inbound queue"))?;
                }
            }
        }

        state.buf.put_u16(payload.len() as u16);
        state.buf.put_u8(address.tag());
        state.buf.put_slice(address.as_bytes());
        state.buf.put_slice(payload);
        self.readable.notify_one();
        Ok(PushOutcome::Queued)
    }

    /// Take the oldest datagram, copying at most `buf.len()` payload bytes.
    ///
    /// Payload bytes beyond `buf.len()` are discarded. With `block` unset an
    /// empty queue fails with [`ClientError::WouldBlock`].
    pub fn pop(&self, buf: &mut [u8], block: bool) -> Result<(usize, Address)> {
        self.pop_until(buf, block, None)
    }

    /// Like [`InboundQueue::pop`] but gives up after `timeout`.
    pub fn pop_timeout(&self, buf: &mut [u8], timeout: Duration) -> Result<(usize, Address)> {
        self.pop_until(buf, true, Some(Instant::now() + timeout))
    }

    fn pop_until(
        &self,
        buf: &mut [u8],
        block: bool,
        deadline: Option<Instant>,
    ) -> Result<(usize, Address)> {
        let mut state = self.lock()?;
        loop {
            if !state.buf.is_empty() {
                let record = take_record(&mut state.buf, buf);
                self.writable.notify_all();
                return record;
            }
            if state.closed {
                return Err(ClientError::Disconnected);
            }
            if !block {
                return Err(ClientError::WouldBlock);
            }
            state = match deadline {
                None => self
                    .readable
                    .wait(state)
                    .map_err(|_| ClientError::LockPoisoned("inbound queue"))?,
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return Err(ClientError::WouldBlock);
                    }
                    self.readable
                        .wait_timeout(state, deadline - now)
                        .map_err(|_| ClientError::LockPoisoned("inbound queue"))?
                        .0
                }
            };
        }
    }

    /// Bytes currently queued.
    pub fn len(&self) -> usize {
        // Records are appended and removed whole, so a poisoned buffer still
        // has an accurate length.
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .buf
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Stop accepting datagrams. Queued records stay readable; once drained,
    /// consumers get [`ClientError::Disconnected`]. A producer parked on a
    /// full queue wakes and drops its record.
    pub fn close(&self) {
        if let Ok(mut state) = self.state.lock() {
            state.closed = true;
        }
        self.readable.notify_all();
        self.writable.notify_all();
    }
}

fn take_record(queue: &mut BytesMut, out: &mut [u8]) -> Result<(usize, Address)> {
    let payload_len = queue.get_u16() as usize;
    let tag = queue.get_u8();
    let address_len = Address::len_for_tag(tag).ok_or_else(|| {
        queue.clear();
        ClientError::ProtocolViolation(format!("corrupt queue record tag {tag}"))
    })?;
    let address_bytes = queue.split_to(address_len);
    let address = Address::from_tag(tag, &address_bytes).unwrap_or_default();

    let copied = payload_len.min(out.len());
    queue.copy_to_slice(&mut out[..copied]);
    queue.advance(payload_len - copied);
    Ok((copied, address))
}
