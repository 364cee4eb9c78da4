//! In-memory frame pipe.
//!
//! Each [`channel`] call creates one direction. A host and a simulated
//! module need two: one for requests, one for responses.

use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, TryRecvError};

use crate::error::{FrameError, Result};
use crate::frame::Frame;
use crate::transport::{FrameSink, FrameSource};

/// Create a connected sink/source pair.
pub fn channel() -> (MemorySink, MemorySource) {
    let (tx, rx) = crossbeam_channel::unbounded();
    (MemorySink { tx }, MemorySource { rx })
}

/// Sending end of an in-memory frame pipe.
#[derive(Debug, Clone)]
pub struct MemorySink {
    tx: Sender<Frame>,
}

/// Receiving end of an in-memory frame pipe.
#[derive(Debug)]
pub struct MemorySource {
    rx: Receiver<Frame>,
}

impl MemorySource {
    /// Frames written but not yet read.
    pub fn pending(&self) -> usize {
        self.rx.len()
    }

    /// Return the next frame if one is already queued.
    pub fn try_read_frame(&mut self) -> Result<Option<Frame>> {
        match self.rx.try_recv() {
            Ok(frame) => Ok(Some(frame)),
            Err(TryRecvError::Empty) => Ok(None),
            Err(TryRecvError::Disconnected) => Err(FrameError::ConnectionClosed),
        }
    }

    /// Wait up to `timeout` for the next frame.
    pub fn read_frame_timeout(&mut self, timeout: Duration) -> Result<Option<Frame>> {
        match self.rx.recv_timeout(timeout) {
            Ok(frame) => Ok(Some(frame)),
            Err(RecvTimeoutError::Timeout) => Ok(None),
            Err(RecvTimeoutError::Disconnected) => Err(FrameError::ConnectionClosed),
        }
    }
}

impl FrameSource for MemorySource {
    fn read_frame(&mut self) -> Result<Frame> {
        self.rx.recv().map_err(|_| FrameError::ConnectionClosed)
    }
}

impl FrameSink for MemorySink {
    fn write_frame(&mut self, frame: &Frame) -> Result<()> {
        self.tx
            .send(frame.clone())
            .map_err(|_| FrameError::ConnectionClosed)
    }
}
