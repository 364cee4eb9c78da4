use std::io::{ErrorKind, Write};

use bytes::BytesMut;

use crate::codec::{FrameCodec, FrameConfig};
use crate::error::{FrameError, Result};
use crate::frame::Frame;
use crate::transport::FrameSink;

const INITIAL_BUFFER_CAPACITY: usize = 512;

/// Writes complete frames to any `Write` stream using a [`FrameCodec`].
pub struct FrameWriter<T, C> {
    inner: T,
    codec: C,
    buf: BytesMut,
    config: FrameConfig,
}

impl<T: Write, C: FrameCodec> FrameWriter<T, C> {
    /// Create a new frame writer with default configuration.
    pub fn new(inner: T, codec: C) -> Self {
        Self::with_config(inner, codec, FrameConfig::default())
    }

    /// Create a new frame writer with explicit configuration.
    pub fn with_config(inner: T, codec: C, config: FrameConfig) -> Self {
        Self {
            inner,
            codec,
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            config,
        }
    }

    /// Encode and write a complete frame (blocking).
    pub fn write_frame(&mut self, frame: &Frame) -> Result<()> {
        if frame.payload.len() > self.config.max_payload_size {
            return Err(FrameError::PayloadTooLarge {
                size: frame.payload.len(),
                max: self.config.max_payload_size,
            });
        }

        self.buf.clear();
        self.codec.encode(frame, &mut self.buf)?;

        let mut offset = 0usize;
        while offset < self.buf.len() {
            match self.inner.write(&self.buf[offset..]) {
                Ok(0) => return Err(FrameError::ConnectionClosed),
                Ok(n) => offset += n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) if err.kind() == ErrorKind::WouldBlock => continue,
                Err(err) => return Err(FrameError::Io(err)),
            }
        }

        self.flush()
    }

    /// Flush the underlying stream.
    pub fn flush(&mut self) -> Result<()> {
        loop {
            match self.inner.flush() {
                Ok(()) => return Ok(()),
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) if err.kind() == ErrorKind::WouldBlock => continue,
                Err(err) => return Err(FrameError::Io(err)),
            }
        }
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Consume the writer and return the inner stream.
    pub fn into_inner(self) -> T {
        self.inner
    }
}

impl<T: Write, C: FrameCodec> FrameSink for FrameWriter<T, C> {
    fn write_frame(&mut self, frame: &Frame) -> Result<()> {
        FrameWriter::write_frame(self, frame)
    }
}
