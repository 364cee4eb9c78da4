use std::io::{ErrorKind, Read};

use bytes::BytesMut;

use crate::codec::{FrameCodec, FrameConfig};
use crate::error::{FrameError, Result};
use crate::frame::Frame;
use crate::transport::FrameSource;

const INITIAL_BUFFER_CAPACITY: usize = 1024;
const READ_CHUNK_SIZE: usize = 256;

/// Reads complete frames from any `Read` stream using a [`FrameCodec`].
///
/// Handles partial reads internally; callers always get complete frames.
pub struct FrameReader<T, C> {
    inner: T,
    codec: C,
    buf: BytesMut,
    config: FrameConfig,
}

impl<T: Read, C: FrameCodec> FrameReader<T, C> {
    /// Create a new frame reader with default configuration.
    pub fn new(inner: T, codec: C) -> Self {
        Self::with_config(inner, codec, FrameConfig::default())
    }

    /// Create a new frame reader with explicit configuration.
    pub fn with_config(inner: T, codec: C, config: FrameConfig) -> Self {
        Self {
            inner,
            codec,
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            config,
        }
    }

    /// Read the next complete frame (blocking).
    ///
    /// Returns `Err(FrameError::ConnectionClosed)` when EOF is reached.
    pub fn read_frame(&mut self) -> Result<Frame> {
        loop {
            if let Some(frame) = self.codec.decode(&mut self.buf)? {
                if frame.payload.len() > self.config.max_payload_size {
                    return Err(FrameError::PayloadTooLarge {
                        size: frame.payload.len(),
                        max: self.config.max_payload_size,
                    });
                }
                return Ok(frame);
            }

            let mut chunk = [0u8; READ_CHUNK_SIZE];
            let read = match self.inner.read(&mut chunk) {
                Ok(n) => n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(FrameError::Io(err)),
            };

            if read == 0 {
                return Err(FrameError::ConnectionClosed);
            }

            self.buf.extend_from_slice(&chunk[..read]);
        }
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Consume the reader and return the inner stream.
    pub fn into_inner(self) -> T {
        self.inner
    }
}

impl<T: Read, C: FrameCodec> FrameSource for FrameReader<T, C> {
    fn read_frame(&mut self) -> Result<Frame> {
        FrameReader::read_frame(self)
    }
}
