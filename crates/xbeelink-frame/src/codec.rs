use bytes::BytesMut;

use crate::error::Result;
use crate::frame::Frame;

/// Largest frame data accepted by default (API identifier excluded).
pub const DEFAULT_MAX_PAYLOAD: usize = 256;

/// Byte-level encoding of API frames.
///
/// The wire format (start delimiter, length, checksum, escaping) is owned by
/// the implementation. `FrameReader` and `FrameWriter` only handle buffering
/// and I/O around it.
pub trait FrameCodec {
    /// Append the wire form of `frame` to `dst`.
    fn encode(&mut self, frame: &Frame, dst: &mut BytesMut) -> Result<()>;

    /// Decode one frame from the front of `src`.
    ///
    /// Returns `Ok(None)` if `src` does not yet hold a complete frame. On
    /// success the frame bytes are consumed. On error the codec must consume
    /// at least the offending bytes so the next call can resynchronize.
    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Frame>>;
}

/// Configuration for codec-driven readers and writers.
#[derive(Debug, Clone)]
pub struct FrameConfig {
    /// Maximum frame data size in bytes. Default: 256.
    pub max_payload_size: usize,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            max_payload_size: DEFAULT_MAX_PAYLOAD,
        }
    }
}

#[cfg(test)]
pub(crate) mod test_codec {
    use bytes::{Buf, BufMut, BytesMut};

    use super::FrameCodec;
    use crate::error::{FrameError, Result};
    use crate::frame::{Frame, FrameType};

    /// `[0x7e, len, type, payload...]` with a single-byte length.
    pub(crate) struct TinyCodec;

    impl FrameCodec for TinyCodec {
        fn encode(&mut self, frame: &Frame, dst: &mut BytesMut) -> Result<()> {
            let len = u8::try_from(frame.payload.len()).map_err(|_| {
                FrameError::PayloadTooLarge {
                    size: frame.payload.len(),
                    max: u8::MAX as usize,
                }
            })?;
            dst.put_u8(0x7e);
            dst.put_u8(len);
            dst.put_u8(frame.frame_type.as_u8());
            dst.put_slice(&frame.payload);
            Ok(())
        }

        fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Frame>> {
            if src.is_empty() {
                return Ok(None);
            }
            if src[0] != 0x7e {
                src.advance(1);
                return Err(FrameError::Decode("missing start delimiter".to_string()));
            }
            if src.len() < 3 {
                return Ok(None);
            }
            let len = src[1] as usize;
            if src.len() < 3 + len {
                return Ok(None);
            }
            src.advance(2);
            let frame_type = FrameType::from_u8(src.get_u8());
            let payload = src.split_to(len).freeze();
            Ok(Some(Frame::new(frame_type, payload)))
        }
    }
}
