//! Peer addresses carried on TX requests and RX packets.

use std::fmt;
use std::io::{self, Write};

use crate::frame::{Frame, FrameType, RX_LONG_HEADER_SIZE, RX_SHORT_HEADER_SIZE};

/// Tag byte used when an address is serialized.
pub const TAG_INVALID: u8 = 0;
/// Tag byte of a 16-bit address.
pub const TAG_SHORT: u8 = 1;
/// Tag byte of a 64-bit address.
pub const TAG_LONG: u8 = 2;

/// A radio peer address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Address {
    /// No usable address.
    #[default]
    Invalid,
    /// 16-bit network address.
    Short([u8; 2]),
    /// 64-bit hardware address.
    Long([u8; 8]),
}

impl Address {
    /// Extract the address carried by a frame.
    ///
    /// RX packets carry the sender address at the start of the payload, TX
    /// requests carry the recipient right after the frame id. Every other
    /// frame type, and any payload too short to hold its address, yields
    /// [`Address::Invalid`].
    pub fn from_frame(frame: &Frame) -> Self {
        let payload = frame.payload.as_ref();
        match frame.frame_type {
            FrameType::RxShort if payload.len() >= RX_SHORT_HEADER_SIZE => {
                Address::Short([payload[0], payload[1]])
            }
            FrameType::RxLong if payload.len() >= RX_LONG_HEADER_SIZE => {
                let mut buf = [0u8; 8];
                buf.copy_from_slice(&payload[..8]);
                Address::Long(buf)
            }
            FrameType::TxRequestShort if payload.len() >= 4 => {
                Address::Short([payload[1], payload[2]])
            }
            FrameType::TxRequestLong if payload.len() >= 10 => {
                let mut buf = [0u8; 8];
                buf.copy_from_slice(&payload[1..9]);
                Address::Long(buf)
            }
            _ => Address::Invalid,
        }
    }

    /// Rebuild an address from its serialized tag and bytes.
    ///
    /// Returns `None` for an unknown tag or a byte count that does not
    /// match the tag.
    pub fn from_tag(tag: u8, bytes: &[u8]) -> Option<Self> {
        match (tag, bytes.len()) {
            (TAG_INVALID, 0) => Some(Address::Invalid),
            (TAG_SHORT, 2) => Some(Address::Short([bytes[0], bytes[1]])),
            (TAG_LONG, 8) => {
                let mut buf = [0u8; 8];
                buf.copy_from_slice(bytes);
                Some(Address::Long(buf))
            }
            _ => None,
        }
    }

    /// Serialization tag for this variant.
    pub fn tag(&self) -> u8 {
        match self {
            Address::Invalid => TAG_INVALID,
            Address::Short(_) => TAG_SHORT,
            Address::Long(_) => TAG_LONG,
        }
    }

    /// Raw address bytes (empty for `Invalid`).
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Address::Invalid => &[],
            Address::Short(bytes) => bytes,
            Address::Long(bytes) => bytes,
        }
    }

    /// Number of serialized address bytes for a tag, if known.
    pub fn len_for_tag(tag: u8) -> Option<usize> {
        match tag {
            TAG_INVALID => Some(0),
            TAG_SHORT => Some(2),
            TAG_LONG => Some(8),
            _ => None,
        }
    }

    pub fn is_valid(&self) -> bool {
        !matches!(self, Address::Invalid)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Address::Invalid => f.write_str("invalid"),
            Address::Short(_) | Address::Long(_) => {
                f.write_str("0x")?;
                for byte in self.as_bytes() {
                    write!(f, "{byte:02x}")?;
                }
                Ok(())
            }
        }
    }
}

/// Write a one-line description of `address` to `sink`.
pub fn print_address<W: Write>(sink: &mut W, address: &Address) -> io::Result<()> {
    write!(sink, "Address: {address}\r\n")
}
