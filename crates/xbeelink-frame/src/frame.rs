use std::fmt;
use std::str::FromStr;

use bytes::{BufMut, Bytes, BytesMut};

use crate::error::{FrameError, Result};

/// Frame id that asks the module not to send a response.
pub const FRAME_ID_NO_ACK: u8 = 0;

/// Transmit option byte placed in TX requests (no options set).
pub const TX_OPTIONS_NONE: u8 = 0;

/// Minimum RX (16-bit address) payload: address (2) + RSSI + options.
pub const RX_SHORT_HEADER_SIZE: usize = 4;

/// Minimum RX (64-bit address) payload: address (8) + RSSI + options.
pub const RX_LONG_HEADER_SIZE: usize = 10;

/// Minimum AT command response payload: frame id + command (2) + status.
pub const AT_RESPONSE_HEADER_SIZE: usize = 4;

/// Exact TX status payload: frame id + status.
pub const TX_STATUS_SIZE: usize = 2;

/// API frame type identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FrameType {
    /// Local AT command request.
    AtCommand,
    /// Response to a local AT command.
    AtCommandResponse,
    /// Transmit request to a 16-bit address.
    TxRequestShort,
    /// Transmit request to a 64-bit address.
    TxRequestLong,
    /// Delivery status of a transmit request.
    TxStatus,
    /// Received packet from a 16-bit address.
    RxShort,
    /// Received packet from a 64-bit address.
    RxLong,
    /// Any API identifier this crate does not model.
    Unknown(u8),
}

impl FrameType {
    /// API identifier byte as it appears on the wire.
    pub fn as_u8(self) -> u8 {
        match self {
            FrameType::TxRequestLong => 0x00,
            FrameType::TxRequestShort => 0x01,
            FrameType::AtCommand => 0x08,
            FrameType::RxLong => 0x80,
            FrameType::RxShort => 0x81,
            FrameType::AtCommandResponse => 0x88,
            FrameType::TxStatus => 0x89,
            FrameType::Unknown(id) => id,
        }
    }

    /// Map an API identifier byte to a frame type.
    pub fn from_u8(id: u8) -> Self {
        match id {
            0x00 => FrameType::TxRequestLong,
            0x01 => FrameType::TxRequestShort,
            0x08 => FrameType::AtCommand,
            0x80 => FrameType::RxLong,
            0x81 => FrameType::RxShort,
            0x88 => FrameType::AtCommandResponse,
            0x89 => FrameType::TxStatus,
            other => FrameType::Unknown(other),
        }
    }

    /// Returns true if payload byte 0 is a frame identifier.
    pub fn carries_frame_id(self) -> bool {
        matches!(
            self,
            FrameType::AtCommand
                | FrameType::AtCommandResponse
                | FrameType::TxRequestShort
                | FrameType::TxRequestLong
                | FrameType::TxStatus
        )
    }

    /// Human-readable name.
    pub fn name(self) -> &'static str {
        match self {
            FrameType::AtCommand => "AT_COMMAND",
            FrameType::AtCommandResponse => "AT_COMMAND_RESPONSE",
            FrameType::TxRequestShort => "TX_REQUEST_16",
            FrameType::TxRequestLong => "TX_REQUEST_64",
            FrameType::TxStatus => "TX_STATUS",
            FrameType::RxShort => "RX_16",
            FrameType::RxLong => "RX_64",
            FrameType::Unknown(_) => "UNKNOWN",
        }
    }
}

/// A two-character AT command name such as `"MY"` or `"D0"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AtCommand([u8; 2]);

impl AtCommand {
    /// Parse a command name. Must be exactly two ASCII characters.
    pub fn new(name: &str) -> Result<Self> {
        match name.as_bytes() {
            [a, b] if a.is_ascii_graphic() && b.is_ascii_graphic() => Ok(Self([*a, *b])),
            _ => Err(FrameError::InvalidCommand(name.to_string())),
        }
    }

    /// Build from raw name bytes as found in a frame.
    pub fn from_bytes(bytes: [u8; 2]) -> Self {
        Self(bytes)
    }

    /// The two name bytes.
    pub fn as_bytes(&self) -> [u8; 2] {
        self.0
    }
}

impl FromStr for AtCommand {
    type Err = FrameError;

    fn from_str(s: &str) -> Result<Self> {
        Self::new(s)
    }
}

impl fmt::Display for AtCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.0[0] as char, self.0[1] as char)
    }
}

/// One typed API frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// The API identifier.
    pub frame_type: FrameType,
    /// Frame data following the API identifier.
    pub payload: Bytes,
}

impl Frame {
    /// Create a new frame.
    pub fn new(frame_type: FrameType, payload: impl Into<Bytes>) -> Self {
        Self {
            frame_type,
            payload: payload.into(),
        }
    }

    /// Local AT command. The frame id is left as the no-ack sentinel.
    pub fn at_command(command: AtCommand, parameter: &[u8]) -> Self {
        let mut buf = BytesMut::with_capacity(3 + parameter.len());
        buf.put_u8(FRAME_ID_NO_ACK);
        buf.put_slice(&command.as_bytes());
        buf.put_slice(parameter);
        Self::new(FrameType::AtCommand, buf.freeze())
    }

    /// Transmit request to a 16-bit address.
    pub fn tx_request_short(address: [u8; 2], data: &[u8]) -> Self {
        Self::tx_request(FrameType::TxRequestShort, &address, data)
    }

    /// Transmit request to a 64-bit address.
    pub fn tx_request_long(address: [u8; 8], data: &[u8]) -> Self {
        Self::tx_request(FrameType::TxRequestLong, &address, data)
    }

    fn tx_request(frame_type: FrameType, address: &[u8], data: &[u8]) -> Self {
        let mut buf = BytesMut::with_capacity(2 + address.len() + data.len());
        buf.put_u8(FRAME_ID_NO_ACK);
        buf.put_slice(address);
        buf.put_u8(TX_OPTIONS_NONE);
        buf.put_slice(data);
        Self::new(frame_type, buf.freeze())
    }

    /// TX status as sent by the module.
    pub fn tx_status(frame_id: u8, status: u8) -> Self {
        Self::new(FrameType::TxStatus, vec![frame_id, status])
    }

    /// AT command response as sent by the module.
    pub fn at_command_response(frame_id: u8, command: AtCommand, status: u8, value: &[u8]) -> Self {
        let mut buf = BytesMut::with_capacity(AT_RESPONSE_HEADER_SIZE + value.len());
        buf.put_u8(frame_id);
        buf.put_slice(&command.as_bytes());
        buf.put_u8(status);
        buf.put_slice(value);
        Self::new(FrameType::AtCommandResponse, buf.freeze())
    }

    /// Received packet from a 16-bit address as sent by the module.
    pub fn rx_short(address: [u8; 2], rssi: u8, data: &[u8]) -> Self {
        Self::rx(FrameType::RxShort, &address, rssi, data)
    }

    /// Received packet from a 64-bit address as sent by the module.
    pub fn rx_long(address: [u8; 8], rssi: u8, data: &[u8]) -> Self {
        Self::rx(FrameType::RxLong, &address, rssi, data)
    }

    fn rx(frame_type: FrameType, address: &[u8], rssi: u8, data: &[u8]) -> Self {
        let mut buf = BytesMut::with_capacity(address.len() + 2 + data.len());
        buf.put_slice(address);
        buf.put_u8(rssi);
        buf.put_u8(TX_OPTIONS_NONE);
        buf.put_slice(data);
        Self::new(frame_type, buf.freeze())
    }

    /// The frame identifier, if this frame type carries one.
    pub fn frame_id(&self) -> Option<u8> {
        if self.frame_type.carries_frame_id() {
            self.payload.first().copied()
        } else {
            None
        }
    }

    /// Return a copy of this frame with byte 0 replaced by `frame_id`.
    pub fn with_frame_id(self, frame_id: u8) -> Result<Self> {
        if !self.frame_type.carries_frame_id() || self.payload.is_empty() {
            return Err(FrameError::MissingFrameId(self.frame_type));
        }
        let mut buf = BytesMut::from(self.payload.as_ref());
        buf[0] = frame_id;
        Ok(Self::new(self.frame_type, buf.freeze()))
    }

    /// Command name and parameter bytes of an AT command frame.
    pub fn at_command_parts(&self) -> Option<(AtCommand, &[u8])> {
        if self.frame_type != FrameType::AtCommand || self.payload.len() < 3 {
            return None;
        }
        let name = AtCommand::from_bytes([self.payload[1], self.payload[2]]);
        Some((name, &self.payload[3..]))
    }

    /// Data bytes of a TX request frame (after address and options).
    pub fn tx_data(&self) -> Option<&[u8]> {
        let offset = match self.frame_type {
            FrameType::TxRequestShort => 4,
            FrameType::TxRequestLong => 10,
            _ => return None,
        };
        self.payload.get(offset..)
    }
}
