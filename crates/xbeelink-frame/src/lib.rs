//! Typed API frames and the frame transport boundary for xbeelink.
//!
//! This is the lowest layer of xbeelink. It models the frames exchanged with
//! the radio module:
//! - [`Frame`] / [`FrameType`] with payload builders for every frame kind
//! - [`Address`] for 16-bit and 64-bit peers
//! - [`FrameSource`] / [`FrameSink`], the blocking transport boundary
//!
//! The byte-level wire codec is supplied by the caller through
//! [`FrameCodec`]; [`FrameReader`] and [`FrameWriter`] adapt it to any
//! `Read` / `Write` stream.

pub mod address;
pub mod codec;
pub mod error;
pub mod frame;
pub mod memory;
pub mod reader;
pub mod transport;
pub mod writer;

pub use address::{print_address, Address};
pub use codec::{FrameCodec, FrameConfig, DEFAULT_MAX_PAYLOAD};
pub use error::{FrameError, Result};
pub use frame::{AtCommand, Frame, FrameType, FRAME_ID_NO_ACK};
pub use reader::FrameReader;
pub use transport::{FrameSink, FrameSource};
pub use writer::FrameWriter;
