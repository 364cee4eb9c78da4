use crate::error::Result;
use crate::frame::Frame;

/// Inbound half of a frame transport.
///
/// `read_frame` blocks until a complete, checksummed frame is available.
/// Implementations return [`FrameError::ConnectionClosed`] once no further
/// frames can arrive; any other error is treated as recoverable by callers.
///
/// [`FrameError::ConnectionClosed`]: crate::FrameError::ConnectionClosed
pub trait FrameSource {
    fn read_frame(&mut self) -> Result<Frame>;
}

/// Outbound half of a frame transport.
pub trait FrameSink {
    fn write_frame(&mut self, frame: &Frame) -> Result<()>;
}

impl<T: FrameSource + ?Sized> FrameSource for Box<T> {
    fn read_frame(&mut self) -> Result<Frame> {
        (**self).read_frame()
    }
}

impl<T: FrameSink + ?Sized> FrameSink for Box<T> {
    fn write_frame(&mut self, frame: &Frame) -> Result<()> {
        (**self).write_frame(frame)
    }
}
