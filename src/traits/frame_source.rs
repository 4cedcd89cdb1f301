use crate::frame::VideoFrame;

/// Video frame acquisition
pub trait FrameSource {
    /// Next frame, or `None` once the stream has ended
    fn next_frame(&mut self) -> Option<VideoFrame>;

    /// Source name for logging
    fn name(&self) -> &str {
        "FrameSource"
    }
}

impl<S: FrameSource + ?Sized> FrameSource for Box<S> {
    fn next_frame(&mut self) -> Option<VideoFrame> {
        (**self).next_frame()
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}
