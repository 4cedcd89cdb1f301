use crate::frame::VideoFrame;

/// Hand-gesture classification reduced to a single trigger bit per frame
pub trait GestureDetector {
    fn detect(&mut self, frame: &VideoFrame) -> bool;
}
