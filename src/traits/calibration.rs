use crate::calibration::CameraIntrinsics;
use crate::error::Result;
use crate::transform::Viewport;

use super::frame_source::FrameSource;

/// Produces intrinsics when no stored calibration exists
pub trait CalibrationProcedure {
    /// Returns the intrinsics and the image size they were computed for
    fn calibrate(&mut self, frames: &mut dyn FrameSource) -> Result<(CameraIntrinsics, Viewport)>;
}
