use crate::calibration::CameraIntrinsics;
use crate::frame::VideoFrame;
use crate::pose::MarkerPose;

/// Marker detection plus pose solving
pub trait PoseEstimator {
    /// One pose per detected marker, in detection order
    fn estimate(&mut self, frame: &VideoFrame, intrinsics: &CameraIntrinsics) -> Vec<MarkerPose>;
}
