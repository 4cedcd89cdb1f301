//! Bundled collaborators for running without camera hardware or a marker
//! detector.

pub mod frames;
pub mod gesture;
pub mod pose;

pub use frames::{ImageFrameSource, SyntheticFrameSource, ThreadedFrameSource};
pub use gesture::{
    FistGestureDetector, HandShape, KeyTrigger, KeyTriggerHandle, SkinAreaGestureDetector,
};
pub use pose::{ScriptedPoseEstimator, SweepPoseEstimator};
