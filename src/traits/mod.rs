pub mod calibration;
pub mod frame_source;
pub mod gesture;
pub mod pose_estimator;

pub use calibration::*;
pub use frame_source::*;
pub use gesture::*;
pub use pose_estimator::*;
