use std::fs;

use ar_overlay::calibration::{
    ensure_calibration, load_calibration, save_calibration, CalibrationStatus, CameraIntrinsics,
    NominalCalibration,
};
use ar_overlay::sources::SyntheticFrameSource;
use ar_overlay::traits::FrameSource;
use ar_overlay::transform::Viewport;

#[cfg(test)]
mod calibration_tests {
    use super::*;

    #[test]
    fn test_round_trip_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("round_trip.json");
        let intrinsics = CameraIntrinsics::new(
            [[612.5, 0.0, 318.2], [0.0, 611.9, 241.7], [0.0, 0.0, 1.0]],
            vec![0.12, -0.25, 0.001, -0.002, 0.1],
        );

        save_calibration(&path, &intrinsics, Viewport::new(640, 480)).unwrap();
        assert_eq!(
            load_calibration(&path),
            CalibrationStatus::Calibrated(intrinsics.with_image_size(Viewport::new(640, 480)))
        );

        let text = fs::read_to_string(&path).unwrap();
        assert!(text.contains("cameraMatrix"));
        assert!(text.contains("distCoeffs"));
        assert!(text.contains("calibratedAt"));
    }

    #[test]
    fn test_absent_file_is_missing() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(
            load_calibration(dir.path().join("never_written.json")),
            CalibrationStatus::Missing
        );
    }

    #[test]
    fn test_missing_keys_are_missing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("no_dist.json");
        fs::write(&path, r#"{"cameraMatrix": [[1, 0, 0], [0, 1, 0], [0, 0, 1]]}"#).unwrap();
        assert_eq!(load_calibration(&path), CalibrationStatus::Missing);

        fs::write(&path, r#"{"cameraMatrix": [[1, 0, 0], [0, 1, 0], [0, 0, 1]], "distCoeffs": []}"#)
            .unwrap();
        assert_eq!(load_calibration(&path), CalibrationStatus::Missing);

        fs::write(&path, "not json at all").unwrap();
        assert_eq!(load_calibration(&path), CalibrationStatus::Missing);
    }

    #[test]
    fn test_ensure_calibrates_once_then_loads() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ensure.json");

        let mut procedure = NominalCalibration::new(60.0);
        let mut frames = SyntheticFrameSource::new(320, 240).unwrap().with_limit(1);

        let first = ensure_calibration(&path, false, &mut procedure, &mut frames).unwrap();
        assert_eq!((first.cx(), first.cy()), (160.0, 120.0));
        // The procedure used up the only frame
        assert!(frames.next_frame().is_none());

        // Stored now: no frames needed
        let second = ensure_calibration(&path, false, &mut procedure, &mut frames).unwrap();
        assert_eq!(first, second);

        assert_eq!(second.image_size, Some(Viewport::new(320, 240)));
        assert!(!second.matches_frame_size(Viewport::new(640, 480)));

        // Forcing recalibration needs a frame again
        assert!(ensure_calibration(&path, true, &mut procedure, &mut frames).is_err());
    }
}
