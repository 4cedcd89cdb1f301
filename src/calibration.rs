use std::fs;
use std::path::Path;

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::error::{ArError, Result};
use crate::traits::{CalibrationProcedure, FrameSource};
use crate::transform::Viewport;

/// Focal lengths, principal point and lens distortion of the camera.
/// Immutable for the session once loaded.
#[derive(Debug, Clone, PartialEq)]
pub struct CameraIntrinsics {
    /// Row-major 3x3 `[[fx, 0, cx], [0, fy, cy], [0, 0, 1]]`
    pub camera_matrix: [[f64; 3]; 3],
    pub dist_coeffs: Vec<f64>,
    /// Frame size the calibration was made at, when known
    pub image_size: Option<Viewport>,
}

impl CameraIntrinsics {
    pub fn new(camera_matrix: [[f64; 3]; 3], dist_coeffs: Vec<f64>) -> Self {
        Self {
            camera_matrix,
            dist_coeffs,
            image_size: None,
        }
    }

    pub fn with_image_size(mut self, viewport: Viewport) -> Self {
        self.image_size = Some(viewport);
        self
    }

    /// Distortion-free pinhole camera
    pub fn pinhole(fx: f64, fy: f64, cx: f64, cy: f64) -> Self {
        Self::new(
            [[fx, 0.0, cx], [0.0, fy, cy], [0.0, 0.0, 1.0]],
            vec![0.0; 5],
        )
    }

    pub fn fx(&self) -> f64 {
        self.camera_matrix[0][0]
    }

    pub fn fy(&self) -> f64 {
        self.camera_matrix[1][1]
    }

    pub fn cx(&self) -> f64 {
        self.camera_matrix[0][2]
    }

    pub fn cy(&self) -> f64 {
        self.camera_matrix[1][2]
    }

    /// Rejects non-positive focal lengths or viewport sizes
    pub fn validate(&self, viewport: Viewport) -> Result<()> {
        let focal_ok = self.fx().is_finite() && self.fy().is_finite() && self.fx() > 0.0 && self.fy() > 0.0;
        if focal_ok && viewport.width > 0 && viewport.height > 0 {
            Ok(())
        } else {
            Err(ArError::InvalidIntrinsics {
                fx: self.fx(),
                fy: self.fy(),
                width: viewport.width,
                height: viewport.height,
            })
        }
    }

    /// False when the calibration was recorded at a different frame size.
    /// Unknown sizes are assumed to match.
    pub fn matches_frame_size(&self, viewport: Viewport) -> bool {
        self.image_size.map_or(true, |size| size == viewport)
    }
}

/// Outcome of looking for a stored calibration
#[derive(Debug, Clone, PartialEq)]
pub enum CalibrationStatus {
    Calibrated(CameraIntrinsics),
    /// No usable calibration; the app must calibrate before rendering
    Missing,
}

/// On-disk calibration document
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CalibrationDocument {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    camera_matrix: Option<[[f64; 3]; 3]>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    dist_coeffs: Option<Vec<f64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    image_width: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    image_height: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    calibrated_at: Option<String>,
}

/// Reads `cameraMatrix` and `distCoeffs` from a JSON calibration file.
/// An absent, unreadable or incomplete file means "not calibrated".
pub fn load_calibration(path: impl AsRef<Path>) -> CalibrationStatus {
    let path = path.as_ref();

    let text = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) => {
            debug!("No calibration at {:?}: {}", path, e);
            return CalibrationStatus::Missing;
        }
    };

    let doc: CalibrationDocument = match serde_json::from_str(&text) {
        Ok(doc) => doc,
        Err(e) => {
            warn!("Ignoring unreadable calibration file {:?}: {}", path, e);
            return CalibrationStatus::Missing;
        }
    };

    match (doc.camera_matrix, doc.dist_coeffs) {
        (Some(camera_matrix), Some(dist_coeffs)) if !dist_coeffs.is_empty() => {
            info!(
                "Calibration loaded from {:?}{}",
                path,
                doc.calibrated_at
                    .map(|at| format!(" (calibrated {})", at))
                    .unwrap_or_default()
            );
            let mut intrinsics = CameraIntrinsics::new(camera_matrix, dist_coeffs);
            if let (Some(width), Some(height)) = (doc.image_width, doc.image_height) {
                intrinsics = intrinsics.with_image_size(Viewport::new(width, height));
            }
            CalibrationStatus::Calibrated(intrinsics)
        }
        _ => {
            warn!("Calibration file {:?} lacks cameraMatrix or distCoeffs", path);
            CalibrationStatus::Missing
        }
    }
}

/// Writes the calibration document, stamping the current time.
pub fn save_calibration(
    path: impl AsRef<Path>,
    intrinsics: &CameraIntrinsics,
    viewport: Viewport,
) -> Result<()> {
    let path = path.as_ref();
    let doc = CalibrationDocument {
        camera_matrix: Some(intrinsics.camera_matrix),
        dist_coeffs: Some(intrinsics.dist_coeffs.clone()),
        image_width: Some(viewport.width),
        image_height: Some(viewport.height),
        calibrated_at: Some(chrono::Local::now().to_rfc3339()),
    };

    let json = serde_json::to_string_pretty(&doc)
        .map_err(|e| ArError::Calibration(format!("serialise: {}", e)))?;

    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir)
            .map_err(|e| ArError::Calibration(format!("create {:?}: {}", dir, e)))?;
    }
    fs::write(path, json).map_err(|e| ArError::Calibration(format!("write {:?}: {}", path, e)))?;

    info!("Calibration saved to {:?}", path);
    Ok(())
}

/// Pinhole intrinsics guessed from image size and a horizontal field of view.
///
/// Stands in for a chessboard session when none is available: the principal
/// point is the image centre, pixels are square, distortion is zero.
#[derive(Debug, Clone, Copy)]
pub struct NominalCalibration {
    pub horizontal_fov_deg: f64,
}

impl NominalCalibration {
    pub fn new(horizontal_fov_deg: f64) -> Self {
        Self { horizontal_fov_deg }
    }

    pub fn intrinsics_for(&self, viewport: Viewport) -> Result<CameraIntrinsics> {
        let fov = self.horizontal_fov_deg;
        if !(fov > 0.0 && fov < 180.0) {
            return Err(ArError::Calibration(format!(
                "horizontal field of view must be in (0, 180) degrees, got {}",
                fov
            )));
        }

        let w = viewport.width as f64;
        let h = viewport.height as f64;
        let f = (w / 2.0) / (fov.to_radians() / 2.0).tan();
        let intrinsics = CameraIntrinsics::pinhole(f, f, w / 2.0, h / 2.0);
        intrinsics.validate(viewport)?;
        Ok(intrinsics)
    }
}

impl Default for NominalCalibration {
    fn default() -> Self {
        Self::new(60.0)
    }
}

impl CalibrationProcedure for NominalCalibration {
    fn calibrate(&mut self, frames: &mut dyn FrameSource) -> Result<(CameraIntrinsics, Viewport)> {
        let frame = frames
            .next_frame()
            .ok_or_else(|| ArError::Calibration("frame source produced no frame".into()))?;
        let viewport = frame.viewport();

        info!(
            "Nominal calibration from a {}x{} frame at {:.1} deg horizontal FOV",
            viewport.width, viewport.height, self.horizontal_fov_deg
        );
        Ok((self.intrinsics_for(viewport)?, viewport))
    }
}

/// Stored intrinsics if usable, otherwise the result of running `procedure`
/// on `frames`, which is then saved to `path`. `force` skips the stored file.
pub fn ensure_calibration(
    path: impl AsRef<Path>,
    force: bool,
    procedure: &mut dyn CalibrationProcedure,
    frames: &mut dyn FrameSource,
) -> Result<CameraIntrinsics> {
    let path = path.as_ref();
    if force {
        info!("Recalibration requested, ignoring {:?}", path);
    } else if let CalibrationStatus::Calibrated(intrinsics) = load_calibration(path) {
        return Ok(intrinsics);
    } else {
        warn!("Camera not calibrated, running calibration");
    }

    let (intrinsics, viewport) = procedure.calibrate(frames)?;
    save_calibration(path, &intrinsics, viewport)?;
    Ok(intrinsics.with_image_size(viewport))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accessors_read_camera_matrix() {
        let k = CameraIntrinsics::pinhole(500.0, 510.0, 320.0, 240.0);
        assert_eq!((k.fx(), k.fy(), k.cx(), k.cy()), (500.0, 510.0, 320.0, 240.0));
    }

    #[test]
    fn validate_rejects_degenerate_values() {
        let vp = Viewport::new(640, 480);
        assert!(CameraIntrinsics::pinhole(500.0, 500.0, 320.0, 240.0).validate(vp).is_ok());
        assert!(CameraIntrinsics::pinhole(0.0, 500.0, 320.0, 240.0).validate(vp).is_err());
        assert!(CameraIntrinsics::pinhole(500.0, -1.0, 320.0, 240.0).validate(vp).is_err());
        assert!(CameraIntrinsics::pinhole(500.0, 500.0, 320.0, 240.0)
            .validate(Viewport::new(0, 480))
            .is_err());
    }

    #[test]
    fn nominal_calibration_centres_principal_point() {
        let k = NominalCalibration::new(90.0)
            .intrinsics_for(Viewport::new(640, 480))
            .unwrap();
        assert!((k.fx() - 320.0).abs() < 1e-9);
        assert_eq!(k.fx(), k.fy());
        assert_eq!((k.cx(), k.cy()), (320.0, 240.0));
        assert!(k.dist_coeffs.iter().all(|c| *c == 0.0));
    }

    #[test]
    fn frame_size_check_uses_recorded_size() {
        let k = CameraIntrinsics::pinhole(500.0, 500.0, 320.0, 240.0);
        assert!(k.matches_frame_size(Viewport::new(1280, 720)));

        let k = k.with_image_size(Viewport::new(640, 480));
        assert!(k.matches_frame_size(Viewport::new(640, 480)));
        assert!(!k.matches_frame_size(Viewport::new(1280, 720)));
    }

    #[test]
    fn nominal_calibration_rejects_bad_fov() {
        assert!(NominalCalibration::new(0.0)
            .intrinsics_for(Viewport::new(640, 480))
            .is_err());
        assert!(NominalCalibration::new(180.0)
            .intrinsics_for(Viewport::new(640, 480))
            .is_err());
    }
}
