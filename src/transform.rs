//! Pose-to-render coordinate conversion.
//!
//! Vision side: right-handed, X right, Y down, Z forward (the pose solver's
//! camera frame). Graphics side: right-handed view space looking down -Z with
//! +Y up, column-major matrices, wgpu clip space with NDC depth in [0, 1]
//! (`z = -near` lands on 0, `z = -far` on 1).

use glam::{DMat3, DMat4, DVec3, DVec4, Mat4, Vec3};
use serde::{Deserialize, Serialize};

use crate::calibration::CameraIntrinsics;
use crate::error::{ArError, Result};
use crate::pose::Pose;

/// Flips Y and Z to move between the vision and graphics camera frames.
/// It is its own inverse.
pub const CV_TO_GL: DMat4 = DMat4::from_cols(
    DVec4::new(1.0, 0.0, 0.0, 0.0),
    DVec4::new(0.0, -1.0, 0.0, 0.0),
    DVec4::new(0.0, 0.0, -1.0, 0.0),
    DVec4::new(0.0, 0.0, 0.0, 1.0),
);

const SMALL_ANGLE: f64 = 1e-12;

/// Pixel size of the image the intrinsics refer to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Viewport {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClipPlanes {
    pub near: f32,
    pub far: f32,
}

impl ClipPlanes {
    pub fn new(near: f32, far: f32) -> Self {
        Self { near, far }
    }

    pub fn validate(&self) -> Result<()> {
        let ok = self.near.is_finite() && self.far.is_finite() && self.near > 0.0 && self.far > self.near;
        if ok {
            Ok(())
        } else {
            Err(ArError::InvalidClipPlanes {
                near: self.near,
                far: self.far,
            })
        }
    }
}

impl Default for ClipPlanes {
    fn default() -> Self {
        Self::new(0.1, 100.0)
    }
}

/// Exponential map from an axis-angle vector to a rotation matrix:
/// `R = I·cosθ + (1 - cosθ)·k·kᵀ + sinθ·[k]×`.
pub fn rodrigues(r: DVec3) -> DMat3 {
    let theta = r.length();
    if theta < SMALL_ANGLE {
        return DMat3::IDENTITY;
    }

    let k = r / theta;
    let (s, c) = theta.sin_cos();
    let v = 1.0 - c;

    // Columns of the rotation matrix
    DMat3::from_cols(
        DVec3::new(c + k.x * k.x * v, k.y * k.x * v + k.z * s, k.z * k.x * v - k.y * s),
        DVec3::new(k.x * k.y * v - k.z * s, c + k.y * k.y * v, k.z * k.y * v + k.x * s),
        DVec3::new(k.x * k.z * v + k.y * s, k.y * k.z * v - k.x * s, c + k.z * k.z * v),
    )
}

/// `[R | t]`: marker frame to vision camera frame.
pub fn pose_matrix(pose: &Pose) -> DMat4 {
    let r = rodrigues(pose.rotation);
    DMat4::from_cols(
        r.x_axis.extend(0.0),
        r.y_axis.extend(0.0),
        r.z_axis.extend(0.0),
        pose.translation.extend(1.0),
    )
}

/// Placement of the graphics camera in the marker (world) frame.
///
/// Built from the inverse rigid transform `[Rᵀ | -Rᵀt]` and post-multiplied
/// by [`CV_TO_GL`], so the camera's local -Z is the vision forward axis and
/// its local +Y is image-up.
pub fn camera_transform(pose: &Pose) -> DMat4 {
    let rt = rodrigues(pose.rotation).transpose();
    let position = -(rt * pose.translation);
    let placement = DMat4::from_cols(
        rt.x_axis.extend(0.0),
        rt.y_axis.extend(0.0),
        rt.z_axis.extend(0.0),
        position.extend(1.0),
    );
    placement * CV_TO_GL
}

/// World-to-view matrix: the inverse of [`camera_transform`], which works out
/// to `CV_TO_GL · [R | t]`.
pub fn view_matrix(pose: &Pose) -> DMat4 {
    camera_transform(pose).inverse()
}

/// Camera position in the marker frame
pub fn camera_position(pose: &Pose) -> DVec3 {
    camera_transform(pose).w_axis.truncate()
}

/// Pinhole intrinsics to clip space. Column-major layout:
///
/// ```text
/// col0 = ( 2fx/w,      0,          0,               0 )
/// col1 = ( 0,          2fy/h,      0,               0 )
/// col2 = ( 1 - 2cx/w,  2cy/h - 1,  far/(near-far), -1 )
/// col3 = ( 0,          0,          near·far/(near-far), 0 )
/// ```
///
/// A view-space point that the camera images at pixel `(u, v)` (v down)
/// lands at NDC `(2u/w - 1, 1 - 2v/h)`.
pub fn projection_matrix(
    intrinsics: &CameraIntrinsics,
    viewport: Viewport,
    clip: ClipPlanes,
) -> Result<DMat4> {
    intrinsics.validate(viewport)?;
    clip.validate()?;

    let w = viewport.width as f64;
    let h = viewport.height as f64;
    let near = clip.near as f64;
    let far = clip.far as f64;
    let depth = near - far;

    Ok(DMat4::from_cols(
        DVec4::new(2.0 * intrinsics.fx() / w, 0.0, 0.0, 0.0),
        DVec4::new(0.0, 2.0 * intrinsics.fy() / h, 0.0, 0.0),
        DVec4::new(
            1.0 - 2.0 * intrinsics.cx() / w,
            2.0 * intrinsics.cy() / h - 1.0,
            far / depth,
            -1.0,
        ),
        DVec4::new(0.0, 0.0, near * far / depth, 0.0),
    ))
}

/// `(view, projection)` as f32 matrices ready for upload.
pub fn view_projection(
    pose: &Pose,
    intrinsics: &CameraIntrinsics,
    viewport: Viewport,
    clip: ClipPlanes,
) -> Result<(Mat4, Mat4)> {
    let projection = projection_matrix(intrinsics, viewport, clip)?;
    Ok((view_matrix(pose).as_mat4(), projection.as_mat4()))
}

/// Fixed model-space correction between asset units and marker meters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelAdjustment {
    /// Uniform scale from asset units to meters
    pub scale: f32,
    /// Authored base rotation as XYZ Euler angles in degrees
    pub base_rotation_deg: [f32; 3],
}

impl ModelAdjustment {
    pub fn base_matrix(&self) -> Mat4 {
        let [x, y, z] = self.base_rotation_deg;
        let rotation = glam::Quat::from_euler(
            glam::EulerRot::XYZ,
            x.to_radians(),
            y.to_radians(),
            z.to_radians(),
        );
        Mat4::from_quat(rotation) * Mat4::from_scale(Vec3::splat(self.scale))
    }

    /// `T(offset) · R_base · S(scale)`
    pub fn model_matrix(&self, animation_offset: Vec3) -> Mat4 {
        Mat4::from_translation(animation_offset) * self.base_matrix()
    }
}

impl Default for ModelAdjustment {
    fn default() -> Self {
        Self {
            scale: 0.05,
            base_rotation_deg: [0.0, 0.0, 0.0],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::FRAC_PI_2;

    #[test]
    fn rodrigues_zero_is_identity() {
        assert_eq!(rodrigues(DVec3::ZERO), DMat3::IDENTITY);
        assert_eq!(rodrigues(DVec3::splat(1e-14)), DMat3::IDENTITY);
    }

    #[test]
    fn rodrigues_matches_axis_angle() {
        let r = DVec3::new(0.3, -0.7, 0.2);
        let expected = DMat3::from_axis_angle(r.normalize(), r.length());
        assert!(rodrigues(r).abs_diff_eq(expected, 1e-12));
    }

    #[test]
    fn rodrigues_is_orthonormal() {
        let m = rodrigues(DVec3::new(1.2, 0.4, -2.0));
        assert!((m * m.transpose()).abs_diff_eq(DMat3::IDENTITY, 1e-12));
        assert!((m.determinant() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn rotation_about_x_moves_y_forward() {
        let r = rodrigues(DVec3::new(FRAC_PI_2, 0.0, 0.0));
        assert!((r * DVec3::Y).abs_diff_eq(DVec3::Z, 1e-12));
    }

    #[test]
    fn basis_change_is_involution() {
        assert_eq!(CV_TO_GL * CV_TO_GL, DMat4::IDENTITY);
    }

    #[test]
    fn view_is_basis_change_times_pose() {
        let pose = Pose::from_arrays([0.2, -0.1, 0.4], [0.05, -0.02, 0.7]);
        let expected = CV_TO_GL * pose_matrix(&pose);
        assert!(view_matrix(&pose).abs_diff_eq(expected, 1e-12));
    }

    #[test]
    fn camera_sits_at_origin_of_vision_frame() {
        let pose = Pose::from_arrays([0.3, 0.2, -0.1], [0.1, 0.2, 0.9]);
        let cam_in_view = view_matrix(&pose).transform_point3(camera_position(&pose));
        assert!(cam_in_view.abs_diff_eq(DVec3::ZERO, 1e-12));
    }

    #[test]
    fn clip_planes_validation() {
        assert!(ClipPlanes::new(0.1, 100.0).validate().is_ok());
        assert!(ClipPlanes::new(0.0, 100.0).validate().is_err());
        assert!(ClipPlanes::new(1.0, 1.0).validate().is_err());
        assert!(ClipPlanes::new(0.1, f32::INFINITY).validate().is_err());
    }

    #[test]
    fn model_matrix_applies_offset_after_base() {
        let adjust = ModelAdjustment {
            scale: 2.0,
            base_rotation_deg: [90.0, 0.0, 0.0],
        };
        let m = adjust.model_matrix(Vec3::new(0.0, 0.05, 0.0));
        // Origin only sees the translation
        assert!(m.transform_point3(Vec3::ZERO).abs_diff_eq(Vec3::new(0.0, 0.05, 0.0), 1e-6));
        // +Y is scaled then rotated onto +Z
        let y = m.transform_vector3(Vec3::Y);
        assert!(y.abs_diff_eq(Vec3::new(0.0, 0.0, 2.0), 1e-5));
    }
}
