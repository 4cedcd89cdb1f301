use glam::DVec3;

/// Rigid transform of a marker relative to the camera, in the vision
/// convention (X right, Y down, Z forward).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pose {
    /// Axis-angle rotation vector; its length is the angle in radians
    pub rotation: DVec3,
    /// Translation in meters
    pub translation: DVec3,
}

impl Pose {
    pub fn new(rotation: DVec3, translation: DVec3) -> Self {
        Self {
            rotation,
            translation,
        }
    }

    pub fn from_arrays(rvec: [f64; 3], tvec: [f64; 3]) -> Self {
        Self::new(DVec3::from_array(rvec), DVec3::from_array(tvec))
    }

    /// Identity rotation, zero translation
    pub fn identity() -> Self {
        Self::new(DVec3::ZERO, DVec3::ZERO)
    }

    /// True when the marker origin lies strictly in front of the camera
    pub fn is_in_front(&self) -> bool {
        self.translation.z > 0.0
    }
}

/// One detected marker together with the pose solved for it
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MarkerPose {
    pub id: i32,
    pub pose: Pose,
}

/// Only the first marker drives rendering; the rest are ignored.
pub fn select_pose(markers: &[MarkerPose]) -> Option<Pose> {
    markers.first().map(|m| m.pose)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_pose_is_not_in_front() {
        assert!(!Pose::identity().is_in_front());
    }

    #[test]
    fn in_front_checks_z_only() {
        assert!(Pose::from_arrays([0.0; 3], [10.0, -3.0, 0.01]).is_in_front());
        assert!(!Pose::from_arrays([0.0; 3], [0.0, 0.0, -0.5]).is_in_front());
    }

    #[test]
    fn select_pose_takes_first_marker() {
        let markers = [
            MarkerPose {
                id: 7,
                pose: Pose::from_arrays([0.1, 0.0, 0.0], [0.0, 0.0, 0.5]),
            },
            MarkerPose {
                id: 3,
                pose: Pose::from_arrays([0.0; 3], [0.0, 0.0, 2.0]),
            },
        ];
        let pose = select_pose(&markers).unwrap();
        assert_eq!(pose.translation.z, 0.5);
        assert!(select_pose(&[]).is_none());
    }
}
