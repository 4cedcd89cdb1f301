use std::f64::consts::{PI, TAU};
use std::fs;
use std::path::Path;

use glam::{DQuat, DVec3};
use log::info;
use serde::Deserialize;

use crate::calibration::CameraIntrinsics;
use crate::error::{ArError, Result};
use crate::frame::VideoFrame;
use crate::pose::{MarkerPose, Pose};
use crate::traits::PoseEstimator;

#[derive(Debug, Deserialize)]
struct MarkerEntry {
    #[serde(default)]
    id: i32,
    rvec: [f64; 3],
    tvec: [f64; 3],
}

impl From<MarkerEntry> for MarkerPose {
    fn from(entry: MarkerEntry) -> Self {
        MarkerPose {
            id: entry.id,
            pose: Pose::from_arrays(entry.rvec, entry.tvec),
        }
    }
}

/// One frame of a pose track: a marker, several markers, or `null` for none
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum TrackEntry {
    One(MarkerEntry),
    Many(Vec<MarkerEntry>),
}

/// Replays a recorded pose track, one entry per frame, wrapping around at
/// the end. The frame content is ignored.
///
/// ```json
/// [
///   {"rvec": [3.14, 0, 0], "tvec": [0, 0, 0.5]},
///   null,
///   [{"id": 7, "rvec": [0, 0, 0], "tvec": [0.1, 0, 0.4]}, {"id": 3, "rvec": [0, 0, 0], "tvec": [0, 0, 1]}]
/// ]
/// ```
#[derive(Debug, Clone)]
pub struct ScriptedPoseEstimator {
    track: Vec<Vec<MarkerPose>>,
    cursor: usize,
}

impl ScriptedPoseEstimator {
    pub fn new(track: Vec<Vec<MarkerPose>>) -> Self {
        Self { track, cursor: 0 }
    }

    pub fn from_json(text: &str) -> Result<Self> {
        let entries: Vec<Option<TrackEntry>> = serde_json::from_str(text)
            .map_err(|e| ArError::Capture(format!("invalid pose track: {}", e)))?;

        let track = entries
            .into_iter()
            .map(|entry| match entry {
                None => Vec::new(),
                Some(TrackEntry::One(marker)) => vec![marker.into()],
                Some(TrackEntry::Many(markers)) => markers.into_iter().map(Into::into).collect(),
            })
            .collect();
        Ok(Self::new(track))
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)
            .map_err(|e| ArError::Capture(format!("cannot read pose track {:?}: {}", path, e)))?;
        let estimator = Self::from_json(&text)?;
        info!("Pose track {:?}: {} frames", path, estimator.len());
        Ok(estimator)
    }

    pub fn len(&self) -> usize {
        self.track.len()
    }

    pub fn is_empty(&self) -> bool {
        self.track.is_empty()
    }
}

impl PoseEstimator for ScriptedPoseEstimator {
    fn estimate(&mut self, _frame: &VideoFrame, _intrinsics: &CameraIntrinsics) -> Vec<MarkerPose> {
        if self.track.is_empty() {
            return Vec::new();
        }
        let markers = self.track[self.cursor % self.track.len()].clone();
        self.cursor = (self.cursor + 1) % self.track.len();
        markers
    }
}

/// Synthetic marker held in front of the camera, facing it and rocking
/// slowly about both image axes
#[derive(Debug, Clone)]
pub struct SweepPoseEstimator {
    distance: f64,
    amplitude: f64,
    period_frames: u32,
    frame_index: u64,
}

impl SweepPoseEstimator {
    pub fn new(distance: f64, amplitude_deg: f64, period_frames: u32) -> Self {
        Self {
            distance,
            amplitude: amplitude_deg.to_radians(),
            period_frames: period_frames.max(1),
            frame_index: 0,
        }
    }

    /// Pose at a given frame of the sweep
    pub fn pose_at(&self, frame_index: u64) -> Pose {
        let phase = TAU * (frame_index % self.period_frames as u64) as f64 / self.period_frames as f64;

        // Half-turn about X makes the marker face the camera with its +Y up
        // in the image
        let rotation = DQuat::from_rotation_x(PI)
            * DQuat::from_rotation_y(self.amplitude * phase.sin())
            * DQuat::from_rotation_x(0.5 * self.amplitude * phase.cos());
        let (axis, angle) = rotation.to_axis_angle();

        Pose::new(axis * angle, DVec3::new(0.0, 0.0, self.distance))
    }
}

impl Default for SweepPoseEstimator {
    fn default() -> Self {
        Self::new(0.5, 30.0, 240)
    }
}

impl PoseEstimator for SweepPoseEstimator {
    fn estimate(&mut self, _frame: &VideoFrame, _intrinsics: &CameraIntrinsics) -> Vec<MarkerPose> {
        let pose = self.pose_at(self.frame_index);
        self.frame_index += 1;
        vec![MarkerPose { id: 0, pose }]
    }
}
