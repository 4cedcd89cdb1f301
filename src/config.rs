use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::animation::AnimationConfig;
use crate::render::{FrameSizePolicy, LightingConfig};
use crate::transform::{ClipPlanes, ModelAdjustment};

/// Everything the application reads at startup. Every field has a default,
/// so `{}` is a complete configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub window: WindowConfig,
    pub calibration: CalibrationConfig,
    pub capture: CaptureConfig,
    pub tracking: TrackingConfig,
    pub render: RenderConfig,
    pub animation: AnimationConfig,
    pub gesture: GestureConfig,
    pub asset: AssetConfig,
    /// Status overlay with FPS, marker and animation state
    pub hud: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            window: WindowConfig::default(),
            calibration: CalibrationConfig::default(),
            capture: CaptureConfig::default(),
            tracking: TrackingConfig::default(),
            render: RenderConfig::default(),
            animation: AnimationConfig::default(),
            gesture: GestureConfig::default(),
            asset: AssetConfig::default(),
            hud: true,
        }
    }
}

impl AppConfig {
    /// Reads a JSON configuration file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        Self::from_json(&text).with_context(|| format!("Invalid config file: {:?}", path))
    }

    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    /// The window itself is sized to the first frame
    pub title: String,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            title: "AR Overlay".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CalibrationConfig {
    pub path: PathBuf,
    /// Field of view assumed when calibrating without a chessboard
    pub fallback_horizontal_fov_deg: f64,
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("calibration_data.json"),
            fallback_horizontal_fov_deg: 60.0,
        }
    }
}

/// Where frames come from
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CaptureSource {
    /// Generated backdrop, no hardware needed
    #[default]
    Synthetic,
    /// A still image or a directory of them, played in name order
    Images { path: PathBuf },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    pub source: CaptureSource,
    /// Synthetic frame size
    pub width: u32,
    pub height: u32,
    /// Restart the image sequence after the last file
    pub loop_images: bool,
    /// Capture on a background thread, handing over only the newest frame
    pub threaded: bool,
    /// Pacing of the capture thread
    pub capture_fps: f32,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            source: CaptureSource::Synthetic,
            width: 640,
            height: 480,
            loop_images: true,
            threaded: false,
            capture_fps: 30.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackingConfig {
    /// JSON pose track replayed frame by frame; a sweeping synthetic marker
    /// is used when unset
    pub pose_script: Option<PathBuf>,
    /// Distance of the synthetic marker from the camera, meters
    pub sweep_distance: f64,
    /// Peak tilt of the synthetic marker, degrees
    pub sweep_amplitude_deg: f64,
    /// Frames per full sweep period
    pub sweep_period_frames: u32,
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            pose_script: None,
            sweep_distance: 0.5,
            sweep_amplitude_deg: 30.0,
            sweep_period_frames: 240,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    pub clip: ClipPlanes,
    pub frame_size_policy: FrameSizePolicy,
    pub clear_color: [f64; 3],
    pub model: ModelAdjustment,
    pub lighting: LightingConfig,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            clip: ClipPlanes::default(),
            frame_size_policy: FrameSizePolicy::default(),
            clear_color: [0.1, 0.1, 0.1],
            model: ModelAdjustment::default(),
            lighting: LightingConfig::default(),
        }
    }
}

/// Which detector turns frames into animation triggers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum GestureConfig {
    /// Space bar
    Keyboard,
    /// Closed fist: largest skin region with at most `max_deep_defects`
    /// concavities between fingers
    Fist {
        #[serde(default = "default_min_hand_area")]
        min_area: f64,
        #[serde(default = "default_defect_depth")]
        defect_depth: f64,
        #[serde(default = "default_max_deep_defects")]
        max_deep_defects: usize,
    },
    /// Fires when the share of skin-coloured pixels falls in the band
    SkinArea {
        #[serde(default = "default_min_fraction")]
        min_fraction: f32,
        #[serde(default = "default_max_fraction")]
        max_fraction: f32,
    },
}

fn default_min_hand_area() -> f64 {
    8000.0
}

fn default_defect_depth() -> f64 {
    20.0
}

fn default_max_deep_defects() -> usize {
    1
}

fn default_min_fraction() -> f32 {
    0.15
}

fn default_max_fraction() -> f32 {
    0.6
}

impl Default for GestureConfig {
    fn default() -> Self {
        Self::Keyboard
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssetConfig {
    /// glTF model; the built-in cube is drawn when unset
    pub path: Option<PathBuf>,
    /// Cube colour
    pub fallback_color: [f32; 3],
}

impl Default for AssetConfig {
    fn default() -> Self {
        Self {
            path: None,
            fallback_color: [0.2, 0.6, 1.0],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_is_the_default() {
        let config = AppConfig::from_json("{}").unwrap();
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.calibration.path, PathBuf::from("calibration_data.json"));
        assert_eq!(config.render.clear_color, [0.1, 0.1, 0.1]);
        assert!(config.hud);
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let config = AppConfig::from_json(
            r#"{
                "render": {"clip": {"near": 0.01, "far": 10.0}, "frame_size_policy": "reject"},
                "animation": {"duration_secs": 2.0}
            }"#,
        )
        .unwrap();

        assert_eq!(config.render.clip, ClipPlanes::new(0.01, 10.0));
        assert_eq!(config.render.frame_size_policy, FrameSizePolicy::Reject);
        assert_eq!(config.render.model, ModelAdjustment::default());
        assert_eq!(config.animation.duration_secs, 2.0);
        assert_eq!(config.animation.peak_height, 0.05);
    }

    #[test]
    fn tagged_sources_and_gestures() {
        let config = AppConfig::from_json(
            r#"{
                "capture": {"source": {"kind": "images", "path": "frames"}},
                "gesture": {"kind": "skin_area", "min_fraction": 0.3}
            }"#,
        )
        .unwrap();

        assert_eq!(
            config.capture.source,
            CaptureSource::Images {
                path: PathBuf::from("frames")
            }
        );
        assert_eq!(
            config.gesture,
            GestureConfig::SkinArea {
                min_fraction: 0.3,
                max_fraction: 0.6
            }
        );
    }

    #[test]
    fn window_section_only_carries_a_title() {
        let config = AppConfig::from_json(r#"{"window": {"title": "Demo"}}"#).unwrap();
        assert_eq!(config.window.title, "Demo");
        let json = serde_json::to_value(&config.window).unwrap();
        assert_eq!(json, serde_json::json!({"title": "Demo"}));
    }

    #[test]
    fn fist_gesture_defaults() {
        let config = AppConfig::from_json(r#"{"gesture": {"kind": "fist"}}"#).unwrap();
        assert_eq!(
            config.gesture,
            GestureConfig::Fist {
                min_area: 8000.0,
                defect_depth: 20.0,
                max_deep_defects: 1
            }
        );
    }

    #[test]
    fn missing_file_names_the_path() {
        let err = AppConfig::load("no/such/config.json").unwrap_err();
        assert!(format!("{:#}", err).contains("no/such/config.json"));
    }

    #[test]
    fn unknown_policy_is_rejected() {
        assert!(AppConfig::from_json(r#"{"render": {"frame_size_policy": "stretch"}}"#).is_err());
    }
}
