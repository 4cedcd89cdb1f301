// cli.rs - Command-line interface configuration
use std::path::PathBuf;

use clap::Parser;

use crate::config::{AppConfig, CaptureSource};

#[derive(Parser, Debug, Clone, Default)]
#[command(name = "ar-overlay")]
#[command(about = "Marker-tracked 3D overlay on live video", long_about = None)]
pub struct Cli {
    /// JSON configuration file
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Camera calibration file
    #[arg(long)]
    pub calibration: Option<PathBuf>,

    /// glTF model drawn on the marker
    #[arg(long)]
    pub model: Option<PathBuf>,

    /// Image file or directory used instead of the synthetic feed
    #[arg(long)]
    pub images: Option<PathBuf>,

    /// JSON pose track replayed instead of the synthetic marker
    #[arg(long)]
    pub poses: Option<PathBuf>,

    /// Ignore any stored calibration and calibrate again
    #[arg(long, default_value = "false")]
    pub recalibrate: bool,

    /// Disable the status overlay
    #[arg(long = "no-ui", default_value = "false")]
    pub no_ui: bool,

    /// Capture frames on a background thread
    #[arg(long, default_value = "false")]
    pub threaded_capture: bool,
}

impl Cli {
    /// Configuration file (or defaults) with the flags given here on top
    pub fn resolve_config(&self) -> anyhow::Result<AppConfig> {
        let mut config = match &self.config {
            Some(path) => AppConfig::load(path)?,
            None => AppConfig::default(),
        };
        self.apply(&mut config);
        Ok(config)
    }

    /// Overrides config values with the flags that were given
    pub fn apply(&self, config: &mut AppConfig) {
        if let Some(path) = &self.calibration {
            config.calibration.path = path.clone();
        }
        if let Some(path) = &self.model {
            config.asset.path = Some(path.clone());
        }
        if let Some(path) = &self.images {
            config.capture.source = CaptureSource::Images { path: path.clone() };
        }
        if let Some(path) = &self.poses {
            config.tracking.pose_script = Some(path.clone());
        }
        if self.no_ui {
            config.hud = false;
        }
        if self.threaded_capture {
            config.capture.threaded = true;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_flags_keeps_config() {
        let cli = Cli::try_parse_from(["ar-overlay"]).unwrap();
        let config = cli.resolve_config().unwrap();
        assert_eq!(config, AppConfig::default());
        assert!(!cli.recalibrate);
    }

    #[test]
    fn flags_override_config() {
        let cli = Cli::try_parse_from([
            "ar-overlay",
            "--calibration",
            "cal/cam.json",
            "--model",
            "duck.gltf",
            "--images",
            "frames",
            "--poses",
            "track.json",
            "--no-ui",
            "--threaded-capture",
        ])
        .unwrap();

        let mut config = AppConfig::default();
        cli.apply(&mut config);

        assert_eq!(config.calibration.path, PathBuf::from("cal/cam.json"));
        assert_eq!(config.asset.path, Some(PathBuf::from("duck.gltf")));
        assert_eq!(
            config.capture.source,
            CaptureSource::Images {
                path: PathBuf::from("frames")
            }
        );
        assert_eq!(config.tracking.pose_script, Some(PathBuf::from("track.json")));
        assert!(!config.hud);
        assert!(config.capture.threaded);
    }

    #[test]
    fn missing_config_file_is_an_error() {
        let cli = Cli::try_parse_from(["ar-overlay", "--config", "nowhere.json"]).unwrap();
        assert!(cli.resolve_config().is_err());
    }
}
