use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use log::{debug, error, info, trace, warn};
use winit::{
    application::ApplicationHandler,
    event::*,
    event_loop::ActiveEventLoop,
    keyboard::{KeyCode, PhysicalKey},
    window::{Window, WindowId},
};

use crate::animation::{AnimationConfig, AnimationTrigger};
use crate::calibration::{ensure_calibration, CameraIntrinsics, NominalCalibration};
use crate::cli::Cli;
use crate::config::{AppConfig, CaptureConfig, CaptureSource, GestureConfig, TrackingConfig};
use crate::core::FrameClock;
use crate::frame::VideoFrame;
use crate::loaders::load_gltf_mesh;
use crate::mesh::{Material, RenderableMesh};
use crate::pose::select_pose;
use crate::render::ArRenderer;
use crate::sources::{
    FistGestureDetector, ImageFrameSource, KeyTrigger, KeyTriggerHandle, ScriptedPoseEstimator,
    SkinAreaGestureDetector, SweepPoseEstimator, SyntheticFrameSource, ThreadedFrameSource,
};
use crate::traits::{FrameSource, GestureDetector, PoseEstimator};
use crate::transform::Viewport;

const FPS_UPDATE_INTERVAL: f32 = 1.0;

/// Whether a detected gesture starts the animation
pub fn gesture_fires(config: &AnimationConfig, detected: bool, marker_visible: bool) -> bool {
    config.enabled && detected && (marker_visible || !config.require_marker)
}

/// Capture, tracking and rendering wired into a winit application
pub struct App {
    config: AppConfig,
    frames: Box<dyn FrameSource>,
    estimator: Box<dyn PoseEstimator>,
    gesture: Box<dyn GestureDetector>,
    key_trigger: Option<KeyTriggerHandle>,
    intrinsics: CameraIntrinsics,
    /// Frame read at startup to size the window, shown first
    first_frame: Option<VideoFrame>,
    viewport: Viewport,
    window: Option<Arc<Window>>,
    renderer: ArRenderer,
    clock: FrameClock,
    marker_visible: bool,
    frames_rendered: u64,
    fatal: Option<anyhow::Error>,
}

impl App {
    /// Startup up to the point where a window is needed: configuration,
    /// frame source, calibration, first frame and collaborators
    pub fn new(cli: &Cli) -> Result<Self> {
        let config = cli.resolve_config()?;

        let mut frames = build_frame_source(&config.capture)?;
        info!("Frame source: {}", frames.name());

        let mut procedure = NominalCalibration::new(config.calibration.fallback_horizontal_fov_deg);
        let intrinsics = ensure_calibration(
            &config.calibration.path,
            cli.recalibrate,
            &mut procedure,
            frames.as_mut(),
        )
        .context("Calibration failed")?;

        let first_frame = frames
            .next_frame()
            .context("Frame source produced no frames")?;
        let viewport = first_frame.viewport();
        intrinsics.validate(viewport)?;
        if !intrinsics.matches_frame_size(viewport) {
            if let Some(size) = intrinsics.image_size {
                warn!(
                    "Calibration was made at {}x{} but frames are {}x{}; overlay placement will be off",
                    size.width, size.height, viewport.width, viewport.height
                );
            }
        }
        info!(
            "Intrinsics fx={:.1} fy={:.1} cx={:.1} cy={:.1} for {}x{} frames",
            intrinsics.fx(),
            intrinsics.fy(),
            intrinsics.cx(),
            intrinsics.cy(),
            viewport.width,
            viewport.height
        );

        let estimator = build_pose_estimator(&config.tracking)?;
        let (gesture, key_trigger) = build_gesture_detector(&config.gesture);

        let renderer = ArRenderer::new(&config.render)
            .with_animation(AnimationTrigger::from_config(&config.animation))
            .with_hud(config.hud);

        Ok(Self {
            config,
            frames,
            estimator,
            gesture,
            key_trigger,
            intrinsics,
            first_frame: Some(first_frame),
            viewport,
            window: None,
            renderer,
            clock: FrameClock::new(FPS_UPDATE_INTERVAL),
            marker_visible: false,
            frames_rendered: 0,
            fatal: None,
        })
    }

    /// Error that stopped the event loop, if any
    pub fn finish(mut self) -> Result<()> {
        self.renderer.shutdown();
        info!("{} frames rendered", self.frames_rendered);
        match self.fatal.take() {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    fn start(&mut self, event_loop: &ActiveEventLoop) -> Result<()> {
        let window = event_loop
            .create_window(
                Window::default_attributes()
                    .with_title(self.config.window.title.clone())
                    .with_inner_size(winit::dpi::PhysicalSize::new(
                        self.viewport.width,
                        self.viewport.height,
                    )),
            )
            .context("Failed to create window")?;
        let window = Arc::new(window);

        self.renderer
            .initialize(window.clone(), self.viewport)
            .context("Failed to initialise renderer")?;
        self.window = Some(window);

        let mesh = match &self.config.asset.path {
            Some(path) => load_gltf_mesh(path),
            None => Ok(RenderableMesh::unit_cube(Material {
                diffuse: self.config.asset.fallback_color,
            })),
        };
        match mesh {
            Ok(mesh) => {
                if let Err(e) = self.renderer.load_asset(&mesh) {
                    warn!("Asset rejected, drawing background only: {}", e);
                }
            }
            Err(e) => warn!("Asset failed to load, drawing background only: {:#}", e),
        }
        Ok(())
    }

    /// One loop iteration: frame, pose, gesture, render, present
    fn step(&mut self) {
        let (_, fps) = self.clock.tick();
        if let Some(fps) = fps {
            info!("FPS: {:.1}", fps);
            self.renderer.set_fps(fps);
        }

        let Some(frame) = self.first_frame.take().or_else(|| self.frames.next_frame()) else {
            info!("Frame stream ended");
            self.renderer.request_close();
            return;
        };

        let markers = self.estimator.estimate(&frame, &self.intrinsics);
        let pose = select_pose(&markers);
        if pose.is_some() != self.marker_visible {
            self.marker_visible = pose.is_some();
            debug!(
                "Marker {}",
                if self.marker_visible { "acquired" } else { "lost" }
            );
        }

        let detected = self.gesture.detect(&frame);
        if gesture_fires(&self.config.animation, detected, self.marker_visible) {
            debug!("Gesture detected, starting animation");
            self.renderer.trigger_animation();
        }

        match self
            .renderer
            .render_frame(&frame, pose.as_ref(), &self.intrinsics)
        {
            Ok(report) => {
                trace!("Frame {}: {}", self.frames_rendered, report.decision.label());
                self.renderer.present();
                self.frames_rendered += 1;
            }
            Err(e) => warn!("Frame skipped: {}", e),
        }
    }

    fn fail(&mut self, event_loop: &ActiveEventLoop, err: anyhow::Error) {
        error!("{:#}", err);
        self.fatal = Some(err);
        self.renderer.shutdown();
        event_loop.exit();
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_none() {
            if let Err(e) = self.start(event_loop) {
                self.fail(event_loop, e);
            }
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: WindowId,
        event: WindowEvent,
    ) {
        // Let the HUD handle the event first
        if self.renderer.handle_event(&event) {
            return;
        }

        match event {
            WindowEvent::CloseRequested
            | WindowEvent::KeyboardInput {
                event:
                    KeyEvent {
                        state: ElementState::Pressed,
                        physical_key: PhysicalKey::Code(KeyCode::Escape),
                        ..
                    },
                ..
            } => self.renderer.request_close(),
            WindowEvent::KeyboardInput {
                event:
                    KeyEvent {
                        state: ElementState::Pressed,
                        physical_key: PhysicalKey::Code(KeyCode::Space),
                        repeat: false,
                        ..
                    },
                ..
            } => {
                if let Some(key) = &self.key_trigger {
                    key.press();
                }
            }
            WindowEvent::Resized(size) => self.renderer.resize(size.width, size.height),
            WindowEvent::RedrawRequested => self.step(),
            _ => {}
        }

        if self.renderer.should_close() {
            self.renderer.shutdown();
            event_loop.exit();
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(window) = &self.window {
            window.request_redraw();
        }
    }
}

fn build_frame_source(capture: &CaptureConfig) -> Result<Box<dyn FrameSource>> {
    match &capture.source {
        CaptureSource::Synthetic => {
            let source = SyntheticFrameSource::new(capture.width, capture.height)?;
            maybe_threaded(source, capture)
        }
        CaptureSource::Images { path } => {
            let source = ImageFrameSource::open(path, capture.loop_images)?;
            maybe_threaded(source, capture)
        }
    }
}

fn maybe_threaded<S>(source: S, capture: &CaptureConfig) -> Result<Box<dyn FrameSource>>
where
    S: FrameSource + Send + 'static,
{
    if !capture.threaded {
        return Ok(Box::new(source));
    }
    let interval = Duration::from_secs_f32(1.0 / capture.capture_fps.max(1.0));
    Ok(Box::new(ThreadedFrameSource::spawn(source, interval)?))
}

fn build_pose_estimator(tracking: &TrackingConfig) -> Result<Box<dyn PoseEstimator>> {
    Ok(match &tracking.pose_script {
        Some(path) => Box::new(ScriptedPoseEstimator::load(path)?),
        None => Box::new(SweepPoseEstimator::new(
            tracking.sweep_distance,
            tracking.sweep_amplitude_deg,
            tracking.sweep_period_frames,
        )),
    })
}

fn build_gesture_detector(
    gesture: &GestureConfig,
) -> (Box<dyn GestureDetector>, Option<KeyTriggerHandle>) {
    match gesture {
        GestureConfig::Keyboard => {
            let trigger = KeyTrigger::new();
            let handle = trigger.handle();
            (Box::new(trigger), Some(handle))
        }
        GestureConfig::Fist {
            min_area,
            defect_depth,
            max_deep_defects,
        } => (
            Box::new(FistGestureDetector::new(
                *min_area,
                *defect_depth,
                *max_deep_defects,
            )),
            None,
        ),
        GestureConfig::SkinArea {
            min_fraction,
            max_fraction,
        } => (
            Box::new(SkinAreaGestureDetector::new(*min_fraction, *max_fraction)),
            None,
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gesture_needs_a_visible_marker_by_default() {
        let config = AnimationConfig::default();
        assert!(gesture_fires(&config, true, true));
        assert!(!gesture_fires(&config, true, false));
        assert!(!gesture_fires(&config, false, true));
    }

    #[test]
    fn marker_gating_can_be_lifted() {
        let config = AnimationConfig {
            require_marker: false,
            ..Default::default()
        };
        assert!(gesture_fires(&config, true, false));
    }

    #[test]
    fn disabled_animation_never_fires() {
        let config = AnimationConfig {
            enabled: false,
            ..Default::default()
        };
        assert!(!gesture_fires(&config, true, true));
    }

    #[test]
    fn keyboard_gesture_exposes_a_handle() {
        let (mut detector, handle) = build_gesture_detector(&GestureConfig::Keyboard);
        let frame = VideoFrame::solid(2, 2, [0, 0, 0, 255]).unwrap();
        handle.unwrap().press();
        assert!(detector.detect(&frame));
    }

    #[test]
    fn fist_gesture_has_no_key_handle() {
        let config = AppConfig::from_json(r#"{"gesture": {"kind": "fist"}}"#).unwrap();
        let (mut detector, handle) = build_gesture_detector(&config.gesture);
        assert!(handle.is_none());
        // Blue backdrop, no hand
        let frame = VideoFrame::solid(64, 64, [40, 90, 200, 255]).unwrap();
        assert!(!detector.detect(&frame));
    }

    #[test]
    fn synthetic_source_is_the_default() {
        let mut source = build_frame_source(&CaptureConfig::default()).unwrap();
        let frame = source.next_frame().unwrap();
        assert_eq!((frame.width(), frame.height()), (640, 480));
    }

    #[test]
    fn threaded_capture_wraps_the_source() {
        let capture = CaptureConfig {
            width: 16,
            height: 8,
            threaded: true,
            capture_fps: 200.0,
            ..Default::default()
        };
        let mut source = build_frame_source(&capture).unwrap();
        assert!(source.name().starts_with("threaded"));
        assert_eq!(source.next_frame().unwrap().width(), 16);
    }

    #[test]
    fn sweep_is_the_default_tracker() {
        let mut estimator = build_pose_estimator(&TrackingConfig::default()).unwrap();
        let frame = VideoFrame::solid(2, 2, [0, 0, 0, 255]).unwrap();
        let k = CameraIntrinsics::pinhole(2.0, 2.0, 1.0, 1.0);
        assert_eq!(estimator.estimate(&frame, &k).len(), 1);
    }
}
