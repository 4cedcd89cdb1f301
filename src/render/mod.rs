//! Composites the camera frame and the marker-anchored object.
//!
//! [`ArRenderer`] owns every GPU resource and moves through
//! `Uninitialized -> Ready -> ShutDown`. The per-frame decisions it makes
//! live in [`FramePlanner`] so they can be exercised without a device.

pub mod background;
pub mod hud;
pub mod object;
pub mod plan;
mod shader;

use std::sync::Arc;
use std::time::Instant;

use glam::Vec3;
use log::{debug, info, warn};
use winit::window::Window;

pub use background::{BackgroundPass, FrameSizePolicy};
pub use hud::{Hud, HudStatus};
pub use object::{DepthTarget, ObjectPass};
pub use plan::{FramePlanner, LightingConfig, ObjectDecision, ObjectDraw, ObjectUniform};

use crate::animation::{AnimationState, AnimationTrigger};
use crate::calibration::CameraIntrinsics;
use crate::config::RenderConfig;
use crate::core::GpuContext;
use crate::error::{ArError, Result};
use crate::frame::VideoFrame;
use crate::mesh::RenderableMesh;
use crate::pose::Pose;
use crate::transform::Viewport;

/// Lifecycle of the renderer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RendererState {
    Uninitialized,
    Ready,
    ShutDown,
}

/// Outcome of one `render_frame` call
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameReport {
    pub decision: ObjectDecision,
    /// The background texture was recreated for a new frame size
    pub background_resized: bool,
    pub animation_offset: Vec3,
}

/// Recorded but not yet submitted frame
struct PendingFrame {
    encoder: wgpu::CommandEncoder,
    surface_texture: wgpu::SurfaceTexture,
}

pub struct ArRenderer {
    config: RenderConfig,
    planner: FramePlanner,
    animation: AnimationTrigger,
    hud_enabled: bool,
    state: RendererState,
    close_requested: bool,
    status: HudStatus,

    // Acquired by `initialize` top to bottom, released bottom to top
    window: Option<Arc<Window>>,
    gpu: Option<GpuContext>,
    depth: Option<DepthTarget>,
    background: Option<BackgroundPass>,
    object: Option<ObjectPass>,
    hud: Option<Hud>,
    pending: Option<PendingFrame>,
}

impl ArRenderer {
    /// Renderer without GPU resources; call [`initialize`](Self::initialize)
    /// once a window exists.
    pub fn new(config: &RenderConfig) -> Self {
        Self {
            config: config.clone(),
            planner: FramePlanner::from_config(config),
            animation: AnimationTrigger::from_config(&Default::default()),
            hud_enabled: false,
            state: RendererState::Uninitialized,
            close_requested: false,
            status: HudStatus::default(),
            window: None,
            gpu: None,
            depth: None,
            background: None,
            object: None,
            hud: None,
            pending: None,
        }
    }

    pub fn with_animation(mut self, animation: AnimationTrigger) -> Self {
        self.animation = animation;
        self
    }

    pub fn with_hud(mut self, enabled: bool) -> Self {
        self.hud_enabled = enabled;
        self
    }

    pub fn state(&self) -> RendererState {
        self.state
    }

    pub fn planner(&self) -> &FramePlanner {
        &self.planner
    }

    pub fn animation_state(&self) -> AnimationState {
        self.animation.state()
    }

    /// Acquires the GPU context, depth target, background pass, object pass
    /// and HUD, in that order. On failure everything acquired so far is
    /// released and the renderer stays uninitialised.
    pub fn initialize(&mut self, window: Arc<Window>, viewport: Viewport) -> Result<()> {
        match self.state {
            RendererState::Ready => {
                warn!("Renderer already initialised");
                return Ok(());
            }
            RendererState::ShutDown => {
                return Err(ArError::GpuInit("renderer was shut down".into()));
            }
            RendererState::Uninitialized => {}
        }

        if let Err(e) = self.acquire(window, viewport) {
            self.release();
            return Err(e);
        }

        self.state = RendererState::Ready;
        info!(
            "Renderer initialised on {} for {}x{} frames",
            self.gpu.as_ref().map(|g| g.adapter_name()).unwrap_or_default(),
            viewport.width,
            viewport.height
        );
        Ok(())
    }

    fn acquire(&mut self, window: Arc<Window>, viewport: Viewport) -> Result<()> {
        self.config.clip.validate()?;

        let size = window.inner_size();
        let gpu = pollster::block_on(GpuContext::new(window.clone(), size.width, size.height))?;
        self.window = Some(window);
        let gpu = self.gpu.insert(gpu);

        let (width, height) = gpu.size();
        self.depth = Some(DepthTarget::new(gpu.device(), width, height));
        self.background = Some(BackgroundPass::new(gpu.device(), gpu.surface_format(), viewport)?);
        self.object = Some(ObjectPass::new(gpu.device(), gpu.surface_format())?);

        if self.hud_enabled {
            if let Some(window) = &self.window {
                self.hud = Some(Hud::new(window, gpu.device(), gpu.surface_format()));
            }
        }
        Ok(())
    }

    /// Uploads a mesh, replacing the current one
    pub fn load_asset(&mut self, mesh: &RenderableMesh) -> Result<()> {
        let (Some(gpu), Some(object)) = (&self.gpu, &mut self.object) else {
            return Err(ArError::NotInitialized);
        };
        object.load_mesh(gpu.device(), mesh)?;
        info!(
            "Asset uploaded: {} vertices, {} triangles",
            mesh.vertex_count(),
            mesh.vertex_count() / 3
        );
        Ok(())
    }

    pub fn has_asset(&self) -> bool {
        self.object.as_ref().is_some_and(|o| o.has_mesh())
    }

    /// Records one frame: background, then the object if the pose allows.
    /// Nothing reaches the screen until [`present`](Self::present).
    pub fn render_frame(
        &mut self,
        frame: &VideoFrame,
        pose: Option<&Pose>,
        intrinsics: &CameraIntrinsics,
    ) -> Result<FrameReport> {
        if self.state != RendererState::Ready {
            return Err(ArError::NotInitialized);
        }
        if self.pending.take().is_some() {
            debug!("Discarding a frame that was never presented");
        }

        let (Some(window), Some(gpu), Some(depth), Some(background), Some(object)) = (
            &self.window,
            &mut self.gpu,
            &self.depth,
            &mut self.background,
            &self.object,
        ) else {
            return Err(ArError::NotInitialized);
        };

        let background_resized = background.upload(
            gpu.device(),
            gpu.queue(),
            frame,
            self.config.frame_size_policy,
        )?;

        let animation_offset = self.animation.current_offset(Instant::now());
        let decision = self.planner.plan(
            pose,
            intrinsics,
            frame.viewport(),
            object.has_mesh(),
            animation_offset,
        )?;

        if let (ObjectDecision::Draw(draw), Some(material)) = (&decision, object.material()) {
            object.update(gpu.queue(), &draw.uniform(&material, self.planner.lighting()));
        }

        let surface_texture = gpu.acquire()?;
        let view = surface_texture
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        let mut encoder = gpu
            .device()
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("AR Frame Encoder"),
            });

        let [r, g, b] = self.config.clear_color;
        {
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("AR Frame Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color { r, g, b, a: 1.0 }),
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: depth.view(),
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Discard,
                    }),
                    stencil_ops: None,
                }),
                timestamp_writes: None,
                occlusion_query_set: None,
            });

            background.draw(&mut render_pass);
            if decision.is_draw() {
                object.draw(&mut render_pass);
            }
        }

        self.status.record(
            &decision,
            matches!(self.animation.state(), AnimationState::Active { .. }),
            (frame.width(), frame.height()),
        );

        if let Some(hud) = &mut self.hud {
            let (width, height) = gpu.size();
            hud.draw(
                window,
                gpu.device(),
                gpu.queue(),
                &mut encoder,
                &view,
                [width, height],
                &self.status,
            );
        }

        self.pending = Some(PendingFrame {
            encoder,
            surface_texture,
        });

        Ok(FrameReport {
            decision,
            background_resized,
            animation_offset,
        })
    }

    /// Submits and shows the last recorded frame; no-op if none
    pub fn present(&mut self) {
        let Some(pending) = self.pending.take() else {
            return;
        };
        let Some(gpu) = &self.gpu else {
            return;
        };
        gpu.queue().submit(std::iter::once(pending.encoder.finish()));
        if let Some(window) = &self.window {
            window.pre_present_notify();
        }
        pending.surface_texture.present();
    }

    pub fn should_close(&self) -> bool {
        self.close_requested
    }

    pub fn request_close(&mut self) {
        self.close_requested = true;
    }

    /// Window resize: surface and depth follow, the background keeps the
    /// frame's size
    pub fn resize(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            return;
        }
        if let Some(gpu) = &mut self.gpu {
            gpu.resize(width, height);
            self.depth = Some(DepthTarget::new(gpu.device(), width, height));
        }
    }

    pub fn trigger_animation(&mut self) {
        self.animation.trigger();
    }

    /// FPS shown in the HUD
    pub fn set_fps(&mut self, fps: f32) {
        self.status.fps = fps;
    }

    /// Forwards window events to the HUD; true when it consumed the event
    pub fn handle_event(&mut self, event: &winit::event::WindowEvent) -> bool {
        match (&mut self.hud, &self.window) {
            (Some(hud), Some(window)) => hud.handle_event(window, event),
            _ => false,
        }
    }

    /// Releases every GPU resource. Safe to call more than once.
    pub fn shutdown(&mut self) {
        if self.state == RendererState::ShutDown {
            return;
        }
        let was_ready = self.state == RendererState::Ready;
        self.release();
        self.state = RendererState::ShutDown;
        if was_ready {
            info!("Renderer shut down");
        }
    }

    fn release(&mut self) {
        self.pending = None;
        self.hud = None;
        if let Some(object) = &mut self.object {
            object.release_mesh();
        }
        self.object = None;
        self.background = None;
        self.depth = None;
        self.gpu = None;
        self.window = None;
    }
}

impl Drop for ArRenderer {
    fn drop(&mut self) {
        self.shutdown();
    }
}
