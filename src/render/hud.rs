use wgpu::{CommandEncoder, Device, Queue, TextureView};
use winit::window::Window;

use super::plan::ObjectDecision;

/// What the overlay shows
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HudStatus {
    pub fps: f32,
    pub marker: &'static str,
    /// The object was drawn this frame
    pub tracking: bool,
    pub animating: bool,
    pub frame_size: (u32, u32),
}

impl HudStatus {
    pub fn record(&mut self, decision: &ObjectDecision, animating: bool, frame_size: (u32, u32)) {
        self.marker = decision.label();
        self.tracking = decision.is_draw();
        self.animating = animating;
        self.frame_size = frame_size;
    }

    fn marker_color(&self) -> egui::Color32 {
        if self.tracking {
            egui::Color32::from_rgb(90, 220, 120)
        } else {
            egui::Color32::GRAY
        }
    }
}

/// egui status overlay drawn on top of the composed frame
pub struct Hud {
    ctx: egui::Context,
    state: egui_winit::State,
    renderer: egui_wgpu::Renderer,
}

impl Hud {
    pub fn new(window: &Window, device: &Device, surface_format: wgpu::TextureFormat) -> Self {
        let ctx = egui::Context::default();
        let state = egui_winit::State::new(
            ctx.clone(),
            egui::ViewportId::ROOT,
            window,
            Some(window.scale_factor() as f32),
            None,
            None,
        );
        let renderer = egui_wgpu::Renderer::new(
            device,
            surface_format,
            egui_wgpu::RendererOptions::default(),
        );
        Self { ctx, state, renderer }
    }

    /// True when egui consumed the event
    pub fn handle_event(&mut self, window: &Window, event: &winit::event::WindowEvent) -> bool {
        self.state.on_window_event(window, event).consumed
    }

    #[allow(clippy::too_many_arguments)]
    pub fn draw(
        &mut self,
        window: &Window,
        device: &Device,
        queue: &Queue,
        encoder: &mut CommandEncoder,
        target: &TextureView,
        size_in_pixels: [u32; 2],
        status: &HudStatus,
    ) {
        let raw_input = self.state.take_egui_input(window);
        let full_output = self.ctx.run(raw_input, |ctx| {
            egui::Window::new("Status")
                .title_bar(false)
                .resizable(false)
                .fixed_pos(egui::pos2(10.0, 10.0))
                .frame(egui::Frame::NONE)
                .show(ctx, |ui| {
                    ui.label(
                        egui::RichText::new(format!("{:.0} FPS", status.fps))
                            .size(20.0)
                            .color(egui::Color32::from_rgb(74, 158, 255)),
                    );
                    ui.label(
                        egui::RichText::new(status.marker)
                            .size(14.0)
                            .color(status.marker_color()),
                    );
                    if status.animating {
                        ui.label(egui::RichText::new("animating").size(14.0).color(egui::Color32::YELLOW));
                    }
                    ui.label(
                        egui::RichText::new(format!("{}x{}", status.frame_size.0, status.frame_size.1))
                            .size(12.0)
                            .color(egui::Color32::GRAY),
                    );
                });
        });

        self.state
            .handle_platform_output(window, full_output.platform_output);

        let tris = self
            .ctx
            .tessellate(full_output.shapes, self.ctx.pixels_per_point());
        for (id, image_delta) in &full_output.textures_delta.set {
            self.renderer.update_texture(device, queue, *id, image_delta);
        }

        let screen_descriptor = egui_wgpu::ScreenDescriptor {
            size_in_pixels,
            pixels_per_point: window.scale_factor() as f32,
        };

        self.renderer
            .update_buffers(device, queue, encoder, &tris, &screen_descriptor);

        {
            let mut render_pass = encoder
                .begin_render_pass(&wgpu::RenderPassDescriptor {
                    label: Some("HUD Pass"),
                    color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                        view: target,
                        resolve_target: None,
                        ops: wgpu::Operations {
                            load: wgpu::LoadOp::Load,
                            store: wgpu::StoreOp::Store,
                        },
                        depth_slice: None,
                    })],
                    depth_stencil_attachment: None,
                    occlusion_query_set: None,
                    timestamp_writes: None,
                })
                .forget_lifetime();

            self.renderer
                .render(&mut render_pass, &tris, &screen_descriptor);
        }

        for id in &full_output.textures_delta.free {
            self.renderer.free_texture(id);
        }
    }
}
