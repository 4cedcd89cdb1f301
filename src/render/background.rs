use serde::{Deserialize, Serialize};
use wgpu::{BindGroup, BindGroupLayout, Device, Queue, RenderPipeline, Sampler, Texture, TextureView};

use super::object::DEPTH_FORMAT;
use super::shader;
use crate::error::{ArError, Result};
use crate::frame::VideoFrame;
use crate::transform::Viewport;

/// Camera frames are sRGB-encoded bytes
const FRAME_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8UnormSrgb;

/// What to do when a frame's size differs from the background texture
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FrameSizePolicy {
    /// Recreate the texture at the new size
    #[default]
    Resize,
    /// Fail the frame with `FrameSizeMismatch`
    Reject,
}

impl FrameSizePolicy {
    /// `Ok(true)` when the texture has to be recreated before uploading
    pub fn check(self, texture: Viewport, frame: Viewport) -> Result<bool> {
        if texture == frame {
            return Ok(false);
        }
        match self {
            Self::Resize => Ok(true),
            Self::Reject => Err(ArError::FrameSizeMismatch {
                expected_width: texture.width,
                expected_height: texture.height,
                actual_width: frame.width,
                actual_height: frame.height,
            }),
        }
    }
}

/// Fails frames the device cannot hold in a single 2D texture
pub fn ensure_fits(size: Viewport, max_dimension: u32) -> Result<()> {
    if size.width > max_dimension || size.height > max_dimension {
        return Err(ArError::FrameTooLarge {
            width: size.width,
            height: size.height,
            max_dimension,
        });
    }
    Ok(())
}

/// Uploads each video frame to a texture and draws it across the whole
/// target. Draws without touching depth.
pub struct BackgroundPass {
    pipeline: RenderPipeline,
    bind_group_layout: BindGroupLayout,
    sampler: Sampler,
    texture: Texture,
    bind_group: BindGroup,
    size: Viewport,
}

impl BackgroundPass {
    pub fn new(device: &Device, surface_format: wgpu::TextureFormat, size: Viewport) -> Result<Self> {
        ensure_fits(size, device.limits().max_texture_dimension_2d)?;

        let shader = shader::create_shader(
            device,
            "Background Shader",
            include_str!("shaders/background.wgsl"),
        )?;

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Background Bind Group Layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Background Pipeline Layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        let pipeline = shader::create_pipeline(
            device,
            &wgpu::RenderPipelineDescriptor {
                label: Some("Background Pipeline"),
                layout: Some(&pipeline_layout),
                vertex: wgpu::VertexState {
                    module: &shader,
                    entry_point: Some("vs_main"),
                    buffers: &[],
                    compilation_options: Default::default(),
                },
                fragment: Some(wgpu::FragmentState {
                    module: &shader,
                    entry_point: Some("fs_main"),
                    targets: &[Some(wgpu::ColorTargetState {
                        format: surface_format,
                        blend: Some(wgpu::BlendState::REPLACE),
                        write_mask: wgpu::ColorWrites::ALL,
                    })],
                    compilation_options: Default::default(),
                }),
                primitive: wgpu::PrimitiveState {
                    topology: wgpu::PrimitiveTopology::TriangleList,
                    ..Default::default()
                },
                // Shares the pass with the object; never tests or writes depth
                depth_stencil: Some(wgpu::DepthStencilState {
                    format: DEPTH_FORMAT,
                    depth_write_enabled: false,
                    depth_compare: wgpu::CompareFunction::Always,
                    stencil: wgpu::StencilState::default(),
                    bias: wgpu::DepthBiasState::default(),
                }),
                multisample: wgpu::MultisampleState::default(),
                multiview: None,
                cache: None,
            },
        )?;

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Background Sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });

        let texture = Self::create_texture(device, size);
        let bind_group = Self::create_bind_group(device, &bind_group_layout, &texture, &sampler);

        Ok(Self {
            pipeline,
            bind_group_layout,
            sampler,
            texture,
            bind_group,
            size,
        })
    }

    pub fn size(&self) -> Viewport {
        self.size
    }

    /// Copies the frame into the texture. Returns whether the texture had to
    /// be recreated for a new frame size.
    pub fn upload(
        &mut self,
        device: &Device,
        queue: &Queue,
        frame: &VideoFrame,
        policy: FrameSizePolicy,
    ) -> Result<bool> {
        let frame_size = frame.viewport();
        ensure_fits(frame_size, device.limits().max_texture_dimension_2d)?;
        let resized = policy.check(self.size, frame_size)?;
        if resized {
            log::info!(
                "Background texture resized {}x{} -> {}x{}",
                self.size.width,
                self.size.height,
                frame_size.width,
                frame_size.height
            );
            self.texture = Self::create_texture(device, frame_size);
            self.bind_group =
                Self::create_bind_group(device, &self.bind_group_layout, &self.texture, &self.sampler);
            self.size = frame_size;
        }

        queue.write_texture(
            self.texture.as_image_copy(),
            frame.pixels(),
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(4 * frame.width()),
                rows_per_image: Some(frame.height()),
            },
            wgpu::Extent3d {
                width: frame.width(),
                height: frame.height(),
                depth_or_array_layers: 1,
            },
        );

        Ok(resized)
    }

    pub fn draw(&self, render_pass: &mut wgpu::RenderPass<'_>) {
        render_pass.set_pipeline(&self.pipeline);
        render_pass.set_bind_group(0, &self.bind_group, &[]);
        render_pass.draw(0..3, 0..1); // Fullscreen triangle
    }

    fn create_texture(device: &Device, size: Viewport) -> Texture {
        device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Background Texture"),
            size: wgpu::Extent3d {
                width: size.width.max(1),
                height: size.height.max(1),
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: FRAME_FORMAT,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        })
    }

    fn create_bind_group(
        device: &Device,
        layout: &BindGroupLayout,
        texture: &Texture,
        sampler: &Sampler,
    ) -> BindGroup {
        let view: TextureView = texture.create_view(&wgpu::TextureViewDescriptor::default());
        device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Background Bind Group"),
            layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(sampler),
                },
            ],
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_size_needs_nothing() {
        let vp = Viewport::new(640, 480);
        assert!(!FrameSizePolicy::Resize.check(vp, vp).unwrap());
        assert!(!FrameSizePolicy::Reject.check(vp, vp).unwrap());
    }

    #[test]
    fn resize_policy_recreates() {
        assert!(FrameSizePolicy::Resize
            .check(Viewport::new(640, 480), Viewport::new(1280, 720))
            .unwrap());
    }

    #[test]
    fn reject_policy_reports_both_sizes() {
        let err = FrameSizePolicy::Reject
            .check(Viewport::new(640, 480), Viewport::new(1280, 720))
            .unwrap_err();
        assert!(matches!(
            err,
            ArError::FrameSizeMismatch {
                expected_width: 640,
                expected_height: 480,
                actual_width: 1280,
                actual_height: 720,
            }
        ));
    }

    #[test]
    fn oversized_frames_are_refused_before_upload() {
        // wgpu's default 2D texture limit
        let max = wgpu::Limits::default().max_texture_dimension_2d;
        assert_eq!(max, 8192);

        assert!(ensure_fits(Viewport::new(8192, 8192), max).is_ok());
        assert!(matches!(
            ensure_fits(Viewport::new(9000, 10), max),
            Err(ArError::FrameTooLarge {
                width: 9000,
                height: 10,
                max_dimension: 8192,
            })
        ));
        assert!(ensure_fits(Viewport::new(10, 9000), max).is_err());
    }

    #[test]
    fn policy_names_in_config() {
        assert_eq!(
            serde_json::from_str::<FrameSizePolicy>("\"reject\"").unwrap(),
            FrameSizePolicy::Reject
        );
        assert_eq!(FrameSizePolicy::default(), FrameSizePolicy::Resize);
    }
}
