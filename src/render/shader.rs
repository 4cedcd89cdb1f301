use wgpu::{Device, RenderPipeline, RenderPipelineDescriptor, ShaderModule};

use crate::error::{ArError, Result};

/// Compiles WGSL, turning validation failures into `ShaderCompile` with the
/// compiler's diagnostic instead of the device's uncaptured-error panic.
pub(crate) fn create_shader(device: &Device, label: &str, source: &str) -> Result<ShaderModule> {
    device.push_error_scope(wgpu::ErrorFilter::Validation);
    let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some(label),
        source: wgpu::ShaderSource::Wgsl(source.into()),
    });

    match pollster::block_on(device.pop_error_scope()) {
        None => Ok(module),
        Some(err) => Err(ArError::ShaderCompile {
            label: label.to_string(),
            diagnostic: err.to_string(),
        }),
    }
}

/// Creates a render pipeline, reporting interface mismatches between the
/// stages and the pipeline layout as `ShaderLink`.
pub(crate) fn create_pipeline(
    device: &Device,
    descriptor: &RenderPipelineDescriptor,
) -> Result<RenderPipeline> {
    device.push_error_scope(wgpu::ErrorFilter::Validation);
    let pipeline = device.create_render_pipeline(descriptor);

    match pollster::block_on(device.pop_error_scope()) {
        None => Ok(pipeline),
        Some(err) => Err(ArError::ShaderLink {
            label: descriptor.label.unwrap_or("render pipeline").to_string(),
            diagnostic: err.to_string(),
        }),
    }
}
