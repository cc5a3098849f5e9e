//! Wavefront compute pipelines and the frame-side bind group layouts.

use crate::scene::SceneBindings;
use crate::util::{error_scope, storage_entry, uniform_entry, Result};

/// Layouts of group 2 (frame buffers) and group 3 (pass uniforms).
///
/// The dispatch-args kernel alone also writes the indirect argument
/// buffer, so it gets its own group 3 layout.
pub struct FrameLayouts {
    pub frame: wgpu::BindGroupLayout,
    pub pass: wgpu::BindGroupLayout,
    pub args: wgpu::BindGroupLayout,
}

impl FrameLayouts {
    pub fn new(device: &wgpu::Device) -> Self {
        let mut frame_entries: Vec<_> = (0..5).map(|binding| storage_entry(binding, false)).collect();
        frame_entries.push(wgpu::BindGroupLayoutEntry {
            binding: 5,
            visibility: wgpu::ShaderStages::COMPUTE,
            ty: wgpu::BindingType::StorageTexture {
                access: wgpu::StorageTextureAccess::WriteOnly,
                format: wgpu::TextureFormat::Rgba8Unorm,
                view_dimension: wgpu::TextureViewDimension::D2,
            },
            count: None,
        });
        frame_entries.push(uniform_entry(6, false));

        Self {
            frame: device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("frame_layout"),
                entries: &frame_entries,
            }),
            pass: device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("pass_layout"),
                entries: &[uniform_entry(0, true)],
            }),
            args: device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("args_layout"),
                entries: &[uniform_entry(0, true), storage_entry(1, false)],
            }),
        }
    }
}

pub struct Pipelines {
    pub dispatch_args: wgpu::ComputePipeline,
    pub generate_camera_rays: wgpu::ComputePipeline,
    pub trace_nearest: wgpu::ComputePipeline,
    pub shade: wgpu::ComputePipeline,
    pub trace_shadow: wgpu::ComputePipeline,
    pub shade_shadow: wgpu::ComputePipeline,
    pub resolve_image: wgpu::ComputePipeline,
}

fn compute_pipeline(
    device: &wgpu::Device,
    layout: &wgpu::PipelineLayout,
    module: &wgpu::ShaderModule,
    entry_point: &str,
) -> wgpu::ComputePipeline {
    device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
        label: Some(entry_point),
        layout: Some(layout),
        module,
        entry_point: Some(entry_point),
        compilation_options: Default::default(),
        cache: None,
    })
}

/// Creates every kernel pipeline from the scene's shading library.
#[tracing::instrument(skip_all)]
pub fn create_pipelines(
    device: &wgpu::Device,
    module: &wgpu::ShaderModule,
    scene: &SceneBindings,
    layouts: &FrameLayouts,
) -> Result<Pipelines> {
    error_scope(device, "wavefront pipelines", || {
        let kernel_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("wavefront_layout"),
            bind_group_layouts: &[&scene.scene_layout, &scene.texture_layout, &layouts.frame, &layouts.pass],
            push_constant_ranges: &[],
        });
        let args_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("dispatch_args_layout"),
            bind_group_layouts: &[&scene.scene_layout, &scene.texture_layout, &layouts.frame, &layouts.args],
            push_constant_ranges: &[],
        });

        Pipelines {
            dispatch_args: compute_pipeline(device, &args_layout, module, "compute_dispatch_args"),
            generate_camera_rays: compute_pipeline(device, &kernel_layout, module, "generate_camera_rays"),
            trace_nearest: compute_pipeline(device, &kernel_layout, module, "trace_nearest"),
            shade: compute_pipeline(device, &kernel_layout, module, "shade"),
            trace_shadow: compute_pipeline(device, &kernel_layout, module, "trace_shadow"),
            shade_shadow: compute_pipeline(device, &kernel_layout, module, "shade_shadow"),
            resolve_image: compute_pipeline(device, &kernel_layout, module, "resolve_image"),
        }
    })
}
