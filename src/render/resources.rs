//! Frame-local GPU resources, sized from the output resolution.

use super::dispatch::DispatchArgs;
use super::frame::{pass_uniform_bytes, pass_uniforms, CounterLayout, PASS_STRIDE};
use super::pipelines::FrameLayouts;
use crate::scene::{FrameUniforms, HIT_SIZE, RAY_SIZE, SHADOW_RAY_SIZE};
use crate::settings::RenderSettings;
use crate::util::{storage_buffer_sized, uniform_buffer};

/// Byte sizes of every frame buffer for a resolution and bounce depth.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameSizes {
    pub width: u32,
    pub height: u32,
    pub max_depth: u32,
}

impl FrameSizes {
    pub fn new(width: u32, height: u32, max_depth: u32) -> Self {
        Self {
            width: width.max(1),
            height: height.max(1),
            max_depth: max_depth.max(1),
        }
    }

    pub fn pixels(&self) -> u32 {
        self.width * self.height
    }

    /// Rays per half of the ping-pong buffer: one live ray per pixel.
    pub fn ray_capacity(&self) -> u32 {
        self.pixels()
    }

    pub fn ray_bytes(&self) -> u64 {
        2 * self.ray_capacity() as u64 * RAY_SIZE
    }

    pub fn shadow_ray_bytes(&self) -> u64 {
        self.ray_capacity() as u64 * SHADOW_RAY_SIZE
    }

    pub fn hit_bytes(&self) -> u64 {
        self.ray_capacity() as u64 * HIT_SIZE
    }

    pub fn counters(&self) -> CounterLayout {
        CounterLayout::new(self.max_depth)
    }

    /// Two indirect argument slots per depth.
    pub fn dispatch_arg_bytes(&self) -> u64 {
        2 * self.max_depth as u64 * DispatchArgs::SIZE
    }

    /// One `vec4f` per pixel.
    pub fn accumulation_bytes(&self) -> u64 {
        self.pixels() as u64 * 16
    }

    pub fn total_bytes(&self) -> u64 {
        self.ray_bytes()
            + self.shadow_ray_bytes()
            + self.hit_bytes()
            + self.counters().bytes()
            + self.dispatch_arg_bytes()
            + self.accumulation_bytes()
            + self.pixels() as u64 * 4
    }
}

/// What the frame buffers are allocated for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameTarget {
    pub sizes: FrameSizes,
    /// Counter readback buffer present.
    pub statistics: bool,
}

impl FrameTarget {
    pub fn new(width: u32, height: u32, settings: &RenderSettings) -> Self {
        Self {
            sizes: FrameSizes::new(width, height, settings.max_depth),
            statistics: settings.collect_statistics,
        }
    }
}

/// Allocation target plus the number of frames accumulated into it.
///
/// Holds the reallocate-and-reset decision so it can be checked without a
/// device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameState {
    target: FrameTarget,
    frame_index: u32,
}

impl FrameState {
    pub fn new(target: FrameTarget) -> Self {
        Self { target, frame_index: 0 }
    }

    pub fn target(&self) -> FrameTarget {
        self.target
    }

    pub fn frame_index(&self) -> u32 {
        self.frame_index
    }

    pub fn advance(&mut self) {
        self.frame_index = self.frame_index.saturating_add(1);
    }

    pub fn reset(&mut self) {
        self.frame_index = 0;
    }

    /// Whether switching to `target` needs new buffers.
    pub fn differs(&self, target: FrameTarget) -> bool {
        self.target != target
    }

    /// Switches to `target`, restarting accumulation if it differs.
    ///
    /// Returns `false` and keeps the frame index when nothing changed.
    pub fn retarget(&mut self, target: FrameTarget) -> bool {
        if !self.differs(target) {
            return false;
        }
        self.target = target;
        self.reset();
        true
    }
}

pub struct FrameResources {
    pub sizes: FrameSizes,
    pub rays: wgpu::Buffer,
    pub shadow_rays: wgpu::Buffer,
    pub hits: wgpu::Buffer,
    pub counters: wgpu::Buffer,
    pub dispatch_args: wgpu::Buffer,
    pub accumulation: wgpu::Buffer,
    pub output: wgpu::Texture,
    pub output_view: wgpu::TextureView,
    pub frame_uniforms: wgpu::Buffer,
    pub pass_uniforms: wgpu::Buffer,
    pub frame_group: wgpu::BindGroup,
    pub pass_group: wgpu::BindGroup,
    pub args_group: wgpu::BindGroup,
    /// Mappable copy of the counters, present when statistics are on.
    pub counter_readback: Option<wgpu::Buffer>,
}

impl FrameResources {
    #[tracing::instrument(skip(device, layouts))]
    pub fn new(device: &wgpu::Device, layouts: &FrameLayouts, sizes: FrameSizes, statistics: bool) -> Self {
        let none = wgpu::BufferUsages::empty();
        let rays = storage_buffer_sized(device, "rays", sizes.ray_bytes(), none);
        let shadow_rays = storage_buffer_sized(device, "shadow_rays", sizes.shadow_ray_bytes(), none);
        let hits = storage_buffer_sized(device, "hits", sizes.hit_bytes(), none);
        let counters = storage_buffer_sized(
            device,
            "counters",
            sizes.counters().bytes(),
            wgpu::BufferUsages::COPY_SRC,
        );
        let dispatch_args = storage_buffer_sized(
            device,
            "dispatch_args",
            sizes.dispatch_arg_bytes(),
            wgpu::BufferUsages::INDIRECT,
        );
        let accumulation = storage_buffer_sized(
            device,
            "accumulation",
            sizes.accumulation_bytes(),
            wgpu::BufferUsages::COPY_SRC,
        );

        let output = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("output_image"),
            size: wgpu::Extent3d {
                width: sizes.width,
                height: sizes.height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba8Unorm,
            usage: wgpu::TextureUsages::STORAGE_BINDING
                | wgpu::TextureUsages::TEXTURE_BINDING
                | wgpu::TextureUsages::COPY_SRC,
            view_formats: &[],
        });
        let output_view = output.create_view(&wgpu::TextureViewDescriptor::default());

        let frame_uniforms = uniform_buffer(
            device,
            "frame_uniforms",
            bytemuck::bytes_of(&FrameUniforms::zeroed_for(&sizes)),
        );
        let passes = pass_uniforms(sizes.max_depth, sizes.ray_capacity());
        let pass_uniforms = uniform_buffer(device, "pass_uniforms", &pass_uniform_bytes(&passes));

        let frame_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("frame_group"),
            layout: &layouts.frame,
            entries: &[
                wgpu::BindGroupEntry { binding: 0, resource: rays.as_entire_binding() },
                wgpu::BindGroupEntry { binding: 1, resource: shadow_rays.as_entire_binding() },
                wgpu::BindGroupEntry { binding: 2, resource: hits.as_entire_binding() },
                wgpu::BindGroupEntry { binding: 3, resource: counters.as_entire_binding() },
                wgpu::BindGroupEntry { binding: 4, resource: accumulation.as_entire_binding() },
                wgpu::BindGroupEntry {
                    binding: 5,
                    resource: wgpu::BindingResource::TextureView(&output_view),
                },
                wgpu::BindGroupEntry { binding: 6, resource: frame_uniforms.as_entire_binding() },
            ],
        });

        let pass_binding = wgpu::BindingResource::Buffer(wgpu::BufferBinding {
            buffer: &pass_uniforms,
            offset: 0,
            size: wgpu::BufferSize::new(std::mem::size_of::<crate::scene::PassUniforms>() as u64),
        });
        let pass_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("pass_group"),
            layout: &layouts.pass,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: pass_binding.clone(),
            }],
        });
        let args_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("args_group"),
            layout: &layouts.args,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: pass_binding,
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: dispatch_args.as_entire_binding(),
                },
            ],
        });

        let counter_readback = statistics.then(|| {
            device.create_buffer(&wgpu::BufferDescriptor {
                label: Some("counter_readback"),
                size: sizes.counters().bytes(),
                usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            })
        });

        tracing::debug!(
            width = sizes.width,
            height = sizes.height,
            bytes = sizes.total_bytes(),
            "frame resources allocated"
        );

        Self {
            sizes,
            rays,
            shadow_rays,
            hits,
            counters,
            dispatch_args,
            accumulation,
            output,
            output_view,
            frame_uniforms,
            pass_uniforms,
            frame_group,
            pass_group,
            args_group,
            counter_readback,
        }
    }

    /// Dynamic offset of pass uniform block `pass`.
    pub fn pass_offset(pass: u32) -> u32 {
        (pass as u64 * PASS_STRIDE) as u32
    }

    /// Byte offset of indirect argument slot `slot`.
    pub fn args_offset(slot: u32) -> u64 {
        slot as u64 * DispatchArgs::SIZE
    }
}

impl FrameUniforms {
    fn zeroed_for(sizes: &FrameSizes) -> Self {
        Self {
            width: sizes.width,
            height: sizes.height,
            max_depth: sizes.max_depth,
            ..bytemuck::Zeroable::zeroed()
        }
    }
}
