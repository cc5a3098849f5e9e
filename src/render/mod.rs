//! Wavefront path tracing renderer.
//!
//! A frame is encoded as one compute pass over the [`frame::plan`]:
//!
//! ```text
//! generate -> { args -> trace -> shade -> [args -> shadow trace -> shadow shade] } x D -> resolve
//! ```
//!
//! Every trace and shade dispatch after primary generation is sized
//! indirectly from a GPU-written live count, so dispatch sizes follow the
//! shrinking ray population instead of the pixel count. The [`Renderer`]
//! owns the frame-local buffers; the [`Scene`] it renders stays immutable
//! apart from the camera.

mod dispatch;
mod export;
pub mod frame;
mod pacing;
mod pipelines;
mod resources;
mod stats;

use glam::Mat4;

pub use dispatch::{DispatchArgs, MAX_GROUPS_X, WORKGROUP_SIZE};
pub use export::FrameImage;
pub use frame::{CounterLayout, Step, Wavefront, PASS_STRIDE};
pub use pacing::{cooldown_for, FramePacer};
pub use pipelines::{create_pipelines, FrameLayouts, Pipelines};
pub use resources::{FrameResources, FrameSizes, FrameState, FrameTarget};
pub use stats::{AverageReport, FrameReport, StatsAccumulator};

use crate::scene::{FrameUniforms, Scene};
use crate::settings::RenderSettings;
use crate::util::{error_scope, read_buffer, Error, GpuContext, Result};

pub struct Renderer {
    scene: Scene,
    settings: RenderSettings,
    layouts: FrameLayouts,
    pipelines: Pipelines,
    resources: FrameResources,
    pacer: FramePacer,
    stats: StatsAccumulator,
    state: FrameState,
}

impl Renderer {
    /// Creates pipelines and frame buffers for a `width` x `height` output.
    #[tracing::instrument(skip(ctx, scene, settings))]
    pub fn new(ctx: &GpuContext, scene: Scene, settings: RenderSettings, width: u32, height: u32) -> Result<Self> {
        let settings = settings.validated();
        let layouts = FrameLayouts::new(&ctx.device);
        let pipelines = create_pipelines(&ctx.device, &scene.module, &scene.bindings, &layouts)?;
        let target = FrameTarget::new(width, height, &settings);
        let sizes = target.sizes;
        let resources = error_scope(&ctx.device, "frame resources", || {
            FrameResources::new(&ctx.device, &layouts, sizes, target.statistics)
        })?;
        tracing::info!(
            width = sizes.width,
            height = sizes.height,
            max_depth = sizes.max_depth,
            "renderer ready"
        );

        Ok(Self {
            pacer: FramePacer::new(settings.slow_frame(), settings.cooldown()),
            stats: StatsAccumulator::default(),
            scene,
            settings,
            layouts,
            pipelines,
            resources,
            state: FrameState::new(target),
        })
    }

    /// Frames accumulated since the last reset.
    pub fn frame_index(&self) -> u32 {
        self.state.frame_index()
    }

    pub fn size(&self) -> (u32, u32) {
        (self.resources.sizes.width, self.resources.sizes.height)
    }

    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    pub fn settings(&self) -> &RenderSettings {
        &self.settings
    }

    /// Display image written by the resolve kernel.
    pub fn output_texture(&self) -> &wgpu::Texture {
        &self.resources.output
    }

    pub fn output_view(&self) -> &wgpu::TextureView {
        &self.resources.output_view
    }

    /// GPU time of the last completed frame.
    pub fn last_frame_time(&self) -> Option<std::time::Duration> {
        self.pacer.last_frame_time()
    }

    /// Samples the current frame will hold once resolved.
    fn samples(&self) -> u32 {
        if self.settings.accumulate {
            self.state.frame_index() + 1
        } else {
            1
        }
    }

    pub fn frame_uniforms(&self) -> FrameUniforms {
        let camera = &self.scene.camera;
        let sizes = &self.resources.sizes;
        FrameUniforms {
            camera_to_world: camera.transform.to_cols_array_2d(),
            width: sizes.width,
            height: sizes.height,
            frame_index: self.state.frame_index(),
            max_depth: sizes.max_depth,
            focal: camera.focal,
            shift_x: camera.shift[0],
            shift_y: camera.shift[1],
            exposure: self.settings.exposure,
            near: camera.near,
            far: camera.far,
            tonemapping: self.settings.tonemapping as u32,
            sampling_mode: self.settings.sampling_mode as u32,
            rr_depth: self.settings.russian_roulette_depth,
            output_channel: self.settings.output_channel as u32,
            accumulate: self.settings.accumulate as u32,
            samples: self.samples(),
        }
    }

    /// Records one frame into `encoder`.
    pub fn encode(&self, queue: &wgpu::Queue, encoder: &mut wgpu::CommandEncoder) {
        let res = &self.resources;
        queue.write_buffer(&res.frame_uniforms, 0, bytemuck::bytes_of(&self.frame_uniforms()));

        let clear_accumulation = self.state.frame_index() == 0 || !self.settings.accumulate;
        let steps = frame::plan(res.sizes.max_depth, clear_accumulation);

        for step in &steps {
            match step {
                Step::ClearCounters => encoder.clear_buffer(&res.counters, 0, None),
                Step::ClearAccumulation => encoder.clear_buffer(&res.accumulation, 0, None),
                _ => {}
            }
        }

        let pixels = DispatchArgs::for_count(res.sizes.pixels());
        let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
            label: Some("wavefront"),
            timestamp_writes: None,
        });
        pass.set_bind_group(0, &self.scene.bindings.scene_group, &[]);
        pass.set_bind_group(1, &self.scene.bindings.texture_group, &[]);
        pass.set_bind_group(2, &res.frame_group, &[]);

        for step in steps {
            match step {
                Step::ClearCounters | Step::ClearAccumulation => {}
                Step::GenerateCameraRays => {
                    pass.set_pipeline(&self.pipelines.generate_camera_rays);
                    pass.set_bind_group(3, &res.pass_group, &[FrameResources::pass_offset(0)]);
                    pass.dispatch_workgroups(pixels.x, pixels.y, pixels.z);
                }
                Step::DispatchArgs { pass: index } => {
                    pass.set_pipeline(&self.pipelines.dispatch_args);
                    pass.set_bind_group(3, &res.args_group, &[FrameResources::pass_offset(index)]);
                    pass.dispatch_workgroups(1, 1, 1);
                }
                Step::TraceNearest { pass: index, .. } => {
                    self.indirect(&mut pass, &self.pipelines.trace_nearest, index);
                }
                Step::Shade { pass: index, .. } => {
                    self.indirect(&mut pass, &self.pipelines.shade, index);
                }
                Step::TraceShadow { pass: index, .. } => {
                    self.indirect(&mut pass, &self.pipelines.trace_shadow, index);
                }
                Step::ShadeShadow { pass: index, .. } => {
                    self.indirect(&mut pass, &self.pipelines.shade_shadow, index);
                }
                Step::ResolveImage => {
                    pass.set_pipeline(&self.pipelines.resolve_image);
                    pass.set_bind_group(3, &res.pass_group, &[FrameResources::pass_offset(0)]);
                    pass.dispatch_workgroups(pixels.x, pixels.y, pixels.z);
                }
            }
        }
    }

    fn indirect(&self, pass: &mut wgpu::ComputePass<'_>, pipeline: &wgpu::ComputePipeline, index: u32) {
        pass.set_pipeline(pipeline);
        pass.set_bind_group(3, &self.resources.pass_group, &[FrameResources::pass_offset(index)]);
        pass.dispatch_workgroups_indirect(&self.resources.dispatch_args, FrameResources::args_offset(index));
    }

    /// Renders and submits one frame.
    ///
    /// Blocks until the previous frame has completed. An `Err` means the
    /// frame was not presented; the renderer stays usable.
    pub fn execute(&mut self, ctx: &GpuContext) -> Result<()> {
        self.pacer.wait(&ctx.device)?;

        let mut encoder = ctx.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("frame"),
        });
        self.encode(&ctx.queue, &mut encoder);
        if let Some(readback) = &self.resources.counter_readback {
            encoder.copy_buffer_to_buffer(&self.resources.counters, 0, readback, 0, readback.size());
        }
        ctx.queue.submit(Some(encoder.finish()));
        self.pacer.submitted(&ctx.queue);
        self.state.advance();

        if self.resources.counter_readback.is_some() {
            self.collect_statistics(ctx)?;
        }
        Ok(())
    }

    fn collect_statistics(&mut self, ctx: &GpuContext) -> Result<()> {
        let Some(readback) = &self.resources.counter_readback else {
            return Ok(());
        };
        let bytes = read_buffer(&ctx.device, readback)?;
        // readback waited for the frame, so this returns immediately
        self.pacer.wait(&ctx.device)?;
        let counters: Vec<u32> = bytemuck::pod_collect_to_vec(&bytes);
        let report = FrameReport::from_counters(
            self.resources.sizes.counters(),
            &counters,
            self.pacer.last_frame_time().unwrap_or_default(),
        );
        self.stats.push(&report);
        Ok(())
    }

    /// Reallocates frame buffers for a new output size.
    ///
    /// Returns `false` (and keeps the accumulated image) when the size is
    /// unchanged.
    pub fn resize(&mut self, device: &wgpu::Device, width: u32, height: u32) -> Result<bool> {
        self.rebuild(device, FrameTarget::new(width, height, &self.settings))
    }

    /// Reallocates frame buffers when `target` differs from the current one.
    ///
    /// On allocation failure the old buffers and frame index stay in place.
    fn rebuild(&mut self, device: &wgpu::Device, target: FrameTarget) -> Result<bool> {
        if !self.state.differs(target) {
            return Ok(false);
        }
        self.pacer.wait(device)?;
        self.resources = error_scope(device, "frame resources", || {
            FrameResources::new(device, &self.layouts, target.sizes, target.statistics)
        })?;
        self.state.retarget(target);
        tracing::debug!(
            width = target.sizes.width,
            height = target.sizes.height,
            max_depth = target.sizes.max_depth,
            statistics = target.statistics,
            "frame buffers reallocated"
        );
        Ok(true)
    }

    /// Restarts accumulation; buffers are kept.
    pub fn reset(&mut self) {
        self.state.reset();
    }

    /// Multiplies the camera transform by `m` and restarts accumulation.
    pub fn update_projection(&mut self, m: Mat4) {
        self.scene.camera.update_projection(m);
        self.reset();
    }

    /// Exposure only affects the resolve step, so accumulation continues.
    pub fn set_exposure(&mut self, exposure: f32) {
        self.settings.exposure = exposure;
    }

    /// Replaces all settings and restarts accumulation.
    ///
    /// A different `max_depth` or statistics mode reallocates the frame
    /// buffers at the current size before returning.
    pub fn set_settings(&mut self, device: &wgpu::Device, settings: RenderSettings) -> Result<()> {
        self.settings = settings.validated();
        self.pacer.set_timings(self.settings.slow_frame(), self.settings.cooldown());
        let (width, height) = self.size();
        self.rebuild(device, FrameTarget::new(width, height, &self.settings))?;
        self.reset();
        Ok(())
    }

    /// Reads back the accumulated radiance as linear floats.
    #[tracing::instrument(skip_all)]
    pub fn save_frame(&mut self, ctx: &GpuContext) -> Result<FrameImage> {
        if self.state.frame_index() == 0 {
            return Err(Error::other("no frame has been rendered since the last reset"));
        }
        self.pacer.wait(&ctx.device)?;

        let size = self.resources.sizes.accumulation_bytes();
        let staging = ctx.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("accumulation_readback"),
            size,
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let mut encoder = ctx.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("save_frame"),
        });
        encoder.copy_buffer_to_buffer(&self.resources.accumulation, 0, &staging, 0, size);
        ctx.queue.submit(Some(encoder.finish()));

        let bytes = read_buffer(&ctx.device, &staging)?;
        let accumulation: Vec<[f32; 4]> = bytemuck::pod_collect_to_vec(&bytes);
        let samples = if self.settings.accumulate { self.state.frame_index() } else { 1 };
        let (width, height) = self.size();
        FrameImage::from_accumulation(width, height, &accumulation, samples)
    }
}
