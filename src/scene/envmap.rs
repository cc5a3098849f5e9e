//! World light importance table.
//!
//! The world shader's luminance is tabulated over the equal-area square
//! (`z = 1 - 2v`, `phi = 2 pi u`) at `R x R` cells, `R = 2^exponent`, then
//! reduced into a quad-tree pyramid. Sampling walks the pyramid from the
//! 1x1 root down, choosing a column and then a row at each level. Layout of
//! the flat `f32` table, finest level first:
//!
//! ```text
//! [ level 0 (R x R) | level 1 (R/2 x R/2) | ... | level k (1 x 1) | pdf (R x R) ]
//! ```
//!
//! The table is built on the device by three kernels (`env_build_base`,
//! `env_build_reduce`, `env_build_normalize`); [`EnvironmentTable`] is the
//! CPU mirror used for tests and tools.

use std::f32::consts::{PI, TAU};

use glam::{Vec2, Vec3};

use super::gpu_types::EnvBuildParams;
use crate::render::DispatchArgs;
use crate::util::{error_scope, storage_entry, uniform_entry, GpuContext, Result};

const INV_FOUR_PI: f32 = 1.0 / (4.0 * PI);

/// Dynamic uniform stride of the build parameters.
const PARAMS_STRIDE: u64 = 256;

/// Offsets into the flat table for a given exponent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnvLayout {
    pub exponent: u32,
}

impl EnvLayout {
    pub fn new(exponent: u32) -> Self {
        Self { exponent }
    }

    /// Cells per side of the finest level.
    pub fn resolution(&self) -> u32 {
        1 << self.exponent
    }

    pub fn level_resolution(&self, level: u32) -> u32 {
        1 << (self.exponent - level)
    }

    /// `(4^(k+1) - 4^(k-l+1)) / 3`
    pub fn level_offset(&self, level: u32) -> usize {
        let k = self.exponent;
        ((1usize << (2 * (k + 1))) - (1usize << (2 * (k - level + 1)))) / 3
    }

    /// The single 1x1 cell holding the total luminance.
    pub fn total_offset(&self) -> usize {
        self.level_offset(self.exponent)
    }

    /// `(4^(k+1) - 1) / 3`
    pub fn pdf_offset(&self) -> usize {
        ((1usize << (2 * (self.exponent + 1))) - 1) / 3
    }

    /// Table length in `f32`s.
    pub fn len(&self) -> usize {
        let r = self.resolution() as usize;
        self.pdf_offset() + r * r
    }

    pub fn is_empty(&self) -> bool {
        false
    }
}

pub fn square_to_sphere(uv: Vec2) -> Vec3 {
    let z = 1.0 - 2.0 * uv.y;
    let r = (1.0 - z * z).max(0.0).sqrt();
    let phi = TAU * uv.x;
    Vec3::new(r * phi.cos(), r * phi.sin(), z)
}

pub fn sphere_to_square(dir: Vec3) -> Vec2 {
    let mut phi = dir.y.atan2(dir.x);
    if phi < 0.0 {
        phi += TAU;
    }
    Vec2::new(phi / TAU, (1.0 - dir.z.clamp(-1.0, 1.0)) * 0.5)
}

/// CPU copy of the importance table.
#[derive(Debug, Clone, PartialEq)]
pub struct EnvironmentTable {
    layout: EnvLayout,
    data: Vec<f32>,
}

impl EnvironmentTable {
    /// Builds the pyramid and pdf from the finest level's luminance values
    /// (row-major, `R x R`).
    pub fn from_importance(exponent: u32, base: Vec<f32>) -> Self {
        let layout = EnvLayout::new(exponent);
        let r = layout.resolution() as usize;
        assert_eq!(base.len(), r * r, "base level must be {r}x{r}");

        let mut data = base;
        data.resize(layout.len(), 0.0);
        for level in 1..=exponent {
            let res = layout.level_resolution(level) as usize;
            let src = layout.level_offset(level - 1);
            let dst = layout.level_offset(level);
            for y in 0..res {
                for x in 0..res {
                    let base = src + 2 * y * (2 * res) + 2 * x;
                    data[dst + y * res + x] =
                        data[base] + data[base + 1] + data[base + 2 * res] + data[base + 2 * res + 1];
                }
            }
        }

        let total = data[layout.total_offset()];
        let cells = (r * r) as f32;
        let pdf_offset = layout.pdf_offset();
        for i in 0..r * r {
            data[pdf_offset + i] = if total > 0.0 {
                data[i] / total * cells * INV_FOUR_PI
            } else {
                INV_FOUR_PI
            };
        }
        Self { layout, data }
    }

    /// Tabulates `luminance` at the centre of every cell.
    pub fn from_fn(exponent: u32, luminance: impl Fn(Vec3) -> f32) -> Self {
        let r = 1usize << exponent;
        let base = (0..r * r)
            .map(|i| {
                let uv = (Vec2::new((i % r) as f32, (i / r) as f32) + 0.5) / r as f32;
                luminance(square_to_sphere(uv)).max(0.0)
            })
            .collect();
        Self::from_importance(exponent, base)
    }

    /// Wraps a table read back from the device.
    pub fn from_table(exponent: u32, data: Vec<f32>) -> Option<Self> {
        let layout = EnvLayout::new(exponent);
        (data.len() == layout.len()).then_some(Self { layout, data })
    }

    pub fn layout(&self) -> EnvLayout {
        self.layout
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    pub fn total(&self) -> f32 {
        self.data[self.layout.total_offset()]
    }

    fn value(&self, level: u32, x: u32, y: u32) -> f32 {
        let res = self.layout.level_resolution(level);
        self.data[self.layout.level_offset(level) + (y * res + x) as usize]
    }

    fn cell_pdf(&self, x: u32, y: u32) -> f32 {
        let res = self.layout.resolution();
        self.data[self.layout.pdf_offset() + (y * res + x) as usize]
    }

    /// Direction and solid-angle pdf for uniform numbers `u`.
    pub fn sample(&self, mut u: Vec2) -> (Vec3, f32) {
        let (mut x, mut y) = (0u32, 0u32);
        for level in (1..=self.layout.exponent).rev() {
            let fine = level - 1;
            let (x0, y0) = (2 * x, 2 * y);
            let a = self.value(fine, x0, y0);
            let b = self.value(fine, x0 + 1, y0);
            let c = self.value(fine, x0, y0 + 1);
            let d = self.value(fine, x0 + 1, y0 + 1);

            let left = a + c;
            let sum = a + b + c + d;
            let p_left = if sum > 0.0 { left / sum } else { 0.5 };
            let (top, column) = if u.x < p_left {
                u.x /= p_left;
                x = x0;
                (a, left)
            } else {
                u.x = (u.x - p_left) / (1.0 - p_left);
                x = x0 + 1;
                (b, b + d)
            };
            let p_top = if column > 0.0 { top / column } else { 0.5 };
            if u.y < p_top {
                u.y /= p_top;
                y = y0;
            } else {
                u.y = (u.y - p_top) / (1.0 - p_top);
                y = y0 + 1;
            }
            u = u.clamp(Vec2::ZERO, Vec2::splat(0.999_999_94));
        }

        let res = self.layout.resolution() as f32;
        let uv = (Vec2::new(x as f32, y as f32) + u) / res;
        (square_to_sphere(uv), self.cell_pdf(x, y))
    }

    /// Solid-angle pdf of sampling `dir`.
    pub fn pdf(&self, dir: Vec3) -> f32 {
        let res = self.layout.resolution();
        let uv = sphere_to_square(dir) * res as f32;
        let x = (uv.x as u32).min(res - 1);
        let y = (uv.y as u32).min(res - 1);
        self.cell_pdf(x, y)
    }
}

/// Builds the importance table for `world_shader` on the device.
///
/// The pipelines bind an empty group 0, the scene textures at group 1 and
/// the table plus one dynamic parameter block at group 2.
#[tracing::instrument(skip(ctx, module, texture_layout, textures))]
pub(crate) fn build_on_device(
    ctx: &GpuContext,
    module: &wgpu::ShaderModule,
    texture_layout: &wgpu::BindGroupLayout,
    textures: &wgpu::BindGroup,
    world_shader: u32,
    exponent: u32,
    samples: u32,
) -> Result<wgpu::Buffer> {
    let device = &ctx.device;
    let layout = EnvLayout::new(exponent);

    let table = crate::util::storage_buffer_sized(
        device,
        "env_table",
        (layout.len() * std::mem::size_of::<f32>()) as u64,
        wgpu::BufferUsages::COPY_SRC,
    );

    // one parameter block per dispatch: base, k reductions, normalize
    let mut steps = Vec::with_capacity(exponent as usize + 2);
    steps.push(EnvBuildParams {
        resolution: layout.resolution(),
        dst_offset: 0,
        shader: world_shader,
        samples,
        ..Default::default()
    });
    for level in 1..=exponent {
        steps.push(EnvBuildParams {
            resolution: layout.level_resolution(level),
            src_offset: layout.level_offset(level - 1) as u32,
            dst_offset: layout.level_offset(level) as u32,
            ..Default::default()
        });
    }
    steps.push(EnvBuildParams {
        resolution: layout.resolution(),
        src_offset: 0,
        pdf_offset: layout.pdf_offset() as u32,
        total_offset: layout.total_offset() as u32,
        ..Default::default()
    });

    let mut params_bytes = vec![0u8; steps.len() * PARAMS_STRIDE as usize];
    for (i, step) in steps.iter().enumerate() {
        let at = i * PARAMS_STRIDE as usize;
        params_bytes[at..at + std::mem::size_of::<EnvBuildParams>()]
            .copy_from_slice(bytemuck::bytes_of(step));
    }
    let params = crate::util::uniform_buffer(device, "env_build_params", &params_bytes);

    let (pipelines, empty_group, build_group) = error_scope(device, "environment table pipelines", || {
        let empty_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("env_empty_layout"),
            entries: &[],
        });
        let build_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("env_build_layout"),
            entries: &[storage_entry(10, false), uniform_entry(11, true)],
        });
        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("env_build_pipeline_layout"),
            bind_group_layouts: &[&empty_layout, texture_layout, &build_layout],
            push_constant_ranges: &[],
        });
        let pipelines = ["env_build_base", "env_build_reduce", "env_build_normalize"].map(|entry| {
            device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
                label: Some(entry),
                layout: Some(&pipeline_layout),
                module,
                entry_point: Some(entry),
                compilation_options: Default::default(),
                cache: None,
            })
        });
        let empty_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("env_empty_group"),
            layout: &empty_layout,
            entries: &[],
        });
        let build_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("env_build_group"),
            layout: &build_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 10,
                    resource: table.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 11,
                    resource: wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                        buffer: &params,
                        offset: 0,
                        size: wgpu::BufferSize::new(std::mem::size_of::<EnvBuildParams>() as u64),
                    }),
                },
            ],
        });
        (pipelines, empty_group, build_group)
    })?;

    let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
        label: Some("env_build_encoder"),
    });
    {
        let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
            label: Some("env_build_pass"),
            timestamp_writes: None,
        });
        pass.set_bind_group(0, &empty_group, &[]);
        pass.set_bind_group(1, textures, &[]);
        let last = steps.len() - 1;
        for (i, step) in steps.iter().enumerate() {
            let pipeline = match i {
                0 => &pipelines[0],
                i if i == last => &pipelines[2],
                _ => &pipelines[1],
            };
            let args = DispatchArgs::for_count(step.resolution * step.resolution);
            pass.set_pipeline(pipeline);
            pass.set_bind_group(2, &build_group, &[(i as u64 * PARAMS_STRIDE) as u32]);
            pass.dispatch_workgroups(args.x, args.y, args.z);
        }
    }
    ctx.queue.submit(Some(encoder.finish()));
    tracing::info!(exponent, samples, floats = layout.len(), "environment table built");
    Ok(table)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_offsets() {
        let layout = EnvLayout::new(2);
        assert_eq!(layout.level_offset(0), 0);
        assert_eq!(layout.level_offset(1), 16);
        assert_eq!(layout.level_offset(2), 20);
        assert_eq!(layout.total_offset(), 20);
        assert_eq!(layout.pdf_offset(), 21);
        assert_eq!(layout.len(), 37);
    }

    #[test]
    fn test_uniform_world_has_constant_pdf() {
        let table = EnvironmentTable::from_fn(3, |_| 1.0);
        assert!((table.total() - 64.0).abs() < 1e-4);
        let (dir, pdf) = table.sample(Vec2::new(0.3, 0.7));
        assert!((dir.length() - 1.0).abs() < 1e-5);
        assert!((pdf - INV_FOUR_PI).abs() < 1e-6);
    }

    #[test]
    fn test_black_world_falls_back_to_uniform() {
        let table = EnvironmentTable::from_fn(2, |_| 0.0);
        assert!((table.pdf(Vec3::Z) - INV_FOUR_PI).abs() < 1e-6);
    }

    #[test]
    fn test_pdf_integrates_to_one() {
        let table = EnvironmentTable::from_fn(4, |d| 1.0 + 10.0 * d.z.max(0.0));
        let layout = table.layout();
        let cells = layout.resolution() as usize * layout.resolution() as usize;
        let sum: f32 = table.as_slice()[layout.pdf_offset()..].iter().sum();
        let integral = sum * 4.0 * PI / cells as f32;
        assert!((integral - 1.0).abs() < 1e-4, "integral {integral}");
    }

    #[test]
    fn test_samples_follow_brightness() {
        // all energy in the upper hemisphere
        let table = EnvironmentTable::from_fn(4, |d| if d.z > 0.0 { 1.0 } else { 0.0 });
        for i in 0..16 {
            let u = Vec2::new((i as f32 + 0.5) / 16.0, ((i * 7) % 16) as f32 / 16.0 + 0.01);
            let (dir, pdf) = table.sample(u);
            assert!(dir.z > -1e-4, "sample {i} went below the horizon: {dir}");
            assert!(pdf > 0.0);
            if dir.z > 0.01 {
                assert!((pdf - table.pdf(dir)).abs() < 1e-5);
            }
        }
    }
}
