//! Device setup and small wgpu helpers shared by scene assembly and rendering.

use wgpu::util::DeviceExt;

use super::error::{Error, Result};

/// Storage buffers bound to the wavefront kernels (scene + frame groups).
pub const STORAGE_BUFFERS_PER_STAGE: u32 = 16;

/// Upper bound on sampled textures referenced by generated shading code.
pub const MAX_TEXTURE_SLOTS: u32 = 16;

/// Zero fill used when a storage buffer would otherwise be empty.
///
/// Runtime-sized arrays need at least one element bound; 256 bytes covers the
/// largest element type.
const EMPTY_FALLBACK: [u8; 256] = [0; 256];

/// Device, queue and adapter description.
pub struct GpuContext {
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
    pub adapter_info: wgpu::AdapterInfo,
}

impl GpuContext {
    /// Creates a device without a surface, for offline rendering and tools.
    #[tracing::instrument(skip_all)]
    pub fn new_headless() -> Result<Self> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::PRIMARY,
            ..Default::default()
        });

        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            compatible_surface: None,
            force_fallback_adapter: false,
        }))
        .map_err(|e| Error::gpu(format!("no suitable adapter: {e}")))?;

        Self::from_adapter(&adapter)
    }

    /// Requests a device on `adapter` with the limits the renderer needs.
    pub fn from_adapter(adapter: &wgpu::Adapter) -> Result<Self> {
        let supported = adapter.limits();
        if supported.max_storage_buffers_per_shader_stage < STORAGE_BUFFERS_PER_STAGE {
            return Err(Error::gpu(format!(
                "adapter supports {} storage buffers per stage, {} required",
                supported.max_storage_buffers_per_shader_stage, STORAGE_BUFFERS_PER_STAGE
            )));
        }

        let required_limits = wgpu::Limits {
            max_storage_buffers_per_shader_stage: STORAGE_BUFFERS_PER_STAGE,
            max_sampled_textures_per_shader_stage: supported
                .max_sampled_textures_per_shader_stage
                .min(MAX_TEXTURE_SLOTS + 1),
            max_storage_buffer_binding_size: supported.max_storage_buffer_binding_size,
            max_buffer_size: supported.max_buffer_size,
            max_compute_workgroups_per_dimension: supported.max_compute_workgroups_per_dimension,
            ..Default::default()
        };

        let (device, queue) = pollster::block_on(adapter.request_device(&wgpu::DeviceDescriptor {
            label: Some("wavetrace device"),
            required_features: wgpu::Features::empty(),
            required_limits,
            memory_hints: Default::default(),
            trace: Default::default(),
            experimental_features: Default::default(),
        }))
        .map_err(|e| Error::gpu(format!("device request failed: {e}")))?;

        let adapter_info = adapter.get_info();
        tracing::info!(
            adapter = %adapter_info.name,
            backend = ?adapter_info.backend,
            "GPU device ready"
        );

        Ok(Self {
            device,
            queue,
            adapter_info,
        })
    }
}

/// Runs `f` inside validation and out-of-memory error scopes.
///
/// Allocation and pipeline creation report failures asynchronously; this
/// turns them into an immediate `Err` for the caller.
pub fn error_scope<T>(device: &wgpu::Device, what: &str, f: impl FnOnce() -> T) -> Result<T> {
    device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);
    device.push_error_scope(wgpu::ErrorFilter::Validation);
    let value = f();
    let validation = pollster::block_on(device.pop_error_scope());
    let oom = pollster::block_on(device.pop_error_scope());
    if let Some(e) = oom {
        return Err(Error::OutOfMemory(format!("{what}: {e}")));
    }
    if let Some(e) = validation {
        return Err(Error::gpu(format!("{what}: {e}")));
    }
    Ok(value)
}

/// Storage buffer initialized from `bytes` (never zero-sized).
pub fn storage_buffer(
    device: &wgpu::Device,
    label: &str,
    bytes: &[u8],
    extra_usage: wgpu::BufferUsages,
) -> wgpu::Buffer {
    let contents = if bytes.is_empty() { &EMPTY_FALLBACK[..] } else { bytes };
    device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
        label: Some(label),
        contents,
        usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST | extra_usage,
    })
}

/// Uninitialized storage buffer of `size` bytes.
pub fn storage_buffer_sized(
    device: &wgpu::Device,
    label: &str,
    size: u64,
    extra_usage: wgpu::BufferUsages,
) -> wgpu::Buffer {
    device.create_buffer(&wgpu::BufferDescriptor {
        label: Some(label),
        size: size.max(EMPTY_FALLBACK.len() as u64),
        usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST | extra_usage,
        mapped_at_creation: false,
    })
}

/// Uniform buffer initialized from `bytes`.
pub fn uniform_buffer(device: &wgpu::Device, label: &str, bytes: &[u8]) -> wgpu::Buffer {
    device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
        label: Some(label),
        contents: bytes,
        usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
    })
}

/// Compute-stage storage buffer layout entry.
pub fn storage_entry(binding: u32, read_only: bool) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::COMPUTE,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Storage { read_only },
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

/// Compute-stage uniform buffer layout entry.
pub fn uniform_entry(binding: u32, dynamic: bool) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::COMPUTE,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Uniform,
            has_dynamic_offset: dynamic,
            min_binding_size: None,
        },
        count: None,
    }
}

/// Blocks until `buffer` is mapped, then copies its contents out.
pub fn read_buffer(device: &wgpu::Device, buffer: &wgpu::Buffer) -> Result<Vec<u8>> {
    let slice = buffer.slice(..);
    let (tx, rx) = std::sync::mpsc::channel();
    slice.map_async(wgpu::MapMode::Read, move |res| {
        let _ = tx.send(res);
    });
    device
        .poll(wgpu::PollType::wait_indefinitely())
        .map_err(|e| Error::gpu(format!("poll failed: {e}")))?;
    rx.recv()
        .map_err(|_| Error::gpu("map_async channel closed"))?
        .map_err(|e| Error::gpu(format!("buffer map failed: {e}")))?;
    let bytes = slice.get_mapped_range().to_vec();
    buffer.unmap();
    Ok(bytes)
}
