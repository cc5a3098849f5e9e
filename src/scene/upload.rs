//! Device-side scene: buffers, bind groups and the compiled shading library.

use wgpu::util::DeviceExt;

use super::gpu_types::SceneUniforms;
use super::Camera;
use crate::codegen::TextureData;
use crate::util::{storage_buffer, storage_entry, uniform_buffer, uniform_entry, MAX_TEXTURE_SLOTS};

/// Immutable scene storage bound at group 0.
pub struct SceneBuffers {
    pub bvh_nodes: wgpu::Buffer,
    pub bvh_primitives: wgpu::Buffer,
    pub vertices: wgpu::Buffer,
    pub faces: wgpu::Buffer,
    pub instances: wgpu::Buffer,
    pub lights: wgpu::Buffer,
    pub light_faces: wgpu::Buffer,
    pub env_table: wgpu::Buffer,
    pub uniforms: wgpu::Buffer,
}

/// CPU arrays handed to [`SceneBuffers::upload`].
pub struct SceneArrays<'a> {
    pub bvh_nodes: &'a [u8],
    pub bvh_primitives: &'a [u8],
    pub vertices: &'a [u8],
    pub faces: &'a [u8],
    pub instances: &'a [u8],
    pub lights: &'a [u8],
    pub light_faces: &'a [u8],
}

impl SceneBuffers {
    /// Uploads every array; `env_table` is produced separately on the device.
    pub fn upload(
        device: &wgpu::Device,
        arrays: &SceneArrays<'_>,
        env_table: wgpu::Buffer,
        uniforms: &SceneUniforms,
    ) -> Self {
        let none = wgpu::BufferUsages::empty();
        Self {
            bvh_nodes: storage_buffer(device, "bvh_nodes", arrays.bvh_nodes, none),
            bvh_primitives: storage_buffer(device, "bvh_primitives", arrays.bvh_primitives, none),
            vertices: storage_buffer(device, "vertices", arrays.vertices, none),
            faces: storage_buffer(device, "faces", arrays.faces, none),
            instances: storage_buffer(device, "instances", arrays.instances, none),
            lights: storage_buffer(device, "lights", arrays.lights, none),
            light_faces: storage_buffer(device, "light_faces", arrays.light_faces, none),
            env_table,
            uniforms: uniform_buffer(device, "scene_uniforms", bytemuck::bytes_of(uniforms)),
        }
    }

    /// Bytes held on the device.
    pub fn size(&self) -> u64 {
        [
            &self.bvh_nodes,
            &self.bvh_primitives,
            &self.vertices,
            &self.faces,
            &self.instances,
            &self.lights,
            &self.light_faces,
            &self.env_table,
            &self.uniforms,
        ]
        .iter()
        .map(|b| b.size())
        .sum()
    }
}

/// Group 0 (scene) and group 1 (textures) layouts and bind groups.
pub struct SceneBindings {
    pub scene_layout: wgpu::BindGroupLayout,
    pub scene_group: wgpu::BindGroup,
    pub texture_layout: wgpu::BindGroupLayout,
    pub texture_group: wgpu::BindGroup,
    #[allow(dead_code)] // kept alive for the texture views
    textures: Vec<wgpu::Texture>,
}

pub fn scene_layout(device: &wgpu::Device) -> wgpu::BindGroupLayout {
    let mut entries: Vec<_> = (0..8).map(|binding| storage_entry(binding, true)).collect();
    entries.push(uniform_entry(8, false));
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some("scene_layout"),
        entries: &entries,
    })
}

/// Samplers at bindings 0 and 1, then one sampled texture per slot.
pub fn texture_layout(device: &wgpu::Device, slots: u32) -> wgpu::BindGroupLayout {
    let mut entries = vec![
        wgpu::BindGroupLayoutEntry {
            binding: 0,
            visibility: wgpu::ShaderStages::COMPUTE,
            ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
            count: None,
        },
        wgpu::BindGroupLayoutEntry {
            binding: 1,
            visibility: wgpu::ShaderStages::COMPUTE,
            ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::NonFiltering),
            count: None,
        },
    ];
    for slot in 0..slots {
        entries.push(wgpu::BindGroupLayoutEntry {
            binding: slot + 2,
            visibility: wgpu::ShaderStages::COMPUTE,
            ty: wgpu::BindingType::Texture {
                sample_type: wgpu::TextureSampleType::Float { filterable: true },
                view_dimension: wgpu::TextureViewDimension::D2,
                multisampled: false,
            },
            count: None,
        });
    }
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some("texture_layout"),
        entries: &entries,
    })
}

/// Slots the generated header declares: at least one, at most the limit.
pub fn bound_texture_slots(textures: &[TextureData]) -> u32 {
    (textures.len() as u32).clamp(1, MAX_TEXTURE_SLOTS)
}

fn upload_texture(device: &wgpu::Device, queue: &wgpu::Queue, slot: usize, data: &TextureData) -> wgpu::Texture {
    device.create_texture_with_data(
        queue,
        &wgpu::TextureDescriptor {
            label: Some(&format!("scene_texture_{slot}")),
            size: wgpu::Extent3d {
                width: data.width.max(1),
                height: data.height.max(1),
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba16Float,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        },
        wgpu::util::TextureDataOrder::LayerMajor,
        data.as_bytes(),
    )
}

impl SceneBindings {
    /// Uploads `textures` and creates the texture group.
    ///
    /// The scene group is created afterwards by [`SceneBindings::bind_scene`]
    /// because the environment table is built with the textures alone.
    pub fn textures(device: &wgpu::Device, queue: &wgpu::Queue, textures: &[TextureData]) -> TextureBindings {
        let slots = bound_texture_slots(textures);
        let layout = texture_layout(device, slots);

        let mut uploaded: Vec<wgpu::Texture> = textures
            .iter()
            .take(slots as usize)
            .enumerate()
            .map(|(slot, data)| upload_texture(device, queue, slot, data))
            .collect();
        if uploaded.is_empty() {
            uploaded.push(upload_texture(device, queue, 0, &TextureData::solid([0.0; 4])));
        }
        let views: Vec<wgpu::TextureView> = uploaded
            .iter()
            .map(|t| t.create_view(&wgpu::TextureViewDescriptor::default()))
            .collect();

        let linear = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("linear_sampler"),
            address_mode_u: wgpu::AddressMode::Repeat,
            address_mode_v: wgpu::AddressMode::Repeat,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });
        let nearest = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("nearest_sampler"),
            address_mode_u: wgpu::AddressMode::Repeat,
            address_mode_v: wgpu::AddressMode::Repeat,
            mag_filter: wgpu::FilterMode::Nearest,
            min_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });

        let mut entries = vec![
            wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::Sampler(&linear),
            },
            wgpu::BindGroupEntry {
                binding: 1,
                resource: wgpu::BindingResource::Sampler(&nearest),
            },
        ];
        for (slot, view) in views.iter().enumerate() {
            entries.push(wgpu::BindGroupEntry {
                binding: slot as u32 + 2,
                resource: wgpu::BindingResource::TextureView(view),
            });
        }
        let group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("texture_group"),
            layout: &layout,
            entries: &entries,
        });

        TextureBindings {
            layout,
            group,
            textures: uploaded,
        }
    }

    pub fn bind_scene(device: &wgpu::Device, textures: TextureBindings, buffers: &SceneBuffers) -> Self {
        let scene_layout = scene_layout(device);
        let storage = [
            &buffers.bvh_nodes,
            &buffers.bvh_primitives,
            &buffers.vertices,
            &buffers.faces,
            &buffers.instances,
            &buffers.lights,
            &buffers.light_faces,
            &buffers.env_table,
            &buffers.uniforms,
        ];
        let entries: Vec<wgpu::BindGroupEntry> = storage
            .iter()
            .enumerate()
            .map(|(binding, buffer)| wgpu::BindGroupEntry {
                binding: binding as u32,
                resource: buffer.as_entire_binding(),
            })
            .collect();
        let scene_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("scene_group"),
            layout: &scene_layout,
            entries: &entries,
        });
        Self {
            scene_layout,
            scene_group,
            texture_layout: textures.layout,
            texture_group: textures.group,
            textures: textures.textures,
        }
    }
}

/// Texture half of [`SceneBindings`], available before the scene buffers.
pub struct TextureBindings {
    pub layout: wgpu::BindGroupLayout,
    pub group: wgpu::BindGroup,
    textures: Vec<wgpu::Texture>,
}

/// Immutable GPU scene consumed by the renderer.
pub struct Scene {
    pub module: wgpu::ShaderModule,
    /// Generated WGSL, kept for diagnostics.
    pub source: String,
    pub bindings: SceneBindings,
    pub buffers: SceneBuffers,
    pub uniforms: SceneUniforms,
    pub camera: Camera,
    pub surfaces: Vec<String>,
    pub lights: Vec<String>,
}

impl Scene {
    pub fn instance_count(&self) -> u32 {
        self.uniforms.instance_count
    }

    pub fn light_count(&self) -> u32 {
        self.uniforms.light_count
    }

    pub fn env_exponent(&self) -> u32 {
        self.uniforms.env_exponent
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bound_slots() {
        assert_eq!(bound_texture_slots(&[]), 1);
        let many = vec![TextureData::solid([1.0; 4]); 20];
        assert_eq!(bound_texture_slots(&many), MAX_TEXTURE_SLOTS);
        assert_eq!(bound_texture_slots(&many[..3]), 3);
    }
}
