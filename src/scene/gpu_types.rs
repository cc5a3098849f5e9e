//! Device-side records, laid out to match the WGSL structs in
//! `wavefront.wgsl` and `envmap.wgsl`.
//!
//! Every struct is `#[repr(C)]` + `Pod` and padded by hand so that Rust and
//! WGSL agree on size and field offsets (vec3 fields are followed by a
//! scalar that fills their fourth lane).

use bytemuck::{Pod, Zeroable};
use glam::{Mat3, Mat4, Vec3};

/// Sentinel for "no light" in [`DeviceInstance::light`].
pub const NO_LIGHT: u32 = u32::MAX;

/// Light kinds; the light buffer is sorted in this order.
pub mod light_kind {
    pub const WORLD: u32 = 0;
    pub const AREA: u32 = 1;
    pub const POINT: u32 = 2;
    pub const SUN: u32 = 3;
    pub const SPOT: u32 = 4;
    pub const SHAPE: u32 = 5;
}

/// Bits of [`DeviceLight::flags`].
pub mod light_flags {
    pub const CAST_SHADOWS: u32 = 1;
    pub const USE_MIS: u32 = 2;
}

/// Ray categories; instance visibility masks use the same bits.
pub mod ray_flags {
    pub const CAMERA: u32 = 1;
    pub const REFLECTION: u32 = 2;
    pub const TRANSMISSION: u32 = 4;
    pub const SHADOW: u32 = 8;
    pub const VOLUME: u32 = 16;
    pub const DIFFUSE: u32 = 32;
    pub const GLOSSY: u32 = 64;
    pub const SINGULAR: u32 = 128;

    /// Visible to every ray category.
    pub const ALL: u32 = CAMERA | TRANSMISSION | SHADOW | VOLUME | DIFFUSE | GLOSSY;
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Pod, Zeroable)]
pub struct DeviceVertex {
    pub position: [f32; 3],
    pub u: f32,
    pub normal: [f32; 3],
    pub v: f32,
}

/// Triangle with global vertex indices and global material index.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Pod, Zeroable)]
pub struct DeviceFace {
    pub indices: [u32; 3],
    pub material: u32,
}

/// `mat3x3f` as WGSL stores it: three columns padded to 16 bytes.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Pod, Zeroable)]
pub struct DeviceMat3 {
    pub cols: [[f32; 4]; 3],
}

impl From<Mat3> for DeviceMat3 {
    fn from(m: Mat3) -> Self {
        let c = |v: Vec3| [v.x, v.y, v.z, 0.0];
        Self {
            cols: [c(m.x_axis), c(m.y_axis), c(m.z_axis)],
        }
    }
}

/// Per-instance data, indexed by the instance id the TLAS reports.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct DeviceInstance {
    pub object_to_world: [[f32; 4]; 4],
    pub world_to_object: [[f32; 4]; 4],
    /// Inverse transpose of the upper 3x3 of `object_to_world`.
    pub normal_matrix: DeviceMat3,
    pub bounds_min: [f32; 3],
    pub blas_root: u32,
    /// Reciprocal of the object-space bounds extent (0 on flat axes).
    pub bounds_inv_extent: [f32; 3],
    pub face_offset: u32,
    pub visibility: u32,
    pub light: u32,
    pub light_face_offset: u32,
    pub light_face_count: u32,
}

impl Default for DeviceInstance {
    fn default() -> Self {
        Self {
            object_to_world: Mat4::IDENTITY.to_cols_array_2d(),
            world_to_object: Mat4::IDENTITY.to_cols_array_2d(),
            normal_matrix: Mat3::IDENTITY.into(),
            bounds_min: [0.0; 3],
            blas_root: 0,
            bounds_inv_extent: [0.0; 3],
            face_offset: 0,
            visibility: ray_flags::ALL,
            light: NO_LIGHT,
            light_face_offset: 0,
            light_face_count: 0,
        }
    }
}

/// Light of any kind; unused fields stay zero.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Pod, Zeroable)]
pub struct DeviceLight {
    pub kind: u32,
    pub shader: u32,
    pub flags: u32,
    /// Instance of a shape light.
    pub instance: u32,
    pub position: [f32; 3],
    pub radius: f32,
    pub direction: [f32; 3],
    pub spot_size: f32,
    pub color: [f32; 3],
    pub spot_blend: f32,
    /// Half-extent vectors of an area light.
    pub axis_u: [f32; 3],
    pub cos_angle: f32,
    pub axis_v: [f32; 3],
    /// Full bounding area of an area light, total emissive area of a shape light.
    pub area: f32,
    pub face_offset: u32,
    pub face_count: u32,
    pub circular: u32,
    pub _pad0: u32,
}

impl DeviceLight {
    pub fn casts_shadows(&self) -> bool {
        self.flags & light_flags::CAST_SHADOWS != 0
    }

    pub fn uses_mis(&self) -> bool {
        self.flags & light_flags::USE_MIS != 0
    }
}

/// Scene-wide counts and env table addressing.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Pod, Zeroable)]
pub struct SceneUniforms {
    pub light_count: u32,
    pub area_count: u32,
    pub point_count: u32,
    pub sun_count: u32,
    pub spot_count: u32,
    pub shape_count: u32,
    pub instance_count: u32,
    pub env_exponent: u32,
    pub env_pdf_offset: u32,
    pub _pad: [u32; 3],
}

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct FrameUniforms {
    pub camera_to_world: [[f32; 4]; 4],
    pub width: u32,
    pub height: u32,
    pub frame_index: u32,
    pub max_depth: u32,
    pub focal: f32,
    pub shift_x: f32,
    pub shift_y: f32,
    pub exposure: f32,
    pub near: f32,
    pub far: f32,
    pub tonemapping: u32,
    pub sampling_mode: u32,
    pub rr_depth: u32,
    pub output_channel: u32,
    pub accumulate: u32,
    /// Frames accumulated including this one.
    pub samples: u32,
}

/// Per-stage values, bound with a dynamic offset.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Pod, Zeroable)]
pub struct PassUniforms {
    pub depth: u32,
    /// First element of the current ray half.
    pub current_base: u32,
    /// First element of the half receiving secondary rays.
    pub next_base: u32,
    /// Counter read by the dispatch-args kernel.
    pub counter_index: u32,
    /// Indirect argument slot written by the dispatch-args kernel.
    pub args_slot: u32,
    pub is_last: u32,
    pub _pad: [u32; 2],
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Pod, Zeroable)]
pub struct EnvBuildParams {
    pub resolution: u32,
    pub src_offset: u32,
    pub dst_offset: u32,
    pub shader: u32,
    pub pdf_offset: u32,
    pub total_offset: u32,
    pub samples: u32,
    pub _pad0: u32,
}

/// Byte sizes of the frame-local records (WGSL `Ray`, `ShadowRay`, `Hit`).
pub const RAY_SIZE: u64 = 64;
pub const SHADOW_RAY_SIZE: u64 = 48;
pub const HIT_SIZE: u64 = 24;

#[cfg(test)]
mod tests {
    use super::*;
    use std::mem::{offset_of, size_of};

    #[test]
    fn test_sizes_match_wgsl() {
        assert_eq!(size_of::<DeviceVertex>(), 32);
        assert_eq!(size_of::<DeviceFace>(), 16);
        assert_eq!(size_of::<DeviceMat3>(), 48);
        assert_eq!(size_of::<DeviceInstance>(), 224);
        assert_eq!(size_of::<DeviceLight>(), 112);
        assert_eq!(size_of::<SceneUniforms>(), 48);
        assert_eq!(size_of::<FrameUniforms>(), 128);
        assert_eq!(size_of::<PassUniforms>(), 32);
        assert_eq!(size_of::<EnvBuildParams>(), 32);
    }

    #[test]
    fn test_instance_offsets() {
        assert_eq!(offset_of!(DeviceInstance, normal_matrix), 128);
        assert_eq!(offset_of!(DeviceInstance, bounds_min), 176);
        assert_eq!(offset_of!(DeviceInstance, blas_root), 188);
        assert_eq!(offset_of!(DeviceInstance, face_offset), 204);
        assert_eq!(offset_of!(DeviceInstance, light_face_count), 220);
    }

    #[test]
    fn test_light_offsets() {
        assert_eq!(offset_of!(DeviceLight, position), 16);
        assert_eq!(offset_of!(DeviceLight, color), 48);
        assert_eq!(offset_of!(DeviceLight, area), 92);
        assert_eq!(offset_of!(DeviceLight, face_offset), 96);
    }

    #[test]
    fn test_mat3_padding() {
        let m = DeviceMat3::from(Mat3::from_cols(Vec3::X, Vec3::Y * 2.0, Vec3::Z * 3.0));
        assert_eq!(m.cols[1], [0.0, 2.0, 0.0, 0.0]);
        assert_eq!(m.cols[2][3], 0.0);
    }
}
