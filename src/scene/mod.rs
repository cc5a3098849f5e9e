//! Scene assembly.
//!
//! Parsed records go through the builders in a fixed order, each later stage
//! borrowing the finished tables of the earlier ones:
//!
//! ```text
//! MaterialBuilder -> ShapeBuilder -> LightBuilder -> EntityBuilder
//! ```
//!
//! [`SceneLoader::assemble`] runs the whole chain on the CPU and returns a
//! [`SceneAssembly`]; [`SceneLoader::load`] additionally compiles the shading
//! library, uploads every buffer and builds the environment importance table,
//! producing the immutable [`Scene`] handle the renderer consumes.

mod entity;
mod envmap;
pub mod gpu_types;
mod light;
mod loader;
mod material;
mod mesh;
mod ply;
mod shape;
mod upload;

use glam::{Mat4, Vec3};
use serde::{Deserialize, Serialize};

pub use entity::{BuiltEntities, EntityBuilder};
pub use envmap::{EnvLayout, EnvironmentTable};
pub use gpu_types::*;
pub use light::{LightBuilder, LightTables, ShapeLightSlot};
pub use loader::{SceneAssembly, SceneDescription, SceneLoader, SceneRecords};
pub use material::MaterialBuilder;
pub use mesh::{MemoryMeshSource, MeshHeader, MeshSource};
pub use ply::PlyMeshSource;
pub use shape::{BuiltShapes, ShapeBuilder, ShapeInfo};
pub use upload::{Scene, SceneArrays, SceneBindings, SceneBuffers, TextureBindings};

/// Triangle mesh file plus its material palette.
#[derive(Debug, Clone, PartialEq)]
pub struct ShapeRecord {
    pub name: String,
    pub path: std::path::PathBuf,
    /// Palette; per-face material indices address this list.
    pub materials: Vec<String>,
}

/// Placement of one shape.
#[derive(Debug, Clone, PartialEq)]
pub struct EntityRecord {
    pub name: String,
    pub shape: String,
    /// Ray categories the instance is visible to (`ray_flags` bits).
    pub visibility: u32,
    pub transform: Mat4,
}

/// Kernel-specific light parameters.
#[derive(Debug, Clone, PartialEq)]
pub enum LightKind {
    World,
    /// Emits along the transform's -Z from a `size`-sized rectangle or disk
    /// in its XY plane.
    Area {
        transform: Mat4,
        size: [f32; 2],
        power: f32,
        color: Vec3,
        circular: bool,
    },
    Point {
        position: Vec3,
        power: f32,
        color: Vec3,
        radius: f32,
    },
    Spot {
        position: Vec3,
        direction: Vec3,
        power: f32,
        color: Vec3,
        radius: f32,
        /// Full cone angle in radians.
        spot_size: f32,
        spot_blend: f32,
    },
    Sun {
        direction: Vec3,
        power: f32,
        color: Vec3,
        /// Angular diameter in radians.
        angle: f32,
    },
}

impl LightKind {
    /// Position in the light buffer ordering.
    pub fn order(&self) -> u32 {
        match self {
            LightKind::World => light_kind::WORLD,
            LightKind::Area { .. } => light_kind::AREA,
            LightKind::Point { .. } => light_kind::POINT,
            LightKind::Sun { .. } => light_kind::SUN,
            LightKind::Spot { .. } => light_kind::SPOT,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            LightKind::World => "world",
            LightKind::Area { .. } => "area",
            LightKind::Point { .. } => "point",
            LightKind::Sun { .. } => "sun",
            LightKind::Spot { .. } => "spot",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LightRecord {
    pub name: String,
    /// Light shader (a graph in the material library).
    pub material: String,
    pub cast_shadows: bool,
    pub use_mis: bool,
    pub kind: LightKind,
}

/// Camera as exported.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraRecord {
    /// Column-major camera-to-world matrix.
    pub transform: [f32; 16],
    pub near_clip: f32,
    pub far_clip: f32,
    pub focal_length: Option<f32>,
    /// Film size in millimeters.
    pub film: [f32; 2],
    pub shift: [f32; 2],
}

impl Default for CameraRecord {
    fn default() -> Self {
        Self {
            transform: Mat4::IDENTITY.to_cols_array(),
            near_clip: 0.1,
            far_clip: 100.0,
            focal_length: None,
            film: [36.0, 24.0],
            shift: [0.0, 0.0],
        }
    }
}

/// Pinhole camera; looks down -Z of `transform`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Camera {
    pub transform: Mat4,
    pub near: f32,
    pub far: f32,
    /// Focal length relative to half the film width.
    pub focal: f32,
    pub shift: [f32; 2],
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            transform: Mat4::IDENTITY,
            near: 0.1,
            far: 100.0,
            focal: 2.5,
            shift: [0.0, 0.0],
        }
    }
}

impl From<&CameraRecord> for Camera {
    fn from(record: &CameraRecord) -> Self {
        let focal_length = record.focal_length.unwrap_or(50.0);
        let half_film = (record.film[0] * 0.5).max(f32::EPSILON);
        Self {
            transform: Mat4::from_cols_array(&record.transform),
            near: record.near_clip,
            far: record.far_clip,
            focal: focal_length / half_film,
            shift: record.shift,
        }
    }
}

impl Camera {
    /// Start offset and length of a primary ray along unit camera-space
    /// `direction`, as traced on the device.
    ///
    /// The ray starts where it crosses the near plane and ends `far` from
    /// the eye.
    pub fn ray_interval(&self, direction: Vec3) -> (f32, f32) {
        let start = self.near / (-direction.z).max(1e-6);
        (start, (self.far - start).max(0.0))
    }

    /// Applies a user interaction: `transform = transform * m^T`.
    pub fn update_projection(&mut self, m: Mat4) {
        self.transform *= m.transpose();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_camera_from_record() {
        let record = CameraRecord {
            focal_length: Some(36.0),
            film: [36.0, 24.0],
            shift: [0.1, 0.0],
            ..Default::default()
        };
        let camera = Camera::from(&record);
        assert!((camera.focal - 2.0).abs() < 1e-6);
        assert_eq!(camera.shift, [0.1, 0.0]);

        let camera = Camera::from(&CameraRecord::default());
        assert!((camera.focal - 50.0 / 18.0).abs() < 1e-6);
    }

    #[test]
    fn test_primary_ray_ends_at_far_from_eye() {
        let camera = Camera {
            near: 1.0,
            far: 10.0,
            ..Default::default()
        };
        let (start, length) = camera.ray_interval(-Vec3::Z);
        assert_eq!((start, length), (1.0, 9.0));

        let oblique = Vec3::new(1.0, 0.0, -1.0).normalize();
        let (start, length) = camera.ray_interval(oblique);
        assert!((start - std::f32::consts::SQRT_2).abs() < 1e-5);
        assert!((start + length - 10.0).abs() < 1e-5);

        let clipped = Camera { near: 5.0, far: 2.0, ..camera };
        assert_eq!(clipped.ray_interval(-Vec3::Z).1, 0.0);
    }

    #[test]
    fn test_update_projection_transposes() {
        let mut camera = Camera::default();
        let m = Mat4::from_translation(Vec3::new(1.0, 2.0, 3.0));
        camera.update_projection(m);
        assert_eq!(camera.transform, m.transpose());
    }

    #[test]
    fn test_light_order() {
        assert!(LightKind::World.order() < LightKind::Sun {
            direction: Vec3::Z,
            power: 1.0,
            color: Vec3::ONE,
            angle: 0.0
        }
        .order());
    }
}
