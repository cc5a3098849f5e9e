//! Scene description parsing and the assembly pipeline.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use glam::{Mat4, Vec3};
use serde::Deserialize;
use shader_graph::NodeGraph;

use super::entity::{BuiltEntities, EntityBuilder};
use super::envmap;
use super::gpu_types::ray_flags;
use super::light::{LightBuilder, LightTables};
use super::material::MaterialBuilder;
use super::mesh::MeshSource;
use super::ply::PlyMeshSource;
use super::shape::{BuiltShapes, ShapeBuilder};
use super::upload::{Scene, SceneArrays, SceneBindings, SceneBuffers};
use super::{Camera, CameraRecord, EntityRecord, LightKind, LightRecord, ShapeRecord};
use crate::codegen::{ImageFileLoader, TextureLoader, WgpuCompiler};
use crate::settings::RenderSettings;
use crate::util::{Error, GpuContext, Result};

/// Jittered world shader evaluations per finest environment cell.
const ENV_BUILD_SAMPLES: u32 = 4;

/// Parsed scene, ready for assembly.
#[derive(Debug, Clone, Default)]
pub struct SceneRecords {
    pub materials: BTreeMap<String, NodeGraph>,
    pub shapes: Vec<ShapeRecord>,
    pub entities: Vec<EntityRecord>,
    pub lights: Vec<LightRecord>,
    pub camera: Option<CameraRecord>,
}

fn yes() -> bool {
    true
}

/// Ray visibility as exported; every category defaults to visible.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
struct VisibilityDescription {
    camera: bool,
    diffuse: bool,
    glossy: bool,
    transmission: bool,
    volume: bool,
    shadow: bool,
}

impl Default for VisibilityDescription {
    fn default() -> Self {
        Self {
            camera: true,
            diffuse: true,
            glossy: true,
            transmission: true,
            volume: true,
            shadow: true,
        }
    }
}

impl VisibilityDescription {
    fn mask(&self) -> u32 {
        [
            (self.camera, ray_flags::CAMERA),
            (self.diffuse, ray_flags::DIFFUSE),
            (self.glossy, ray_flags::GLOSSY),
            (self.transmission, ray_flags::TRANSMISSION),
            (self.volume, ray_flags::VOLUME),
            (self.shadow, ray_flags::SHADOW),
        ]
        .iter()
        .filter(|(visible, _)| *visible)
        .fold(0, |mask, (_, flag)| mask | flag)
    }
}

#[derive(Debug, Clone, Deserialize)]
struct ShapeDescription {
    #[serde(rename = "type", default = "ply_type")]
    kind: String,
    filepath: PathBuf,
    #[serde(default)]
    materials: Vec<String>,
}

fn ply_type() -> String {
    "ply".to_string()
}

#[derive(Debug, Clone, Deserialize)]
struct EntityDescription {
    shape: String,
    #[serde(default)]
    visibility: VisibilityDescription,
    /// Row-major object-to-world matrix.
    matrix: [f32; 16],
}

#[derive(Debug, Clone, Deserialize)]
struct LightDescription {
    #[serde(rename = "type")]
    kind: String,
    material: String,
    #[serde(default = "yes")]
    cast_shadows: bool,
    #[serde(default)]
    use_mis: bool,
    #[serde(default)]
    parameters: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct AreaParameters {
    /// Row-major.
    transform: [f32; 16],
    #[serde(default = "unit_size")]
    size: [f32; 2],
    power: f32,
    color: [f32; 3],
    #[serde(default)]
    is_circular: bool,
}

fn unit_size() -> [f32; 2] {
    [1.0, 1.0]
}

#[derive(Debug, Deserialize)]
struct PointParameters {
    location: [f32; 3],
    power: f32,
    color: [f32; 3],
    #[serde(default)]
    radius: f32,
}

#[derive(Debug, Deserialize)]
struct SpotParameters {
    location: [f32; 3],
    direction: [f32; 3],
    power: f32,
    color: [f32; 3],
    #[serde(default)]
    radius: f32,
    spot_size: f32,
    #[serde(default)]
    spot_blend: f32,
}

#[derive(Debug, Deserialize)]
struct SunParameters {
    direction: [f32; 3],
    power: f32,
    color: [f32; 3],
    #[serde(default)]
    angle: f32,
}

#[derive(Debug, Clone, Copy, Deserialize)]
struct FilmDescription {
    width: f32,
    #[serde(default)]
    height: f32,
}

#[derive(Debug, Clone, Deserialize)]
struct CameraDescription {
    #[serde(default)]
    near_clip: Option<f32>,
    #[serde(default)]
    far_clip: Option<f32>,
    #[serde(default)]
    film: Option<FilmDescription>,
    #[serde(default)]
    focal_length: Option<f32>,
    /// Row-major camera-to-world matrix.
    #[serde(default)]
    transform: Option<[f32; 16]>,
}

fn row_major(m: &[f32; 16]) -> Mat4 {
    Mat4::from_cols_array(m).transpose()
}

/// Scene file as written by the exporter.
///
/// ```json
/// {
///   "materials": { "<name>": { "<node>": { "type": "...", "inputs": {}, "parameters": {} } } },
///   "world": { "<node>": { ... } },
///   "lights": { "<name>": { "type": "POINT", "material": "<name>", "parameters": { ... } } },
///   "shapes": { "<name>": { "type": "ply", "filepath": "meshes/a.ply", "materials": ["<name>"] } },
///   "entities": { "<name>": { "shape": "<name>", "visibility": { ... }, "matrix": [16 floats] } },
///   "camera": { "near_clip": 0.1, "far_clip": 100, "film": { "width": 36 }, "focal_length": 50, "transform": [16 floats] }
/// }
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SceneDescription {
    #[serde(default)]
    materials: BTreeMap<String, NodeGraph>,
    /// Older exports carry the world shader here instead of a `WORLD` light.
    #[serde(default)]
    world: Option<NodeGraph>,
    #[serde(default)]
    lights: BTreeMap<String, LightDescription>,
    #[serde(default)]
    shapes: BTreeMap<String, ShapeDescription>,
    #[serde(default)]
    entities: BTreeMap<String, EntityDescription>,
    #[serde(default)]
    camera: Option<CameraDescription>,
}

impl SceneDescription {
    pub fn parse(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// Reads `path` and resolves it against its own directory.
    pub fn from_path(path: &Path) -> Result<SceneRecords> {
        let text = std::fs::read_to_string(path)?;
        let base = path.parent().unwrap_or(Path::new("."));
        Self::parse(&text)?.into_records(base)
    }

    /// Converts to records; relative mesh paths are joined onto `base`.
    pub fn into_records(self, base: &Path) -> Result<SceneRecords> {
        let mut materials = self.materials;
        let first_material = materials.keys().next().cloned();

        let mut shapes = Vec::with_capacity(self.shapes.len());
        for (name, shape) in self.shapes {
            if !shape.kind.eq_ignore_ascii_case("ply") {
                return Err(Error::other(format!(
                    "shape '{name}' has unsupported type '{}'",
                    shape.kind
                )));
            }
            let mut palette = shape.materials;
            if palette.is_empty() {
                let Some(fallback) = first_material.clone() else {
                    return Err(Error::MissingMaterial(format!("palette of shape '{name}'")));
                };
                tracing::warn!(shape = %name, material = %fallback, "shape has no materials, assigning one");
                palette.push(fallback);
            }
            let path = if shape.filepath.is_relative() {
                base.join(&shape.filepath)
            } else {
                shape.filepath
            };
            shapes.push(ShapeRecord {
                name,
                path,
                materials: palette,
            });
        }

        let entities = self
            .entities
            .into_iter()
            .map(|(name, entity)| EntityRecord {
                name,
                shape: entity.shape,
                visibility: entity.visibility.mask(),
                transform: row_major(&entity.matrix),
            })
            .collect();

        let mut lights = self
            .lights
            .into_iter()
            .map(|(name, light)| light_record(name, light))
            .collect::<Result<Vec<_>>>()?;

        if let Some(world) = self.world {
            if lights.iter().any(|l| l.kind == LightKind::World) {
                tracing::warn!("scene has both a world graph and a WORLD light, ignoring the graph");
            } else {
                let mut material = "World".to_string();
                let mut suffix = 1;
                while materials.contains_key(&material) {
                    material = format!("World.{suffix:03}");
                    suffix += 1;
                }
                materials.insert(material.clone(), world);
                lights.push(LightRecord {
                    name: "World".to_string(),
                    material,
                    cast_shadows: true,
                    use_mis: true,
                    kind: LightKind::World,
                });
            }
        }

        let camera = self.camera.map(|camera| {
            let defaults = CameraRecord::default();
            CameraRecord {
                transform: camera
                    .transform
                    .map(|m| row_major(&m).to_cols_array())
                    .unwrap_or(defaults.transform),
                near_clip: camera.near_clip.unwrap_or(defaults.near_clip),
                far_clip: camera.far_clip.unwrap_or(defaults.far_clip),
                focal_length: camera.focal_length,
                film: camera
                    .film
                    .map(|f| [f.width, f.height])
                    .unwrap_or(defaults.film),
                shift: defaults.shift,
            }
        });

        Ok(SceneRecords {
            materials,
            shapes,
            entities,
            lights,
            camera,
        })
    }
}

fn parameters<T: serde::de::DeserializeOwned>(name: &str, value: serde_json::Value) -> Result<T> {
    serde_json::from_value(value).map_err(|e| Error::other(format!("light '{name}': {e}")))
}

fn light_record(name: String, light: LightDescription) -> Result<LightRecord> {
    let kind = match light.kind.to_ascii_uppercase().as_str() {
        "WORLD" => LightKind::World,
        "AREA" => {
            let p: AreaParameters = parameters(&name, light.parameters)?;
            LightKind::Area {
                transform: row_major(&p.transform),
                size: p.size,
                power: p.power,
                color: Vec3::from_array(p.color),
                circular: p.is_circular,
            }
        }
        "POINT" => {
            let p: PointParameters = parameters(&name, light.parameters)?;
            LightKind::Point {
                position: Vec3::from_array(p.location),
                power: p.power,
                color: Vec3::from_array(p.color),
                radius: p.radius,
            }
        }
        "SPOT" => {
            let p: SpotParameters = parameters(&name, light.parameters)?;
            LightKind::Spot {
                position: Vec3::from_array(p.location),
                direction: Vec3::from_array(p.direction),
                power: p.power,
                color: Vec3::from_array(p.color),
                radius: p.radius,
                spot_size: p.spot_size,
                spot_blend: p.spot_blend,
            }
        }
        "SUN" => {
            let p: SunParameters = parameters(&name, light.parameters)?;
            LightKind::Sun {
                direction: Vec3::from_array(p.direction),
                power: p.power,
                color: Vec3::from_array(p.color),
                angle: p.angle,
            }
        }
        other => {
            return Err(Error::other(format!("light '{name}' has unknown type '{other}'")));
        }
    };
    Ok(LightRecord {
        name,
        material: light.material,
        cast_shadows: light.cast_shadows,
        use_mis: light.use_mis,
        kind,
    })
}

/// Output of the CPU half of scene loading.
pub struct SceneAssembly {
    pub materials: MaterialBuilder,
    pub shapes: BuiltShapes,
    pub entities: BuiltEntities,
    pub lights: LightTables,
    pub camera: Camera,
}

/// Runs the builders over [`SceneRecords`] and uploads the result.
pub struct SceneLoader {
    meshes: Box<dyn MeshSource>,
    textures: Box<dyn TextureLoader>,
}

impl SceneLoader {
    /// PLY meshes and image files, resolved against `base`.
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self {
            meshes: Box::new(PlyMeshSource::new()),
            textures: Box::new(ImageFileLoader::new(base)),
        }
    }

    pub fn with_sources(meshes: Box<dyn MeshSource>, textures: Box<dyn TextureLoader>) -> Self {
        Self { meshes, textures }
    }

    /// Material, shape, light and entity stages, all on the CPU.
    ///
    /// Entities register their shapes (and those the surface materials) on
    /// first reference, so unreferenced shapes are never loaded.
    #[tracing::instrument(skip_all, fields(
        shapes = records.shapes.len(),
        entities = records.entities.len(),
        lights = records.lights.len()
    ))]
    pub fn assemble(&self, records: &SceneRecords) -> Result<SceneAssembly> {
        let mut materials = MaterialBuilder::new(records.materials.clone());
        let mut shapes = ShapeBuilder::new(&records.shapes, self.meshes.as_ref());
        let entities = EntityBuilder::new(&records.entities, &mut shapes, &mut materials)?;
        let mut lights = LightBuilder::new(&records.lights, &mut materials)?;

        let shapes = shapes.build()?;
        let built_entities = entities.build(&shapes, &mut lights);
        let emissive = materials.emissive_surfaces();
        let mut tables = lights.build(&shapes, &emissive);
        tables.uniforms.instance_count = built_entities.instances.len() as u32;

        let camera = records.camera.as_ref().map(Camera::from).unwrap_or_default();
        tracing::info!(
            surfaces = materials.surface_count(),
            instances = built_entities.instances.len(),
            lights = tables.lights.len(),
            "scene assembled"
        );
        Ok(SceneAssembly {
            materials,
            shapes,
            entities: built_entities,
            lights: tables,
            camera,
        })
    }

    /// Assembles, compiles the shading library and uploads everything.
    #[tracing::instrument(skip_all)]
    pub fn load(&self, ctx: &GpuContext, records: &SceneRecords, settings: &RenderSettings) -> Result<Scene> {
        let assembly = self.assemble(records)?;
        upload(ctx, assembly, self.textures.as_ref(), settings.envmap_exponent)
    }
}

fn upload(
    ctx: &GpuContext,
    assembly: SceneAssembly,
    texture_loader: &dyn TextureLoader,
    env_exponent: u32,
) -> Result<Scene> {
    let SceneAssembly {
        materials,
        shapes,
        entities,
        lights,
        camera,
    } = assembly;

    let max_texture_dimension = ctx.device.limits().max_texture_dimension_2d;
    let library = materials
        .into_codegen()
        .build(texture_loader, max_texture_dimension, &WgpuCompiler::new(&ctx.device))?;
    let textures = crate::util::error_scope(&ctx.device, "scene textures", || {
        SceneBindings::textures(&ctx.device, &ctx.queue, &library.textures)
    })?;

    let env_table = envmap::build_on_device(
        ctx,
        &library.library,
        &textures.layout,
        &textures.group,
        lights.world_shader,
        env_exponent,
        ENV_BUILD_SAMPLES,
    )?;

    let layout = envmap::EnvLayout::new(env_exponent);
    let mut uniforms = lights.uniforms;
    uniforms.env_exponent = env_exponent;
    uniforms.env_pdf_offset = layout.pdf_offset() as u32;

    let arrays = SceneArrays {
        bvh_nodes: bytemuck::cast_slice(&entities.accel.nodes),
        bvh_primitives: bytemuck::cast_slice(&entities.accel.primitives),
        vertices: bytemuck::cast_slice(&shapes.vertices),
        faces: bytemuck::cast_slice(&shapes.faces),
        instances: bytemuck::cast_slice(&entities.instances),
        lights: bytemuck::cast_slice(&lights.lights),
        light_faces: bytemuck::cast_slice(&lights.light_faces),
    };
    let buffers = crate::util::error_scope(&ctx.device, "scene buffers", || {
        SceneBuffers::upload(&ctx.device, &arrays, env_table, &uniforms)
    })?;
    let bindings = SceneBindings::bind_scene(&ctx.device, textures, &buffers);
    tracing::info!(bytes = buffers.size(), "scene uploaded");

    Ok(Scene {
        module: library.library,
        source: library.source,
        bindings,
        buffers,
        uniforms,
        camera,
        surfaces: library.surfaces,
        lights: library.lights,
    })
}
