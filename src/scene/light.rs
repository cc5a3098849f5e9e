//! Light tables for next-event estimation.
//!
//! All lights share one device buffer, sorted by kind (world first, then
//! area, point, sun, spot and shape lights). Shaders pick a light uniformly
//! over the whole buffer, so the per-kind counts in [`SceneUniforms`] only
//! describe the layout. Shape lights sample their emissive triangles through
//! a per-light cumulative area distribution stored in one shared buffer.

use glam::{Mat3, Mat4};

use super::gpu_types::{light_flags, light_kind, DeviceLight, SceneUniforms};
use super::material::MaterialBuilder;
use super::shape::BuiltShapes;
use super::{LightKind, LightRecord};
use crate::codegen::MaterialType;
use crate::util::{Error, Result};

/// Where a registered shape light lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShapeLightSlot {
    /// Index into the light buffer.
    pub light: u32,
    /// First element of the light's range in the light-face buffer.
    pub face_offset: u32,
    pub face_count: u32,
}

#[derive(Debug, Clone)]
struct ShapeLight {
    instance: u32,
    shape: u32,
    object_to_world: Mat4,
    slot: ShapeLightSlot,
}

/// Finished light data ready for upload.
#[derive(Debug, Clone, Default)]
pub struct LightTables {
    pub lights: Vec<DeviceLight>,
    /// Normalized cumulative face areas, one range per shape light.
    pub light_faces: Vec<f32>,
    /// Counts only; env table fields are filled in when it is built.
    pub uniforms: SceneUniforms,
    /// Light-table index of the world shader.
    pub world_shader: u32,
}

pub struct LightBuilder {
    /// Non-shape lights in buffer order.
    lights: Vec<DeviceLight>,
    counts: [u32; 5],
    shape_lights: Vec<ShapeLight>,
    light_face_total: u32,
}

impl LightBuilder {
    /// Resolves every light shader and derives device parameters.
    ///
    /// Fails unless exactly one world light is present.
    pub fn new(records: &[LightRecord], materials: &mut MaterialBuilder) -> Result<Self> {
        let worlds = records
            .iter()
            .filter(|r| matches!(r.kind, LightKind::World))
            .count();
        match worlds {
            0 => return Err(Error::MissingWorldLight),
            1 => {}
            n => return Err(Error::MultipleWorldLights(n)),
        }

        let mut sorted: Vec<&LightRecord> = records.iter().collect();
        sorted.sort_by(|a, b| a.kind.order().cmp(&b.kind.order()).then_with(|| a.name.cmp(&b.name)));

        let mut lights = Vec::with_capacity(sorted.len());
        let mut counts = [0u32; 5];
        for record in sorted {
            let shader = materials.index(MaterialType::Light, &record.material)?;
            let light = device_light(record, shader);
            counts[record.kind.order() as usize] += 1;
            lights.push(light);
        }

        Ok(Self {
            lights,
            counts,
            shape_lights: Vec::new(),
            light_face_total: 0,
        })
    }

    /// Registers an emissive instance and assigns its light index and
    /// light-face range.
    pub fn add_shape_light(
        &mut self,
        instance: u32,
        shape: u32,
        face_count: u32,
        object_to_world: Mat4,
    ) -> ShapeLightSlot {
        let slot = ShapeLightSlot {
            light: (self.lights.len() + self.shape_lights.len()) as u32,
            face_offset: self.light_face_total,
            face_count,
        };
        self.light_face_total += face_count;
        self.shape_lights.push(ShapeLight {
            instance,
            shape,
            object_to_world,
            slot,
        });
        slot
    }

    /// Total number of sampleable lights, world included.
    pub fn light_count(&self) -> u32 {
        (self.lights.len() + self.shape_lights.len()) as u32
    }

    /// Builds the shape-light distributions and the final light buffer.
    ///
    /// `emissive` holds one flag per surface index.
    #[tracing::instrument(skip_all, fields(lights = self.light_count()))]
    pub fn build(self, shapes: &BuiltShapes, emissive: &[bool]) -> LightTables {
        let mut light_faces = vec![0.0f32; self.light_face_total as usize];
        let mut lights = self.lights;
        let world_shader = lights.first().map(|l| l.shader).unwrap_or(0);

        for shape_light in &self.shape_lights {
            let info = &shapes.shapes[shape_light.shape as usize];
            let slot = shape_light.slot;
            let range = slot.face_offset as usize..(slot.face_offset + slot.face_count) as usize;
            let area = build_light_distribution(
                shapes,
                info.faces.offset,
                shape_light.object_to_world,
                emissive,
                &mut light_faces[range],
            );
            if area <= 0.0 {
                tracing::warn!(instance = shape_light.instance, "shape light has no emissive area");
            }
            lights.push(DeviceLight {
                kind: light_kind::SHAPE,
                flags: light_flags::CAST_SHADOWS,
                instance: shape_light.instance,
                area,
                face_offset: slot.face_offset,
                face_count: slot.face_count,
                ..Default::default()
            });
        }

        let uniforms = SceneUniforms {
            light_count: lights.len() as u32,
            area_count: self.counts[light_kind::AREA as usize],
            point_count: self.counts[light_kind::POINT as usize],
            sun_count: self.counts[light_kind::SUN as usize],
            spot_count: self.counts[light_kind::SPOT as usize],
            shape_count: self.shape_lights.len() as u32,
            ..Default::default()
        };
        tracing::info!(
            total = uniforms.light_count,
            area = uniforms.area_count,
            point = uniforms.point_count,
            sun = uniforms.sun_count,
            spot = uniforms.spot_count,
            shape = uniforms.shape_count,
            "lights built"
        );
        LightTables {
            lights,
            light_faces,
            uniforms,
            world_shader,
        }
    }
}

fn device_light(record: &LightRecord, shader: u32) -> DeviceLight {
    if record.use_mis && !matches!(record.kind, LightKind::World) {
        tracing::warn!(light = %record.name, kind = record.kind.name(), "MIS is only supported for the world light, disabled");
    }
    let mut flags = 0;
    if record.cast_shadows {
        flags |= light_flags::CAST_SHADOWS;
    }
    if record.use_mis && matches!(record.kind, LightKind::World) {
        flags |= light_flags::USE_MIS;
    }
    let base = DeviceLight {
        kind: record.kind.order(),
        shader,
        flags,
        ..Default::default()
    };

    match record.kind {
        LightKind::World => base,
        LightKind::Area {
            transform,
            size,
            power,
            color,
            circular,
        } => {
            let axis_u = transform.x_axis.truncate() * (size[0] * 0.5);
            let axis_v = transform.y_axis.truncate() * (size[1] * 0.5);
            let normalization = if circular { 4.0 / std::f32::consts::PI } else { 1.0 };
            DeviceLight {
                position: transform.w_axis.truncate().to_array(),
                direction: (-transform.z_axis.truncate()).normalize_or_zero().to_array(),
                color: (color * power * normalization).to_array(),
                axis_u: axis_u.to_array(),
                axis_v: axis_v.to_array(),
                area: 4.0 * axis_u.cross(axis_v).length(),
                circular: circular as u32,
                ..base
            }
        }
        LightKind::Point {
            position,
            power,
            color,
            radius,
        } => DeviceLight {
            position: position.to_array(),
            radius,
            color: (color * power / (4.0 * std::f32::consts::PI)).to_array(),
            ..base
        },
        LightKind::Spot {
            position,
            direction,
            power,
            color,
            radius,
            spot_size,
            spot_blend,
        } => {
            let spot_angle = (spot_size * 0.5).cos();
            DeviceLight {
                position: position.to_array(),
                radius,
                direction: direction.normalize_or_zero().to_array(),
                color: (color * power / (4.0 * std::f32::consts::PI)).to_array(),
                spot_size: spot_angle,
                spot_blend: (1.0 - spot_angle) * spot_blend,
                ..base
            }
        }
        LightKind::Sun {
            direction,
            power,
            color,
            angle,
        } => DeviceLight {
            direction: direction.normalize_or_zero().to_array(),
            cos_angle: (angle * 0.5).cos(),
            color: (color * power).to_array(),
            ..base
        },
    }
}

/// Writes the normalized cumulative world-space area of the emissive faces
/// of one instance into `output` and returns the total emissive area.
fn build_light_distribution(
    shapes: &BuiltShapes,
    face_offset: usize,
    object_to_world: Mat4,
    emissive: &[bool],
    output: &mut [f32],
) -> f32 {
    let linear = Mat3::from_mat4(object_to_world);
    let mut total = 0.0f32;
    for (i, cdf) in output.iter_mut().enumerate() {
        let face = shapes.faces[face_offset + i];
        if emissive.get(face.material as usize).copied().unwrap_or(false) {
            let [a, b, c] = shapes.triangle(face_offset + i);
            let e1 = linear * (b - a);
            let e2 = linear * (c - a);
            total += 0.5 * e1.cross(e2).length();
        }
        *cdf = total;
    }
    if total > 0.0 {
        for cdf in output.iter_mut() {
            *cdf /= total;
        }
    }
    total
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::gpu_types::{DeviceFace, DeviceVertex};
    use glam::Vec3;
    use shader_graph::{Kernel, Node, NodeGraph};
    use std::collections::BTreeMap;

    fn materials() -> MaterialBuilder {
        let mut graph = NodeGraph::default();
        graph.insert("Output", Node::new(Kernel::OutputWorld));
        let mut library = BTreeMap::new();
        library.insert("sky".to_string(), graph.clone());
        library.insert("lamp".to_string(), graph);
        MaterialBuilder::new(library)
    }

    fn record(name: &str, kind: LightKind) -> LightRecord {
        LightRecord {
            name: name.into(),
            material: (if matches!(kind, LightKind::World) { "sky" } else { "lamp" }).into(),
            cast_shadows: true,
            use_mis: true,
            kind,
        }
    }

    fn sun() -> LightKind {
        LightKind::Sun {
            direction: Vec3::new(0.0, 0.0, -2.0),
            power: 3.0,
            color: Vec3::ONE,
            angle: 0.1,
        }
    }

    #[test]
    fn test_world_light_required() {
        let mut m = materials();
        let err = LightBuilder::new(&[record("sun", sun())], &mut m).err().unwrap();
        assert!(matches!(err, Error::MissingWorldLight));

        let two = [record("a", LightKind::World), record("b", LightKind::World)];
        let err = LightBuilder::new(&two, &mut m).err().unwrap();
        assert!(matches!(err, Error::MultipleWorldLights(2)));
    }

    #[test]
    fn test_order_and_counts() {
        let mut m = materials();
        let records = [
            record("sun", sun()),
            record(
                "bulb",
                LightKind::Point {
                    position: Vec3::ZERO,
                    power: 10.0,
                    color: Vec3::ONE,
                    radius: 0.1,
                },
            ),
            record("world", LightKind::World),
        ];
        let builder = LightBuilder::new(&records, &mut m).unwrap();
        assert_eq!(builder.light_count(), 3);
        let tables = builder.build(&BuiltShapes::default(), &[]);
        let kinds: Vec<u32> = tables.lights.iter().map(|l| l.kind).collect();
        assert_eq!(kinds, vec![light_kind::WORLD, light_kind::POINT, light_kind::SUN]);
        assert_eq!(tables.uniforms.light_count, 3);
        assert_eq!(tables.uniforms.point_count, 1);
        assert_eq!(tables.uniforms.sun_count, 1);

        // MIS survives only on the world light
        assert!(tables.lights[0].uses_mis());
        assert!(!tables.lights[2].uses_mis());
        assert!((tables.lights[2].cos_angle - 0.05f32.cos()).abs() < 1e-6);
        assert_eq!(tables.lights[2].direction, [0.0, 0.0, -1.0]);
        assert_eq!(tables.lights[2].color, [3.0, 3.0, 3.0]);
    }

    #[test]
    fn test_spot_and_area_parameters() {
        let mut m = materials();
        let records = [
            record("world", LightKind::World),
            record(
                "spot",
                LightKind::Spot {
                    position: Vec3::ZERO,
                    direction: Vec3::NEG_Z,
                    power: 1.0,
                    color: Vec3::ONE,
                    radius: 0.0,
                    spot_size: std::f32::consts::FRAC_PI_2,
                    spot_blend: 0.5,
                },
            ),
            record(
                "disk",
                LightKind::Area {
                    transform: Mat4::IDENTITY,
                    size: [2.0, 2.0],
                    power: 1.0,
                    color: Vec3::ONE,
                    circular: true,
                },
            ),
        ];
        let tables = LightBuilder::new(&records, &mut m)
            .unwrap()
            .build(&BuiltShapes::default(), &[]);
        let area = tables.lights[1];
        assert_eq!(area.kind, light_kind::AREA);
        assert!((area.area - 4.0).abs() < 1e-6);
        assert!((area.color[0] - 4.0 / std::f32::consts::PI).abs() < 1e-6);
        assert_eq!(area.direction, [0.0, 0.0, -1.0]);

        let spot = tables.lights[2];
        let expected = std::f32::consts::FRAC_PI_4.cos();
        assert!((spot.spot_size - expected).abs() < 1e-6);
        assert!((spot.spot_blend - (1.0 - expected) * 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_shape_light_distribution() {
        let vertex = |x: f32, y: f32| DeviceVertex {
            position: [x, y, 0.0],
            ..Default::default()
        };
        let shapes = BuiltShapes {
            vertices: vec![vertex(0.0, 0.0), vertex(1.0, 0.0), vertex(1.0, 1.0), vertex(0.0, 1.0)],
            faces: vec![
                DeviceFace { indices: [0, 1, 2], material: 1 },
                DeviceFace { indices: [0, 2, 3], material: 0 },
                DeviceFace { indices: [0, 1, 3], material: 1 },
            ],
            shapes: vec![crate::scene::ShapeInfo {
                name: "s".into(),
                path: "s.ply".into(),
                vertices: crate::util::ArenaRange::new(0, 4),
                faces: crate::util::ArenaRange::new(0, 3),
                palette: vec![0, 1],
                has_emission: true,
                bounds: crate::accel::Aabb::EMPTY,
            }],
            blases: Vec::new(),
        };

        let mut m = materials();
        let mut builder = LightBuilder::new(&[record("world", LightKind::World)], &mut m).unwrap();
        let slot = builder.add_shape_light(0, 0, 3, Mat4::from_scale(Vec3::splat(2.0)));
        assert_eq!(slot, ShapeLightSlot { light: 1, face_offset: 0, face_count: 3 });

        let tables = builder.build(&shapes, &[false, true]);
        assert_eq!(tables.uniforms.shape_count, 1);
        let light = tables.lights[1];
        assert_eq!(light.kind, light_kind::SHAPE);
        // two emissive triangles of area 0.5, scaled by 4
        assert!((light.area - 4.0).abs() < 1e-5);
        assert_eq!(tables.light_faces, vec![0.5, 0.5, 1.0]);
    }
}
