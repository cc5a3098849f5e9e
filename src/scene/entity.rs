//! Instances and the top-level acceleration structure.

use glam::{Mat3, Vec3};

use super::gpu_types::{DeviceInstance, NO_LIGHT};
use super::light::LightBuilder;
use super::material::MaterialBuilder;
use super::shape::{BuiltShapes, ShapeBuilder};
use super::EntityRecord;
use crate::accel::{AccelerationStructure, Aabb, TlasInstance};
use crate::util::Result;

/// Instance buffer and the packed two-level BVH.
///
/// `instances[k]` is the record of TLAS instance `k`.
#[derive(Debug, Clone, Default)]
pub struct BuiltEntities {
    pub instances: Vec<DeviceInstance>,
    pub tlas_instances: Vec<TlasInstance>,
    pub accel: AccelerationStructure,
}

pub struct EntityBuilder<'r> {
    records: &'r [EntityRecord],
    shape_ids: Vec<u32>,
}

impl<'r> EntityBuilder<'r> {
    /// Resolves (and thereby registers) the shape of every entity.
    pub fn new(
        records: &'r [EntityRecord],
        shapes: &mut ShapeBuilder<'_>,
        materials: &mut MaterialBuilder,
    ) -> Result<Self> {
        let shape_ids = records
            .iter()
            .map(|entity| shapes.index(&entity.shape, materials))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { records, shape_ids })
    }

    /// Writes one instance per entity, registering emissive ones as shape
    /// lights, and builds the TLAS over them in entity order.
    #[tracing::instrument(skip_all, fields(entities = self.records.len()))]
    pub fn build(&self, shapes: &BuiltShapes, lights: &mut LightBuilder) -> BuiltEntities {
        let mut instances = Vec::with_capacity(self.records.len());
        let mut tlas_instances = Vec::with_capacity(self.records.len());

        for (index, (entity, shape_id)) in self.records.iter().zip(&self.shape_ids).enumerate() {
            let shape = &shapes.shapes[*shape_id as usize];
            let object_to_world = entity.transform;
            let world_to_object = object_to_world.inverse();
            let normal_matrix = Mat3::from_mat4(object_to_world).inverse().transpose();

            let mut instance = DeviceInstance {
                object_to_world: object_to_world.to_cols_array_2d(),
                world_to_object: world_to_object.to_cols_array_2d(),
                normal_matrix: normal_matrix.into(),
                bounds_min: shape.bounds.min,
                bounds_inv_extent: inverse_extent(&shape.bounds),
                face_offset: shape.faces.offset as u32,
                visibility: entity.visibility,
                light: NO_LIGHT,
                ..Default::default()
            };

            if shape.has_emission && !shape.faces.is_empty() {
                let slot = lights.add_shape_light(
                    index as u32,
                    *shape_id,
                    shape.faces.len as u32,
                    object_to_world,
                );
                instance.light = slot.light;
                instance.light_face_offset = slot.face_offset;
                instance.light_face_count = slot.face_count;
                tracing::debug!(entity = %entity.name, light = slot.light, "entity registered as shape light");
            }

            instances.push(instance);
            tlas_instances.push(TlasInstance {
                blas: *shape_id,
                // union of the 8 transformed local corners
                bounds: shape.bounds.transformed(&object_to_world),
                world_to_object,
            });
        }

        let accel = AccelerationStructure::build(&shapes.blases, &tlas_instances);
        for (instance, tlas) in instances.iter_mut().zip(&tlas_instances) {
            instance.blas_root = accel.blas_roots[tlas.blas as usize];
        }
        tracing::info!(instances = instances.len(), nodes = accel.nodes.len(), "entities built");

        BuiltEntities {
            instances,
            tlas_instances,
            accel,
        }
    }
}

fn inverse_extent(bounds: &Aabb) -> [f32; 3] {
    if bounds.is_empty() {
        return [0.0; 3];
    }
    let extent = Vec3::from_array(bounds.max) - Vec3::from_array(bounds.min);
    extent
        .to_array()
        .map(|e| if e > f32::EPSILON { 1.0 / e } else { 0.0 })
}
