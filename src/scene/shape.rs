//! Shape registration and parallel geometry loading.

use std::collections::HashMap;
use std::path::PathBuf;

use rayon::prelude::*;

use super::gpu_types::{DeviceFace, DeviceVertex};
use super::material::MaterialBuilder;
use super::mesh::MeshSource;
use super::ShapeRecord;
use crate::accel::{build_bvh, Aabb, Bvh};
use crate::codegen::MaterialType;
use crate::util::{Arena, ArenaRange, Error, Result};

/// Placement and properties of a registered shape.
#[derive(Debug, Clone)]
pub struct ShapeInfo {
    pub name: String,
    pub path: PathBuf,
    pub vertices: ArenaRange,
    pub faces: ArenaRange,
    /// Global surface index per palette entry.
    pub palette: Vec<u32>,
    pub has_emission: bool,
    /// Object-space bounds, known once the shape is built.
    pub bounds: Aabb,
}

/// Shared geometry arrays plus one bottom-level BVH per shape.
#[derive(Debug, Clone, Default)]
pub struct BuiltShapes {
    pub vertices: Vec<DeviceVertex>,
    pub faces: Vec<DeviceFace>,
    pub shapes: Vec<ShapeInfo>,
    pub blases: Vec<Bvh>,
}

impl BuiltShapes {
    /// Object-space corners of face `face` (global index).
    pub fn triangle(&self, face: usize) -> [glam::Vec3; 3] {
        let indices = self.faces[face].indices;
        indices.map(|i| glam::Vec3::from_array(self.vertices[i as usize].position))
    }
}

pub struct ShapeBuilder<'a> {
    library: HashMap<String, ShapeRecord>,
    source: &'a dyn MeshSource,
    ids: HashMap<String, u32>,
    shapes: Vec<ShapeInfo>,
    vertices: Arena<DeviceVertex>,
    faces: Arena<DeviceFace>,
}

impl<'a> ShapeBuilder<'a> {
    pub fn new(records: &[ShapeRecord], source: &'a dyn MeshSource) -> Self {
        Self {
            library: records.iter().map(|r| (r.name.clone(), r.clone())).collect(),
            source,
            ids: HashMap::new(),
            shapes: Vec::new(),
            vertices: Arena::new(),
            faces: Arena::new(),
        }
    }

    /// Handle of shape `name`, registering it on first reference.
    ///
    /// Registration reads only the mesh header; the vertex and face ranges
    /// it reserves are final.
    pub fn index(&mut self, name: &str, materials: &mut MaterialBuilder) -> Result<u32> {
        if let Some(id) = self.ids.get(name) {
            return Ok(*id);
        }
        let record = self
            .library
            .get(name)
            .ok_or_else(|| Error::MissingShape(name.to_string()))?;

        let palette = record
            .materials
            .iter()
            .map(|m| materials.index(MaterialType::Surface, m))
            .collect::<Result<Vec<_>>>()?;
        let has_emission = record.materials.iter().any(|m| materials.has_emission(m));

        let header = self.source.header(&record.path)?;
        let info = ShapeInfo {
            name: record.name.clone(),
            path: record.path.clone(),
            vertices: self.vertices.reserve(header.vertex_count),
            faces: self.faces.reserve(header.face_count),
            palette,
            has_emission,
            bounds: Aabb::EMPTY,
        };
        tracing::debug!(
            shape = name,
            vertices = header.vertex_count,
            faces = header.face_count,
            has_emission,
            "shape registered"
        );

        let id = self.shapes.len() as u32;
        self.shapes.push(info);
        self.ids.insert(name.to_string(), id);
        Ok(id)
    }

    pub fn len(&self) -> usize {
        self.shapes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shapes.is_empty()
    }

    /// Loads every registered shape into its reserved ranges in parallel,
    /// rebases indices to global ones, then builds one BVH per shape.
    #[tracing::instrument(skip_all, fields(shapes = self.shapes.len()))]
    pub fn build(mut self) -> Result<BuiltShapes> {
        let vertex_ranges: Vec<ArenaRange> = self.shapes.iter().map(|s| s.vertices).collect();
        let face_ranges: Vec<ArenaRange> = self.shapes.iter().map(|s| s.faces).collect();
        let vertex_slices = self.vertices.split_mut(&vertex_ranges);
        let face_slices = self.faces.split_mut(&face_ranges);
        let source = self.source;

        let bounds = self
            .shapes
            .par_iter()
            .zip(vertex_slices.into_par_iter().zip(face_slices.into_par_iter()))
            .map(|(shape, (vertices, faces))| {
                tracing::debug!(shape = %shape.name, "loading shape");
                source.load(&shape.path, vertices, faces)?;
                rebase_faces(shape, faces)?;
                Ok(Aabb::from_points(vertices.iter().map(|v| v.position)))
            })
            .collect::<Result<Vec<Aabb>>>()?;
        for (shape, bounds) in self.shapes.iter_mut().zip(bounds) {
            shape.bounds = bounds;
        }

        let vertices = self.vertices.into_vec();
        let faces = self.faces.into_vec();
        let blases = self
            .shapes
            .par_iter()
            .map(|shape| {
                let face_bounds: Vec<Aabb> = faces[shape.faces.offset..shape.faces.end()]
                    .iter()
                    .map(|f| Aabb::from_points(f.indices.map(|i| vertices[i as usize].position)))
                    .collect();
                build_bvh(&face_bounds)
            })
            .collect();

        tracing::info!(
            shapes = self.shapes.len(),
            vertices = vertices.len(),
            faces = faces.len(),
            "shapes built"
        );
        Ok(BuiltShapes {
            vertices,
            faces,
            shapes: self.shapes,
            blases,
        })
    }
}

/// Shape-local vertex and palette indices to global ones.
fn rebase_faces(shape: &ShapeInfo, faces: &mut [DeviceFace]) -> Result<()> {
    let base = shape.vertices.offset as u32;
    for face in faces.iter_mut() {
        for index in face.indices.iter_mut() {
            *index += base;
        }
        face.material = match shape.palette.get(face.material as usize) {
            Some(material) => *material,
            None => {
                return Err(Error::mesh(
                    &shape.path,
                    format!(
                        "material index {} outside palette of {}",
                        face.material,
                        shape.palette.len()
                    ),
                ));
            }
        };
    }
    Ok(())
}
