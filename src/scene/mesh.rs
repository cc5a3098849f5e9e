//! Mesh input collaborators.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use super::gpu_types::{DeviceFace, DeviceVertex};
use crate::util::{Error, Result};

/// Element counts read ahead of the mesh body.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MeshHeader {
    pub vertex_count: usize,
    pub face_count: usize,
}

/// Reads triangle meshes for the shape builder.
///
/// `header` runs while shapes are being indexed (to fix buffer offsets);
/// `load` runs later, in parallel across shapes, writing straight into the
/// shape's slices of the shared vertex and face arrays. Loaded faces carry
/// shape-local vertex indices and palette-local material indices.
pub trait MeshSource: Sync {
    fn header(&self, path: &Path) -> Result<MeshHeader>;

    fn load(&self, path: &Path, vertices: &mut [DeviceVertex], faces: &mut [DeviceFace]) -> Result<()>;
}

/// In-memory meshes keyed by path, for tools and tests.
#[derive(Debug, Clone, Default)]
pub struct MemoryMeshSource {
    meshes: HashMap<PathBuf, (Vec<DeviceVertex>, Vec<DeviceFace>)>,
}

impl MemoryMeshSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, path: impl Into<PathBuf>, vertices: Vec<DeviceVertex>, faces: Vec<DeviceFace>) {
        self.meshes.insert(path.into(), (vertices, faces));
    }

    fn get(&self, path: &Path) -> Result<&(Vec<DeviceVertex>, Vec<DeviceFace>)> {
        self.meshes
            .get(path)
            .ok_or_else(|| Error::mesh(path, "no such mesh"))
    }
}

impl MeshSource for MemoryMeshSource {
    fn header(&self, path: &Path) -> Result<MeshHeader> {
        let (vertices, faces) = self.get(path)?;
        Ok(MeshHeader {
            vertex_count: vertices.len(),
            face_count: faces.len(),
        })
    }

    fn load(&self, path: &Path, vertices: &mut [DeviceVertex], faces: &mut [DeviceFace]) -> Result<()> {
        let (src_vertices, src_faces) = self.get(path)?;
        if src_vertices.len() != vertices.len() || src_faces.len() != faces.len() {
            return Err(Error::mesh(path, "mesh changed after its header was read"));
        }
        vertices.copy_from_slice(src_vertices);
        faces.copy_from_slice(src_faces);
        Ok(())
    }
}
