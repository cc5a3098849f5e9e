//! Material index allocation on top of the codegen.

use std::collections::{BTreeMap, HashMap};

use shader_graph::NodeGraph;

use crate::codegen::{Codegen, MaterialType};
use crate::util::{Error, Result};

/// Compiles graphs on first reference and hands out stable table indices.
///
/// The surface and light tables are independent: the same graph may be both
/// a surface material and a light shader, with different indices.
#[derive(Debug)]
pub struct MaterialBuilder {
    library: BTreeMap<String, NodeGraph>,
    codegen: Codegen,
    indices: HashMap<(MaterialKey, String), u32>,
    emissive: HashMap<String, bool>,
    /// Surface material names by surface index.
    surfaces: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum MaterialKey {
    Surface,
    Light,
}

impl From<MaterialType> for MaterialKey {
    fn from(ty: MaterialType) -> Self {
        match ty {
            MaterialType::Surface => MaterialKey::Surface,
            MaterialType::Light => MaterialKey::Light,
        }
    }
}

impl MaterialBuilder {
    pub fn new(library: BTreeMap<String, NodeGraph>) -> Self {
        Self {
            library,
            codegen: Codegen::new(),
            indices: HashMap::new(),
            emissive: HashMap::new(),
            surfaces: Vec::new(),
        }
    }

    /// Table index of `name`, emitting its function on first use.
    pub fn index(&mut self, ty: MaterialType, name: &str) -> Result<u32> {
        let key = (MaterialKey::from(ty), name.to_string());
        if let Some(index) = self.indices.get(&key) {
            return Ok(*index);
        }
        let graph = self
            .library
            .get(name)
            .ok_or_else(|| Error::MissingMaterial(name.to_string()))?;
        let index = self.codegen.add_material(name, graph, ty)?;
        tracing::debug!(material = name, ?ty, index, "material emitted");
        if ty == MaterialType::Surface {
            self.surfaces.push(name.to_string());
        }
        self.indices.insert(key, index);
        Ok(index)
    }

    /// Whether the surface material `name` emits light. Unknown names do not.
    pub fn has_emission(&mut self, name: &str) -> bool {
        if let Some(flag) = self.emissive.get(name) {
            return *flag;
        }
        let flag = self
            .library
            .get(name)
            .map(NodeGraph::has_surface_emission)
            .unwrap_or(false);
        self.emissive.insert(name.to_string(), flag);
        flag
    }

    /// Emission flag per surface index.
    pub fn emissive_surfaces(&mut self) -> Vec<bool> {
        let names = self.surfaces.clone();
        names.iter().map(|name| self.has_emission(name)).collect()
    }

    pub fn surface_count(&self) -> usize {
        self.surfaces.len()
    }

    pub fn codegen(&self) -> &Codegen {
        &self.codegen
    }

    pub fn into_codegen(self) -> Codegen {
        self.codegen
    }
}
