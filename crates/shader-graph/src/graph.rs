//! Node and graph containers.

use std::collections::{BTreeMap, HashSet};

use serde::Deserialize;

use crate::kernel::Kernel;
use crate::value::Input;

/// Errors raised while reading a node graph.
#[derive(Debug, thiserror::Error)]
pub enum GraphError {
    /// Malformed JSON
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Parameters that do not fit the kernel type
    #[error("Invalid parameters for {kernel}: {source}")]
    Parameters {
        kernel: String,
        source: serde_json::Error,
    },
}

#[derive(Deserialize)]
struct RawNode {
    #[serde(rename = "type")]
    tag: String,
    #[serde(default)]
    inputs: BTreeMap<String, Input>,
    #[serde(default)]
    parameters: serde_json::Value,
}

/// Shading node: kernel plus named inputs.
///
/// Inputs are kept sorted by name so every traversal is deterministic.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(try_from = "RawNode")]
pub struct Node {
    pub kernel: Kernel,
    pub inputs: BTreeMap<String, Input>,
}

impl TryFrom<RawNode> for Node {
    type Error = GraphError;

    fn try_from(raw: RawNode) -> Result<Self, Self::Error> {
        Ok(Self {
            kernel: Kernel::from_parts(&raw.tag, raw.parameters)?,
            inputs: raw.inputs,
        })
    }
}

impl Node {
    pub fn new(kernel: Kernel) -> Self {
        Self {
            kernel,
            inputs: BTreeMap::new(),
        }
    }

    /// Builder-style input insertion.
    pub fn with_input(mut self, name: impl Into<String>, input: Input) -> Self {
        self.inputs.insert(name.into(), input);
        self
    }
}

/// Material or light node graph keyed by node name.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(transparent)]
pub struct NodeGraph {
    pub nodes: BTreeMap<String, Node>,
}

impl NodeGraph {
    pub fn from_json(text: &str) -> Result<Self, GraphError> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn from_value(value: serde_json::Value) -> Result<Self, GraphError> {
        Ok(serde_json::from_value(value)?)
    }

    pub fn insert(&mut self, name: impl Into<String>, node: Node) {
        self.nodes.insert(name.into(), node);
    }

    pub fn get(&self, name: &str) -> Option<&Node> {
        self.nodes.get(name)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Output nodes in key order.
    pub fn outputs(&self) -> impl Iterator<Item = (&str, &Node)> {
        self.nodes
            .iter()
            .filter(|(_, node)| node.kernel.is_output())
            .map(|(name, node)| (name.as_str(), node))
    }

    /// Whether a surface output of this graph can radiate light.
    ///
    /// True when an emission or background closure with a linked or
    /// non-zero `Strength` is reachable upstream of a material or light
    /// output. Dangling links are ignored.
    pub fn has_surface_emission(&self) -> bool {
        let mut stack: Vec<&str> = self
            .nodes
            .iter()
            .filter(|(_, node)| {
                matches!(node.kernel, Kernel::OutputMaterial | Kernel::OutputLight)
            })
            .map(|(name, _)| name.as_str())
            .collect();
        let mut visited = HashSet::new();

        while let Some(name) = stack.pop() {
            if !visited.insert(name) {
                continue;
            }
            let Some(node) = self.nodes.get(name) else {
                continue;
            };
            if node.kernel.is_emitter() && emits(node) {
                return true;
            }
            for input in node.inputs.values() {
                for link in &input.links {
                    stack.push(link.node.as_str());
                }
            }
        }
        false
    }
}

fn emits(node: &Node) -> bool {
    match node.inputs.get("Strength") {
        Some(strength) => {
            strength.is_linked() || strength.value.as_ref().is_some_and(|v| !v.is_zero())
        }
        // Strength defaults to one when the exporter omits it
        None => true,
    }
}
