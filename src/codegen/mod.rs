//! Shader-graph compiler targeting WGSL.
//!
//! Each material or light graph becomes one WGSL function. Nodes reachable
//! from the graph's output are emitted depth-first, dependencies before
//! dependents, as a local struct per node followed by a call to the node
//! kernel's compute function. Two dispatch functions, `shade_surface` and
//! `shade_light`, switch on a table index and call the matching function.
//!
//! ```ignore
//! let mut codegen = Codegen::new();
//! let index = codegen.add_material("Glass", &graph, MaterialType::Surface)?;
//! let library = codegen.build(&ImageFileLoader::new(dir), &WgpuCompiler::new(&device))?;
//! ```

mod compiler;
mod invocation;
mod rules;
mod signature;
mod sky;
mod textures;

use std::collections::{HashMap, HashSet};
use std::fmt::Write as _;

use shader_graph::{Kernel, Link, NodeGraph, Value};

pub use compiler::{ShaderCompiler, WgpuCompiler};
pub use invocation::{KernelInvocation, Parameter, float_literal, snake_identifier};
pub use rules::{Capability, capability, kernel_name};
pub use signature::{FieldKind, Implementation, KernelSignature, SIGNATURES, signature};
pub use sky::{SKY_RESOLUTION, SkyModel};
pub use textures::{
    ImageFileLoader, PixelFormat, TextureData, TextureLoader, TextureRegistry, TextureSource,
};

use crate::util::{Error, MAX_TEXTURE_SLOTS, Result};

/// Hand-written WGSL linked into every shading library.
pub mod shader_lib {
    pub const COMMON: &str = include_str!("shaders/common.wgsl");
    pub const NODES: &str = include_str!("shaders/nodes.wgsl");
    pub const BSDF: &str = include_str!("shaders/bsdf.wgsl");
    pub const WAVEFRONT: &str = include_str!("shaders/wavefront.wgsl");
    pub const ENVMAP: &str = include_str!("shaders/envmap.wgsl");
}

/// Table a graph's function is registered in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MaterialType {
    /// Surface material, dispatched by `shade_surface`.
    Surface,
    /// World or light shader, dispatched by `shade_light`.
    Light,
}

impl MaterialType {
    fn accepts(self, kernel: &Kernel) -> bool {
        match self {
            MaterialType::Surface => matches!(kernel, Kernel::OutputMaterial),
            MaterialType::Light => matches!(kernel, Kernel::OutputWorld | Kernel::OutputLight),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NodeState {
    Pending,
    Emitted,
}

/// Compiled shading library plus everything needed to bind it.
pub struct ShadingLibrary<L> {
    pub library: L,
    pub source: String,
    pub textures: Vec<TextureData>,
    pub surfaces: Vec<String>,
    pub lights: Vec<String>,
}

#[derive(Debug, Default)]
pub struct Codegen {
    textures: TextureRegistry,
    body: String,
    surfaces: Vec<String>,
    lights: Vec<String>,
    function_names: HashSet<String>,
}

impl Codegen {
    pub fn new() -> Self {
        Self::default()
    }

    /// Emits the function for `graph` and returns its index in the table
    /// selected by `ty`.
    ///
    /// On error nothing is appended: the body, tables and texture registry
    /// are left as they were.
    #[tracing::instrument(skip(self, graph), fields(nodes = graph.len()))]
    pub fn add_material(&mut self, name: &str, graph: &NodeGraph, ty: MaterialType) -> Result<u32> {
        let texture_mark = self.textures.len();
        let emitted = {
            let mut emitter = GraphEmitter::new(graph, &mut self.textures);
            emitter.emit_outputs(ty).map(|()| emitter.out)
        };
        let text = match emitted {
            Ok(text) => text,
            Err(e) => {
                self.textures.truncate(texture_mark);
                return Err(e);
            }
        };

        let function = self.unique_function_name(name);
        let _ = writeln!(self.body, "// {ty:?}: {name}");
        let _ = writeln!(
            self.body,
            "fn {function}(shading: ptr<function, ShadingContext>) {{{text}}}\n"
        );

        let table = match ty {
            MaterialType::Surface => &mut self.surfaces,
            MaterialType::Light => &mut self.lights,
        };
        table.push(function);
        Ok((table.len() - 1) as u32)
    }

    fn unique_function_name(&mut self, name: &str) -> String {
        let base = format!("s_{}", snake_identifier(name));
        let mut candidate = base.clone();
        let mut suffix = 2;
        while !self.function_names.insert(candidate.clone()) {
            candidate = format!("{base}{suffix}");
            suffix += 1;
        }
        candidate
    }

    pub fn surfaces(&self) -> &[String] {
        &self.surfaces
    }

    pub fn lights(&self) -> &[String] {
        &self.lights
    }

    pub fn textures(&self) -> &TextureRegistry {
        &self.textures
    }

    /// Emitted material and light functions, without header or dispatchers.
    pub fn body(&self) -> &str {
        &self.body
    }

    /// Complete library source for already-loaded `textures`.
    pub fn source(&self, textures: &[TextureData]) -> String {
        let mut source = header(textures);
        for part in [shader_lib::COMMON, shader_lib::NODES, shader_lib::BSDF] {
            source.push_str(part);
            source.push('\n');
        }
        source.push_str(&self.body);
        source.push_str(&dispatcher("shade_surface", "material", &self.surfaces));
        source.push_str(&dispatcher("shade_light", "shader", &self.lights));
        source.push_str(shader_lib::WAVEFRONT);
        source.push('\n');
        source.push_str(shader_lib::ENVMAP);
        source
    }

    /// Loads textures, assembles the source and compiles it.
    ///
    /// `max_texture_dimension` is the device's 2D texture size limit.
    #[tracing::instrument(skip_all, fields(surfaces = self.surfaces.len(), lights = self.lights.len()))]
    pub fn build<C: ShaderCompiler>(
        self,
        loader: &dyn TextureLoader,
        max_texture_dimension: u32,
        compiler: &C,
    ) -> Result<ShadingLibrary<C::Library>> {
        let textures = self.textures.load_all(loader, max_texture_dimension);
        let source = self.source(&textures);
        tracing::debug!(bytes = source.len(), textures = textures.len(), "shading source assembled");
        let library = compiler.compile(&source)?;
        Ok(ShadingLibrary {
            library,
            source,
            textures,
            surfaces: self.surfaces,
            lights: self.lights,
        })
    }
}

/// Per-graph emission state.
struct GraphEmitter<'g, 't> {
    graph: &'g NodeGraph,
    textures: &'t mut TextureRegistry,
    state: HashMap<&'g str, NodeState>,
    identifiers: HashMap<&'g str, String>,
    used: HashSet<String>,
    out: String,
}

impl<'g, 't> GraphEmitter<'g, 't> {
    fn new(graph: &'g NodeGraph, textures: &'t mut TextureRegistry) -> Self {
        Self {
            graph,
            textures,
            state: HashMap::new(),
            identifiers: HashMap::new(),
            used: HashSet::new(),
            out: String::new(),
        }
    }

    fn emit_outputs(&mut self, ty: MaterialType) -> Result<()> {
        let graph = self.graph;
        let outputs: Vec<&'g str> = graph
            .outputs()
            .filter(|(_, node)| ty.accepts(&node.kernel))
            .map(|(name, _)| name)
            .collect();
        match outputs.as_slice() {
            [] => {
                tracing::warn!("graph has no output node, function left empty");
                Ok(())
            }
            [output, rest @ ..] => {
                if !rest.is_empty() {
                    tracing::warn!(used = output, "graph has several output nodes");
                }
                self.emit_node(*output)
            }
        }
    }

    fn identifier(&mut self, node: &'g str) -> String {
        if let Some(id) = self.identifiers.get(node) {
            return id.clone();
        }
        let base = format!("n_{}", snake_identifier(node));
        let mut candidate = base.clone();
        let mut suffix = 2;
        while !self.used.insert(candidate.clone()) {
            candidate = format!("{base}_{suffix}");
            suffix += 1;
        }
        self.identifiers.insert(node, candidate.clone());
        candidate
    }

    fn emit_node(&mut self, key: &'g str) -> Result<()> {
        match self.state.get(key) {
            Some(NodeState::Emitted) => return Ok(()),
            Some(NodeState::Pending) => {
                return Err(Error::CycleDetected {
                    node: key.to_string(),
                });
            }
            None => {}
        }
        self.state.insert(key, NodeState::Pending);

        let graph = self.graph;
        let (key, node) = graph
            .nodes
            .get_key_value(key)
            .ok_or_else(|| Error::MissingNode(key.to_string()))?;
        let mut invocation = rules::translate(&node.kernel, self.textures)?.comment(key.clone());
        let sig = invocation.signature;
        let defaults = rules::context_defaults(sig.name);

        for (input_name, input) in &node.inputs {
            if input.links.len() > 1 {
                return Err(Error::MultiInputDetected {
                    node: key.clone(),
                    input: input_name.clone(),
                });
            }
            let Some(socket) = sig.input(input_name) else {
                tracing::trace!(kernel = sig.name, input = %input_name, "input not used by kernel");
                continue;
            };
            if let Some(link) = input.links.first() {
                self.emit_node(&link.node)?;
                let expr = self.link_expression(link, socket.kind);
                invocation.assign(socket.field, expr);
            } else if defaults.iter().any(|(field, _)| *field == socket.field) {
                // context default assigned below
            } else if let Some(value) = &input.value {
                if let Some(expr) = literal_expression(value, socket.kind) {
                    invocation.assign(socket.field, expr);
                }
            }
        }
        for (field, expr) in defaults {
            if !invocation.inputs.contains_key(*field) {
                invocation.assign(*field, *expr);
            }
        }

        let identifier = self.identifier(key);
        invocation.render(&identifier, &mut self.out);
        self.state.insert(key, NodeState::Emitted);
        Ok(())
    }

    /// Expression reading `link`'s source field, converted to `target`.
    fn link_expression(&mut self, link: &'g Link, target: FieldKind) -> String {
        let source = self
            .graph
            .get(&link.node)
            .and_then(|node| rules::kernel_signature(&node.kernel))
            .and_then(|sig| sig.output(&link.property));
        let Some(socket) = source else {
            tracing::warn!(node = %link.node, output = %link.property, "link to unknown output");
            return zero_expression(target).to_string();
        };
        let field = format!("{}.{}", self.identifier(&link.node), socket.field);
        convert(socket.kind, target, field)
    }
}

fn zero_expression(kind: FieldKind) -> &'static str {
    match kind {
        FieldKind::Shader => "closure_none()",
        _ => "vec4f(0.0)",
    }
}

fn convert(from: FieldKind, to: FieldKind, expr: String) -> String {
    use FieldKind::*;
    match (from, to) {
        (Shader, Shader) => expr,
        (Shader, _) => {
            tracing::warn!("shader output linked into a data input, using zero");
            zero_expression(to).to_string()
        }
        (_, Shader) => format!("closure_from_data({expr})"),
        (Float, Color | Vector) => format!("color_from_float({expr})"),
        (Color, Float) => format!("float_from_color({expr})"),
        (Vector, Float) => format!("float_from_vector({expr})"),
        _ => expr,
    }
}

fn literal_expression(value: &Value, kind: FieldKind) -> Option<String> {
    let lanes = match (kind, value) {
        (FieldKind::Color, Value::Scalar(v)) => [*v, *v, *v, 1.0],
        (FieldKind::Color, _) => value.to_vec4(1.0),
        (FieldKind::Float | FieldKind::Vector, _) => value.to_vec4(0.0),
        (FieldKind::Shader | FieldKind::Raw(_), _) => return None,
    };
    Some(invocation::vec4_literal(lanes))
}

/// Header: build stamp, texture constants and bindings, enum constants,
/// kernel structs and stub compute functions.
fn header(textures: &[TextureData]) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "// wavetrace shading library, built {} {}",
        env!("WAVETRACE_BUILD_DATE"),
        env!("WAVETRACE_BUILD_TIME")
    );
    let _ = writeln!(out, "const NUMBER_OF_TEXTURES: u32 = {}u;", textures.len());
    for (slot, texture) in textures.iter().enumerate() {
        let _ = writeln!(
            out,
            "const TEX{slot}_PIXEL_FORMAT: u32 = {}u;",
            texture.format as u32
        );
    }

    out.push_str("\n@group(1) @binding(0) var linear_sampler: sampler;\n");
    out.push_str("@group(1) @binding(1) var nearest_sampler: sampler;\n");
    let bound = textures.len().clamp(1, MAX_TEXTURE_SLOTS as usize);
    for slot in 0..bound {
        let _ = writeln!(
            out,
            "@group(1) @binding({}) var tex{slot}: texture_2d<f32>;",
            slot + 2
        );
    }

    out.push_str("\nfn sample_texture(slot: u32, uv: vec2f, nearest: bool) -> vec4f {\n    switch slot {\n");
    for slot in 0..bound {
        let _ = writeln!(
            out,
            "        case {slot}u: {{\n            if nearest {{ return textureSampleLevel(tex{slot}, nearest_sampler, uv, 0.0); }}\n            return textureSampleLevel(tex{slot}, linear_sampler, uv, 0.0);\n        }}"
        );
    }
    out.push_str("        default: { return vec4f(0.0); }\n    }\n}\n\n");

    out.push_str("fn texture_size(slot: u32) -> vec2f {\n    switch slot {\n");
    for slot in 0..bound {
        let _ = writeln!(out, "        case {slot}u: {{ return vec2f(textureDimensions(tex{slot})); }}");
    }
    out.push_str("        default: { return vec2f(1.0); }\n    }\n}\n\n");

    for sig in SIGNATURES {
        for param in sig.enums {
            for (index, value) in param.values.iter().enumerate() {
                let _ = writeln!(
                    out,
                    "const {}: u32 = {index}u;",
                    invocation::enum_constant(sig.name, param.namespace, value)
                );
            }
        }
    }
    out.push('\n');

    for sig in SIGNATURES {
        let _ = writeln!(out, "struct {} {{", sig.name);
        for socket in sig.fields() {
            let _ = writeln!(out, "    {}: {},", socket.field, socket.kind.wgsl_type());
        }
        out.push_str("}\n\n");
    }

    for sig in SIGNATURES {
        if let Implementation::Stub(fallbacks) = sig.implementation {
            out.push_str(&stub_function(sig, fallbacks));
        }
    }
    out
}

fn stub_function(sig: &KernelSignature, fallbacks: &[(&str, &str)]) -> String {
    let mut out = format!(
        "fn {}_compute(n: ptr<function, {}>, shading: ptr<function, ShadingContext>) {{\n",
        sig.name, sig.name
    );
    for output in sig.outputs {
        if sig.inputs.iter().any(|i| i.field == output.field) {
            continue;
        }
        let expr = match fallbacks.iter().find(|(field, _)| *field == output.field) {
            Some((_, expr)) => (*expr).to_string(),
            None if output.field == "normal" => "vec4f((*shading).normal, 0.0)".to_string(),
            None => zero_expression(output.kind).to_string(),
        };
        let _ = writeln!(out, "    (*n).{} = {expr};", output.field);
    }
    out.push_str("}\n\n");
    out
}

fn dispatcher(name: &str, selector: &str, functions: &[String]) -> String {
    let mut out = format!(
        "fn {name}({selector}: u32, shading: ptr<function, ShadingContext>) {{\n    switch {selector} {{\n"
    );
    for (index, function) in functions.iter().enumerate() {
        let _ = writeln!(out, "        case {index}u: {{ {function}(shading); }}");
    }
    out.push_str("        default: {}\n    }\n}\n\n");
    out
}
