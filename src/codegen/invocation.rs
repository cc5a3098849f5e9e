//! Per-node compilation record and WGSL text output.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use super::signature::KernelSignature;

/// Compile-time argument passed to a kernel's compute function.
#[derive(Debug, Clone, PartialEq)]
pub enum Parameter {
    /// Texture slot, rendered as `u32`.
    Slot(u32),
    Int(i32),
    Bool(bool),
    /// Enumerated value, rendered as `k_<Kernel>_<NAMESPACE>_<VALUE>`.
    Enum {
        namespace: &'static str,
        value: &'static str,
    },
    /// Name of a module-scope constant from the generated header.
    Constant(String),
}

/// Intermediate record for one node: kernel, parameters and field assignments.
#[derive(Debug, Clone)]
pub struct KernelInvocation {
    pub signature: &'static KernelSignature,
    pub parameters: Vec<Parameter>,
    pub comments: Vec<String>,
    /// Struct field to WGSL initializer expression.
    pub inputs: BTreeMap<String, String>,
}

impl KernelInvocation {
    pub fn new(signature: &'static KernelSignature) -> Self {
        Self {
            signature,
            parameters: Vec::new(),
            comments: Vec::new(),
            inputs: BTreeMap::new(),
        }
    }

    pub fn kernel(&self) -> &'static str {
        self.signature.name
    }

    pub fn param(mut self, parameter: Parameter) -> Self {
        self.parameters.push(parameter);
        self
    }

    /// Adds an enumerated parameter, falling back to the first declared value
    /// when `requested` is not one the kernel accepts.
    pub fn enum_param(mut self, namespace: &'static str, requested: &str) -> Self {
        let Some(param) = self.signature.enum_param(namespace) else {
            debug_assert!(false, "{} has no enum {namespace}", self.signature.name);
            return self;
        };
        let normalized = requested.to_ascii_uppercase();
        let value = match param.values.iter().find(|v| **v == normalized) {
            Some(v) => *v,
            None => {
                let fallback = param.values[0];
                tracing::warn!(
                    kernel = self.signature.name,
                    namespace,
                    requested,
                    fallback,
                    "unsupported mode, using fallback"
                );
                fallback
            }
        };
        self.parameters.push(Parameter::Enum { namespace, value });
        self
    }

    pub fn comment(mut self, comment: impl Into<String>) -> Self {
        self.comments.push(comment.into());
        self
    }

    pub fn assign(&mut self, field: impl Into<String>, expr: impl Into<String>) -> &mut Self {
        self.inputs.insert(field.into(), expr.into());
        self
    }

    /// Writes declaration, field assignments and compute call for `identifier`.
    pub fn render(&self, identifier: &str, out: &mut String) {
        let kernel = self.signature.name;
        out.push('\n');
        for comment in &self.comments {
            for line in comment.lines() {
                let _ = writeln!(out, "    // {line}");
            }
        }
        let _ = writeln!(out, "    var {identifier}: {kernel};");
        for (field, expr) in &self.inputs {
            let _ = writeln!(out, "    {identifier}.{field} = {expr};");
        }

        let mut args = vec![format!("&{identifier}")];
        args.extend(self.parameters.iter().map(|p| render_parameter(kernel, p)));
        args.push("shading".to_string());
        let _ = writeln!(out, "    {kernel}_compute({});", args.join(", "));
    }
}

fn render_parameter(kernel: &str, parameter: &Parameter) -> String {
    match parameter {
        Parameter::Slot(slot) => format!("{slot}u"),
        Parameter::Int(v) => format!("{v}i"),
        Parameter::Bool(v) => v.to_string(),
        Parameter::Enum { namespace, value } => enum_constant(kernel, namespace, value),
        Parameter::Constant(name) => name.clone(),
    }
}

/// Name of the module-scope constant for an enum value.
pub fn enum_constant(kernel: &str, namespace: &str, value: &str) -> String {
    format!("k_{kernel}_{namespace}_{}", sanitize(value))
}

/// Renders an `f32` as a WGSL float literal. Non-finite values become zero.
pub fn float_literal(v: f32) -> String {
    if !v.is_finite() {
        tracing::warn!(value = %v, "non-finite literal replaced with 0.0");
        return "0.0".to_string();
    }
    // Debug formatting keeps a decimal point or exponent on every value.
    format!("{v:?}")
}

pub fn vec4_literal(v: [f32; 4]) -> String {
    format!(
        "vec4f({}, {}, {}, {})",
        float_literal(v[0]),
        float_literal(v[1]),
        float_literal(v[2]),
        float_literal(v[3])
    )
}

/// Replaces every character outside `[A-Za-z0-9_]` with `_`.
pub fn sanitize(s: &str) -> String {
    s.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect()
}

/// Lowercase snake identifier for a node or material name.
///
/// WGSL forbids identifiers starting with `__`, and digits cannot lead, so
/// callers always prefix the result.
pub fn snake_identifier(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut prev_lower = false;
    for c in name.chars() {
        if c.is_ascii_uppercase() {
            if prev_lower {
                out.push('_');
            }
            out.push(c.to_ascii_lowercase());
            prev_lower = false;
        } else if c.is_ascii_alphanumeric() {
            out.push(c);
            prev_lower = c.is_ascii_lowercase() || c.is_ascii_digit();
        } else {
            if !out.ends_with('_') {
                out.push('_');
            }
            prev_lower = false;
        }
    }
    let trimmed = out.trim_matches('_');
    if trimmed.is_empty() {
        "node".to_string()
    } else {
        trimmed.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codegen::signature::signature;

    #[test]
    fn test_float_literal() {
        assert_eq!(float_literal(1.0), "1.0");
        assert_eq!(float_literal(0.5), "0.5");
        assert_eq!(float_literal(-2.0), "-2.0");
        assert_eq!(float_literal(f32::NAN), "0.0");
        assert_eq!(float_literal(f32::INFINITY), "0.0");
    }

    #[test]
    fn test_snake_identifier() {
        assert_eq!(snake_identifier("Principled BSDF"), "principled_bsdf");
        assert_eq!(snake_identifier("Mix.001"), "mix_001");
        assert_eq!(snake_identifier("baseColor"), "base_color");
        assert_eq!(snake_identifier("..."), "node");
    }

    #[test]
    fn test_render_invocation() {
        let sig = signature("Math").unwrap();
        let mut inv = KernelInvocation::new(sig)
            .enum_param("OPERATION", "multiply")
            .param(Parameter::Bool(false))
            .comment("Math.001");
        inv.assign("value", "vec4f(2.0, 0.0, 0.0, 0.0)");
        let mut out = String::new();
        inv.render("n_math", &mut out);

        assert!(out.contains("// Math.001"));
        assert!(out.contains("var n_math: Math;"));
        assert!(out.contains("n_math.value = vec4f(2.0, 0.0, 0.0, 0.0);"));
        assert!(out.contains("Math_compute(&n_math, k_Math_OPERATION_MULTIPLY, false, shading);"));
    }

    #[test]
    fn test_unknown_enum_falls_back() {
        let sig = signature("MixRgb").unwrap();
        let inv = KernelInvocation::new(sig).enum_param("BLEND_TYPE", "NOT_A_MODE");
        assert_eq!(
            inv.parameters,
            vec![Parameter::Enum {
                namespace: "BLEND_TYPE",
                value: "MIX"
            }]
        );
    }

    #[test]
    fn test_slot_and_constant_parameters() {
        assert_eq!(render_parameter("TexImage", &Parameter::Slot(3)), "3u");
        assert_eq!(render_parameter("ColorRamp", &Parameter::Int(4)), "4i");
        assert_eq!(
            render_parameter("TexImage", &Parameter::Constant("TEX3_PIXEL_FORMAT".into())),
            "TEX3_PIXEL_FORMAT"
        );
    }
}
