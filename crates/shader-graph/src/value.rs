//! Socket values, links and input descriptors.

use serde::Deserialize;

/// Literal value stored on an unlinked input.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Scalar(f32),
    Vector(Vec<f32>),
}

impl Value {
    /// Components padded (or truncated) to four lanes.
    ///
    /// Scalars are splatted. Missing vector lanes take `fill`.
    pub fn to_vec4(&self, fill: f32) -> [f32; 4] {
        match self {
            Value::Scalar(v) => [*v; 4],
            Value::Vector(values) => {
                let mut out = [0.0, 0.0, 0.0, fill];
                for (dst, src) in out.iter_mut().zip(values.iter()) {
                    *dst = *src;
                }
                out
            }
        }
    }

    /// True when every component is zero.
    pub fn is_zero(&self) -> bool {
        match self {
            Value::Scalar(v) => *v == 0.0,
            Value::Vector(values) => values.iter().all(|v| *v == 0.0),
        }
    }
}

/// Reference to an output property of another node.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize)]
#[serde(from = "(String, String)")]
pub struct Link {
    pub node: String,
    pub property: String,
}

impl From<(String, String)> for Link {
    fn from((node, property): (String, String)) -> Self {
        Self { node, property }
    }
}

impl Link {
    pub fn new(node: impl Into<String>, property: impl Into<String>) -> Self {
        Self {
            node: node.into(),
            property: property.into(),
        }
    }
}

/// Socket data type as reported by the exporter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SocketType {
    Value,
    Int,
    Boolean,
    Vector,
    Rgba,
    Shader,
    String,
    #[serde(other)]
    Other,
}

impl SocketType {
    /// Socket carries a closure rather than data.
    pub fn is_shader(self) -> bool {
        self == SocketType::Shader
    }
}

/// One named input of a node.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Input {
    #[serde(rename = "type")]
    pub ty: SocketType,
    #[serde(default)]
    pub links: Vec<Link>,
    #[serde(default)]
    pub value: Option<Value>,
}

impl Input {
    pub fn literal(ty: SocketType, value: Value) -> Self {
        Self {
            ty,
            links: Vec::new(),
            value: Some(value),
        }
    }

    pub fn linked(ty: SocketType, link: Link) -> Self {
        Self {
            ty,
            links: vec![link],
            value: None,
        }
    }

    pub fn is_linked(&self) -> bool {
        !self.links.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_padding() {
        assert_eq!(Value::Scalar(0.5).to_vec4(1.0), [0.5; 4]);
        assert_eq!(
            Value::Vector(vec![1.0, 2.0, 3.0]).to_vec4(1.0),
            [1.0, 2.0, 3.0, 1.0]
        );
        assert_eq!(
            Value::Vector(vec![1.0, 2.0, 3.0]).to_vec4(0.0),
            [1.0, 2.0, 3.0, 0.0]
        );
    }

    #[test]
    fn test_input_from_json() {
        let input: Input =
            serde_json::from_str(r#"{"type": "SHADER", "links": [["BSDF", "BSDF"]]}"#).unwrap();
        assert_eq!(input.ty, SocketType::Shader);
        assert_eq!(input.links, vec![Link::new("BSDF", "BSDF")]);
        assert!(input.value.is_none());

        let input: Input = serde_json::from_str(r#"{"type": "CUSTOM", "value": 2.0}"#).unwrap();
        assert_eq!(input.ty, SocketType::Other);
        assert_eq!(input.value, Some(Value::Scalar(2.0)));
    }
}
