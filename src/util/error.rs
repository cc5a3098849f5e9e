//! Error types for wavetrace.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for scene loading, shader compilation and rendering.
#[derive(Error, Debug)]
pub enum Error {
    /// Node graph reaches itself through its links
    #[error("Cycle detected at node '{node}'")]
    CycleDetected { node: String },

    /// Non-shader input with more than one incoming link
    #[error("Input '{input}' of node '{node}' has more than one link")]
    MultiInputDetected { node: String, input: String },

    /// Node type with no code generation rule
    #[error("Unsupported kernel: {0}")]
    UnsupportedKernel(String),

    /// Link or lookup naming a node that does not exist
    #[error("Node not found: {0}")]
    MissingNode(String),

    /// Material referenced by name but never registered
    #[error("Material not found: {0}")]
    MissingMaterial(String),

    /// Shape referenced by an entity but never registered
    #[error("Shape not found: {0}")]
    MissingShape(String),

    /// Scene without a world light
    #[error("Scene has no world light")]
    MissingWorldLight,

    /// Scene with more than one world light
    #[error("Scene has {0} world lights, expected exactly one")]
    MultipleWorldLights(usize),

    /// Mesh file could not be parsed
    #[error("Mesh error in {path}: {message}")]
    Mesh { path: PathBuf, message: String },

    /// Generated shader library rejected by the device
    #[error("Shader compilation failed: {0}")]
    ShaderCompile(String),

    /// Device creation, validation or submission failure
    #[error("GPU error: {0}")]
    Gpu(String),

    /// Device ran out of memory during allocation
    #[error("GPU out of memory: {0}")]
    OutOfMemory(String),

    /// Image decode or encode failure
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    /// Scene or graph JSON failure
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Node graph with malformed parameters
    #[error("Graph error: {0}")]
    Graph(#[from] shader_graph::GraphError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error with message
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create an "other" error from a string.
    pub fn other(msg: impl Into<String>) -> Self {
        Self::Other(msg.into())
    }

    /// Create a GPU error.
    pub fn gpu(msg: impl Into<String>) -> Self {
        Self::Gpu(msg.into())
    }

    /// Create a mesh parse error.
    pub fn mesh(path: impl Into<PathBuf>, msg: impl Into<String>) -> Self {
        Self::Mesh {
            path: path.into(),
            message: msg.into(),
        }
    }
}

/// Result type alias for wavetrace operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let e = Error::CycleDetected { node: "Mix".into() };
        assert!(e.to_string().contains("Mix"));

        let e = Error::MultiInputDetected {
            node: "Math".into(),
            input: "Value_001".into(),
        };
        assert!(e.to_string().contains("Math"));
        assert!(e.to_string().contains("Value_001"));

        let e = Error::MultipleWorldLights(2);
        assert!(e.to_string().contains('2'));
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "test");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
    }
}
