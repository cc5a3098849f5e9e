//! Node-graph object model for wavetrace materials and lights.
//!
//! A material is a directed graph of shading nodes, keyed by node name.
//! Every node carries a [`Kernel`] (its type plus typed parameters) and a
//! set of named inputs. An input either holds a literal [`Value`] or links
//! to an output property of another node.
//!
//! Graphs are read from the exporter's JSON layout:
//!
//! ```json
//! {
//!   "Emission": {
//!     "type": "EMISSION",
//!     "inputs": {
//!       "Color": { "type": "RGBA", "value": [1.0, 0.5, 0.2, 1.0] },
//!       "Strength": { "type": "VALUE", "value": 4.0 }
//!     },
//!     "parameters": {}
//!   },
//!   "Material Output": {
//!     "type": "OUTPUT_MATERIAL",
//!     "inputs": {
//!       "Surface": { "type": "SHADER", "links": [["Emission", "Emission"]] }
//!     }
//!   }
//! }
//! ```

mod graph;
mod kernel;
mod value;

pub use graph::{GraphError, Node, NodeGraph};
pub use kernel::*;
pub use value::{Input, Link, SocketType, Value};
