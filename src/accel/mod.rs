//! Software two-level BVH.
//!
//! - [`bvh`] - bounding boxes and the 32-byte GPU node
//! - [`build`] - SAH binned builder
//! - [`tlas`] - per-shape bottom levels packed under an instance top level

pub mod build;
pub mod bvh;
pub mod tlas;

pub use build::{build_bvh, Bvh, MAX_BVH_DEPTH};
pub use bvh::{Aabb, BvhNode};
pub use tlas::{intersect_triangle, AccelerationStructure, TlasInstance, TraceHit};
