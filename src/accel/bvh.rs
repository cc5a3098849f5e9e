//! Bounding boxes and the flat BVH node layout shared with WGSL.
//!
//! Flat array layout for GPU traversal:
//! - 32-byte nodes (two per cache line)
//! - leaves reference a contiguous run of the primitive index array

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec3, Vec4Swizzles};

/// Axis-aligned bounding box.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    pub min: [f32; 3],
    pub max: [f32; 3],
}

impl Default for Aabb {
    fn default() -> Self {
        Self::EMPTY
    }
}

impl Aabb {
    pub const EMPTY: Self = Self {
        min: [f32::INFINITY; 3],
        max: [f32::NEG_INFINITY; 3],
    };

    pub fn from_points(points: impl IntoIterator<Item = [f32; 3]>) -> Self {
        let mut b = Self::EMPTY;
        for p in points {
            b.grow_point(p);
        }
        b
    }

    /// Grow to include a point.
    #[inline]
    pub fn grow_point(&mut self, p: [f32; 3]) {
        for i in 0..3 {
            self.min[i] = self.min[i].min(p[i]);
            self.max[i] = self.max[i].max(p[i]);
        }
    }

    /// Grow to include another AABB.
    #[inline]
    pub fn grow(&mut self, other: &Aabb) {
        for i in 0..3 {
            self.min[i] = self.min[i].min(other.min[i]);
            self.max[i] = self.max[i].max(other.max[i]);
        }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        (0..3).any(|i| self.min[i] > self.max[i])
    }

    /// Surface area (for SAH cost).
    #[inline]
    pub fn area(&self) -> f32 {
        if self.is_empty() {
            return 0.0;
        }
        let [dx, dy, dz] = self.size();
        2.0 * (dx * dy + dy * dz + dz * dx)
    }

    #[inline]
    pub fn size(&self) -> [f32; 3] {
        [
            self.max[0] - self.min[0],
            self.max[1] - self.min[1],
            self.max[2] - self.min[2],
        ]
    }

    /// Longest axis (0=x, 1=y, 2=z).
    #[inline]
    pub fn longest_axis(&self) -> usize {
        let [dx, dy, dz] = self.size();
        if dx >= dy && dx >= dz {
            0
        } else if dy >= dz {
            1
        } else {
            2
        }
    }

    /// Centroid of the AABB.
    #[inline]
    pub fn centroid(&self) -> [f32; 3] {
        [
            (self.min[0] + self.max[0]) * 0.5,
            (self.min[1] + self.max[1]) * 0.5,
            (self.min[2] + self.max[2]) * 0.5,
        ]
    }

    /// Bounds of all eight corners after `m`, with perspective divide.
    pub fn transformed(&self, m: &Mat4) -> Aabb {
        if self.is_empty() {
            return *self;
        }
        let mut out = Aabb::EMPTY;
        for corner in 0..8 {
            let local = Vec3::new(
                if corner & 1 == 0 { self.min[0] } else { self.max[0] },
                if corner & 2 == 0 { self.min[1] } else { self.max[1] },
                if corner & 4 == 0 { self.min[2] } else { self.max[2] },
            );
            let p = *m * local.extend(1.0);
            out.grow_point((p.xyz() / p.w).to_array());
        }
        out
    }

    /// Slab test; returns the entry distance when the ray hits within `t_max`.
    pub fn intersect(&self, origin: Vec3, inv_dir: Vec3, t_max: f32) -> Option<f32> {
        let min = Vec3::from_array(self.min);
        let max = Vec3::from_array(self.max);
        let t0 = (min - origin) * inv_dir;
        let t1 = (max - origin) * inv_dir;
        let near = t0.min(t1).max_element().max(0.0);
        let far = t0.max(t1).min_element().min(t_max);
        (near <= far).then_some(near)
    }
}

/// GPU-friendly BVH node (32 bytes, matches the WGSL `BvhNode`).
///
/// Internal node: left_or_first = left child index (right = left + 1), count = 0
/// Leaf node: left_or_first = first primitive slot, count > 0
/// Empty tree: a single internal node with left_or_first = 0. Node 0 of a
/// packed structure is never anyone's child, so traversal skips such nodes.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct BvhNode {
    pub aabb_min: [f32; 3],
    pub left_or_first: u32,
    pub aabb_max: [f32; 3],
    pub count: u32,
}

impl BvhNode {
    /// Root of a tree with no primitives.
    pub const EMPTY: Self = Self {
        aabb_min: [0.0; 3],
        left_or_first: 0,
        aabb_max: [0.0; 3],
        count: 0,
    };

    pub fn leaf(bounds: &Aabb, first: u32, count: u32) -> Self {
        Self {
            aabb_min: bounds.min,
            left_or_first: first,
            aabb_max: bounds.max,
            count,
        }
    }

    pub fn internal(bounds: &Aabb, left: u32) -> Self {
        Self {
            aabb_min: bounds.min,
            left_or_first: left,
            aabb_max: bounds.max,
            count: 0,
        }
    }

    #[inline]
    pub fn is_leaf(&self) -> bool {
        self.count > 0
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.count == 0 && self.left_or_first == 0
    }

    pub fn bounds(&self) -> Aabb {
        Aabb {
            min: self.aabb_min,
            max: self.aabb_max,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_is_32_bytes() {
        assert_eq!(std::mem::size_of::<BvhNode>(), 32);
    }

    #[test]
    fn test_transformed_box() {
        let b = Aabb {
            min: [-1.0; 3],
            max: [1.0; 3],
        };
        let m = Mat4::from_translation(Vec3::new(10.0, 0.0, 0.0))
            * Mat4::from_scale(Vec3::new(2.0, 1.0, 1.0));
        let t = b.transformed(&m);
        assert_eq!(t.min, [8.0, -1.0, -1.0]);
        assert_eq!(t.max, [12.0, 1.0, 1.0]);
    }

    #[test]
    fn test_rotated_box_is_conservative() {
        let b = Aabb {
            min: [-1.0; 3],
            max: [1.0; 3],
        };
        let t = b.transformed(&Mat4::from_rotation_z(std::f32::consts::FRAC_PI_4));
        let r = 2f32.sqrt();
        assert!((t.max[0] - r).abs() < 1e-5);
        assert!((t.min[1] + r).abs() < 1e-5);
        assert_eq!(t.max[2], 1.0);
    }

    #[test]
    fn test_slab_intersection() {
        let b = Aabb {
            min: [-1.0; 3],
            max: [1.0; 3],
        };
        let origin = Vec3::new(-5.0, 0.0, 0.0);
        let inv = Vec3::new(1.0, 0.0, 0.0).recip();
        assert_eq!(b.intersect(origin, inv, 100.0), Some(4.0));
        assert_eq!(b.intersect(origin, inv, 3.0), None);
        assert_eq!(b.intersect(origin, -inv, 100.0), None);
    }
}
