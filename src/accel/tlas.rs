//! Two-level acceleration structure.
//!
//! One bottom-level BVH per shape, one top-level BVH over instance world
//! bounds. All levels are packed into a single node array and a single
//! primitive-index array so the kernels bind two buffers:
//!
//! ```text
//! nodes:      [ TLAS | BLAS 0 | BLAS 1 | ... ]
//! primitives: [ instance ids | shape 0 face ids | shape 1 face ids | ... ]
//! ```
//!
//! Child and leaf indices are rebased to absolute positions while packing,
//! so traversal needs only the root index of each level.

use glam::{Mat4, Vec3};
use smallvec::{smallvec, SmallVec};

use super::build::{build_bvh, Bvh};
use super::bvh::{Aabb, BvhNode};

/// Instance as seen by the top level.
#[derive(Debug, Clone, Copy)]
pub struct TlasInstance {
    /// Index of the bottom-level structure (shape index).
    pub blas: u32,
    /// World-space bounds.
    pub bounds: Aabb,
    pub world_to_object: Mat4,
}

/// Closest hit reported by [`AccelerationStructure::intersect`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TraceHit {
    pub distance: f32,
    pub instance: u32,
    pub primitive: u32,
    pub barycentric: [f32; 2],
}

/// Packed two-level BVH.
#[derive(Debug, Clone, Default)]
pub struct AccelerationStructure {
    pub nodes: Vec<BvhNode>,
    pub primitives: Vec<u32>,
    /// Absolute root node of each bottom-level structure.
    pub blas_roots: Vec<u32>,
    pub instance_count: u32,
}

impl AccelerationStructure {
    /// Packs per-shape BVHs under a top level built over `instances`.
    ///
    /// Top-level leaves store instance indices in the order given, so an
    /// intersection's instance index addresses the same position in the
    /// per-instance buffer.
    #[tracing::instrument(skip_all, fields(shapes = blases.len(), instances = instances.len()))]
    pub fn build(blases: &[Bvh], instances: &[TlasInstance]) -> Self {
        let instance_bounds: Vec<Aabb> = instances.iter().map(|i| i.bounds).collect();
        let tlas = build_bvh(&instance_bounds);

        let node_total = tlas.nodes.len() + blases.iter().map(|b| b.nodes.len()).sum::<usize>();
        let prim_total =
            tlas.primitives.len() + blases.iter().map(|b| b.primitives.len()).sum::<usize>();
        let mut nodes = Vec::with_capacity(node_total);
        let mut primitives = Vec::with_capacity(prim_total);
        let mut blas_roots = Vec::with_capacity(blases.len());

        append(&mut nodes, &mut primitives, &tlas);
        for blas in blases {
            blas_roots.push(nodes.len() as u32);
            append(&mut nodes, &mut primitives, blas);
        }

        tracing::debug!(nodes = nodes.len(), primitives = primitives.len(), "acceleration structure packed");
        Self {
            nodes,
            primitives,
            blas_roots,
            instance_count: instances.len() as u32,
        }
    }

    /// CPU closest-hit traversal mirroring the WGSL kernel.
    ///
    /// `triangle(blas, primitive)` returns the object-space vertices of a
    /// bottom-level primitive.
    pub fn intersect(
        &self,
        origin: Vec3,
        direction: Vec3,
        t_max: f32,
        instances: &[TlasInstance],
        triangle: impl Fn(u32, u32) -> [Vec3; 3],
    ) -> Option<TraceHit> {
        let mut best: Option<TraceHit> = None;
        let mut closest = t_max;
        let inv_dir = direction.recip();

        // inline capacity matches the WGSL STACK_SIZE
        let mut stack: SmallVec<[u32; 64]> = smallvec![0u32];
        while let Some(index) = stack.pop() {
            let node = &self.nodes[index as usize];
            if node.is_empty() || node.bounds().intersect(origin, inv_dir, closest).is_none() {
                continue;
            }
            if !node.is_leaf() {
                stack.push(node.left_or_first);
                stack.push(node.left_or_first + 1);
                continue;
            }
            for slot in node.left_or_first..node.left_or_first + node.count {
                let instance_index = self.primitives[slot as usize];
                let instance = &instances[instance_index as usize];
                let local_origin = instance.world_to_object.transform_point3(origin);
                let local_dir = instance.world_to_object.transform_vector3(direction);
                let root = self.blas_roots[instance.blas as usize];
                if let Some((t, primitive, bary)) = self.intersect_blas(
                    root,
                    local_origin,
                    local_dir,
                    closest,
                    |prim| triangle(instance.blas, prim),
                ) {
                    closest = t;
                    best = Some(TraceHit {
                        distance: t,
                        instance: instance_index,
                        primitive,
                        barycentric: bary,
                    });
                }
            }
        }
        best
    }

    fn intersect_blas(
        &self,
        root: u32,
        origin: Vec3,
        direction: Vec3,
        t_max: f32,
        triangle: impl Fn(u32) -> [Vec3; 3],
    ) -> Option<(f32, u32, [f32; 2])> {
        let mut best = None;
        let mut closest = t_max;
        let inv_dir = direction.recip();
        let mut stack: SmallVec<[u32; 64]> = smallvec![root];
        while let Some(index) = stack.pop() {
            let node = &self.nodes[index as usize];
            if node.is_empty() || node.bounds().intersect(origin, inv_dir, closest).is_none() {
                continue;
            }
            if !node.is_leaf() {
                stack.push(node.left_or_first);
                stack.push(node.left_or_first + 1);
                continue;
            }
            for slot in node.left_or_first..node.left_or_first + node.count {
                let primitive = self.primitives[slot as usize];
                if let Some((t, u, v)) = intersect_triangle(origin, direction, triangle(primitive)) {
                    if t < closest {
                        closest = t;
                        best = Some((t, primitive, [u, v]));
                    }
                }
            }
        }
        best
    }
}

fn append(nodes: &mut Vec<BvhNode>, primitives: &mut Vec<u32>, bvh: &Bvh) {
    let node_base = nodes.len() as u32;
    let prim_base = primitives.len() as u32;
    nodes.extend(bvh.nodes.iter().map(|node| {
        let mut node = *node;
        if node.is_leaf() {
            node.left_or_first += prim_base;
        } else if !node.is_empty() {
            node.left_or_first += node_base;
        }
        node
    }));
    primitives.extend_from_slice(&bvh.primitives);
}

/// Möller-Trumbore; returns (t, u, v) for hits in front of the origin.
pub fn intersect_triangle(origin: Vec3, direction: Vec3, [v0, v1, v2]: [Vec3; 3]) -> Option<(f32, f32, f32)> {
    let e1 = v1 - v0;
    let e2 = v2 - v0;
    let p = direction.cross(e2);
    let det = e1.dot(p);
    if det.abs() < 1e-12 {
        return None;
    }
    let inv_det = 1.0 / det;
    let s = origin - v0;
    let u = s.dot(p) * inv_det;
    if !(0.0..=1.0).contains(&u) {
        return None;
    }
    let q = s.cross(e1);
    let v = direction.dot(q) * inv_det;
    if v < 0.0 || u + v > 1.0 {
        return None;
    }
    let t = e2.dot(q) * inv_det;
    (t > 1e-6).then_some((t, u, v))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quad() -> Vec<[Vec3; 3]> {
        vec![
            [
                Vec3::new(-1.0, -1.0, 0.0),
                Vec3::new(1.0, -1.0, 0.0),
                Vec3::new(1.0, 1.0, 0.0),
            ],
            [
                Vec3::new(-1.0, -1.0, 0.0),
                Vec3::new(1.0, 1.0, 0.0),
                Vec3::new(-1.0, 1.0, 0.0),
            ],
        ]
    }

    fn blas_for(tris: &[[Vec3; 3]]) -> Bvh {
        let bounds: Vec<Aabb> = tris
            .iter()
            .map(|t| Aabb::from_points(t.iter().map(|v| v.to_array())))
            .collect();
        build_bvh(&bounds)
    }

    fn instance(blas: u32, tris: &[[Vec3; 3]], transform: Mat4) -> TlasInstance {
        let local = Aabb::from_points(tris.iter().flat_map(|t| t.iter().map(|v| v.to_array())));
        TlasInstance {
            blas,
            bounds: local.transformed(&transform),
            world_to_object: transform.inverse(),
        }
    }

    #[test]
    fn test_instance_index_round_trip() {
        let tris = quad();
        let blas = blas_for(&tris);
        let instances: Vec<TlasInstance> = (0..5)
            .map(|i| instance(0, &tris, Mat4::from_translation(Vec3::new(i as f32 * 5.0, 0.0, 0.0))))
            .collect();
        let accel = AccelerationStructure::build(&[blas], &instances);

        for k in 0..5u32 {
            let origin = Vec3::new(k as f32 * 5.0 + 0.1, 0.2, 10.0);
            let hit = accel
                .intersect(origin, Vec3::NEG_Z, f32::MAX, &instances, |_, p| tris[p as usize])
                .expect("ray should hit instance");
            assert_eq!(hit.instance, k);
            assert!((hit.distance - 10.0).abs() < 1e-4);
        }
    }

    #[test]
    fn test_closest_instance_wins() {
        let tris = quad();
        let blas = blas_for(&tris);
        let instances = vec![
            instance(0, &tris, Mat4::from_translation(Vec3::new(0.0, 0.0, -4.0))),
            instance(0, &tris, Mat4::from_translation(Vec3::new(0.0, 0.0, 2.0))),
        ];
        let accel = AccelerationStructure::build(&[blas], &instances);
        let hit = accel
            .intersect(Vec3::new(0.0, 0.0, 10.0), Vec3::NEG_Z, f32::MAX, &instances, |_, p| {
                tris[p as usize]
            })
            .unwrap();
        assert_eq!(hit.instance, 1);
        assert!((hit.distance - 8.0).abs() < 1e-4);
    }

    #[test]
    fn test_blas_roots_are_rebased() {
        let tris = quad();
        let a = blas_for(&tris);
        let b = blas_for(&tris[..1]);
        let instances = vec![
            instance(0, &tris, Mat4::IDENTITY),
            instance(1, &tris[..1], Mat4::from_translation(Vec3::X * 4.0)),
        ];
        let accel = AccelerationStructure::build(&[a.clone(), b], &instances);
        assert_eq!(accel.blas_roots.len(), 2);
        assert_eq!(accel.blas_roots[1] as usize, accel.blas_roots[0] as usize + a.nodes.len());
        assert_eq!(accel.instance_count, 2);

        let miss = accel.intersect(
            Vec3::new(3.5, 0.5, 1.0),
            Vec3::NEG_Z,
            f32::MAX,
            &instances,
            |blas, p| if blas == 0 { tris[p as usize] } else { tris[0] },
        );
        assert!(miss.is_none(), "upper-left half of the second quad is absent");
    }

    #[test]
    fn test_empty_scene() {
        let accel = AccelerationStructure::build(&[], &[]);
        assert_eq!(accel.nodes.len(), 1);
        assert!(accel
            .intersect(Vec3::ZERO, Vec3::Z, f32::MAX, &[], |_, _| [Vec3::ZERO; 3])
            .is_none());
    }
}
