//! SAH-based BVH builder.
//!
//! Constructs a flat BVH array over primitive bounding boxes. The same
//! builder serves both levels: triangles of one shape (bottom level) and
//! instance world bounds (top level).

use super::bvh::{Aabb, BvhNode};

/// Number of SAH bins for split evaluation.
const NUM_BINS: usize = 12;

/// Cost ratio: traversal vs intersection (typical GPU values).
const TRAVERSAL_COST: f32 = 1.0;
const INTERSECT_COST: f32 = 1.0;

/// Maximum primitives per leaf before forcing a split.
const MAX_LEAF_SIZE: usize = 4;

/// Deepest node level; nodes at this depth become leaves regardless of size.
///
/// Stack traversal holds at most `depth + 1` entries, which keeps the
/// 64-entry WGSL stack from overflowing.
pub const MAX_BVH_DEPTH: u32 = 62;

const _: () = assert!(MAX_BVH_DEPTH + 1 <= 64);

/// Built BVH result.
#[derive(Debug, Clone)]
pub struct Bvh {
    /// Flat node array (index 0 = root).
    pub nodes: Vec<BvhNode>,
    /// Reordered primitive indices (leaves reference into this).
    pub primitives: Vec<u32>,
}

impl Bvh {
    pub fn bounds(&self) -> Aabb {
        match self.nodes.first() {
            Some(root) if !root.is_empty() => root.bounds(),
            _ => Aabb::EMPTY,
        }
    }

    /// Edges on the longest root-to-leaf path.
    pub fn depth(&self) -> u32 {
        let mut deepest = 0;
        let mut stack = vec![(0u32, 0u32)];
        while let Some((index, depth)) = stack.pop() {
            let Some(node) = self.nodes.get(index as usize) else {
                continue;
            };
            if node.is_empty() || node.is_leaf() {
                deepest = deepest.max(depth);
                continue;
            }
            stack.push((node.left_or_first, depth + 1));
            stack.push((node.left_or_first + 1, depth + 1));
        }
        deepest
    }
}

/// SAH bin for evaluating split candidates.
struct Bin {
    bounds: Aabb,
    count: usize,
}

impl Bin {
    fn new() -> Self {
        Self {
            bounds: Aabb::EMPTY,
            count: 0,
        }
    }
}

/// Build BVH from primitive bounds using SAH.
///
/// Returns a flat node array + reordered primitive index list.
/// Bounds are NOT modified; indices map into the original slice.
#[tracing::instrument(skip_all, fields(prim_count = bounds.len()))]
pub fn build_bvh(bounds: &[Aabb]) -> Bvh {
    build_bvh_limited(bounds, MAX_BVH_DEPTH)
}

fn build_bvh_limited(bounds: &[Aabb], max_depth: u32) -> Bvh {
    let n = bounds.len();
    if n == 0 {
        return Bvh {
            nodes: vec![BvhNode::EMPTY],
            primitives: vec![],
        };
    }

    let centroids: Vec<[f32; 3]> = bounds.iter().map(Aabb::centroid).collect();

    // Working index array (will be reordered by partitioning)
    let mut indices: Vec<u32> = (0..n as u32).collect();

    // Worst case: 2*n - 1 for a full binary tree
    let mut nodes: Vec<BvhNode> = Vec::with_capacity(2 * n);
    nodes.push(BvhNode::EMPTY);

    struct Task {
        node_idx: usize,
        start: usize,
        end: usize, // exclusive
        depth: u32,
    }

    let mut stack = vec![Task {
        node_idx: 0,
        start: 0,
        end: n,
        depth: 0,
    }];

    while let Some(task) = stack.pop() {
        let start = task.start;
        let end = task.end;
        let count = end - start;

        let mut node_aabb = Aabb::EMPTY;
        for &idx in &indices[start..end] {
            node_aabb.grow(&bounds[idx as usize]);
        }

        if count <= MAX_LEAF_SIZE || task.depth >= max_depth {
            if count > MAX_LEAF_SIZE {
                tracing::debug!(count, depth = task.depth, "depth limit reached, oversized leaf");
            }
            nodes[task.node_idx] = BvhNode::leaf(&node_aabb, start as u32, count as u32);
            continue;
        }

        let mut centroid_bounds = Aabb::EMPTY;
        for &idx in &indices[start..end] {
            centroid_bounds.grow_point(centroids[idx as usize]);
        }

        let (best_axis, best_split_pos, best_cost) =
            find_best_split(&indices[start..end], bounds, &centroids, &centroid_bounds);

        // Cost of not splitting, normalized by parent area
        let leaf_cost = count as f32 * INTERSECT_COST * node_aabb.area();

        if best_cost >= leaf_cost || best_axis == usize::MAX {
            nodes[task.node_idx] = BvhNode::leaf(&node_aabb, start as u32, count as u32);
            continue;
        }

        let mid = partition(&mut indices[start..end], |&idx| {
            centroids[idx as usize][best_axis] < best_split_pos
        }) + start;

        // Degenerate partition: split in the middle
        let mid = if mid == start || mid == end {
            (start + end) / 2
        } else {
            mid
        };

        let left_idx = nodes.len();
        let right_idx = left_idx + 1;
        nodes.push(BvhNode::EMPTY);
        nodes.push(BvhNode::EMPTY);
        nodes[task.node_idx] = BvhNode::internal(&node_aabb, left_idx as u32);

        // Right first so left is processed first (depth-first)
        stack.push(Task {
            node_idx: right_idx,
            start: mid,
            end,
            depth: task.depth + 1,
        });
        stack.push(Task {
            node_idx: left_idx,
            start,
            end: mid,
            depth: task.depth + 1,
        });
    }

    Bvh {
        nodes,
        primitives: indices,
    }
}

/// SAH binned split search across all 3 axes.
/// Returns (best_axis, split_position, cost). axis=usize::MAX if no valid split.
fn find_best_split(
    indices: &[u32],
    bounds: &[Aabb],
    centroids: &[[f32; 3]],
    centroid_bounds: &Aabb,
) -> (usize, f32, f32) {
    let mut best_axis = usize::MAX;
    let mut best_pos = 0.0f32;
    let mut best_cost = f32::INFINITY;

    for axis in 0..3 {
        let extent = centroid_bounds.max[axis] - centroid_bounds.min[axis];
        if extent < 1e-8 {
            continue;
        }

        let mut bins: Vec<Bin> = (0..NUM_BINS).map(|_| Bin::new()).collect();
        let inv_extent = NUM_BINS as f32 / extent;

        for &idx in indices {
            let idx = idx as usize;
            let bin_id = ((centroids[idx][axis] - centroid_bounds.min[axis]) * inv_extent) as usize;
            let bin_id = bin_id.min(NUM_BINS - 1);
            bins[bin_id].bounds.grow(&bounds[idx]);
            bins[bin_id].count += 1;
        }

        // Sweep from left: prefix areas and counts
        let mut left_area = [0.0f32; NUM_BINS - 1];
        let mut left_count = [0usize; NUM_BINS - 1];
        let mut sweep = Aabb::EMPTY;
        let mut sweep_count = 0;
        for i in 0..NUM_BINS - 1 {
            sweep.grow(&bins[i].bounds);
            sweep_count += bins[i].count;
            left_area[i] = sweep.area();
            left_count[i] = sweep_count;
        }

        // Sweep from right and evaluate SAH cost
        sweep = Aabb::EMPTY;
        sweep_count = 0;
        for i in (1..NUM_BINS).rev() {
            sweep.grow(&bins[i].bounds);
            sweep_count += bins[i].count;
            let cost = TRAVERSAL_COST
                + INTERSECT_COST
                    * (left_count[i - 1] as f32 * left_area[i - 1]
                        + sweep_count as f32 * sweep.area());

            if cost < best_cost {
                best_cost = cost;
                best_axis = axis;
                best_pos = centroid_bounds.min[axis] + (i as f32 / NUM_BINS as f32) * extent;
            }
        }
    }

    (best_axis, best_pos, best_cost)
}

/// Partition slice in-place. Returns count of elements where predicate is true.
fn partition<T, F>(slice: &mut [T], pred: F) -> usize
where
    F: Fn(&T) -> bool,
{
    let mut left = 0;
    let mut right = slice.len();
    while left < right {
        if pred(&slice[left]) {
            left += 1;
        } else {
            right -= 1;
            slice.swap(left, right);
        }
    }
    left
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_box(cx: f32, cy: f32, cz: f32) -> Aabb {
        Aabb {
            min: [cx - 0.5, cy - 0.5, cz],
            max: [cx + 0.5, cy + 0.5, cz],
        }
    }

    #[test]
    fn test_empty_bvh() {
        let bvh = build_bvh(&[]);
        assert_eq!(bvh.nodes.len(), 1);
        assert_eq!(bvh.primitives.len(), 0);
        assert!(bvh.nodes[0].is_empty());
    }

    #[test]
    fn test_single_primitive() {
        let bvh = build_bvh(&[make_box(0.0, 0.0, 0.0)]);
        assert_eq!(bvh.nodes.len(), 1);
        assert_eq!(bvh.nodes[0].count, 1);
        assert_eq!(bvh.primitives, vec![0]);
    }

    #[test]
    fn test_many_primitives_builds_tree() {
        let boxes: Vec<Aabb> = (0..100).map(|i| make_box(i as f32 * 2.0, 0.0, 0.0)).collect();
        let bvh = build_bvh(&boxes);

        assert!(bvh.nodes.len() > 1, "BVH should have internal nodes");

        let mut sorted = bvh.primitives.clone();
        sorted.sort();
        assert_eq!(sorted, (0..100).collect::<Vec<_>>());

        let root = &bvh.nodes[0];
        assert!(root.aabb_min[0] < 0.0);
        assert!(root.aabb_max[0] > 198.0);
    }

    #[test]
    fn test_leaf_count_correct() {
        let boxes = vec![
            make_box(0.0, 0.0, 0.0),
            make_box(1.0, 0.0, 0.0),
            make_box(2.0, 0.0, 0.0),
        ];
        let bvh = build_bvh(&boxes);
        assert_eq!(bvh.nodes[0].count, 3);
    }

    #[test]
    fn test_leaves_cover_every_primitive_once() {
        let boxes: Vec<Aabb> = (0..37)
            .map(|i| make_box((i % 7) as f32 * 3.0, (i / 7) as f32 * 3.0, 0.0))
            .collect();
        let bvh = build_bvh(&boxes);
        let mut seen = vec![0u32; boxes.len()];
        for node in bvh.nodes.iter().filter(|n| n.is_leaf()) {
            let first = node.left_or_first as usize;
            for &prim in &bvh.primitives[first..first + node.count as usize] {
                seen[prim as usize] += 1;
            }
        }
        assert!(seen.iter().all(|&c| c == 1));
    }

    fn leaf_primitives(bvh: &Bvh) -> Vec<u32> {
        let mut prims: Vec<u32> = bvh
            .nodes
            .iter()
            .filter(|n| n.is_leaf())
            .flat_map(|n| {
                let first = n.left_or_first as usize;
                bvh.primitives[first..first + n.count as usize].to_vec()
            })
            .collect();
        prims.sort();
        prims
    }

    #[test]
    fn test_depth_limit_makes_large_leaves() {
        let boxes: Vec<Aabb> = (0..64).map(|i| make_box(i as f32 * 2.0, 0.0, 0.0)).collect();
        let bvh = build_bvh_limited(&boxes, 2);
        assert!(bvh.depth() <= 2);
        assert_eq!(leaf_primitives(&bvh), (0..64).collect::<Vec<_>>());
        assert!(bvh.nodes.iter().any(|n| n.is_leaf() && n.count as usize > MAX_LEAF_SIZE));
    }

    #[test]
    fn test_skewed_input_stays_within_stack() {
        // geometric spacing drives the builder toward a chain
        let boxes: Vec<Aabb> = (0..400)
            .map(|i| {
                let x = 1.1f32.powi(i);
                Aabb {
                    min: [x, 0.0, 0.0],
                    max: [x * 1.01, 1.0, 1.0],
                }
            })
            .collect();
        let bvh = build_bvh(&boxes);
        assert!(bvh.depth() <= MAX_BVH_DEPTH);
        assert_eq!(leaf_primitives(&bvh), (0..400).collect::<Vec<_>>());
    }
}
