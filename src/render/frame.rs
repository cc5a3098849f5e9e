//! Per-frame command plan.
//!
//! A frame is a fixed sequence of [`Step`]s derived from the bounce depth
//! alone; the encoder walks the list and issues one compute dispatch (or
//! buffer clear) per step. Keeping the plan as data makes the ordering
//! testable without a device.

use crate::scene::PassUniforms;

/// Dynamic-offset stride of the per-pass uniform blocks.
pub const PASS_STRIDE: u64 = 256;

/// Counter indices for a bounce depth of `max_depth`.
///
/// ```text
/// [ rays 0..=D | shadow rays 0..D | terminated 0..D ]
/// ```
///
/// `rays(D)` exists so the last depth's (empty) continuation has a slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CounterLayout {
    pub max_depth: u32,
}

impl CounterLayout {
    pub fn new(max_depth: u32) -> Self {
        Self { max_depth }
    }

    pub fn rays(&self, depth: u32) -> u32 {
        depth
    }

    pub fn shadow_rays(&self, depth: u32) -> u32 {
        self.max_depth + 1 + depth
    }

    pub fn terminated(&self, depth: u32) -> u32 {
        2 * self.max_depth + 1 + depth
    }

    pub fn len(&self) -> u32 {
        3 * self.max_depth + 1
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    pub fn bytes(&self) -> u64 {
        self.len() as u64 * 4
    }
}

/// Which wavefront a dispatch-args step sizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Wavefront {
    Rays,
    ShadowRays,
}

/// One encoded operation of a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    ClearCounters,
    ClearAccumulation,
    GenerateCameraRays,
    /// Converts a live count into indirect args; `pass` selects the
    /// uniform block (and thereby the counter and args slot).
    DispatchArgs { pass: u32 },
    TraceNearest { depth: u32, pass: u32 },
    Shade { depth: u32, pass: u32 },
    TraceShadow { depth: u32, pass: u32 },
    ShadeShadow { depth: u32, pass: u32 },
    ResolveImage,
}

/// Uniform block index for `wavefront` at `depth`.
pub fn pass_index(depth: u32, wavefront: Wavefront) -> u32 {
    match wavefront {
        Wavefront::Rays => 2 * depth,
        Wavefront::ShadowRays => 2 * depth + 1,
    }
}

/// Per-pass uniforms, two blocks per depth (rays, then shadow rays).
///
/// `capacity` is the size of one ray-buffer half; depth `d` reads half
/// `d % 2` and writes continuations into the other.
pub fn pass_uniforms(max_depth: u32, capacity: u32) -> Vec<PassUniforms> {
    let counters = CounterLayout::new(max_depth);
    (0..max_depth)
        .flat_map(|depth| {
            let base = PassUniforms {
                depth,
                current_base: (depth % 2) * capacity,
                next_base: ((depth + 1) % 2) * capacity,
                is_last: (depth + 1 == max_depth) as u32,
                ..Default::default()
            };
            [
                PassUniforms {
                    counter_index: counters.rays(depth),
                    args_slot: pass_index(depth, Wavefront::Rays),
                    ..base
                },
                PassUniforms {
                    counter_index: counters.shadow_rays(depth),
                    args_slot: pass_index(depth, Wavefront::ShadowRays),
                    ..base
                },
            ]
        })
        .collect()
}

/// Uniform blocks padded to [`PASS_STRIDE`].
pub fn pass_uniform_bytes(passes: &[PassUniforms]) -> Vec<u8> {
    let stride = PASS_STRIDE as usize;
    let mut bytes = vec![0u8; passes.len().max(1) * stride];
    for (i, pass) in passes.iter().enumerate() {
        let block = bytemuck::bytes_of(pass);
        bytes[i * stride..i * stride + block.len()].copy_from_slice(block);
    }
    bytes
}

/// Steps of one frame.
///
/// Every depth sizes its dispatches from the GPU-written counter, even
/// when that count is zero. The last depth shades without spawning, so its
/// shadow stages are left out.
pub fn plan(max_depth: u32, clear_accumulation: bool) -> Vec<Step> {
    let mut steps = Vec::with_capacity(4 + 6 * max_depth as usize);
    steps.push(Step::ClearCounters);
    if clear_accumulation {
        steps.push(Step::ClearAccumulation);
    }
    steps.push(Step::GenerateCameraRays);
    for depth in 0..max_depth {
        let pass = pass_index(depth, Wavefront::Rays);
        steps.push(Step::DispatchArgs { pass });
        steps.push(Step::TraceNearest { depth, pass });
        steps.push(Step::Shade { depth, pass });
        if depth + 1 < max_depth {
            let pass = pass_index(depth, Wavefront::ShadowRays);
            steps.push(Step::DispatchArgs { pass });
            steps.push(Step::TraceShadow { depth, pass });
            steps.push(Step::ShadeShadow { depth, pass });
        }
    }
    steps.push(Step::ResolveImage);
    steps
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counter_layout() {
        let counters = CounterLayout::new(4);
        assert_eq!(counters.rays(4), 4);
        assert_eq!(counters.shadow_rays(0), 5);
        assert_eq!(counters.terminated(0), 9);
        assert_eq!(counters.terminated(3), 12);
        assert_eq!(counters.len(), 13);
    }

    #[test]
    fn test_pass_uniforms_ping_pong() {
        let passes = pass_uniforms(3, 100);
        assert_eq!(passes.len(), 6);
        assert_eq!((passes[0].current_base, passes[0].next_base), (0, 100));
        assert_eq!((passes[2].current_base, passes[2].next_base), (100, 0));
        assert_eq!((passes[4].current_base, passes[4].next_base), (0, 100));
        assert_eq!(passes[1].counter_index, CounterLayout::new(3).shadow_rays(0));
        assert_eq!(passes[3].args_slot, 3);
        assert_eq!(passes[4].is_last, 1);
        assert_eq!(passes[2].is_last, 0);
    }

    #[test]
    fn test_plan_order() {
        let steps = plan(2, true);
        assert_eq!(
            steps,
            vec![
                Step::ClearCounters,
                Step::ClearAccumulation,
                Step::GenerateCameraRays,
                Step::DispatchArgs { pass: 0 },
                Step::TraceNearest { depth: 0, pass: 0 },
                Step::Shade { depth: 0, pass: 0 },
                Step::DispatchArgs { pass: 1 },
                Step::TraceShadow { depth: 0, pass: 1 },
                Step::ShadeShadow { depth: 0, pass: 1 },
                Step::DispatchArgs { pass: 2 },
                Step::TraceNearest { depth: 1, pass: 2 },
                Step::Shade { depth: 1, pass: 2 },
                Step::ResolveImage,
            ]
        );
    }

    #[test]
    fn test_every_depth_is_shaded() {
        let steps = plan(8, false);
        assert!(!steps.contains(&Step::ClearAccumulation));
        let shaded = steps.iter().filter(|s| matches!(s, Step::Shade { .. })).count();
        let shadowed = steps.iter().filter(|s| matches!(s, Step::TraceShadow { .. })).count();
        assert_eq!(shaded, 8);
        assert_eq!(shadowed, 7);
    }

    #[test]
    fn test_uniform_bytes_stride() {
        let passes = pass_uniforms(2, 16);
        let bytes = pass_uniform_bytes(&passes);
        assert_eq!(bytes.len(), 4 * PASS_STRIDE as usize);
        let second: PassUniforms = bytemuck::pod_read_unaligned(&bytes[256..256 + 32]);
        assert_eq!(second, passes[1]);
    }
}
