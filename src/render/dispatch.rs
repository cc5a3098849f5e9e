//! Workgroup grid sizing for 1D wavefronts.
//!
//! Kernels run 64 threads per workgroup. Grids wider than
//! [`MAX_GROUPS_X`] wrap into further rows; the kernel flattens its thread
//! index as `gid.y * groups.x * 64 + gid.x` and discards threads past the
//! live count.

use bytemuck::{Pod, Zeroable};

pub const WORKGROUP_SIZE: u32 = 64;

/// Largest grid width, below the guaranteed per-dimension limit of 65535.
pub const MAX_GROUPS_X: u32 = 32768;

/// Indirect dispatch arguments, laid out as wgpu expects them.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Pod, Zeroable)]
pub struct DispatchArgs {
    pub x: u32,
    pub y: u32,
    pub z: u32,
}

impl DispatchArgs {
    pub const SIZE: u64 = std::mem::size_of::<Self>() as u64;

    /// Grid covering `count` threads. A count of zero yields an empty grid
    /// (`0 x 0 x 1`), still a valid dispatch.
    pub fn for_count(count: u32) -> Self {
        let groups = count.div_ceil(WORKGROUP_SIZE);
        Self {
            x: groups.min(MAX_GROUPS_X),
            y: groups.div_ceil(MAX_GROUPS_X),
            z: 1,
        }
    }

    pub fn workgroups(&self) -> u64 {
        self.x as u64 * self.y as u64 * self.z as u64
    }

    /// Threads launched, at least the requested count.
    pub fn threads(&self) -> u64 {
        self.workgroups() * WORKGROUP_SIZE as u64
    }
}
