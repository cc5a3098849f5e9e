//! Utility types shared across wavetrace.
//!
//! - [`Error`] / [`Result`] - Error handling
//! - [`Arena`] / [`ArenaRange`] - Range-addressed CPU staging buffers
//! - [`GpuContext`] and wgpu helpers

mod buffer;
mod error;
mod gpu;

pub use buffer::*;
pub use error::*;
pub use gpu::*;
