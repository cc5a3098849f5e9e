//! # wavetrace
//!
//! GPU wavefront path tracer built on wgpu compute shaders.
//!
//! Material and light node graphs are compiled to one WGSL shading library,
//! scene records are assembled into flat device buffers under a two-level
//! BVH, and frames are rendered bounce by bounce with every dispatch sized
//! from a GPU-written live ray count.
//!
//! ## Modules
//!
//! - [`util`] - Errors, arena buffers, wgpu helpers
//! - [`codegen`] - Shader graph to WGSL compiler
//! - [`accel`] - Bottom- and top-level BVH construction
//! - [`scene`] - Records, builders and the device-side [`Scene`]
//! - [`render`] - The wavefront [`Renderer`]
//! - [`settings`] - Persistent [`RenderSettings`]
//! - [`logging`] - Tracing subscriber setup
//!
//! ## Example
//!
//! ```ignore
//! use wavetrace::prelude::*;
//!
//! let ctx = GpuContext::new_headless()?;
//! let settings = RenderSettings::load();
//! let records = SceneDescription::from_path("scene.json".as_ref())?;
//! let scene = SceneLoader::new(".").load(&ctx, &records, &settings)?;
//! let mut renderer = Renderer::new(&ctx, scene, settings, 1280, 720)?;
//! renderer.execute(&ctx)?;
//! renderer.save_frame(&ctx)?.write_exr("frame.exr".as_ref())?;
//! ```

pub mod util;
pub mod accel;
pub mod codegen;
pub mod scene;
pub mod render;
pub mod settings;
pub mod logging;

// Re-export commonly used types
pub use util::{Error, GpuContext, Result};
pub use render::{FrameImage, Renderer};
pub use scene::{Scene, SceneDescription, SceneLoader, SceneRecords};
pub use settings::RenderSettings;

/// Build stamp injected by the build script.
pub const BUILD_DATE: &str = env!("WAVETRACE_BUILD_DATE");
pub const BUILD_TIME: &str = env!("WAVETRACE_BUILD_TIME");

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::codegen::{Codegen, MaterialType};
    pub use crate::render::{FrameImage, Renderer};
    pub use crate::scene::{Scene, SceneDescription, SceneLoader, SceneRecords};
    pub use crate::settings::{OutputChannel, RenderSettings, SamplingMode, Tonemapping};
    pub use crate::util::{Error, GpuContext, Result};
}
