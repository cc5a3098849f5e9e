//! Shader compilation backends.

use std::borrow::Cow;

use crate::util::{Error, Result, error_scope};

/// Turns WGSL library source into a backend module.
pub trait ShaderCompiler {
    type Library;

    fn compile(&self, source: &str) -> Result<Self::Library>;
}

/// Compiles through wgpu, validating with naga.
pub struct WgpuCompiler<'a> {
    device: &'a wgpu::Device,
}

impl<'a> WgpuCompiler<'a> {
    pub fn new(device: &'a wgpu::Device) -> Self {
        Self { device }
    }
}

impl ShaderCompiler for WgpuCompiler<'_> {
    type Library = wgpu::ShaderModule;

    #[tracing::instrument(skip_all, fields(bytes = source.len()))]
    fn compile(&self, source: &str) -> Result<wgpu::ShaderModule> {
        let module = error_scope(self.device, "shading library", || {
            self.device.create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some("wavetrace shading library"),
                source: wgpu::ShaderSource::Wgsl(Cow::Owned(source.to_string())),
            })
        })
        .map_err(|e| match e {
            Error::Gpu(message) => Error::ShaderCompile(message),
            other => other,
        })?;
        tracing::info!("shading library compiled");
        Ok(module)
    }
}
