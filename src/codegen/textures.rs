//! Texture registration and loading.
//!
//! Rules register textures by source identity while emitting code; only slot
//! indices are needed at that point. Pixel data is produced later, in one
//! parallel pass, when the library is assembled.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use half::f16;
use rayon::prelude::*;

use super::sky::SkyModel;
use crate::util::{Error, MAX_TEXTURE_SLOTS, Result};

/// Channel layout reported to shading code.
///
/// Discriminants match the `PIXEL_FORMAT` enum values in generated code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    Rgba = 0,
    R = 1,
}

/// Decoded texture, always stored as four half-float channels.
#[derive(Debug, Clone)]
pub struct TextureData {
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
    pub pixels: Vec<f16>,
}

impl TextureData {
    pub fn from_rgba_f32(width: u32, height: u32, format: PixelFormat, rgba: &[f32]) -> Self {
        debug_assert_eq!(rgba.len(), (width * height * 4) as usize);
        Self {
            width,
            height,
            format,
            pixels: rgba.iter().map(|v| f16::from_f32(*v)).collect(),
        }
    }

    /// Single-texel texture.
    pub fn solid(rgba: [f32; 4]) -> Self {
        Self::from_rgba_f32(1, 1, PixelFormat::Rgba, &rgba)
    }

    /// Stand-in for a texture that failed to load.
    pub fn placeholder() -> Self {
        Self::solid([1.0, 0.0, 1.0, 1.0])
    }

    pub fn texel(&self, x: u32, y: u32) -> [f32; 4] {
        let i = ((y * self.width + x) * 4) as usize;
        [
            self.pixels[i].to_f32(),
            self.pixels[i + 1].to_f32(),
            self.pixels[i + 2].to_f32(),
            self.pixels[i + 3].to_f32(),
        ]
    }

    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.pixels)
    }
}

/// Decodes image files for texture slots.
pub trait TextureLoader: Sync {
    fn load(&self, path: &Path) -> Result<TextureData>;
}

/// [`TextureLoader`] backed by the `image` crate.
///
/// Exporter paths starting with `//` are relative to `base`.
#[derive(Debug, Clone)]
pub struct ImageFileLoader {
    base: PathBuf,
}

impl ImageFileLoader {
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self { base: base.into() }
    }

    pub fn resolve(&self, path: &Path) -> PathBuf {
        let text = path.to_string_lossy();
        match text.strip_prefix("//") {
            Some(relative) => self.base.join(relative),
            None if path.is_relative() => self.base.join(path),
            None => path.to_path_buf(),
        }
    }
}

impl TextureLoader for ImageFileLoader {
    fn load(&self, path: &Path) -> Result<TextureData> {
        let resolved = self.resolve(path);
        let image = image::open(&resolved)?;
        let format = if image.color().channel_count() == 1 {
            PixelFormat::R
        } else {
            PixelFormat::Rgba
        };
        let rgba = image.into_rgba32f();
        let (width, height) = rgba.dimensions();
        tracing::debug!(path = %resolved.display(), width, height, ?format, "texture decoded");
        Ok(TextureData::from_rgba_f32(width, height, format, rgba.as_raw()))
    }
}

/// Source identity of a registered texture.
#[derive(Debug, Clone, PartialEq)]
pub enum TextureSource {
    File(PathBuf),
    Sky(SkyModel),
}

impl TextureSource {
    fn key(&self) -> String {
        match self {
            TextureSource::File(path) => format!("file:{}", path.display()),
            TextureSource::Sky(model) => format!("sky:{model:?}"),
        }
    }
}

/// Deduplicating slot allocator.
#[derive(Debug, Default)]
pub struct TextureRegistry {
    sources: Vec<TextureSource>,
    slots: HashMap<String, u32>,
}

impl TextureRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the slot for `source`, allocating the next one on first use.
    pub fn register(&mut self, source: TextureSource) -> Result<u32> {
        let key = source.key();
        if let Some(slot) = self.slots.get(&key) {
            return Ok(*slot);
        }
        let slot = self.sources.len() as u32;
        if slot >= MAX_TEXTURE_SLOTS {
            return Err(Error::other(format!(
                "scene references more than {MAX_TEXTURE_SLOTS} textures"
            )));
        }
        tracing::debug!(slot, source = %key, "texture registered");
        self.sources.push(source);
        self.slots.insert(key, slot);
        Ok(slot)
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    /// Forgets every slot at or past `len`.
    pub fn truncate(&mut self, len: usize) {
        for source in self.sources.drain(len.min(self.sources.len())..) {
            self.slots.remove(&source.key());
        }
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    pub fn sources(&self) -> &[TextureSource] {
        &self.sources
    }

    /// Produces pixel data for every slot in parallel.
    ///
    /// Load failures and images wider or taller than `max_dimension` are
    /// logged and replaced by a placeholder.
    #[tracing::instrument(skip_all, fields(count = self.sources.len()))]
    pub fn load_all(&self, loader: &dyn TextureLoader, max_dimension: u32) -> Vec<TextureData> {
        self.sources
            .par_iter()
            .map(|source| {
                let data = match source {
                    TextureSource::File(path) => loader.load(path).unwrap_or_else(|e| {
                        tracing::error!(path = %path.display(), error = %e, "texture load failed");
                        TextureData::placeholder()
                    }),
                    TextureSource::Sky(model) => model.generate(),
                };
                if data.width > max_dimension || data.height > max_dimension {
                    tracing::error!(
                        source = %source.key(),
                        width = data.width,
                        height = data.height,
                        max_dimension,
                        "texture exceeds device limit"
                    );
                    return TextureData::placeholder();
                }
                data
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct CountingLoader;

    impl TextureLoader for CountingLoader {
        fn load(&self, path: &Path) -> Result<TextureData> {
            if path.to_string_lossy().contains("missing") {
                return Err(Error::other("not found"));
            }
            Ok(TextureData::from_rgba_f32(1, 1, PixelFormat::R, &[0.5, 0.5, 0.5, 1.0]))
        }
    }

    #[test]
    fn test_register_dedup() {
        let mut reg = TextureRegistry::new();
        let a = reg.register(TextureSource::File("//a.png".into())).unwrap();
        let b = reg.register(TextureSource::File("//b.png".into())).unwrap();
        let a2 = reg.register(TextureSource::File("//a.png".into())).unwrap();
        assert_eq!((a, b, a2), (0, 1, 0));
        assert_eq!(reg.len(), 2);
    }

    #[test]
    fn test_register_limit() {
        let mut reg = TextureRegistry::new();
        for i in 0..MAX_TEXTURE_SLOTS {
            reg.register(TextureSource::File(format!("t{i}.png").into())).unwrap();
        }
        assert!(reg.register(TextureSource::File("overflow.png".into())).is_err());
    }

    #[test]
    fn test_load_failure_uses_placeholder() {
        let mut reg = TextureRegistry::new();
        reg.register(TextureSource::File("ok.png".into())).unwrap();
        reg.register(TextureSource::File("missing.png".into())).unwrap();
        let data = reg.load_all(&CountingLoader, 8192);
        assert_eq!(data[0].format, PixelFormat::R);
        assert_eq!(data[1].texel(0, 0), [1.0, 0.0, 1.0, 1.0]);
    }

    struct WideLoader;

    impl TextureLoader for WideLoader {
        fn load(&self, _path: &Path) -> Result<TextureData> {
            Ok(TextureData::from_rgba_f32(4, 1, PixelFormat::Rgba, &[0.25; 16]))
        }
    }

    #[test]
    fn test_oversized_texture_uses_placeholder() {
        let mut reg = TextureRegistry::new();
        reg.register(TextureSource::File("wide.png".into())).unwrap();
        let data = reg.load_all(&WideLoader, 2);
        assert_eq!((data[0].width, data[0].height), (1, 1));
        assert_eq!(data[0].texel(0, 0), [1.0, 0.0, 1.0, 1.0]);

        let data = reg.load_all(&WideLoader, 4);
        assert_eq!(data[0].width, 4);
        assert_eq!(data[0].texel(3, 0), [0.25; 4]);
    }

    #[test]
    fn test_resolve_relative() {
        let loader = ImageFileLoader::new("/scenes/demo");
        assert_eq!(
            loader.resolve(Path::new("//textures/wood.png")),
            PathBuf::from("/scenes/demo/textures/wood.png")
        );
        assert_eq!(loader.resolve(Path::new("/abs/a.exr")), PathBuf::from("/abs/a.exr"));
    }
}
