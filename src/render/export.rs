//! Accumulated frame readback and EXR output.

use std::path::Path;

use crate::util::{Error, Result};

/// Linear radiance, one RGBA `f32` quadruple per pixel, rows top to bottom.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameImage {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<[f32; 4]>,
}

impl FrameImage {
    /// Averages raw accumulation over `samples` frames; alpha is set to 1.
    pub fn from_accumulation(width: u32, height: u32, accumulation: &[[f32; 4]], samples: u32) -> Result<Self> {
        let count = width as usize * height as usize;
        if accumulation.len() < count {
            return Err(Error::other(format!(
                "accumulation holds {} pixels, {width}x{height} needs {count}",
                accumulation.len()
            )));
        }
        let scale = 1.0 / samples.max(1) as f32;
        let pixels = accumulation[..count]
            .iter()
            .map(|[r, g, b, _]| [r * scale, g * scale, b * scale, 1.0])
            .collect();
        Ok(Self { width, height, pixels })
    }

    pub fn pixel(&self, x: u32, y: u32) -> [f32; 4] {
        self.pixels[(y * self.width + x) as usize]
    }

    /// Mean of the RGB channels over the whole image.
    pub fn mean(&self) -> [f32; 3] {
        let n = self.pixels.len().max(1) as f64;
        let mut sum = [0.0f64; 3];
        for p in &self.pixels {
            for c in 0..3 {
                sum[c] += p[c] as f64;
            }
        }
        sum.map(|s| (s / n) as f32)
    }

    /// Writes a 32-bit float RGBA OpenEXR file.
    #[tracing::instrument(skip(self), fields(width = self.width, height = self.height))]
    pub fn write_exr(&self, path: &Path) -> Result<()> {
        let data: Vec<f32> = self.pixels.iter().flatten().copied().collect();
        let image = image::Rgba32FImage::from_raw(self.width, self.height, data)
            .ok_or_else(|| Error::other("pixel buffer does not match image size"))?;
        image.save_with_format(path, image::ImageFormat::OpenExr)?;
        tracing::info!(path = %path.display(), "frame written");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_accumulation_divides() {
        let acc = vec![[4.0, 8.0, 2.0, 0.0]; 6];
        let image = FrameImage::from_accumulation(3, 2, &acc, 4).unwrap();
        assert_eq!(image.pixel(2, 1), [1.0, 2.0, 0.5, 1.0]);
        assert_eq!(image.mean(), [1.0, 2.0, 0.5]);
    }

    #[test]
    fn test_short_accumulation_rejected() {
        assert!(FrameImage::from_accumulation(4, 4, &[[0.0; 4]; 3], 1).is_err());
    }

    #[test]
    fn test_write_exr_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("frame.exr");
        let acc = vec![[0.25, 0.5, 0.75, 0.0]; 4];
        FrameImage::from_accumulation(2, 2, &acc, 1)
            .unwrap()
            .write_exr(&path)
            .unwrap();

        let decoded = image::open(&path).unwrap().into_rgba32f();
        assert_eq!(decoded.dimensions(), (2, 2));
        let p = decoded.get_pixel(1, 1);
        assert!((p[0] - 0.25).abs() < 1e-6);
        assert!((p[2] - 0.75).abs() < 1e-6);
    }
}
