//! Persistent render settings

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::util::Result;

/// Display curve applied by the resolve kernel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u32)]
pub enum Tonemapping {
    #[default]
    Linear = 0,
    Hable = 1,
    Aces = 2,
}

/// Light transport estimator.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u32)]
pub enum SamplingMode {
    /// BSDF sampling only; lights are found by chance.
    Bsdf = 0,
    /// Next-event estimation, emission hit by BSDF rays ignored.
    Nee = 1,
    /// Next-event estimation combined with BSDF sampling.
    #[default]
    Mis = 2,
}

/// What the accumulation buffer records.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u32)]
pub enum OutputChannel {
    #[default]
    Image = 0,
    Albedo = 1,
    Normal = 2,
}

/// Render settings that persist between sessions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderSettings {
    // Transport
    pub max_depth: u32,
    pub sampling_mode: SamplingMode,
    pub russian_roulette_depth: u32,

    // Display
    pub exposure: f32,
    pub tonemapping: Tonemapping,
    pub output_channel: OutputChannel,
    pub accumulate: bool,

    // Scene
    pub envmap_exponent: u32, // resolution 2^n

    // Diagnostics
    /// Reads the wavefront counters back every frame and checks ray count
    /// conservation. Off by default; costs one blocking wait per frame.
    pub collect_statistics: bool,
    pub slow_frame_seconds: f32,
    pub cooldown_seconds: f32,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            max_depth: 8,
            sampling_mode: SamplingMode::default(),
            russian_roulette_depth: 2,
            exposure: 1.0,
            tonemapping: Tonemapping::default(),
            output_channel: OutputChannel::default(),
            accumulate: true,
            envmap_exponent: 11,
            collect_statistics: false,
            slow_frame_seconds: 1.0,
            cooldown_seconds: 3.0,
        }
    }
}

impl RenderSettings {
    /// Get settings file path
    pub fn path() -> Option<PathBuf> {
        dirs::config_dir().map(|mut p| {
            p.push("wavetrace");
            p.push("settings.json");
            p
        })
    }

    /// Load settings from the config directory, defaults on any failure
    pub fn load() -> Self {
        Self::path()
            .map(|p| Self::load_from(&p))
            .unwrap_or_default()
    }

    pub fn load_from(path: &Path) -> Self {
        let settings: Self = std::fs::read_to_string(path)
            .ok()
            .and_then(|s| serde_json::from_str(&s).ok())
            .unwrap_or_default();
        settings.validated()
    }

    /// Save settings to the config directory
    pub fn save(&self) -> Result<()> {
        match Self::path() {
            Some(path) => self.save_to(&path),
            None => Ok(()),
        }
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    /// Clamps values the renderer cannot work with.
    pub fn validated(mut self) -> Self {
        self.max_depth = self.max_depth.clamp(1, 64);
        // level offsets of the table must fit in u32
        self.envmap_exponent = self.envmap_exponent.clamp(1, 14);
        if !self.exposure.is_finite() || self.exposure < 0.0 {
            self.exposure = 1.0;
        }
        self
    }

    pub fn slow_frame(&self) -> Duration {
        Duration::from_secs_f32(self.slow_frame_seconds.max(0.0))
    }

    pub fn cooldown(&self) -> Duration {
        Duration::from_secs_f32(self.cooldown_seconds.max(0.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let s = RenderSettings::default();
        assert_eq!(s.max_depth, 8);
        assert_eq!(s.envmap_exponent, 11);
        assert_eq!(s.sampling_mode, SamplingMode::Mis);
        assert_eq!(s.cooldown(), Duration::from_secs(3));
        assert!(!s.collect_statistics);
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let s: RenderSettings = serde_json::from_str(r#"{ "max_depth": 3, "tonemapping": "Aces" }"#).unwrap();
        assert_eq!(s.max_depth, 3);
        assert_eq!(s.tonemapping, Tonemapping::Aces);
        assert_eq!(s.exposure, 1.0);
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("settings.json");
        let settings = RenderSettings {
            exposure: 2.5,
            output_channel: OutputChannel::Normal,
            ..Default::default()
        };
        settings.save_to(&path).unwrap();
        assert_eq!(RenderSettings::load_from(&path), settings);
    }

    #[test]
    fn test_garbage_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, "not json").unwrap();
        assert_eq!(RenderSettings::load_from(&path), RenderSettings::default());
    }

    #[test]
    fn test_validation_clamps() {
        let s = RenderSettings {
            max_depth: 0,
            envmap_exponent: 30,
            exposure: f32::NAN,
            ..Default::default()
        }
        .validated();
        assert_eq!(s.max_depth, 1);
        assert_eq!(s.envmap_exponent, 14);
        assert_eq!(s.exposure, 1.0);
    }
}
