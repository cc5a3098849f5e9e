//! Nishita single-scattering sky.
//!
//! The sky dome is precomputed into a texture indexed by azimuth (x) and the
//! square root of elevation (y). Directions inside the sun disc are shaded
//! from a 10-float data block instead:
//! `[bottom rgb, top rgb, elevation, rotation, angular diameter, intensity]`.

use std::f32::consts::{FRAC_PI_2, PI, TAU};

use glam::Vec3;
use rayon::prelude::*;
use shader_graph::TexSkyParams;

use super::textures::{PixelFormat, TextureData};

pub const SKY_RESOLUTION: u32 = 512;

const EARTH_RADIUS: f32 = 6_360_000.0;
const ATMOSPHERE_RADIUS: f32 = 6_420_000.0;
const RAYLEIGH_SCALE_HEIGHT: f32 = 8_000.0;
const MIE_SCALE_HEIGHT: f32 = 1_200.0;
const MIE_G: f32 = 0.76;
const RAYLEIGH_COEFF: Vec3 = Vec3::new(5.802e-6, 13.558e-6, 33.1e-6);
const MIE_COEFF: f32 = 3.996e-6;
const OZONE_COEFF: Vec3 = Vec3::new(0.650e-6, 1.881e-6, 0.085e-6);
const SUN_RADIANCE: f32 = 20.0;
const VIEW_STEPS: usize = 16;
const LIGHT_STEPS: usize = 8;

/// Scale applied to Hosek-Wilkie skies rendered with this model.
pub const HOSEK_SCALE: f32 = 0.08;

#[derive(Debug, Clone, PartialEq)]
pub struct SkyModel {
    pub sun_elevation: f32,
    pub sun_rotation: f32,
    pub sun_disc: bool,
    pub sun_size: f32,
    pub sun_intensity: f32,
    pub altitude: f32,
    pub air_density: f32,
    pub dust_density: f32,
    pub ozone_density: f32,
}

impl SkyModel {
    pub fn from_nishita(params: &TexSkyParams) -> Self {
        Self {
            sun_elevation: params.sun_elevation,
            sun_rotation: params.sun_rotation,
            sun_disc: params.sun_disc,
            sun_size: params.sun_size,
            sun_intensity: params.sun_intensity,
            altitude: params.altitude,
            air_density: params.air_density,
            dust_density: params.dust_density,
            ozone_density: params.ozone_density,
        }
    }

    /// Approximates a Hosek-Wilkie sky from its sun direction and turbidity.
    pub fn from_hosek(params: &TexSkyParams) -> Self {
        let dir = Vec3::from(params.sun_direction).normalize_or(Vec3::Z);
        Self {
            sun_elevation: dir.z.clamp(-1.0, 1.0).asin(),
            sun_rotation: dir.y.atan2(dir.x) - FRAC_PI_2,
            sun_disc: false,
            sun_size: params.sun_size,
            sun_intensity: 1.0,
            altitude: 0.0,
            air_density: 1.0,
            dust_density: (params.turbidity / 2.2).max(0.0),
            ozone_density: 1.0,
        }
    }

    fn sun_direction(&self) -> Vec3 {
        direction(self.sun_elevation, self.sun_rotation + FRAC_PI_2)
    }

    fn origin(&self) -> Vec3 {
        Vec3::new(0.0, 0.0, EARTH_RADIUS + self.altitude.max(1.0))
    }

    /// Sun disc data block consumed by the sky kernel.
    pub fn sun_data(&self) -> [f32; 10] {
        let half = self.sun_size / 2.0;
        let rotation = self.sun_rotation + FRAC_PI_2;
        let bottom = self.sun_radiance(direction(self.sun_elevation - half, rotation));
        let top = self.sun_radiance(direction(self.sun_elevation + half, rotation));
        let diameter = if self.sun_disc { self.sun_size } else { 0.0 };
        [
            bottom.x,
            bottom.y,
            bottom.z,
            top.x,
            top.y,
            top.z,
            self.sun_elevation,
            self.sun_rotation,
            diameter,
            self.sun_intensity,
        ]
    }

    fn sun_radiance(&self, dir: Vec3) -> Vec3 {
        let origin = self.origin();
        if ray_hits_ground(origin, dir) {
            return Vec3::ZERO;
        }
        let depth = self.optical_depth(origin, dir);
        SUN_RADIANCE * self.extinction(depth)
    }

    /// Sky radiance texture, `SKY_RESOLUTION` squared.
    #[tracing::instrument(skip_all)]
    pub fn generate(&self) -> TextureData {
        let size = SKY_RESOLUTION;
        let origin = self.origin();
        let sun = self.sun_direction();
        let rows: Vec<Vec<f32>> = (0..size)
            .into_par_iter()
            .map(|y| {
                let v = (y as f32 + 0.5) / size as f32;
                let elevation = v * v * FRAC_PI_2;
                let mut row = Vec::with_capacity((size * 4) as usize);
                for x in 0..size {
                    let u = (x as f32 + 0.5) / size as f32;
                    let azimuth = u * TAU - PI - self.sun_rotation;
                    let dir = Vec3::new(
                        elevation.cos() * azimuth.sin(),
                        elevation.cos() * azimuth.cos(),
                        elevation.sin(),
                    );
                    let rgb = self.single_scattering(origin, dir, sun);
                    row.extend_from_slice(&[rgb.x, rgb.y, rgb.z, 1.0]);
                }
                row
            })
            .collect();
        let rgba: Vec<f32> = rows.into_iter().flatten().collect();
        TextureData::from_rgba_f32(size, size, PixelFormat::Rgba, &rgba)
    }

    fn densities(&self, point: Vec3) -> (f32, f32, f32) {
        let height = (point.length() - EARTH_RADIUS).max(0.0);
        let rayleigh = (-height / RAYLEIGH_SCALE_HEIGHT).exp() * self.air_density;
        let mie = (-height / MIE_SCALE_HEIGHT).exp() * self.dust_density;
        // Ozone layer peaks near 25km.
        let ozone = (1.0 - (height - 25_000.0).abs() / 15_000.0).max(0.0) * self.ozone_density;
        (rayleigh, mie, ozone)
    }

    fn extinction(&self, depth: (f32, f32, f32)) -> Vec3 {
        let tau = RAYLEIGH_COEFF * depth.0 + Vec3::splat(MIE_COEFF * 1.11 * depth.1) + OZONE_COEFF * depth.2;
        Vec3::new((-tau.x).exp(), (-tau.y).exp(), (-tau.z).exp())
    }

    fn optical_depth(&self, origin: Vec3, dir: Vec3) -> (f32, f32, f32) {
        let length = atmosphere_exit(origin, dir);
        let step = length / LIGHT_STEPS as f32;
        let mut depth = (0.0, 0.0, 0.0);
        for i in 0..LIGHT_STEPS {
            let p = origin + dir * (i as f32 + 0.5) * step;
            let (r, m, o) = self.densities(p);
            depth.0 += r * step;
            depth.1 += m * step;
            depth.2 += o * step;
        }
        depth
    }

    fn single_scattering(&self, origin: Vec3, dir: Vec3, sun: Vec3) -> Vec3 {
        let length = atmosphere_exit(origin, dir);
        let step = length / VIEW_STEPS as f32;
        let mu = dir.dot(sun);
        let phase_r = 3.0 / (16.0 * PI) * (1.0 + mu * mu);
        let g2 = MIE_G * MIE_G;
        let phase_m = 3.0 / (8.0 * PI) * ((1.0 - g2) * (1.0 + mu * mu))
            / ((2.0 + g2) * (1.0 + g2 - 2.0 * MIE_G * mu).powf(1.5));

        let mut view_depth = (0.0, 0.0, 0.0);
        let mut rayleigh = Vec3::ZERO;
        let mut mie = Vec3::ZERO;
        for i in 0..VIEW_STEPS {
            let p = origin + dir * (i as f32 + 0.5) * step;
            let (r, m, o) = self.densities(p);
            view_depth.0 += r * step;
            view_depth.1 += m * step;
            view_depth.2 += o * step;
            if ray_hits_ground(p, sun) {
                continue;
            }
            let sun_depth = self.optical_depth(p, sun);
            let total = (
                view_depth.0 + sun_depth.0,
                view_depth.1 + sun_depth.1,
                view_depth.2 + sun_depth.2,
            );
            let attenuation = self.extinction(total);
            rayleigh += attenuation * r * step;
            mie += attenuation * m * step;
        }
        SUN_RADIANCE * (rayleigh * RAYLEIGH_COEFF * phase_r + mie * MIE_COEFF * phase_m)
    }
}

fn direction(elevation: f32, azimuth: f32) -> Vec3 {
    Vec3::new(
        elevation.cos() * azimuth.cos(),
        elevation.cos() * azimuth.sin(),
        elevation.sin(),
    )
}

/// Distance along `dir` from `origin` to the top of the atmosphere.
fn atmosphere_exit(origin: Vec3, dir: Vec3) -> f32 {
    let b = origin.dot(dir);
    let c = origin.length_squared() - ATMOSPHERE_RADIUS * ATMOSPHERE_RADIUS;
    let disc = (b * b - c).max(0.0);
    (-b + disc.sqrt()).max(0.0)
}

fn ray_hits_ground(origin: Vec3, dir: Vec3) -> bool {
    let b = origin.dot(dir);
    let c = origin.length_squared() - EARTH_RADIUS * EARTH_RADIUS;
    b < 0.0 && b * b - c > 0.0
}
