//! Equirectangular environment map with a luminance mip-chain importance
//! sampler.

use std::f32::consts::PI;
use std::path::Path;

use glam::{Mat3, Vec2, Vec3};
use image::GenericImageView;

use crate::error::Result;
use crate::frame::luma;
use crate::rng::Rng;

const EPS: f32 = 1e-6;

#[derive(Debug, Clone)]
struct MipLevel {
    res: [u32; 2],
    data: Vec<f32>,
}

impl MipLevel {
    fn texel(&self, x: i32, y: i32) -> f32 {
        let w = self.res[0] as i32;
        let h = self.res[1] as i32;
        let cx = x.rem_euclid(w.max(1));
        let cy = y.clamp(0, (h - 1).max(0));
        self.data[(cy as usize) * self.res[0] as usize + cx as usize]
    }
}

/// A panoramic RGB environment map and its importance-sampling impmap.
#[derive(Debug, Clone)]
pub struct Environment {
    width: u32,
    height: u32,
    pixels: Vec<Vec3>,
    impmap: Vec<MipLevel>,
    /// Radiance multiplier applied to every lookup.
    pub strength: f32,
    /// Rotation applied to sampled/looked-up directions (world <- env space).
    pub env_model: Mat3,
    env_inv_model: Mat3,
}

impl Environment {
    /// Build an environment map from decoded equirectangular pixel data.
    #[must_use]
    pub fn new(width: u32, height: u32, pixels: Vec<Vec3>, strength: f32, env_model: Mat3) -> Self {
        let impmap = build_impmap(width, height, &pixels);
        Self {
            width,
            height,
            pixels,
            impmap,
            strength,
            env_model,
            env_inv_model: env_model.inverse(),
        }
    }

    /// A flat white environment map of unit strength (used for tests and as
    /// a default ambient light).
    #[must_use]
    pub fn white(strength: f32) -> Self {
        Self::new(2, 2, vec![Vec3::ONE; 4], strength, Mat3::IDENTITY)
    }

    /// A black environment (no ambient light), used for transmittance- and
    /// energy-conservation tests.
    #[must_use]
    pub fn black() -> Self {
        Self::new(2, 2, vec![Vec3::ZERO; 4], 0.0, Mat3::IDENTITY)
    }

    /// Load an environment map from an HDR/PNG/EXR file at `path`, rotated
    /// by `env_model` and scaled by `strength`.
    ///
    /// # Errors
    /// Returns [`crate::error::VolRenError::Image`] if the file cannot be
    /// decoded.
    pub fn load(path: &Path, strength: f32, env_model: Mat3) -> Result<Self> {
        let img = image::open(path)?;
        let (width, height) = img.dimensions();
        let rgb = img.to_rgb32f();
        let mut pixels = Vec::with_capacity((width * height) as usize);
        for p in rgb.pixels() {
            pixels.push(Vec3::new(p[0], p[1], p[2]));
        }
        Ok(Self::new(width, height, pixels, strength, env_model))
    }

    fn bilinear(&self, u: f32, v: f32) -> Vec3 {
        let x = u.rem_euclid(1.0) * self.width as f32 - 0.5;
        let y = v.clamp(0.0, 1.0) * self.height as f32 - 0.5;
        let x0 = x.floor();
        let y0 = y.floor().clamp(0.0, (self.height as f32 - 1.0).max(0.0));
        let fx = x - x0;
        let fy = y - y0;
        let gx = |xi: f32| (xi as i32).rem_euclid(self.width.max(1) as i32) as usize;
        let gy = |yi: f32| (yi as i32).clamp(0, self.height as i32 - 1) as usize;
        let c00 = self.pixels[gy(y0) * self.width as usize + gx(x0)];
        let c10 = self.pixels[gy(y0) * self.width as usize + gx(x0 + 1.0)];
        let c01 = self.pixels[gy(y0 + 1.0) * self.width as usize + gx(x0)];
        let c11 = self.pixels[gy(y0 + 1.0) * self.width as usize + gx(x0 + 1.0)];
        let top = c00.lerp(c10, fx);
        let bottom = c01.lerp(c11, fx);
        top.lerp(bottom, fy)
    }

    /// Direct lookup of radiance in world direction `dir` (§4.9 direct
    /// lookup).
    #[must_use]
    pub fn lookup(&self, dir: Vec3) -> Vec3 {
        let id = (self.env_inv_model * dir).normalize_or_zero();
        let u = id.z.atan2(id.x) / (2.0 * PI) + 0.5;
        let v = 1.0 - id.y.clamp(-1.0, 1.0).acos() / PI;
        self.strength * self.bilinear(u, v)
    }

    /// Average luminance over the whole map (the 1x1 top impmap texel).
    #[must_use]
    pub fn average_luminance(&self) -> f32 {
        self.impmap
            .last()
            .map_or(0.0, |top| top.data.first().copied().unwrap_or(0.0))
    }

    /// PDF (solid angle) of the direct lookup direction `dir` under the
    /// importance sampler (§4.9). Kept as the top-mip-texel approximation
    /// of the environment integral per the source: not a precomputed exact
    /// integral, intentionally.
    #[must_use]
    pub fn pdf(&self, dir: Vec3) -> f32 {
        let l = self.lookup(dir);
        (luma(l) / self.average_luminance().max(EPS)) * (1.0 / (4.0 * PI))
    }

    /// Importance-sample a direction via the mip-hierarchy warp (§4.9),
    /// returning `(world_direction, pdf)`.
    #[must_use]
    pub fn sample(&self, rng: &mut Rng) -> (Vec3, f32) {
        let base_mip = self.impmap.len().saturating_sub(1);
        let mut pos = [0i32, 0i32];
        let (mut px, mut py) = rng.next_2();
        for mip in (0..base_mip).rev() {
            pos[0] *= 2;
            pos[1] *= 2;
            let level = &self.impmap[mip];
            let w00 = level.texel(pos[0], pos[1]);
            let w10 = level.texel(pos[0] + 1, pos[1]);
            let w01 = level.texel(pos[0], pos[1] + 1);
            let w11 = level.texel(pos[0] + 1, pos[1] + 1);
            let q_l = w00 + w01;
            let q_r = w10 + w11;
            let d = q_l / (q_l + q_r).max(EPS);
            let (e_top, e_bottom) = if px < d {
                px /= d.max(EPS);
                (w00, w01)
            } else {
                pos[0] += 1;
                px = (px - d) / (1.0 - d).max(EPS);
                (w10, w11)
            };
            let e = e_top / (e_top + e_bottom).max(EPS);
            if py < e {
                py /= e.max(EPS);
            } else {
                pos[1] += 1;
                py = (py - e) / (1.0 - e).max(EPS);
            }
        }
        let level0 = &self.impmap[0];
        let inv_dim = Vec2::new(1.0 / level0.res[0] as f32, 1.0 / level0.res[1] as f32);
        let uv = (Vec2::new(pos[0] as f32, pos[1] as f32) + Vec2::new(px, py)) * inv_dim;
        let theta = (1.0 - uv.y) * PI;
        let phi = (2.0 * uv.x - 1.0) * PI;
        let local = Vec3::new(theta.sin() * phi.cos(), theta.cos(), theta.sin() * phi.sin());
        let world_dir = (self.env_model * local).normalize_or_zero();
        let texel_luma = level0.texel(pos[0], pos[1]);
        let pdf = (texel_luma / self.average_luminance().max(EPS)) * (1.0 / (4.0 * PI));
        (world_dir, pdf)
    }
}

fn build_impmap(width: u32, height: u32, pixels: &[Vec3]) -> Vec<MipLevel> {
    let data: Vec<f32> = pixels.iter().copied().map(luma).collect();
    let mut levels = vec![MipLevel {
        res: [width, height],
        data,
    }];
    loop {
        let prev = &levels[levels.len() - 1];
        if prev.res == [1, 1] {
            break;
        }
        let res = [prev.res[0].div_ceil(2).max(1), prev.res[1].div_ceil(2).max(1)];
        let mut data = vec![0.0_f32; (res[0] * res[1]) as usize];
        let mut counts = vec![0u32; data.len()];
        for y in 0..prev.res[1] {
            for x in 0..prev.res[0] {
                let src = (y as usize) * prev.res[0] as usize + x as usize;
                let dst = ((y / 2) as usize) * res[0] as usize + (x / 2) as usize;
                data[dst] += prev.data[src];
                counts[dst] += 1;
            }
        }
        for (v, c) in data.iter_mut().zip(counts.iter()) {
            if *c > 0 {
                *v /= *c as f32;
            }
        }
        levels.push(MipLevel { res, data });
    }
    levels
}
