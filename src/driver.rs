//! Per-pixel, per-sample work dispatch.
//!
//! Data-parallel over output pixels within a sample index (§5): no work
//! item depends on another, so contributions are computed concurrently via
//! `rayon` and folded into the accumulator sequentially afterward.

use std::sync::atomic::{AtomicBool, Ordering};

use rayon::prelude::*;

use crate::accumulator::Accumulator;
use crate::camera::Camera;
use crate::integrator::{trace_sample, FrameContext};
use crate::rng::Rng;

/// Owns the framebuffer and dispatches one task per pixel per sample.
pub struct Driver {
    accumulator: Accumulator,
    /// Mixed into the per-pixel linear index before TEA seed derivation, so
    /// the exposed `seed` parameter reseeds the whole image deterministically.
    base_seed: u32,
}

impl Driver {
    /// Allocate a driver with a zeroed accumulator of size `width x height`.
    #[must_use]
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            accumulator: Accumulator::new(width, height),
            base_seed: 0,
        }
    }

    /// Set the base seed mixed into every pixel's TEA derivation.
    pub fn set_base_seed(&mut self, seed: u32) {
        self.base_seed = seed;
    }

    /// Read-only access to the accumulated framebuffer.
    #[must_use]
    pub const fn accumulator(&self) -> &Accumulator {
        &self.accumulator
    }

    /// Resize the framebuffer, clearing accumulated samples.
    pub fn resize(&mut self, width: u32, height: u32) {
        self.accumulator.resize(width, height);
    }

    /// Zero the framebuffer and sample count (called on any parameter
    /// change per §4.11).
    pub fn reset(&mut self) {
        self.accumulator.reset();
    }

    /// Render exactly one sample per pixel, folding results into the
    /// accumulator.
    pub fn render_one_sample(&mut self, ctx: &FrameContext<'_>, camera: &Camera) {
        let width = self.accumulator.width();
        let height = self.accumulator.height();
        let sample_index = self.accumulator.sample_count();

        let contributions: Vec<_> = (0..u64::from(width) * u64::from(height))
            .into_par_iter()
            .map(|linear| {
                let x = (linear % u64::from(width)) as u32;
                let y = (linear / u64::from(width)) as u32;
                let pixel_linear = (y * width + x) ^ self.base_seed;
                let mut rng = Rng::new(pixel_linear, sample_index);
                (x, y, trace_sample(ctx, camera, x, y, width, height, &mut rng))
            })
            .collect();

        for (x, y, c) in contributions {
            self.accumulator.accumulate(x, y, c);
        }
        self.accumulator.advance_sample();
    }

    /// Render `spp` samples per pixel, checking `cancel` between samples
    /// (§5 "Cancellation. Cooperative at sample-index boundaries.").
    pub fn render(&mut self, ctx: &FrameContext<'_>, camera: &Camera, spp: u32, cancel: &AtomicBool) {
        for _ in 0..spp {
            if cancel.load(Ordering::Relaxed) {
                break;
            }
            self.render_one_sample(ctx, camera);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::brick::BrickGrid;
    use crate::environment::Environment;
    use crate::integrator::Estimator;
    use crate::phase::Phase;
    use crate::transferfunc::TransferFunction;
    use crate::volume::Grid;
    use glam::{Mat3, Mat4, Vec3};

    #[test]
    fn render_advances_sample_count_and_fills_framebuffer() {
        let grid = Grid::new(Mat4::IDENTITY, [2, 2, 2], vec![0.0; 8]).unwrap();
        let bricks = BrickGrid::from_grid(&grid);
        let tf = TransferFunction::identity();
        let env = Environment::white(1.0);
        let ctx = FrameContext {
            density: &bricks,
            emission: None,
            emission_scale: 0.0,
            emission_norm: 0.0,
            tf: &tf,
            environment: &env,
            world_to_index: Mat4::IDENTITY,
            vol_bb_min: Vec3::ZERO,
            vol_bb_max: Vec3::new(8.0, 8.0, 8.0),
            density_scale: 1.0,
            vol_majorant: 1.0,
            albedo: Vec3::ONE,
            phase: Phase::Isotropic,
            bounces: 2,
            show_environment: true,
            estimator: Estimator::RatioTracking,
            dda_mip: 0,
        };
        let cam = Camera::new(Vec3::new(0.0, 0.0, -10.0), Mat3::IDENTITY, 40.0).unwrap();
        let mut driver = Driver::new(4, 4);
        let cancel = AtomicBool::new(false);
        driver.render(&ctx, &cam, 3, &cancel);
        assert_eq!(driver.accumulator().sample_count(), 3);
        assert_eq!(driver.accumulator().framebuffer_rgba().len(), 16);
    }

    #[test]
    fn cancellation_stops_between_samples() {
        let grid = Grid::new(Mat4::IDENTITY, [2, 2, 2], vec![0.0; 8]).unwrap();
        let bricks = BrickGrid::from_grid(&grid);
        let tf = TransferFunction::identity();
        let env = Environment::white(1.0);
        let ctx = FrameContext {
            density: &bricks,
            emission: None,
            emission_scale: 0.0,
            emission_norm: 0.0,
            tf: &tf,
            environment: &env,
            world_to_index: Mat4::IDENTITY,
            vol_bb_min: Vec3::ZERO,
            vol_bb_max: Vec3::new(8.0, 8.0, 8.0),
            density_scale: 1.0,
            vol_majorant: 1.0,
            albedo: Vec3::ONE,
            phase: Phase::Isotropic,
            bounces: 2,
            show_environment: true,
            estimator: Estimator::RatioTracking,
            dda_mip: 0,
        };
        let cam = Camera::new(Vec3::ZERO, Mat3::IDENTITY, 40.0).unwrap();
        let mut driver = Driver::new(2, 2);
        let cancel = AtomicBool::new(true);
        driver.render(&ctx, &cam, 10, &cancel);
        assert_eq!(driver.accumulator().sample_count(), 0);
    }
}
