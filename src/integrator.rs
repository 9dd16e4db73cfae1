//! Null-collision path integrator: multiple-scattering loop with
//! next-event estimation and MIS against the importance-sampled
//! environment.

use glam::{Mat4, Vec3};

use crate::brick::BrickGrid;
use crate::camera::Camera;
use crate::environment::Environment;
use crate::frame::power_heuristic;
use crate::freeflight::{sample_volume, sample_volume_dda, Emission, FreeFlight};
use crate::phase::Phase;
use crate::rng::Rng;
use crate::transferfunc::TransferFunction;
use crate::transmittance::{transmittance_dda, transmittance_ratio};

/// Bounce index after which Russian roulette termination kicks in.
const RUSSIAN_ROULETTE_MIN_BOUNCES: u32 = 3;

/// The free-flight/transmittance estimator pair the integrator dispatches
/// through, chosen once at `commit()` (§9 "Dynamic dispatch of
/// estimators").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Estimator {
    /// Ratio tracking / delta tracking against a constant global majorant.
    RatioTracking,
    /// DDA-majorant tracking against per-brick local majorants.
    DdaTracking,
}

/// Immutable per-frame sampling context, replacing the source's global
/// shader uniforms (§9 "Global shader uniforms"): camera, volume handles,
/// TF handle, environment handle, and derived scalars are bundled here and
/// passed by reference to every sampling call, rather than threaded as
/// loose globals.
pub struct FrameContext<'a> {
    /// Density brick grid of the committed frame.
    pub density: &'a BrickGrid,
    /// Optional emission brick grid of the committed frame.
    pub emission: Option<&'a BrickGrid>,
    /// `vol_emission_scale` / `vol_emission_norm`, ignored if `emission` is `None`.
    pub emission_scale: f32,
    /// `1 / max(majorant_emission, 1e-4)`.
    pub emission_norm: f32,
    /// Transfer function applied by the ratio-tracking variant.
    pub tf: &'a TransferFunction,
    /// Importance-sampled environment.
    pub environment: &'a Environment,
    /// World-space to index-space transform of the committed grid.
    pub world_to_index: Mat4,
    /// World-space clipped volume bounding box, minimum corner.
    pub vol_bb_min: Vec3,
    /// World-space clipped volume bounding box, maximum corner.
    pub vol_bb_max: Vec3,
    /// `density_scale` uniform.
    pub density_scale: f32,
    /// `vol_majorant = density_scale * grid_majorant`.
    pub vol_majorant: f32,
    /// Scattering albedo tint.
    pub albedo: Vec3,
    /// Phase function.
    pub phase: Phase,
    /// Maximum number of scattering bounces.
    pub bounces: u32,
    /// Whether the environment contributes on a primary-ray miss.
    pub show_environment: bool,
    /// Which transport estimator pair to dispatch through.
    pub estimator: Estimator,
    /// Mip level the DDA variant walks at.
    pub dda_mip: u32,
}

impl FrameContext<'_> {
    fn emission_params(&self) -> Option<Emission<'_>> {
        self.emission.map(|grid| Emission {
            grid,
            scale: self.emission_scale,
            norm: self.emission_norm,
        })
    }

    fn free_flight(
        &self,
        origin: Vec3,
        direction: Vec3,
        throughput: &mut Vec3,
        radiance: &mut Vec3,
        rng: &mut Rng,
    ) -> FreeFlight {
        let emission = self.emission_params();
        match self.estimator {
            Estimator::RatioTracking => sample_volume(
                origin,
                direction,
                self.vol_bb_min,
                self.vol_bb_max,
                self.world_to_index,
                self.density,
                self.tf,
                self.density_scale,
                self.vol_majorant,
                self.albedo,
                emission.as_ref(),
                throughput,
                radiance,
                rng,
            ),
            Estimator::DdaTracking => sample_volume_dda(
                origin,
                direction,
                self.vol_bb_min,
                self.vol_bb_max,
                self.world_to_index,
                self.density,
                self.density_scale,
                self.dda_mip,
                self.albedo,
                emission.as_ref(),
                throughput,
                radiance,
                rng,
            ),
        }
    }

    fn transmittance(&self, origin: Vec3, direction: Vec3, rng: &mut Rng) -> f32 {
        match self.estimator {
            Estimator::RatioTracking => transmittance_ratio(
                origin,
                direction,
                self.vol_bb_min,
                self.vol_bb_max,
                self.world_to_index,
                self.density,
                self.tf,
                self.density_scale,
                self.vol_majorant,
                rng,
            ),
            Estimator::DdaTracking => transmittance_dda(
                origin,
                direction,
                self.vol_bb_min,
                self.vol_bb_max,
                self.world_to_index,
                self.density,
                self.density_scale,
                self.vol_majorant,
                self.dda_mip,
                rng,
            ),
        }
    }
}

/// Trace one sample of pixel `(x, y)` and return its radiance contribution
/// (§4.10). Consumes RNG draws in a fixed order so replays with the same
/// seed are bit-reproducible.
#[allow(clippy::too_many_arguments)]
#[must_use]
pub fn trace_sample(
    ctx: &FrameContext<'_>,
    camera: &Camera,
    x: u32,
    y: u32,
    width: u32,
    height: u32,
    rng: &mut Rng,
) -> Vec3 {
    let (jx, jy) = rng.next_2();
    let ray = camera.primary_ray(x, y, width, height, jx, jy);

    let mut throughput = Vec3::ONE;
    let mut radiance = Vec3::ZERO;
    let mut pos = ray.origin;
    let mut dir = ray.direction;
    let mut last_pdf = f32::INFINITY;

    for bounce in 0..ctx.bounces {
        match ctx.free_flight(pos, dir, &mut throughput, &mut radiance, rng) {
            FreeFlight::NoCollision => {
                if ctx.show_environment || bounce > 0 {
                    let l = ctx.environment.lookup(dir);
                    let mis_w = if bounce == 0 {
                        1.0
                    } else {
                        let p_env = ctx.environment.pdf(dir);
                        power_heuristic(last_pdf, p_env)
                    };
                    radiance += throughput * l * mis_w;
                }
                break;
            }
            FreeFlight::Collision { t, .. } => {
                let collision_pos = ray.origin + dir * t;

                // Next-event estimation against the importance-sampled environment.
                let (omega, p_env) = ctx.environment.sample(rng);
                if p_env > 0.0 {
                    let transmittance = ctx.transmittance(collision_pos, omega, rng);
                    let cos_theta = dir.dot(omega);
                    let p_ph = ctx.phase.eval(cos_theta);
                    let mis_w = power_heuristic(p_env, p_ph);
                    let l = ctx.environment.lookup(omega);
                    radiance += throughput * transmittance * l * p_ph * mis_w / p_env;
                }

                // Scatter.
                let (new_dir, phase_pdf) = ctx.phase.sample(dir, rng);
                last_pdf = phase_pdf;
                pos = collision_pos;
                dir = new_dir;

                // Russian roulette.
                if bounce >= RUSSIAN_ROULETTE_MIN_BOUNCES {
                    let q = throughput.x.max(throughput.y).max(throughput.z).min(1.0);
                    if rng.next_f32() >= q {
                        break;
                    }
                    throughput /= q.max(1e-6);
                }
            }
        }
    }

    radiance
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::volume::Grid;
    use glam::Mat3;

    fn empty_context<'a>(
        density: &'a BrickGrid,
        tf: &'a TransferFunction,
        env: &'a Environment,
    ) -> FrameContext<'a> {
        FrameContext {
            density,
            emission: None,
            emission_scale: 0.0,
            emission_norm: 0.0,
            tf,
            environment: env,
            world_to_index: Mat4::IDENTITY,
            vol_bb_min: Vec3::ZERO,
            vol_bb_max: Vec3::new(8.0, 8.0, 8.0),
            density_scale: 1.0,
            vol_majorant: 1.0,
            albedo: Vec3::ONE,
            phase: Phase::Isotropic,
            bounces: 4,
            show_environment: true,
            estimator: Estimator::RatioTracking,
            dda_mip: 0,
        }
    }

    #[test]
    fn empty_volume_uniform_env_gives_converged_radiance_near_one() {
        let grid = Grid::new(Mat4::IDENTITY, [2, 2, 2], vec![0.0; 8]).unwrap();
        let bricks = BrickGrid::from_grid(&grid);
        let tf = TransferFunction::identity();
        let env = Environment::white(1.0);
        let ctx = empty_context(&bricks, &tf, &env);
        let cam = Camera::new(Vec3::new(0.0, 0.0, -20.0), Mat3::IDENTITY, 40.0).unwrap();

        let n = 2_000;
        let mut sum = Vec3::ZERO;
        for s in 0..n {
            let mut rng = Rng::new(pixel_linear(4, 4, 8), s);
            sum += trace_sample(&ctx, &cam, 4, 4, 8, 8, &mut rng);
        }
        let mean = sum / n as f32;
        assert!((mean.x - 1.0).abs() < 0.05, "mean {mean:?} not near 1");
    }

    fn pixel_linear(x: u32, y: u32, width: u32) -> u32 {
        y * width + x
    }

    #[test]
    fn albedo_zero_black_env_gives_zero_radiance() {
        let grid = Grid::new(Mat4::IDENTITY, [8, 8, 8], vec![1.0; 512]).unwrap();
        let bricks = BrickGrid::from_grid(&grid);
        let tf = TransferFunction::identity();
        let env = Environment::black();
        let mut ctx = empty_context(&bricks, &tf, &env);
        ctx.albedo = Vec3::ZERO;
        ctx.show_environment = false;
        let cam = Camera::new(Vec3::new(4.0, 4.0, -20.0), Mat3::IDENTITY, 10.0).unwrap();

        let mut rng = Rng::new(1, 1);
        let r = trace_sample(&ctx, &cam, 64, 64, 128, 128, &mut rng);
        assert!(r.length() < 1e-4, "radiance {r:?} should be ~0");
    }
}
