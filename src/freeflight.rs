//! Delta-tracking free-flight sampler: global-majorant and DDA-majorant
//! variants, plus the additive emission contribution along the flight.

use glam::{Mat4, Vec3};

use crate::brick::BrickGrid;
use crate::dda::step_dda;
use crate::frame::intersect_box;
use crate::rng::Rng;
use crate::transferfunc::TransferFunction;

/// Result of a free-flight sample: either the ray exited the volume without
/// a real collision, or it collided at parametric distance `t`.
#[derive(Debug, Clone, Copy)]
pub enum FreeFlight {
    /// The ray exited the bounding box (or missed it) without colliding.
    NoCollision,
    /// A real collision occurred.
    Collision {
        /// Parametric distance to the collision.
        t: f32,
        /// `t` normalized by the segment length `(tfar - tnear)`.
        t_norm: f32,
        /// Transfer-function alpha (extinction-scale opacity) at the
        /// collision; `1.0` for the DDA/no-transfer-function variant.
        alpha: f32,
    },
}

/// An emission channel consulted additively at every free-flight step.
pub struct Emission<'a> {
    /// Emission brick grid (built from `"flame"|"flames"|"temperature"`).
    pub grid: &'a BrickGrid,
    /// `vol_emission_scale`.
    pub scale: f32,
    /// `vol_emission_norm = 1 / max(majorant_emission, 1e-4)`.
    pub norm: f32,
}

/// Delta-tracking free-flight sampler against a constant global majorant
/// (§4.7, ratio-tracking-style analytic free flight).
///
/// On a real collision, multiplies `throughput` by the transfer function's
/// scattering-albedo tint times `albedo`. At every step (collision or
/// null), if `emission` is set, adds
/// `throughput * emission(pos) * scale * norm` into `radiance` at the same
/// jittered index-space position the density sample used.
#[must_use]
#[allow(clippy::too_many_arguments)]
pub fn sample_volume(
    origin: Vec3,
    direction: Vec3,
    vol_bb_min: Vec3,
    vol_bb_max: Vec3,
    world_to_index: Mat4,
    density: &BrickGrid,
    tf: &TransferFunction,
    density_scale: f32,
    majorant: f32,
    albedo: Vec3,
    emission: Option<&Emission>,
    throughput: &mut Vec3,
    radiance: &mut Vec3,
    rng: &mut Rng,
) -> FreeFlight {
    let (tnear, tfar, hit) = intersect_box(origin, direction, vol_bb_min, vol_bb_max);
    if !hit || majorant <= 0.0 {
        return FreeFlight::NoCollision;
    }
    let index_origin = world_to_index.transform_point3(origin);
    let index_dir = world_to_index.transform_vector3(direction);
    let mut t = tnear;
    loop {
        let xi = rng.next_f32();
        t -= (1.0 - xi).max(f32::EPSILON).ln() / majorant;
        if t >= tfar {
            return FreeFlight::NoCollision;
        }
        let pos = index_origin + index_dir * t;
        let (jx, jy, jz) = rng.next_3();
        let jittered = pos + Vec3::new(jx, jy, jz) - Vec3::splat(0.5);
        let d = density_scale * density.voxel(jittered);

        if let Some(em) = emission {
            let e = em.grid.voxel(jittered);
            *radiance += *throughput * e * em.scale * em.norm;
        }

        let rgba = tf.lookup(d / majorant);
        if rng.next_f32() < rgba.w {
            *throughput *= rgba.truncate() * albedo;
            return FreeFlight::Collision {
                t,
                t_norm: (t - tnear) / (tfar - tnear).max(1e-6),
                alpha: rgba.w,
            };
        }
    }
}

/// DDA-majorant free-flight sampler: the same brick-walking structure as
/// [`crate::transmittance::transmittance_dda`], but returns on the first
/// real collision and modulates `throughput` by `albedo` only (no transfer
/// function tint, matching §4.7's DDA variant).
#[must_use]
#[allow(clippy::too_many_arguments)]
pub fn sample_volume_dda(
    origin: Vec3,
    direction: Vec3,
    vol_bb_min: Vec3,
    vol_bb_max: Vec3,
    world_to_index: Mat4,
    density: &BrickGrid,
    density_scale: f32,
    mip: u32,
    albedo: Vec3,
    emission: Option<&Emission>,
    throughput: &mut Vec3,
    radiance: &mut Vec3,
    rng: &mut Rng,
) -> FreeFlight {
    let (tnear, tfar, hit) = intersect_box(origin, direction, vol_bb_min, vol_bb_max);
    if !hit {
        return FreeFlight::NoCollision;
    }
    let index_origin = world_to_index.transform_point3(origin);
    let index_dir = world_to_index.transform_vector3(direction);
    let ri = Vec3::new(
        safe_recip(index_dir.x),
        safe_recip(index_dir.y),
        safe_recip(index_dir.z),
    );

    let mut t = tnear + 1e-4;
    let mut tau = -(1.0 - rng.next_f32()).max(f32::EPSILON).ln();
    while t < tfar {
        let pos = index_origin + index_dir * t;
        let mu_b = density.majorant(pos, mip, density_scale);
        let dt = step_dda(pos, ri, mip).max(1e-5);
        if mu_b <= 0.0 {
            t += dt;
            continue;
        }
        t += dt;
        tau -= mu_b * dt;
        if tau > 0.0 {
            continue;
        }
        t += tau / mu_b;
        if t >= tfar {
            return FreeFlight::NoCollision;
        }
        let collide_pos = index_origin + index_dir * t;
        let (jx, jy, jz) = rng.next_3();
        let jittered = collide_pos + Vec3::new(jx, jy, jz) - Vec3::splat(0.5);
        let d = density_scale * density.voxel(jittered);

        if let Some(em) = emission {
            let e = em.grid.voxel(jittered);
            *radiance += *throughput * e * em.scale * em.norm;
        }

        if rng.next_f32() * mu_b < d {
            *throughput *= albedo;
            return FreeFlight::Collision {
                t,
                t_norm: (t - tnear) / (tfar - tnear).max(1e-6),
                alpha: 1.0,
            };
        }
        tau = -(1.0 - rng.next_f32()).max(f32::EPSILON).ln();
    }
    FreeFlight::NoCollision
}

fn safe_recip(x: f32) -> f32 {
    if x == 0.0 {
        f32::INFINITY
    } else {
        1.0 / x
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::volume::Grid;
    use glam::Mat4;

    fn homogeneous_brick(sigma: f32) -> BrickGrid {
        let grid = Grid::new(Mat4::IDENTITY, [8, 8, 8], vec![sigma; 512]).unwrap();
        BrickGrid::from_grid(&grid)
    }

    #[test]
    fn zero_albedo_absorbs_all_throughput_on_collision() {
        let bricks = homogeneous_brick(1.0);
        let tf = TransferFunction::identity();
        let mut rng = Rng::new(1, 0);
        let mut throughput = Vec3::ONE;
        let mut radiance = Vec3::ZERO;
        let result = sample_volume(
            Vec3::new(0.0, 4.0, 4.0),
            Vec3::X,
            Vec3::ZERO,
            Vec3::new(8.0, 8.0, 8.0),
            Mat4::IDENTITY,
            &bricks,
            &tf,
            1.0,
            1.0,
            Vec3::ZERO,
            None,
            &mut throughput,
            &mut radiance,
            &mut rng,
        );
        match result {
            FreeFlight::Collision { .. } => assert_eq!(throughput, Vec3::ZERO),
            FreeFlight::NoCollision => {}
        }
    }

    #[test]
    fn empty_volume_never_collides() {
        let grid = Grid::new(Mat4::IDENTITY, [8, 8, 8], vec![0.0; 512]).unwrap();
        let bricks = BrickGrid::from_grid(&grid);
        let tf = TransferFunction::identity();
        let mut rng = Rng::new(2, 0);
        let mut throughput = Vec3::ONE;
        let mut radiance = Vec3::ZERO;
        let result = sample_volume(
            Vec3::new(0.0, 4.0, 4.0),
            Vec3::X,
            Vec3::ZERO,
            Vec3::new(8.0, 8.0, 8.0),
            Mat4::IDENTITY,
            &bricks,
            &tf,
            1.0,
            1.0,
            Vec3::ONE,
            None,
            &mut throughput,
            &mut radiance,
            &mut rng,
        );
        assert!(matches!(result, FreeFlight::NoCollision));
    }

    #[test]
    fn emission_adds_radiance_even_without_scattering() {
        let grid = Grid::new(Mat4::IDENTITY, [8, 8, 8], vec![1.0; 512]).unwrap();
        let bricks = BrickGrid::from_grid(&grid);
        let emission_grid = BrickGrid::from_grid(&grid);
        let tf = TransferFunction::identity();
        let mut rng = Rng::new(3, 0);
        let mut throughput = Vec3::ONE;
        let mut radiance = Vec3::ZERO;
        let emission = Emission {
            grid: &emission_grid,
            scale: 1.0,
            norm: 1.0,
        };
        let _ = sample_volume(
            Vec3::new(0.0, 4.0, 4.0),
            Vec3::X,
            Vec3::ZERO,
            Vec3::new(8.0, 8.0, 8.0),
            Mat4::IDENTITY,
            &bricks,
            &tf,
            1.0,
            1.0,
            Vec3::ONE,
            Some(&emission),
            &mut throughput,
            &mut radiance,
            &mut rng,
        );
        assert!(radiance.x > 0.0);
    }

    #[test]
    fn dda_collision_modulates_by_albedo_only() {
        let bricks = homogeneous_brick(4.0);
        let mut rng = Rng::new(4, 0);
        let mut throughput = Vec3::ONE;
        let mut radiance = Vec3::ZERO;
        let albedo = Vec3::new(0.2, 0.3, 0.4);
        let result = sample_volume_dda(
            Vec3::new(0.0, 4.0, 4.0),
            Vec3::X,
            Vec3::ZERO,
            Vec3::new(8.0, 8.0, 8.0),
            Mat4::IDENTITY,
            &bricks,
            1.0,
            0,
            albedo,
            None,
            &mut throughput,
            &mut radiance,
            &mut rng,
        );
        if let FreeFlight::Collision { .. } = result {
            assert_eq!(throughput, albedo);
        }
    }
}
