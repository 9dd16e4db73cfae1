//! Isotropic and Henyey–Greenstein phase functions.

use glam::Vec3;
use std::f32::consts::PI;

use crate::frame::align;
use crate::rng::Rng;

/// A single-parameter phase function: isotropic, or Henyey–Greenstein with
/// asymmetry `g in (-1, 1)`.
#[derive(Debug, Clone, Copy)]
pub enum Phase {
    /// Scatters uniformly over the sphere.
    Isotropic,
    /// Henyey–Greenstein with asymmetry parameter `g`.
    HenyeyGreenstein {
        /// Asymmetry in `(-1, 1)`; positive favors forward scattering.
        g: f32,
    },
}

impl Phase {
    /// Evaluate the phase function at cosine-of-angle `cos_theta` between
    /// incoming and outgoing directions.
    #[must_use]
    pub fn eval(self, cos_theta: f32) -> f32 {
        match self {
            Self::Isotropic => phase_isotropic(),
            Self::HenyeyGreenstein { g } => phase_henyey_greenstein(g, cos_theta),
        }
    }

    /// Sample an outgoing direction given an incoming direction, returning
    /// `(direction, pdf)`. `pdf` equals [`Phase::eval`] at the sampled angle
    /// since both functions are normalized over the sphere.
    #[must_use]
    pub fn sample(self, incoming_dir: Vec3, rng: &mut Rng) -> (Vec3, f32) {
        match self {
            Self::Isotropic => {
                let local = sample_phase_isotropic(rng);
                (align(incoming_dir, local), phase_isotropic())
            }
            Self::HenyeyGreenstein { g } => {
                let (local, cos_theta) = sample_phase_henyey_greenstein(g, rng);
                (align(incoming_dir, local), phase_henyey_greenstein(g, cos_theta))
            }
        }
    }
}

/// Isotropic phase function value: constant `1/(4*pi)`.
#[must_use]
pub fn phase_isotropic() -> f32 {
    1.0 / (4.0 * PI)
}

/// Henyey–Greenstein phase function value at `cos_theta`.
#[must_use]
pub fn phase_henyey_greenstein(g: f32, cos_theta: f32) -> f32 {
    let g2 = g * g;
    let denom = (1.0 + g2 + 2.0 * g * cos_theta).max(1e-6).powf(1.5);
    (1.0 - g2) / (4.0 * PI * denom)
}

/// Sample a direction in the local frame of the incoming direction for the
/// isotropic phase function.
#[must_use]
pub fn sample_phase_isotropic(rng: &mut Rng) -> Vec3 {
    let (xi1, xi2) = rng.next_2();
    let cos_theta = 1.0 - 2.0 * xi1;
    let sin_theta = (1.0 - cos_theta * cos_theta).max(0.0).sqrt();
    let phi = 2.0 * PI * xi2;
    Vec3::new(sin_theta * phi.cos(), sin_theta * phi.sin(), cos_theta)
}

/// Sample a local-frame direction for Henyey–Greenstein, returning
/// `(local_direction, cos_theta)`. Falls back to isotropic sampling for
/// `|g| < 1e-4` to avoid the singular denominator near `g = 0`.
#[must_use]
pub fn sample_phase_henyey_greenstein(g: f32, rng: &mut Rng) -> (Vec3, f32) {
    let (xi1, xi2) = rng.next_2();
    if g.abs() < 1e-4 {
        let local = sample_phase_isotropic(rng);
        return (local, local.z);
    }
    let g2 = g * g;
    let sqr = (1.0 - g2) / (1.0 - g + 2.0 * g * xi1);
    let cos_theta = (1.0 + g2 - sqr * sqr) / (2.0 * g);
    let sin_theta = (1.0 - cos_theta * cos_theta).max(0.0).sqrt();
    let phi = 2.0 * PI * xi2;
    (
        Vec3::new(sin_theta * phi.cos(), sin_theta * phi.sin(), cos_theta),
        cos_theta,
    )
}
