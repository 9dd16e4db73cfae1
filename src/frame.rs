//! Tangent-frame alignment, axis-aligned box intersection, and small scalar
//! helpers shared by the phase-function and environment samplers.

use glam::Vec3;

/// A ray in world space: unit-length direction, optional parametric bounds.
#[derive(Debug, Clone, Copy)]
pub struct Ray {
    /// Ray origin.
    pub origin: Vec3,
    /// Unit-length ray direction.
    pub direction: Vec3,
    /// Minimum valid parametric distance.
    pub t_min: f32,
    /// Maximum valid parametric distance.
    pub t_max: f32,
}

impl Ray {
    /// Construct a ray with the default `[0, inf)` parametric range.
    #[must_use]
    pub fn new(origin: Vec3, direction: Vec3) -> Self {
        Self {
            origin,
            direction,
            t_min: 0.0,
            t_max: f32::INFINITY,
        }
    }

    /// Point along the ray at parameter `t`.
    #[must_use]
    pub fn at(&self, t: f32) -> Vec3 {
        self.origin + self.direction * t
    }
}

/// Build an orthonormal tangent basis `(T, B, N)` around `normal` and rotate
/// the local-frame vector `v` into world space.
///
/// Chooses `T` as the normalized rejection of whichever world axis (X or Y)
/// is most orthogonal to `normal`, matching the reference implementation's
/// `|N.x| vs |N.y|` comparison rather than a fixed "up" vector, so it never
/// degenerates near the poles.
#[must_use]
pub fn align(normal: Vec3, v: Vec3) -> Vec3 {
    let tangent = if normal.x.abs() > normal.y.abs() {
        Vec3::new(-normal.z, 0.0, normal.x).normalize_or_zero()
    } else {
        Vec3::new(0.0, normal.z, -normal.y).normalize_or_zero()
    };
    let bitangent = normal.cross(tangent);
    (tangent * v.x + bitangent * v.y + normal * v.z).normalize_or_zero()
}

/// Slab-method ray/AABB intersection. Returns `(t_near, t_far, hit)` with
/// `t_near` clamped to `0`.
#[must_use]
pub fn intersect_box(origin: Vec3, direction: Vec3, bmin: Vec3, bmax: Vec3) -> (f32, f32, bool) {
    let inv_dir = Vec3::new(
        safe_recip(direction.x),
        safe_recip(direction.y),
        safe_recip(direction.z),
    );
    let t0 = (bmin - origin) * inv_dir;
    let t1 = (bmax - origin) * inv_dir;
    let tsmaller = t0.min(t1);
    let tbigger = t0.max(t1);
    let tnear = tsmaller.x.max(tsmaller.y).max(tsmaller.z).max(0.0);
    let tfar = tbigger.x.min(tbigger.y).min(tbigger.z);
    (tnear, tfar, tnear <= tfar)
}

fn safe_recip(x: f32) -> f32 {
    if x == 0.0 {
        f32::INFINITY
    } else {
        1.0 / x
    }
}

/// Multiple importance sampling power heuristic with β = 2.
#[must_use]
pub fn power_heuristic(a: f32, b: f32) -> f32 {
    let a2 = a * a;
    let b2 = b * b;
    let denom = a2 + b2;
    if denom <= 0.0 {
        0.0
    } else {
        a2 / denom
    }
}

/// Perceptual luminance of a linear RGB color.
#[must_use]
pub fn luma(rgb: Vec3) -> f32 {
    rgb.dot(Vec3::new(0.212_6, 0.715_2, 0.072_2))
}
