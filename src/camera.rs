//! Pinhole camera: maps a jittered pixel sample to a primary world-space ray.

use glam::{Mat3, Vec3};

use crate::error::{Result, VolRenError};
use crate::frame::Ray;

/// A pinhole camera: position, orientation, and field of view.
#[derive(Debug, Clone, Copy)]
pub struct Camera {
    /// World-space camera position.
    pub position: Vec3,
    /// Rotation matrix whose columns are (right, up, forward).
    pub transform: Mat3,
    /// Vertical field of view, in degrees, in `(0, 180)`.
    pub fov_deg: f32,
}

impl Camera {
    /// Construct a camera looking down `-forward` is not assumed; `transform`
    /// columns are taken as-is as (right, up, forward).
    ///
    /// # Errors
    /// Returns [`VolRenError::InvalidInput`] if `fov_deg` is outside `(0, 180)`.
    pub fn new(position: Vec3, transform: Mat3, fov_deg: f32) -> Result<Self> {
        if !(fov_deg > 0.0 && fov_deg < 180.0) {
            return Err(VolRenError::InvalidInput(format!(
                "camera fov_deg {fov_deg} must be in (0, 180)"
            )));
        }
        Ok(Self {
            position,
            transform,
            fov_deg,
        })
    }

    /// Build the primary ray through pixel `(x, y)` of a `(width, height)`
    /// image with sub-pixel jitter `(jx, jy) in [0, 1)^2`.
    #[must_use]
    pub fn primary_ray(&self, x: u32, y: u32, width: u32, height: u32, jx: f32, jy: f32) -> Ray {
        let w = width as f32;
        let h = height as f32;
        let ndc_x = (x as f32 + jx - 0.5 * w) / h;
        let ndc_y = (y as f32 + jy - 0.5 * h) / h;
        let z = -0.5 / (0.5 * std::f32::consts::PI * self.fov_deg / 180.0).tan();
        let local = Vec3::new(ndc_x, ndc_y, z).normalize();
        let dir = (self.transform * local).normalize();
        Ray::new(self.position, dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_out_of_range_fov() {
        assert!(Camera::new(Vec3::ZERO, Mat3::IDENTITY, 0.0).is_err());
        assert!(Camera::new(Vec3::ZERO, Mat3::IDENTITY, 180.0).is_err());
        assert!(Camera::new(Vec3::ZERO, Mat3::IDENTITY, -10.0).is_err());
    }

    #[test]
    fn accepts_typical_fov() {
        assert!(Camera::new(Vec3::ZERO, Mat3::IDENTITY, 60.0).is_ok());
    }

    #[test]
    fn center_pixel_points_roughly_forward() {
        let cam = Camera::new(Vec3::ZERO, Mat3::IDENTITY, 60.0).unwrap();
        let ray = cam.primary_ray(320, 240, 640, 480, 0.5, 0.5);
        assert!(ray.direction.dot(Vec3::Z) < -0.9);
    }

    #[test]
    fn determinism_same_inputs_same_ray() {
        let cam = Camera::new(Vec3::new(1.0, 2.0, 3.0), Mat3::IDENTITY, 45.0).unwrap();
        let a = cam.primary_ray(10, 20, 640, 480, 0.3, 0.7);
        let b = cam.primary_ray(10, 20, 640, 480, 0.3, 0.7);
        assert_eq!(a.direction, b.direction);
    }
}
