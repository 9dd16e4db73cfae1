//! 1D RGBA transfer function: maps scalar density to extinction-scale
//! opacity and scattering-albedo tint.

use glam::Vec4;

use crate::error::{Result, VolRenError};

/// A linearly interpolated 1D lookup table over a density window.
///
/// Density values outside `[window_left, window_left + window_width]` clamp
/// to the nearest edge. Alpha is extinction-scale opacity in `[0, 1]`; RGB is
/// the scattering-albedo tint.
#[derive(Debug, Clone)]
pub struct TransferFunction {
    table: Vec<Vec4>,
    window_left: f32,
    window_width: f32,
}

impl TransferFunction {
    /// Build a transfer function from an RGBA table sampled over
    /// `[window_left, window_left + window_width]`.
    ///
    /// # Errors
    /// Returns [`VolRenError::InvalidInput`] if `window_width <= 0` or the
    /// table has fewer than two entries.
    pub fn new(table: Vec<Vec4>, window_left: f32, window_width: f32) -> Result<Self> {
        if window_width <= 0.0 {
            return Err(VolRenError::InvalidInput(format!(
                "transfer function window_width {window_width} must be > 0"
            )));
        }
        if table.len() < 2 {
            return Err(VolRenError::InvalidInput(
                "transfer function table must have at least 2 entries".to_string(),
            ));
        }
        Ok(Self {
            table,
            window_left,
            window_width,
        })
    }

    /// A white-tinted transfer function whose alpha ramps linearly from `0`
    /// to `1` over `[0, 1]` — treats raw density directly as extinction, the
    /// behavior used when no transfer function is set.
    #[must_use]
    pub fn identity() -> Self {
        Self {
            table: vec![Vec4::new(1.0, 1.0, 1.0, 0.0), Vec4::new(1.0, 1.0, 1.0, 1.0)],
            window_left: 0.0,
            window_width: 1.0,
        }
    }

    /// Sample the table at `density`, clamping outside the window and
    /// interpolating linearly inside it.
    #[must_use]
    pub fn lookup(&self, density: f32) -> Vec4 {
        let t = ((density - self.window_left) / self.window_width).clamp(0.0, 1.0);
        let last = (self.table.len() - 1) as f32;
        let pos = t * last;
        let i0 = pos.floor() as usize;
        let i1 = (i0 + 1).min(self.table.len() - 1);
        let frac = pos - i0 as f32;
        self.table[i0].lerp(self.table[i1], frac)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_nonpositive_window_width() {
        assert!(TransferFunction::new(vec![Vec4::ZERO, Vec4::ONE], 0.0, 0.0).is_err());
        assert!(TransferFunction::new(vec![Vec4::ZERO, Vec4::ONE], 0.0, -1.0).is_err());
    }

    #[test]
    fn clamps_outside_window() {
        let tf = TransferFunction::new(vec![Vec4::ZERO, Vec4::ONE], 0.0, 1.0).unwrap();
        assert_eq!(tf.lookup(-5.0), Vec4::ZERO);
        assert_eq!(tf.lookup(5.0), Vec4::ONE);
    }

    #[test]
    fn interpolates_linearly_inside_window() {
        let tf = TransferFunction::new(vec![Vec4::ZERO, Vec4::ONE], 0.0, 1.0).unwrap();
        let mid = tf.lookup(0.5);
        assert!((mid.x - 0.5).abs() < 1e-5);
    }

    #[test]
    fn identity_alpha_tracks_density_linearly() {
        let tf = TransferFunction::identity();
        assert_eq!(tf.lookup(0.0).w, 0.0);
        assert!((tf.lookup(0.3).w - 0.3).abs() < 1e-5);
        assert_eq!(tf.lookup(1.0).w, 1.0);
    }
}
