//! Brick-resolution DDA stepping: advances a ray in index space to the next
//! brick boundary on a given mip level.

use glam::Vec3;

use crate::brick::BRICK_SIDE;

/// Parametric distance to the next brick-boundary crossing on mip level
/// `mip`, for a ray at index-space position `pos` with direction `idir`
/// (and precomputed reciprocal `ri = 1/idir`).
#[must_use]
pub fn step_dda(pos: Vec3, ri: Vec3, mip: u32) -> f32 {
    let d = f32::from(BRICK_SIDE) * 2f32.powi(mip as i32);
    let offs = Vec3::new(
        offset_component(ri.x, d),
        offset_component(ri.y, d),
        offset_component(ri.z, d),
    );
    let tmax = ((pos / d).floor() * d + offs - pos) * ri;
    tmax.x.min(tmax.y).min(tmax.z)
}

fn offset_component(ri_axis: f32, d: f32) -> f32 {
    if ri_axis >= 0.0 {
        d + 0.5
    } else {
        -0.5
    }
}
