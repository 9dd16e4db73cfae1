//! Volume data model: multi-frame named grids, the container the brick-grid
//! builder and the renderer commit path consume.

use glam::{Mat4, Vec3};
use rustc_hash::FxHashMap;

use crate::error::{Result, VolRenError};

/// Channel name treated as emission when present on a frame.
pub const EMISSION_CHANNEL_NAMES: [&str; 3] = ["flame", "flames", "temperature"];

/// The mandatory density channel name.
pub const DENSITY_CHANNEL: &str = "density";

/// A dense scalar 3D field: the raw per-voxel data a [`crate::brick::BrickGrid`]
/// is built from.
#[derive(Debug, Clone)]
pub struct Grid {
    /// Index-space to world-space affine transform.
    pub transform: Mat4,
    /// Integer dimensions `(X, Y, Z)`.
    pub index_extent: [u32; 3],
    /// Minimum voxel value over the whole grid.
    pub minorant: f32,
    /// Maximum voxel value over the whole grid.
    pub majorant: f32,
    /// Dense row-major (X fastest) voxel data, length `product(index_extent)`.
    data: Vec<f32>,
}

impl Grid {
    /// Build a grid from dense voxel data, computing `minorant`/`majorant`
    /// from the data itself.
    ///
    /// # Errors
    /// Returns [`VolRenError::InvalidInput`] if `data.len()` does not match
    /// `index_extent`'s product, or any dimension is zero.
    pub fn new(transform: Mat4, index_extent: [u32; 3], data: Vec<f32>) -> Result<Self> {
        let [x, y, z] = index_extent;
        if x == 0 || y == 0 || z == 0 {
            return Err(VolRenError::InvalidInput(
                "grid index_extent must be non-zero in every axis".to_string(),
            ));
        }
        let expected = (x as usize) * (y as usize) * (z as usize);
        if data.len() != expected {
            return Err(VolRenError::InvalidInput(format!(
                "grid data length {} does not match index_extent product {expected}",
                data.len()
            )));
        }
        let mut minorant = f32::INFINITY;
        let mut majorant = f32::NEG_INFINITY;
        for &v in &data {
            minorant = minorant.min(v);
            majorant = majorant.max(v);
        }
        if !minorant.is_finite() {
            minorant = 0.0;
            majorant = 0.0;
        }
        Ok(Self {
            transform,
            index_extent,
            minorant,
            majorant,
            data,
        })
    }

    /// Decode the voxel at integer index `(i, j, k)`. Out-of-range indices
    /// return `0.0` (treated as empty space, matching the brick-grid
    /// empty-brick convention).
    #[must_use]
    pub fn decode(&self, i: i32, j: i32, k: i32) -> f32 {
        let [ex, ey, ez] = self.index_extent;
        if i < 0 || j < 0 || k < 0 || i as u32 >= ex || j as u32 >= ey || k as u32 >= ez {
            return 0.0;
        }
        let idx = (k as usize * ey as usize + j as usize) * ex as usize + i as usize;
        self.data[idx]
    }

    /// World-space axis-aligned bounding box of the grid's unit index cube.
    #[must_use]
    pub fn world_aabb(&self) -> (Vec3, Vec3) {
        let [ex, ey, ez] = self.index_extent;
        let corners = [
            Vec3::ZERO,
            Vec3::new(ex as f32, 0.0, 0.0),
            Vec3::new(0.0, ey as f32, 0.0),
            Vec3::new(0.0, 0.0, ez as f32),
            Vec3::new(ex as f32, ey as f32, 0.0),
            Vec3::new(ex as f32, 0.0, ez as f32),
            Vec3::new(0.0, ey as f32, ez as f32),
            Vec3::new(ex as f32, ey as f32, ez as f32),
        ];
        let mut lo = Vec3::splat(f32::INFINITY);
        let mut hi = Vec3::splat(f32::NEG_INFINITY);
        for c in corners {
            let w = self.transform.transform_point3(c);
            lo = lo.min(w);
            hi = hi.max(w);
        }
        (lo, hi)
    }
}

/// One animation frame: named channels, at least `"density"`.
pub type FrameChannels = FxHashMap<String, Grid>;

/// A multi-frame, multi-channel volume: the data the renderer commits.
#[derive(Debug, Clone, Default)]
pub struct Volume {
    frames: Vec<FrameChannels>,
    /// Currently selected frame, clamped to the last available frame if out
    /// of range rather than treated as an error (matches the original's
    /// permissive indexing).
    pub frame_index: usize,
}

impl Volume {
    /// Construct a volume from its per-frame channel maps.
    ///
    /// # Errors
    /// Returns [`VolRenError::InvalidInput`] if there are no frames, or any
    /// frame is missing the `"density"` channel.
    pub fn new(frames: Vec<FrameChannels>) -> Result<Self> {
        if frames.is_empty() {
            return Err(VolRenError::InvalidInput(
                "volume must have at least one frame".to_string(),
            ));
        }
        for (idx, frame) in frames.iter().enumerate() {
            if !frame.contains_key(DENSITY_CHANNEL) {
                return Err(VolRenError::InvalidInput(format!(
                    "frame {idx} has no \"density\" channel"
                )));
            }
        }
        Ok(Self {
            frames,
            frame_index: 0,
        })
    }

    /// Number of animation frames.
    #[must_use]
    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    /// The channel map for the currently selected frame, clamped in range.
    #[must_use]
    pub fn current_frame(&self) -> &FrameChannels {
        let idx = self.frame_index.min(self.frames.len() - 1);
        &self.frames[idx]
    }

    /// The density grid of the current frame.
    ///
    /// `Volume::new` guarantees every frame carries a `"density"` channel,
    /// so this lookup cannot fail.
    #[must_use]
    #[allow(clippy::unwrap_used)]
    pub fn density(&self) -> &Grid {
        self.current_frame().get(DENSITY_CHANNEL).unwrap()
    }

    /// The emission grid of the current frame, if any of
    /// `"flame"|"flames"|"temperature"` is present.
    #[must_use]
    pub fn emission(&self) -> Option<&Grid> {
        let frame = self.current_frame();
        EMISSION_CHANNEL_NAMES
            .iter()
            .find_map(|name| frame.get(*name))
    }

    /// Rescale every frame's transform so the largest extent across all
    /// frames maps to length 1 in world space, and return the scale factor
    /// applied (callers compensate `density_scale` by this factor so
    /// optical thickness is invariant to the rescale).
    pub fn normalize_to_unit_cube(&mut self) -> f32 {
        let mut lo = Vec3::splat(f32::INFINITY);
        let mut hi = Vec3::splat(f32::NEG_INFINITY);
        for frame in &self.frames {
            for grid in frame.values() {
                let (glo, ghi) = grid.world_aabb();
                lo = lo.min(glo);
                hi = hi.max(ghi);
            }
        }
        let extent = hi - lo;
        let max_extent = extent.x.max(extent.y).max(extent.z).max(1e-8);
        let scale = 1.0 / max_extent;
        let center = (lo + hi) * 0.5;
        let recenter = Mat4::from_translation(-center * scale) * Mat4::from_scale(Vec3::splat(scale));
        for frame in &mut self.frames {
            for grid in frame.values_mut() {
                grid.transform = recenter * grid.transform;
            }
        }
        scale
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit_grid(extent: [u32; 3], fill: f32) -> Grid {
        let n = (extent[0] * extent[1] * extent[2]) as usize;
        Grid::new(Mat4::IDENTITY, extent, vec![fill; n]).unwrap()
    }

    #[test]
    fn rejects_mismatched_data_length() {
        assert!(Grid::new(Mat4::IDENTITY, [2, 2, 2], vec![0.0; 4]).is_err());
    }

    #[test]
    fn rejects_zero_extent() {
        assert!(Grid::new(Mat4::IDENTITY, [0, 2, 2], vec![]).is_err());
    }

    #[test]
    fn decode_out_of_range_returns_zero() {
        let grid = unit_grid([2, 2, 2], 1.0);
        assert_eq!(grid.decode(-1, 0, 0), 0.0);
        assert_eq!(grid.decode(5, 0, 0), 0.0);
    }

    #[test]
    fn volume_requires_density_channel() {
        let mut frame = FrameChannels::default();
        frame.insert("flame".to_string(), unit_grid([2, 2, 2], 1.0));
        assert!(Volume::new(vec![frame]).is_err());
    }

    #[test]
    fn out_of_range_frame_index_clamps_to_last() {
        let mut frame = FrameChannels::default();
        frame.insert(DENSITY_CHANNEL.to_string(), unit_grid([2, 2, 2], 1.0));
        let mut vol = Volume::new(vec![frame]).unwrap();
        vol.frame_index = 99;
        assert_eq!(vol.current_frame().len(), 1);
    }

    #[test]
    fn normalize_to_unit_cube_scales_largest_extent_to_one() {
        let mut frame = FrameChannels::default();
        frame.insert(DENSITY_CHANNEL.to_string(), unit_grid([4, 2, 2], 1.0));
        let mut vol = Volume::new(vec![frame]).unwrap();
        vol.normalize_to_unit_cube();
        let (lo, hi) = vol.density().world_aabb();
        let extent = hi - lo;
        let max_extent = extent.x.max(extent.y).max(extent.z);
        assert!((max_extent - 1.0).abs() < 1e-4);
    }
}
