//! Sparse brick-grid storage: dense indirection + per-brick range mip chain
//! + compacted atlas, built from a dense [`crate::volume::Grid`].

use glam::Vec3;
use rustc_hash::FxHashMap;

use crate::rng::Rng;
use crate::volume::Grid;

/// Bricks are fixed 8x8x8 blocks of voxels.
pub const BRICK_SIDE: u32 = 8;

#[derive(Debug, Clone, Copy, Default)]
struct MinMax {
    lo: f32,
    hi: f32,
}

/// One level of the per-brick range mip chain: level 0 is per-brick range
/// (8^3 voxels), level k covers `(8*2^k)^3` voxels per entry.
#[derive(Debug, Clone)]
struct MipLevel {
    res: [u32; 3],
    range: Vec<MinMax>,
}

impl MipLevel {
    fn linear(&self, coord: [i32; 3]) -> Option<usize> {
        let [x, y, z] = coord;
        let [rx, ry, rz] = self.res;
        if x < 0 || y < 0 || z < 0 || x as u32 >= rx || y as u32 >= ry || z as u32 >= rz {
            return None;
        }
        Some((z as usize * ry as usize + y as usize) * rx as usize + x as usize)
    }
}

/// Sparse brick-grid storage the free-flight, transmittance, and DDA
/// traversal routines read from.
#[derive(Debug, Clone)]
pub struct BrickGrid {
    /// Brick-resolution dims: `ceil(index_extent / 8)`.
    pub brick_res: [u32; 3],
    indirection: Vec<Option<[u32; 3]>>,
    atlas: Vec<f32>,
    atlas_res_bricks: [u32; 3],
    mips: Vec<MipLevel>,
}

impl BrickGrid {
    /// Number of mip levels, including level 0 (per-brick) and the final
    /// 1x1x1 level.
    #[must_use]
    pub fn mip_count(&self) -> usize {
        self.mips.len()
    }

    /// Build a brick grid from a dense scalar grid.
    #[must_use]
    pub fn from_grid(grid: &Grid) -> Self {
        log::trace!("building brick grid from {:?} dense grid", grid.index_extent);
        let [ex, ey, ez] = grid.index_extent;
        let brick_res = [
            ex.div_ceil(BRICK_SIDE),
            ey.div_ceil(BRICK_SIDE),
            ez.div_ceil(BRICK_SIDE),
        ];
        let brick_count = (brick_res[0] as usize) * (brick_res[1] as usize) * (brick_res[2] as usize);
        let mut level0 = vec![MinMax::default(); brick_count];
        let mut occupied: FxHashMap<[u32; 3], u32> = FxHashMap::default();

        for bz in 0..brick_res[2] {
            for by in 0..brick_res[1] {
                for bx in 0..brick_res[0] {
                    let mut lo = f32::INFINITY;
                    let mut hi = f32::NEG_INFINITY;
                    for lz in 0..BRICK_SIDE {
                        for ly in 0..BRICK_SIDE {
                            for lx in 0..BRICK_SIDE {
                                let i = (bx * BRICK_SIDE + lx) as i32;
                                let j = (by * BRICK_SIDE + ly) as i32;
                                let k = (bz * BRICK_SIDE + lz) as i32;
                                let v = grid.decode(i, j, k);
                                lo = lo.min(v);
                                hi = hi.max(v);
                            }
                        }
                    }
                    let idx = (bz as usize * brick_res[1] as usize + by as usize) * brick_res[0] as usize
                        + bx as usize;
                    if hi > lo {
                        level0[idx] = MinMax { lo, hi };
                        let next_ptr = occupied.len() as u32;
                        let _ = occupied.insert([bx, by, bz], next_ptr);
                    } else {
                        level0[idx] = MinMax { lo: 0.0, hi: 0.0 };
                    }
                }
            }
        }

        let occupied_count = occupied.len();
        let atlas_side = (occupied_count as f32).cbrt().ceil().max(1.0) as u32;
        let atlas_res_bricks = [atlas_side, atlas_side, atlas_side];
        let atlas_voxels_side = atlas_side * BRICK_SIDE;
        let atlas_len = (atlas_voxels_side as usize).pow(3);
        let mut atlas = vec![0.0_f32; atlas_len];

        let mut indirection = vec![None; brick_count];
        for (&[bx, by, bz], &ptr) in &occupied {
            let idx =
                (bz as usize * brick_res[1] as usize + by as usize) * brick_res[0] as usize + bx as usize;
            let px = ptr % atlas_side;
            let py = (ptr / atlas_side) % atlas_side;
            let pz = ptr / (atlas_side * atlas_side);
            indirection[idx] = Some([px, py, pz]);

            let MinMax { lo, hi } = level0[idx];
            let denom = if hi > lo { hi - lo } else { 1.0 };
            for lz in 0..BRICK_SIDE {
                for ly in 0..BRICK_SIDE {
                    for lx in 0..BRICK_SIDE {
                        let i = (bx * BRICK_SIDE + lx) as i32;
                        let j = (by * BRICK_SIDE + ly) as i32;
                        let k = (bz * BRICK_SIDE + lz) as i32;
                        let v = grid.decode(i, j, k);
                        let u = if hi > lo { (v - lo) / denom } else { 0.0 };
                        let ax = px * BRICK_SIDE + lx;
                        let ay = py * BRICK_SIDE + ly;
                        let az = pz * BRICK_SIDE + lz;
                        let atlas_idx = (az as usize * atlas_voxels_side as usize + ay as usize)
                            * atlas_voxels_side as usize
                            + ax as usize;
                        atlas[atlas_idx] = u;
                    }
                }
            }
        }

        let mut mips = vec![MipLevel {
            res: brick_res,
            range: level0,
        }];
        loop {
            let prev = &mips[mips.len() - 1];
            if prev.res == [1, 1, 1] {
                break;
            }
            let res = [
                prev.res[0].div_ceil(2).max(1),
                prev.res[1].div_ceil(2).max(1),
                prev.res[2].div_ceil(2).max(1),
            ];
            let count = (res[0] as usize) * (res[1] as usize) * (res[2] as usize);
            let mut range = vec![MinMax {
                lo: f32::INFINITY,
                hi: f32::NEG_INFINITY,
            }; count];
            for z in 0..prev.res[2] {
                for y in 0..prev.res[1] {
                    for x in 0..prev.res[0] {
                        let src = (z as usize * prev.res[1] as usize + y as usize) * prev.res[0] as usize
                            + x as usize;
                        let mm = prev.range[src];
                        if mm.lo > mm.hi {
                            continue;
                        }
                        let dst_idx = ((z / 2) as usize * res[1] as usize + (y / 2) as usize) * res[0] as usize
                            + (x / 2) as usize;
                        range[dst_idx].lo = range[dst_idx].lo.min(mm.lo);
                        range[dst_idx].hi = range[dst_idx].hi.max(mm.hi);
                    }
                }
            }
            for mm in &mut range {
                if mm.lo > mm.hi {
                    *mm = MinMax { lo: 0.0, hi: 0.0 };
                }
            }
            mips.push(MipLevel { res, range });
        }

        log::debug!(
            "brick grid built: {} bricks ({} occupied), atlas {}x{}x{} bricks, {} mip levels",
            brick_count,
            occupied_count,
            atlas_res_bricks[0],
            atlas_res_bricks[1],
            atlas_res_bricks[2],
            mips.len()
        );

        Self {
            brick_res,
            indirection,
            atlas,
            atlas_res_bricks,
            mips,
        }
    }

    /// Unscaled voxel lookup at floating index position `p` (§4.4 "Voxel").
    #[must_use]
    pub fn voxel(&self, p: Vec3) -> f32 {
        let i = p.x.floor() as i32;
        let j = p.y.floor() as i32;
        let k = p.z.floor() as i32;
        let bx = i >> 3;
        let by = j >> 3;
        let bz = k >> 3;
        let [rx, ry, rz] = self.brick_res;
        if bx < 0 || by < 0 || bz < 0 || bx as u32 >= rx || by as u32 >= ry || bz as u32 >= rz {
            return 0.0;
        }
        let b_idx = (bz as usize * ry as usize + by as usize) * rx as usize + bx as usize;
        let Some(ptr) = self.indirection[b_idx] else {
            return 0.0;
        };
        let MinMax { lo, hi } = self.mips[0].range[b_idx];
        let lx = (i & 7) as u32;
        let ly = (j & 7) as u32;
        let lz = (k & 7) as u32;
        let atlas_side_voxels = self.atlas_res_bricks[0] * BRICK_SIDE;
        let ax = ptr[0] * BRICK_SIDE + lx;
        let ay = ptr[1] * BRICK_SIDE + ly;
        let az = ptr[2] * BRICK_SIDE + lz;
        let idx = (az as usize * atlas_side_voxels as usize + ay as usize) * atlas_side_voxels as usize
            + ax as usize;
        lo + self.atlas[idx] * (hi - lo)
    }

    /// Density with stochastic anti-aliasing filter (§4.4): jitters the
    /// sample position by a uniform offset in `[-0.5, 0.5)^3` and scales by
    /// `density_scale`.
    #[must_use]
    pub fn density(&self, p: Vec3, density_scale: f32, rng: &mut Rng) -> f32 {
        let (x, y, z) = rng.next_3();
        let jitter = Vec3::new(x, y, z) - Vec3::splat(0.5);
        density_scale * self.voxel(p + jitter)
    }

    /// Per-brick (or coarser mip) majorant lookup (§4.4 "Majorant").
    #[must_use]
    pub fn majorant(&self, p: Vec3, mip: u32, density_scale: f32) -> f32 {
        let shift = 3 + mip;
        let i = (p.x.floor() as i32) >> shift;
        let j = (p.y.floor() as i32) >> shift;
        let k = (p.z.floor() as i32) >> shift;
        let level = &self.mips[(mip as usize).min(self.mips.len() - 1)];
        let hi = level
            .linear([i, j, k])
            .map_or(0.0, |idx| level.range[idx].hi);
        density_scale * hi
    }

    /// Global majorant over the whole grid (top mip level).
    #[must_use]
    pub fn global_majorant(&self, density_scale: f32) -> f32 {
        let top = &self.mips[self.mips.len() - 1];
        density_scale * top.range.first().map_or(0.0, |mm| mm.hi)
    }

    /// Global minorant over the whole grid (top mip level), exposed for
    /// parity with the original renderer's diagnostics; the core estimators
    /// only consume the majorant.
    #[must_use]
    pub fn global_minorant(&self, density_scale: f32) -> f32 {
        let top = &self.mips[self.mips.len() - 1];
        density_scale * top.range.first().map_or(0.0, |mm| mm.lo)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Mat4;
    use crate::volume::Grid;

    fn analytic_grid(extent: [u32; 3]) -> Grid {
        let [ex, ey, ez] = extent;
        let mut data = Vec::with_capacity((ex * ey * ez) as usize);
        for z in 0..ez {
            for y in 0..ey {
                for x in 0..ex {
                    data.push((x + y * ex + z * ex * ey) as f32 / (ex * ey * ez) as f32);
                }
            }
        }
        Grid::new(Mat4::IDENTITY, extent, data).unwrap()
    }

    #[test]
    fn decode_round_trips_within_8bit_precision() {
        let grid = analytic_grid([16, 16, 16]);
        let bricks = BrickGrid::from_grid(&grid);
        for z in 0..16 {
            for y in 0..16 {
                for x in 0..16 {
                    let expected = grid.decode(x, y, z);
                    let got = bricks.voxel(Vec3::new(x as f32 + 0.5, y as f32 + 0.5, z as f32 + 0.5));
                    assert!(
                        (got - expected).abs() < 1.0 / 255.0,
                        "mismatch at ({x},{y},{z}): {got} vs {expected}"
                    );
                }
            }
        }
    }

    #[test]
    fn majorant_bounds_every_voxel_in_its_brick() {
        let grid = analytic_grid([16, 16, 16]);
        let bricks = BrickGrid::from_grid(&grid);
        for z in 0..16 {
            for y in 0..16 {
                for x in 0..16 {
                    let v = bricks.voxel(Vec3::new(x as f32 + 0.5, y as f32 + 0.5, z as f32 + 0.5));
                    let m = bricks.majorant(Vec3::new(x as f32 + 0.5, y as f32 + 0.5, z as f32 + 0.5), 0, 1.0);
                    assert!(v <= m + 1e-4, "voxel {v} exceeds majorant {m} at ({x},{y},{z})");
                }
            }
        }
    }

    #[test]
    fn empty_brick_decodes_to_zero() {
        let grid = Grid::new(Mat4::IDENTITY, [8, 8, 8], vec![0.0; 512]).unwrap();
        let bricks = BrickGrid::from_grid(&grid);
        assert_eq!(bricks.voxel(Vec3::new(3.5, 3.5, 3.5)), 0.0);
    }

    #[test]
    fn out_of_bounds_lookup_is_zero() {
        let grid = analytic_grid([8, 8, 8]);
        let bricks = BrickGrid::from_grid(&grid);
        assert_eq!(bricks.voxel(Vec3::new(-1.0, -1.0, -1.0)), 0.0);
        assert_eq!(bricks.voxel(Vec3::new(100.0, 100.0, 100.0)), 0.0);
    }

    #[test]
    fn mip_chain_terminates_at_one_cubed() {
        let grid = analytic_grid([64, 64, 64]);
        let bricks = BrickGrid::from_grid(&grid);
        let top = bricks.mips.last().unwrap();
        assert_eq!(top.res, [1, 1, 1]);
    }
}
