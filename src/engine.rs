//! External interface: the `init -> set_* -> commit -> trace -> framebuffer`
//! sequence collaborators drive the engine through (§6).
//!
//! Method names and the exposed read/write surface are grounded on the
//! original's pybind11 `Renderer` binding (`init`, `commit`, `trace`,
//! `render`, `resize`, and the `sppx`/`bounces`/`seed`/... option fields).

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::OnceLock;

use glam::{Mat3, Mat4, Vec3};

use crate::brick::BrickGrid;
use crate::camera::Camera;
use crate::driver::Driver;
use crate::environment::Environment;
use crate::error::{Result, VolRenError};
use crate::integrator::{Estimator, FrameContext};
use crate::options::RenderOptions;
use crate::phase::Phase;
use crate::transferfunc::TransferFunction;
use crate::volume::Volume;

/// Derived, per-commit state built from the volume and options current at
/// the time of the last `commit()` call.
struct CommittedFrame {
    density: BrickGrid,
    emission: Option<BrickGrid>,
    emission_norm: f32,
    world_to_index: Mat4,
    vol_bb_min: Vec3,
    vol_bb_max: Vec3,
    vol_majorant: f32,
}

fn black_environment() -> &'static Environment {
    static BLACK: OnceLock<Environment> = OnceLock::new();
    BLACK.get_or_init(Environment::black)
}

/// The volumetric path tracer's external interface.
pub struct VolRenderer {
    width: u32,
    height: u32,
    volume: Option<Volume>,
    environment: Option<Environment>,
    transfer_function: Option<TransferFunction>,
    camera: Option<Camera>,
    options: RenderOptions,
    estimator: Estimator,
    driver: Option<Driver>,
    committed: Option<CommittedFrame>,
}

impl VolRenderer {
    /// Construct a renderer with no resolution and no resources set. Call
    /// [`VolRenderer::init`] before anything else.
    #[must_use]
    pub fn new() -> Self {
        Self {
            width: 0,
            height: 0,
            volume: None,
            environment: None,
            transfer_function: None,
            camera: None,
            options: RenderOptions::default(),
            estimator: Estimator::RatioTracking,
            driver: None,
            committed: None,
        }
    }

    /// Allocate the framebuffer at `(width, height)`.
    ///
    /// # Errors
    /// Returns [`VolRenError::InvalidInput`] if either dimension is zero.
    pub fn init(&mut self, width: u32, height: u32) -> Result<()> {
        if width == 0 || height == 0 {
            return Err(VolRenError::InvalidInput(format!(
                "invalid resolution {width}x{height}"
            )));
        }
        self.width = width;
        self.height = height;
        let mut driver = Driver::new(width, height);
        driver.set_base_seed(self.options.seed);
        self.driver = Some(driver);
        self.committed = None;
        Ok(())
    }

    /// Set the volume to render. Rebuilt brick grids take effect on the next
    /// `commit()`.
    pub fn set_volume(&mut self, volume: Volume) {
        self.volume = Some(volume);
        self.committed = None;
    }

    /// Set the environment map. Takes effect on the next `trace()`.
    pub fn set_environment(&mut self, environment: Environment) {
        self.environment = Some(environment);
        self.reset();
    }

    /// Set or clear the transfer function. Takes effect on the next
    /// `trace()`; `None` behaves as the identity transfer function.
    pub fn set_transfer_function(&mut self, tf: Option<TransferFunction>) {
        self.transfer_function = tf;
        self.reset();
    }

    /// Choose which free-flight/transmittance estimator pair `trace()` will
    /// dispatch through (§9 "Dynamic dispatch of estimators").
    pub fn set_estimator(&mut self, estimator: Estimator) {
        self.estimator = estimator;
        self.reset();
    }

    /// Set the camera.
    ///
    /// # Errors
    /// Returns [`VolRenError::InvalidInput`] if `fov_deg` is outside `(0, 180)`.
    pub fn set_camera(&mut self, position: Vec3, rotation: Mat3, fov_deg: f32) -> Result<()> {
        self.camera = Some(Camera::new(position, rotation, fov_deg)?);
        self.reset();
        Ok(())
    }

    /// Replace the exposed render options (§6 "Exposed parameters"). Always
    /// resets the accumulator, since any field may change the image.
    pub fn set_options(&mut self, options: RenderOptions) {
        self.options = options;
        if let Some(driver) = &mut self.driver {
            driver.set_base_seed(self.options.seed);
        }
        self.reset();
    }

    /// Current render options.
    #[must_use]
    pub const fn options(&self) -> &RenderOptions {
        &self.options
    }

    /// Current framebuffer dimensions.
    #[must_use]
    pub const fn resolution(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Build brick grids from the committed volume, normalize to the unit
    /// cube, and compute derived majorants (§4.12 "Commit flow").
    ///
    /// # Errors
    /// Returns [`VolRenError::ProtocolMisuse`] if no volume has been set.
    pub fn commit(&mut self) -> Result<()> {
        log::debug!("commit() starting");
        let Some(volume) = self.volume.as_mut() else {
            return Err(VolRenError::ProtocolMisuse(
                "commit() called with no volume set".to_string(),
            ));
        };

        let scale = volume.normalize_to_unit_cube();
        let compensated_density_scale = self.options.density_scale * scale;

        let density_grid = volume.density();
        let density = BrickGrid::from_grid(density_grid);
        let emission = volume.emission().map(BrickGrid::from_grid);
        let emission_norm = emission
            .as_ref()
            .map_or(0.0, |e| 1.0 / e.global_majorant(1.0).max(1e-4));

        let world_to_index = density_grid.transform.inverse();
        let (grid_lo, grid_hi) = density_grid.world_aabb();
        let extent = grid_hi - grid_lo;
        let clip_min = Vec3::from(self.options.vol_clip_min);
        let clip_max = Vec3::from(self.options.vol_clip_max);
        let vol_bb_min = grid_lo + extent * clip_min;
        let vol_bb_max = grid_lo + extent * clip_max;

        let vol_majorant = density.global_majorant(compensated_density_scale);
        log::debug!(
            "commit() done: unit-cube scale {scale}, vol_majorant {vol_majorant}, emission {}",
            emission.is_some()
        );

        self.committed = Some(CommittedFrame {
            density,
            emission,
            emission_norm,
            world_to_index,
            vol_bb_min,
            vol_bb_max,
            vol_majorant,
        });

        self.reset();
        Ok(())
    }

    /// Render exactly one sample per pixel into the accumulator.
    ///
    /// # Errors
    /// Returns [`VolRenError::ProtocolMisuse`] if called before `commit()`,
    /// before a camera is set, or before `init()`.
    pub fn trace(&mut self) -> Result<()> {
        let Some(committed) = &self.committed else {
            return Err(VolRenError::ProtocolMisuse(
                "trace() called before commit()".to_string(),
            ));
        };
        let Some(camera) = &self.camera else {
            return Err(VolRenError::ProtocolMisuse(
                "trace() called with no camera set".to_string(),
            ));
        };
        let Some(driver) = &mut self.driver else {
            return Err(VolRenError::ProtocolMisuse(
                "trace() called before init()".to_string(),
            ));
        };
        log::trace!(
            "trace() sample {}",
            driver.accumulator().sample_count()
        );
        let identity_tf = TransferFunction::identity();
        let tf = self.transfer_function.as_ref().unwrap_or(&identity_tf);
        let phase = if self.options.phase_g.abs() < 1e-4 {
            Phase::Isotropic
        } else {
            Phase::HenyeyGreenstein {
                g: self.options.phase_g,
            }
        };
        let ctx = FrameContext {
            density: &committed.density,
            emission: committed.emission.as_ref(),
            emission_scale: self.options.emission_scale,
            emission_norm: committed.emission_norm,
            tf,
            environment: self.environment.as_ref().unwrap_or_else(|| black_environment()),
            world_to_index: committed.world_to_index,
            vol_bb_min: committed.vol_bb_min,
            vol_bb_max: committed.vol_bb_max,
            density_scale: self.options.density_scale,
            vol_majorant: committed.vol_majorant,
            albedo: Vec3::from(self.options.albedo),
            phase,
            bounces: self.options.bounces,
            show_environment: self.options.show_environment,
            estimator: self.estimator,
            dda_mip: 0,
        };
        driver.render_one_sample(&ctx, camera);
        Ok(())
    }

    /// Render `options().sppx` samples, checking `cancel` between samples
    /// (§5 "Cancellation. Cooperative at sample-index boundaries.").
    ///
    /// # Errors
    /// Same as [`VolRenderer::trace`].
    pub fn render(&mut self, cancel: &AtomicBool) -> Result<()> {
        for _ in 0..self.options.sppx {
            if cancel.load(Ordering::Relaxed) {
                break;
            }
            self.trace()?;
        }
        Ok(())
    }

    /// Read back the accumulated framebuffer as linear-radiance RGBA.
    ///
    /// # Errors
    /// Returns [`VolRenError::ProtocolMisuse`] if called before `init()`.
    pub fn framebuffer(&self) -> Result<Vec<[f32; 4]>> {
        let driver = self.driver.as_ref().ok_or_else(|| {
            VolRenError::ProtocolMisuse("framebuffer() called before init()".to_string())
        })?;
        Ok(driver.accumulator().framebuffer_rgba())
    }

    /// Zero the accumulator without discarding committed resources.
    pub fn reset(&mut self) {
        if let Some(driver) = &mut self.driver {
            driver.reset();
        }
    }

    /// Resize the framebuffer; clears accumulated samples.
    ///
    /// # Errors
    /// Returns [`VolRenError::InvalidInput`] if either dimension is zero.
    pub fn resize(&mut self, width: u32, height: u32) -> Result<()> {
        if width == 0 || height == 0 {
            return Err(VolRenError::InvalidInput(format!(
                "invalid resolution {width}x{height}"
            )));
        }
        self.width = width;
        self.height = height;
        if let Some(driver) = &mut self.driver {
            driver.resize(width, height);
        }
        Ok(())
    }
}

impl Default for VolRenderer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::volume::{FrameChannels, Grid, DENSITY_CHANNEL};

    fn trivial_volume() -> Volume {
        let mut frame = FrameChannels::default();
        frame.insert(
            DENSITY_CHANNEL.to_string(),
            Grid::new(Mat4::IDENTITY, [2, 2, 2], vec![0.0; 8]).unwrap(),
        );
        Volume::new(vec![frame]).unwrap()
    }

    #[test]
    fn trace_before_commit_is_protocol_misuse() {
        let mut r = VolRenderer::new();
        r.init(4, 4).unwrap();
        assert!(r.trace().is_err());
    }

    #[test]
    fn commit_without_volume_is_protocol_misuse() {
        let mut r = VolRenderer::new();
        r.init(4, 4).unwrap();
        assert!(r.commit().is_err());
    }

    #[test]
    fn init_rejects_zero_resolution() {
        let mut r = VolRenderer::new();
        assert!(r.init(0, 4).is_err());
    }

    #[test]
    fn full_happy_path_produces_a_framebuffer() {
        let mut r = VolRenderer::new();
        r.init(4, 4).unwrap();
        r.set_volume(trivial_volume());
        r.set_environment(Environment::white(1.0));
        r.set_camera(Vec3::new(0.0, 0.0, -10.0), Mat3::IDENTITY, 40.0)
            .unwrap();
        r.commit().unwrap();
        r.trace().unwrap();
        let fb = r.framebuffer().unwrap();
        assert_eq!(fb.len(), 16);
    }

    #[test]
    fn same_seed_gives_same_framebuffer() {
        let build = || {
            let mut r = VolRenderer::new();
            r.init(4, 4).unwrap();
            r.set_volume(trivial_volume());
            r.set_environment(Environment::white(1.0));
            r.set_camera(Vec3::new(0.0, 0.0, -10.0), Mat3::IDENTITY, 40.0)
                .unwrap();
            r.set_options(RenderOptions {
                sppx: 4,
                ..RenderOptions::default()
            });
            r.commit().unwrap();
            let cancel = AtomicBool::new(false);
            r.render(&cancel).unwrap();
            r.framebuffer().unwrap()
        };
        assert_eq!(build(), build());
    }

    #[test]
    fn resize_clears_accumulated_samples() {
        let mut r = VolRenderer::new();
        r.init(4, 4).unwrap();
        r.set_volume(trivial_volume());
        r.set_camera(Vec3::new(0.0, 0.0, -10.0), Mat3::IDENTITY, 40.0)
            .unwrap();
        r.commit().unwrap();
        r.trace().unwrap();
        r.resize(8, 8).unwrap();
        assert_eq!(r.framebuffer().unwrap().len(), 64);
    }
}
