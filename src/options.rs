//! Externally exposed render parameters (§6 "Exposed parameters"), as a
//! TOML-(de)serializable preset following the teacher's options module.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Samples per pixel, bounce count, RNG seed, and the other knobs external
/// collaborators are expected to tweak between commits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderOptions {
    /// Samples per pixel to accumulate.
    pub sppx: u32,
    /// Maximum scattering bounces per path.
    pub bounces: u32,
    /// Base RNG seed mixed into the per-pixel, per-sample TEA derivation.
    pub seed: u32,
    /// Whether a primary ray that exits the volume samples the environment.
    pub show_environment: bool,
    /// Unit-cube fractional clip of the volume AABB, minimum corner.
    pub vol_clip_min: [f32; 3],
    /// Unit-cube fractional clip of the volume AABB, maximum corner.
    pub vol_clip_max: [f32; 3],
    /// Extinction multiplier applied to every density lookup.
    pub density_scale: f32,
    /// Scattering albedo tint, RGB in `[0, 1]`.
    pub albedo: [f32; 3],
    /// Henyey–Greenstein asymmetry; `0.0` is isotropic.
    pub phase_g: f32,
    /// Emission radiance multiplier.
    pub emission_scale: f32,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            sppx: 256,
            bounces: 64,
            seed: 0,
            show_environment: true,
            vol_clip_min: [0.0, 0.0, 0.0],
            vol_clip_max: [1.0, 1.0, 1.0],
            density_scale: 1.0,
            albedo: [1.0, 1.0, 1.0],
            phase_g: 0.0,
            emission_scale: 1.0,
        }
    }
}

impl RenderOptions {
    /// Load options from a TOML file, filling any missing fields with
    /// defaults.
    ///
    /// # Errors
    /// Returns [`crate::error::VolRenError::Io`] if the file cannot be read,
    /// or [`crate::error::VolRenError::InvalidInput`] if it does not parse.
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        toml::from_str(&text).map_err(|e| {
            crate::error::VolRenError::InvalidInput(format!("options parse error: {e}"))
        })
    }

    /// Serialize options to a TOML file.
    ///
    /// # Errors
    /// Returns [`crate::error::VolRenError::Io`] if the file cannot be
    /// written.
    pub fn save(&self, path: &Path) -> Result<()> {
        let text = toml::to_string_pretty(self)
            .map_err(|e| crate::error::VolRenError::InvalidInput(format!("options serialize error: {e}")))?;
        fs::write(path, text)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_round_trips_through_toml() {
        let opts = RenderOptions::default();
        let toml_str = toml::to_string_pretty(&opts).unwrap();
        let parsed: RenderOptions = toml::from_str(&toml_str).unwrap();
        assert_eq!(opts, parsed);
    }

    #[test]
    fn partial_toml_fills_defaults() {
        let toml_str = r#"
sppx = 64
"#;
        let opts: RenderOptions = toml::from_str(toml_str).unwrap();
        assert_eq!(opts.sppx, 64);
        assert_eq!(opts.bounces, 64);
        assert_eq!(opts.phase_g, 0.0);
    }

    #[test]
    fn fov_and_albedo_defaults_are_sane() {
        let opts = RenderOptions::default();
        assert_eq!(opts.albedo, [1.0, 1.0, 1.0]);
        assert!(opts.density_scale > 0.0);
    }
}
