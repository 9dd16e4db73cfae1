// -- Lint policy ---------------------------------------------------------
// This is the single source of truth for crate-wide lints.

// Broad lint groups
#![deny(clippy::all)]
#![deny(clippy::pedantic)]
#![deny(clippy::nursery)]
// Documentation
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![deny(rustdoc::private_intra_doc_links)]
#![deny(rustdoc::bare_urls)]
// No panicking in library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![deny(clippy::todo)]
#![deny(clippy::unimplemented)]
// No debug/print artifacts
#![deny(clippy::dbg_macro)]
#![deny(clippy::print_stdout)]
#![deny(clippy::print_stderr)]
// Import hygiene
#![deny(clippy::wildcard_imports)]
// Complexity limits (thresholds in clippy.toml)
#![deny(clippy::cognitive_complexity)]
#![deny(clippy::too_many_lines)]
#![deny(clippy::excessive_nesting)]
// Function signature hygiene
#![deny(clippy::too_many_arguments)]
#![deny(clippy::fn_params_excessive_bools)]
// Clone / pass-by-value hygiene
#![deny(clippy::needless_pass_by_value)]
#![deny(clippy::implicit_clone)]
// String hygiene
#![deny(clippy::inefficient_to_string)]
#![deny(clippy::redundant_closure_for_method_calls)]
#![deny(clippy::manual_string_new)]
#![deny(clippy::str_to_string)]
// Cargo lints (warn, not deny since cargo lints can be noisy)
#![warn(clippy::cargo)]
// Unused / redundant code
#![deny(unused_results)]
#![deny(unused_qualifications)]
// Cast hygiene
#![deny(trivial_casts)]
#![deny(trivial_numeric_casts)]

//! Monte Carlo path tracer for heterogeneous participating media.
//!
//! `volren` renders brick-sparse voxel volumes by null-collision delta
//! tracking, with next-event estimation and multiple importance sampling
//! against an importance-sampled environment map.
//!
//! # Key entry points
//!
//! - [`engine::VolRenderer`] — the external interface: `init` → `set_*` →
//!   `commit` → `trace` → `framebuffer`
//! - [`options::RenderOptions`] — externally exposed render parameters
//! - [`volume::Volume`] / [`brick::BrickGrid`] — the volume data model and
//!   its sparse brick-grid storage
//! - [`integrator::trace_sample`] — the per-sample path integrator
//!
//! # Architecture
//!
//! [`driver::Driver`] dispatches one independent `rayon`-parallel task per
//! pixel per sample, folding contributions into a progressive-mean
//! [`accumulator::Accumulator`]. Each task derives its own RNG stream from a
//! TEA hash of the pixel index and sample count, so renders are
//! bit-reproducible given the same seed.

pub mod accumulator;
pub mod brick;
pub mod camera;
pub mod dda;
pub mod driver;
pub mod engine;
pub mod environment;
pub mod error;
pub mod frame;
pub mod freeflight;
pub mod integrator;
pub mod options;
pub mod phase;
pub mod rng;
pub mod transferfunc;
pub mod transmittance;
pub mod volume;
