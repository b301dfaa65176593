//! Hydrogen stationary-state wavefunctions on the phi = 0 cross-section.
//!
//! [`physics`] holds the radial and angular evaluators (scalar and `ndarray` entry points),
//! [`field`] samples psi = R * Y on a grid and derives the probability density, and
//! [`render`] turns a density into a PNG or a JSON report. Both binaries, the
//! `wavefunction` CLI and the `web` preview server, are thin layers over this crate.

pub mod config;
pub mod error;
pub mod field;
pub mod physics;
pub mod render;

pub use error::{Result, WavefunctionError};
