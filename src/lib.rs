//! Gas optics for radiative transfer
//!
//! Computes the optical depths of the gases in an atmosphere, and their
//! source functions, for each g-point of a correlated-k spectral
//! discretization. The results are laid out for a one-scalar (longwave) or
//! two-stream (shortwave) solver.
//!
//! The real work happens in [`gas_optics`]. With the `python` feature, the
//! `python` module wraps it for use with numpy; that's the only place `pyo3` is
//! used.

pub mod error;
pub mod gas_optics;

#[cfg(feature = "python")]
mod python;

pub use error::GasOpticsError;
pub use gas_optics::{
    Atmosphere, ComputeOptions, GasOptics, LongwaveOutputs, ShortwaveOutputs, SourceTemperatures,
};
