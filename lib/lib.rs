#![allow(dead_code, non_snake_case)]

//! Provides an engine for time evolution of a condensate wavefunction under the
//! Gross-Pitaevskii equation (GPE) on uniform, periodic 1D, 2D, and 3D grids
//! via pseudo-spectral methods, in either real or imaginary time.
//!
//! Provides implementations for the following:
//! - Time stepping:
//!     - Time-splitting spectral (TSSP, Strang splitting) with optional
//!       imaginary-time renormalization
//!     - Pseudo-spectral fourth-order Runge-Kutta (method of lines)
//! - Diagnostics:
//!     - Energy decomposition into kinetic (compressible and incompressible),
//!       quantum, potential, and interaction parts
//!     - RMS widths along each active axis
//! - Persistence:
//!     - Periodic wavefunction snapshots that double as checkpoints
//!     - Growing RMS and energy time series
//!     - Crash-safe resume from the latest checkpoint
//!
//! The top-level entry point is [`evolve::time_advance`]. See [`docs`] for
//! theoretical background.

pub mod backend;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod evolve;
pub mod grid;
pub mod persist;
pub mod problems;
pub mod state;
pub mod timedep;
pub mod utils;

pub mod docs;

use ndarray as nd;

/// Complex scalar over a [`Real`] type.
pub type C<T> = num_complex::Complex<T>;

/// Complex field sampled over a (possibly degenerate) three-axis grid.
pub type Field<T> = nd::Array3<C<T>>;

/// Real field sampled over a (possibly degenerate) three-axis grid.
pub type RField<T> = nd::Array3<T>;

/// Floating-point types usable as the working precision of a run.
///
/// Implemented for `f32` (single precision) and `f64` (double precision).
pub trait Real:
    rustfft::FftNum
    + num_traits::Float
    + num_traits::FloatConst
    + num_traits::NumAssign
    + ndarray_npy::WritableElement
    + ndarray_npy::ReadableElement
    + std::fmt::Display
    + std::fmt::LowerExp
{
    /// Convert from a double-precision value, rounding if necessary.
    fn of(x: f64) -> Self;

    /// Widen to a double-precision value.
    fn as_f64(self) -> f64;
}

impl Real for f32 {
    fn of(x: f64) -> Self { x as f32 }

    fn as_f64(self) -> f64 { self as f64 }
}

impl Real for f64 {
    fn of(x: f64) -> Self { x }

    fn as_f64(self) -> f64 { self }
}
