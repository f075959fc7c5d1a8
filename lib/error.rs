//! Collection of all error types.
//!
//! All errors derive [`thiserror::Error`], making them composable when allowed
//! and compatible with application code using [`anyhow`][anyhow]. Every error
//! here is fatal to a run: nothing is retried.
//!
//! [anyhow]: https://crates.io/crates/anyhow

use std::path::PathBuf;
use ndarray_npy::{ ReadNpyError, WriteNpyError };
use thiserror::Error;

/// Returned when a run configuration is invalid or inconsistent with the state
/// of the output location. Always raised before any stepping occurs.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Returned when grid point counts don't activate exactly the leading axes.
    #[error("grid point counts must activate the leading 1, 2, or 3 axes with no gaps; got ({0}, {1}, {2})")]
    BadDimension(usize, usize, usize),

    /// Returned when a box length along an active axis is non-positive or
    /// non-finite.
    #[error("box length along axis {axis} must be positive and finite; got {length}")]
    BadLength { axis: usize, length: f64 },

    /// Returned when a non-positive time step is encountered.
    #[error("time step must be positive and finite; got {0}")]
    BadTimestep(f64),

    /// Returned when the maximum time is non-positive.
    #[error("maximum time must be positive and finite; got {0}")]
    BadTmax(f64),

    /// Returned when an output interval is zero.
    #[error("{0} output interval must be greater than 0")]
    BadInterval(&'static str),

    /// Returned when a negative small-number threshold is encountered.
    #[error("small-number threshold must be non-negative; got {0}")]
    BadDelta(f64),

    /// Returned when the console print cadence is zero.
    #[error("print cadence must be greater than 0")]
    BadPrintStep,

    /// Returned when resuming with no checkpoint to resume from.
    #[error("resume requested but no checkpoint exists under {0}")]
    NoCheckpoint(PathBuf),

    /// Returned when resuming with a time step other than the one the
    /// checkpoint was written with.
    #[error("checkpoint was written with dt = {checkpoint:e}, but the configuration has dt = {config:e}")]
    ResumeTimestep { checkpoint: f64, config: f64 },

    /// Returned when a fresh run would clobber previous results.
    #[error("output location {0} already holds data; set `overwrite = true` or `resume = true`")]
    OutputExists(PathBuf),

    /// Returned when the configuration file can't be read.
    #[error("couldn't read config file {path}: {source}")]
    Read { path: PathBuf, source: std::io::Error },

    /// Returned when the configuration can't be parsed.
    #[error("couldn't parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

impl ConfigError {
    pub(crate) fn check_timestep(dt: f64) -> Result<(), Self> {
        (dt > 0.0 && dt.is_finite()).then_some(()).ok_or(Self::BadTimestep(dt))
    }

    pub(crate) fn check_tmax(tmax: f64) -> Result<(), Self> {
        (tmax > 0.0 && tmax.is_finite()).then_some(()).ok_or(Self::BadTmax(tmax))
    }

    pub(crate) fn check_interval(kind: &'static str, interval: usize)
        -> Result<(), Self>
    {
        (interval != 0).then_some(()).ok_or(Self::BadInterval(kind))
    }

    pub(crate) fn check_resume_timestep(checkpoint: f64, config: f64)
        -> Result<(), Self>
    {
        ((checkpoint - config).abs() <= 1e-12 * config)
            .then_some(())
            .ok_or(Self::ResumeTimestep { checkpoint, config })
    }

    pub(crate) fn check_delta(delta: f64) -> Result<(), Self> {
        (delta >= 0.0).then_some(()).ok_or(Self::BadDelta(delta))
    }
}

/// Returned when a user-supplied or persisted array doesn't match the shape of
/// the grid.
#[derive(Debug, Error)]
#[error("{what} has shape {got:?}, but the grid has shape {expected:?}")]
pub struct ShapeError {
    /// What produced the array.
    pub what: &'static str,
    /// Grid shape.
    pub expected: [usize; 3],
    /// Offending shape.
    pub got: Vec<usize>,
}

impl ShapeError {
    pub(crate) fn check(what: &'static str, expected: [usize; 3], got: &[usize])
        -> Result<(), Self>
    {
        (got == expected.as_slice()).then_some(())
            .ok_or_else(|| Self { what, expected, got: got.to_vec() })
    }
}

/// Returned when reading or writing persisted outputs fails.
#[derive(Debug, Error)]
pub enum PersistError {
    /// [`std::io::Error`]
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// [`WriteNpyError`]
    #[error("npy write error: {0}")]
    WriteNpy(#[from] WriteNpyError),

    /// [`ReadNpyError`]
    #[error("npy read error: {0}")]
    ReadNpy(#[from] ReadNpyError),

    /// Returned when snapshot metadata can't be encoded.
    #[error("metadata encode error: {0}")]
    MetaEncode(#[from] toml::ser::Error),

    /// Returned when snapshot metadata can't be decoded.
    #[error("metadata decode error: {0}")]
    MetaDecode(#[from] toml::de::Error),
}

/// Top-level error type for a run.
#[derive(Debug, Error)]
pub enum GpeError {
    /// [`ConfigError`]
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// [`ShapeError`]
    #[error("shape mismatch: {0}")]
    Shape(#[from] ShapeError),

    /// Returned when the wavefunction acquires a non-finite value. The
    /// offending state is never persisted.
    #[error("wavefunction diverged at t = {time}: encountered a non-finite value")]
    Divergence { time: f64 },

    /// [`PersistError`]
    #[error("persistence error: {0}")]
    Persist(#[from] PersistError),
}

impl GpeError {
    /// Return `true` if `self` is `Divergence`.
    pub fn is_divergence(&self) -> bool {
        matches!(self, Self::Divergence { .. })
    }
}

pub type GpeResult<T> = Result<T, GpeError>;
