//! Run configuration.
//!
//! A [`Params`] value is constructed once (usually from a TOML file), validated,
//! and then passed by reference into every component constructor. Nothing in
//! the crate reads configuration from anywhere else.
//!
//! ```toml
//! device = "cpu"
//! precision = "double"
//! g = 0.1
//! scheme = "tssp"
//! imaginary_time = false
//! output = "output/run"
//!
//! [grid]
//! nx = 256
//! ny = 256
//! lx = 22.0
//! ly = 22.0
//!
//! [time]
//! tmax = 8.0
//! dt = 0.001
//!
//! [wavefunction]
//! start = 0
//! interval = 500
//!
//! [rms]
//! interval = 10
//!
//! [energy]
//! interval = 100
//! ```

use std::path::{ Path, PathBuf };
use serde::{ Deserialize, Serialize };
use crate::{
    backend::Device,
    error::ConfigError,
    grid::Dimension,
    persist::Cadence,
    timedep::Scheme,
};

/// Working floating-point precision of a run.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Precision {
    /// `f32` reals, `Complex<f32>` fields.
    #[serde(alias = "float32")]
    Single,
    /// `f64` reals, `Complex<f64>` fields.
    #[default]
    #[serde(alias = "float64")]
    Double,
}

/// Grid point counts and box lengths.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GridParams {
    pub nx: usize,
    #[serde(default = "one")]
    pub ny: usize,
    #[serde(default = "one")]
    pub nz: usize,
    pub lx: f64,
    #[serde(default = "unit_length")]
    pub ly: f64,
    #[serde(default = "unit_length")]
    pub lz: f64,
}

impl GridParams {
    /// Get the point counts as an array.
    pub fn counts(&self) -> [usize; 3] { [self.nx, self.ny, self.nz] }

    /// Get the box lengths as an array.
    pub fn lengths(&self) -> [f64; 3] { [self.lx, self.ly, self.lz] }
}

/// Time step and stopping time.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TimeParams {
    pub tmax: f64,
    pub dt: f64,
}

fn one() -> usize { 1 }

fn unit_length() -> f64 { 1.0 }

fn default_delta() -> f64 { 1e-12 }

fn default_print_step() -> usize { 1000 }

fn default_wavefunction() -> Cadence { Cadence::new(true, 0, 500) }

fn default_rms() -> Cadence { Cadence::new(true, 0, 10) }

fn default_energy() -> Cadence { Cadence::new(true, 0, 100) }

/// Immutable configuration for a single run.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Params {
    /// Where array operations execute.
    #[serde(default)]
    pub device: Device,
    /// Working precision.
    #[serde(default)]
    pub precision: Precision,
    /// Nonlinearity coefficient.
    #[serde(default)]
    pub g: f64,
    /// Density threshold below which the flow velocity is taken to vanish in
    /// diagnostics.
    #[serde(default = "default_delta")]
    pub delta: f64,
    /// Stepping scheme.
    #[serde(default)]
    pub scheme: Scheme,
    /// Evolve in imaginary time.
    #[serde(default)]
    pub imaginary_time: bool,
    /// Continue from the latest checkpoint under `output`.
    #[serde(default)]
    pub resume: bool,
    /// Allow previous results under `output` to be discarded.
    #[serde(default)]
    pub overwrite: bool,
    /// Output directory.
    pub output: PathBuf,
    /// Log progress every this many steps.
    #[serde(default = "default_print_step")]
    pub print_step: usize,
    /// Directory holding `re.npy`/`im.npy` for the initial field, used when no
    /// initializer is supplied programmatically.
    #[serde(default)]
    pub initial: Option<PathBuf>,
    /// Grid geometry.
    pub grid: GridParams,
    /// Time stepping.
    pub time: TimeParams,
    /// Wavefunction snapshot (and checkpoint) cadence.
    #[serde(default = "default_wavefunction")]
    pub wavefunction: Cadence,
    /// RMS record cadence.
    #[serde(default = "default_rms")]
    pub rms: Cadence,
    /// Energy record cadence.
    #[serde(default = "default_energy")]
    pub energy: Cadence,
}

impl Params {
    /// Construct with default settings for everything except the grid, the
    /// time stepping, and the output location.
    pub fn new(grid: GridParams, time: TimeParams, output: PathBuf) -> Self {
        Self {
            device: Device::default(),
            precision: Precision::default(),
            grid,
            time,
            g: 0.0,
            delta: default_delta(),
            scheme: Scheme::default(),
            imaginary_time: false,
            resume: false,
            overwrite: false,
            output,
            print_step: default_print_step(),
            initial: None,
            wavefunction: default_wavefunction(),
            rms: default_rms(),
            energy: default_energy(),
        }
    }

    /// Parse from a TOML string. The result is not validated.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(s)?)
    }

    /// Read and parse a TOML file. The result is not validated.
    pub fn from_file<P>(path: P) -> Result<Self, ConfigError>
    where P: AsRef<Path>
    {
        let path = path.as_ref();
        let contents
            = std::fs::read_to_string(path)
            .map_err(|source| {
                ConfigError::Read { path: path.to_path_buf(), source }
            })?;
        Self::from_toml_str(&contents)
    }

    /// Serialize to a TOML string.
    pub fn to_toml_string(&self) -> Result<String, toml::ser::Error> {
        toml::to_string(self)
    }

    /// Check every constraint that can be checked without touching the output
    /// location.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let dim = self.dimension()?;
        for axis in dim.axes() {
            let length = self.grid.lengths()[axis];
            if !(length > 0.0 && length.is_finite()) {
                return Err(ConfigError::BadLength { axis, length });
            }
        }
        ConfigError::check_timestep(self.time.dt)?;
        ConfigError::check_tmax(self.time.tmax)?;
        ConfigError::check_delta(self.delta)?;
        ConfigError::check_interval("wavefunction", self.wavefunction.interval)?;
        ConfigError::check_interval("rms", self.rms.interval)?;
        ConfigError::check_interval("energy", self.energy.interval)?;
        (self.print_step != 0).then_some(()).ok_or(ConfigError::BadPrintStep)?;
        Ok(())
    }

    /// Infer the grid dimension.
    pub fn dimension(&self) -> Result<Dimension, ConfigError> {
        Dimension::from_counts(self.grid.counts())
    }

    /// Number of steps needed to reach `tmax`, rounded to the nearest integer.
    pub fn total_steps(&self) -> usize {
        (self.time.tmax / self.time.dt).round() as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONFIG: &str = r#"
        device = "gpu"
        g = 0.1
        scheme = "TSSP"
        output = "out"

        [grid]
        nx = 64
        ny = 32
        lx = 22.0
        ly = 11.0

        [time]
        tmax = 8.0
        dt = 0.001

        [rms]
        enabled = false
        start = 0
        interval = 10
    "#;

    #[test]
    fn parse_with_defaults() {
        let params = Params::from_toml_str(CONFIG).unwrap();
        assert_eq!(params.device, Device::Parallel);
        assert_eq!(params.precision, Precision::Double);
        assert_eq!(params.scheme, Scheme::Tssp);
        assert_eq!(params.grid.counts(), [64, 32, 1]);
        assert_eq!(params.grid.lz, 1.0);
        assert_eq!(params.delta, 1e-12);
        assert_eq!(params.print_step, 1000);
        assert!(!params.imaginary_time && !params.resume && !params.overwrite);
        assert_eq!(params.wavefunction, Cadence::new(true, 0, 500));
        assert!(!params.rms.enabled);
        assert_eq!(params.total_steps(), 8000);
        assert_eq!(params.dimension().unwrap(), Dimension::Two);
        params.validate().unwrap();
    }

    #[test]
    fn round_trip_through_toml() {
        let params = Params::from_toml_str(CONFIG).unwrap();
        let s = params.to_toml_string().unwrap();
        assert_eq!(Params::from_toml_str(&s).unwrap(), params);
    }

    #[test]
    fn validation_failures() {
        let base = Params::from_toml_str(CONFIG).unwrap();

        let mut p = base.clone();
        p.grid.nx = 1;
        assert!(matches!(p.validate(), Err(ConfigError::BadDimension(1, 32, 1))));

        let mut p = base.clone();
        p.time.dt = 0.0;
        assert!(matches!(p.validate(), Err(ConfigError::BadTimestep(_))));

        let mut p = base.clone();
        p.time.tmax = -1.0;
        assert!(matches!(p.validate(), Err(ConfigError::BadTmax(_))));

        let mut p = base.clone();
        p.energy.interval = 0;
        assert!(matches!(p.validate(), Err(ConfigError::BadInterval("energy"))));

        let mut p = base.clone();
        p.grid.ly = f64::NAN;
        assert!(matches!(p.validate(), Err(ConfigError::BadLength { axis: 1, .. })));

        let mut p = base;
        p.print_step = 0;
        assert!(matches!(p.validate(), Err(ConfigError::BadPrintStep)));
    }

    #[test]
    fn unparsable() {
        assert!(matches!(
            Params::from_toml_str("grid = 5"),
            Err(ConfigError::Parse(_)),
        ));
    }
}
