//! Periodic output, checkpointing, and resumption.
//!
//! Everything a run writes lives under its output directory:
//! ```text
//! <output>/
//!     params.toml
//!     wfc/
//!         step_00000000/
//!             re.npy
//!             im.npy
//!             meta.toml
//!         step_00000500/
//!         ...
//!     rms/
//!         t.npy  xrms.npy  [yrms.npy]  [zrms.npy]  [rrms.npy]
//!     energies/
//!         t.npy  tenergy.npy  ke.npy  kec.npy  kei.npy  qe.npy  pe.npy  ie.npy
//! ```
//! Every wavefunction snapshot is also a checkpoint. Snapshots are written
//! into a `.tmp` sibling directory and renamed once all of their files are
//! synced, so any `step_*` directory without the suffix is complete. A
//! snapshot that already exists is moved aside before its replacement is
//! renamed in, and only removed afterwards. Time series are kept in memory and
//! each column is rewritten (again through a temporary file and a rename) on
//! every append, so the I/O for a series of `n` records grows as `n²`; choose
//! cadences accordingly for long runs. Series values are always stored in
//! double precision.

use std::{
    fs,
    io::{ BufWriter, Write },
    path::{ Path, PathBuf },
};
use log::{ debug, info, warn };
use ndarray as nd;
use ndarray_npy::{ read_npy, WriteNpyExt };
use serde::{ Deserialize, Serialize };
use crate::{
    C,
    Field,
    Real,
    RField,
    config::Params,
    diagnostics::{ Energy, Rms },
    error::{ ConfigError, GpeResult, PersistError, ShapeError },
    grid::Dimension,
};

const WFC_DIR: &str = "wfc";
const RMS_DIR: &str = "rms";
const ENERGY_DIR: &str = "energies";
const PARAMS_FILE: &str = "params.toml";
const META_FILE: &str = "meta.toml";
const STEP_PREFIX: &str = "step_";
const TMP_SUFFIX: &str = ".tmp";
const OLD_SUFFIX: &str = ".old";

const ENERGY_COLUMNS: [&str; 8]
    = ["t", "tenergy", "ke", "kec", "kei", "qe", "pe", "ie"];

fn enabled() -> bool { true }

/// When to record a particular kind of output.
///
/// An enabled cadence triggers at steps `start + k * interval` (`k ≥ 0`) that
/// fall within `[0, total)`, and never if `interval > total`.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cadence {
    #[serde(default = "enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub start: usize,
    pub interval: usize,
}

impl Cadence {
    pub fn new(enabled: bool, start: usize, interval: usize) -> Self {
        Self { enabled, start, interval }
    }

    /// A cadence that never triggers.
    pub fn disabled() -> Self { Self::new(false, 0, 1) }

    /// Return `true` if output is due at `step` for a run of `total` steps.
    pub fn triggers(&self, step: usize, total: usize) -> bool {
        self.enabled
            && self.interval != 0
            && self.interval <= total
            && step < total
            && step >= self.start
            && (step - self.start) % self.interval == 0
    }

    /// List every step at which output is due for a run of `total` steps.
    pub fn steps(&self, total: usize) -> Vec<usize> {
        if !self.enabled || self.interval == 0 || self.interval > total {
            return Vec::new();
        }
        (self.start..total).step_by(self.interval).collect()
    }
}

/// Which outputs are due at a given step.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct Due {
    pub wavefunction: bool,
    pub rms: bool,
    pub energy: bool,
}

impl Due {
    /// Return `true` if anything is due.
    pub fn any(&self) -> bool { self.wavefunction || self.rms || self.energy }
}

/// A persisted wavefunction together with the step it was taken at.
#[derive(Clone, Debug)]
pub struct Checkpoint<T> {
    pub step: usize,
    pub t: f64,
    pub dt: f64,
    pub psi: Field<T>,
}

#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
struct Meta {
    step: usize,
    t: f64,
    dt: f64,
}

// sync a directory so that renames into it are durable
fn sync_dir(dir: &Path) -> Result<(), PersistError> {
    fs::File::open(dir)?.sync_all()?;
    Ok(())
}

// rename `from` to `to` and sync their common parent
fn rename_synced(from: &Path, to: &Path) -> Result<(), PersistError> {
    fs::rename(from, to)?;
    if let Some(parent) = to.parent() { sync_dir(parent)?; }
    Ok(())
}

// write `contents` to `path` through a temporary sibling, syncing before the
// rename
fn write_atomic<F>(path: &Path, contents: F) -> Result<(), PersistError>
where F: FnOnce(&mut BufWriter<fs::File>) -> Result<(), PersistError>
{
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(TMP_SUFFIX);
    let tmp = PathBuf::from(tmp);
    let mut writer = BufWriter::new(fs::File::create(&tmp)?);
    contents(&mut writer)?;
    let file = writer.into_inner().map_err(|e| e.into_error())?;
    file.sync_all()?;
    rename_synced(&tmp, path)
}

fn write_npy_atomic<A>(path: &Path, arr: &A) -> Result<(), PersistError>
where A: WriteNpyExt
{
    write_atomic(path, |w| Ok(arr.write_npy(w)?))
}

fn step_dir_name(step: usize) -> String { format!("{STEP_PREFIX}{step:08}") }

// parse a completed snapshot directory name
fn parse_step_dir(name: &str) -> Option<usize> {
    name.strip_prefix(STEP_PREFIX)
        .filter(|digits| digits.bytes().all(|b| b.is_ascii_digit()))
        .and_then(|digits| digits.parse().ok())
}

/// Find the completed wavefunction snapshot with the highest step under
/// `output`, if any.
pub fn latest_checkpoint(output: &Path)
    -> Result<Option<(usize, PathBuf)>, PersistError>
{
    let wfc = output.join(WFC_DIR);
    if !wfc.is_dir() { return Ok(None); }
    let mut latest: Option<(usize, PathBuf)> = None;
    for entry in fs::read_dir(&wfc)? {
        let entry = entry?;
        if !entry.file_type()?.is_dir() { continue; }
        let name = entry.file_name();
        let Some(step) = name.to_str().and_then(parse_step_dir) else {
            continue;
        };
        if latest.as_ref().map_or(true, |(s, _)| step > *s) {
            latest = Some((step, entry.path()));
        }
    }
    Ok(latest)
}

/// Read a complex field from a directory holding `re.npy` and `im.npy`.
pub fn read_field<T: Real>(dir: &Path) -> GpeResult<Field<T>> {
    let re: RField<T> = read_npy(dir.join("re.npy")).map_err(PersistError::from)?;
    let im: RField<T> = read_npy(dir.join("im.npy")).map_err(PersistError::from)?;
    let (nx, ny, nz) = re.dim();
    ShapeError::check("imaginary part", [nx, ny, nz], im.shape())?;
    Ok(nd::Zip::from(&re).and(&im).map_collect(|&r, &i| C::new(r, i)))
}

/// Read a complete wavefunction snapshot.
pub fn load_checkpoint<T: Real>(dir: &Path) -> GpeResult<Checkpoint<T>> {
    let meta_str
        = fs::read_to_string(dir.join(META_FILE)).map_err(PersistError::from)?;
    let meta: Meta = toml::from_str(&meta_str).map_err(PersistError::from)?;
    let psi = read_field(dir)?;
    Ok(Checkpoint { step: meta.step, t: meta.t, dt: meta.dt, psi })
}

// a table of named, equal-length columns backed by one .npy file per column
#[derive(Clone, Debug)]
struct Series {
    dir: PathBuf,
    names: Vec<&'static str>,
    columns: Vec<Vec<f64>>,
}

impl Series {
    fn create(dir: PathBuf, names: Vec<&'static str>) -> Result<Self, PersistError> {
        fs::create_dir_all(&dir)?;
        let columns = vec![Vec::new(); names.len()];
        Ok(Self { dir, names, columns })
    }

    // load existing columns, keeping only the leading records with time below
    // `cutoff`; the first column must be time
    fn load(dir: PathBuf, names: Vec<&'static str>, cutoff: f64)
        -> Result<Self, PersistError>
    {
        fs::create_dir_all(&dir)?;
        let mut columns: Vec<Vec<f64>> = Vec::with_capacity(names.len());
        for name in names.iter() {
            let path = dir.join(format!("{name}.npy"));
            let col: Vec<f64>
                = if path.is_file() {
                    read_npy::<_, nd::Array1<f64>>(&path)?.to_vec()
                } else {
                    Vec::new()
                };
            columns.push(col);
        }
        // a crash in the middle of an append can leave columns of unequal
        // length
        let complete = columns.iter().map(|c| c.len()).min().unwrap_or(0);
        let keep
            = columns.first()
            .map(|t| t.iter().take(complete).take_while(|&&tk| tk < cutoff).count())
            .unwrap_or(0);
        columns.iter_mut().for_each(|c| c.truncate(keep));
        let series = Self { dir, names, columns };
        series.flush()?;
        Ok(series)
    }

    fn len(&self) -> usize { self.columns.first().map_or(0, |c| c.len()) }

    fn flush(&self) -> Result<(), PersistError> {
        for (name, col) in self.names.iter().zip(self.columns.iter()) {
            let path = self.dir.join(format!("{name}.npy"));
            write_npy_atomic(&path, &nd::Array1::from_vec(col.clone()))?;
        }
        Ok(())
    }

    // *panics if `row` doesn't have one entry per column*
    fn push(&mut self, row: &[f64]) -> Result<(), PersistError> {
        assert_eq!(row.len(), self.columns.len());
        self.columns.iter_mut().zip(row)
            .for_each(|(c, &x)| { c.push(x); });
        self.flush()
    }
}

fn rms_columns(dim: Dimension) -> Vec<&'static str> {
    match dim {
        Dimension::One => vec!["t", "xrms"],
        Dimension::Two => vec!["t", "xrms", "yrms", "rrms"],
        Dimension::Three => vec!["t", "xrms", "yrms", "zrms"],
    }
}

/// Decides when outputs are due and writes them.
#[derive(Debug)]
pub struct PersistenceManager {
    root: PathBuf,
    total_steps: usize,
    dt: f64,
    wavefunction: Cadence,
    rms_cadence: Cadence,
    energy_cadence: Cadence,
    rms: Option<Series>,
    energy: Option<Series>,
}

impl PersistenceManager {
    // return `true` if the output location exists and is non-empty
    fn holds_data(root: &Path) -> Result<bool, PersistError> {
        if !root.exists() { return Ok(false); }
        Ok(fs::read_dir(root)?.next().is_some())
    }

    fn remove_previous(root: &Path) -> Result<(), PersistError> {
        for dir in [WFC_DIR, RMS_DIR, ENERGY_DIR] {
            let path = root.join(dir);
            if path.exists() { fs::remove_dir_all(&path)?; }
        }
        let params = root.join(PARAMS_FILE);
        if params.exists() { fs::remove_file(&params)?; }
        Ok(())
    }

    fn write_params(root: &Path, params: &Params) -> Result<(), PersistError> {
        let s = params.to_toml_string()?;
        write_atomic(&root.join(PARAMS_FILE), |w| Ok(w.write_all(s.as_bytes())?))
    }

    /// Prepare a fresh output location for a run.
    ///
    /// Fails with [`ConfigError::OutputExists`] if the location already holds
    /// data and `params.overwrite` is not set; otherwise previous outputs are
    /// removed.
    pub fn create(params: &Params, dim: Dimension) -> GpeResult<Self> {
        let root = params.output.clone();
        if Self::holds_data(&root)? {
            if !params.overwrite {
                return Err(ConfigError::OutputExists(root).into());
            }
            warn!("removing previous outputs under {}", root.display());
            Self::remove_previous(&root)?;
        }
        fs::create_dir_all(root.join(WFC_DIR)).map_err(PersistError::from)?;
        Self::write_params(&root, params)?;
        let rms
            = params.rms.enabled
            .then(|| Series::create(root.join(RMS_DIR), rms_columns(dim)))
            .transpose()?;
        let energy
            = params.energy.enabled
            .then(|| Series::create(root.join(ENERGY_DIR), ENERGY_COLUMNS.to_vec()))
            .transpose()?;
        Ok(Self {
            root,
            total_steps: params.total_steps(),
            dt: params.time.dt,
            wavefunction: params.wavefunction,
            rms_cadence: params.rms,
            energy_cadence: params.energy,
            rms,
            energy,
        })
    }

    /// Reopen an output location and load its latest checkpoint.
    ///
    /// Time-series records at or after the checkpoint's time are discarded, so
    /// that continuing the run reproduces them exactly once.
    ///
    /// Fails with [`ConfigError::NoCheckpoint`] if there is nothing to resume
    /// from, with [`ConfigError::ResumeTimestep`] if the checkpoint was written
    /// with a different time step, or with a shape error if the checkpoint
    /// doesn't match `shape`.
    pub fn resume<T: Real>(params: &Params, dim: Dimension, shape: [usize; 3])
        -> GpeResult<(Self, Checkpoint<T>)>
    {
        let root = params.output.clone();
        let (_, dir)
            = latest_checkpoint(&root)?
            .ok_or_else(|| ConfigError::NoCheckpoint(root.clone()))?;
        let ckpt: Checkpoint<T> = load_checkpoint(&dir)?;
        ShapeError::check("checkpoint", shape, ckpt.psi.shape())?;
        let dt = params.time.dt;
        ConfigError::check_resume_timestep(ckpt.dt, dt)?;
        info!(
            "resuming from {} (step {}, t = {:.6})",
            dir.display(), ckpt.step, ckpt.t,
        );
        Self::write_params(&root, params)?;
        let cutoff = ckpt.t - 0.5 * dt;
        let rms
            = params.rms.enabled
            .then(|| Series::load(root.join(RMS_DIR), rms_columns(dim), cutoff))
            .transpose()?;
        let energy
            = params.energy.enabled
            .then(|| {
                Series::load(root.join(ENERGY_DIR), ENERGY_COLUMNS.to_vec(), cutoff)
            })
            .transpose()?;
        let manager = Self {
            root,
            total_steps: params.total_steps(),
            dt,
            wavefunction: params.wavefunction,
            rms_cadence: params.rms,
            energy_cadence: params.energy,
            rms,
            energy,
        };
        Ok((manager, ckpt))
    }

    /// Get the total number of steps in the run.
    pub fn total_steps(&self) -> usize { self.total_steps }

    /// Decide which outputs are due at `step`.
    pub fn due(&self, step: usize) -> Due {
        Due {
            wavefunction: self.wavefunction.triggers(step, self.total_steps),
            rms: self.rms_cadence.triggers(step, self.total_steps),
            energy: self.energy_cadence.triggers(step, self.total_steps),
        }
    }

    /// Write a wavefunction snapshot (checkpoint) for `step`.
    ///
    /// An existing snapshot for the same step stays in place until its
    /// replacement is complete.
    pub fn save_wavefunction<T: Real>(&self, step: usize, t: f64, psi: &Field<T>)
        -> Result<(), PersistError>
    {
        let wfc = self.root.join(WFC_DIR);
        let name = step_dir_name(step);
        let dir = wfc.join(&name);
        let tmp = wfc.join(format!("{name}{TMP_SUFFIX}"));
        let old = wfc.join(format!("{name}{OLD_SUFFIX}"));
        if tmp.exists() { fs::remove_dir_all(&tmp)?; }
        fs::create_dir_all(&tmp)?;
        write_npy_atomic(&tmp.join("re.npy"), &psi.mapv(|q| q.re))?;
        write_npy_atomic(&tmp.join("im.npy"), &psi.mapv(|q| q.im))?;
        let meta = toml::to_string(&Meta { step, t, dt: self.dt })?;
        write_atomic(&tmp.join(META_FILE), |w| Ok(w.write_all(meta.as_bytes())?))?;
        if old.exists() { fs::remove_dir_all(&old)?; }
        if dir.exists() {
            rename_synced(&dir, &old)?;
            rename_synced(&tmp, &dir)?;
            fs::remove_dir_all(&old)?;
        } else {
            rename_synced(&tmp, &dir)?;
        }
        debug!("saved wavefunction at step {step} (t = {t:.6}) to {}", dir.display());
        Ok(())
    }

    /// Append an RMS record. Does nothing if RMS output is disabled.
    pub fn append_rms<T: Real>(&mut self, t: f64, rms: &Rms<T>)
        -> Result<(), PersistError>
    {
        let Some(series) = self.rms.as_mut() else { return Ok(()); };
        let row: Vec<f64>
            = std::iter::once(t)
            .chain(
                [Some(rms.x), rms.y, rms.z, rms.r].into_iter()
                    .flatten()
                    .map(|x| x.as_f64())
            )
            .collect();
        series.push(&row)?;
        debug!("recorded rms at t = {t:.6} ({} records)", series.len());
        Ok(())
    }

    /// Append an energy record. Does nothing if energy output is disabled.
    pub fn append_energy<T: Real>(&mut self, t: f64, energy: &Energy<T>)
        -> Result<(), PersistError>
    {
        let Some(series) = self.energy.as_mut() else { return Ok(()); };
        let row: [f64; 8] = [
            t,
            energy.total.as_f64(),
            energy.kinetic.as_f64(),
            energy.kinetic_compressible.as_f64(),
            energy.kinetic_incompressible.as_f64(),
            energy.quantum.as_f64(),
            energy.potential.as_f64(),
            energy.interaction.as_f64(),
        ];
        series.push(&row)?;
        debug!("recorded energy at t = {t:.6} ({} records)", series.len());
        Ok(())
    }
}

/// Read a persisted time-series column, e.g. `read_series(out, "rms", "xrms")`.
pub fn read_series(output: &Path, kind: &str, column: &str)
    -> Result<nd::Array1<f64>, PersistError>
{
    Ok(read_npy(output.join(kind).join(format!("{column}.npy")))?)
}
