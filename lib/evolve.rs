//! Top-level driver for a run.
//!
//! [`time_advance`] wires a validated [`Params`] together with the problem
//! capabilities and runs the step loop:
//! ```text
//! INIT ─> STEPPING ─┬─> DONE
//!          ^   │    └─> ABORTED (any error)
//!          │   v
//!          SAVING
//! ```
//! At each step index `i` the output cadences are consulted first, so records
//! describe the state at time `i * dt`; only then is the state advanced to
//! `(i + 1) * dt`. Simulation time is always recomputed from the step index,
//! never accumulated.

use log::{ debug, info };
use crate::{
    Real,
    config::Params,
    diagnostics::DiagnosticsEngine,
    error::{ GpeError, GpeResult },
    grid::SpectralGrid,
    persist::{ PersistenceManager, Due },
    state::{ FromFile, GPEState, Initializer, Potential },
    timedep::StepEngine,
};

/// The result of a completed run.
pub struct Simulation<T: Real> {
    state: GPEState<T>,
    step: usize,
    dt: f64,
}

impl<T: Real> Simulation<T> {
    /// Get the index of the last completed step.
    pub fn step(&self) -> usize { self.step }

    /// Get the simulation time of the final state.
    pub fn time(&self) -> f64 { self.step as f64 * self.dt }

    /// Get a reference to the final state.
    pub fn state(&self) -> &GPEState<T> { &self.state }

    /// Take ownership of the final state.
    pub fn into_state(self) -> GPEState<T> { self.state }
}

// write everything due at `step`
fn record<T: Real>(
    persist: &mut PersistenceManager,
    diag: &DiagnosticsEngine<T>,
    state: &GPEState<T>,
    due: Due,
    step: usize,
    t: f64,
) -> GpeResult<()>
{
    if due.wavefunction {
        persist.save_wavefunction(step, t, state.psi())?;
    }
    if due.rms {
        let rms = diag.rms(state);
        persist.append_rms(t, &rms)?;
    }
    if due.energy {
        let energy = diag.energy(state, T::of(t))?;
        persist.append_energy(t, &energy)?;
    }
    Ok(())
}

/// Run a simulation to completion according to `params`.
///
/// The initial field comes from `initializer` if given, else from the file
/// named by `params.initial` if set, else from the harmonic-oscillator ground
/// state; the potential comes from `potential` if given, else the isotropic
/// harmonic trap. When `params.resume` is set, the latest checkpoint under
/// `params.output` replaces the initial field and stepping continues from its
/// step; that checkpoint itself is left untouched.
///
/// Errors are returned immediately: configuration problems before anything is
/// written, [`GpeError::Divergence`] as soon as the field becomes non-finite
/// (without persisting the offending step), and I/O failures as they occur.
pub fn time_advance<T: Real>(
    params: &Params,
    initializer: Option<&dyn Initializer<T>>,
    potential: Option<Box<dyn Potential<T>>>,
) -> GpeResult<Simulation<T>>
{
    params.validate()?;
    let dim = params.dimension()?;
    let n = params.grid.counts();
    let l = params.grid.lengths().map(T::of);
    let grid = SpectralGrid::new(n, l)?;
    let dt = params.time.dt;
    let total = params.total_steps();
    info!(
        "{:?} grid {:?} on {:?}, {:?} in {} time, dt = {:e}, {} steps",
        dim, n, params.device, params.scheme,
        if params.imaginary_time { "imaginary" } else { "real" },
        dt, total,
    );

    let file_init: Option<FromFile> = params.initial.clone().map(FromFile);
    let initializer: Option<&dyn Initializer<T>>
        = initializer.or(file_init.as_ref().map(|f| f as &dyn Initializer<T>));
    let g = T::of(params.g);

    // the initial field is checked before anything is written
    let (mut persist, mut state, start)
        = if params.resume {
            let (persist, ckpt)
                = PersistenceManager::resume::<T>(params, dim, grid.shape())?;
            // the initializer is skipped entirely when resuming
            let mut state
                = GPEState::new(
                    grid,
                    g,
                    params.device,
                    Some(&|grid: &SpectralGrid<T>| grid.zeros()),
                    potential,
                )?;
            state.set_psi(ckpt.psi)?;
            if !state.is_finite() {
                return Err(GpeError::Divergence { time: ckpt.t });
            }
            (persist, state, ckpt.step)
        } else {
            let state
                = GPEState::new(grid, g, params.device, initializer, potential)?;
            if !state.is_finite() {
                return Err(GpeError::Divergence { time: 0.0 });
            }
            let persist = PersistenceManager::create(params, dim)?;
            (persist, state, 0)
        };

    let engine
        = StepEngine::new(state.grid(), params.scheme, params.imaginary_time, T::of(dt));
    let diag = DiagnosticsEngine::new(T::of(params.delta));
    for step in start..total {
        let t = step as f64 * dt;
        let mut due = persist.due(step);
        // the checkpoint just resumed from is already on disk
        if params.resume && step == start { due.wavefunction = false; }
        if due.any() {
            record(&mut persist, &diag, &state, due, step, t)?;
        }
        if step % params.print_step == 0 {
            info!("step {step}/{total}: t = {t:.6}, norm = {:.12}", state.norm());
        }
        engine.advance(&mut state, T::of(t))?;
    }
    debug!("finished at step {total}");
    info!("done: t = {:.6}, norm = {:.12}", total as f64 * dt, state.norm());
    Ok(Simulation { state, step: total.max(start), dt })
}
