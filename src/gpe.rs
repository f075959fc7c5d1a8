use std::path::PathBuf;
use anyhow::Context;
use clap::Parser;
use log::info;
use gpspace::{
    Real,
    config::{ Params, Precision },
    diagnostics::DiagnosticsEngine,
    evolve,
    problems::Problem,
};

/// Evolve a condensate wavefunction under the Gross-Pitaevskii equation.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Cli {
    /// Path to a TOML run configuration.
    config: PathBuf,

    /// Built-in problem definition. Ignored for the initial state if the
    /// configuration names an initial-field file.
    #[arg(short, long, value_enum, ignore_case = true, default_value = "harmonic")]
    problem: Problem,
}

fn run<T: Real>(params: &Params, problem: Problem) -> anyhow::Result<()> {
    let initializer = problem.initializer::<T>();
    let initializer
        = if params.initial.is_some() { None } else { Some(initializer.as_ref()) };
    let sim
        = evolve::time_advance::<T>(params, initializer, Some(problem.potential()))
        .context("simulation failed")?;
    let diag = DiagnosticsEngine::new(T::of(params.delta));
    let energy = diag.energy(sim.state(), T::of(sim.time()))?;
    info!(
        "final state at t = {:.6}: norm = {:.12}, energy = {:.12}",
        sim.time(), diag.norm(sim.state()), energy.total,
    );
    Ok(())
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or("info")
    ).init();
    let cli = Cli::parse();
    let params
        = Params::from_file(&cli.config)
        .with_context(|| format!("loading {}", cli.config.display()))?;
    params.validate().context("invalid configuration")?;
    match params.precision {
        Precision::Single => run::<f32>(&params, cli.problem),
        Precision::Double => run::<f64>(&params, cli.problem),
    }
}
