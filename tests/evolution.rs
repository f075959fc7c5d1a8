use std::path::Path;
use approx::assert_abs_diff_eq;
use gpspace::{
    C,
    Field,
    RField,
    backend::Device,
    config::{ GridParams, Params, TimeParams },
    diagnostics::DiagnosticsEngine,
    error::GpeError,
    evolve::time_advance,
    grid::SpectralGrid,
    persist::{ latest_checkpoint, read_series, Cadence },
    state::{ GPEState, Gaussian, HarmonicTrap },
    timedep::Scheme,
    utils::{ max_modulus_diff, wf_dot },
};

fn params(output: &Path, n: [usize; 3], l: f64, tmax: f64, dt: f64) -> Params {
    let grid = GridParams { nx: n[0], ny: n[1], nz: n[2], lx: l, ly: l, lz: l };
    let mut params = Params::new(grid, TimeParams { tmax, dt }, output.to_path_buf());
    params.wavefunction = Cadence::disabled();
    params.rms = Cadence::disabled();
    params.energy = Cadence::disabled();
    params
}

fn elongated() -> Gaussian {
    Gaussian { coeffs: [0.25, 0.5, 0.5], center: [0.5, -0.25, 0.0] }
}

#[test]
fn norm_conservation_real_time() {
    let dir = tempfile::tempdir().unwrap();
    let params = params(&dir.path().join("out"), [32, 32, 1], 16.0, 1.0, 0.001);
    assert_eq!(params.total_steps(), 1000);
    let init = elongated();
    let sim = time_advance::<f64>(&params, Some(&init), None).unwrap();
    assert_eq!(sim.step(), 1000);
    assert_abs_diff_eq!(sim.time(), 1.0, epsilon = 1e-12);
    assert_abs_diff_eq!(sim.state().norm(), 1.0, epsilon = 1e-10);
}

#[test]
fn ground_state_is_stationary() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("out");
    let mut params = params(&output, [64, 64, 1], 16.0, 1.0, 0.001);
    params.rms = Cadence::new(true, 0, 100);
    let sim = time_advance::<f64>(&params, None, None).unwrap();

    let grid = SpectralGrid::new([64, 64, 1], [16.0, 16.0, 1.0]).unwrap();
    let initial = GPEState::new(grid, 0.0, Device::Cpu, None, None).unwrap();
    assert!(max_modulus_diff(sim.state().psi(), initial.psi()) < 1e-5);
    // the ground state only picks up a global phase
    let overlap
        = wf_dot(initial.psi(), sim.state().psi(), initial.grid().cell_volume());
    assert_abs_diff_eq!(overlap.norm(), 1.0, epsilon = 1e-6);
    assert_abs_diff_eq!(overlap.arg(), -1.0, epsilon = 1e-4);

    let xrms = read_series(&output, "rms", "xrms").unwrap();
    let rrms = read_series(&output, "rms", "rrms").unwrap();
    assert_eq!(xrms.len(), 10);
    for (x, r) in xrms.iter().zip(rrms.iter()) {
        assert_abs_diff_eq!(*x, 0.5_f64.sqrt(), epsilon = 1e-5);
        assert_abs_diff_eq!(*r, 1.0, epsilon = 1e-5);
    }
    assert!(!output.join("rms").join("zrms.npy").exists());
}

#[test]
fn imaginary_time_converges_to_ground_state() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("out");
    let mut params = params(&output, [32, 32, 1], 12.0, 10.0, 0.01);
    params.imaginary_time = true;
    params.energy = Cadence::new(true, 0, 10);
    let init = Gaussian { coeffs: [0.25, 0.5, 0.5], center: [0.0; 3] };
    let sim = time_advance::<f64>(&params, Some(&init), None).unwrap();
    assert_abs_diff_eq!(sim.state().norm(), 1.0, epsilon = 1e-12);

    let energies = read_series(&output, "energies", "tenergy").unwrap();
    assert_eq!(energies.len(), 100);
    for (e0, e1) in energies.iter().zip(energies.iter().skip(1)) {
        assert!(e1 <= &(e0 + 1e-9), "energy increased: {e0} -> {e1}");
    }
    let last = energies[energies.len() - 1];
    assert!((last - 1.0).abs() < 1e-3, "final energy {last}");

    let diag = DiagnosticsEngine::new(params.delta);
    let energy = diag.energy(sim.state(), sim.time()).unwrap();
    assert_abs_diff_eq!(energy.total, 1.0, epsilon = 1e-3);
    assert_abs_diff_eq!(energy.kinetic, 0.5, epsilon = 1e-3);
    assert_abs_diff_eq!(energy.potential, 0.5, epsilon = 1e-3);
}

#[test]
fn imaginary_time_converges_in_one_dimension() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("out");
    let mut params = params(&output, [64, 1, 1], 16.0, 10.0, 0.01);
    params.imaginary_time = true;
    params.energy = Cadence::new(true, 0, 100);
    let init = Gaussian { coeffs: [0.25, 0.5, 0.5], center: [0.0; 3] };
    let sim = time_advance::<f64>(&params, Some(&init), None).unwrap();
    assert_abs_diff_eq!(sim.state().norm(), 1.0, epsilon = 1e-12);

    let energies = read_series(&output, "energies", "tenergy").unwrap();
    assert_eq!(energies.len(), 10);
    for (e0, e1) in energies.iter().zip(energies.iter().skip(1)) {
        assert!(e1 <= &(e0 + 1e-9), "energy increased: {e0} -> {e1}");
    }
    let diag = DiagnosticsEngine::new(params.delta);
    let energy = diag.energy(sim.state(), sim.time()).unwrap();
    assert_abs_diff_eq!(energy.total, 0.5, epsilon = 1e-3);
    assert_abs_diff_eq!(energy.kinetic, 0.25, epsilon = 1e-3);
    assert_abs_diff_eq!(energy.potential, 0.25, epsilon = 1e-3);
    assert_abs_diff_eq!(energy.interaction, 0.0);
}

#[test]
fn ground_state_in_three_dimensions() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("out");
    let mut params = params(&output, [24, 24, 24], 12.0, 0.01, 0.001);
    params.rms = Cadence::new(true, 0, 5);
    params.energy = Cadence::new(true, 0, 5);
    let sim = time_advance::<f64>(&params, None, None).unwrap();
    assert_eq!(sim.step(), 10);
    assert_abs_diff_eq!(sim.state().norm(), 1.0, epsilon = 1e-10);

    let rms = output.join("rms");
    assert!(!rms.join("rrms.npy").exists());
    for column in ["xrms", "yrms", "zrms"] {
        let values = read_series(&output, "rms", column).unwrap();
        assert_eq!(values.len(), 2);
        values.iter()
            .for_each(|x| assert_abs_diff_eq!(*x, 0.5_f64.sqrt(), epsilon = 1e-6));
    }
    let expected = [
        ("tenergy", 1.5),
        ("ke", 0.75),
        ("qe", 0.75),
        ("pe", 0.75),
        ("kec", 0.0),
        ("kei", 0.0),
        ("ie", 0.0),
    ];
    for (column, value) in expected {
        let values = read_series(&output, "energies", column).unwrap();
        assert_eq!(values.len(), 2);
        values.iter()
            .for_each(|x| assert_abs_diff_eq!(*x, value, epsilon = 1e-5));
    }
}

#[test]
fn nan_initial_field_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("out");
    let mut params = params(&output, [16, 16, 1], 8.0, 0.1, 0.01);
    params.wavefunction = Cadence::new(true, 0, 1);
    let init = |grid: &SpectralGrid<f64>| {
        let mut psi = grid.zeros();
        psi[[3, 3, 0]] = C::new(f64::NAN, 0.0);
        psi
    };
    match time_advance::<f64>(&params, Some(&init), None) {
        Err(GpeError::Divergence { time }) => assert_eq!(time, 0.0),
        Err(e) => panic!("expected divergence, got {e}"),
        Ok(_) => panic!("expected divergence"),
    }
    assert!(latest_checkpoint(&output).unwrap().is_none());
}

#[test]
fn divergence_mid_run_is_not_persisted() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("out");
    let mut params = params(&output, [16, 16, 1], 8.0, 0.1, 0.001);
    params.wavefunction = Cadence::new(true, 0, 1);
    let pot = |grid: &SpectralGrid<f64>, t: f64| -> RField<f64> {
        if t > 0.0045 {
            RField::from_elem(grid.shape(), f64::NAN)
        } else {
            grid.rsq().mapv(|r2| 0.5 * r2)
        }
    };
    match time_advance::<f64>(&params, None, Some(Box::new(pot))) {
        Err(e @ GpeError::Divergence { .. }) => {
            assert!(e.is_divergence());
            let GpeError::Divergence { time } = e else { unreachable!() };
            assert_abs_diff_eq!(time, 0.006, epsilon = 1e-12);
        },
        Err(e) => panic!("expected divergence, got {e}"),
        Ok(_) => panic!("expected divergence"),
    }
    let (step, _) = latest_checkpoint(&output).unwrap().unwrap();
    assert_eq!(step, 5);
}

#[test]
fn rk4_agrees_with_tssp() {
    let dir = tempfile::tempdir().unwrap();
    let mut base = params(&dir.path().join("tssp"), [32, 32, 1], 16.0, 0.2, 0.001);
    base.g = 1.0;
    let init = elongated();
    let trap = HarmonicTrap { omega: [1.0, 2.0, 1.0] };

    let tssp = time_advance::<f64>(&base, Some(&init), Some(Box::new(trap))).unwrap();
    let mut params = base.clone();
    params.scheme = Scheme::Rk4;
    params.output = dir.path().join("rk4");
    let rk4 = time_advance::<f64>(&params, Some(&init), Some(Box::new(trap))).unwrap();

    let diff: f64
        = ndarray::Zip::from(tssp.state().psi()).and(rk4.state().psi())
        .fold(0.0, |acc: f64, a, b| acc.max((a - b).norm()));
    assert!(diff < 5e-4, "max difference {diff}");
    assert_abs_diff_eq!(rk4.state().norm(), 1.0, epsilon = 1e-8);
}

#[test]
fn devices_agree() {
    let dir = tempfile::tempdir().unwrap();
    let mut params = params(&dir.path().join("cpu"), [32, 16, 1], 12.0, 0.1, 0.001);
    params.g = 2.0;
    let init = elongated();
    let cpu = time_advance::<f64>(&params, Some(&init), None).unwrap();
    params.device = Device::Parallel;
    params.output = dir.path().join("par");
    let par = time_advance::<f64>(&params, Some(&init), None).unwrap();
    let a: &Field<f64> = cpu.state().psi();
    let b: &Field<f64> = par.state().psi();
    ndarray::Zip::from(a).and(b)
        .for_each(|x, y| assert!((x - y).norm() < 1e-12));
}

#[test]
fn single_precision_run() {
    let dir = tempfile::tempdir().unwrap();
    let mut params = params(&dir.path().join("out"), [32, 32, 1], 16.0, 0.1, 0.001);
    params.g = 1.0;
    params.energy = Cadence::new(true, 0, 50);
    let init = elongated();
    let sim = time_advance::<f32>(&params, Some(&init), None).unwrap();
    assert!((sim.state().norm() - 1.0).abs() < 1e-4);
    let energies = read_series(&params.output, "energies", "tenergy").unwrap();
    assert_eq!(energies.len(), 2);
    assert!((energies[0] - energies[1]).abs() < 1e-3);
}
