//! The physical problem bundled with the wavefunction it acts on.
//!
//! Problem definitions enter through two capabilities: an [`Initializer`]
//! producing the field at t = 0 and a [`Potential`] producing the trap at any
//! time t. Plain closures satisfy both. When either is omitted, the isotropic
//! harmonic oscillator ([`Gaussian::ground`] and [`HarmonicTrap::isotropic`])
//! is substituted.

use std::path::PathBuf;
use ndarray as nd;
use crate::{
    C,
    Field,
    Real,
    RField,
    backend::{ Backend, Device },
    error::GpeResult,
    grid::{ Dimension, SpectralGrid },
    persist,
};

/// Produces the wavefunction at t = 0.
pub trait Initializer<T> {
    fn initialize(&self, grid: &SpectralGrid<T>) -> GpeResult<Field<T>>;
}

impl<T, F> Initializer<T> for F
where F: Fn(&SpectralGrid<T>) -> Field<T>
{
    fn initialize(&self, grid: &SpectralGrid<T>) -> GpeResult<Field<T>> {
        Ok(self(grid))
    }
}

/// Produces the (real) trapping potential at time `t`.
pub trait Potential<T> {
    fn potential(&self, grid: &SpectralGrid<T>, t: T) -> RField<T>;
}

impl<T, F> Potential<T> for F
where F: Fn(&SpectralGrid<T>, T) -> RField<T>
{
    fn potential(&self, grid: &SpectralGrid<T>, t: T) -> RField<T> {
        self(grid, t)
    }
}

/// Separable Gaussian wavefunction `A exp(-Σ c[a] x[a]²)`, normalized
/// analytically over the active axes.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Gaussian {
    /// Per-axis coefficients `c`; entries for inactive axes are ignored.
    pub coeffs: [f64; 3],
    /// Per-axis center offsets.
    pub center: [f64; 3],
}

impl Gaussian {
    /// Ground state of the isotropic unit-frequency harmonic oscillator,
    /// `π^(-d/4) exp(-|x|²/2)`.
    pub fn ground() -> Self {
        Self { coeffs: [0.5; 3], center: [0.0; 3] }
    }

    /// Normalization constant for a given dimension, `Π (2 c / π)^(1/4)`.
    pub fn amplitude(&self, dim: Dimension) -> f64 {
        dim.axes()
            .map(|a| (2.0 * self.coeffs[a] / std::f64::consts::PI).powf(0.25))
            .product()
    }
}

impl<T: Real> Initializer<T> for Gaussian {
    fn initialize(&self, grid: &SpectralGrid<T>) -> GpeResult<Field<T>> {
        let dim = grid.dim();
        let amp = T::of(self.amplitude(dim));
        let mut arg: RField<T> = RField::zeros(grid.shape());
        for a in dim.axes() {
            let c = T::of(self.coeffs[a]);
            let x0 = T::of(self.center[a]);
            nd::Zip::from(&mut arg).and(grid.x_mesh(a))
                .for_each(|s, &x| { *s += c * (x - x0) * (x - x0); });
        }
        Ok(arg.mapv(|s| C::new(amp * (-s).exp(), T::zero())))
    }
}

/// Loads the initial field from a directory holding `re.npy` and `im.npy`,
/// e.g. a wavefunction snapshot from a previous run.
#[derive(Clone, Debug)]
pub struct FromFile(pub PathBuf);

impl<T: Real> Initializer<T> for FromFile {
    fn initialize(&self, grid: &SpectralGrid<T>) -> GpeResult<Field<T>> {
        let psi: Field<T> = persist::read_field(&self.0)?;
        grid.check_shape("initial field file", psi.shape())?;
        Ok(psi)
    }
}

/// Static harmonic trap `V = ½ Σ ω[a]² x[a]²` over the active axes.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct HarmonicTrap {
    /// Per-axis trap frequencies; entries for inactive axes are ignored.
    pub omega: [f64; 3],
}

impl HarmonicTrap {
    /// Unit trap frequency along every axis.
    pub fn isotropic() -> Self { Self { omega: [1.0; 3] } }
}

impl<T: Real> Potential<T> for HarmonicTrap {
    fn potential(&self, grid: &SpectralGrid<T>, _t: T) -> RField<T> {
        let half = T::of(0.5);
        let mut V: RField<T> = RField::zeros(grid.shape());
        for a in grid.dim().axes() {
            let w2 = T::of(self.omega[a] * self.omega[a]);
            nd::Zip::from(&mut V).and(grid.x_mesh(a))
                .for_each(|v, &x| { *v += half * w2 * x * x; });
        }
        V
    }
}

/// A wavefunction together with the problem it evolves under.
pub struct GPEState<T: Real> {
    grid: SpectralGrid<T>,
    psi: Field<T>,
    g: T,
    potential: Box<dyn Potential<T>>,
    backend: Backend<T>,
}

impl<T: Real> GPEState<T> {
    /// Construct a new state, substituting the harmonic-oscillator defaults for
    /// any missing capability.
    ///
    /// Fails if the initializer fails or returns a field of the wrong shape.
    pub fn new(
        grid: SpectralGrid<T>,
        g: T,
        device: Device,
        initializer: Option<&dyn Initializer<T>>,
        potential: Option<Box<dyn Potential<T>>>,
    ) -> GpeResult<Self>
    {
        let psi
            = match initializer {
                Some(init) => init.initialize(&grid)?,
                None => Gaussian::ground().initialize(&grid)?,
            };
        grid.check_shape("initial wavefunction", psi.shape())?;
        let potential
            = potential.unwrap_or_else(|| Box::new(HarmonicTrap::isotropic()));
        let backend = Backend::new(device, &grid);
        Ok(Self { grid, psi, g, potential, backend })
    }

    /// Get a reference to the grid.
    pub fn grid(&self) -> &SpectralGrid<T> { &self.grid }

    /// Get a reference to the current wavefunction.
    pub fn psi(&self) -> &Field<T> { &self.psi }

    /// Get a mutable reference to the current wavefunction.
    pub fn psi_mut(&mut self) -> &mut Field<T> { &mut self.psi }

    /// Replace the current wavefunction.
    ///
    /// Fails if `psi` doesn't match the grid.
    pub fn set_psi(&mut self, psi: Field<T>) -> GpeResult<()> {
        self.grid.check_shape("wavefunction", psi.shape())?;
        self.psi = psi;
        Ok(())
    }

    /// Get the nonlinearity coefficient.
    pub fn g(&self) -> T { self.g }

    /// Get a reference to the array backend.
    pub fn backend(&self) -> &Backend<T> { &self.backend }

    // borrow the backend alongside the field for in-place updates
    pub(crate) fn split_mut(&mut self) -> (&Backend<T>, &mut Field<T>) {
        (&self.backend, &mut self.psi)
    }

    /// Evaluate the potential at time `t`.
    ///
    /// Fails if the potential doesn't match the grid.
    pub fn potential_at(&self, t: T) -> GpeResult<RField<T>> {
        let V = self.potential.potential(&self.grid, t);
        self.grid.check_shape("potential", V.shape())?;
        Ok(V)
    }

    /// Compute `∫|ψ|²` over the box.
    pub fn norm(&self) -> T {
        self.backend.sum_by(&self.psi, |q| q.norm_sqr()) * self.grid.cell_volume()
    }

    /// Compute the density `|ψ|²`.
    pub fn density(&self) -> RField<T> {
        self.backend.map(&self.psi, |q| q.norm_sqr())
    }

    /// Return `true` if every element of the wavefunction is finite.
    pub fn is_finite(&self) -> bool { self.backend.all_finite(&self.psi) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GpeError;

    fn grid2d() -> SpectralGrid<f64> {
        SpectralGrid::new([64, 64, 1], [16.0, 16.0, 1.0]).unwrap()
    }

    #[test]
    fn default_state_is_normalized() {
        let state
            = GPEState::new(grid2d(), 0.0, Device::Cpu, None, None).unwrap();
        assert!((state.norm() - 1.0).abs() < 1e-12);
        // peak of π^(-1/2) exp(-r²/2) sits at the center index
        let peak = state.psi()[[32, 32, 0]];
        assert!((peak.re - std::f64::consts::PI.powf(-0.5)).abs() < 1e-12);
        let V = state.potential_at(0.0).unwrap();
        assert!((V[[40, 32, 0]] - 0.5 * 2.0_f64.powi(2)).abs() < 1e-12);
    }

    #[test]
    fn gaussian_normalization_3d() {
        let grid
            = SpectralGrid::<f64>::new([32, 32, 32], [12.0, 12.0, 12.0]).unwrap();
        let init = Gaussian { coeffs: [0.5, 1.0, 2.0], center: [0.0; 3] };
        let state
            = GPEState::new(grid, 0.0, Device::Parallel, Some(&init), None)
            .unwrap();
        assert!((state.norm() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn closures_as_capabilities() {
        let init = |grid: &SpectralGrid<f64>| {
            grid.x_mesh(0).mapv(|x| C::new((-x * x).exp(), 0.0))
        };
        let pot = |grid: &SpectralGrid<f64>, t: f64| grid.x_mesh(1).mapv(|y| t * y);
        let state
            = GPEState::new(grid2d(), 1.0, Device::Cpu, Some(&init), Some(Box::new(pot)))
            .unwrap();
        let V = state.potential_at(2.0).unwrap();
        assert_eq!(V[[0, 40, 0]], 2.0 * state.grid().x(1)[40]);
    }

    #[test]
    fn shape_mismatch() {
        let init = |_: &SpectralGrid<f64>| Field::<f64>::zeros((8, 8, 1));
        let res = GPEState::new(grid2d(), 0.0, Device::Cpu, Some(&init), None);
        assert!(matches!(res, Err(GpeError::Shape(_))));

        let pot = |_: &SpectralGrid<f64>, _: f64| RField::<f64>::zeros((64, 32, 1));
        let state
            = GPEState::new(grid2d(), 0.0, Device::Cpu, None, Some(Box::new(pot)))
            .unwrap();
        assert!(matches!(state.potential_at(0.0), Err(GpeError::Shape(_))));
    }
}
