//! Derived physical quantities of a wavefunction.
//!
//! Nothing here mutates a state. All integrals are approximated by sums over
//! the grid times the cell volume; integrals over k-space use Parseval's
//! theorem, `∫|f|² dx = (dV / N) Σ|F[f]|²`.

use crate::{
    C,
    Field,
    Real,
    error::GpeResult,
    grid::Dimension,
    state::GPEState,
};

/// Energy decomposition of a state at a point in time.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Energy<T> {
    /// `kinetic + potential + interaction`.
    pub total: T,
    /// `½∫|∇ψ|²`.
    pub kinetic: T,
    /// `½∫|u_c|²`, for the curl-free part `u_c` of the density-weighted
    /// velocity.
    pub kinetic_compressible: T,
    /// `½∫|u_i|²`, for the divergence-free part `u_i` of the density-weighted
    /// velocity.
    pub kinetic_incompressible: T,
    /// `½∫|∇√ρ|²`.
    pub quantum: T,
    /// `∫Vρ`.
    pub potential: T,
    /// `(g/2)∫ρ²`.
    pub interaction: T,
}

/// RMS extent of a state along each active axis.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Rms<T> {
    pub x: T,
    pub y: Option<T>,
    pub z: Option<T>,
    /// Radial extent `sqrt(∫(x² + y²)ρ)`; only computed for 2D grids.
    pub r: Option<T>,
}

/// Computes norms, energies, and RMS widths.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct DiagnosticsEngine<T> {
    // densities at or below this are treated as vacuum when computing the
    // velocity field
    delta: T,
}

impl<T: Real> DiagnosticsEngine<T> {
    /// Create a new engine with small-density threshold `delta`.
    pub fn new(delta: T) -> Self { Self { delta } }

    /// Compute `∫|ψ|²`.
    pub fn norm(&self, state: &GPEState<T>) -> T { state.norm() }

    /// Compute the energy decomposition of `state`, evaluating the potential at
    /// time `t`.
    ///
    /// Fails if the potential doesn't match the grid.
    pub fn energy(&self, state: &GPEState<T>, t: T) -> GpeResult<Energy<T>> {
        let grid = state.grid();
        let backend = state.backend();
        let psi = state.psi();
        let half = T::of(0.5);
        let zero = C::new(T::zero(), T::zero());
        let dv = grid.cell_volume();
        let kspace = dv / T::of(grid.len() as f64);
        let rho = state.density();

        let mut psik = psi.clone();
        backend.fft(&mut psik);
        let kinetic
            = half * kspace
            * backend.sum_zip(&psik, grid.ksq(), |q, &k2| k2 * q.norm_sqr());

        // Fourier transform of the density-weighted velocity, per active axis
        let delta = self.delta;
        let uk: Vec<Field<T>>
            = grid.dim().axes()
            .map(|a| {
                let mut dpsi
                    = backend.zip_map(&psik, grid.k_mesh(a), |q, &k| {
                        *q * C::new(T::zero(), k)
                    });
                backend.ifft(&mut dpsi);
                let mut u
                    = backend.zip_map(psi, &dpsi, |q, dq| {
                        let r = q.norm_sqr();
                        if r > delta {
                            C::new((q.conj() * *dq).im / r.sqrt(), T::zero())
                        } else {
                            zero
                        }
                    });
                backend.fft(&mut u);
                u
            })
            .collect();

        // Helmholtz decomposition: the compressible part is `k (k·û) / k²`
        let mut w: Field<T> = grid.zeros();
        for (a, u) in uk.iter().enumerate() {
            backend.apply_with2(&mut w, u, grid.k_mesh(a), |wk, uk, &k| {
                *wk += *uk * k;
            });
        }
        backend.apply_with(&mut w, grid.ksq(), |wk, &k2| {
            *wk = if k2 > T::zero() { *wk / k2 } else { zero };
        });
        let mut kec = T::zero();
        let mut kei = T::zero();
        for (a, u) in uk.iter().enumerate() {
            let uc = backend.zip_map(&w, grid.k_mesh(a), |wk, &k| *wk * k);
            kec += backend.sum_by(&uc, |c| c.norm_sqr());
            kei += backend.sum_zip(u, &uc, |uk, c| (*uk - *c).norm_sqr());
        }
        let kinetic_compressible = half * kspace * kec;
        let kinetic_incompressible = half * kspace * kei;

        let mut amp: Field<T>
            = backend.map(psi, |q| C::new(q.norm(), T::zero()));
        backend.fft(&mut amp);
        let quantum
            = half * kspace
            * backend.sum_zip(&amp, grid.ksq(), |q, &k2| k2 * q.norm_sqr());

        let V = state.potential_at(t)?;
        let potential = dv * backend.sum_zip(&V, &rho, |&v, &r| v * r);
        let interaction
            = half * state.g() * dv * backend.sum_by(&rho, |&r| r * r);

        Ok(Energy {
            total: kinetic + potential + interaction,
            kinetic,
            kinetic_compressible,
            kinetic_incompressible,
            quantum,
            potential,
            interaction,
        })
    }

    /// Compute the RMS extent of `state` along each active axis and, in 2D,
    /// radially.
    pub fn rms(&self, state: &GPEState<T>) -> Rms<T> {
        let grid = state.grid();
        let backend = state.backend();
        let dv = grid.cell_volume();
        let rho = state.density();
        let msq = |a: usize| -> T {
            dv * backend.sum_zip(&rho, grid.x_mesh(a), |&r, &x| x * x * r)
        };
        let dim = grid.dim();
        let x2 = msq(0);
        let y2 = dim.is_active(1).then(|| msq(1));
        let z2 = dim.is_active(2).then(|| msq(2));
        let r
            = match (dim, y2) {
                (Dimension::Two, Some(y2)) => Some((x2 + y2).sqrt()),
                _ => None,
            };
        Rms {
            x: x2.sqrt(),
            y: y2.map(|s| s.sqrt()),
            z: z2.map(|s| s.sqrt()),
            r,
        }
    }
}
