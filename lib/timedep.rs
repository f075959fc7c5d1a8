//! Time stepping for the Gross-Pitaevskii equation.
//!
//! Two schemes are provided, both pseudo-spectral in the sense that the
//! Laplacian is always applied as multiplication by `-k²` in Fourier space:
//! - [`Scheme::Tssp`]: second-order time-splitting (Strang) scheme. The free
//!   propagator is applied exactly over two half steps around a full
//!   potential/nonlinear step.
//! - [`Scheme::Rk4`]: classical fourth-order Runge-Kutta integration of the
//!   semi-discrete system `dψ/dt = -iHψ`.
//!
//! In imaginary time (`t → -iτ`) both schemes damp high-energy components; only
//! TSSP restores the norm after each step.
//!
//! See [`crate::docs`] for more information.

use serde::{ Deserialize, Serialize };
use crate::{
    C,
    Field,
    Real,
    RField,
    backend::Backend,
    error::{ GpeError, GpeResult },
    grid::SpectralGrid,
    state::GPEState,
};

/// Time-stepping scheme.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scheme {
    /// Time-splitting spectral (Strang splitting).
    #[default]
    #[serde(alias = "TSSP")]
    Tssp,
    /// Fourth-order Runge-Kutta.
    #[serde(alias = "RK4")]
    Rk4,
}

/// Advances a [`GPEState`] by a fixed increment.
///
/// The engine holds nothing but precomputed, time-independent factors, so a
/// single engine may be reused for any number of steps.
#[derive(Clone, Debug)]
pub struct StepEngine<T> {
    scheme: Scheme,
    imaginary: bool,
    dt: T,
    // free propagator over half a step, in k-space
    kinetic: Field<T>,
    // k² / 2
    half_ksq: RField<T>,
}

impl<T: Real> StepEngine<T> {
    /// Precompute the kinetic factors for `grid` and time step `dt`.
    pub fn new(grid: &SpectralGrid<T>, scheme: Scheme, imaginary: bool, dt: T)
        -> Self
    {
        let half = T::of(0.5);
        let half_ksq: RField<T> = grid.ksq().mapv(|k2| half * k2);
        let tau = half * dt;
        let kinetic: Field<T>
            = if imaginary {
                half_ksq.mapv(|e| C::new((-e * tau).exp(), T::zero()))
            } else {
                half_ksq.mapv(|e| C::cis(-e * tau))
            };
        Self { scheme, imaginary, dt, kinetic, half_ksq }
    }

    /// Get the stepping scheme.
    pub fn scheme(&self) -> Scheme { self.scheme }

    /// Get the time step.
    pub fn dt(&self) -> T { self.dt }

    /// Apply the free propagator over half a time step: transform to k-space,
    /// multiply by `exp(-i (k²/2) (dt/2))` (or its imaginary-time analogue),
    /// and transform back.
    pub fn kinetic_half_step(&self, state: &mut GPEState<T>) {
        let (backend, psi) = state.split_mut();
        backend.fft(psi);
        backend.apply_with(psi, &self.kinetic, |q, p| { *q *= *p; });
        backend.ifft(psi);
    }

    /// Apply the potential and nonlinear phases over a full time step in real
    /// space, `exp(-i (V + g|ψ|²) dt)`, with the density taken from the field
    /// as it currently stands.
    ///
    /// *Panics if `V` doesn't match the state's grid*.
    pub fn nonlinear_step(&self, state: &mut GPEState<T>, V: &RField<T>) {
        let g = state.g();
        let dt = self.dt;
        let imaginary = self.imaginary;
        let (backend, psi) = state.split_mut();
        backend.apply_with(psi, V, |q, &v| {
            let e = (v + g * q.norm_sqr()) * dt;
            if imaginary {
                *q *= (-e).exp();
            } else {
                *q *= C::cis(-e);
            }
        });
    }

    /// Rescale the field to unit norm.
    pub fn renormalize(&self, state: &mut GPEState<T>) {
        let scale = state.norm().sqrt().recip();
        let (backend, psi) = state.split_mut();
        backend.apply(psi, |q| { *q *= scale; });
    }

    /// Advance `state` from time `t` to `t + dt`.
    ///
    /// Fails with [`GpeError::Divergence`] if the field contains any
    /// non-finite value afterward; the state is left as computed.
    pub fn advance(&self, state: &mut GPEState<T>, t: T) -> GpeResult<()> {
        match self.scheme {
            Scheme::Tssp => self.tssp_step(state, t)?,
            Scheme::Rk4 => self.rk4_step(state, t)?,
        }
        state.is_finite().then_some(())
            .ok_or(GpeError::Divergence { time: (t + self.dt).as_f64() })
    }

    fn tssp_step(&self, state: &mut GPEState<T>, t: T) -> GpeResult<()> {
        let V = state.potential_at(t)?;
        self.kinetic_half_step(state);
        self.nonlinear_step(state, &V);
        self.kinetic_half_step(state);
        if self.imaginary { self.renormalize(state); }
        Ok(())
    }

    // evaluate the time derivative of the GPE at a given potential and state,
    // i.e. the action of the Hamiltonian with an added factor of `-i` (real
    // time) or `-1` (imaginary time)
    //
    // the kinetic part is applied in k-space; the potential and nonlinear parts
    // are added back in real space
    fn rhs(&self, backend: &Backend<T>, g: T, V: &RField<T>, q: &Field<T>)
        -> Field<T>
    {
        let factor: C<T>
            = if self.imaginary {
                C::new(-T::one(), T::zero())
            } else {
                C::new(T::zero(), -T::one())
            };
        let mut dq = q.clone();
        backend.fft(&mut dq);
        backend.apply_with(&mut dq, &self.half_ksq, |dqk, &e| { *dqk *= e; });
        backend.ifft(&mut dq);
        backend.apply_with2(&mut dq, V, q, |dqk, &v, qk| {
            *dqk += *qk * (v + g * qk.norm_sqr());
            *dqk *= factor;
        });
        dq
    }

    // take a single RK4 step in place
    //
    // the potential is needed at three points in time: the start, the
    // midpoint, and the end of the step
    fn rk4_step(&self, state: &mut GPEState<T>, t: T) -> GpeResult<()> {
        let dt = self.dt;
        let dth = T::of(0.5) * dt;
        let V = state.potential_at(t)?;
        let Vh = state.potential_at(t + dth)?;
        let Vp = state.potential_at(t + dt)?;
        let g = state.g();
        let (backend, psi) = state.split_mut();
        let array_step = |h: T, k: &Field<T>| {
            backend.zip_map(&*psi, k, |qk, kk| *qk + *kk * h)
        };
        let k1 = self.rhs(backend, g, &V, &*psi);
        let k2 = self.rhs(backend, g, &Vh, &array_step(dth, &k1));
        let k3 = self.rhs(backend, g, &Vh, &array_step(dth, &k2));
        let k4 = self.rhs(backend, g, &Vp, &array_step(dt, &k3));
        let two = T::of(2.0);
        let mut incr = k1;
        backend.apply_with2(&mut incr, &k2, &k3, |a, b, c| { *a += (*b + *c) * two; });
        backend.apply_with(&mut incr, &k4, |a, b| { *a += *b; });
        let w = dt / T::of(6.0);
        backend.apply_with(psi, &incr, |qk, ik| { *qk += *ik * w; });
        Ok(())
    }
}
