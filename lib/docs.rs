//! Theoretical background.
//!
//! # Contents
//! - [Background](#background)
//! - [Units](#units)
//! - [Time splitting](#time-splitting)
//! - [Imaginary time](#imaginary-time)
//! - [Runge-Kutta](#runge-kutta)
//! - [Energies](#energies)
//!
//! # Background
//! A dilute Bose gas well below its condensation temperature is described to a
//! good approximation by a single complex order parameter ψ obeying the
//! Gross-Pitaevskii equation (GPE)[^1]
//! ```text
//!   ∂ψ      ħ²
//! i ħ -- = (- -- ∇² + V(x, t) + g |ψ|²) ψ
//!   ∂t      2 m
//! ```
//! where *V* is an external trapping potential and *g* measures the strength of
//! contact interactions between particles. This is a Schrödinger equation with
//! a local, cubic nonlinearity; the density |ψ|² acts as an additional,
//! self-consistent potential.
//!
//! # Units
//! Everything in this crate is dimensionless: *ħ* = *m* = 1, so that
//! ```text
//!   ∂ψ      1
//! i -- = (- - ∇² + V + g |ψ|²) ψ ≡ H ψ
//!   ∂t      2
//! ```
//! For a harmonic trap of frequency *ω*, the natural choice is to measure
//! lengths in units of the oscillator length sqrt(*ħ*/*m* *ω*) and times in
//! units of 1/*ω*, in which case the trap is *V* = |*x*|²/2 and the
//! noninteracting ground state `π^(-d/4) exp(-|x|²/2)` has energy *d*/2 in *d*
//! dimensions.
//!
//! Fields are sampled over a periodic box of *N* points per axis with spacing
//! *dx* = *L*/*N*, and wavenumbers follow the usual FFT ordering, so that the
//! Laplacian acts as multiplication by -*k*² in Fourier space.
//!
//! # Time splitting
//! Writing *H* = *T* + *N*, with the kinetic part *T* = -∇²/2 and the
//! (potential plus nonlinear) part *N* = *V* + *g* |ψ|², the symmetric (Strang)
//! splitting of the propagator is
//! ```text
//!               -i T dt/2  -i N dt  -i T dt/2
//! ψ(t + dt) = [e          e        e         ] ψ(t) + O(dt³)
//! ```
//! *T* is diagonal in Fourier space and *N* is diagonal in real space, so each
//! factor is a pointwise multiplication in the appropriate space. Because the
//! nonlinear factor only changes the phase of ψ, the density inside it may be
//! taken from the field at the time the factor is applied without spoiling
//! the exactness of that substep. A step therefore looks like this:
//! ```text
//!        ψ(t, x)
//!           |
//!           '--> FFT ---.
//!                       |
//!                       V
//!                 -i (k²/2) dt/2
//!                e
//!                       |
//!           .-- iFFT <--'
//!           |
//!           V
//!    -i (V(t, x) + g |ψ|²) dt
//!   e
//!           |
//!           '--> FFT ---.
//!                       |
//!                       V
//!                 -i (k²/2) dt/2
//!                e
//!                       |
//!           .-- iFFT <--'
//!           |
//!           V
//!     ψ(t + dt, x)
//! ```
//! Every factor has unit modulus, so the scheme conserves the norm to within
//! the precision of the FFTs, for any *dt*. This is the time-splitting spectral
//! (TSSP) method[^2].
//!
//! # Imaginary time
//! Substituting *t* → -*i* *τ* turns the GPE into a diffusion-like equation
//! under which every eigencomponent decays as exp(-*E* *τ*). After renormalizing
//! at each step, the slowest-decaying component, the ground state, is all that
//! survives. The splitting above carries over with every phase factor
//! exp(-*i* *X* *dt*) replaced by the real damping factor exp(-*X* *dt*),
//! followed by division by sqrt(∫|ψ|²). The energy decreases monotonically as
//! long as *dt* is small enough that the splitting error doesn't dominate.
//!
//! # Runge-Kutta
//! Alternatively, the semi-discrete system
//! ```text
//! dψ
//! -- = -i H ψ    (real time)
//! dt
//!
//! dψ
//! -- = -H ψ      (imaginary time)
//! dt
//! ```
//! can be integrated with the classical fourth-order Runge-Kutta method, with
//! *H* applied pseudo-spectrally at each of the four stages and the potential
//! sampled at *t*, *t* + *dt*/2 (twice), and *t* + *dt*. This is explicit and so
//! only conditionally stable, requiring roughly *dt* ≲ 2.8 / max(*k*²/2). It
//! also neither conserves the norm exactly in real time nor restores it in
//! imaginary time.
//!
//! # Energies
//! The total energy
//! ```text
//!     ⌠   1            g
//! E = ⎮ ( - |∇ψ|² + V ρ + - ρ² ) dx,    ρ = |ψ|²
//!     ⌡   2            2
//! ```
//! is conserved by real-time evolution in a static trap. The kinetic part can be
//! split further using the Madelung representation ψ = √ρ exp(*i* φ)[^3]:
//! ```text
//! 1          1              1
//! - |∇ψ|² =  - |∇√ρ|²   +   - |u|²,    u = √ρ ∇φ = Im(ψ* ∇ψ) / √ρ
//! 2          2              2
//! ```
//! where the first term is the quantum pressure and *u* is the density-weighted
//! velocity. *u* is decomposed in Fourier space into compressible (curl-free)
//! and incompressible (divergence-free) parts,
//! ```text
//!       k (k · û)
//! û_c = ---------,    û_i = û - û_c
//!          k²
//! ```
//! whose kinetic energies characterize sound waves and vortices, respectively.
//! Where the density falls below a small threshold the phase is undefined and
//! *u* is taken to be zero.
//!
//! [^1]: L. Pitaevskii and S. Stringari, *Bose-Einstein Condensation and
//! Superfluidity*. Oxford University Press (2016).
//!
//! [^2]: W. Bao, D. Jaksch, and P. A. Markowich, "Numerical solution of the
//! Gross-Pitaevskii equation for Bose-Einstein condensation." J. Comput. Phys.
//! **187** 1 318-342 (2003).
//!
//! [^3]: C. Nore, M. Abid, and M. E. Brachet, "Kolmogorov turbulence in
//! low-temperature superflows." Phys. Rev. Lett. **78** 20 3896 (1997).
