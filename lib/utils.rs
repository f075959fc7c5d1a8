//! Miscellaneous tools.

use ndarray as nd;
use crate::{ C, Real };

/// Generate an array of frequency-space coordinates to accompany a FFT of `n`
/// points for sampling interval `d`.
///
/// Follows the usual FFT ordering: zero, then positive frequencies in
/// ascending order, then negative frequencies ending just below zero.
pub fn fft_freq<T: Real>(n: usize, d: T) -> nd::Array1<T> {
    let m = (n + 1) / 2;
    let span = T::of(n as f64) * d;
    (0..n)
        .map(|k| {
            if k < m {
                T::of(k as f64) / span
            } else {
                -T::of((n - k) as f64) / span
            }
        })
        .collect()
}

/// Generate the angular wavenumbers `2π f` accompanying a FFT of `n` points
/// with spacing `d`.
pub fn fft_wavenumbers<T: Real>(n: usize, d: T) -> nd::Array1<T> {
    let tau = T::TAU();
    fft_freq(n, d).mapv(|f| tau * f)
}

/// Generate `n` real-space coordinates with spacing `d`, centered so that
/// index `n / 2` sits at zero.
pub fn centered_coords<T: Real>(n: usize, d: T) -> nd::Array1<T> {
    let half = (n / 2) as f64;
    (0..n).map(|i| T::of(i as f64 - half) * d).collect()
}

/// Calculate the inner product `∫ q* p` of two wavefunctions sampled over the
/// same grid with cell volume `dv`.
pub fn wf_dot<S, R, D, T>(
    q: &nd::ArrayBase<S, D>,
    p: &nd::ArrayBase<R, D>,
    dv: T,
) -> C<T>
where
    S: nd::Data<Elem = C<T>>,
    R: nd::Data<Elem = C<T>>,
    D: nd::Dimension,
    T: Real,
{
    nd::Zip::from(q).and(p)
        .fold(C::new(T::zero(), T::zero()), |acc, qk, pk| acc + qk.conj() * pk)
        * dv
}

/// Return the largest absolute difference between the moduli of two fields.
///
/// Insensitive to a global phase between the two.
pub fn max_modulus_diff<S, R, D, T>(q: &nd::ArrayBase<S, D>, p: &nd::ArrayBase<R, D>)
    -> T
where
    S: nd::Data<Elem = C<T>>,
    R: nd::Data<Elem = C<T>>,
    D: nd::Dimension,
    T: Real,
{
    nd::Zip::from(q).and(p)
        .fold(T::zero(), |acc, qk, pk| {
            let d = qk.norm() - pk.norm();
            let d = if d < T::zero() { -d } else { d };
            if d > acc { d } else { acc }
        })
}
