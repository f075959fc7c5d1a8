//! Array-operation capability shared by the stepping and diagnostics engines.
//!
//! A [`Backend`] bundles multidimensional FFTs, element-wise updates, and
//! reductions over grid-shaped arrays. It is selected once from a [`Device`]
//! at the start of a run; callers use it uniformly and never branch on the
//! device themselves. The only parallelism in the crate lives here, and it
//! never changes the order in which time steps happen.

use std::{ fmt, sync::Arc };
use ndarray as nd;
use num_traits::Zero;
use rayon::prelude::*;
use rustfft::{ Fft, FftPlanner };
use serde::{ Deserialize, Serialize };
use crate::{ C, Field, Real, grid::SpectralGrid };

/// Where array operations execute.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Device {
    /// Serial execution on the calling thread.
    #[default]
    Cpu,
    /// Data-parallel execution on the global rayon thread pool.
    #[serde(alias = "gpu", alias = "accelerator")]
    Parallel,
}

// forward and inverse transforms along a single active axis
#[derive(Clone)]
struct AxisPlan<T> {
    axis: usize,
    n: usize,
    forward: Arc<dyn Fft<T>>,
    inverse: Arc<dyn Fft<T>>,
}

/// FFTs, element-wise maps, and reductions over fields of a fixed shape.
#[derive(Clone)]
pub struct Backend<T> {
    device: Device,
    shape: [usize; 3],
    plans: Vec<AxisPlan<T>>,
    // 1 / (total number of points), applied after inverse transforms
    scale: T,
}

impl<T> fmt::Debug for Backend<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Backend")
            .field("device", &self.device)
            .field("shape", &self.shape)
            .field("axes", &self.plans.iter().map(|p| p.axis).collect::<Vec<_>>())
            .finish()
    }
}

impl<T: Real> Backend<T> {
    /// Plan transforms over the active axes of `grid` for execution on
    /// `device`.
    pub fn new(device: Device, grid: &SpectralGrid<T>) -> Self {
        let shape = grid.shape();
        let mut planner = FftPlanner::<T>::new();
        let plans: Vec<AxisPlan<T>>
            = grid.dim().axes()
            .map(|axis| {
                let n = shape[axis];
                AxisPlan {
                    axis,
                    n,
                    forward: planner.plan_fft_forward(n),
                    inverse: planner.plan_fft_inverse(n),
                }
            })
            .collect();
        let scale = T::of(grid.len() as f64).recip();
        Self { device, shape, plans, scale }
    }

    /// Get the shape of the fields this backend was planned for.
    pub fn shape(&self) -> [usize; 3] { self.shape }

    // transform along every active axis in place
    fn transform(&self, q: &mut Field<T>, inverse: bool) {
        for plan in self.plans.iter() {
            let fft: &Arc<dyn Fft<T>>
                = if inverse { &plan.inverse } else { &plan.forward };
            match self.device {
                Device::Cpu => {
                    let zero = C::zero();
                    let mut buf: Vec<C<T>> = vec![zero; plan.n];
                    let mut scratch: Vec<C<T>>
                        = vec![zero; fft.get_inplace_scratch_len()];
                    for mut lane in q.lanes_mut(nd::Axis(plan.axis)) {
                        buf.iter_mut().zip(lane.iter())
                            .for_each(|(b, qk)| { *b = *qk; });
                        fft.process_with_scratch(&mut buf, &mut scratch);
                        lane.iter_mut().zip(buf.iter())
                            .for_each(|(qk, b)| { *qk = *b; });
                    }
                },
                Device::Parallel => {
                    nd::Zip::from(q.lanes_mut(nd::Axis(plan.axis)))
                        .par_for_each(|mut lane| {
                            let mut buf: Vec<C<T>> = lane.to_vec();
                            fft.process(&mut buf);
                            lane.iter_mut().zip(buf)
                                .for_each(|(qk, b)| { *qk = b; });
                        });
                },
            }
        }
        if inverse {
            let scale = self.scale;
            self.apply(q, |qk| { *qk *= scale; });
        }
    }

    /// Perform the forward, complex-valued FFT over all active axes in place.
    pub fn fft(&self, q: &mut Field<T>) { self.transform(q, false); }

    /// Perform the normalized inverse FFT over all active axes in place.
    pub fn ifft(&self, q: &mut Field<T>) { self.transform(q, true); }

    /// Apply `f` to every element of `q` in place.
    pub fn apply<F>(&self, q: &mut Field<T>, f: F)
    where F: Fn(&mut C<T>) + Sync + Send
    {
        match self.device {
            Device::Cpu => q.iter_mut().for_each(f),
            Device::Parallel => q.par_iter_mut().for_each(f),
        }
    }

    /// Apply `f` to every element of `q` in place, paired with the
    /// corresponding element of `a`.
    ///
    /// *Panics if `a` doesn't have the same shape as `q`*.
    pub fn apply_with<A, F>(&self, q: &mut Field<T>, a: &nd::Array3<A>, f: F)
    where
        A: Sync,
        F: Fn(&mut C<T>, &A) + Sync + Send,
    {
        let zip = nd::Zip::from(q).and(a);
        match self.device {
            Device::Cpu => zip.for_each(f),
            Device::Parallel => zip.par_for_each(f),
        }
    }

    /// Like [`Self::apply_with`], but with two auxiliary arrays.
    ///
    /// *Panics if `a` or `b` don't have the same shape as `q`*.
    pub fn apply_with2<A, B, F>(
        &self,
        q: &mut Field<T>,
        a: &nd::Array3<A>,
        b: &nd::Array3<B>,
        f: F,
    )
    where
        A: Sync,
        B: Sync,
        F: Fn(&mut C<T>, &A, &B) + Sync + Send,
    {
        let zip = nd::Zip::from(q).and(a).and(b);
        match self.device {
            Device::Cpu => zip.for_each(f),
            Device::Parallel => zip.par_for_each(f),
        }
    }

    /// Build a new array from `a` element-wise.
    pub fn map<A, B, F>(&self, a: &nd::Array3<A>, f: F) -> nd::Array3<B>
    where
        A: Sync,
        B: Send,
        F: Fn(&A) -> B + Sync + Send,
    {
        let zip = nd::Zip::from(a);
        match self.device {
            Device::Cpu => zip.map_collect(f),
            Device::Parallel => zip.par_map_collect(f),
        }
    }

    /// Build a new array from `a` and `b` element-wise.
    ///
    /// *Panics if `a` and `b` don't have the same shape*.
    pub fn zip_map<A, B, O, F>(&self, a: &nd::Array3<A>, b: &nd::Array3<B>, f: F)
        -> nd::Array3<O>
    where
        A: Sync,
        B: Sync,
        O: Send,
        F: Fn(&A, &B) -> O + Sync + Send,
    {
        let zip = nd::Zip::from(a).and(b);
        match self.device {
            Device::Cpu => zip.map_collect(f),
            Device::Parallel => zip.par_map_collect(f),
        }
    }

    /// Sum `f` over every element of `a`.
    pub fn sum_by<A, F>(&self, a: &nd::Array3<A>, f: F) -> T
    where
        A: Sync,
        F: Fn(&A) -> T + Sync + Send,
    {
        match self.device {
            Device::Cpu => a.iter().fold(T::zero(), |acc, ak| acc + f(ak)),
            Device::Parallel => {
                a.par_iter().map(f).reduce(T::zero, |l, r| l + r)
            },
        }
    }

    /// Sum `f` over every pair of corresponding elements in `a` and `b`.
    ///
    /// *Panics if `a` and `b` don't have the same shape*.
    pub fn sum_zip<A, B, F>(&self, a: &nd::Array3<A>, b: &nd::Array3<B>, f: F)
        -> T
    where
        A: Sync,
        B: Sync,
        F: Fn(&A, &B) -> T + Sync + Send,
    {
        match self.device {
            Device::Cpu => {
                nd::Zip::from(a).and(b)
                    .fold(T::zero(), |acc, ak, bk| acc + f(ak, bk))
            },
            Device::Parallel => {
                nd::Zip::from(a).and(b)
                    .par_map_collect(f)
                    .sum()
            },
        }
    }

    /// Return `true` if every element of `q` has finite real and imaginary
    /// parts.
    pub fn all_finite(&self, q: &Field<T>) -> bool {
        let finite = |qk: &C<T>| qk.re.is_finite() && qk.im.is_finite();
        match self.device {
            Device::Cpu => q.iter().all(finite),
            Device::Parallel => q.par_iter().all(finite),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_field(grid: &SpectralGrid<f64>) -> Field<f64> {
        let mut q = grid.zeros();
        q.indexed_iter_mut()
            .for_each(|((i, j, l), qk)| {
                let a = (i * 7 + j * 3 + l) as f64;
                *qk = C::new(a.sin(), (0.5 * a).cos());
            });
        q
    }

    #[test]
    fn fft_round_trip() {
        let grid = SpectralGrid::<f64>::new([8, 6, 4], [1.0, 1.0, 1.0]).unwrap();
        let q0 = test_field(&grid);
        for device in [Device::Cpu, Device::Parallel] {
            let backend = Backend::new(device, &grid);
            let mut q = q0.clone();
            backend.fft(&mut q);
            backend.ifft(&mut q);
            nd::Zip::from(&q).and(&q0)
                .for_each(|a, b| assert!((a - b).norm() < 1e-12));
        }
    }

    #[test]
    fn fft_devices_agree() {
        let grid = SpectralGrid::<f64>::new([16, 8, 1], [2.0, 1.0, 1.0]).unwrap();
        let q0 = test_field(&grid);
        let mut qs = q0.clone();
        let mut qp = q0.clone();
        Backend::new(Device::Cpu, &grid).fft(&mut qs);
        Backend::new(Device::Parallel, &grid).fft(&mut qp);
        nd::Zip::from(&qs).and(&qp)
            .for_each(|a, b| assert!((a - b).norm() < 1e-12));
    }

    #[test]
    fn fft_of_plane_wave() {
        // a single Fourier mode transforms to a single spike of height N
        let grid = SpectralGrid::<f64>::new([16, 1, 1], [1.0, 1.0, 1.0]).unwrap();
        let backend = Backend::new(Device::Cpu, &grid);
        let kx = grid.k(0)[3];
        let mut q: Field<f64> = grid.x_mesh(0).mapv(|x| C::cis(kx * x));
        backend.fft(&mut q);
        q.indexed_iter()
            .for_each(|((i, _, _), qk)| {
                let expected = if i == 3 { 16.0 } else { 0.0 };
                assert!((qk.norm() - expected).abs() < 1e-10);
            });
    }

    #[test]
    fn reductions_agree() {
        let grid = SpectralGrid::<f64>::new([8, 8, 8], [1.0, 1.0, 1.0]).unwrap();
        let q = test_field(&grid);
        let s = Backend::new(Device::Cpu, &grid).sum_by(&q, |qk| qk.norm_sqr());
        let p
            = Backend::new(Device::Parallel, &grid).sum_by(&q, |qk| qk.norm_sqr());
        assert!((s - p).abs() < 1e-9 * s);
        let z = Backend::new(Device::Parallel, &grid)
            .sum_zip(&q, grid.x_mesh(0), |qk, x| x * qk.re);
        let zs = Backend::new(Device::Cpu, &grid)
            .sum_zip(&q, grid.x_mesh(0), |qk, x| x * qk.re);
        assert!((z - zs).abs() < 1e-9);
    }

    #[test]
    fn finiteness() {
        let grid = SpectralGrid::<f64>::new([4, 4, 1], [1.0, 1.0, 1.0]).unwrap();
        let mut q = test_field(&grid);
        let backend = Backend::new(Device::Parallel, &grid);
        assert!(backend.all_finite(&q));
        q[[1, 2, 0]] = C::new(f64::NAN, 0.0);
        assert!(!backend.all_finite(&q));
    }
}
