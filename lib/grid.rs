//! Uniform periodic grids in real and Fourier space.
//!
//! Every field in this crate is stored as a three-axis array of shape
//! `(Nx, Ny, Nz)`; lower-dimensional problems set the trailing counts to 1.
//! The active dimensionality is computed once here as a [`Dimension`] and
//! carried by the grid, so that nothing downstream has to re-derive it from
//! raw point counts.

use ndarray as nd;
use crate::{
    Field,
    Real,
    RField,
    C,
    error::{ ConfigError, ShapeError },
    utils::{ centered_coords, fft_wavenumbers },
};

/// Number of active (non-degenerate) axes in a grid.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Dimension {
    One,
    Two,
    Three,
}

impl Dimension {
    /// Infer the dimension from grid point counts.
    ///
    /// Exactly the leading axes with more than one point are active, and
    /// every trailing axis must have exactly one point; anything else (e.g. a
    /// single-point axis between two active axes, all axes degenerate, or an
    /// empty axis) is an error.
    pub fn from_counts(n: [usize; 3]) -> Result<Self, ConfigError> {
        let err = ConfigError::BadDimension(n[0], n[1], n[2]);
        if n.contains(&0) { return Err(err); }
        match (n[0] > 1, n[1] > 1, n[2] > 1) {
            (true, false, false) => Ok(Self::One),
            (true, true, false) => Ok(Self::Two),
            (true, true, true) => Ok(Self::Three),
            _ => Err(err),
        }
    }

    /// Number of active axes.
    pub fn rank(self) -> usize {
        match self {
            Self::One => 1,
            Self::Two => 2,
            Self::Three => 3,
        }
    }

    /// Iterate over the indices of the active axes.
    pub fn axes(self) -> std::ops::Range<usize> { 0..self.rank() }

    /// Return `true` if axis `axis` is active.
    pub fn is_active(self, axis: usize) -> bool { axis < self.rank() }
}

/// Real-space coordinates and Fourier-space wavenumbers for a periodic box.
///
/// Immutable once constructed.
#[derive(Clone, Debug)]
pub struct SpectralGrid<T> {
    dim: Dimension,
    // point counts
    n: [usize; 3],
    // box lengths
    l: [T; 3],
    // grid spacings
    dx: [T; 3],
    // 1D coordinate arrays
    x: [nd::Array1<T>; 3],
    // 1D wavenumber arrays
    k: [nd::Array1<T>; 3],
    // broadcast coordinate meshes
    x_mesh: [RField<T>; 3],
    // broadcast wavenumber meshes
    k_mesh: [RField<T>; 3],
    // squared wavenumber magnitude summed over active axes
    ksq: RField<T>,
    // product of grid spacings over active axes
    dv: T,
}

// broadcast a 1D array along `axis` into a mesh of the given shape
fn broadcast_axis<T: Real>(a: &nd::Array1<T>, axis: usize, shape: [usize; 3])
    -> RField<T>
{
    RField::from_shape_fn(shape, |(i, j, l)| a[[i, j, l][axis]])
}

impl<T: Real> SpectralGrid<T> {
    /// Construct a new grid from per-axis point counts and box lengths.
    ///
    /// The box along each axis spans `[-L/2, L/2)` (up to an offset of half a
    /// grid step for odd counts), and the spacing is `L / N`. Lengths along
    /// inactive axes are kept but don't enter the cell volume.
    pub fn new(n: [usize; 3], l: [T; 3]) -> Result<Self, ConfigError> {
        let dim = Dimension::from_counts(n)?;
        for axis in dim.axes() {
            let length = l[axis];
            if !(length > T::zero() && length.is_finite()) {
                return Err(ConfigError::BadLength { axis, length: length.as_f64() });
            }
        }
        let dx: [T; 3] = std::array::from_fn(|a| l[a] / T::of(n[a] as f64));
        let x: [nd::Array1<T>; 3]
            = std::array::from_fn(|a| centered_coords(n[a], dx[a]));
        let k: [nd::Array1<T>; 3]
            = std::array::from_fn(|a| fft_wavenumbers(n[a], dx[a]));
        let x_mesh: [RField<T>; 3]
            = std::array::from_fn(|a| broadcast_axis(&x[a], a, n));
        let k_mesh: [RField<T>; 3]
            = std::array::from_fn(|a| broadcast_axis(&k[a], a, n));
        let mut ksq: RField<T> = RField::zeros(n);
        for km in k_mesh.iter().take(dim.rank()) {
            nd::Zip::from(&mut ksq).and(km)
                .for_each(|k2, &ka| { *k2 += ka * ka; });
        }
        let dv = dim.axes().map(|a| dx[a]).fold(T::one(), |acc, d| acc * d);
        Ok(Self { dim, n, l, dx, x, k, x_mesh, k_mesh, ksq, dv })
    }

    /// Get the active dimensionality.
    pub fn dim(&self) -> Dimension { self.dim }

    /// Get the per-axis point counts.
    pub fn shape(&self) -> [usize; 3] { self.n }

    /// Get the total number of grid points.
    #[allow(clippy::len_without_is_empty)]
    pub fn len(&self) -> usize { self.n.iter().product() }

    /// Get the per-axis box lengths.
    pub fn lengths(&self) -> [T; 3] { self.l }

    /// Get the per-axis grid spacings.
    pub fn spacing(&self) -> [T; 3] { self.dx }

    /// Get the volume element used for integrals over the active axes.
    pub fn cell_volume(&self) -> T { self.dv }

    /// Get a reference to the 1D coordinate array along `axis`.
    ///
    /// *Panics if `axis > 2`*.
    pub fn x(&self, axis: usize) -> &nd::Array1<T> { &self.x[axis] }

    /// Get a reference to the 1D wavenumber array along `axis`.
    ///
    /// *Panics if `axis > 2`*.
    pub fn k(&self, axis: usize) -> &nd::Array1<T> { &self.k[axis] }

    /// Get a reference to the full coordinate mesh for `axis`.
    ///
    /// *Panics if `axis > 2`*.
    pub fn x_mesh(&self, axis: usize) -> &RField<T> { &self.x_mesh[axis] }

    /// Get a reference to the full wavenumber mesh for `axis`.
    ///
    /// *Panics if `axis > 2`*.
    pub fn k_mesh(&self, axis: usize) -> &RField<T> { &self.k_mesh[axis] }

    /// Get a reference to the mesh of squared wavenumber magnitudes.
    pub fn ksq(&self) -> &RField<T> { &self.ksq }

    /// Return the mesh of squared distances from the origin, `|x|²`.
    pub fn rsq(&self) -> RField<T> {
        let mut rsq: RField<T> = RField::zeros(self.n);
        for xm in self.x_mesh.iter().take(self.dim.rank()) {
            nd::Zip::from(&mut rsq).and(xm)
                .for_each(|r2, &xa| { *r2 += xa * xa; });
        }
        rsq
    }

    /// Return a zero-valued complex field shaped like the grid.
    pub fn zeros(&self) -> Field<T> {
        Field::from_elem(self.n, C::new(T::zero(), T::zero()))
    }

    /// Check that an array matches the grid's shape.
    pub fn check_shape(&self, what: &'static str, shape: &[usize])
        -> Result<(), ShapeError>
    {
        ShapeError::check(what, self.n, shape)
    }
}
