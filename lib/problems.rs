//! Built-in problem definitions.
//!
//! Each problem pairs a separable Gaussian initial state with a static
//! harmonic trap:
//!
//! | Name       | Initial state                              | Trap `V`                  |
//! |:-----------|:-------------------------------------------|:--------------------------|
//! | `harmonic` | `π^(-d/4) exp(-|x|²/2)`                    | `½|x|²`                   |
//! | `gstate2d` | `π^(-1/2) exp(-(x² + y²)/2)`               | `½(x² + y²)`              |
//! | `gstate3d` | `π^(-3/4) exp(-(x² + y² + z²)/2)`          | `½(x² + y² + 16z²)`       |
//! | `evolve2d` | `2^(1/4) (2π)^(-1/2) exp(-(x² + 2y²)/4)`   | `½(x² + 4y²)`             |
//! | `evolve3d` | `(8/π)^(3/4) exp(-2(x² + 2y² + 4z²))`      | `½(x² + 4y² + 16z²)`      |
//!
//! `harmonic` adapts to whatever dimension the grid has; the others are meant
//! for grids of the dimension in their name.

use clap::ValueEnum;
use crate::{
    Real,
    state::{ Gaussian, HarmonicTrap, Initializer, Potential },
};

/// A named initial state and potential.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum Problem {
    #[default]
    #[value(name = "harmonic")]
    Harmonic,
    #[value(name = "gstate2d")]
    GState2d,
    #[value(name = "gstate3d")]
    GState3d,
    #[value(name = "evolve2d")]
    Evolve2d,
    #[value(name = "evolve3d")]
    Evolve3d,
}

impl Problem {
    /// Get the initial state.
    pub fn gaussian(self) -> Gaussian {
        let coeffs
            = match self {
                Self::Harmonic | Self::GState2d | Self::GState3d => [0.5; 3],
                Self::Evolve2d => [0.25, 0.5, 0.5],
                Self::Evolve3d => [2.0, 4.0, 8.0],
            };
        Gaussian { coeffs, center: [0.0; 3] }
    }

    /// Get the trap.
    pub fn trap(self) -> HarmonicTrap {
        let omega
            = match self {
                Self::Harmonic | Self::GState2d => [1.0; 3],
                Self::GState3d => [1.0, 1.0, 4.0],
                Self::Evolve2d | Self::Evolve3d => [1.0, 2.0, 4.0],
            };
        HarmonicTrap { omega }
    }

    /// Get the initial state as a boxed capability.
    pub fn initializer<T: Real>(self) -> Box<dyn Initializer<T>> {
        Box::new(self.gaussian())
    }

    /// Get the trap as a boxed capability.
    pub fn potential<T: Real>(self) -> Box<dyn Potential<T>> {
        Box::new(self.trap())
    }
}

#[cfg(test)]
mod tests {
    use std::f64::consts::PI;
    use super::*;
    use crate::grid::{ Dimension, SpectralGrid };

    #[test]
    fn parse_names() {
        assert_eq!(Problem::from_str("gstate2d", false).unwrap(), Problem::GState2d);
        assert_eq!(Problem::from_str("Evolve3D", true).unwrap(), Problem::Evolve3d);
        assert!(Problem::from_str("Evolve3D", false).is_err());
        assert!(Problem::from_str("vortex", true).is_err());
        let names: Vec<String>
            = Problem::value_variants().iter()
            .filter_map(|p| p.to_possible_value())
            .map(|v| v.get_name().to_string())
            .collect();
        assert_eq!(names, ["harmonic", "gstate2d", "gstate3d", "evolve2d", "evolve3d"]);
    }

    #[test]
    fn amplitudes() {
        let a = Problem::Evolve2d.gaussian().amplitude(Dimension::Two);
        assert!((a - 2.0_f64.powf(0.25) / (2.0 * PI).sqrt()).abs() < 1e-14);
        let a = Problem::Evolve3d.gaussian().amplitude(Dimension::Three);
        assert!((a - (8.0 / PI).powf(0.75)).abs() < 1e-12);
        let a = Problem::GState3d.gaussian().amplitude(Dimension::Three);
        assert!((a - PI.powf(-0.75)).abs() < 1e-14);
    }

    #[test]
    fn traps() {
        let grid
            = SpectralGrid::<f64>::new([8, 8, 8], [8.0, 8.0, 8.0]).unwrap();
        let V = Problem::Evolve3d.potential::<f64>().potential(&grid, 0.0);
        let (x, y, z) = (grid.x(0)[5], grid.x(1)[6], grid.x(2)[7]);
        let expected = 0.5 * (x * x + 4.0 * y * y + 16.0 * z * z);
        assert!((V[[5, 6, 7]] - expected).abs() < 1e-12);
    }
}
