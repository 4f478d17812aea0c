//! Analytic collision-coalescence kernels.

use std::f64::consts::PI;

use serde::{Deserialize, Serialize};

use sce_core::errors::{ErrorInfo, SceError};
use sce_core::PhysicalConstants;

fn kernel_error(code: &str, message: impl Into<String>) -> SceError {
    SceError::MalformedKernel(ErrorInfo::new(code, message.into()))
}

/// Continuous pairwise collision kernel, evaluated in SI units.
///
/// The kernel definition is persisted inside every kernel bundle so a tensor
/// file records which physics it discretizes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CollisionKernel {
    /// Sum-of-masses kernel `K = b (x_i + x_j)`, the classic analytic
    /// reference case.
    Golovin {
        /// Kernel constant in m^3 kg^-1 s^-1.
        b: f64,
    },
    /// Gravitational collection with a Long-type collection efficiency.
    Hall,
}

impl CollisionKernel {
    /// Golovin kernel with the standard constant (1.5e3 cm^3 g^-1 s^-1
    /// converted to SI).
    pub fn golovin() -> Self {
        CollisionKernel::Golovin { b: 1.5 }
    }

    /// Validates kernel parameters.
    pub fn validate(&self) -> Result<(), SceError> {
        match self {
            CollisionKernel::Golovin { b } => {
                if !(b.is_finite() && *b > 0.0) {
                    return Err(kernel_error(
                        "nonpositive-golovin-b",
                        format!("Golovin constant must be finite and positive, got {b}"),
                    ));
                }
                Ok(())
            }
            CollisionKernel::Hall => Ok(()),
        }
    }

    /// Collision rate coefficient for droplet masses `x_i`, `x_j` (kg),
    /// in m^3/s.
    pub fn rate(&self, constants: &PhysicalConstants, x_i: f64, x_j: f64) -> f64 {
        match self {
            CollisionKernel::Golovin { b } => b * (x_i + x_j),
            CollisionKernel::Hall => gravitational_rate(constants, x_i, x_j),
        }
    }
}

/// Geometric sweep-out rate with Long's collection efficiency.
fn gravitational_rate(constants: &PhysicalConstants, x_i: f64, x_j: f64) -> f64 {
    let r_i = 0.5 * constants.diameter_of_mass(x_i);
    let r_j = 0.5 * constants.diameter_of_mass(x_j);
    let (r_small, r_large) = if r_i <= r_j { (r_i, r_j) } else { (r_j, r_i) };
    let dv = (terminal_velocity(r_i) - terminal_velocity(r_j)).abs();
    let section = PI * (r_i + r_j) * (r_i + r_j);
    collection_efficiency(r_small, r_large) * section * dv
}

/// Two-regime terminal velocity for a droplet of radius `r` (m).
///
/// Stokes drag below 40 um, linear regime above. The branches of this
/// standard piecewise fit do not meet at the crossover; the jump is part
/// of the fit, not smoothed over.
fn terminal_velocity(r: f64) -> f64 {
    const STOKES: f64 = 1.19e8; // m^-1 s^-1
    const LINEAR: f64 = 8.0e3; // s^-1
    const CROSSOVER: f64 = 40.0e-6; // m
    if r < CROSSOVER {
        STOKES * r * r
    } else {
        LINEAR * r
    }
}

/// Long (1974) collection-efficiency approximation in SI units.
fn collection_efficiency(r_small: f64, r_large: f64) -> f64 {
    const UNIT_RADIUS: f64 = 50.0e-6; // m, above which E = 1
    const QUADRATIC: f64 = 4.5e8; // m^-2
    const CUTOFF: f64 = 3.0e-6; // m, small droplets barely collect
    if r_large >= UNIT_RADIUS {
        return 1.0;
    }
    if r_small <= CUTOFF {
        return 0.0;
    }
    let efficiency = QUADRATIC * r_large * r_large * (1.0 - CUTOFF / r_small);
    efficiency.clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn golovin_rate_is_symmetric_and_linear() {
        let constants = PhysicalConstants::default();
        let kernel = CollisionKernel::golovin();
        let a = kernel.rate(&constants, 1.0e-12, 3.0e-12);
        let b = kernel.rate(&constants, 3.0e-12, 1.0e-12);
        assert_eq!(a, b);
        assert!((a - 1.5 * 4.0e-12).abs() < 1.0e-24);
    }

    #[test]
    fn hall_rate_is_symmetric_and_nonnegative() {
        let constants = PhysicalConstants::default();
        let kernel = CollisionKernel::Hall;
        let x_small = constants.mass_of_diameter(20.0e-6);
        let x_large = constants.mass_of_diameter(200.0e-6);
        let a = kernel.rate(&constants, x_small, x_large);
        let b = kernel.rate(&constants, x_large, x_small);
        assert_eq!(a, b);
        assert!(a > 0.0);
        // Equal-size droplets fall at the same speed and cannot collide.
        assert_eq!(kernel.rate(&constants, x_small, x_small), 0.0);
    }

    #[test]
    fn collection_efficiency_saturates_for_large_collectors() {
        assert_eq!(collection_efficiency(20.0e-6, 60.0e-6), 1.0);
        assert_eq!(collection_efficiency(1.0e-6, 30.0e-6), 0.0);
        let mid = collection_efficiency(10.0e-6, 30.0e-6);
        assert!(mid > 0.0 && mid <= 1.0);
    }

    #[test]
    fn invalid_golovin_constant_is_rejected() {
        let err = CollisionKernel::Golovin { b: 0.0 }.validate().unwrap_err();
        assert_eq!(err.info().code, "nonpositive-golovin-b");
    }
}
