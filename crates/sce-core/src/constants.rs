//! Physical constants and unit-scaling conventions.

use std::f64::consts::PI;

use serde::{Deserialize, Serialize};

use crate::errors::{ErrorInfo, SceError};

/// Immutable physical scalars shared by every component of one run.
///
/// All values are SI. The engine never reads ambient state; a reference to
/// one `PhysicalConstants` instance is threaded into the grid, the state
/// descriptor, and the integrator at construction time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhysicalConstants {
    /// Density of liquid water (kg/m^3).
    pub rho_water: f64,
    /// Density of air (kg/m^3).
    pub rho_air: f64,
    /// Reference droplet diameter defining the nondimensional mass unit (m).
    pub std_diameter: f64,
    /// Mass concentration scale used to nondimensionalize state vectors
    /// (kg/m^3).
    pub mass_conc_scale: f64,
    /// Time scale used to nondimensionalize rates (s).
    pub time_scale: f64,
}

impl PhysicalConstants {
    /// Creates a validated constants record.
    pub fn new(
        rho_water: f64,
        rho_air: f64,
        std_diameter: f64,
        mass_conc_scale: f64,
        time_scale: f64,
    ) -> Result<Self, SceError> {
        let constants = Self {
            rho_water,
            rho_air,
            std_diameter,
            mass_conc_scale,
            time_scale,
        };
        constants.validate()?;
        Ok(constants)
    }

    /// Checks that every scalar is finite and strictly positive.
    ///
    /// Deserialized records must be revalidated through this method before
    /// use; serde alone accepts any floating point payload.
    pub fn validate(&self) -> Result<(), SceError> {
        let fields = [
            ("rho_water", self.rho_water),
            ("rho_air", self.rho_air),
            ("std_diameter", self.std_diameter),
            ("mass_conc_scale", self.mass_conc_scale),
            ("time_scale", self.time_scale),
        ];
        for (name, value) in fields {
            if !value.is_finite() || value <= 0.0 {
                return Err(SceError::MalformedGrid(
                    ErrorInfo::new(
                        "constants-nonpositive",
                        format!("physical constant {name} must be finite and positive"),
                    )
                    .with_context(name, value.to_string()),
                ));
            }
        }
        Ok(())
    }

    /// Mass of a droplet at the reference diameter (kg).
    pub fn std_mass(&self) -> f64 {
        self.rho_water * PI / 6.0 * self.std_diameter.powi(3)
    }

    /// Power-of-two packing scale nearest to `mass_conc_scale`.
    ///
    /// Dividing and re-multiplying by a power of two is exact in IEEE 754,
    /// which keeps the descriptor's pack/unpack mapping bit-for-bit
    /// invertible.
    pub fn packing_scale(&self) -> f64 {
        let exponent = self.mass_conc_scale.log2().round() as i32;
        (exponent as f64).exp2()
    }

    /// Converts a droplet mass (kg) to its equivalent sphere diameter (m).
    pub fn diameter_of_mass(&self, mass: f64) -> f64 {
        (6.0 * mass / (PI * self.rho_water)).cbrt()
    }

    /// Converts a droplet diameter (m) to its mass (kg).
    pub fn mass_of_diameter(&self, diameter: f64) -> f64 {
        self.rho_water * PI / 6.0 * diameter.powi(3)
    }
}

impl Default for PhysicalConstants {
    /// Warm-rain reference values used by the convergence experiments.
    fn default() -> Self {
        Self {
            rho_water: 1000.0,
            rho_air: 1.2,
            std_diameter: 1.0e-4,
            mass_conc_scale: 1.0e-3,
            time_scale: 1.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_constants_validate() {
        PhysicalConstants::default().validate().expect("valid");
    }

    #[test]
    fn nonpositive_density_is_rejected() {
        let err = PhysicalConstants::new(-1.0, 1.2, 1.0e-4, 1.0e-3, 1.0).unwrap_err();
        assert_eq!(err.info().code, "constants-nonpositive");
    }

    #[test]
    fn packing_scale_is_a_power_of_two() {
        let constants = PhysicalConstants::default();
        let scale = constants.packing_scale();
        assert_eq!(scale, 2.0f64.powi(scale.log2().round() as i32));
    }

    #[test]
    fn diameter_mass_conversions_invert() {
        let constants = PhysicalConstants::default();
        let mass = constants.mass_of_diameter(2.0e-5);
        let diameter = constants.diameter_of_mass(mass);
        assert!((diameter - 2.0e-5).abs() < 1.0e-18);
    }
}
