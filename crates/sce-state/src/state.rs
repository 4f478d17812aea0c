//! Immutable snapshot of a raw state vector and its descriptor.

use std::sync::Arc;

use sce_core::errors::{ErrorInfo, SceError};

use crate::descriptor::ModelStateDescriptor;

/// One immutable snapshot of the model state.
///
/// Every integrator step produces a fresh `ModelState`; earlier states live
/// on as the experiment trajectory. The raw vector is owned exclusively by
/// the state, the descriptor is shared.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelState {
    descriptor: Arc<ModelStateDescriptor>,
    raw: Box<[f64]>,
}

impl ModelState {
    /// Wraps a raw vector produced for the given descriptor.
    pub fn new(descriptor: Arc<ModelStateDescriptor>, raw: Box<[f64]>) -> Result<Self, SceError> {
        if raw.len() != descriptor.raw_len() {
            return Err(SceError::ShapeMismatch(
                ErrorInfo::new(
                    "raw-length",
                    format!(
                        "raw vector has length {} but the descriptor needs {}",
                        raw.len(),
                        descriptor.raw_len()
                    ),
                ),
            ));
        }
        Ok(Self { descriptor, raw })
    }

    /// Packs a semantic distribution into a fresh state.
    pub fn from_distribution(
        descriptor: Arc<ModelStateDescriptor>,
        dsd: &[f64],
    ) -> Result<Self, SceError> {
        let raw = descriptor.construct_raw(dsd)?;
        Ok(Self { descriptor, raw })
    }

    /// Shared descriptor defining the raw layout.
    pub fn descriptor(&self) -> &Arc<ModelStateDescriptor> {
        &self.descriptor
    }

    /// Read-only raw state vector.
    pub fn raw(&self) -> &[f64] {
        &self.raw
    }

    /// Recovers the mass-density distribution.
    pub fn dsd(&self) -> Vec<f64> {
        self.descriptor
            .unpack(&self.raw)
            .expect("state raw length is checked at construction")
    }

    /// Bin-integrated mass concentration (kg/m^3).
    pub fn mass_conc(&self) -> f64 {
        let widths = self.descriptor.grid().bin_widths();
        self.dsd()
            .iter()
            .zip(widths)
            .map(|(density, width)| density * width)
            .sum()
    }

    /// Bin-integrated number concentration (m^-3).
    pub fn number_conc(&self) -> f64 {
        let grid = self.descriptor.grid();
        let centers = grid.centers();
        let widths = grid.bin_widths();
        self.dsd()
            .iter()
            .zip(widths.iter().zip(centers))
            .map(|(density, (width, center))| density * width / center)
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sce_core::PhysicalConstants;
    use sce_grid::MassGrid;

    fn descriptor() -> Arc<ModelStateDescriptor> {
        let constants = PhysicalConstants::default();
        let grid = MassGrid::geometric(&constants, 1.0e-6, 1.0e-3, 42).expect("grid");
        Arc::new(ModelStateDescriptor::new(constants, grid).expect("descriptor"))
    }

    #[test]
    fn state_recovers_distribution_exactly() {
        let desc = descriptor();
        let dsd: Vec<f64> = (0..desc.raw_len()).map(|idx| 2.0e-5 * (idx + 1) as f64).collect();
        let state = ModelState::from_distribution(Arc::clone(&desc), &dsd).expect("state");
        assert_eq!(state.dsd(), dsd);
    }

    #[test]
    fn mass_conc_matches_quadrature() {
        let desc = descriptor();
        let dsd = vec![3.0e-4; desc.raw_len()];
        let state = ModelState::from_distribution(Arc::clone(&desc), &dsd).expect("state");
        let expected: f64 = desc
            .grid()
            .bin_widths()
            .iter()
            .map(|width| 3.0e-4 * width)
            .sum();
        assert!((state.mass_conc() - expected).abs() < 1.0e-15);
    }

    #[test]
    fn mismatched_raw_length_is_rejected() {
        let desc = descriptor();
        let err = ModelState::new(desc, vec![0.0; 7].into_boxed_slice()).unwrap_err();
        assert!(matches!(err, SceError::ShapeMismatch(_)));
    }
}
