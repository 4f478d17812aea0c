//! Layout of the raw state vector for a (constants, grid) pair.

use sce_core::errors::{ErrorInfo, SceError};
use sce_core::{stable_hash_string, PhysicalConstants};
use sce_grid::MassGrid;

fn shape_error(code: &str, message: impl Into<String>) -> SceError {
    SceError::ShapeMismatch(ErrorInfo::new(code, message.into()))
}

/// Bijection between a semantic droplet size distribution and the flat raw
/// vector the integrator manipulates.
///
/// The raw layout is the per-bin mass-density distribution divided by the
/// power-of-two packing scale, so `unpack(construct_raw(dsd))` reproduces
/// `dsd` bit for bit. The descriptor is immutable and shared (`Arc`) by
/// every state of one run.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelStateDescriptor {
    constants: PhysicalConstants,
    grid: MassGrid,
    grid_hash: String,
    packing_scale: f64,
}

impl ModelStateDescriptor {
    /// Builds the descriptor for one (constants, grid) pair.
    pub fn new(constants: PhysicalConstants, grid: MassGrid) -> Result<Self, SceError> {
        constants.validate()?;
        let grid_hash = stable_hash_string(&grid)?;
        let packing_scale = constants.packing_scale();
        Ok(Self {
            constants,
            grid,
            grid_hash,
            packing_scale,
        })
    }

    /// Physical constants the descriptor was built with.
    pub fn constants(&self) -> &PhysicalConstants {
        &self.constants
    }

    /// Grid the descriptor was built with.
    pub fn grid(&self) -> &MassGrid {
        &self.grid
    }

    /// Stable hash of the grid, used to bind kernel tensors to states.
    pub fn grid_hash(&self) -> &str {
        &self.grid_hash
    }

    /// Power-of-two scale dividing distributions in raw form.
    pub fn packing_scale(&self) -> f64 {
        self.packing_scale
    }

    /// Length of the raw state vector.
    pub fn raw_len(&self) -> usize {
        self.grid.num_bins()
    }

    /// Packs a mass-density distribution into a raw state vector.
    ///
    /// Rejects distributions of the wrong length and physically invalid
    /// (negative or non-finite) bin values; the forward mapping is only
    /// defined on valid distributions.
    pub fn construct_raw(&self, dsd: &[f64]) -> Result<Box<[f64]>, SceError> {
        if dsd.len() != self.raw_len() {
            return Err(shape_error(
                "distribution-length",
                format!(
                    "distribution has {} bins but the grid has {}",
                    dsd.len(),
                    self.raw_len()
                ),
            ));
        }
        for (idx, &value) in dsd.iter().enumerate() {
            if !value.is_finite() || value < 0.0 {
                return Err(SceError::ShapeMismatch(
                    ErrorInfo::new(
                        "negative-density",
                        "distribution values must be finite and non-negative",
                    )
                    .with_context("bin", idx.to_string()),
                ));
            }
        }
        Ok(dsd.iter().map(|value| value / self.packing_scale).collect())
    }

    /// Recovers the mass-density distribution from a raw vector.
    ///
    /// Exact left-inverse of [`construct_raw`](Self::construct_raw): the
    /// packing scale is a power of two, so the division and multiplication
    /// cancel without rounding.
    pub fn unpack(&self, raw: &[f64]) -> Result<Vec<f64>, SceError> {
        if raw.len() != self.raw_len() {
            return Err(shape_error(
                "raw-length",
                format!(
                    "raw vector has length {} but the layout needs {}",
                    raw.len(),
                    self.raw_len()
                ),
            ));
        }
        Ok(raw.iter().map(|value| value * self.packing_scale).collect())
    }

    /// Unpacks a raw vector into a caller-provided buffer.
    pub fn unpack_into(&self, raw: &[f64], dsd: &mut [f64]) -> Result<(), SceError> {
        if raw.len() != self.raw_len() || dsd.len() != self.raw_len() {
            return Err(shape_error(
                "raw-length",
                format!(
                    "expected buffers of length {}, got raw={} dsd={}",
                    self.raw_len(),
                    raw.len(),
                    dsd.len()
                ),
            ));
        }
        for (out, value) in dsd.iter_mut().zip(raw) {
            *out = value * self.packing_scale;
        }
        Ok(())
    }
}
