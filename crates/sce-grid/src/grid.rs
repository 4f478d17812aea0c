//! Finite partition of droplet mass space into logarithmic bins.

use serde::{Deserialize, Serialize};

use sce_core::errors::{ErrorInfo, SceError};
use sce_core::PhysicalConstants;

fn grid_error(code: &str, message: impl Into<String>) -> SceError {
    SceError::MalformedGrid(ErrorInfo::new(code, message.into()))
}

fn grid_error_at(code: &str, message: impl Into<String>, idx: usize) -> SceError {
    SceError::MalformedGrid(
        ErrorInfo::new(code, message.into()).with_context("index", idx.to_string()),
    )
}

/// Serialized form of a [`MassGrid`]: the boundary list alone.
///
/// Widths and centers are derived, so persisting only the boundaries keeps
/// the on-disk schema minimal and forces revalidation on every load.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MassGridRepr {
    /// Natural-log mass boundaries (mass in kg), strictly increasing.
    pub lx_bounds: Vec<f64>,
}

/// Immutable logarithmic mass grid.
///
/// Bin `i` covers `[lx_bounds[i], lx_bounds[i + 1])` in ln-mass space.
/// Distributions over the grid are mass concentration densities per unit
/// ln mass, so the bin-integrated mass concentration is
/// `dot(dsd, bin_widths)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "MassGridRepr", into = "MassGridRepr")]
pub struct MassGrid {
    lx_bounds: Box<[f64]>,
    widths: Box<[f64]>,
    centers: Box<[f64]>,
}

impl MassGrid {
    /// Builds a grid from natural-log mass boundaries.
    pub fn from_ln_boundaries(lx_bounds: &[f64]) -> Result<Self, SceError> {
        if lx_bounds.len() < 2 {
            return Err(grid_error(
                "too-few-boundaries",
                format!("a grid needs at least 2 boundaries, got {}", lx_bounds.len()),
            ));
        }
        for (idx, &value) in lx_bounds.iter().enumerate() {
            if !value.is_finite() {
                return Err(grid_error_at(
                    "nonfinite-boundary",
                    "grid boundary is not finite",
                    idx,
                ));
            }
        }
        for idx in 1..lx_bounds.len() {
            if lx_bounds[idx] <= lx_bounds[idx - 1] {
                return Err(grid_error_at(
                    "non-monotonic-boundaries",
                    "grid boundaries must be strictly increasing",
                    idx,
                ));
            }
        }
        let widths: Box<[f64]> = lx_bounds
            .windows(2)
            .map(|pair| pair[1] - pair[0])
            .collect();
        let centers: Box<[f64]> = lx_bounds
            .windows(2)
            .map(|pair| (0.5 * (pair[0] + pair[1])).exp())
            .collect();
        Ok(Self {
            lx_bounds: lx_bounds.into(),
            widths,
            centers,
        })
    }

    /// Builds a grid from physical mass boundaries in kg.
    pub fn from_boundaries(bounds: &[f64]) -> Result<Self, SceError> {
        for (idx, &mass) in bounds.iter().enumerate() {
            if !(mass.is_finite() && mass > 0.0) {
                return Err(grid_error_at(
                    "nonpositive-boundary",
                    "mass boundaries must be finite and positive",
                    idx,
                ));
            }
        }
        let lx: Vec<f64> = bounds.iter().map(|mass| mass.ln()).collect();
        Self::from_ln_boundaries(&lx)
    }

    /// Builds the geometric grid used by the convergence series.
    ///
    /// The diameter range `[d_min, d_max]` is converted to masses and split
    /// into `num_bins` bins of equal ln-mass width; doubling `num_bins`
    /// halves every bin, which is exactly the refinement the convergence
    /// experiments sweep over.
    pub fn geometric(
        constants: &PhysicalConstants,
        d_min: f64,
        d_max: f64,
        num_bins: usize,
    ) -> Result<Self, SceError> {
        if num_bins == 0 {
            return Err(grid_error("zero-bins", "a geometric grid needs at least one bin"));
        }
        if !(d_min.is_finite() && d_max.is_finite() && d_min > 0.0 && d_max > d_min) {
            return Err(grid_error(
                "bad-diameter-range",
                format!("invalid diameter range [{d_min}, {d_max}]"),
            ));
        }
        let lx_min = constants.mass_of_diameter(d_min).ln();
        let lx_max = constants.mass_of_diameter(d_max).ln();
        let step = (lx_max - lx_min) / num_bins as f64;
        let lx: Vec<f64> = (0..=num_bins)
            .map(|idx| lx_min + step * idx as f64)
            .collect();
        Self::from_ln_boundaries(&lx)
    }

    /// Number of bins in the grid.
    pub fn num_bins(&self) -> usize {
        self.widths.len()
    }

    /// Per-bin widths in ln-mass space, all strictly positive.
    pub fn bin_widths(&self) -> &[f64] {
        &self.widths
    }

    /// Natural-log mass boundaries, strictly increasing.
    pub fn boundaries(&self) -> &[f64] {
        &self.lx_bounds
    }

    /// Geometric center mass of each bin (kg).
    pub fn centers(&self) -> &[f64] {
        &self.centers
    }

    /// Boundaries `(lower, upper)` of bin `i` in ln-mass space.
    pub fn bin_bounds(&self, idx: usize) -> Option<(f64, f64)> {
        if idx < self.num_bins() {
            Some((self.lx_bounds[idx], self.lx_bounds[idx + 1]))
        } else {
            None
        }
    }

    /// Returns the bin owning the given ln mass, or `None` when out of range.
    ///
    /// The upper boundary of the last bin is closed so that the grid covers
    /// the full represented range.
    pub fn locate(&self, ln_mass: f64) -> Option<usize> {
        let first = *self.lx_bounds.first().expect("validated grid");
        let last = *self.lx_bounds.last().expect("validated grid");
        if !(ln_mass >= first && ln_mass <= last) {
            return None;
        }
        if ln_mass == last {
            return Some(self.num_bins() - 1);
        }
        match self
            .lx_bounds
            .binary_search_by(|bound| bound.partial_cmp(&ln_mass).expect("finite boundaries"))
        {
            Ok(idx) => Some(idx.min(self.num_bins() - 1)),
            Err(idx) => Some(idx - 1),
        }
    }

    /// Total ln-mass range represented by the grid.
    pub fn ln_range(&self) -> f64 {
        self.lx_bounds[self.lx_bounds.len() - 1] - self.lx_bounds[0]
    }
}

impl TryFrom<MassGridRepr> for MassGrid {
    type Error = SceError;

    fn try_from(repr: MassGridRepr) -> Result<Self, Self::Error> {
        MassGrid::from_ln_boundaries(&repr.lx_bounds)
    }
}

impl From<MassGrid> for MassGridRepr {
    fn from(grid: MassGrid) -> Self {
        MassGridRepr {
            lx_bounds: grid.lx_bounds.into_vec(),
        }
    }
}
