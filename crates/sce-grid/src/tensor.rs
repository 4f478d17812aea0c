//! Grid-discretized collision kernel tensor.

use serde::{Deserialize, Serialize};

use sce_core::errors::{ErrorInfo, SceError};
use sce_core::{stable_hash_string, PhysicalConstants};

use crate::grid::MassGrid;
use crate::kernel::CollisionKernel;

fn tensor_error(code: &str, message: impl Into<String>) -> SceError {
    SceError::MalformedKernel(ErrorInfo::new(code, message.into()))
}

fn tensor_error_at(code: &str, message: impl Into<String>, pair_idx: usize) -> SceError {
    SceError::MalformedKernel(
        ErrorInfo::new(code, message.into()).with_context("pair", pair_idx.to_string()),
    )
}

/// Relative tolerance for the per-pair mass-conservation check.
const CONSERVATION_TOL: f64 = 1.0e-12;

/// Precomputed interaction coefficients for one unordered bin pair (i <= j).
///
/// With `r = rate * dsd[i] * dsd[j]` the pair contributes
/// `-loss_i * r` to bin `i`, `-loss_j * r` to bin `j`, and
/// `+deposit[t] * r` to bin `dest_start + t`. All coefficients carry the
/// bin-width normalization so `apply` is a single multiply-accumulate pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PairEntry {
    /// First source bin.
    pub i: u32,
    /// Second source bin (`i <= j`).
    pub j: u32,
    /// Number-collision coefficient per product of source densities.
    pub rate: f64,
    /// Mass-density loss factor for bin `i`.
    pub loss_i: f64,
    /// Mass-density loss factor for bin `j`.
    pub loss_j: f64,
    /// First destination bin receiving coalesced mass.
    pub dest_start: u32,
    /// Mass-density gain factors for consecutive destination bins.
    pub deposit: Vec<f64>,
}

/// Discretized collision kernel bound to one [`MassGrid`].
///
/// Immutable after construction. The tensor records the stable hash of its
/// grid so the integrator can reject tensors built for a different
/// resolution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KernelTensor {
    num_bins: usize,
    grid_hash: String,
    pairs: Vec<PairEntry>,
}

impl KernelTensor {
    /// Discretizes a continuous kernel onto the grid.
    ///
    /// Scheme: bins interact through their geometric center masses; the
    /// coalesced mass `x_i + x_j` lands between two adjacent destination
    /// bins and is split linearly in ln-mass position, so the redistributed
    /// mass equals the removed mass exactly. Mass beyond the last boundary
    /// is deposited in the last bin (closed upper boundary).
    pub fn discretize(
        constants: &PhysicalConstants,
        grid: &MassGrid,
        kernel: &CollisionKernel,
    ) -> Result<Self, SceError> {
        kernel.validate()?;
        let n = grid.num_bins();
        let centers = grid.centers();
        let widths = grid.bin_widths();
        let mut pairs = Vec::with_capacity(n * (n + 1) / 2);
        for i in 0..n {
            for j in i..n {
                let x_i = centers[i];
                let x_j = centers[j];
                let k_rate = kernel.rate(constants, x_i, x_j);
                if k_rate == 0.0 {
                    continue;
                }
                // Number collision rate per unit volume is
                // K n_i n_j = K / (x_i x_j) * m_i m_j; the self-interaction
                // pair counts each collision once.
                let symmetry = if i == j { 0.5 } else { 1.0 };
                let rate = symmetry * k_rate / (x_i * x_j) * widths[i] * widths[j];
                let (dest_start, deposit) =
                    destination_band(grid, x_i + x_j, widths)?;
                pairs.push(PairEntry {
                    i: i as u32,
                    j: j as u32,
                    rate,
                    loss_i: x_i / widths[i],
                    loss_j: x_j / widths[j],
                    dest_start,
                    deposit,
                });
            }
        }
        let tensor = Self {
            num_bins: n,
            grid_hash: stable_hash_string(grid)?,
            pairs,
        };
        tensor.validate(grid)?;
        Ok(tensor)
    }

    /// All-zero tensor bound to the grid (no collisions).
    pub fn zero(grid: &MassGrid) -> Result<Self, SceError> {
        Ok(Self {
            num_bins: grid.num_bins(),
            grid_hash: stable_hash_string(grid)?,
            pairs: Vec::new(),
        })
    }

    /// Number of bins the tensor was built for.
    pub fn num_bins(&self) -> usize {
        self.num_bins
    }

    /// Stable hash of the grid this tensor is bound to.
    pub fn grid_hash(&self) -> &str {
        &self.grid_hash
    }

    /// Interaction entries, one per unordered source-bin pair.
    pub fn pairs(&self) -> &[PairEntry] {
        &self.pairs
    }

    /// Checks the structural invariants of a (possibly deserialized) tensor.
    ///
    /// Non-negative coefficients, destination bands inside the grid, and the
    /// per-pair conservation identity: deposited mass equals removed mass.
    pub fn validate(&self, grid: &MassGrid) -> Result<(), SceError> {
        if grid.num_bins() != self.num_bins {
            return Err(tensor_error(
                "bin-count-mismatch",
                format!(
                    "tensor is sized for {} bins but the grid has {}",
                    self.num_bins,
                    grid.num_bins()
                ),
            ));
        }
        let widths = grid.bin_widths();
        for (idx, pair) in self.pairs.iter().enumerate() {
            let i = pair.i as usize;
            let j = pair.j as usize;
            if i > j || j >= self.num_bins {
                return Err(tensor_error_at(
                    "pair-out-of-range",
                    "pair indices must satisfy i <= j < n",
                    idx,
                ));
            }
            let band_end = pair.dest_start as usize + pair.deposit.len();
            if pair.deposit.is_empty() || band_end > self.num_bins {
                return Err(tensor_error_at(
                    "band-out-of-range",
                    "destination band must be non-empty and inside the grid",
                    idx,
                ));
            }
            let coefficients = [pair.rate, pair.loss_i, pair.loss_j];
            if coefficients.iter().chain(&pair.deposit).any(|c| !(c.is_finite() && *c >= 0.0)) {
                return Err(tensor_error_at(
                    "negative-coefficient",
                    "tensor coefficients must be finite and non-negative",
                    idx,
                ));
            }
            let removed = pair.loss_i * widths[i] + pair.loss_j * widths[j];
            let deposited: f64 = pair
                .deposit
                .iter()
                .enumerate()
                .map(|(t, &d)| d * widths[pair.dest_start as usize + t])
                .sum();
            if (removed - deposited).abs() > CONSERVATION_TOL * removed.max(f64::MIN_POSITIVE) {
                return Err(tensor_error_at(
                    "non-conservative-pair",
                    format!("pair removes {removed} but deposits {deposited}"),
                    idx,
                ));
            }
        }
        Ok(())
    }

    /// Accumulates the collision-driven time derivative of `dsd` into `out`.
    ///
    /// `out` is not zeroed: contributions from multiple tensors sum
    /// linearly, as one experiment may combine several physical processes.
    /// This double sum over bin pairs is the per-step hot loop.
    pub fn apply_into(&self, dsd: &[f64], out: &mut [f64]) -> Result<(), SceError> {
        if dsd.len() != self.num_bins || out.len() != self.num_bins {
            return Err(SceError::ShapeMismatch(
                ErrorInfo::new(
                    "distribution-length",
                    format!(
                        "tensor expects {} bins, got dsd={} out={}",
                        self.num_bins,
                        dsd.len(),
                        out.len()
                    ),
                ),
            ));
        }
        for pair in &self.pairs {
            let i = pair.i as usize;
            let j = pair.j as usize;
            let r = pair.rate * dsd[i] * dsd[j];
            if r == 0.0 {
                continue;
            }
            out[i] -= pair.loss_i * r;
            out[j] -= pair.loss_j * r;
            let k0 = pair.dest_start as usize;
            for (t, &gain) in pair.deposit.iter().enumerate() {
                out[k0 + t] += gain * r;
            }
        }
        Ok(())
    }

    /// Convenience wrapper allocating a fresh rate vector.
    pub fn apply(&self, dsd: &[f64]) -> Result<Vec<f64>, SceError> {
        let mut out = vec![0.0; self.num_bins];
        self.apply_into(dsd, &mut out)?;
        Ok(out)
    }
}

/// Splits the coalesced mass across the two bins straddling it.
fn destination_band(
    grid: &MassGrid,
    x_sum: f64,
    widths: &[f64],
) -> Result<(u32, Vec<f64>), SceError> {
    let n = grid.num_bins();
    let ln_sum = x_sum.ln();
    let last_bound = grid.boundaries()[n];
    if ln_sum >= last_bound {
        // Closed upper boundary: overflow mass stays in the last bin.
        return Ok((n as u32 - 1, vec![x_sum / widths[n - 1]]));
    }
    let k = grid.locate(ln_sum).ok_or_else(|| {
        tensor_error(
            "destination-below-grid",
            format!("coalesced mass {x_sum} falls below the grid"),
        )
    })?;
    let (lower, _) = grid.bin_bounds(k).expect("located bin");
    let fraction = (ln_sum - lower) / widths[k];
    if k + 1 < n {
        Ok((
            k as u32,
            vec![
                x_sum * (1.0 - fraction) / widths[k],
                x_sum * fraction / widths[k + 1],
            ],
        ))
    } else {
        Ok((k as u32, vec![x_sum / widths[k]]))
    }
}
