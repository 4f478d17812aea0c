//! Persisted kernel bundles, one per bin-count resolution.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use sce_core::errors::{ErrorInfo, SceError};
use sce_core::{from_json_slice, stable_hash_string, to_canonical_json_bytes};
use sce_core::{PhysicalConstants, SchemaVersion};
use sce_grid::{CollisionKernel, KernelTensor, MassGrid};

fn io_error(code: &str, err: impl ToString, path: &Path) -> SceError {
    SceError::Io(
        ErrorInfo::new(code, err.to_string()).with_context("path", path.display().to_string()),
    )
}

/// Everything one resolution needs: constants, the kernel definition, the
/// grid, and the precomputed tensor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KernelBundle {
    /// Schema version of the bundle payload.
    pub schema_version: SchemaVersion,
    /// Physical constants the grid and tensor were built with.
    pub constants: PhysicalConstants,
    /// Continuous kernel the tensor discretizes.
    pub kernel: CollisionKernel,
    /// Mass grid at this resolution.
    pub grid: MassGrid,
    /// Precomputed kernel tensor bound to `grid`.
    pub tensor: KernelTensor,
}

impl KernelBundle {
    /// Builds a bundle by discretizing `kernel` on `grid`.
    pub fn build(
        constants: PhysicalConstants,
        grid: MassGrid,
        kernel: CollisionKernel,
    ) -> Result<Self, SceError> {
        constants.validate()?;
        let tensor = KernelTensor::discretize(&constants, &grid, &kernel)?;
        Ok(Self {
            schema_version: SchemaVersion::default(),
            constants,
            kernel,
            grid,
            tensor,
        })
    }

    /// Revalidates a deserialized bundle.
    ///
    /// The tensor's recorded grid hash must match a fresh hash of the
    /// bundled grid; a stale or edited hash is rejected here rather than
    /// surfacing later as an integration-time mismatch.
    pub fn validate(&self) -> Result<(), SceError> {
        self.constants.validate()?;
        self.kernel.validate()?;
        if self.tensor.grid_hash() != stable_hash_string(&self.grid)? {
            return Err(SceError::MalformedKernel(ErrorInfo::new(
                "grid-hash-mismatch",
                "tensor grid hash does not match the bundled grid",
            )));
        }
        self.tensor.validate(&self.grid)
    }

    /// Stable hash of the bundle contents, recorded as run provenance.
    pub fn stable_hash(&self) -> Result<String, SceError> {
        stable_hash_string(self)
    }
}

/// Canonical bundle file name for a bin count, e.g. `hall_kernel_nb42.json`.
pub fn bundle_path(dir: &Path, kernel: &CollisionKernel, num_bins: usize) -> PathBuf {
    let stem = match kernel {
        CollisionKernel::Golovin { .. } => "golovin",
        CollisionKernel::Hall => "hall",
    };
    dir.join(format!("{stem}_kernel_nb{num_bins}.json"))
}

/// Writes a bundle to disk, creating parent directories as needed.
pub fn write_bundle(path: &Path, bundle: &KernelBundle) -> Result<(), SceError> {
    bundle.validate()?;
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|err| io_error("bundle-mkdir", err, parent))?;
    }
    let bytes = to_canonical_json_bytes(bundle)?;
    fs::write(path, bytes).map_err(|err| io_error("bundle-write", err, path))
}

/// Loads and revalidates a bundle from disk.
pub fn load_bundle(path: &Path) -> Result<KernelBundle, SceError> {
    let bytes = fs::read(path).map_err(|err| io_error("bundle-read", err, path))?;
    let bundle: KernelBundle = from_json_slice(&bytes).map_err(|err| match err {
        SceError::Serde(info) => {
            SceError::Serde(info.with_context("path", path.display().to_string()))
        }
        other => other,
    })?;
    bundle.validate()?;
    Ok(bundle)
}

/// Loads the bundle for a specific bin-count resolution.
///
/// Fails with [`SceError::MissingResolution`] when no file has been
/// precomputed for `num_bins`.
pub fn load_bundle_for_resolution(
    dir: &Path,
    kernel: &CollisionKernel,
    num_bins: usize,
) -> Result<KernelBundle, SceError> {
    let path = bundle_path(dir, kernel, num_bins);
    if !path.exists() {
        return Err(SceError::MissingResolution(
            ErrorInfo::new(
                "no-bundle-for-resolution",
                format!("no kernel bundle precomputed for {num_bins} bins"),
            )
            .with_context("path", path.display().to_string())
            .with_hint("run gen-kernels to precompute this resolution"),
        ));
    }
    let bundle = load_bundle(&path)?;
    if bundle.grid.num_bins() != num_bins {
        return Err(SceError::MalformedKernel(
            ErrorInfo::new(
                "resolution-mismatch",
                format!(
                    "bundle at {} holds {} bins, expected {num_bins}",
                    path.display(),
                    bundle.grid.num_bins()
                ),
            ),
        ));
    }
    Ok(bundle)
}
