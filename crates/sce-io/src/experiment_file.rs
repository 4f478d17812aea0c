//! Persisted experiment trajectories.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use sce_core::errors::{ErrorInfo, SceError};
use sce_core::{from_json_slice, to_canonical_json_bytes};
use sce_core::{PhysicalConstants, RunProvenance, SchemaVersion};
use sce_grid::MassGrid;
use sce_ode::Experiment;
use sce_state::{ModelState, ModelStateDescriptor};

fn io_error(code: &str, err: impl ToString, path: &Path) -> SceError {
    SceError::Io(
        ErrorInfo::new(code, err.to_string()).with_context("path", path.display().to_string()),
    )
}

/// On-disk form of an [`Experiment`].
///
/// Embeds the constants and grid so an experiment is reconstructible from
/// the file alone; the descriptor is rebuilt on load.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperimentFile {
    /// Schema version of the payload.
    pub schema_version: SchemaVersion,
    /// Provenance of the run (kernel files, input hash, timestamps).
    pub provenance: RunProvenance,
    /// Physical constants of the run.
    pub constants: PhysicalConstants,
    /// Grid of the run.
    pub grid: MassGrid,
    /// Recorded times in seconds.
    pub times: Vec<f64>,
    /// Raw state vectors, one per recorded time.
    pub raw_trajectory: Vec<Vec<f64>>,
}

impl ExperimentFile {
    /// Captures an experiment into its serializable form.
    pub fn from_experiment(experiment: &Experiment) -> Self {
        let descriptor = experiment.descriptor();
        Self {
            schema_version: experiment.schema_version(),
            provenance: experiment.provenance().clone(),
            constants: descriptor.constants().clone(),
            grid: descriptor.grid().clone(),
            times: experiment.times().to_vec(),
            raw_trajectory: experiment
                .states()
                .iter()
                .map(|state| state.raw().to_vec())
                .collect(),
        }
    }

    /// Rebuilds the experiment, revalidating the trajectory invariants.
    pub fn into_experiment(self) -> Result<Experiment, SceError> {
        let descriptor = Arc::new(ModelStateDescriptor::new(self.constants, self.grid)?);
        let states = self
            .raw_trajectory
            .into_iter()
            .map(|raw| ModelState::new(Arc::clone(&descriptor), raw.into_boxed_slice()))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Experiment::new(descriptor, self.times, states)?.with_provenance(self.provenance))
    }
}

/// Fresh provenance record for a run driven by the given kernel files.
pub fn provenance_for_run(
    input_hash: String,
    kernel_files: Vec<String>,
) -> RunProvenance {
    let mut tool_versions = BTreeMap::new();
    tool_versions.insert(
        env!("CARGO_PKG_NAME").to_string(),
        env!("CARGO_PKG_VERSION").to_string(),
    );
    RunProvenance {
        input_hash,
        kernel_files,
        created_at: Utc::now().to_rfc3339(),
        tool_versions,
    }
}

/// Writes an experiment to disk, creating parent directories as needed.
pub fn write_experiment(path: &Path, experiment: &Experiment) -> Result<(), SceError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|err| io_error("experiment-mkdir", err, parent))?;
    }
    let payload = ExperimentFile::from_experiment(experiment);
    let bytes = to_canonical_json_bytes(&payload)?;
    fs::write(path, bytes).map_err(|err| io_error("experiment-write", err, path))
}

/// Reads an experiment back from disk.
pub fn read_experiment(path: &Path) -> Result<Experiment, SceError> {
    let bytes = fs::read(path).map_err(|err| io_error("experiment-read", err, path))?;
    let payload: ExperimentFile = from_json_slice(&bytes).map_err(|err| match err {
        SceError::Serde(info) => {
            SceError::Serde(info.with_context("path", path.display().to_string()))
        }
        other => other,
    })?;
    payload.into_experiment()
}
