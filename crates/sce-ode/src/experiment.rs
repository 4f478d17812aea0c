//! Recorded trajectory of one integration run.

use std::sync::Arc;

use sce_core::errors::{ErrorInfo, SceError};
use sce_core::{RunProvenance, SchemaVersion};
use sce_state::{ModelState, ModelStateDescriptor};

fn experiment_error(code: &str, message: impl Into<String>) -> SceError {
    SceError::ShapeMismatch(ErrorInfo::new(code, message.into()))
}

/// The full output of one integration: the ordered `(time, state)` sequence
/// plus provenance describing which kernel files drove it.
///
/// Owns its time series; shares the descriptor with every recorded state.
/// States are never mutated after being appended.
#[derive(Debug, Clone, PartialEq)]
pub struct Experiment {
    schema_version: SchemaVersion,
    provenance: RunProvenance,
    descriptor: Arc<ModelStateDescriptor>,
    times: Vec<f64>,
    states: Vec<ModelState>,
}

impl Experiment {
    /// Assembles an experiment from a recorded trajectory.
    ///
    /// Times must start at zero and increase strictly; every state must use
    /// the provided descriptor layout.
    pub fn new(
        descriptor: Arc<ModelStateDescriptor>,
        times: Vec<f64>,
        states: Vec<ModelState>,
    ) -> Result<Self, SceError> {
        if times.len() != states.len() || times.is_empty() {
            return Err(experiment_error(
                "trajectory-length",
                format!(
                    "need equal, non-zero numbers of times and states, got {} and {}",
                    times.len(),
                    states.len()
                ),
            ));
        }
        if times[0] != 0.0 {
            return Err(experiment_error(
                "trajectory-start",
                format!("trajectories start at t = 0, got {}", times[0]),
            ));
        }
        for window in times.windows(2) {
            if !(window[1] > window[0]) {
                return Err(experiment_error(
                    "non-monotonic-times",
                    "trajectory time stamps must be strictly increasing",
                ));
            }
        }
        for state in &states {
            if state.raw().len() != descriptor.raw_len() {
                return Err(experiment_error(
                    "state-layout",
                    "every trajectory state must match the experiment descriptor",
                ));
            }
        }
        Ok(Self {
            schema_version: SchemaVersion::default(),
            provenance: RunProvenance::default(),
            descriptor,
            times,
            states,
        })
    }

    /// Attaches provenance describing the kernel inputs of the run.
    pub fn with_provenance(mut self, provenance: RunProvenance) -> Self {
        self.provenance = provenance;
        self
    }

    /// Schema version of the serialized representation.
    pub fn schema_version(&self) -> SchemaVersion {
        self.schema_version
    }

    /// Provenance metadata for the run.
    pub fn provenance(&self) -> &RunProvenance {
        &self.provenance
    }

    /// Shared descriptor of every recorded state.
    pub fn descriptor(&self) -> &Arc<ModelStateDescriptor> {
        &self.descriptor
    }

    /// Recorded simulation times in seconds, strictly increasing from zero.
    pub fn times(&self) -> &[f64] {
        &self.times
    }

    /// Recorded states, one per time stamp.
    pub fn states(&self) -> &[ModelState] {
        &self.states
    }

    /// State at the given trajectory index.
    pub fn state_at(&self, idx: usize) -> Option<&ModelState> {
        self.states.get(idx)
    }

    /// Final recorded state (the trajectory is never empty).
    pub fn final_state(&self) -> &ModelState {
        self.states.last().expect("non-empty trajectory")
    }

    /// Final recorded time in seconds.
    pub fn end_time(&self) -> f64 {
        *self.times.last().expect("non-empty trajectory")
    }

    /// Bin-integrated mass concentration at every recorded time.
    pub fn mass_series(&self) -> Vec<f64> {
        self.states.iter().map(ModelState::mass_conc).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sce_core::PhysicalConstants;
    use sce_grid::MassGrid;

    fn descriptor() -> Arc<ModelStateDescriptor> {
        let constants = PhysicalConstants::default();
        let grid = MassGrid::geometric(&constants, 1.0e-6, 1.0e-3, 8).expect("grid");
        Arc::new(ModelStateDescriptor::new(constants, grid).expect("descriptor"))
    }

    fn state(desc: &Arc<ModelStateDescriptor>, level: f64) -> ModelState {
        ModelState::from_distribution(Arc::clone(desc), &vec![level; desc.raw_len()])
            .expect("state")
    }

    #[test]
    fn non_monotonic_times_are_rejected() {
        let desc = descriptor();
        let states = vec![state(&desc, 1.0e-4), state(&desc, 1.0e-4)];
        let err = Experiment::new(desc, vec![0.0, 0.0], states).unwrap_err();
        assert_eq!(err.info().code, "non-monotonic-times");
    }

    #[test]
    fn trajectory_must_start_at_zero() {
        let desc = descriptor();
        let states = vec![state(&desc, 1.0e-4)];
        let err = Experiment::new(desc, vec![1.0], states).unwrap_err();
        assert_eq!(err.info().code, "trajectory-start");
    }

    #[test]
    fn mass_series_has_one_entry_per_time() {
        let desc = descriptor();
        let states = vec![state(&desc, 1.0e-4), state(&desc, 9.0e-5)];
        let experiment = Experiment::new(desc, vec![0.0, 1.0], states).expect("experiment");
        assert_eq!(experiment.mass_series().len(), 2);
        assert_eq!(experiment.end_time(), 1.0);
    }
}
