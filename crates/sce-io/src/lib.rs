#![deny(missing_docs)]
#![doc = "Persisted-file boundary: kernel bundles keyed by bin-count \
resolution, and experiment files satisfying the round-trip contract."]

pub mod experiment_file;
pub mod kernel_file;

pub use experiment_file::{
    provenance_for_run, read_experiment, write_experiment, ExperimentFile,
};
pub use kernel_file::{
    bundle_path, load_bundle, load_bundle_for_resolution, write_bundle, KernelBundle,
};
