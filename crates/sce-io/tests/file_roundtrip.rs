use std::sync::Arc;

use sce_core::{PhysicalConstants, SceError};
use sce_grid::{CollisionKernel, MassGrid};
use sce_io::{
    bundle_path, load_bundle_for_resolution, provenance_for_run, read_experiment,
    write_bundle, write_experiment, KernelBundle,
};
use sce_ode::Rk45Integrator;
use sce_state::{InitialCondition, ModelState, ModelStateDescriptor};
use tempfile::TempDir;

fn bundle(num_bins: usize) -> KernelBundle {
    let constants = PhysicalConstants::default();
    let grid = MassGrid::geometric(&constants, 1.0e-6, 1.0e-3, num_bins).expect("grid");
    KernelBundle::build(constants, grid, CollisionKernel::golovin()).expect("bundle")
}

#[test]
fn kernel_bundle_roundtrips() {
    let dir = TempDir::new().expect("tempdir");
    let original = bundle(42);
    let path = bundle_path(dir.path(), &original.kernel, 42);
    write_bundle(&path, &original).expect("write");
    let loaded =
        load_bundle_for_resolution(dir.path(), &original.kernel, 42).expect("load");
    assert_eq!(original, loaded);
}

#[test]
fn missing_resolution_is_reported() {
    let dir = TempDir::new().expect("tempdir");
    let err = load_bundle_for_resolution(dir.path(), &CollisionKernel::golovin(), 84)
        .unwrap_err();
    assert!(matches!(err, SceError::MissingResolution(_)));
    assert_eq!(err.info().code, "no-bundle-for-resolution");
}

#[test]
fn corrupt_bundle_fails_to_parse() {
    let dir = TempDir::new().expect("tempdir");
    let kernel = CollisionKernel::golovin();
    let path = bundle_path(dir.path(), &kernel, 42);
    std::fs::write(&path, b"{not json").expect("write");
    let err = load_bundle_for_resolution(dir.path(), &kernel, 42).unwrap_err();
    assert!(matches!(err, SceError::Serde(_)));
}

#[test]
fn stale_grid_hash_fails_bundle_validation() {
    // Same bin count, different diameter range: the tensor's recorded grid
    // hash no longer matches the bundled grid and must be caught on load,
    // not at integration time.
    let mut bundle = bundle(42);
    let constants = PhysicalConstants::default();
    let other_grid = MassGrid::geometric(&constants, 1.0e-6, 5.0e-4, 42).expect("grid");
    bundle.grid = other_grid;
    let err = bundle.validate().unwrap_err();
    assert_eq!(err.info().code, "grid-hash-mismatch");

    let dir = TempDir::new().expect("tempdir");
    let path = bundle_path(dir.path(), &bundle.kernel, 42);
    assert!(write_bundle(&path, &bundle).is_err());
}

#[test]
fn experiment_roundtrip_is_numerically_identical() {
    let dir = TempDir::new().expect("tempdir");
    let bundle = bundle(42);
    let descriptor = Arc::new(
        ModelStateDescriptor::new(bundle.constants.clone(), bundle.grid.clone())
            .expect("descriptor"),
    );
    let init = InitialCondition {
        mass_conc: 1.0e-3,
        number_conc: 100.0e6,
        nu: 6.0,
    };
    let dsd = init.build(&bundle.constants, &bundle.grid).expect("dsd");
    let state = ModelState::from_distribution(Arc::clone(&descriptor), &dsd).expect("state");
    let integrator = Rk45Integrator::new(bundle.constants.clone(), 1.0).expect("integrator");
    let experiment = integrator
        .integrate(20.0, &state, std::slice::from_ref(&bundle.tensor))
        .expect("experiment")
        .with_provenance(provenance_for_run(
            bundle.stable_hash().expect("hash"),
            vec!["kernels/golovin_kernel_nb42.json".to_string()],
        ));

    let path = dir.path().join("experiment_nb42.json");
    write_experiment(&path, &experiment).expect("write");
    let loaded = read_experiment(&path).expect("read");

    assert_eq!(experiment.times(), loaded.times());
    assert_eq!(experiment.provenance(), loaded.provenance());
    assert_eq!(experiment.states().len(), loaded.states().len());
    for (a, b) in experiment.states().iter().zip(loaded.states()) {
        assert_eq!(a.raw(), b.raw());
    }
    assert_eq!(
        experiment.descriptor().grid(),
        loaded.descriptor().grid()
    );
    assert_eq!(
        experiment.descriptor().constants(),
        loaded.descriptor().constants()
    );
}
