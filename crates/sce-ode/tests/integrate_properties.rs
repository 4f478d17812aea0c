use std::sync::Arc;

use sce_core::{PhysicalConstants, SceError};
use sce_grid::{CollisionKernel, KernelTensor, MassGrid};
use sce_ode::{IntegratorOpts, Rk45Integrator};
use sce_state::{InitialCondition, ModelState, ModelStateDescriptor};

const MASS_CONC: f64 = 1.0e-3; // kg/m^3
const NUMBER_CONC: f64 = 100.0e6; // m^-3
const NU: f64 = 6.0;

fn scenario(num_bins: usize) -> (Arc<ModelStateDescriptor>, ModelState, KernelTensor) {
    let constants = PhysicalConstants::default();
    let grid = MassGrid::geometric(&constants, 1.0e-6, 1.0e-3, num_bins).expect("grid");
    let tensor = KernelTensor::discretize(&constants, &grid, &CollisionKernel::golovin())
        .expect("tensor");
    let descriptor =
        Arc::new(ModelStateDescriptor::new(constants.clone(), grid.clone()).expect("descriptor"));
    let init = InitialCondition {
        mass_conc: MASS_CONC,
        number_conc: NUMBER_CONC,
        nu: NU,
    };
    let dsd = init.build(&constants, &grid).expect("initial condition");
    let state = ModelState::from_distribution(Arc::clone(&descriptor), &dsd).expect("state");
    (descriptor, state, tensor)
}

#[test]
fn trajectory_times_are_monotone_and_end_exactly() {
    let (_, state, tensor) = scenario(42);
    let integrator =
        Rk45Integrator::new(PhysicalConstants::default(), 1.0).expect("integrator");
    let experiment = integrator
        .integrate(10.5, &state, std::slice::from_ref(&tensor))
        .expect("experiment");
    let times = experiment.times();
    assert_eq!(times[0], 0.0);
    assert!(times.windows(2).all(|pair| pair[1] > pair[0]));
    assert_eq!(experiment.end_time(), 10.5);
    assert_eq!(times.len(), 12);
}

#[test]
fn collisions_conserve_mass_and_nonnegativity() {
    let (_, state, tensor) = scenario(42);
    let integrator =
        Rk45Integrator::new(PhysicalConstants::default(), 1.0).expect("integrator");
    let experiment = integrator
        .integrate(60.0, &state, std::slice::from_ref(&tensor))
        .expect("experiment");
    let initial_mass = state.mass_conc();
    for recorded in experiment.states() {
        let mass = recorded.mass_conc();
        assert!((mass - initial_mass).abs() / initial_mass < 1.0e-8);
        assert!(recorded.dsd().iter().all(|&value| value >= -1.0e-9));
    }
    // Coalescence strictly reduces droplet count.
    assert!(experiment.final_state().number_conc() < state.number_conc());
}

#[test]
fn golovin_number_decay_matches_analytic_rate() {
    // For K = b (x + x') with mass concentration M held constant, the
    // number concentration obeys dN/dt = -b M N exactly, independent of
    // the distribution shape. This pins the magnitude of the dynamics,
    // not just its direction.
    let (_, state, tensor) = scenario(42);
    let integrator =
        Rk45Integrator::new(PhysicalConstants::default(), 1.0).expect("integrator");
    let experiment = integrator
        .integrate(60.0, &state, std::slice::from_ref(&tensor))
        .expect("experiment");
    let expected = (-1.5 * MASS_CONC * 60.0).exp();
    let observed = experiment.final_state().number_conc() / state.number_conc();
    assert!(
        (observed - expected).abs() < 0.03,
        "number decay {observed} differs from analytic {expected}"
    );
}

#[test]
fn mass_error_shrinks_with_resolution() {
    let integrator =
        Rk45Integrator::new(PhysicalConstants::default(), 1.0).expect("integrator");
    let mut errors = Vec::new();
    for num_bins in [42, 84] {
        let (_, state, tensor) = scenario(num_bins);
        let experiment = integrator
            .integrate(600.0, &state, std::slice::from_ref(&tensor))
            .expect("experiment");
        let initial_mass = state.mass_conc();
        let final_mass = experiment.final_state().mass_conc();
        errors.push((final_mass - initial_mass).abs() / initial_mass);
    }
    assert!(errors[0] < 1.0e-8);
    assert!(errors[1] <= errors[0] + 1.0e-10);
}

#[test]
fn single_bin_zero_tensor_is_inert() {
    let constants = PhysicalConstants::default();
    let grid = MassGrid::from_ln_boundaries(&[-25.0, -24.0]).expect("grid");
    let tensor = KernelTensor::zero(&grid).expect("tensor");
    let descriptor =
        Arc::new(ModelStateDescriptor::new(constants.clone(), grid).expect("descriptor"));
    let state = ModelState::from_distribution(Arc::clone(&descriptor), &[4.2e-4]).expect("state");
    let integrator = Rk45Integrator::new(constants, 1.0).expect("integrator");
    let experiment = integrator
        .integrate(100.0, &state, std::slice::from_ref(&tensor))
        .expect("experiment");
    for recorded in experiment.states() {
        assert_eq!(recorded.dsd(), vec![4.2e-4]);
    }
}

#[test]
fn two_tensors_sum_linearly() {
    let (_, state, tensor) = scenario(42);
    let constants = PhysicalConstants::default();
    let half = CollisionKernel::Golovin { b: 0.75 };
    let grid = state.descriptor().grid().clone();
    let half_tensor = KernelTensor::discretize(&constants, &grid, &half).expect("tensor");
    let integrator = Rk45Integrator::new(constants, 1.0).expect("integrator");
    let full = integrator
        .integrate(30.0, &state, std::slice::from_ref(&tensor))
        .expect("full run");
    let split = integrator
        .integrate(30.0, &state, &[half_tensor.clone(), half_tensor])
        .expect("split run");
    let full_final = full.final_state().dsd();
    let split_final = split.final_state().dsd();
    // Step-size decisions may diverge between the two runs, so agreement is
    // only expected at the integration tolerance, not bit-for-bit.
    for (a, b) in full_final.iter().zip(&split_final) {
        assert!((a - b).abs() <= 1.0e-4 * a.abs().max(1.0e-9));
    }
}

#[test]
fn mismatched_tensor_grid_is_fatal() {
    let (_, state, _) = scenario(42);
    let constants = PhysicalConstants::default();
    let other_grid = MassGrid::geometric(&constants, 1.0e-6, 1.0e-3, 84).expect("grid");
    let other_tensor =
        KernelTensor::discretize(&constants, &other_grid, &CollisionKernel::golovin())
            .expect("tensor");
    let integrator = Rk45Integrator::new(constants, 1.0).expect("integrator");
    let err = integrator
        .integrate(10.0, &state, std::slice::from_ref(&other_tensor))
        .unwrap_err();
    assert!(matches!(err, SceError::IncompatibleKernel(_)));
    assert_eq!(err.info().code, "grid-mismatch");
}

#[test]
fn empty_tensor_list_is_fatal() {
    let (_, state, _) = scenario(42);
    let integrator =
        Rk45Integrator::new(PhysicalConstants::default(), 1.0).expect("integrator");
    let err = integrator.integrate(10.0, &state, &[]).unwrap_err();
    assert_eq!(err.info().code, "no-tensors");
}

#[test]
fn nonpositive_end_time_is_rejected() {
    let (_, state, tensor) = scenario(42);
    let integrator =
        Rk45Integrator::new(PhysicalConstants::default(), 1.0).expect("integrator");
    let err = integrator
        .integrate(0.0, &state, std::slice::from_ref(&tensor))
        .unwrap_err();
    assert_eq!(err.info().code, "invalid-end-time");
}

#[test]
fn unreachable_tolerance_surfaces_step_underflow() {
    let (_, state, tensor) = scenario(42);
    let opts = IntegratorOpts {
        rel_tol: 1.0e-300,
        abs_tol: 1.0e-300,
        min_step_fraction: 0.5,
        ..IntegratorOpts::default()
    };
    let integrator = Rk45Integrator::new(PhysicalConstants::default(), 1.0)
        .expect("integrator")
        .with_opts(opts);
    let err = integrator
        .integrate(10.0, &state, std::slice::from_ref(&tensor))
        .unwrap_err();
    assert!(matches!(err, SceError::NonConvergence(_)));
    assert_eq!(err.info().code, "step-underflow");
}
