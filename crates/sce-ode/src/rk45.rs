//! Adaptive embedded Runge-Kutta-Fehlberg 4(5) integration.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use sce_core::errors::{ErrorInfo, SceError};
use sce_core::PhysicalConstants;
use sce_grid::KernelTensor;
use sce_state::{ModelState, ModelStateDescriptor};

use crate::experiment::Experiment;

fn integrate_error(code: &str, message: impl Into<String>) -> SceError {
    SceError::NonConvergence(ErrorInfo::new(code, message.into()))
}

fn kernel_mismatch(code: &str, message: impl Into<String>) -> SceError {
    SceError::IncompatibleKernel(ErrorInfo::new(code, message.into()))
}

fn default_rel_tol() -> f64 {
    1.0e-6
}

fn default_abs_tol() -> f64 {
    1.0e-12
}

fn default_min_step_fraction() -> f64 {
    1.0e-8
}

fn default_max_rejects() -> usize {
    40
}

fn default_negativity_floor() -> f64 {
    1.0e-9
}

/// Step-size control options for the integrator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntegratorOpts {
    /// Relative local error tolerance.
    #[serde(default = "default_rel_tol")]
    pub rel_tol: f64,
    /// Absolute local error tolerance on the raw (scaled) state.
    #[serde(default = "default_abs_tol")]
    pub abs_tol: f64,
    /// Sub-steps smaller than this fraction of the nominal step are treated
    /// as step-size underflow.
    #[serde(default = "default_min_step_fraction")]
    pub min_step_fraction: f64,
    /// Bounded retry budget for rejected sub-steps within one output step.
    #[serde(default = "default_max_rejects")]
    pub max_rejects_per_step: usize,
    /// Distribution values below `-negativity_floor` reject the sub-step.
    #[serde(default = "default_negativity_floor")]
    pub negativity_floor: f64,
}

impl Default for IntegratorOpts {
    fn default() -> Self {
        Self {
            rel_tol: default_rel_tol(),
            abs_tol: default_abs_tol(),
            min_step_fraction: default_min_step_fraction(),
            max_rejects_per_step: default_max_rejects(),
            negativity_floor: default_negativity_floor(),
        }
    }
}

// Classical Fehlberg 4(5) tableau.
const A2: [f64; 1] = [1.0 / 4.0];
const A3: [f64; 2] = [3.0 / 32.0, 9.0 / 32.0];
const A4: [f64; 3] = [1932.0 / 2197.0, -7200.0 / 2197.0, 7296.0 / 2197.0];
const A5: [f64; 4] = [439.0 / 216.0, -8.0, 3680.0 / 513.0, -845.0 / 4104.0];
const A6: [f64; 5] = [
    -8.0 / 27.0,
    2.0,
    -3544.0 / 2565.0,
    1859.0 / 4104.0,
    -11.0 / 40.0,
];
const B4: [f64; 6] = [
    25.0 / 216.0,
    0.0,
    1408.0 / 2565.0,
    2197.0 / 4104.0,
    -1.0 / 5.0,
    0.0,
];
const B5: [f64; 6] = [
    16.0 / 135.0,
    0.0,
    6656.0 / 12825.0,
    28561.0 / 56430.0,
    -9.0 / 50.0,
    2.0 / 55.0,
];

/// Adaptive RKF45 integrator for the bin-resolved collection equation.
///
/// Advances `d(raw)/dt = sum_tensors apply(dsd(raw))` with a fixed nominal
/// output step and internal error-controlled sub-stepping. Each accepted
/// output boundary is recorded as a fresh [`ModelState`].
#[derive(Debug, Clone)]
pub struct Rk45Integrator {
    constants: PhysicalConstants,
    dt: f64,
    opts: IntegratorOpts,
}

impl Rk45Integrator {
    /// Creates an integrator with a nominal output step in seconds.
    pub fn new(constants: PhysicalConstants, dt: f64) -> Result<Self, SceError> {
        constants.validate()?;
        if !(dt.is_finite() && dt > 0.0) {
            return Err(integrate_error(
                "invalid-dt",
                format!("nominal time step must be finite and positive, got {dt}"),
            ));
        }
        Ok(Self {
            constants,
            dt,
            opts: IntegratorOpts::default(),
        })
    }

    /// Replaces the step-size control options.
    pub fn with_opts(mut self, opts: IntegratorOpts) -> Self {
        self.opts = opts;
        self
    }

    /// Nominal output step in seconds.
    pub fn dt(&self) -> f64 {
        self.dt
    }

    /// Integrates from t = 0 to `end_time` seconds.
    ///
    /// The returned experiment records the initial state and one state per
    /// nominal output boundary; the final boundary lands exactly on
    /// `end_time`. A failed integration yields no experiment.
    pub fn integrate(
        &self,
        end_time: f64,
        initial: &ModelState,
        tensors: &[KernelTensor],
    ) -> Result<Experiment, SceError> {
        if !(end_time.is_finite() && end_time > 0.0) {
            return Err(integrate_error(
                "invalid-end-time",
                format!("end time must be finite and positive, got {end_time}"),
            ));
        }
        let descriptor = Arc::clone(initial.descriptor());
        self.check_tensors(&descriptor, tensors)?;

        let n = descriptor.raw_len();
        let scale = descriptor.packing_scale();
        let time_scale = self.constants.time_scale;
        let mut stepper = Stepper {
            descriptor: &descriptor,
            tensors,
            opts: &self.opts,
            // The raw vector stores dsd / scale and steps run in t /
            // time_scale, so the physical rate maps to
            // d(raw)/dtau = R * time_scale / scale.
            rate_factor: time_scale / scale,
            work: Workspace::new(n),
        };

        let mut times = vec![0.0];
        let mut states = vec![initial.clone()];
        let mut y: Vec<f64> = initial.raw().to_vec();
        let dt_scaled = self.dt / time_scale;
        let mut h = dt_scaled;
        let num_boundaries = (end_time / self.dt).ceil() as usize;
        for boundary in 1..=num_boundaries {
            let t_out = (boundary as f64 * self.dt).min(end_time);
            let tau_start = times[boundary - 1] / time_scale;
            let tau_end = t_out / time_scale;
            h = self.advance(&mut stepper, &mut y, tau_start, tau_end, h, dt_scaled)?;
            times.push(t_out);
            states.push(ModelState::new(
                Arc::clone(&descriptor),
                y.clone().into_boxed_slice(),
            )?);
        }
        Experiment::new(descriptor, times, states)
    }

    /// Advances `y` across one output interval with adaptive sub-stepping.
    ///
    /// Returns the step size to seed the next interval with. Local recovery
    /// is bounded: the reject budget and the minimum step fraction both
    /// terminate in [`SceError::NonConvergence`].
    fn advance(
        &self,
        stepper: &mut Stepper<'_>,
        y: &mut Vec<f64>,
        tau_start: f64,
        tau_end: f64,
        mut h: f64,
        h_nominal: f64,
    ) -> Result<f64, SceError> {
        let mut tau = tau_start;
        let mut rejects = 0usize;
        loop {
            let remaining = tau_end - tau;
            if remaining <= h_nominal * 1.0e-12 {
                return Ok(h);
            }
            let h_try = h.min(remaining);
            match stepper.try_step(y, h_try)? {
                StepOutcome::Accepted { error_norm } => {
                    tau += h_try;
                    rejects = 0;
                    h = (h_try * grow_factor(error_norm)).min(h_nominal);
                }
                StepOutcome::Rejected { shrink } => {
                    rejects += 1;
                    if rejects > self.opts.max_rejects_per_step {
                        return Err(integrate_error(
                            "reject-budget-exhausted",
                            format!(
                                "{rejects} consecutive rejected sub-steps at tau = {tau}"
                            ),
                        ));
                    }
                    h = h_try * shrink;
                    if h < self.opts.min_step_fraction * h_nominal {
                        return Err(SceError::NonConvergence(
                            ErrorInfo::new(
                                "step-underflow",
                                format!("step size underflowed to {h} at tau = {tau}"),
                            )
                            .with_hint(
                                "the dynamics may be too stiff for the configured tolerances",
                            ),
                        ));
                    }
                }
            }
        }
    }

    fn check_tensors(
        &self,
        descriptor: &Arc<ModelStateDescriptor>,
        tensors: &[KernelTensor],
    ) -> Result<(), SceError> {
        if tensors.is_empty() {
            return Err(kernel_mismatch(
                "no-tensors",
                "at least one kernel tensor is required",
            ));
        }
        if descriptor.constants() != &self.constants {
            return Err(kernel_mismatch(
                "constants-mismatch",
                "the state descriptor uses different physical constants",
            ));
        }
        for (idx, tensor) in tensors.iter().enumerate() {
            if tensor.grid_hash() != descriptor.grid_hash() {
                return Err(SceError::IncompatibleKernel(
                    ErrorInfo::new(
                        "grid-mismatch",
                        "kernel tensor is bound to a different grid than the state",
                    )
                    .with_context("tensor", idx.to_string()),
                ));
            }
        }
        Ok(())
    }
}

/// Step growth bound after an accepted step.
fn grow_factor(error_norm: f64) -> f64 {
    if error_norm <= f64::MIN_POSITIVE {
        return 4.0;
    }
    (0.84 * error_norm.powf(-0.25)).clamp(0.1, 4.0)
}

/// Step shrink bound after a rejected step.
fn shrink_factor(error_norm: f64) -> f64 {
    (0.84 * error_norm.powf(-0.25)).clamp(0.1, 0.9)
}

enum StepOutcome {
    Accepted { error_norm: f64 },
    Rejected { shrink: f64 },
}

struct Workspace {
    stage: Vec<f64>,
    k: [Vec<f64>; 6],
    y5: Vec<f64>,
    dsd: Vec<f64>,
    rate: Vec<f64>,
}

impl Workspace {
    fn new(n: usize) -> Self {
        Self {
            stage: vec![0.0; n],
            k: std::array::from_fn(|_| vec![0.0; n]),
            y5: vec![0.0; n],
            dsd: vec![0.0; n],
            rate: vec![0.0; n],
        }
    }
}

struct Stepper<'a> {
    descriptor: &'a Arc<ModelStateDescriptor>,
    tensors: &'a [KernelTensor],
    opts: &'a IntegratorOpts,
    rate_factor: f64,
    work: Workspace,
}

impl Stepper<'_> {
    /// Evaluates the right-hand side at `raw`, writing into `k[stage_idx]`.
    fn eval_rhs(&mut self, raw: &[f64], stage_idx: usize) -> Result<(), SceError> {
        self.descriptor.unpack_into(raw, &mut self.work.dsd)?;
        self.work.rate.iter_mut().for_each(|value| *value = 0.0);
        for tensor in self.tensors {
            tensor.apply_into(&self.work.dsd, &mut self.work.rate)?;
        }
        for (out, rate) in self.work.k[stage_idx].iter_mut().zip(&self.work.rate) {
            *out = rate * self.rate_factor;
        }
        Ok(())
    }

    /// Attempts one RKF45 sub-step of size `h` from `y`, advancing `y` in
    /// place on acceptance (local extrapolation with the 5th-order result).
    fn try_step(&mut self, y: &mut Vec<f64>, h: f64) -> Result<StepOutcome, SceError> {
        let n = y.len();
        self.eval_rhs(y, 0)?;
        let coefficient_rows: [&[f64]; 5] = [&A2, &A3, &A4, &A5, &A6];
        for (stage, row) in coefficient_rows.iter().enumerate() {
            for idx in 0..n {
                let mut increment = 0.0;
                for (prev, &a) in row.iter().enumerate() {
                    increment += a * self.work.k[prev][idx];
                }
                self.work.stage[idx] = y[idx] + h * increment;
            }
            let stage_values = std::mem::take(&mut self.work.stage);
            self.eval_rhs(&stage_values, stage + 1)?;
            self.work.stage = stage_values;
        }

        let mut error_sq = 0.0;
        let mut min_density = f64::INFINITY;
        let scale = self.descriptor.packing_scale();
        for idx in 0..n {
            let mut acc4 = 0.0;
            let mut acc5 = 0.0;
            for stage in 0..6 {
                acc4 += B4[stage] * self.work.k[stage][idx];
                acc5 += B5[stage] * self.work.k[stage][idx];
            }
            let y4 = y[idx] + h * acc4;
            let y5 = y[idx] + h * acc5;
            self.work.y5[idx] = y5;
            let tolerance =
                self.opts.abs_tol + self.opts.rel_tol * y[idx].abs().max(y5.abs());
            let scaled_error = (y5 - y4) / tolerance;
            error_sq += scaled_error * scaled_error;
            min_density = min_density.min(y5 * scale);
        }
        let error_norm = (error_sq / n as f64).sqrt();

        // A distribution dipping below the floor signals instability; shrink
        // and retry instead of accepting an unphysical state.
        if min_density < -self.opts.negativity_floor {
            return Ok(StepOutcome::Rejected { shrink: 0.5 });
        }
        if error_norm > 1.0 {
            return Ok(StepOutcome::Rejected {
                shrink: shrink_factor(error_norm),
            });
        }
        y.copy_from_slice(&self.work.y5);
        Ok(StepOutcome::Accepted { error_norm })
    }
}
