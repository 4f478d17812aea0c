#![deny(missing_docs)]
#![doc = "Packed model-state abstraction: the descriptor bijection between \
semantic distributions and flat raw vectors, immutable state snapshots, and \
gamma-distributed initial conditions."]

pub mod descriptor;
pub mod init;
pub mod state;

pub use descriptor::ModelStateDescriptor;
pub use init::{gamma_dist_d, lambda_for_moments, ln_gamma, InitialCondition};
pub use state::ModelState;
