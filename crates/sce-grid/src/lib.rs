#![deny(missing_docs)]
#![doc = "Mass-bin grid, analytic collision kernels, and the precomputed \
kernel tensor that discretizes the stochastic collection equation."]

pub mod grid;
pub mod kernel;
pub mod tensor;

pub use grid::MassGrid;
pub use kernel::CollisionKernel;
pub use tensor::{KernelTensor, PairEntry};
