#![deny(missing_docs)]
#![doc = "Adaptive embedded Runge-Kutta-Fehlberg 4(5) integration of the \
bin-resolved collection equation, and the experiment trajectory it records."]

pub mod experiment;
pub mod rk45;

pub use experiment::Experiment;
pub use rk45::{IntegratorOpts, Rk45Integrator};
