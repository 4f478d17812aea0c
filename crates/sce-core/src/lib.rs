#![deny(missing_docs)]
#![doc = "Core types for the bin-resolved collision-coalescence engine: \
physical constants, structured errors, provenance, and canonical encoding."]

pub mod constants;
pub mod errors;
pub mod hash;
pub mod provenance;
pub mod serde;

pub use constants::PhysicalConstants;
pub use errors::{ErrorInfo, SceError};
pub use hash::{round_f64, stable_hash_string};
pub use provenance::{RunProvenance, SchemaVersion};
pub use self::serde::{from_json_slice, to_canonical_json_bytes};
