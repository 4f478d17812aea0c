//! Stable hashing helpers for grid binding and provenance.

use ::serde::Serialize;
use sha2::{Digest, Sha256};

use crate::errors::SceError;
use crate::serde::to_canonical_json_bytes;

/// Computes a stable hexadecimal hash for the provided serializable payload.
pub fn stable_hash_string<T: Serialize>(value: &T) -> Result<String, SceError> {
    let bytes = to_canonical_json_bytes(value)?;
    let digest = Sha256::digest(bytes);
    Ok(format!("{:x}", digest))
}

/// Rounds a floating point value to the canonical reporting precision.
///
/// Only diagnostic summaries are rounded; state vectors and trajectories are
/// always persisted at full precision.
pub fn round_f64(value: f64) -> f64 {
    let scaled = (value * 1e9).round();
    scaled / 1e9
}
