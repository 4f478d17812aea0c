//! Structured error types shared across the SCE crates.

use std::collections::BTreeMap;
use std::fmt::{self, Display};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Structured payload attached to every [`SceError`] variant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorInfo {
    /// Stable machine readable error code.
    pub code: String,
    /// Human readable diagnostic message.
    pub message: String,
    /// Contextual key value pairs (paths, bin counts, indices, etc.).
    #[serde(default)]
    pub context: BTreeMap<String, String>,
    /// Optional hint that may help the caller resolve the issue.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

impl ErrorInfo {
    /// Creates a new error payload with the provided code and message.
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            context: BTreeMap::new(),
            hint: None,
        }
    }

    /// Adds a context entry to the payload.
    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }

    /// Sets a human readable hint for remediation.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

/// Canonical error type for the collision-coalescence engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[serde(tag = "family", content = "detail")]
pub enum SceError {
    /// Bin boundaries or physical constants fail validation.
    #[error("malformed grid: {0}")]
    MalformedGrid(ErrorInfo),
    /// Kernel tensor entries violate their structural invariants.
    #[error("malformed kernel: {0}")]
    MalformedKernel(ErrorInfo),
    /// A distribution array does not match the descriptor layout.
    #[error("shape mismatch: {0}")]
    ShapeMismatch(ErrorInfo),
    /// A kernel tensor is bound to a different grid than the state.
    #[error("incompatible kernel: {0}")]
    IncompatibleKernel(ErrorInfo),
    /// Adaptive step-size control underflowed without meeting tolerance.
    #[error("integration failed to converge: {0}")]
    NonConvergence(ErrorInfo),
    /// No persisted kernel bundle exists for the requested bin count.
    #[error("missing resolution: {0}")]
    MissingResolution(ErrorInfo),
    /// Serialization and schema errors.
    #[error("serde error: {0}")]
    Serde(ErrorInfo),
    /// I/O errors from the persisted-file boundary.
    #[error("io error: {0}")]
    Io(ErrorInfo),
}

impl Display for ErrorInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (code: {})", self.message, self.code)?;
        if !self.context.is_empty() {
            write!(f, " | context: [")?;
            for (idx, (key, value)) in self.context.iter().enumerate() {
                if idx > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{key}={value}")?;
            }
            write!(f, "]")?;
        }
        if let Some(hint) = &self.hint {
            write!(f, " | hint: {hint}")?;
        }
        Ok(())
    }
}

impl SceError {
    /// Returns a reference to the payload describing the error.
    pub fn info(&self) -> &ErrorInfo {
        match self {
            SceError::MalformedGrid(info)
            | SceError::MalformedKernel(info)
            | SceError::ShapeMismatch(info)
            | SceError::IncompatibleKernel(info)
            | SceError::NonConvergence(info)
            | SceError::MissingResolution(info)
            | SceError::Serde(info)
            | SceError::Io(info) => info,
        }
    }
}
