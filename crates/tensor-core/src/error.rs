//! Error taxonomy

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Category of a runtime failure, shared by every component so callers can
/// branch on what went wrong without matching crate-specific error enums.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    /// Artifact or input file does not exist or is unreadable
    NotFound,
    /// Artifact header, schema encoding or payload is malformed
    CorruptArtifact,
    /// Declared tensors use shapes or types the runtime cannot handle
    UnsupportedSchema,
    /// Caller supplied a parameter outside its valid domain
    InvalidParameter,
    /// Input tensor does not match the model's declared input
    ShapeMismatch,
    /// Inference failed inside the execution backend
    ExecutionFault,
    /// Inference exceeded its deadline
    TimedOut,
    /// Operation not permitted in the session's current lifecycle state
    InvalidState,
}

impl ErrorKind {
    /// Get string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::NotFound => "not_found",
            ErrorKind::CorruptArtifact => "corrupt_artifact",
            ErrorKind::UnsupportedSchema => "unsupported_schema",
            ErrorKind::InvalidParameter => "invalid_parameter",
            ErrorKind::ShapeMismatch => "shape_mismatch",
            ErrorKind::ExecutionFault => "execution_fault",
            ErrorKind::TimedOut => "timed_out",
            ErrorKind::InvalidState => "invalid_state",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors constructing or accessing tensors
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TensorError {
    /// Buffer length disagrees with the shape's element count
    #[error("Buffer holds {actual} elements but shape {shape} needs {expected}")]
    BufferSizeMismatch {
        shape: String,
        expected: usize,
        actual: usize,
    },

    /// Typed access with the wrong element type
    #[error("Tensor holds {actual} elements, requested {requested}")]
    DTypeMismatch {
        requested: &'static str,
        actual: &'static str,
    },

    /// Shape cannot describe an image tensor
    #[error("Shape {0} is not an image tensor")]
    NotAnImage(String),
}

impl TensorError {
    /// Map to the shared taxonomy
    pub fn kind(&self) -> ErrorKind {
        match self {
            TensorError::BufferSizeMismatch { .. } | TensorError::DTypeMismatch { .. } => {
                ErrorKind::ShapeMismatch
            }
            TensorError::NotAnImage(_) => ErrorKind::UnsupportedSchema,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_serializes_by_variant_name() {
        let json = serde_json::to_string(&ErrorKind::ShapeMismatch).unwrap();
        assert_eq!(json, "\"ShapeMismatch\"");
        assert_eq!(ErrorKind::TimedOut.to_string(), "timed_out");
    }
}
