//! Processing Error Types

use tensor_core::{ErrorKind, TensorError};
use thiserror::Error;

/// Errors during pre- or postprocessing
#[derive(Debug, Clone, Error)]
pub enum ProcessError {
    /// Input image file does not exist
    #[error("Image not found: {0}")]
    NotFound(String),

    /// Image bytes could not be decoded
    #[error("Image decode failed: {0}")]
    Decode(String),

    /// Caller parameter outside its valid domain
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// Model produced a tensor that disagrees with its declaration
    #[error("Unexpected model output: {0}")]
    UnexpectedOutput(String),

    #[error(transparent)]
    Tensor(#[from] TensorError),
}

impl ProcessError {
    /// Map to the shared taxonomy
    pub fn kind(&self) -> ErrorKind {
        match self {
            ProcessError::NotFound(_) => ErrorKind::NotFound,
            ProcessError::Decode(_) | ProcessError::InvalidParameter(_) => {
                ErrorKind::InvalidParameter
            }
            ProcessError::UnexpectedOutput(_) => ErrorKind::ExecutionFault,
            ProcessError::Tensor(e) => e.kind(),
        }
    }
}
