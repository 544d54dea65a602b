//! Execution Context
//!
//! Mutable runtime state bound to one loaded model: working buffers, thread
//! count and accelerator. Contexts are created from a [`ModelHandle`] by a
//! [`ContextFactory`] and run one input tensor at a time.
//!
//! [`ModelHandle`]: model_loader::ModelHandle

mod context;
mod onnx;
mod reference;

pub use context::{check_input, ContextFactory, DefaultContextFactory, ExecutionContext};
pub use onnx::OnnxContext;
pub use reference::ReferenceContext;

use tensor_core::ErrorKind;
use thiserror::Error;

/// Errors during inference
#[derive(Debug, Clone, Error)]
pub enum RunError {
    /// Input tensor differs from the declared input
    #[error("Invalid input shape: expected {expected}, got {actual}")]
    ShapeMismatch { expected: String, actual: String },

    /// Backend failed while executing
    #[error("Inference failed: {0}")]
    ExecutionFault(String),

    /// Context was used after `destroy`
    #[error("Execution context already destroyed")]
    Destroyed,
}

impl RunError {
    /// Map to the shared taxonomy
    pub fn kind(&self) -> ErrorKind {
        match self {
            RunError::ShapeMismatch { .. } => ErrorKind::ShapeMismatch,
            RunError::ExecutionFault(_) => ErrorKind::ExecutionFault,
            RunError::Destroyed => ErrorKind::InvalidState,
        }
    }
}
