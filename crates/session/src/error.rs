//! Session Error Types

use execution::RunError;
use model_loader::LoadError;
use processing::ProcessError;
use tensor_core::ErrorKind;
use thiserror::Error;

/// Errors returned by session operations
///
/// Loader, processor and context errors pass through unchanged.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Load(#[from] LoadError),

    #[error(transparent)]
    Process(#[from] ProcessError),

    #[error(transparent)]
    Run(#[from] RunError),

    /// Request parameter outside its valid domain
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// Operation not permitted in the current lifecycle state
    #[error("Invalid session state: {0}")]
    InvalidState(String),

    /// Inference exceeded its deadline
    #[error("Inference timeout after {0}ms")]
    TimedOut(u64),

    /// Blocking worker failed or is still draining
    #[error("Inference worker failed: {0}")]
    Worker(String),
}

impl SessionError {
    /// Map to the shared taxonomy
    pub fn kind(&self) -> ErrorKind {
        match self {
            SessionError::Load(e) => e.kind(),
            SessionError::Process(e) => e.kind(),
            SessionError::Run(e) => e.kind(),
            SessionError::InvalidParameter(_) => ErrorKind::InvalidParameter,
            SessionError::InvalidState(_) => ErrorKind::InvalidState,
            SessionError::TimedOut(_) => ErrorKind::TimedOut,
            SessionError::Worker(_) => ErrorKind::ExecutionFault,
        }
    }
}
