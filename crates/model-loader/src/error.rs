//! Loader Error Types

use tensor_core::ErrorKind;
use thiserror::Error;

/// Errors that can occur while loading a model artifact
#[derive(Debug, Clone, Error)]
pub enum LoadError {
    /// Artifact path does not resolve to a readable artifact
    #[error("Model artifact not found: {0}")]
    NotFound(String),

    /// Header, schema encoding or payload is malformed
    #[error("Corrupt model artifact: {0}")]
    CorruptArtifact(String),

    /// Declared tensors are absent or use unsupported shapes/types
    #[error("Unsupported model schema: {0}")]
    UnsupportedSchema(String),
}

impl LoadError {
    /// Map to the shared taxonomy
    pub fn kind(&self) -> ErrorKind {
        match self {
            LoadError::NotFound(_) => ErrorKind::NotFound,
            LoadError::CorruptArtifact(_) => ErrorKind::CorruptArtifact,
            LoadError::UnsupportedSchema(_) => ErrorKind::UnsupportedSchema,
        }
    }
}
