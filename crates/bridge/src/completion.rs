//! Completion values

use serde::Serialize;
use session::SessionError;
use tensor_core::ErrorKind;

/// Outcome of one bridged call
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum Completion {
    Ok { response: serde_json::Value },
    Err { kind: ErrorKind, message: String },
}

impl Completion {
    /// Build from a session result, serializing the success value
    pub fn from_result<T: Serialize>(result: Result<T, SessionError>) -> Self {
        match result {
            Ok(value) => match serde_json::to_value(value) {
                Ok(response) => Completion::Ok { response },
                Err(e) => Completion::Err {
                    kind: ErrorKind::ExecutionFault,
                    message: format!("Response serialization failed: {}", e),
                },
            },
            Err(e) => Completion::error(e.kind(), e.to_string()),
        }
    }

    pub fn error(kind: ErrorKind, message: impl Into<String>) -> Self {
        Completion::Err {
            kind,
            message: message.into(),
        }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, Completion::Ok { .. })
    }

    pub fn response(&self) -> Option<&serde_json::Value> {
        match self {
            Completion::Ok { response } => Some(response),
            Completion::Err { .. } => None,
        }
    }

    pub fn error_kind(&self) -> Option<ErrorKind> {
        match self {
            Completion::Ok { .. } => None,
            Completion::Err { kind, .. } => Some(*kind),
        }
    }
}
