//! Inference module facade

use crate::Completion;
use serde::de::DeserializeOwned;
use session::{LoadModelRequest, RunImageRequest, Session, SessionConfig, SessionError};
use std::sync::Arc;
use tensor_core::ErrorKind;
use tracing::{debug, info};

/// Method names accepted by [`InferenceModule::call`]
pub const METHODS: [&str; 3] = ["loadModel", "runModelOnImageMulti", "close"];

/// Caller-facing module owning one inference session
#[derive(Clone)]
pub struct InferenceModule {
    session: Arc<Session>,
}

impl InferenceModule {
    pub fn new(config: SessionConfig) -> Self {
        Self::with_session(Session::new(config))
    }

    pub fn with_session(session: Session) -> Self {
        info!("Inference module ready (session {})", session.id());
        Self {
            session: Arc::new(session),
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Load a model; the response is the model's info
    pub async fn load_model(&self, request: LoadModelRequest) -> Completion {
        Completion::from_result(self.session.load_model(request).await)
    }

    /// Classify an image; the response lists one result per declared output
    pub async fn run_model_on_image_multi(&self, request: RunImageRequest) -> Completion {
        Completion::from_result(self.session.run_model_on_image_multi(request).await)
    }

    /// Release the model; never fails
    pub async fn close(&self) {
        self.session.close().await;
    }

    /// Dispatch a call by method name with JSON arguments
    pub async fn call(&self, method: &str, args: serde_json::Value) -> Completion {
        debug!("Bridged call {}", method);
        match method {
            "loadModel" => match parse_args::<LoadModelRequest>(args) {
                Ok(request) => self.load_model(request).await,
                Err(completion) => completion,
            },
            "runModelOnImageMulti" => match parse_args::<RunImageRequest>(args) {
                Ok(request) => self.run_model_on_image_multi(request).await,
                Err(completion) => completion,
            },
            "close" => {
                self.close().await;
                Completion::from_result(Ok::<_, SessionError>(serde_json::Value::Null))
            }
            other => Completion::error(
                ErrorKind::InvalidParameter,
                format!("Unknown method '{}', expected one of {:?}", other, METHODS),
            ),
        }
    }
}

fn parse_args<T: DeserializeOwned>(args: serde_json::Value) -> Result<T, Completion> {
    serde_json::from_value(args)
        .map_err(|e| Completion::error(ErrorKind::InvalidParameter, e.to_string()))
}
