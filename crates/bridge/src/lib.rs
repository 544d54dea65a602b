//! Inference Bridge
//!
//! Caller-facing surface of the runtime: `loadModel`,
//! `runModelOnImageMulti` and `close`, each answering with a [`Completion`]
//! that carries either a response or an error, never both.

mod completion;
mod config;
mod logging;
mod module;

pub use completion::Completion;
pub use config::BridgeConfig;
pub use logging::{init_logging, LogFormat, LoggingConfig};
pub use module::InferenceModule;
