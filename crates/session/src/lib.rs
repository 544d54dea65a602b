//! Inference Session Manager
//!
//! Owns one model handle and its execution context, enforces the
//! `Unloaded -> Loaded -> Closed` lifecycle, serializes operations in
//! arrival order and bounds inference time.

mod config;
mod error;
mod request;
mod response;
mod session;

pub use config::SessionConfig;
pub use error::SessionError;
pub use request::{LoadModelRequest, RunImageRequest, RunOptions};
pub use response::{InferenceResponse, OutputResult};
pub use session::{Lifecycle, Session};
