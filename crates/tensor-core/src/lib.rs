//! Tensor Core
//!
//! Shared value types for the inference runtime:
//! - Element types and tensor shapes
//! - Owned tensors backed by flat row-major buffers
//! - The error taxonomy every component reports into

mod dtype;
mod error;
mod shape;
mod tensor;

pub use dtype::DType;
pub use error::{ErrorKind, TensorError};
pub use shape::{ImageGeometry, Layout, Shape};
pub use tensor::{Tensor, TensorData};
