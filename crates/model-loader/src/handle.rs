//! Loaded model handles

use crate::{BackendKind, CompiledGraph, TensorSpec};
use serde::{Deserialize, Serialize};
use tensor_core::ImageGeometry;

/// Thread count used when the caller does not request one
pub const DEFAULT_NUM_THREADS: usize = 1;

/// Compute device a model executes on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Accelerator {
    #[default]
    Cpu,
    Gpu,
}

impl Accelerator {
    pub fn as_str(&self) -> &'static str {
        match self {
            Accelerator::Cpu => "cpu",
            Accelerator::Gpu => "gpu",
        }
    }
}

/// Options applied while loading a model
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadOptions {
    /// Requested worker threads; missing or below 1 means 1
    pub num_threads: Option<i64>,
    /// Requested accelerator
    pub accelerator: Accelerator,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            num_threads: None,
            accelerator: Accelerator::Cpu,
        }
    }
}

impl LoadOptions {
    pub fn with_threads(num_threads: i64) -> Self {
        Self {
            num_threads: Some(num_threads),
            ..Default::default()
        }
    }

    /// Thread count after default substitution and clamping
    pub fn thread_count(&self) -> usize {
        match self.num_threads {
            Some(n) if n >= 1 => usize::try_from(n).unwrap_or(DEFAULT_NUM_THREADS),
            _ => DEFAULT_NUM_THREADS,
        }
    }
}

/// Immutable handle to a successfully loaded and validated model
///
/// Created only by [`crate::ModelLoader`]. Nothing in a handle changes after
/// construction; the raw artifact bytes are not retained.
#[derive(Debug)]
pub struct ModelHandle {
    pub(crate) name: String,
    pub(crate) path: String,
    pub(crate) byte_len: usize,
    pub(crate) backend: BackendKind,
    pub(crate) input: TensorSpec,
    pub(crate) geometry: ImageGeometry,
    pub(crate) outputs: Vec<TensorSpec>,
    pub(crate) thread_count: usize,
    pub(crate) accelerator: Accelerator,
    pub(crate) graph: CompiledGraph,
}

impl ModelHandle {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Path the artifact was loaded from
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Size of the artifact in bytes
    pub fn byte_len(&self) -> usize {
        self.byte_len
    }

    pub fn backend(&self) -> BackendKind {
        self.backend
    }

    /// Declared input tensor
    pub fn input(&self) -> &TensorSpec {
        &self.input
    }

    /// Spatial size and channels of the declared input
    pub fn input_geometry(&self) -> ImageGeometry {
        self.geometry
    }

    /// Declared output tensors in model order
    pub fn outputs(&self) -> &[TensorSpec] {
        &self.outputs
    }

    /// Thread count requested at load time, after clamping
    pub fn thread_count(&self) -> usize {
        self.thread_count
    }

    /// Accelerator the model is bound to
    pub fn accelerator(&self) -> Accelerator {
        self.accelerator
    }

    pub fn graph(&self) -> &CompiledGraph {
        &self.graph
    }

    /// Serializable summary
    pub fn info(&self) -> ModelInfo {
        ModelInfo {
            name: self.name.clone(),
            path: self.path.clone(),
            byte_len: self.byte_len,
            backend: self.backend,
            input: self.input.clone(),
            outputs: self.outputs.clone(),
            thread_count: self.thread_count,
            accelerator: self.accelerator,
        }
    }
}

/// Caller-visible description of a loaded model
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelInfo {
    pub name: String,
    pub path: String,
    pub byte_len: usize,
    pub backend: BackendKind,
    pub input: TensorSpec,
    pub outputs: Vec<TensorSpec>,
    pub thread_count: usize,
    pub accelerator: Accelerator,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_thread_count_defaults_and_clamps() {
        assert_eq!(LoadOptions::default().thread_count(), 1);
        assert_eq!(LoadOptions::with_threads(0).thread_count(), 1);
        assert_eq!(LoadOptions::with_threads(-4).thread_count(), 1);
        assert_eq!(LoadOptions::with_threads(4).thread_count(), 4);
    }
}
