//! Model Artifact Loader
//!
//! Reads compiled model artifacts from an artifact store, validates the
//! container header and the declared tensor schema, compiles the opaque
//! graph payload and produces an immutable [`ModelHandle`].

pub mod artifact;
mod error;
pub mod graph;
mod handle;
mod loader;
pub mod mock;
pub mod schema;
mod store;

pub use artifact::{encode_artifact, ArtifactHeader, FORMAT_VERSION, MAGIC};
pub use error::LoadError;
pub use graph::{Activation, CompiledGraph, DenseHead, OnnxGraph};
pub use handle::{Accelerator, LoadOptions, ModelHandle, ModelInfo, DEFAULT_NUM_THREADS};
pub use loader::ModelLoader;
pub use schema::{
    BackendKind, ModelSchema, OutputKind, Quantization, TensorSpec, MAX_TENSOR_ELEMENTS,
};
pub use store::{strip_file_scheme, ArtifactStore, FsArtifactStore, MemoryArtifactStore};
