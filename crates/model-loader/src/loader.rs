//! Model Loader Implementation

use crate::artifact::ArtifactHeader;
use crate::{
    Accelerator, ArtifactStore, CompiledGraph, FsArtifactStore, LoadError, LoadOptions,
    ModelHandle, ModelSchema,
};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Loads compiled model artifacts into immutable handles
#[derive(Clone)]
pub struct ModelLoader {
    store: Arc<dyn ArtifactStore>,
}

impl ModelLoader {
    /// Create a loader reading from the given store
    pub fn new(store: Arc<dyn ArtifactStore>) -> Self {
        Self { store }
    }

    /// Create a loader reading from the local filesystem
    pub fn filesystem() -> Self {
        Self::new(Arc::new(FsArtifactStore::new()))
    }

    /// Load, validate and compile the artifact at `path`
    ///
    /// Steps:
    /// 1. Read the artifact bytes from the store.
    /// 2. Validate the container header.
    /// 3. Decode and validate the declared tensor schema.
    /// 4. Compile the graph payload for its backend.
    ///
    /// The raw bytes are dropped before returning.
    pub fn load(&self, path: &str, options: LoadOptions) -> Result<ModelHandle, LoadError> {
        if path.trim().is_empty() {
            return Err(LoadError::NotFound("Empty model path".to_string()));
        }

        let thread_count = options.thread_count();
        info!("Loading model {} with {} thread(s)", path, thread_count);

        let bytes = self.store.read(path)?;
        let header = ArtifactHeader::parse(&bytes)?;
        let schema = ModelSchema::parse(header.schema)?;
        let geometry = schema.validate()?;
        debug!(
            "Model '{}' declares input {} and {} output(s)",
            schema.name,
            geometry.shape(),
            schema.outputs.len()
        );

        let accelerator = match options.accelerator {
            Accelerator::Cpu => Accelerator::Cpu,
            Accelerator::Gpu => {
                warn!("No GPU delegate available, model {} falls back to CPU", path);
                Accelerator::Cpu
            }
        };

        let graph = CompiledGraph::compile(&schema, &geometry, header.payload)?;
        let byte_len = bytes.len();

        let ModelSchema {
            name,
            backend,
            mut inputs,
            outputs,
        } = schema;
        let input = inputs.remove(0);

        info!(
            "Model '{}' loaded: {} bytes, {} backend, {}",
            name,
            byte_len,
            backend.as_str(),
            accelerator.as_str()
        );

        Ok(ModelHandle {
            name,
            path: path.to_string(),
            byte_len,
            backend,
            input,
            geometry,
            outputs,
            thread_count,
            accelerator,
            graph,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{classifier_artifact, classifier_schema};
    use crate::{encode_artifact, MemoryArtifactStore};
    use tensor_core::{DType, ErrorKind};

    fn loader_with(path: &str, bytes: Vec<u8>) -> ModelLoader {
        let store = MemoryArtifactStore::new();
        store.insert(path, bytes).unwrap();
        ModelLoader::new(Arc::new(store))
    }

    #[test]
    fn test_load_reference_classifier() {
        let loader = loader_with("m.bin", classifier_artifact(224, 224, 3, 1000).unwrap());
        let handle = loader.load("m.bin", LoadOptions::default()).unwrap();

        assert_eq!(handle.input().shape.dims(), &[1, 224, 224, 3]);
        assert_eq!(handle.outputs()[0].shape.dims(), &[1, 1000]);
        assert_eq!(handle.thread_count(), 1);
        assert_eq!(handle.accelerator(), Accelerator::Cpu);
        assert!(handle.byte_len() > 3 * 1000 * 4);
        assert!(matches!(handle.graph(), CompiledGraph::Reference(_)));
    }

    #[test]
    fn test_missing_artifact() {
        let loader = loader_with("m.bin", classifier_artifact(8, 8, 3, 4).unwrap());
        let err = loader.load("other.bin", LoadOptions::default()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert_eq!(
            loader.load("  ", LoadOptions::default()).unwrap_err().kind(),
            ErrorKind::NotFound
        );
    }

    #[test]
    fn test_bad_magic_is_corrupt() {
        let mut bytes = classifier_artifact(8, 8, 3, 4).unwrap();
        bytes[0] = b'X';
        let loader = loader_with("m.bin", bytes);
        let err = loader.load("m.bin", LoadOptions::default()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::CorruptArtifact);
    }

    #[test]
    fn test_payload_mismatch_is_corrupt() {
        // Schema declares 3 channels, payload was built for 1
        let schema = classifier_schema(8, 8, 3, 4);
        let payload = crate::mock::dense_head(1, 4).to_payload();
        let loader = loader_with("m.bin", encode_artifact(&schema, &payload).unwrap());
        let err = loader.load("m.bin", LoadOptions::default()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::CorruptArtifact);
    }

    #[test]
    fn test_reference_backend_rejects_u8_output() {
        let mut schema = classifier_schema(8, 8, 3, 4);
        schema.outputs[0].dtype = DType::U8;
        let payload = crate::mock::dense_head(3, 4).to_payload();
        let loader = loader_with("m.bin", encode_artifact(&schema, &payload).unwrap());
        let err = loader.load("m.bin", LoadOptions::default()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnsupportedSchema);
    }

    #[test]
    fn test_thread_clamp_and_gpu_fallback() {
        let loader = loader_with("m.bin", classifier_artifact(8, 8, 3, 4).unwrap());
        let handle = loader
            .load(
                "file://m.bin",
                LoadOptions {
                    num_threads: Some(0),
                    accelerator: Accelerator::Gpu,
                },
            )
            .unwrap();
        assert_eq!(handle.thread_count(), 1);
        assert_eq!(handle.accelerator(), Accelerator::Cpu);
    }

    #[test]
    fn test_garbage_onnx_payload_is_corrupt() {
        let mut schema = classifier_schema(8, 8, 3, 4);
        schema.backend = crate::BackendKind::Onnx;
        let loader = loader_with("m.onnx", encode_artifact(&schema, &[0xFF; 16]).unwrap());
        let err = loader.load("m.onnx", LoadOptions::default()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::CorruptArtifact);
    }
}
