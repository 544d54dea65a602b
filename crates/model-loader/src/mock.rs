//! Mock artifacts for development and testing
//!
//! Deterministic reference-backend classifiers that need no external model
//! files.

use crate::{
    encode_artifact, Activation, BackendKind, DenseHead, LoadError, LoadOptions,
    MemoryArtifactStore, ModelHandle, ModelLoader, ModelSchema, TensorSpec,
};
use std::sync::Arc;
use tensor_core::{DType, Layout};

/// Path mock artifacts are registered under
pub const MOCK_MODEL_PATH: &str = "mock-classifier.edgm";

/// Schema of a single-image classifier with `classes` softmax scores
pub fn classifier_schema(height: usize, width: usize, channels: usize, classes: usize) -> ModelSchema {
    ModelSchema {
        name: "mock-classifier".to_string(),
        backend: BackendKind::Reference,
        inputs: vec![TensorSpec::image_input(
            "image",
            DType::F32,
            Layout::Nhwc,
            height,
            width,
            channels,
        )],
        outputs: vec![TensorSpec::scores("scores", DType::F32, classes)],
    }
}

/// Dense head with fixed pseudo-random weights
pub fn dense_head(channels: usize, classes: usize) -> DenseHead {
    let channels = channels.max(1);
    let classes = classes.max(1);
    DenseHead {
        channels,
        classes,
        activation: Activation::Softmax,
        weights: (0..channels * classes)
            .map(|i| ((i * 31 + 7) % 97) as f32 / 97.0 - 0.5)
            .collect(),
        bias: (0..classes).map(|k| (k % 7) as f32 * 0.01).collect(),
    }
}

/// Encoded classifier artifact
pub fn classifier_artifact(
    height: usize,
    width: usize,
    channels: usize,
    classes: usize,
) -> Result<Vec<u8>, LoadError> {
    let schema = classifier_schema(height, width, channels, classes);
    let payload = dense_head(channels, classes).to_payload();
    encode_artifact(&schema, &payload)
}

/// In-memory store holding a classifier artifact at [`MOCK_MODEL_PATH`]
pub fn classifier_store(
    height: usize,
    width: usize,
    channels: usize,
    classes: usize,
) -> Result<MemoryArtifactStore, LoadError> {
    let store = MemoryArtifactStore::new();
    store.insert(
        MOCK_MODEL_PATH,
        classifier_artifact(height, width, channels, classes)?,
    )?;
    Ok(store)
}

/// Loaded classifier handle
pub fn classifier_handle(
    height: usize,
    width: usize,
    channels: usize,
    classes: usize,
    options: LoadOptions,
) -> Result<ModelHandle, LoadError> {
    let store = classifier_store(height, width, channels, classes)?;
    ModelLoader::new(Arc::new(store)).load(MOCK_MODEL_PATH, options)
}
