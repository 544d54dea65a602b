//! Compiled graphs
//!
//! The graph payload is compiled once at load time into an immutable,
//! shareable form. Mutable per-run state lives in execution contexts.

use crate::{BackendKind, LoadError, ModelSchema, TensorSpec};
use std::fmt;
use std::io::Cursor;
use std::sync::Arc;
use tensor_core::{DType, ImageGeometry};
use tract_onnx::prelude::*;
use tracing::debug;

/// Reference payload header: channels u32, classes u32, activation u8, 3 reserved
pub const DENSE_HEAD_HEADER_LEN: usize = 12;

/// Activation applied to dense head logits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Activation {
    None,
    Softmax,
}

impl Activation {
    fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(Activation::None),
            1 => Some(Activation::Softmax),
            _ => None,
        }
    }

    fn code(&self) -> u8 {
        match self {
            Activation::None => 0,
            Activation::Softmax => 1,
        }
    }
}

/// Pooled dense classification head
///
/// Computes the spatial mean of every input channel, projects the channel
/// means through a dense layer and applies the activation.
#[derive(Debug, Clone, PartialEq)]
pub struct DenseHead {
    pub(crate) channels: usize,
    pub(crate) classes: usize,
    pub(crate) activation: Activation,
    /// Channel-major: `weights[c * classes + k]`
    pub(crate) weights: Vec<f32>,
    pub(crate) bias: Vec<f32>,
}

impl DenseHead {
    pub fn new(
        channels: usize,
        classes: usize,
        activation: Activation,
        weights: Vec<f32>,
        bias: Vec<f32>,
    ) -> Result<Self, LoadError> {
        if channels == 0 || classes == 0 {
            return Err(LoadError::CorruptArtifact(
                "Dense head has zero channels or classes".to_string(),
            ));
        }
        if weights.len() != channels * classes || bias.len() != classes {
            return Err(LoadError::CorruptArtifact(format!(
                "Dense head {}x{} needs {} weights and {} biases, got {} and {}",
                channels,
                classes,
                channels * classes,
                classes,
                weights.len(),
                bias.len()
            )));
        }
        Ok(Self {
            channels,
            classes,
            activation,
            weights,
            bias,
        })
    }

    /// Decode a reference backend payload
    pub fn from_payload(bytes: &[u8]) -> Result<Self, LoadError> {
        if bytes.len() < DENSE_HEAD_HEADER_LEN {
            return Err(LoadError::CorruptArtifact(format!(
                "Reference payload is {} bytes, shorter than its header",
                bytes.len()
            )));
        }
        let channels = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as usize;
        let classes = u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]) as usize;
        let activation = Activation::from_code(bytes[8]).ok_or_else(|| {
            LoadError::CorruptArtifact(format!("Unknown activation code {}", bytes[8]))
        })?;

        let expected = channels
            .checked_mul(classes)
            .and_then(|w| w.checked_add(classes))
            .and_then(|n| n.checked_mul(4))
            .and_then(|n| n.checked_add(DENSE_HEAD_HEADER_LEN))
            .ok_or_else(|| LoadError::CorruptArtifact("Dense head dimensions overflow".to_string()))?;
        if bytes.len() != expected {
            return Err(LoadError::CorruptArtifact(format!(
                "Reference payload is {} bytes, expected {}",
                bytes.len(),
                expected
            )));
        }

        let mut values = bytes[DENSE_HEAD_HEADER_LEN..]
            .chunks_exact(4)
            .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]));
        let weights: Vec<f32> = values.by_ref().take(channels * classes).collect();
        let bias: Vec<f32> = values.collect();

        Self::new(channels, classes, activation, weights, bias)
    }

    /// Encode as a reference backend payload
    pub fn to_payload(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(DENSE_HEAD_HEADER_LEN + 4 * (self.weights.len() + self.bias.len()));
        bytes.extend_from_slice(&(self.channels as u32).to_le_bytes());
        bytes.extend_from_slice(&(self.classes as u32).to_le_bytes());
        bytes.push(self.activation.code());
        bytes.extend_from_slice(&[0, 0, 0]);
        for v in self.weights.iter().chain(self.bias.iter()) {
            bytes.extend_from_slice(&v.to_le_bytes());
        }
        bytes
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    pub fn classes(&self) -> usize {
        self.classes
    }

    pub fn activation(&self) -> Activation {
        self.activation
    }

    /// Project channel means into `out` (length `classes`)
    pub fn forward(&self, channel_means: &[f32], out: &mut [f32]) {
        out.copy_from_slice(&self.bias);
        for (c, &mean) in channel_means.iter().enumerate().take(self.channels) {
            let row = &self.weights[c * self.classes..(c + 1) * self.classes];
            for (o, &w) in out.iter_mut().zip(row) {
                *o += mean * w;
            }
        }

        if self.activation == Activation::Softmax {
            let max = out.iter().copied().fold(f32::NEG_INFINITY, f32::max);
            let mut sum = 0.0;
            for o in out.iter_mut() {
                *o = (*o - max).exp();
                sum += *o;
            }
            for o in out.iter_mut() {
                *o /= sum;
            }
        }
    }
}

type Runner = dyn Fn(TVec<TValue>) -> TractResult<TVec<TValue>> + Send + Sync;

/// ONNX graph optimized and planned by tract
#[derive(Clone)]
pub struct OnnxGraph {
    runner: Arc<Runner>,
}

impl OnnxGraph {
    /// Parse, type and optimize an ONNX payload for the declared input
    pub fn compile(input: &TensorSpec, payload: &[u8]) -> Result<Self, LoadError> {
        let dims = input.shape.dims();
        let [n, a, b, c] = dims else {
            return Err(LoadError::UnsupportedSchema(format!(
                "ONNX input '{}' must be rank 4, got {}",
                input.name, input.shape
            )));
        };
        let fact_shape = [*n, *a, *b, *c];
        let fact: InferenceFact = match input.dtype {
            DType::F32 => f32::fact(fact_shape).into(),
            DType::U8 => u8::fact(fact_shape).into(),
        };

        let plan = tract_onnx::onnx()
            .model_for_read(&mut Cursor::new(payload))
            .and_then(|model| model.with_input_fact(0, fact))
            .and_then(|model| model.into_optimized())
            .and_then(|model| model.into_runnable())
            .map_err(|e| LoadError::CorruptArtifact(format!("ONNX payload rejected: {}", e)))?;

        Ok(Self {
            runner: Arc::new(move |inputs: TVec<TValue>| plan.run(inputs)),
        })
    }

    /// Execute the plan once
    pub fn run(&self, inputs: TVec<TValue>) -> TractResult<TVec<TValue>> {
        (self.runner)(inputs)
    }
}

impl fmt::Debug for OnnxGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OnnxGraph").finish_non_exhaustive()
    }
}

/// Immutable compiled form of a model's graph payload
#[derive(Debug, Clone)]
pub enum CompiledGraph {
    Reference(Arc<DenseHead>),
    Onnx(OnnxGraph),
}

impl CompiledGraph {
    /// Compile `payload` for the backend named in `schema`
    pub fn compile(
        schema: &ModelSchema,
        geometry: &ImageGeometry,
        payload: &[u8],
    ) -> Result<Self, LoadError> {
        debug!(
            "Compiling {} byte {} payload",
            payload.len(),
            schema.backend.as_str()
        );

        match schema.backend {
            BackendKind::Reference => {
                let [output] = schema.outputs.as_slice() else {
                    return Err(LoadError::UnsupportedSchema(
                        "Reference backend produces exactly one output".to_string(),
                    ));
                };
                if output.dtype != DType::F32 {
                    return Err(LoadError::UnsupportedSchema(format!(
                        "Reference backend output '{}' must be f32",
                        output.name
                    )));
                }

                let head = DenseHead::from_payload(payload)?;
                if head.channels() != geometry.channels {
                    return Err(LoadError::CorruptArtifact(format!(
                        "Payload expects {} channels, input declares {}",
                        head.channels(),
                        geometry.channels
                    )));
                }
                if head.classes() != output.shape.num_elements() {
                    return Err(LoadError::CorruptArtifact(format!(
                        "Payload produces {} classes, output '{}' declares {}",
                        head.classes(),
                        output.name,
                        output.shape.num_elements()
                    )));
                }
                Ok(CompiledGraph::Reference(Arc::new(head)))
            }
            BackendKind::Onnx => {
                let input = schema.input().ok_or_else(|| {
                    LoadError::UnsupportedSchema("Model declares no input tensors".to_string())
                })?;
                Ok(CompiledGraph::Onnx(OnnxGraph::compile(input, payload)?))
            }
        }
    }
}
