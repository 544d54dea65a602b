//! Declared tensor schema
//!
//! The schema section of an artifact is decoded in two steps: JSON into a
//! loosely typed document (malformed JSON is a corrupt artifact), then the
//! document into a typed [`ModelSchema`] (well-formed but unusable
//! declarations are an unsupported schema).

use crate::LoadError;
use serde::{Deserialize, Serialize};
use tensor_core::{DType, ImageGeometry, Layout, Shape};

/// Largest element count accepted for any declared tensor
pub const MAX_TENSOR_ELEMENTS: usize = 1 << 26;

/// Execution backend that understands the artifact's graph payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Built-in pooled dense head, executed natively
    Reference,
    /// ONNX protobuf executed with tract
    Onnx,
}

impl BackendKind {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "reference" => Some(BackendKind::Reference),
            "onnx" => Some(BackendKind::Onnx),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::Reference => "reference",
            BackendKind::Onnx => "onnx",
        }
    }
}

/// How an output tensor is presented to the caller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputKind {
    /// Per-class scores, reported as (index, score) pairs
    #[default]
    Scores,
    /// Returned as the tensor the model produced
    Raw,
}

impl OutputKind {
    fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "scores" => Some(OutputKind::Scores),
            "raw" => Some(OutputKind::Raw),
            _ => None,
        }
    }
}

/// Affine quantization parameters of a `u8` tensor
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Quantization {
    pub scale: f32,
    pub zero_point: i32,
}

impl Default for Quantization {
    fn default() -> Self {
        Self {
            scale: 1.0 / 255.0,
            zero_point: 0,
        }
    }
}

impl Quantization {
    /// Real value of a quantized element
    pub fn dequantize(&self, q: u8) -> f32 {
        (q as i32 - self.zero_point) as f32 * self.scale
    }
}

/// Declared input or output tensor
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TensorSpec {
    pub name: String,
    pub dtype: DType,
    pub shape: Shape,
    pub layout: Layout,
    pub kind: OutputKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quantization: Option<Quantization>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub labels: Option<Vec<String>>,
}

impl TensorSpec {
    /// Single-image input tensor
    pub fn image_input(
        name: &str,
        dtype: DType,
        layout: Layout,
        height: usize,
        width: usize,
        channels: usize,
    ) -> Self {
        Self {
            name: name.to_string(),
            dtype,
            shape: Shape::image(layout, height, width, channels),
            layout,
            kind: OutputKind::Raw,
            quantization: None,
            labels: None,
        }
    }

    /// `[1, classes]` score output
    pub fn scores(name: &str, dtype: DType, classes: usize) -> Self {
        Self {
            name: name.to_string(),
            dtype,
            shape: Shape::new(vec![1, classes]),
            layout: Layout::default(),
            kind: OutputKind::Scores,
            quantization: None,
            labels: None,
        }
    }

    /// Output returned verbatim
    pub fn raw(name: &str, dtype: DType, shape: Shape) -> Self {
        Self {
            name: name.to_string(),
            dtype,
            shape,
            layout: Layout::default(),
            kind: OutputKind::Raw,
            quantization: None,
            labels: None,
        }
    }

    pub fn with_quantization(mut self, quantization: Quantization) -> Self {
        self.quantization = Some(quantization);
        self
    }

    pub fn with_labels(mut self, labels: Vec<String>) -> Self {
        self.labels = Some(labels);
        self
    }

    /// Quantization to apply when reading `u8` values
    pub fn effective_quantization(&self) -> Quantization {
        self.quantization.unwrap_or_default()
    }
}

/// Typed model schema
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelSchema {
    pub name: String,
    pub backend: BackendKind,
    pub inputs: Vec<TensorSpec>,
    pub outputs: Vec<TensorSpec>,
}

impl ModelSchema {
    /// Decode and validate a schema section
    pub fn parse(bytes: &[u8]) -> Result<Self, LoadError> {
        let doc: SchemaDocument = serde_json::from_slice(bytes)
            .map_err(|e| LoadError::CorruptArtifact(format!("Schema is not valid JSON: {}", e)))?;
        let schema = doc.into_schema()?;
        schema.validate()?;
        Ok(schema)
    }

    /// Check the declarations are usable, returning the input geometry
    pub fn validate(&self) -> Result<ImageGeometry, LoadError> {
        let input = match self.inputs.as_slice() {
            [] => {
                return Err(LoadError::UnsupportedSchema(
                    "Model declares no input tensors".to_string(),
                ))
            }
            [input] => input,
            inputs => {
                return Err(LoadError::UnsupportedSchema(format!(
                    "Model declares {} inputs, only single-image models are supported",
                    inputs.len()
                )))
            }
        };

        if self.outputs.is_empty() {
            return Err(LoadError::UnsupportedSchema(
                "Model declares no output tensors".to_string(),
            ));
        }

        for spec in self.inputs.iter().chain(self.outputs.iter()) {
            if spec.shape.rank() == 0 || spec.shape.has_zero_dim() {
                return Err(LoadError::UnsupportedSchema(format!(
                    "Tensor '{}' has degenerate shape {}",
                    spec.name, spec.shape
                )));
            }
            match spec.shape.checked_num_elements() {
                Some(n) if n <= MAX_TENSOR_ELEMENTS => {}
                _ => {
                    return Err(LoadError::UnsupportedSchema(format!(
                        "Tensor '{}' shape {} exceeds {} elements",
                        spec.name, spec.shape, MAX_TENSOR_ELEMENTS
                    )))
                }
            }
        }

        let geometry = input.shape.image_geometry(input.layout).map_err(|e| {
            LoadError::UnsupportedSchema(format!("Input '{}': {}", input.name, e))
        })?;
        if geometry.channels != 1 && geometry.channels != 3 {
            return Err(LoadError::UnsupportedSchema(format!(
                "Input '{}' has {} channels, expected 1 or 3",
                input.name, geometry.channels
            )));
        }

        for output in &self.outputs {
            if let Some(q) = output.quantization {
                if !q.scale.is_finite() || q.scale <= 0.0 {
                    return Err(LoadError::UnsupportedSchema(format!(
                        "Output '{}' has invalid quantization scale {}",
                        output.name, q.scale
                    )));
                }
            }
            if let Some(labels) = &output.labels {
                if labels.len() != output.shape.num_elements() {
                    return Err(LoadError::UnsupportedSchema(format!(
                        "Output '{}' declares {} labels for {} scores",
                        output.name,
                        labels.len(),
                        output.shape.num_elements()
                    )));
                }
            }
        }

        Ok(geometry)
    }

    /// The single declared input
    pub fn input(&self) -> Option<&TensorSpec> {
        self.inputs.first()
    }
}

/// Schema as it appears on disk
#[derive(Debug, Deserialize)]
struct SchemaDocument {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    backend: Option<String>,
    #[serde(default)]
    inputs: Vec<TensorSpecDocument>,
    #[serde(default)]
    outputs: Vec<TensorSpecDocument>,
}

#[derive(Debug, Deserialize)]
struct TensorSpecDocument {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    dtype: Option<String>,
    #[serde(default)]
    shape: Option<Vec<i64>>,
    #[serde(default)]
    layout: Option<String>,
    #[serde(default)]
    kind: Option<String>,
    #[serde(default)]
    quantization: Option<Quantization>,
    #[serde(default)]
    labels: Option<Vec<String>>,
}

impl SchemaDocument {
    fn into_schema(self) -> Result<ModelSchema, LoadError> {
        let backend = match self.backend.as_deref() {
            Some(b) => BackendKind::parse(b).ok_or_else(|| {
                LoadError::UnsupportedSchema(format!("Unknown backend '{}'", b))
            })?,
            None => {
                return Err(LoadError::UnsupportedSchema(
                    "Schema does not name a backend".to_string(),
                ))
            }
        };

        let inputs = self
            .inputs
            .into_iter()
            .enumerate()
            .map(|(i, doc)| doc.into_spec(format!("input_{}", i), OutputKind::Raw))
            .collect::<Result<Vec<_>, _>>()?;
        let outputs = self
            .outputs
            .into_iter()
            .enumerate()
            .map(|(i, doc)| doc.into_spec(format!("output_{}", i), OutputKind::Scores))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(ModelSchema {
            name: self.name.unwrap_or_else(|| "model".to_string()),
            backend,
            inputs,
            outputs,
        })
    }
}

impl TensorSpecDocument {
    fn into_spec(self, default_name: String, default_kind: OutputKind) -> Result<TensorSpec, LoadError> {
        let name = self.name.unwrap_or(default_name);

        let dtype = match self.dtype.as_deref() {
            Some(d) => DType::parse(d).ok_or_else(|| {
                LoadError::UnsupportedSchema(format!("Tensor '{}' has unsupported dtype '{}'", name, d))
            })?,
            None => {
                return Err(LoadError::UnsupportedSchema(format!(
                    "Tensor '{}' does not declare a dtype",
                    name
                )))
            }
        };

        let dims = self.shape.ok_or_else(|| {
            LoadError::UnsupportedSchema(format!("Tensor '{}' does not declare a shape", name))
        })?;
        let dims = dims
            .into_iter()
            .map(|d| usize::try_from(d).ok().filter(|&d| d > 0))
            .collect::<Option<Vec<_>>>()
            .ok_or_else(|| {
                LoadError::UnsupportedSchema(format!("Tensor '{}' has a non-positive dimension", name))
            })?;

        let layout = match self.layout.as_deref().map(|l| l.trim().to_ascii_lowercase()) {
            None => Layout::default(),
            Some(l) if l == "nhwc" => Layout::Nhwc,
            Some(l) if l == "nchw" => Layout::Nchw,
            Some(l) => {
                return Err(LoadError::UnsupportedSchema(format!(
                    "Tensor '{}' has unsupported layout '{}'",
                    name, l
                )))
            }
        };

        let kind = match self.kind.as_deref() {
            None => default_kind,
            Some(k) => OutputKind::parse(k).ok_or_else(|| {
                LoadError::UnsupportedSchema(format!("Tensor '{}' has unknown kind '{}'", name, k))
            })?,
        };

        Ok(TensorSpec {
            name,
            dtype,
            shape: Shape::new(dims),
            layout,
            kind,
            quantization: self.quantization,
            labels: self.labels,
        })
    }
}
