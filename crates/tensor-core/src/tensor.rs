//! Owned tensors

use crate::{DType, Shape, TensorError};
use ndarray::{ArrayD, ArrayViewD, IxDyn};
use serde::{Deserialize, Serialize};

/// Typed element storage in row-major order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "dtype", content = "values", rename_all = "lowercase")]
pub enum TensorData {
    F32(Vec<f32>),
    U8(Vec<u8>),
}

impl TensorData {
    pub fn dtype(&self) -> DType {
        match self {
            TensorData::F32(_) => DType::F32,
            TensorData::U8(_) => DType::U8,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            TensorData::F32(v) => v.len(),
            TensorData::U8(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// An owned n-dimensional tensor with a declared shape
///
/// The buffer length always equals `shape.num_elements()`; constructors
/// reject anything else.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tensor {
    shape: Shape,
    data: TensorData,
}

impl Tensor {
    /// Create a tensor, validating the buffer against the shape
    pub fn new(shape: Shape, data: TensorData) -> Result<Self, TensorError> {
        let expected = shape.num_elements();
        if data.len() != expected {
            return Err(TensorError::BufferSizeMismatch {
                shape: shape.to_string(),
                expected,
                actual: data.len(),
            });
        }
        Ok(Self { shape, data })
    }

    pub fn from_f32(shape: Shape, values: Vec<f32>) -> Result<Self, TensorError> {
        Self::new(shape, TensorData::F32(values))
    }

    pub fn from_u8(shape: Shape, values: Vec<u8>) -> Result<Self, TensorError> {
        Self::new(shape, TensorData::U8(values))
    }

    /// Zero-filled tensor of the given type
    pub fn zeros(shape: Shape, dtype: DType) -> Self {
        let n = shape.num_elements();
        let data = match dtype {
            DType::F32 => TensorData::F32(vec![0.0; n]),
            DType::U8 => TensorData::U8(vec![0; n]),
        };
        Self { shape, data }
    }

    /// Take ownership of an ndarray, preserving its logical element order
    pub fn from_array(array: ArrayD<f32>) -> Self {
        let shape = Shape::new(array.shape().to_vec());
        let values = if array.is_standard_layout() {
            array.into_raw_vec_and_offset().0
        } else {
            array.iter().copied().collect()
        };
        Self {
            shape,
            data: TensorData::F32(values),
        }
    }

    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    pub fn dtype(&self) -> DType {
        self.data.dtype()
    }

    pub fn data(&self) -> &TensorData {
        &self.data
    }

    pub fn into_data(self) -> TensorData {
        self.data
    }

    /// Number of elements
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Borrow as `f32` elements
    pub fn as_f32(&self) -> Result<&[f32], TensorError> {
        match &self.data {
            TensorData::F32(v) => Ok(v),
            TensorData::U8(_) => Err(TensorError::DTypeMismatch {
                requested: "f32",
                actual: "u8",
            }),
        }
    }

    /// Borrow as `u8` elements
    pub fn as_u8(&self) -> Result<&[u8], TensorError> {
        match &self.data {
            TensorData::U8(v) => Ok(v),
            TensorData::F32(_) => Err(TensorError::DTypeMismatch {
                requested: "u8",
                actual: "f32",
            }),
        }
    }

    /// Copy every element widened to `f32`
    pub fn to_f32_vec(&self) -> Vec<f32> {
        match &self.data {
            TensorData::F32(v) => v.clone(),
            TensorData::U8(v) => v.iter().map(|&b| b as f32).collect(),
        }
    }

    /// View `f32` data as an ndarray with this tensor's shape
    pub fn view_f32(&self) -> Result<ArrayViewD<'_, f32>, TensorError> {
        let values = self.as_f32()?;
        ArrayViewD::from_shape(IxDyn(self.shape.dims()), values).map_err(|_| {
            TensorError::BufferSizeMismatch {
                shape: self.shape.to_string(),
                expected: self.shape.num_elements(),
                actual: values.len(),
            }
        })
    }
}
