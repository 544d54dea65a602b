//! Tensor element types

use serde::{Deserialize, Serialize};
use std::fmt;

/// Element type of a tensor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DType {
    /// 32-bit IEEE float
    F32,
    /// Unsigned byte (quantized models)
    U8,
}

impl DType {
    /// Size of one element in bytes
    pub fn size_bytes(&self) -> usize {
        match self {
            DType::F32 => 4,
            DType::U8 => 1,
        }
    }

    /// Get string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            DType::F32 => "f32",
            DType::U8 => "u8",
        }
    }

    /// Parse a declared element type, `None` when unsupported
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "f32" | "float32" => Some(DType::F32),
            "u8" | "uint8" => Some(DType::U8),
            _ => None,
        }
    }
}

impl fmt::Display for DType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
