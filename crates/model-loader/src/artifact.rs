//! Compiled-model container format
//!
//! ```text
//! offset  size  field
//! 0       4     magic "EDGM"
//! 4       2     format version (u16 LE)
//! 6       2     flags (u16 LE, reserved, must be 0)
//! 8       4     schema length N (u32 LE)
//! 12      N     schema (UTF-8 JSON)
//! 12+N    ..    graph payload (opaque, backend specific)
//! ```

use crate::{LoadError, ModelSchema};

/// Container magic bytes
pub const MAGIC: [u8; 4] = *b"EDGM";

/// The only container version this runtime reads
pub const FORMAT_VERSION: u16 = 1;

/// Fixed header length preceding the schema
pub const HEADER_LEN: usize = 12;

/// Parsed container header with borrowed schema and payload sections
#[derive(Debug)]
pub struct ArtifactHeader<'a> {
    pub version: u16,
    pub schema: &'a [u8],
    pub payload: &'a [u8],
}

impl<'a> ArtifactHeader<'a> {
    /// Split an artifact into its sections, validating the fixed header
    pub fn parse(bytes: &'a [u8]) -> Result<Self, LoadError> {
        if bytes.len() < HEADER_LEN {
            return Err(LoadError::CorruptArtifact(format!(
                "Artifact is {} bytes, shorter than the {}-byte header",
                bytes.len(),
                HEADER_LEN
            )));
        }

        if bytes[0..4] != MAGIC {
            return Err(LoadError::CorruptArtifact(format!(
                "Bad magic {:02X?}, expected {:02X?}",
                &bytes[0..4],
                MAGIC
            )));
        }

        let version = u16::from_le_bytes([bytes[4], bytes[5]]);
        if version != FORMAT_VERSION {
            return Err(LoadError::CorruptArtifact(format!(
                "Unsupported container version {}",
                version
            )));
        }

        let flags = u16::from_le_bytes([bytes[6], bytes[7]]);
        if flags != 0 {
            return Err(LoadError::CorruptArtifact(format!(
                "Reserved flags set: {:#06X}",
                flags
            )));
        }

        let schema_len = u32::from_le_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]) as usize;
        let schema_end = HEADER_LEN
            .checked_add(schema_len)
            .filter(|&end| end <= bytes.len())
            .ok_or_else(|| {
                LoadError::CorruptArtifact(format!(
                    "Schema length {} exceeds artifact size {}",
                    schema_len,
                    bytes.len()
                ))
            })?;

        Ok(Self {
            version,
            schema: &bytes[HEADER_LEN..schema_end],
            payload: &bytes[schema_end..],
        })
    }
}

/// Encode a schema and payload into a container
///
/// Used by model packaging tools and test fixtures.
pub fn encode_artifact(schema: &ModelSchema, payload: &[u8]) -> Result<Vec<u8>, LoadError> {
    let schema_json = serde_json::to_vec(schema)
        .map_err(|e| LoadError::UnsupportedSchema(format!("Schema not serializable: {}", e)))?;
    let schema_len = u32::try_from(schema_json.len())
        .map_err(|_| LoadError::UnsupportedSchema("Schema exceeds 4 GiB".to_string()))?;

    let mut bytes = Vec::with_capacity(HEADER_LEN + schema_json.len() + payload.len());
    bytes.extend_from_slice(&MAGIC);
    bytes.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
    bytes.extend_from_slice(&0u16.to_le_bytes());
    bytes.extend_from_slice(&schema_len.to_le_bytes());
    bytes.extend_from_slice(&schema_json);
    bytes.extend_from_slice(payload);
    Ok(bytes)
}
