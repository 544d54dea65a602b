//! Run responses

use processing::InferenceResult;
use serde::Serialize;

/// Result for one declared output tensor
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutputResult {
    /// Declared output name
    pub name: String,
    #[serde(flatten)]
    pub result: InferenceResult,
}

/// One result per declared output, in declaration order
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InferenceResponse {
    pub outputs: Vec<OutputResult>,
    /// Wall time from dispatch to postprocessed result
    pub latency_ms: u64,
}

impl InferenceResponse {
    /// Result of the first declared output
    pub fn primary(&self) -> Option<&InferenceResult> {
        self.outputs.first().map(|o| &o.result)
    }
}
