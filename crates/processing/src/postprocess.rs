//! Output tensor postprocessing

use crate::ProcessError;
use model_loader::{OutputKind, TensorSpec};
use serde::Serialize;
use tensor_core::{Tensor, TensorData};

/// Score of one class
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassScore {
    /// Position in the model's output tensor
    pub index: usize,
    pub score: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

/// Structured result for one output tensor
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum InferenceResult {
    /// Per-class scores in model order, unless top-K was requested
    Scores { scores: Vec<ClassScore> },
    /// Tensor as produced by the model
    Raw { tensor: Tensor },
}

impl InferenceResult {
    /// Scores, if this is a score result
    pub fn scores(&self) -> Option<&[ClassScore]> {
        match self {
            InferenceResult::Scores { scores } => Some(scores),
            InferenceResult::Raw { .. } => None,
        }
    }
}

/// Caller-requested shaping of score results
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PostprocessOptions {
    /// Keep only the K highest scores, sorted descending
    pub top_k: Option<usize>,
}

impl PostprocessOptions {
    pub fn validate(&self) -> Result<(), ProcessError> {
        if self.top_k == Some(0) {
            return Err(ProcessError::InvalidParameter(
                "topK must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Convert one output tensor into a result according to its declaration
pub fn postprocess(
    output: Tensor,
    spec: &TensorSpec,
    options: &PostprocessOptions,
) -> Result<InferenceResult, ProcessError> {
    options.validate()?;

    if output.dtype() != spec.dtype {
        return Err(ProcessError::UnexpectedOutput(format!(
            "Output '{}' declared {} but produced {}",
            spec.name,
            spec.dtype,
            output.dtype()
        )));
    }
    if output.len() != spec.shape.num_elements() {
        return Err(ProcessError::UnexpectedOutput(format!(
            "Output '{}' declared shape {} but produced {}",
            spec.name,
            spec.shape,
            output.shape()
        )));
    }

    if spec.kind == OutputKind::Raw {
        return Ok(InferenceResult::Raw { tensor: output });
    }

    let values: Vec<f32> = match output.into_data() {
        TensorData::F32(v) => v,
        TensorData::U8(v) => {
            let q = spec.effective_quantization();
            v.into_iter().map(|b| q.dequantize(b)).collect()
        }
    };

    let mut scores: Vec<ClassScore> = values
        .into_iter()
        .enumerate()
        .map(|(index, score)| ClassScore {
            index,
            score,
            label: spec.labels.as_ref().and_then(|l| l.get(index).cloned()),
        })
        .collect();

    if let Some(k) = options.top_k {
        // Stable sort keeps model order among equal scores
        scores.sort_by(|a, b| b.score.total_cmp(&a.score));
        scores.truncate(k);
    }

    Ok(InferenceResult::Scores { scores })
}

#[cfg(test)]
mod tests {
    use super::*;
    use model_loader::Quantization;
    use tensor_core::{DType, Shape};

    fn scores_of(result: &InferenceResult) -> Vec<(usize, f32)> {
        result
            .scores()
            .unwrap()
            .iter()
            .map(|s| (s.index, s.score))
            .collect()
    }

    #[test]
    fn test_scores_preserve_model_order() {
        let spec = TensorSpec::scores("probs", DType::F32, 4);
        let output = Tensor::from_f32(Shape::new(vec![1, 4]), vec![0.1, 0.6, 0.2, 0.1]).unwrap();
        let result = postprocess(output, &spec, &PostprocessOptions::default()).unwrap();
        assert_eq!(
            scores_of(&result),
            vec![(0, 0.1), (1, 0.6), (2, 0.2), (3, 0.1)]
        );
    }

    #[test]
    fn test_top_k_only_on_request() {
        let spec = TensorSpec::scores("probs", DType::F32, 4);
        let output = Tensor::from_f32(Shape::new(vec![1, 4]), vec![0.1, 0.6, 0.2, 0.1]).unwrap();
        let result = postprocess(output, &spec, &PostprocessOptions { top_k: Some(3) }).unwrap();
        assert_eq!(scores_of(&result), vec![(1, 0.6), (2, 0.2), (0, 0.1)]);

        let output = Tensor::from_f32(Shape::new(vec![1, 4]), vec![0.0; 4]).unwrap();
        assert!(postprocess(output, &spec, &PostprocessOptions { top_k: Some(0) }).is_err());
    }

    #[test]
    fn test_quantized_scores_and_labels() {
        let spec = TensorSpec::scores("probs", DType::U8, 2)
            .with_quantization(Quantization {
                scale: 0.25,
                zero_point: 4,
            })
            .with_labels(vec!["cat".to_string(), "dog".to_string()]);
        let output = Tensor::from_u8(Shape::new(vec![1, 2]), vec![8, 4]).unwrap();
        let result = postprocess(output, &spec, &PostprocessOptions::default()).unwrap();
        let scores = result.scores().unwrap();
        assert_eq!(scores[0].score, 1.0);
        assert_eq!(scores[0].label.as_deref(), Some("cat"));
        assert_eq!(scores[1].score, 0.0);
    }

    #[test]
    fn test_raw_output_passthrough() {
        let spec = TensorSpec::raw("boxes", DType::F32, Shape::new(vec![1, 2, 4]));
        let output = Tensor::from_f32(Shape::new(vec![1, 2, 4]), vec![0.5; 8]).unwrap();
        let result = postprocess(output.clone(), &spec, &PostprocessOptions::default()).unwrap();
        assert_eq!(result, InferenceResult::Raw { tensor: output });
    }

    #[test]
    fn test_mismatched_output_is_fault() {
        let spec = TensorSpec::scores("probs", DType::F32, 4);
        let output = Tensor::from_f32(Shape::new(vec![1, 3]), vec![0.0; 3]).unwrap();
        let err = postprocess(output, &spec, &PostprocessOptions::default()).unwrap_err();
        assert_eq!(err.kind(), tensor_core::ErrorKind::ExecutionFault);
    }
}
