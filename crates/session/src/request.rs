//! Caller requests and default substitution

use crate::SessionError;
use model_loader::LoadOptions;
use processing::{
    ImageRef, PostprocessOptions, PreprocessParams, Rotation, DEFAULT_IMAGE_MEAN,
    DEFAULT_IMAGE_STD,
};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// `loadModel` request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadModelRequest {
    /// Artifact path; a `file://` prefix is accepted
    pub model: String,
    /// Worker threads; missing or below 1 means 1
    #[serde(default)]
    pub num_threads: Option<i64>,
}

impl LoadModelRequest {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            num_threads: None,
        }
    }

    pub fn with_threads(mut self, num_threads: i64) -> Self {
        self.num_threads = Some(num_threads);
        self
    }

    pub(crate) fn load_options(&self) -> LoadOptions {
        LoadOptions {
            num_threads: self.num_threads,
            ..Default::default()
        }
    }
}

/// `runModelOnImageMulti` request
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunImageRequest {
    /// Image file path; a `file://` prefix is accepted
    pub path: String,
    #[serde(default)]
    pub image_mean: Option<f32>,
    #[serde(default)]
    pub image_std: Option<f32>,
    /// Clockwise rotation in degrees, multiple of 90
    #[serde(default)]
    pub rotation: Option<i32>,
    /// Keep only the K highest scores
    #[serde(default)]
    pub top_k: Option<usize>,
    /// Overrides the session's run timeout
    #[serde(default)]
    pub timeout_ms: Option<u64>,
}

impl RunImageRequest {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            ..Default::default()
        }
    }

    /// Image reference and options after default substitution
    pub fn resolve(&self) -> Result<(ImageRef, RunOptions), SessionError> {
        let rotation = Rotation::from_degrees(self.rotation.unwrap_or(0))?;
        let preprocess = PreprocessParams::new(
            self.image_mean.unwrap_or(DEFAULT_IMAGE_MEAN),
            self.image_std.unwrap_or(DEFAULT_IMAGE_STD),
        )
        .with_rotation(rotation);

        let options = RunOptions {
            preprocess,
            postprocess: PostprocessOptions { top_k: self.top_k },
            timeout_ms: self.timeout_ms,
        };
        options.validate()?;
        Ok((ImageRef::path(&self.path), options))
    }
}

/// Resolved per-run options
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RunOptions {
    pub preprocess: PreprocessParams,
    pub postprocess: PostprocessOptions,
    /// Overrides the session's run timeout
    pub timeout_ms: Option<u64>,
}

impl RunOptions {
    pub fn validate(&self) -> Result<(), SessionError> {
        self.preprocess.validate()?;
        self.postprocess.validate()?;
        if self.timeout_ms == Some(0) {
            return Err(SessionError::InvalidParameter(
                "timeoutMs must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Effective deadline given the session default
    pub(crate) fn timeout(&self, session_default: Option<u64>) -> Option<(u64, Duration)> {
        self.timeout_ms
            .or(session_default)
            .map(|ms| (ms, Duration::from_millis(ms)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use tensor_core::ErrorKind;

    #[test]
    fn test_missing_fields_use_defaults() {
        let request: RunImageRequest = serde_json::from_str(r#"{"path": "file:///img.jpg"}"#).unwrap();
        let (image, options) = request.resolve().unwrap();
        assert_eq!(image, ImageRef::path("/img.jpg"));
        assert_eq!(options.preprocess, PreprocessParams::default());
        assert_eq!(options.postprocess.top_k, None);

        let load: LoadModelRequest =
            serde_json::from_str(r#"{"model": "m.edgm", "numThreads": null}"#).unwrap();
        assert_eq!(load.load_options().thread_count(), 1);
        assert_eq!(
            load.load_options(),
            LoadModelRequest::new("m.edgm").load_options()
        );
    }

    #[test]
    fn test_zero_mean_is_valid_zero_std_is_not() {
        let request = RunImageRequest {
            image_mean: Some(0.0),
            ..RunImageRequest::new("a.png")
        };
        assert_eq!(request.resolve().unwrap().1.preprocess.mean, 0.0);

        let request = RunImageRequest {
            image_std: Some(0.0),
            ..RunImageRequest::new("a.png")
        };
        assert_eq!(request.resolve().unwrap_err().kind(), ErrorKind::InvalidParameter);
    }

    #[test]
    fn test_invalid_rotation_and_top_k() {
        let request = RunImageRequest {
            rotation: Some(45),
            ..RunImageRequest::new("a.png")
        };
        assert_eq!(request.resolve().unwrap_err().kind(), ErrorKind::InvalidParameter);

        let request = RunImageRequest {
            top_k: Some(0),
            ..RunImageRequest::new("a.png")
        };
        assert_eq!(request.resolve().unwrap_err().kind(), ErrorKind::InvalidParameter);
    }

    #[test]
    fn test_timeout_override() {
        let options = RunOptions {
            timeout_ms: Some(20),
            ..Default::default()
        };
        assert_eq!(options.timeout(Some(500)).map(|(ms, _)| ms), Some(20));
        assert_eq!(RunOptions::default().timeout(Some(500)).map(|(ms, _)| ms), Some(500));
        assert!(RunOptions::default().timeout(None).is_none());
    }

    proptest! {
        #[test]
        fn prop_given_values_pass_through(
            mean in -1000.0f32..1000.0,
            std in prop_oneof![-1000.0f32..-0.001, 0.001f32..1000.0],
        ) {
            let request = RunImageRequest {
                image_mean: Some(mean),
                image_std: Some(std),
                ..RunImageRequest::new("a.png")
            };
            let (_, options) = request.resolve().unwrap();
            prop_assert_eq!(options.preprocess.mean, mean);
            prop_assert_eq!(options.preprocess.std, std);
        }

        #[test]
        fn prop_thread_request_clamps(threads in proptest::option::of(any::<i64>())) {
            let request = LoadModelRequest { model: "m".to_string(), num_threads: threads };
            let count = request.load_options().thread_count();
            prop_assert!(count >= 1);
            if let Some(n) = threads.filter(|&n| n >= 1) {
                prop_assert_eq!(count as i64, n);
            }
        }
    }
}
