//! Tensor Pre/Post-Processing
//!
//! Turns caller images into the model's declared input tensor and model
//! output tensors into structured results.
//!
//! Resampling policy: bilinear (triangle filter), stretched to the declared
//! spatial size without preserving aspect ratio or cropping. The policy is
//! fixed so results are reproducible across runs and devices.

mod error;
mod frame;
mod postprocess;
mod preprocess;
mod source;

pub use error::ProcessError;
pub use frame::{ImageFrame, Rotation};
pub use postprocess::{postprocess, ClassScore, InferenceResult, PostprocessOptions};
pub use preprocess::{
    tensor_from_frame, PreprocessParams, Preprocessor, DEFAULT_IMAGE_MEAN, DEFAULT_IMAGE_STD,
};
pub use source::{ImageCrateDecoder, ImageDecoder, ImageRef};
