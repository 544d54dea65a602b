//! Input tensor preprocessing

use crate::frame::luminance;
use crate::{ImageCrateDecoder, ImageDecoder, ImageFrame, ImageRef, ProcessError, Rotation};
use model_loader::TensorSpec;
use ndarray::Array4;
use std::sync::Arc;
use tensor_core::{DType, ImageGeometry, Layout, Tensor};
use tracing::debug;

/// Mean subtracted from each channel value when the caller gives none
pub const DEFAULT_IMAGE_MEAN: f32 = 127.5;

/// Divisor applied to each channel value when the caller gives none
pub const DEFAULT_IMAGE_STD: f32 = 127.5;

/// Parameters of one preprocessing pass
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PreprocessParams {
    pub mean: f32,
    pub std: f32,
    pub rotation: Rotation,
}

impl Default for PreprocessParams {
    fn default() -> Self {
        Self {
            mean: DEFAULT_IMAGE_MEAN,
            std: DEFAULT_IMAGE_STD,
            rotation: Rotation::None,
        }
    }
}

impl PreprocessParams {
    pub fn new(mean: f32, std: f32) -> Self {
        Self {
            mean,
            std,
            rotation: Rotation::None,
        }
    }

    pub fn with_rotation(mut self, rotation: Rotation) -> Self {
        self.rotation = rotation;
        self
    }

    /// Reject parameters that would produce NaN or infinite inputs
    pub fn validate(&self) -> Result<(), ProcessError> {
        if !self.mean.is_finite() {
            return Err(ProcessError::InvalidParameter(format!(
                "imageMean must be finite, got {}",
                self.mean
            )));
        }
        if !self.std.is_finite() || self.std == 0.0 {
            return Err(ProcessError::InvalidParameter(format!(
                "imageStd must be finite and non-zero, got {}",
                self.std
            )));
        }
        Ok(())
    }

    /// Normalize one channel value
    pub fn normalize(&self, value: u8) -> f32 {
        (value as f32 - self.mean) / self.std
    }
}

/// Converts caller images into the model's declared input tensor
#[derive(Clone)]
pub struct Preprocessor {
    decoder: Arc<dyn ImageDecoder>,
}

impl Default for Preprocessor {
    fn default() -> Self {
        Self::new(Arc::new(ImageCrateDecoder))
    }
}

impl Preprocessor {
    pub fn new(decoder: Arc<dyn ImageDecoder>) -> Self {
        Self { decoder }
    }

    /// Decode, rotate, resample and normalize `input` for `spec`
    pub fn preprocess(
        &self,
        input: &ImageRef,
        spec: &TensorSpec,
        params: &PreprocessParams,
    ) -> Result<Tensor, ProcessError> {
        params.validate()?;
        let geometry = spec.shape.image_geometry(spec.layout)?;
        let frame = self.decoder.decode(input)?;
        tensor_from_frame(frame, &geometry, spec.dtype, params)
    }
}

/// Build an input tensor from a decoded frame
///
/// `f32` inputs are normalized as `(v - mean) / std`; `u8` inputs carry the
/// raw resampled pixel bytes.
pub fn tensor_from_frame(
    frame: ImageFrame,
    geometry: &ImageGeometry,
    dtype: DType,
    params: &PreprocessParams,
) -> Result<Tensor, ProcessError> {
    params.validate()?;
    if geometry.channels != 1 && geometry.channels != 3 {
        return Err(ProcessError::InvalidParameter(format!(
            "Cannot fill {} channels from an RGB image",
            geometry.channels
        )));
    }

    let (src_w, src_h) = (frame.width(), frame.height());
    let (dst_w, dst_h) = (to_u32(geometry.width)?, to_u32(geometry.height)?);
    let resized = frame.rotate(params.rotation).resize(dst_w, dst_h);
    debug!(
        "Preprocessed {}x{} -> {}x{}x{} ({:?}, rotation {})",
        src_w,
        src_h,
        geometry.height,
        geometry.width,
        geometry.channels,
        dtype,
        params.rotation.degrees()
    );

    let (h, w, c) = (geometry.height, geometry.width, geometry.channels);
    match dtype {
        DType::F32 => {
            let dims = match geometry.layout {
                Layout::Nhwc => (1, h, w, c),
                Layout::Nchw => (1, c, h, w),
            };
            let mut input_array = Array4::<f32>::zeros(dims);
            for y in 0..h {
                for x in 0..w {
                    let channels = pixel_channels(&resized, x, y, c);
                    for (ch, &v) in channels.iter().enumerate().take(c) {
                        let idx = match geometry.layout {
                            Layout::Nhwc => [0, y, x, ch],
                            Layout::Nchw => [0, ch, y, x],
                        };
                        input_array[idx] = params.normalize(v);
                    }
                }
            }
            Ok(Tensor::from_array(input_array.into_dyn()))
        }
        DType::U8 => {
            let mut bytes = vec![0u8; h * w * c];
            for y in 0..h {
                for x in 0..w {
                    let channels = pixel_channels(&resized, x, y, c);
                    for (ch, &v) in channels.iter().enumerate().take(c) {
                        bytes[geometry.index(y, x, ch)] = v;
                    }
                }
            }
            Ok(Tensor::from_u8(geometry.shape(), bytes)?)
        }
    }
}

fn pixel_channels(frame: &ImageFrame, x: usize, y: usize, channels: usize) -> [u8; 3] {
    let [r, g, b] = frame.get_pixel(x as u32, y as u32).unwrap_or([0, 0, 0]);
    if channels == 1 {
        [luminance(r, g, b), 0, 0]
    } else {
        [r, g, b]
    }
}

fn to_u32(dim: usize) -> Result<u32, ProcessError> {
    u32::try_from(dim)
        .map_err(|_| ProcessError::InvalidParameter(format!("Dimension {} too large", dim)))
}
