//! Image sources and decoding

use crate::{ImageFrame, ProcessError};
use model_loader::strip_file_scheme;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Reference to the image a run should consume
#[derive(Debug, Clone, PartialEq)]
pub enum ImageRef {
    /// Encoded image file on disk (`file://` prefix accepted)
    Path(PathBuf),
    /// Encoded image bytes (JPEG, PNG, ...)
    Encoded(Vec<u8>),
    /// Already decoded RGB pixels
    Pixels(ImageFrame),
}

impl ImageRef {
    /// Reference a file, stripping a `file://` scheme
    pub fn path(path: &str) -> Self {
        ImageRef::Path(PathBuf::from(strip_file_scheme(path)))
    }

    /// Short description for logs
    pub fn describe(&self) -> String {
        match self {
            ImageRef::Path(p) => p.display().to_string(),
            ImageRef::Encoded(bytes) => format!("<{} encoded bytes>", bytes.len()),
            ImageRef::Pixels(frame) => format!("<{}x{} pixels>", frame.width(), frame.height()),
        }
    }
}

/// Turns image references into RGB frames
pub trait ImageDecoder: Send + Sync {
    fn decode(&self, source: &ImageRef) -> Result<ImageFrame, ProcessError>;
}

/// Decoder backed by the `image` crate
#[derive(Debug, Clone, Copy, Default)]
pub struct ImageCrateDecoder;

impl ImageCrateDecoder {
    fn decode_path(path: &Path) -> Result<ImageFrame, ProcessError> {
        if !path.is_file() {
            return Err(ProcessError::NotFound(path.display().to_string()));
        }
        let img = image::open(path)
            .map_err(|e| ProcessError::Decode(format!("{}: {}", path.display(), e)))?;
        Ok(ImageFrame::from_rgb_image(img.to_rgb8()))
    }
}

impl ImageDecoder for ImageCrateDecoder {
    fn decode(&self, source: &ImageRef) -> Result<ImageFrame, ProcessError> {
        debug!("Decoding image {}", source.describe());
        match source {
            ImageRef::Path(path) => Self::decode_path(path),
            ImageRef::Encoded(bytes) => {
                let img = image::load_from_memory(bytes)
                    .map_err(|e| ProcessError::Decode(e.to_string()))?;
                Ok(ImageFrame::from_rgb_image(img.to_rgb8()))
            }
            ImageRef::Pixels(frame) => Ok(frame.clone()),
        }
    }
}
