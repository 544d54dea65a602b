//! Decoded image frames

use crate::ProcessError;
use image::imageops::{self, FilterType};
use image::RgbImage;

/// Clockwise rotation applied before resampling
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Rotation {
    #[default]
    None,
    Cw90,
    Cw180,
    Cw270,
}

impl Rotation {
    /// Parse a rotation in degrees; only multiples of 90 are accepted
    pub fn from_degrees(degrees: i32) -> Result<Self, ProcessError> {
        match degrees.rem_euclid(360) {
            0 => Ok(Rotation::None),
            90 => Ok(Rotation::Cw90),
            180 => Ok(Rotation::Cw180),
            270 => Ok(Rotation::Cw270),
            _ => Err(ProcessError::InvalidParameter(format!(
                "Rotation must be a multiple of 90 degrees, got {}",
                degrees
            ))),
        }
    }

    pub fn degrees(&self) -> i32 {
        match self {
            Rotation::None => 0,
            Rotation::Cw90 => 90,
            Rotation::Cw180 => 180,
            Rotation::Cw270 => 270,
        }
    }
}

/// Decoded RGB image
#[derive(Debug, Clone, PartialEq)]
pub struct ImageFrame {
    /// RGB pixel data (width * height * 3)
    data: Vec<u8>,
    width: u32,
    height: u32,
}

impl ImageFrame {
    /// Create a frame from raw interleaved RGB data
    pub fn new(data: Vec<u8>, width: u32, height: u32) -> Result<Self, ProcessError> {
        if width == 0 || height == 0 {
            return Err(ProcessError::InvalidParameter(format!(
                "Image has zero area ({}x{})",
                width, height
            )));
        }
        let expected = width as usize * height as usize * 3;
        if data.len() != expected {
            return Err(ProcessError::InvalidParameter(format!(
                "RGB buffer for {}x{} needs {} bytes, got {}",
                width,
                height,
                expected,
                data.len()
            )));
        }
        Ok(Self {
            data,
            width,
            height,
        })
    }

    /// Frame filled with one color
    pub fn solid(width: u32, height: u32, rgb: [u8; 3]) -> Result<Self, ProcessError> {
        let data = rgb
            .iter()
            .copied()
            .cycle()
            .take(width as usize * height as usize * 3)
            .collect();
        Self::new(data, width, height)
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Get pixel at (x, y)
    pub fn get_pixel(&self, x: u32, y: u32) -> Option<[u8; 3]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let idx = ((y * self.width + x) * 3) as usize;
        Some([self.data[idx], self.data[idx + 1], self.data[idx + 2]])
    }

    /// Rotate clockwise
    pub fn rotate(self, rotation: Rotation) -> ImageFrame {
        if rotation == Rotation::None {
            return self;
        }
        let Some(img) = self.to_rgb_image() else {
            return self;
        };
        let rotated = match rotation {
            Rotation::None => img,
            Rotation::Cw90 => imageops::rotate90(&img),
            Rotation::Cw180 => imageops::rotate180(&img),
            Rotation::Cw270 => imageops::rotate270(&img),
        };
        Self::from_rgb_image(rotated)
    }

    /// Resize with bilinear interpolation, stretching to the target size
    pub fn resize(&self, new_width: u32, new_height: u32) -> ImageFrame {
        if new_width == self.width && new_height == self.height {
            return self.clone();
        }
        match self.to_rgb_image() {
            Some(img) => Self::from_rgb_image(imageops::resize(
                &img,
                new_width,
                new_height,
                FilterType::Triangle,
            )),
            None => self.clone(),
        }
    }

    fn to_rgb_image(&self) -> Option<RgbImage> {
        RgbImage::from_raw(self.width, self.height, self.data.clone())
    }

    pub(crate) fn from_rgb_image(img: RgbImage) -> ImageFrame {
        let (width, height) = img.dimensions();
        ImageFrame {
            data: img.into_raw(),
            width,
            height,
        }
    }
}

/// Luminance formula: 0.299*R + 0.587*G + 0.114*B
pub(crate) fn luminance(r: u8, g: u8, b: u8) -> u8 {
    (r as f32 * 0.299 + g as f32 * 0.587 + b as f32 * 0.114).round() as u8
}
