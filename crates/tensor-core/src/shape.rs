//! Tensor shapes and image layouts

use crate::TensorError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Dimensions of a tensor, outermost first
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Shape(Vec<usize>);

impl Shape {
    /// Create a shape from its dimensions
    pub fn new(dims: Vec<usize>) -> Self {
        Self(dims)
    }

    /// Image shape with batch size 1 in the given layout
    pub fn image(layout: Layout, height: usize, width: usize, channels: usize) -> Self {
        match layout {
            Layout::Nhwc => Self(vec![1, height, width, channels]),
            Layout::Nchw => Self(vec![1, channels, height, width]),
        }
    }

    pub fn dims(&self) -> &[usize] {
        &self.0
    }

    pub fn rank(&self) -> usize {
        self.0.len()
    }

    /// Total number of elements (1 for a scalar), saturating at `usize::MAX`
    pub fn num_elements(&self) -> usize {
        self.checked_num_elements().unwrap_or(usize::MAX)
    }

    /// Total number of elements, `None` on overflow
    pub fn checked_num_elements(&self) -> Option<usize> {
        self.0.iter().try_fold(1usize, |acc, &d| acc.checked_mul(d))
    }

    /// True when any dimension is zero
    pub fn has_zero_dim(&self) -> bool {
        self.0.iter().any(|&d| d == 0)
    }

    /// Interpret as a single image tensor in `layout`
    pub fn image_geometry(&self, layout: Layout) -> Result<ImageGeometry, TensorError> {
        let [batch, a, b, c] = self.0.as_slice() else {
            return Err(TensorError::NotAnImage(self.to_string()));
        };
        if *batch != 1 {
            return Err(TensorError::NotAnImage(self.to_string()));
        }
        let (height, width, channels) = match layout {
            Layout::Nhwc => (*a, *b, *c),
            Layout::Nchw => (*b, *c, *a),
        };
        Ok(ImageGeometry {
            height,
            width,
            channels,
            layout,
        })
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, d) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", d)?;
        }
        write!(f, "]")
    }
}

impl From<Vec<usize>> for Shape {
    fn from(dims: Vec<usize>) -> Self {
        Self(dims)
    }
}

/// Memory layout of an image tensor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Layout {
    /// Batch, height, width, channels (interleaved pixels)
    #[default]
    Nhwc,
    /// Batch, channels, height, width (planar)
    Nchw,
}

/// Spatial size and channel count of an image input
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageGeometry {
    pub height: usize,
    pub width: usize,
    pub channels: usize,
    pub layout: Layout,
}

impl ImageGeometry {
    /// Shape of the tensor this geometry describes
    pub fn shape(&self) -> Shape {
        Shape::image(self.layout, self.height, self.width, self.channels)
    }

    /// Flat index of pixel (`y`, `x`) channel `c`
    pub fn index(&self, y: usize, x: usize, c: usize) -> usize {
        match self.layout {
            Layout::Nhwc => (y * self.width + x) * self.channels + c,
            Layout::Nchw => (c * self.height + y) * self.width + x,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_image_geometry_nhwc() {
        let shape = Shape::new(vec![1, 224, 200, 3]);
        let geo = shape.image_geometry(Layout::Nhwc).unwrap();
        assert_eq!((geo.height, geo.width, geo.channels), (224, 200, 3));
        assert_eq!(geo.shape(), shape);
    }

    #[test]
    fn test_image_geometry_nchw() {
        let shape = Shape::new(vec![1, 3, 32, 16]);
        let geo = shape.image_geometry(Layout::Nchw).unwrap();
        assert_eq!((geo.height, geo.width, geo.channels), (32, 16, 3));
        // Planar: channel 1 starts after a full 32x16 plane
        assert_eq!(geo.index(0, 0, 1), 32 * 16);
    }

    #[test]
    fn test_non_image_shapes_rejected() {
        assert!(Shape::new(vec![1, 1000]).image_geometry(Layout::Nhwc).is_err());
        assert!(Shape::new(vec![2, 8, 8, 3]).image_geometry(Layout::Nhwc).is_err());
    }

    #[test]
    fn test_element_count_overflow() {
        let shape = Shape::new(vec![4294967296, 4294967296]);
        assert_eq!(shape.checked_num_elements(), None);
        assert_eq!(shape.num_elements(), usize::MAX);
        assert_eq!(Shape::new(vec![1, 224, 224, 3]).checked_num_elements(), Some(150528));
        assert_eq!(Shape::new(vec![]).checked_num_elements(), Some(1));
    }

    #[test]
    fn test_display() {
        assert_eq!(Shape::new(vec![1, 224, 224, 3]).to_string(), "[1, 224, 224, 3]");
    }
}
