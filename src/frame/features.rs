//! Per-pixel RGB-D features supplied by the feature provider.

use nalgebra::{Vector3, Vector4};

/// A single feature: pixel coordinates, camera-space 3D position and colour.
#[derive(Debug, Clone, PartialEq)]
pub struct FeaturePoint {
    pub x: u32,
    pub y: u32,
    /// Camera-space position (None when the pixel has no depth).
    pub position: Option<Vector3<f64>>,
    /// RGB colour of the pixel.
    pub colour: [u8; 3],
}

impl FeaturePoint {
    /// Build a feature from the provider's homogeneous encoding, where a
    /// negative `w` marks a pixel without a valid position.
    pub fn from_homogeneous(x: u32, y: u32, position: Vector4<f64>, colour: [u8; 3]) -> Self {
        let position = if position.w < 0.0 {
            None
        } else {
            Some(position.xyz())
        };
        Self {
            x,
            y,
            position,
            colour,
        }
    }

    #[inline]
    pub fn is_valid(&self) -> bool {
        self.position.is_some()
    }

    /// Colour as floating-point channels, for comparison against mode statistics.
    pub fn colour_f64(&self) -> Vector3<f64> {
        Vector3::new(
            self.colour[0] as f64,
            self.colour[1] as f64,
            self.colour[2] as f64,
        )
    }
}

/// Row-major image of features for the current frame.
#[derive(Debug, Clone)]
pub struct FeatureImage {
    width: usize,
    height: usize,
    points: Vec<FeaturePoint>,
}

impl FeatureImage {
    /// Wrap a row-major feature buffer. Returns `None` if the buffer length
    /// does not match `width * height`.
    pub fn new(width: usize, height: usize, points: Vec<FeaturePoint>) -> Option<Self> {
        if points.len() != width * height {
            return None;
        }
        Some(Self {
            width,
            height,
            points,
        })
    }

    /// Build an image by evaluating `f(x, y)` for every pixel in row-major
    /// order.
    pub fn from_fn(width: usize, height: usize, mut f: impl FnMut(usize, usize) -> FeaturePoint) -> Self {
        let mut points = Vec::with_capacity(width * height);
        for y in 0..height {
            for x in 0..width {
                points.push(f(x, y));
            }
        }
        Self {
            width,
            height,
            points,
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    /// Number of pixels.
    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Linear (row-major) index of pixel (x, y).
    #[inline]
    pub fn linear_index(&self, x: usize, y: usize) -> usize {
        y * self.width + x
    }

    #[inline]
    pub fn get(&self, index: usize) -> Option<&FeaturePoint> {
        self.points.get(index)
    }

    /// Camera-space position of a pixel, if it has one.
    #[inline]
    pub fn position(&self, index: usize) -> Option<Vector3<f64>> {
        self.points.get(index).and_then(|p| p.position)
    }

    pub fn points(&self) -> &[FeaturePoint] {
        &self.points
    }

    /// Number of pixels carrying a valid camera-space position.
    pub fn count_valid(&self) -> usize {
        self.points.iter().filter(|p| p.is_valid()).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_negative_w_marks_invalid() {
        let valid = FeaturePoint::from_homogeneous(0, 0, Vector4::new(1.0, 2.0, 3.0, 1.0), [0; 3]);
        let invalid =
            FeaturePoint::from_homogeneous(1, 0, Vector4::new(1.0, 2.0, 3.0, -1.0), [0; 3]);

        assert_eq!(valid.position, Some(Vector3::new(1.0, 2.0, 3.0)));
        assert!(!invalid.is_valid());
    }

    #[test]
    fn test_image_rejects_wrong_length() {
        let point = FeaturePoint::from_homogeneous(0, 0, Vector4::new(0.0, 0.0, 1.0, 1.0), [0; 3]);
        assert!(FeatureImage::new(2, 2, vec![point.clone(); 3]).is_none());

        let image = FeatureImage::new(2, 2, vec![point; 4]).unwrap();
        assert_eq!(image.linear_index(1, 1), 3);
        assert_eq!(image.count_valid(), 4);
    }

    #[test]
    fn test_from_fn_is_row_major() {
        let image = FeatureImage::from_fn(3, 2, |x, y| {
            let w = if x == 2 { -1.0 } else { 1.0 };
            FeaturePoint::from_homogeneous(x as u32, y as u32, Vector4::new(0.0, 0.0, 1.0, w), [0; 3])
        });

        let p = image.get(image.linear_index(1, 1)).unwrap();
        assert_eq!((p.x, p.y), (1, 1));
        assert_eq!(image.count_valid(), 4);
        assert!(image.position(5).is_none());
    }
}
