use serde::{Deserialize, Serialize};

use crate::consts::GRID_TOLERANCE_PX;
use crate::error::{CoregError, Result};

/// Affine mapping from pixel space to map space, GDAL ordering.
///
/// Pixel coordinates are continuous: `(0, 0)` is the outer corner of the
/// first pixel, `(0.5, 0.5)` its centre.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoTransform {
    pub top_left_x: f64,
    pub pixel_width: f64,
    pub rotation_x: f64,
    pub top_left_y: f64,
    pub rotation_y: f64,
    pub pixel_height: f64,
}

impl Default for GeoTransform {
    /// Pixel-coordinate mode: one map unit per pixel, y pointing down in map space.
    fn default() -> Self {
        Self::from_gdal([0.0, 1.0, 0.0, 0.0, 0.0, -1.0])
    }
}

impl GeoTransform {
    pub fn new(top_left_x: f64, pixel_width: f64, top_left_y: f64, pixel_height: f64) -> Self {
        Self {
            top_left_x,
            pixel_width,
            rotation_x: 0.0,
            top_left_y,
            rotation_y: 0.0,
            pixel_height,
        }
    }

    pub fn from_gdal(gt: [f64; 6]) -> Self {
        Self {
            top_left_x: gt[0],
            pixel_width: gt[1],
            rotation_x: gt[2],
            top_left_y: gt[3],
            rotation_y: gt[4],
            pixel_height: gt[5],
        }
    }

    pub fn to_gdal(&self) -> [f64; 6] {
        [
            self.top_left_x,
            self.pixel_width,
            self.rotation_x,
            self.top_left_y,
            self.rotation_y,
            self.pixel_height,
        ]
    }

    /// Reject degenerate transforms (zero pixel size or singular matrix).
    pub fn validate(&self) -> Result<()> {
        if self.pixel_width == 0.0 || self.pixel_height == 0.0 {
            return Err(CoregError::InvalidRaster(format!(
                "pixel size must be non-zero, got {} x {}",
                self.pixel_width, self.pixel_height
            )));
        }
        if self.determinant().abs() < f64::EPSILON {
            return Err(CoregError::InvalidRaster(
                "geotransform is not invertible".into(),
            ));
        }
        Ok(())
    }

    /// Rotation or shear terms are present.
    pub fn is_rotated(&self) -> bool {
        self.rotation_x != 0.0 || self.rotation_y != 0.0
    }

    fn determinant(&self) -> f64 {
        self.pixel_width * self.pixel_height - self.rotation_x * self.rotation_y
    }

    pub fn pixel_to_map(&self, col: f64, row: f64) -> (f64, f64) {
        (
            self.top_left_x + col * self.pixel_width + row * self.rotation_x,
            self.top_left_y + col * self.rotation_y + row * self.pixel_height,
        )
    }

    /// Inverse of [`pixel_to_map`](Self::pixel_to_map). Returns `(col, row)`.
    pub fn map_to_pixel(&self, x: f64, y: f64) -> (f64, f64) {
        let det = self.determinant();
        let dx = x - self.top_left_x;
        let dy = y - self.top_left_y;
        (
            (dx * self.pixel_height - dy * self.rotation_x) / det,
            (dy * self.pixel_width - dx * self.rotation_y) / det,
        )
    }

    /// Convert a pixel-space displacement into a map-space displacement.
    pub fn pixel_delta_to_map(&self, dx_px: f64, dy_px: f64) -> (f64, f64) {
        (
            dx_px * self.pixel_width + dy_px * self.rotation_x,
            dx_px * self.rotation_y + dy_px * self.pixel_height,
        )
    }

    /// Same transform with its origin moved by a map-space vector.
    pub fn translated(&self, dx_map: f64, dy_map: f64) -> Self {
        Self {
            top_left_x: self.top_left_x + dx_map,
            top_left_y: self.top_left_y + dy_map,
            ..*self
        }
    }

    /// Ground sampling distance along each pixel axis, as positive lengths.
    pub fn resolution(&self) -> (f64, f64) {
        (
            self.pixel_width.hypot(self.rotation_y),
            self.rotation_x.hypot(self.pixel_height),
        )
    }

    /// Map-space bounding box of a `rows x cols` raster on this grid.
    pub fn footprint(&self, rows: usize, cols: usize) -> BoundingBox {
        let corners = [
            self.pixel_to_map(0.0, 0.0),
            self.pixel_to_map(cols as f64, 0.0),
            self.pixel_to_map(0.0, rows as f64),
            self.pixel_to_map(cols as f64, rows as f64),
        ];
        BoundingBox::from_points(&corners)
    }

    /// Same pixel size, no rotation, and origins separated by a whole number of pixels.
    pub fn is_aligned_with(&self, other: &GeoTransform) -> bool {
        if self.is_rotated() || other.is_rotated() {
            return false;
        }
        let tol_x = self.pixel_width.abs() * GRID_TOLERANCE_PX;
        let tol_y = self.pixel_height.abs() * GRID_TOLERANCE_PX;
        if (self.pixel_width - other.pixel_width).abs() > tol_x
            || (self.pixel_height - other.pixel_height).abs() > tol_y
        {
            return false;
        }
        let off_x = (other.top_left_x - self.top_left_x) / self.pixel_width;
        let off_y = (other.top_left_y - self.top_left_y) / self.pixel_height;
        (off_x - off_x.round()).abs() < 1e-4 && (off_y - off_y.round()).abs() < 1e-4
    }
}

/// Axis-aligned rectangle in map coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl BoundingBox {
    pub fn from_points(points: &[(f64, f64)]) -> Self {
        let mut bb = Self {
            min_x: f64::INFINITY,
            min_y: f64::INFINITY,
            max_x: f64::NEG_INFINITY,
            max_y: f64::NEG_INFINITY,
        };
        for &(x, y) in points {
            bb.min_x = bb.min_x.min(x);
            bb.min_y = bb.min_y.min(y);
            bb.max_x = bb.max_x.max(x);
            bb.max_y = bb.max_y.max(y);
        }
        bb
    }

    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }

    pub fn center(&self) -> (f64, f64) {
        (
            0.5 * (self.min_x + self.max_x),
            0.5 * (self.min_y + self.max_y),
        )
    }

    pub fn intersection(&self, other: &BoundingBox) -> Option<BoundingBox> {
        let bb = BoundingBox {
            min_x: self.min_x.max(other.min_x),
            min_y: self.min_y.max(other.min_y),
            max_x: self.max_x.min(other.max_x),
            max_y: self.max_y.min(other.max_y),
        };
        (bb.width() > 0.0 && bb.height() > 0.0).then_some(bb)
    }

    pub fn contains_point(&self, x: f64, y: f64) -> bool {
        x >= self.min_x && x <= self.max_x && y >= self.min_y && y <= self.max_y
    }

    /// `other` lies inside `self`, allowing `tol` map units of slack on every side.
    pub fn contains(&self, other: &BoundingBox, tol: f64) -> bool {
        other.min_x >= self.min_x - tol
            && other.max_x <= self.max_x + tol
            && other.min_y >= self.min_y - tol
            && other.max_y <= self.max_y + tol
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pixel_map_roundtrip_rotated() {
        let gt = GeoTransform::from_gdal([335440.0, 10.0, 0.5, 5866490.0, 0.25, -10.0]);
        let (x, y) = gt.pixel_to_map(12.5, 40.25);
        let (col, row) = gt.map_to_pixel(x, y);
        assert!((col - 12.5).abs() < 1e-9);
        assert!((row - 40.25).abs() < 1e-9);
    }

    #[test]
    fn test_alignment_with_integer_offset() {
        let a = GeoTransform::new(330000.0, 10.0, 5862000.0, -10.0);
        let b = GeoTransform::new(335440.0, 10.0, 5866490.0, -10.0);
        assert!(a.is_aligned_with(&b));

        let c = GeoTransform::new(335445.0, 10.0, 5866490.0, -10.0);
        assert!(!a.is_aligned_with(&c));
    }

    #[test]
    fn test_footprint_north_up() {
        let gt = GeoTransform::new(100.0, 2.0, 500.0, -2.0);
        let bb = gt.footprint(10, 20);
        assert_eq!(bb.min_x, 100.0);
        assert_eq!(bb.max_x, 140.0);
        assert_eq!(bb.min_y, 480.0);
        assert_eq!(bb.max_y, 500.0);
    }

    #[test]
    fn test_zero_pixel_size_rejected() {
        let gt = GeoTransform::new(0.0, 0.0, 0.0, -1.0);
        assert!(gt.validate().is_err());
    }
}
