//! Bounding box types and operations.

use serde::{Deserialize, Serialize};

/// Tolerance used when deciding whether a longitude span covers the globe.
const FULL_CIRCLE_EPSILON: f64 = 1e-6;

/// A geographic or projected bounding box.
///
/// For geographic CRS (EPSG:4326), coordinates are in degrees.
/// For projected CRS (EPSG:27700, etc.), coordinates are in the CRS units.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl BoundingBox {
    /// Create a new bounding box from corner coordinates.
    pub fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        Self {
            min_x,
            min_y,
            max_x,
            max_y,
        }
    }

    /// Smallest box containing every finite `(x, y)` value.
    ///
    /// Returns `None` when either iterator yields no finite value.
    pub fn from_extents<X, Y>(xs: X, ys: Y) -> Option<Self>
    where
        X: IntoIterator<Item = f64>,
        Y: IntoIterator<Item = f64>,
    {
        let (min_x, max_x) = min_max(xs)?;
        let (min_y, max_y) = min_max(ys)?;
        Some(Self::new(min_x, min_y, max_x, max_y))
    }

    /// Width of the bounding box in coordinate units.
    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    /// Check whether `other` lies inside this box, allowing `tolerance` slack on every side.
    pub fn contains(&self, other: &BoundingBox, tolerance: f64) -> bool {
        other.min_x >= self.min_x - tolerance
            && other.min_y >= self.min_y - tolerance
            && other.max_x <= self.max_x + tolerance
            && other.max_y <= self.max_y + tolerance
    }

    /// Component-wise comparison within `tolerance`.
    pub fn approx_eq(&self, other: &BoundingBox, tolerance: f64) -> bool {
        (self.min_x - other.min_x).abs() <= tolerance
            && (self.min_y - other.min_y).abs() <= tolerance
            && (self.max_x - other.max_x).abs() <= tolerance
            && (self.max_y - other.max_y).abs() <= tolerance
    }

    /// `[min_x, min_y, max_x, max_y]`, the order used by GeoJSON and STAC.
    pub fn to_array(&self) -> [f64; 4] {
        [self.min_x, self.min_y, self.max_x, self.max_y]
    }

    /// Map longitudes expressed in `[0, 360)` onto `[-180, 180]`.
    ///
    /// A box spanning the full circle, or one that straddles the antimeridian
    /// after shifting, becomes `[-180, 180]` in x. Latitudes are clamped to
    /// `[-90, 90]`.
    pub fn normalize_longitudes(&self) -> BoundingBox {
        let min_y = self.min_y.max(-90.0);
        let max_y = self.max_y.min(90.0);

        if self.width() >= 360.0 - FULL_CIRCLE_EPSILON {
            return BoundingBox::new(-180.0, min_y, 180.0, max_y);
        }

        let (min_x, max_x) = if self.min_x >= 180.0 {
            (self.min_x - 360.0, self.max_x - 360.0)
        } else if self.max_x > 180.0 {
            // Straddles the antimeridian; a single box cannot express it.
            (-180.0, 180.0)
        } else {
            (self.min_x, self.max_x)
        };

        BoundingBox::new(min_x.max(-180.0), min_y, max_x.min(180.0), max_y)
    }

    /// Closed exterior ring, counter-clockwise, starting at the south-west corner.
    pub fn to_polygon_ring(&self) -> Vec<[f64; 2]> {
        vec![
            [self.min_x, self.min_y],
            [self.max_x, self.min_y],
            [self.max_x, self.max_y],
            [self.min_x, self.max_y],
            [self.min_x, self.min_y],
        ]
    }

    /// Whether every coordinate is finite and the box is not inverted.
    pub fn is_valid(&self) -> bool {
        self.to_array().iter().all(|v| v.is_finite())
            && self.min_x <= self.max_x
            && self.min_y <= self.max_y
    }
}

fn min_max<I: IntoIterator<Item = f64>>(values: I) -> Option<(f64, f64)> {
    values
        .into_iter()
        .filter(|v| v.is_finite())
        .fold(None, |acc, v| match acc {
            None => Some((v, v)),
            Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
        })
}
