//! North-up georeferenced grids built from CF coordinate vectors.

use ukcp18_common::{BoundingBox, DataType};

use crate::error::{CogError, CogResult};

/// Allowed deviation of a cell step from the mean step, relative to the step.
const SPACING_TOLERANCE: f64 = 1e-4;

/// One axis of a grid: cell centres plus optional `[lower, upper]` bounds.
#[derive(Debug, Clone, Copy)]
pub struct AxisCoords<'a> {
    pub centres: &'a [f64],
    pub bounds: Option<&'a [[f64; 2]]>,
}

impl<'a> AxisCoords<'a> {
    pub fn new(centres: &'a [f64]) -> Self {
        Self {
            centres,
            bounds: None,
        }
    }

    pub fn with_bounds(mut self, bounds: Option<&'a [[f64; 2]]>) -> Self {
        self.bounds = bounds.filter(|b| b.len() == self.centres.len());
        self
    }

    /// Mean signed step between centres; errors when the spacing is irregular.
    fn step(&self, name: &str) -> CogResult<f64> {
        let n = self.centres.len();
        if n < 2 {
            return match self.bounds {
                Some(&[[lo, hi]]) if hi != lo => Ok(hi - lo),
                _ => Err(CogError::IrregularGrid(format!(
                    "{} axis needs two cells or cell bounds",
                    name
                ))),
            };
        }

        let step = (self.centres[n - 1] - self.centres[0]) / (n - 1) as f64;
        if step == 0.0 || !step.is_finite() {
            return Err(CogError::IrregularGrid(format!("{} axis is not monotonic", name)));
        }

        for (i, pair) in self.centres.windows(2).enumerate() {
            let d = pair[1] - pair[0];
            if ((d - step) / step).abs() > SPACING_TOLERANCE {
                return Err(CogError::IrregularGrid(format!(
                    "{} axis spacing varies at index {} ({} vs {})",
                    name, i, d, step
                )));
            }
        }
        Ok(step)
    }

    /// Outer cell edges `(min, max)` and absolute cell size.
    fn edges(&self, name: &str) -> CogResult<(f64, f64, f64)> {
        let step = self.step(name)?;
        let n = self.centres.len();

        if let Some(bounds) = self.bounds {
            let (min, max) = bounds
                .iter()
                .flatten()
                .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
                    (lo.min(*v), hi.max(*v))
                });
            if min.is_finite() && max.is_finite() && max > min {
                return Ok((min, max, (max - min) / n as f64));
            }
        }

        let first = self.centres[0];
        let last = self.centres[n - 1];
        let half = step.abs() / 2.0;
        Ok((first.min(last) - half, first.max(last) + half, step.abs()))
    }

    fn is_ascending(&self) -> bool {
        match self.centres {
            [first, .., last] => last > first,
            _ => true,
        }
    }
}

/// A single-band raster in north-up orientation with its affine transform.
#[derive(Debug, Clone)]
pub struct GeoGrid {
    pub width: usize,
    pub height: usize,
    /// Row-major, first row northernmost
    pub data: Vec<f64>,
    /// Band type written to the file
    pub data_type: DataType,
    /// GDAL geotransform `[origin_x, pixel_w, 0, origin_y, 0, -pixel_h]`
    pub transform: [f64; 6],
    pub nodata: Option<f64>,
}

impl GeoGrid {
    /// Build a grid from coordinate vectors and row-major data in file order
    /// (row index follows `y`, column index follows `x`).
    ///
    /// Rows are flipped when `y` ascends so the first row is the northern edge.
    /// A descending `x` axis is rejected. The band type defaults to `float32`.
    pub fn from_coordinates(
        x: AxisCoords<'_>,
        y: AxisCoords<'_>,
        data: Vec<f64>,
        nodata: Option<f64>,
    ) -> CogResult<Self> {
        let width = x.centres.len();
        let height = y.centres.len();
        if width == 0 || height == 0 || data.len() != width * height {
            return Err(CogError::ShapeMismatch {
                width,
                height,
                actual: data.len(),
            });
        }
        if !x.is_ascending() {
            return Err(CogError::IrregularGrid("x axis must be ascending".to_string()));
        }

        let (min_x, _, pixel_w) = x.edges("x")?;
        let (_, max_y, pixel_h) = y.edges("y")?;

        let data = if y.is_ascending() && height > 1 {
            flip_rows(data, width)
        } else {
            data
        };

        Ok(Self {
            width,
            height,
            data,
            data_type: DataType::Float32,
            transform: [min_x, pixel_w, 0.0, max_y, 0.0, -pixel_h],
            nodata,
        })
    }

    pub fn with_data_type(mut self, data_type: DataType) -> Self {
        self.data_type = data_type;
        self
    }

    /// Bounding box of the outer cell edges in the grid's CRS.
    pub fn bbox(&self) -> BoundingBox {
        transform_bbox(&self.transform, self.width, self.height)
    }
}

/// Envelope covered by a `width` x `height` raster under `gt`.
pub fn transform_bbox(gt: &[f64; 6], width: usize, height: usize) -> BoundingBox {
    let (w, h) = (width as f64, height as f64);
    let corners = [(0.0, 0.0), (w, 0.0), (0.0, h), (w, h)];
    let xs = corners.iter().map(|(c, r)| gt[0] + c * gt[1] + r * gt[2]);
    let ys = corners.iter().map(|(c, r)| gt[3] + c * gt[4] + r * gt[5]);
    BoundingBox::from_extents(xs, ys).unwrap_or_else(|| BoundingBox::new(gt[0], gt[3], gt[0], gt[3]))
}

/// STAC `proj:transform` ordering of a GDAL geotransform.
pub fn stac_transform(gt: &[f64; 6]) -> [f64; 6] {
    [gt[1], gt[2], gt[0], gt[4], gt[5], gt[3]]
}

fn flip_rows(data: Vec<f64>, width: usize) -> Vec<f64> {
    data.chunks(width).rev().flatten().copied().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_utils::{assert_approx_eq, cell_centres};

    #[test]
    fn test_ascending_y_is_flipped() {
        let x = [0.5, 1.5, 2.5];
        let y = [10.5, 11.5];
        let data = vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0];

        let grid =
            GeoGrid::from_coordinates(AxisCoords::new(&x), AxisCoords::new(&y), data, None).unwrap();

        assert_eq!(grid.data, vec![4.0, 5.0, 6.0, 1.0, 2.0, 3.0]);
        assert_eq!(grid.transform, [0.0, 1.0, 0.0, 12.0, 0.0, -1.0]);
        assert_eq!(grid.bbox(), BoundingBox::new(0.0, 10.0, 3.0, 12.0));
    }

    #[test]
    fn test_descending_y_kept() {
        let x = [0.5, 1.5];
        let y = [11.5, 10.5];
        let grid = GeoGrid::from_coordinates(
            AxisCoords::new(&x),
            AxisCoords::new(&y),
            vec![1.0, 2.0, 3.0, 4.0],
            Some(-999.0),
        )
        .unwrap();
        assert_eq!(grid.data, vec![1.0, 2.0, 3.0, 4.0]);
        assert_eq!(grid.transform[3], 12.0);
        assert_eq!(grid.nodata, Some(-999.0));
    }

    #[test]
    fn test_bounds_define_edges() {
        let x = cell_centres(-10.0, 1.0, 12);
        let y = cell_centres(49.0, 1.0, 12);
        let xb: Vec<[f64; 2]> = x.iter().map(|c| [c - 0.5, c + 0.5]).collect();
        let yb: Vec<[f64; 2]> = y.iter().map(|c| [c - 0.5, c + 0.5]).collect();

        let grid = GeoGrid::from_coordinates(
            AxisCoords::new(&x).with_bounds(Some(xb.as_slice())),
            AxisCoords::new(&y).with_bounds(Some(yb.as_slice())),
            vec![0.0; 144],
            None,
        )
        .unwrap();

        let bbox = grid.bbox();
        assert_approx_eq!(bbox.min_x, -10.0, 1e-9);
        assert_approx_eq!(bbox.min_y, 49.0, 1e-9);
        assert_approx_eq!(bbox.max_x, 2.0, 1e-9);
        assert_approx_eq!(bbox.max_y, 61.0, 1e-9);
    }

    #[test]
    fn test_irregular_spacing_rejected() {
        let x = [0.0, 1.0, 3.0];
        let y = [0.0, 1.0];
        let err = GeoGrid::from_coordinates(
            AxisCoords::new(&x),
            AxisCoords::new(&y),
            vec![0.0; 6],
            None,
        )
        .unwrap_err();
        assert!(err.is_grid_error());
    }

    #[test]
    fn test_shape_mismatch_rejected() {
        let x = [0.0, 1.0];
        let err = GeoGrid::from_coordinates(
            AxisCoords::new(&x),
            AxisCoords::new(&x),
            vec![0.0; 3],
            None,
        )
        .unwrap_err();
        assert!(matches!(err, CogError::ShapeMismatch { actual: 3, .. }));
    }

    #[test]
    fn test_single_cell_uses_bounds() {
        let x = [0.5, 1.5];
        let y = [50.0];
        let yb = [[49.0, 51.0]];
        let grid = GeoGrid::from_coordinates(
            AxisCoords::new(&x),
            AxisCoords::new(&y).with_bounds(Some(yb.as_slice())),
            vec![1.0, 2.0],
            None,
        )
        .unwrap();
        assert_eq!(grid.transform[3], 51.0);
        assert_eq!(grid.transform[5], -2.0);
    }

    #[test]
    fn test_stac_transform_order() {
        let gt = [-10.0, 1.0, 0.0, 61.0, 0.0, -1.0];
        assert_eq!(stac_transform(&gt), [1.0, 0.0, -10.0, 0.0, -1.0, 61.0]);
    }
}
