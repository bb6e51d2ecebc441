//! In-memory handle on an opened (possibly merged) NetCDF dataset.
//!
//! Coordinates, attributes and variable shapes are read eagerly when the
//! dataset is opened; data values are only read through [`Dataset::read_slice`].

use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use tracing::debug;

use ukcp18_common::{BoundingBox, CrsDescriptor, DataType, TemporalInterval};

use crate::attributes::Attributes;
use crate::error::{NetCdfError, NetCdfResult};
use crate::native;

/// A 1-D coordinate variable.
#[derive(Debug, Clone, PartialEq)]
pub struct CoordinateAxis {
    /// Variable name (`longitude`, `projection_y_coordinate`, ...)
    pub name: String,
    /// Dimension the coordinate indexes
    pub dimension: String,
    /// Cell centre values
    pub values: Vec<f64>,
    /// Cell edges `[lower, upper]` from the CF `bounds` variable, when present
    pub bounds: Option<Vec<[f64; 2]>>,
    pub attributes: Attributes,
}

impl CoordinateAxis {
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Whether values increase along the axis.
    pub fn is_ascending(&self) -> bool {
        self.values.len() < 2 || self.values[1] > self.values[0]
    }

    /// `(min, max)` covered by the axis cells, edges included.
    ///
    /// Uses the bounds variable when present; otherwise each end is extended
    /// by half of its neighbouring step. A single cell without bounds has no
    /// width and yields its centre twice.
    pub fn edge_extent(&self) -> Option<(f64, f64)> {
        if let Some(bounds) = &self.bounds {
            let flat = bounds.iter().flat_map(|b| b.iter().copied());
            return min_max(flat);
        }

        let n = self.values.len();
        match n {
            0 => None,
            1 => Some((self.values[0], self.values[0])),
            _ => {
                let first_half = (self.values[1] - self.values[0]) / 2.0;
                let last_half = (self.values[n - 1] - self.values[n - 2]) / 2.0;
                let a = self.values[0] - first_half;
                let b = self.values[n - 1] + last_half;
                Some((a.min(b), a.max(b)))
            }
        }
    }

    pub fn units(&self) -> Option<&str> {
        self.attributes.get_text("units")
    }
}

/// Shape and metadata of a variable, without its data.
#[derive(Debug, Clone, PartialEq)]
pub struct VariableInfo {
    pub name: String,
    pub dimensions: Vec<String>,
    pub shape: Vec<usize>,
    /// Storage type; `None` for text and compound variables
    pub data_type: Option<DataType>,
    pub attributes: Attributes,
    /// Index into [`Dataset::sources`] of the file holding the data
    pub(crate) source: usize,
    /// Leading rows skipped along y when the file's grid had to be aligned
    pub(crate) y_offset: usize,
}

impl VariableInfo {
    pub fn long_name(&self) -> Option<&str> {
        self.attributes.get_text("long_name")
    }

    pub fn units(&self) -> Option<&str> {
        self.attributes.get_text("units")
    }

    pub fn description(&self) -> Option<&str> {
        self.attributes
            .get_text("description")
            .or_else(|| self.attributes.get_text("comment"))
    }

    pub fn spans(&self, dimension: &str) -> bool {
        self.dimensions.iter().any(|d| d == dimension)
    }
}

/// One 2-D slice of a variable, row-major in file order (first row = first y value).
#[derive(Debug, Clone, PartialEq)]
pub struct Grid2D {
    pub variable: String,
    pub width: usize,
    pub height: usize,
    pub values: Vec<f64>,
    /// Type the values should be stored as: the variable's own type, or a
    /// float type when CF packing was undone
    pub data_type: DataType,
    /// Value written into missing cells
    pub nodata: Option<f64>,
}

/// An opened NetCDF dataset.
#[derive(Debug, Clone)]
pub struct Dataset {
    pub(crate) sources: Vec<PathBuf>,
    pub(crate) x: CoordinateAxis,
    pub(crate) y: CoordinateAxis,
    pub(crate) time_name: String,
    pub(crate) time: Vec<DateTime<Utc>>,
    pub(crate) time_bounds: Option<Vec<(DateTime<Utc>, DateTime<Utc>)>>,
    pub(crate) crs: Option<CrsDescriptor>,
    pub(crate) variables: Vec<VariableInfo>,
    pub(crate) attributes: Attributes,
}

impl Dataset {
    /// Files the dataset was read from, in the order given.
    pub fn sources(&self) -> &[PathBuf] {
        &self.sources
    }

    pub fn x(&self) -> &CoordinateAxis {
        &self.x
    }

    pub fn y(&self) -> &CoordinateAxis {
        &self.y
    }

    pub fn time(&self) -> &[DateTime<Utc>] {
        &self.time
    }

    pub fn time_bounds(&self) -> Option<&[(DateTime<Utc>, DateTime<Utc>)]> {
        self.time_bounds.as_deref()
    }

    pub fn time_name(&self) -> &str {
        &self.time_name
    }

    pub fn crs(&self) -> Option<&CrsDescriptor> {
        self.crs.as_ref()
    }

    /// Global attributes of the first file.
    pub fn attributes(&self) -> &Attributes {
        &self.attributes
    }

    /// All variables, in file order.
    pub fn variables(&self) -> &[VariableInfo] {
        &self.variables
    }

    pub fn variable(&self, name: &str) -> Option<&VariableInfo> {
        self.variables.iter().find(|v| v.name == name)
    }

    /// Variables gridded over y and x that are not coordinates, bounds or grid mappings.
    pub fn data_variables(&self) -> Vec<&VariableInfo> {
        let referenced: Vec<&str> = self
            .variables
            .iter()
            .flat_map(|v| {
                ["bounds", "grid_mapping"]
                    .into_iter()
                    .filter_map(move |a| v.attributes.get_text(a))
            })
            .collect();

        self.variables
            .iter()
            .filter(|v| v.spans(&self.y.dimension) && v.spans(&self.x.dimension))
            .filter(|v| !v.dimensions.iter().any(|d| *d == v.name))
            .filter(|v| !v.attributes.contains("grid_mapping_name"))
            .filter(|v| !referenced.contains(&v.name.as_str()))
            .filter(|v| !v.name.ends_with("_bnds") && !v.name.ends_with("_bounds"))
            .collect()
    }

    /// Native bounding box over all cell edges.
    pub fn native_bbox(&self) -> Option<BoundingBox> {
        let (min_x, max_x) = self.x.edge_extent()?;
        let (min_y, max_y) = self.y.edge_extent()?;
        Some(BoundingBox::new(min_x, min_y, max_x, max_y))
    }

    /// `[min(time), max(time)]`, or `None` when the time axis is empty.
    pub fn temporal_interval(&self) -> Option<TemporalInterval> {
        TemporalInterval::from_instants(self.time.iter().copied())
    }

    /// Read one `(y, x)` slice of `variable` at `time_index`.
    ///
    /// `scale_factor`/`add_offset` are applied and cells equal to
    /// `_FillValue`/`missing_value` become the grid's nodata value.
    #[tracing::instrument(skip(self), fields(sources = self.sources.len()))]
    pub fn read_slice(&self, variable: &str, time_index: usize) -> NetCdfResult<Grid2D> {
        let info = self
            .variable(variable)
            .ok_or_else(|| NetCdfError::Schema(format!("variable '{}' not found", variable)))?;

        if !info.spans(&self.y.dimension) || !info.spans(&self.x.dimension) {
            return Err(NetCdfError::Schema(format!(
                "variable '{}' is not gridded over ({}, {})",
                variable, self.y.dimension, self.x.dimension
            )));
        }
        if info.spans(&self.time_name) && time_index >= self.time.len() {
            return Err(NetCdfError::Schema(format!(
                "time index {} out of range (time has {} steps)",
                time_index,
                self.time.len()
            )));
        }

        let mut start = Vec::with_capacity(info.dimensions.len());
        let mut count = Vec::with_capacity(info.dimensions.len());
        for (dim, len) in info.dimensions.iter().zip(&info.shape) {
            if *dim == self.time_name {
                start.push(time_index);
                count.push(1);
            } else if *dim == self.y.dimension {
                start.push(info.y_offset);
                count.push(self.y.len());
            } else if *dim == self.x.dimension {
                start.push(0);
                count.push(self.x.len());
            } else if *len == 1 {
                start.push(0);
                count.push(1);
            } else {
                return Err(NetCdfError::Schema(format!(
                    "variable '{}' has unsupported dimension '{}' of length {}",
                    variable, dim, len
                )));
            }
        }

        let y_pos = info.dimensions.iter().position(|d| *d == self.y.dimension);
        let x_pos = info.dimensions.iter().position(|d| *d == self.x.dimension);
        if y_pos > x_pos {
            return Err(NetCdfError::Schema(format!(
                "variable '{}' stores x before y, which is not supported",
                variable
            )));
        }

        let stored = info.data_type.ok_or_else(|| {
            NetCdfError::Schema(format!("variable '{}' is not numeric", variable))
        })?;

        let path = self.source_path(info.source)?;
        debug!(path = %path.display(), variable, time_index, %stored, "Reading slice");
        let raw = native::read_hyperslab(path, variable, &start, &count)?;

        let packing = Packing::from_attributes(&info.attributes);
        let (values, nodata) = packing.unpack(&raw);
        let data_type = if packing.is_packed() {
            stored.unpacked()
        } else {
            stored
        };

        Ok(Grid2D {
            variable: variable.to_string(),
            width: self.x.len(),
            height: self.y.len(),
            values,
            data_type,
            nodata,
        })
    }

    fn source_path(&self, index: usize) -> NetCdfResult<&Path> {
        self.sources
            .get(index)
            .map(PathBuf::as_path)
            .ok_or(NetCdfError::NoInput)
    }
}

/// CF packing and missing-value attributes of a variable.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Packing {
    scale_factor: f64,
    add_offset: f64,
    fill_value: Option<f64>,
    missing_value: Option<f64>,
}

impl Packing {
    fn from_attributes(attrs: &Attributes) -> Self {
        Self {
            scale_factor: attrs.get_f64("scale_factor").unwrap_or(1.0),
            add_offset: attrs.get_f64("add_offset").unwrap_or(0.0),
            fill_value: attrs.get_f64("_FillValue"),
            missing_value: attrs.get_f64("missing_value"),
        }
    }

    fn is_packed(&self) -> bool {
        self.scale_factor != 1.0 || self.add_offset != 0.0
    }

    fn is_missing(&self, raw: f64) -> bool {
        raw.is_nan()
            || self.fill_value.map_or(false, |f| raw == f)
            || self.missing_value.map_or(false, |m| raw == m)
    }

    /// Unpack raw values. Unpacked data keeps its fill value; packed data is
    /// scaled and its missing cells become NaN.
    fn unpack(&self, raw: &[f64]) -> (Vec<f64>, Option<f64>) {
        let declared = self.fill_value.or(self.missing_value);
        let nodata = match declared {
            Some(v) if !self.is_packed() => Some(v),
            Some(_) => Some(f64::NAN),
            None if raw.iter().any(|v| v.is_nan()) => Some(f64::NAN),
            None => None,
        };
        let fill = nodata.unwrap_or(f64::NAN);

        let values = raw
            .iter()
            .map(|&v| {
                if self.is_missing(v) {
                    fill
                } else {
                    v * self.scale_factor + self.add_offset
                }
            })
            .collect();
        (values, nodata)
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
