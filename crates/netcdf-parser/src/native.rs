//! NetCDF reading using the native netcdf library.
//!
//! The netcdf library wraps libnetcdf/HDF5 and needs file paths, so remote
//! granules are fetched to local files before they reach this module.

use std::path::Path;
use std::sync::Once;

use netcdf::types::{FloatType, IntType, NcVariableType};
use tracing::{debug, info, instrument, warn};

use ukcp18_common::{CfCalendar, CfTimeUnits, CrsDescriptor, DataType};

use crate::attributes::{convert_attribute, Attributes};
use crate::config::LoaderConfig;
use crate::dataset::{CoordinateAxis, Dataset, VariableInfo};
use crate::error::{NetCdfError, NetCdfResult};

/// OSGB 1936 / British National Grid.
const OSGB_EPSG: u32 = 27700;

/// Relative tolerance when comparing coordinate vectors of different files.
const COORD_TOLERANCE: f64 = 1e-9;

/// Silence HDF5's automatic error printing to stderr.
///
/// The HDF5 C library prints verbose diagnostics even when a failure is
/// handled, e.g. when probing for optional attributes. Called before every
/// open; only the first call has an effect.
pub fn silence_hdf5_errors() {
    static INIT: Once = Once::new();

    INIT.call_once(|| {
        // SAFETY: H5Eset_auto2 is thread-safe and null handlers are a
        // documented way to disable error output.
        unsafe {
            hdf5_metno_sys::h5e::H5Eset_auto2(
                hdf5_metno_sys::h5e::H5E_DEFAULT,
                None,
                std::ptr::null_mut(),
            );
        }
    });
}

/// Open one or more NetCDF files as a single dataset.
///
/// Files must share their coordinates; variables are united. A file whose y
/// axis has exactly one extra leading row is aligned onto the first file's
/// grid by skipping that row.
#[instrument(skip(paths, config), fields(files = paths.len()))]
pub fn open_dataset<P: AsRef<Path>>(paths: &[P], config: &LoaderConfig) -> NetCdfResult<Dataset> {
    silence_hdf5_errors();

    if paths.is_empty() {
        return Err(NetCdfError::NoInput);
    }

    let mut files = Vec::with_capacity(paths.len());
    for (index, path) in paths.iter().enumerate() {
        files.push(read_file(path.as_ref(), index, config)?);
    }

    let dataset = merge(files, config)?;
    info!(
        variables = dataset.variables.len(),
        x = dataset.x.len(),
        y = dataset.y.len(),
        time = dataset.time.len(),
        crs = ?dataset.crs,
        "Opened NetCDF dataset"
    );
    Ok(dataset)
}

/// Read a hyperslab of one variable as `f64`, given per-dimension start and count.
pub(crate) fn read_hyperslab(
    path: &Path,
    variable: &str,
    start: &[usize],
    count: &[usize],
) -> NetCdfResult<Vec<f64>> {
    silence_hdf5_errors();

    let file = netcdf::open(path).map_err(|e| NetCdfError::data_access(path, e))?;
    let var = file
        .variable(variable)
        .ok_or_else(|| NetCdfError::Schema(format!("variable '{}' not found", variable)))?;

    var.get_values::<f64, _>((start, count))
        .map_err(|e| NetCdfError::data_access(path, e))
}

/// Everything read eagerly from one file.
struct FileContents {
    path: std::path::PathBuf,
    x: CoordinateAxis,
    y: CoordinateAxis,
    time: TimeAxis,
    variables: Vec<VariableInfo>,
    attributes: Attributes,
}

struct TimeAxis {
    name: String,
    raw: Vec<f64>,
    values: Vec<chrono::DateTime<chrono::Utc>>,
    bounds: Option<Vec<(chrono::DateTime<chrono::Utc>, chrono::DateTime<chrono::Utc>)>>,
}

fn read_file(path: &Path, index: usize, config: &LoaderConfig) -> NetCdfResult<FileContents> {
    debug!(path = %path.display(), "Opening NetCDF file");
    let file = netcdf::open(path).map_err(|e| NetCdfError::data_access(path, e))?;

    let attributes = read_attributes(file.attributes());

    let x = find_axis(&file, path, &config.x_names, "X")?.ok_or_else(|| {
        NetCdfError::Schema(format!(
            "no x coordinate in {} (looked for {})",
            path.display(),
            config.x_names.join(", ")
        ))
    })?;
    let y = find_axis(&file, path, &config.y_names, "Y")?.ok_or_else(|| {
        NetCdfError::Schema(format!(
            "no y coordinate in {} (looked for {})",
            path.display(),
            config.y_names.join(", ")
        ))
    })?;
    let time_axis = find_axis(&file, path, &config.time_names, "T")?.ok_or_else(|| {
        NetCdfError::Schema(format!(
            "no time coordinate in {} (looked for {})",
            path.display(),
            config.time_names.join(", ")
        ))
    })?;
    let time = decode_time_axis(path, time_axis)?;

    let variables = file
        .variables()
        .filter(|v| !config.drop_variables.contains(&v.name()))
        .map(|v| VariableInfo {
            name: v.name(),
            dimensions: v.dimensions().iter().map(|d| d.name()).collect(),
            shape: v.dimensions().iter().map(|d| d.len()).collect(),
            data_type: storage_type(&v.vartype()),
            attributes: read_attributes(v.attributes()),
            source: index,
            y_offset: 0,
        })
        .collect();

    Ok(FileContents {
        path: path.to_path_buf(),
        x,
        y,
        time,
        variables,
        attributes,
    })
}

/// Raster type that holds every value of a netCDF variable type.
///
/// Signed bytes widen to `int16` and 64-bit integers to `float64`, the
/// nearest types GDAL writes everywhere.
fn storage_type(vartype: &NcVariableType) -> Option<DataType> {
    match vartype {
        NcVariableType::Int(IntType::U8) => Some(DataType::UInt8),
        NcVariableType::Int(IntType::I8 | IntType::I16) => Some(DataType::Int16),
        NcVariableType::Int(IntType::U16) => Some(DataType::UInt16),
        NcVariableType::Int(IntType::I32) => Some(DataType::Int32),
        NcVariableType::Int(IntType::U32) => Some(DataType::UInt32),
        NcVariableType::Int(IntType::I64 | IntType::U64) => Some(DataType::Float64),
        NcVariableType::Float(FloatType::F32) => Some(DataType::Float32),
        NcVariableType::Float(FloatType::F64) => Some(DataType::Float64),
        _ => None,
    }
}

fn read_attributes<'a>(attrs: impl Iterator<Item = netcdf::Attribute<'a>>) -> Attributes {
    attrs
        .filter_map(|attr| {
            let name = attr.name().to_string();
            let value = attr.value().ok().and_then(convert_attribute)?;
            Some((name, value))
        })
        .collect()
}

/// Find a 1-D coordinate variable by name, falling back to the CF `axis` attribute.
fn find_axis(
    file: &netcdf::File,
    path: &Path,
    candidates: &[String],
    axis: &str,
) -> NetCdfResult<Option<CoordinateAxis>> {
    let by_name = candidates
        .iter()
        .filter_map(|name| file.variable(name))
        .find(|v| v.dimensions().len() == 1);

    let var = match by_name {
        Some(v) => Some(v),
        None => file.variables().find(|v| {
            v.dimensions().len() == 1
                && read_attributes(v.attributes())
                    .get_text("axis")
                    .map_or(false, |a| a.eq_ignore_ascii_case(axis))
        }),
    };

    let Some(var) = var else {
        return Ok(None);
    };

    let name = var.name();
    let dimension = var.dimensions()[0].name();
    let attributes = read_attributes(var.attributes());
    let values = var
        .get_values::<f64, _>(..)
        .map_err(|e| NetCdfError::data_access(path, e))?;

    let bounds_name = attributes
        .get_text("bounds")
        .map(str::to_string)
        .unwrap_or_else(|| format!("{}_bnds", name));
    let bounds = match file.variable(&bounds_name) {
        Some(b) if b.dimensions().len() == 2 && b.dimensions()[1].len() == 2 => {
            let flat = b
                .get_values::<f64, _>(..)
                .map_err(|e| NetCdfError::data_access(path, e))?;
            Some(flat.chunks_exact(2).map(|c| [c[0], c[1]]).collect::<Vec<_>>())
        }
        _ => None,
    };

    Ok(Some(CoordinateAxis {
        name,
        dimension,
        values,
        bounds,
        attributes,
    }))
}

fn decode_time_axis(path: &Path, axis: CoordinateAxis) -> NetCdfResult<TimeAxis> {
    let units_attr = axis.units().ok_or_else(|| {
        NetCdfError::Schema(format!(
            "time coordinate '{}' in {} has no units",
            axis.name,
            path.display()
        ))
    })?;
    let calendar = match axis.attributes.get_text("calendar") {
        Some(c) => CfCalendar::parse(c)?,
        None => CfCalendar::Standard,
    };
    let units = CfTimeUnits::parse(units_attr, calendar)?;

    let decoded = units.decode_all(&axis.values)?;
    let mut clamped = decoded.iter().filter(|d| d.clamped).count();
    let values = decoded.iter().map(|d| d.datetime).collect();

    let bounds = match &axis.bounds {
        Some(pairs) => {
            let mut out = Vec::with_capacity(pairs.len());
            for [lo, hi] in pairs {
                let lo = units.decode(*lo)?;
                let hi = units.decode(*hi)?;
                clamped += usize::from(lo.clamped) + usize::from(hi.clamped);
                out.push((lo.datetime, hi.datetime));
            }
            Some(out)
        }
        None => None,
    };

    if clamped > 0 {
        warn!(
            path = %path.display(),
            calendar = ?calendar,
            clamped,
            "Time values fall on days missing from the Gregorian calendar; clamped to month end"
        );
    }

    Ok(TimeAxis {
        name: axis.name,
        raw: axis.values,
        values,
        bounds,
    })
}

fn merge(files: Vec<FileContents>, config: &LoaderConfig) -> NetCdfResult<Dataset> {
    let mut files = files.into_iter();
    let base = files.next().ok_or(NetCdfError::NoInput)?;

    let mut sources = vec![base.path.clone()];
    let mut variables = base.variables;

    for other in files {
        if !coords_match(&other.x.values, &base.x.values) {
            return Err(NetCdfError::Schema(format!(
                "{} has a different x coordinate than {}",
                other.path.display(),
                base.path.display()
            )));
        }

        let y_offset = if coords_match(&other.y.values, &base.y.values) {
            0
        } else if other.y.len() == base.y.len() + 1 {
            warn!(
                path = %other.path.display(),
                "y axis has one extra leading row; dropping it to align with {}",
                base.path.display()
            );
            1
        } else {
            return Err(NetCdfError::Schema(format!(
                "{} has a different y coordinate than {}",
                other.path.display(),
                base.path.display()
            )));
        };

        if !coords_match(&other.time.raw, &base.time.raw) {
            return Err(NetCdfError::Schema(format!(
                "{} has a different time coordinate than {}",
                other.path.display(),
                base.path.display()
            )));
        }

        for mut var in other.variables {
            if variables.iter().any(|v| v.name == var.name) {
                debug!(variable = %var.name, path = %other.path.display(), "Variable already present, skipping");
                continue;
            }
            if y_offset > 0 {
                if let Some(pos) = var.dimensions.iter().position(|d| *d == other.y.dimension) {
                    var.y_offset = y_offset;
                    var.shape[pos] -= y_offset;
                }
            }
            variables.push(var);
        }
        sources.push(other.path);
    }

    let crs = match &config.crs_override {
        Some(crs) => Some(crs.clone()),
        None => discover_crs(&variables, &base.x, &base.y),
    };

    Ok(Dataset {
        sources,
        x: base.x,
        y: base.y,
        time_name: base.time.name,
        time: base.time.values,
        time_bounds: base.time.bounds,
        crs,
        variables,
        attributes: base.attributes,
    })
}

fn coords_match(a: &[f64], b: &[f64]) -> bool {
    a.len() == b.len()
        && a.iter()
            .zip(b)
            .all(|(x, y)| (x - y).abs() <= COORD_TOLERANCE * x.abs().max(1.0))
}

/// Work out the CRS from CF grid-mapping metadata or axis naming.
pub(crate) fn discover_crs(
    variables: &[VariableInfo],
    x: &CoordinateAxis,
    y: &CoordinateAxis,
) -> Option<CrsDescriptor> {
    // "crs" or "crs: x y" forms
    let referenced: Vec<&str> = variables
        .iter()
        .filter_map(|v| v.attributes.get_text("grid_mapping"))
        .filter_map(|gm| gm.split(|c: char| c == ':' || c.is_whitespace()).next())
        .collect();

    let mappings = variables.iter().filter(|v| {
        referenced.contains(&v.name.as_str()) || v.attributes.contains("grid_mapping_name")
    });

    for mapping in mappings {
        let attrs = &mapping.attributes;

        for key in ["crs_wkt", "spatial_ref"] {
            if let Some(crs) = attrs.get_text(key).and_then(|w| CrsDescriptor::parse(w).ok()) {
                return Some(crs);
            }
        }

        if let Some(code) = attrs.get("epsg_code") {
            let parsed = match code.as_str() {
                Some(text) => CrsDescriptor::parse(text).ok(),
                None => code.as_f64().map(|n| CrsDescriptor::Epsg(n as u32)),
            };
            if parsed.is_some() {
                return parsed;
            }
        }

        match attrs.get_text("grid_mapping_name") {
            Some("latitude_longitude") => return Some(CrsDescriptor::wgs84()),
            Some("transverse_mercator") if is_british_national_grid(attrs) => {
                return Some(CrsDescriptor::Epsg(OSGB_EPSG))
            }
            Some(other) => {
                debug!(variable = %mapping.name, grid_mapping = other, "Unrecognised grid mapping")
            }
            None => {}
        }
    }

    if is_geographic_axis(x, "longitude", "degrees_east")
        && is_geographic_axis(y, "latitude", "degrees_north")
    {
        return Some(CrsDescriptor::wgs84());
    }

    None
}

fn is_british_national_grid(attrs: &Attributes) -> bool {
    let close = |name: &str, expected: f64| {
        attrs
            .get_f64(name)
            .map_or(false, |v| (v - expected).abs() < 1e-6)
    };
    close("longitude_of_central_meridian", -2.0)
        && close("latitude_of_projection_origin", 49.0)
        && close("false_easting", 400_000.0)
        && close("false_northing", -100_000.0)
}

fn is_geographic_axis(axis: &CoordinateAxis, standard_name: &str, units: &str) -> bool {
    axis.name == standard_name
        || axis.name == &standard_name[..3]
        || axis.attributes.get_text("standard_name") == Some(standard_name)
        || axis.units() == Some(units)
}
