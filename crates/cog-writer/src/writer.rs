//! Writing grids as Cloud-Optimized GeoTIFFs and reading raster metadata back.

use std::path::Path;

use gdal::raster::{Buffer, GdalDataType, GdalType, RasterCreationOptions};
use gdal::spatial_ref::SpatialRef;
use gdal::{Dataset, DriverManager};
use tracing::{debug, info, instrument};

use ukcp18_common::{BoundingBox, CrsDescriptor, DataType};

use crate::error::{CogError, CogResult};
use crate::grid::{stac_transform, transform_bbox, GeoGrid};
use crate::options::CogOptions;

/// Media type of the written asset.
pub const COG_MEDIA_TYPE: &str = "image/tiff; application=geotiff; profile=cloud-optimized";

/// Native grid description of a raster file.
#[derive(Debug, Clone, PartialEq)]
pub struct RasterInfo {
    pub width: usize,
    pub height: usize,
    /// GDAL geotransform
    pub transform: [f64; 6],
    /// Outer cell edges in the raster's CRS
    pub bbox: BoundingBox,
    pub epsg: Option<u32>,
    pub wkt: Option<String>,
    /// Lower-case data type name (`float32`, `uint8`, ...)
    pub data_type: String,
    pub nodata: Option<f64>,
}

impl RasterInfo {
    /// `[rows, cols]`
    pub fn shape(&self) -> [usize; 2] {
        [self.height, self.width]
    }

    /// Transform in STAC `proj:transform` order.
    pub fn stac_transform(&self) -> [f64; 6] {
        stac_transform(&self.transform)
    }

    /// CRS of the raster: EPSG when known, WKT otherwise.
    pub fn crs(&self) -> Option<CrsDescriptor> {
        match (self.epsg, &self.wkt) {
            (Some(code), _) => Some(CrsDescriptor::Epsg(code)),
            (None, Some(wkt)) => Some(CrsDescriptor::Wkt(wkt.clone())),
            (None, None) => None,
        }
    }
}

/// Write `grid` as a COG at `path`.
///
/// The file is written to a temporary name in the destination directory and
/// renamed into place, so a failure never leaves a partial file at `path`.
/// An existing file at `path` is replaced.
#[instrument(skip(grid, crs, path, options), fields(path = %path.display(), width = grid.width, height = grid.height))]
pub fn write_cog(
    grid: &GeoGrid,
    crs: &CrsDescriptor,
    path: &Path,
    options: &CogOptions,
) -> CogResult<RasterInfo> {
    let srs = projection::to_spatial_ref(crs)?;

    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "asset.tif".to_string());

    let temp_path = tempfile::Builder::new()
        .prefix(&format!(".{}.", file_name))
        .suffix(".tmp")
        .tempfile_in(dir)
        .map_err(|source| CogError::Write {
            path: path.display().to_string(),
            source,
        })?
        .into_temp_path();

    let staging = match grid.data_type {
        DataType::UInt8 => stage::<u8>(grid, &srs)?,
        DataType::Int16 => stage::<i16>(grid, &srs)?,
        DataType::UInt16 => stage::<u16>(grid, &srs)?,
        DataType::Int32 => stage::<i32>(grid, &srs)?,
        DataType::UInt32 => stage::<u32>(grid, &srs)?,
        DataType::Float32 => stage::<f32>(grid, &srs)?,
        DataType::Float64 => stage::<f64>(grid, &srs)?,
    };

    let mut creation = RasterCreationOptions::new();
    for (key, value) in options.to_pairs(grid.data_type) {
        creation.set_name_value(key, &value)?;
    }

    let cog = DriverManager::get_driver_by_name("COG")?;
    let written = staging.create_copy(&cog, &*temp_path, &creation)?;
    // closing flushes the file before it is renamed
    drop(written);
    drop(staging);

    temp_path.persist(path).map_err(|e| CogError::Write {
        path: path.display().to_string(),
        source: e.error,
    })?;

    let mut info = read_raster_info(path)?;
    if info.epsg.is_none() {
        info.epsg = crs.epsg();
    }

    info!(
        compression = options.compression.as_gdal(),
        data_type = %grid.data_type,
        bbox = ?info.bbox.to_array(),
        "Wrote COG"
    );
    Ok(info)
}

/// Sample types a grid can be written as.
trait BandSample: GdalType + Copy {
    fn from_f64(value: f64) -> Self;
}

macro_rules! band_sample {
    ($($t:ty),*) => {
        $(impl BandSample for $t {
            fn from_f64(value: f64) -> Self {
                value as $t
            }
        })*
    };
}

band_sample!(u8, i16, u16, i32, u32, f32, f64);

/// In-memory single-band dataset of type `T` holding `grid`.
fn stage<T: BandSample>(grid: &GeoGrid, srs: &SpatialRef) -> CogResult<Dataset> {
    let mem = DriverManager::get_driver_by_name("MEM")?;
    let mut staging = mem.create_with_band_type::<T, _>("", grid.width, grid.height, 1)?;
    staging.set_geo_transform(&grid.transform)?;
    staging.set_spatial_ref(srs)?;
    {
        let mut band = staging.rasterband(1)?;
        if let Some(nodata) = grid.nodata {
            band.set_no_data_value(Some(nodata))?;
        }
        let samples: Vec<T> = grid.data.iter().map(|&v| T::from_f64(v)).collect();
        let mut buffer = Buffer::new((grid.width, grid.height), samples);
        band.write((0, 0), (grid.width, grid.height), &mut buffer)?;
    }
    Ok(staging)
}

/// Read shape, transform, CRS, data type and nodata of band 1.
pub fn read_raster_info(path: &Path) -> CogResult<RasterInfo> {
    let dataset = Dataset::open(path)?;
    let (width, height) = dataset.raster_size();
    let transform = dataset.geo_transform()?;

    let (epsg, wkt) = match dataset.spatial_ref() {
        Ok(srs) => (projection::epsg_code(&srs), srs.to_wkt().ok()),
        Err(e) => {
            debug!(error = %e, "Raster has no spatial reference");
            (None, None)
        }
    };

    let band = dataset.rasterband(1)?;
    let data_type = data_type_name(band.band_type()).to_string();
    let nodata = band.no_data_value();

    Ok(RasterInfo {
        width,
        height,
        transform,
        bbox: transform_bbox(&transform, width, height),
        epsg,
        wkt,
        data_type,
        nodata,
    })
}

fn data_type_name(data_type: GdalDataType) -> &'static str {
    match data_type {
        GdalDataType::UInt8 => "uint8",
        GdalDataType::UInt16 => "uint16",
        GdalDataType::Int16 => "int16",
        GdalDataType::UInt32 => "uint32",
        GdalDataType::Int32 => "int32",
        GdalDataType::Float32 => "float32",
        GdalDataType::Float64 => "float64",
        _ => "other",
    }
}
