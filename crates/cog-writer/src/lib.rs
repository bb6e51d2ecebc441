//! Cloud-Optimized GeoTIFF derivation.
//!
//! Turns a 2-D slice with CF coordinate vectors into a north-up GDAL grid and
//! writes it through the COG driver (internally tiled, compressed, with
//! overviews). Writes are all-or-nothing: a temporary file in the
//! destination directory is renamed over the target only once GDAL has
//! closed it.

pub mod error;
pub mod grid;
pub mod options;
pub mod writer;

pub use error::{CogError, CogResult};
pub use grid::{stac_transform, transform_bbox, AxisCoords, GeoGrid};
pub use options::{BigTiff, CogOptions, Compression};
pub use writer::{read_raster_info, write_cog, RasterInfo, COG_MEDIA_TYPE};
