//! Error types for CRS handling.

use thiserror::Error;

pub type ProjectionResult<T> = Result<T, ProjectionError>;

#[derive(Error, Debug)]
pub enum ProjectionError {
    /// GDAL/PROJ does not understand the CRS definition
    #[error("Invalid CRS {crs}: {message}")]
    InvalidCrs { crs: String, message: String },

    /// Coordinates could not be transformed
    #[error("Coordinate transformation failed: {0}")]
    Transform(String),

    #[error("Invalid bounding box: {0:?}")]
    InvalidBbox([f64; 4]),
}
