//! Error types for raster derivation.

use thiserror::Error;

pub type CogResult<T> = Result<T, CogError>;

#[derive(Error, Debug)]
pub enum CogError {
    /// Coordinates cannot be expressed as an affine north-up grid
    #[error("Irregular grid: {0}")]
    IrregularGrid(String),

    #[error("Data length {actual} does not match grid shape {width}x{height}")]
    ShapeMismatch {
        width: usize,
        height: usize,
        actual: usize,
    },

    #[error("Invalid CRS: {0}")]
    Crs(#[from] projection::ProjectionError),

    #[error("GDAL error: {0}")]
    Gdal(#[from] gdal::errors::GdalError),

    #[error("Failed to write {path}: {source}")]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl CogError {
    /// Errors caused by the input grid rather than the write itself.
    pub fn is_grid_error(&self) -> bool {
        matches!(self, CogError::IrregularGrid(_) | CogError::ShapeMismatch { .. })
    }
}
