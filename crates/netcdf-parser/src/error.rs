//! Error types for NetCDF loading operations.

use std::path::PathBuf;
use thiserror::Error;

use ukcp18_common::TimeParseError;

/// Result type for NetCDF loader operations.
pub type NetCdfResult<T> = Result<T, NetCdfError>;

/// Error types for NetCDF loading.
#[derive(Error, Debug)]
pub enum NetCdfError {
    /// The file could not be opened or read
    #[error("Failed to read {path}: {message}")]
    DataAccess { path: PathBuf, message: String },

    /// No input files were given
    #[error("No NetCDF files to open")]
    NoInput,

    /// A required coordinate, variable or attribute is absent or malformed
    #[error("Schema error: {0}")]
    Schema(String),

    /// The time coordinate could not be decoded
    #[error("Invalid time coordinate: {0}")]
    Time(#[from] TimeParseError),

    /// File I/O error
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

impl NetCdfError {
    pub(crate) fn data_access(path: impl Into<PathBuf>, err: impl std::fmt::Display) -> Self {
        NetCdfError::DataAccess {
            path: path.into(),
            message: err.to_string(),
        }
    }

    /// Whether the failure is about the file's structure rather than reaching it.
    pub fn is_schema(&self) -> bool {
        matches!(self, NetCdfError::Schema(_) | NetCdfError::Time(_))
    }
}
