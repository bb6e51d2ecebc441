//! Error kinds surfaced by the builders.

use thiserror::Error;

use cog_writer::CogError;
use netcdf_parser::NetCdfError;
use projection::ProjectionError;
use storage::StorageError;

pub type StacResult<T> = Result<T, StacError>;

/// Errors that abort collection or item creation.
#[derive(Debug, Error)]
pub enum StacError {
    /// Source unreachable, unreadable or empty.
    #[error("Data access error: {0}")]
    DataAccess(String),

    /// Expected coordinate, variable or CRS missing.
    #[error("Schema error: {0}")]
    Schema(String),

    /// Source does not resolve to exactly one granule.
    #[error("Ambiguous source: {0}")]
    AmbiguousSource(String),

    /// A custom field declared mandatory has no source attribute.
    #[error("Missing attribute '{attribute}' required for {field}")]
    MissingAttribute { field: String, attribute: String },

    /// Raster derivation failed; nothing was left at the destination.
    #[error("Raster write error: {0}")]
    RasterWrite(String),

    /// Assembled record is not valid STAC.
    #[error("Invalid STAC record: {0}")]
    Validation(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Coarse classification used for exit codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    DataAccess,
    Schema,
    AmbiguousSource,
    MissingAttribute,
    RasterWrite,
    Other,
}

impl ErrorKind {
    /// Process exit code for this kind.
    pub fn exit_code(&self) -> i32 {
        match self {
            ErrorKind::DataAccess => 2,
            ErrorKind::Schema => 3,
            ErrorKind::AmbiguousSource => 4,
            ErrorKind::MissingAttribute => 5,
            ErrorKind::RasterWrite => 6,
            ErrorKind::Other => 1,
        }
    }
}

impl StacError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            StacError::DataAccess(_) => ErrorKind::DataAccess,
            StacError::Schema(_) => ErrorKind::Schema,
            StacError::AmbiguousSource(_) => ErrorKind::AmbiguousSource,
            StacError::MissingAttribute { .. } => ErrorKind::MissingAttribute,
            StacError::RasterWrite(_) => ErrorKind::RasterWrite,
            StacError::Validation(_) | StacError::Serialization(_) | StacError::Io(_) => {
                ErrorKind::Other
            }
        }
    }

    pub fn exit_code(&self) -> i32 {
        self.kind().exit_code()
    }
}

impl From<NetCdfError> for StacError {
    fn from(err: NetCdfError) -> Self {
        match err {
            NetCdfError::Schema(message) => StacError::Schema(message),
            other if other.is_schema() => StacError::Schema(other.to_string()),
            other => StacError::DataAccess(other.to_string()),
        }
    }
}

impl From<StorageError> for StacError {
    fn from(err: StorageError) -> Self {
        StacError::DataAccess(err.to_string())
    }
}

impl From<CogError> for StacError {
    fn from(err: CogError) -> Self {
        if err.is_grid_error() {
            StacError::Schema(err.to_string())
        } else {
            StacError::RasterWrite(err.to_string())
        }
    }
}

impl From<ProjectionError> for StacError {
    fn from(err: ProjectionError) -> Self {
        StacError::Schema(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes_distinct() {
        let errors = [
            StacError::DataAccess("x".into()),
            StacError::Schema("x".into()),
            StacError::AmbiguousSource("x".into()),
            StacError::MissingAttribute {
                field: "ukcp18:scenario".into(),
                attribute: "scenario".into(),
            },
            StacError::RasterWrite("x".into()),
            StacError::Validation("x".into()),
        ];
        let codes: Vec<i32> = errors.iter().map(|e| e.exit_code()).collect();
        assert_eq!(codes, vec![2, 3, 4, 5, 6, 1]);
    }

    #[test]
    fn test_loader_errors_mapped() {
        let schema: StacError = NetCdfError::Schema("no time axis".into()).into();
        assert_eq!(schema.kind(), ErrorKind::Schema);

        let access: StacError = NetCdfError::NoInput.into();
        assert_eq!(access.kind(), ErrorKind::DataAccess);
    }

    #[test]
    fn test_cog_errors_mapped() {
        let grid: StacError = CogError::IrregularGrid("x".into()).into();
        assert_eq!(grid.kind(), ErrorKind::Schema);

        let io: StacError = CogError::IoError(std::io::Error::other("disk full")).into();
        assert_eq!(io.kind(), ErrorKind::RasterWrite);
    }
}
