//! NetCDF dataset loader for UKCP18 climate projections.
//!
//! Opens one or more CF-convention NetCDF files into a [`Dataset`] handle:
//! coordinate vectors (with cell bounds), decoded time axis, CRS, typed
//! global attributes and variable metadata. Data values are read lazily, one
//! 2-D slice at a time.
//!
//! # UKCP18 file layout
//!
//! UKCP18 global files store variables as `(ensemble_member, time, latitude,
//! longitude)` with a single ensemble member per file, a `360_day` time axis
//! and `*_bnds` variables describing the cell edges.

pub mod attributes;
pub mod config;
pub mod dataset;
pub mod error;
pub mod native;

pub use attributes::{AttrValue, AttributeKey, Attributes};
pub use config::LoaderConfig;
pub use dataset::{CoordinateAxis, Dataset, Grid2D, VariableInfo};
pub use error::{NetCdfError, NetCdfResult};
pub use native::{open_dataset, silence_hdf5_errors};
