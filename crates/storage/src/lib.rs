//! Source resolution for UKCP18 granules.
//!
//! Accepts local paths, local globs and remote objects:
//! - `s3://bucket/key` (S3 or an S3-compatible endpoint)
//! - `az://container/key` (Azure Blob Storage)
//! - `https://host/path`
//!
//! Remote keys may contain globs (`*`, `?`, `[..]`, `**`) and are listed
//! under their literal prefix. Every match is fetched into a scratch
//! directory since the NetCDF library needs local files.

pub mod config;
pub mod error;
pub mod glob;
pub mod location;
pub mod object_store;
pub mod resolver;

pub use self::object_store::ObjectStorage;
pub use config::{AzureConfig, S3Config, StorageConfig};
pub use error::{StorageError, StorageResult};
pub use glob::GlobPattern;
pub use location::SourceLocation;
pub use resolver::{ResolvedSource, ResolvedSources, SourceResolver};
