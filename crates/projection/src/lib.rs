//! Coordinate reference system handling for UKCP18 grids.
//!
//! Wraps GDAL/PROJ to turn CRS descriptors into spatial references, resolve
//! EPSG codes from WKT, and reproject bounding boxes to WGS84 for STAC
//! geometry. Edges are densified before transforming so curved projected
//! boundaries stay inside the envelope.

pub mod error;
pub mod reproject;

pub use error::{ProjectionError, ProjectionResult};
pub use reproject::{epsg_code, identify_epsg, to_spatial_ref, to_wkt, Reprojector, DENSIFY_POINTS};
