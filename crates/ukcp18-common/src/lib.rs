//! Common types and utilities shared across the UKCP18 STAC crates.

pub mod bbox;
pub mod crs;
pub mod dtype;
pub mod time;

pub use bbox::BoundingBox;
pub use crs::{CrsDescriptor, CrsParseError, WGS84_EPSG};
pub use dtype::DataType;
pub use time::{
    format_rfc3339, parse_datetime, CfCalendar, CfTimeUnit, CfTimeUnits, DecodedTime,
    TemporalInterval, TimeParseError,
};
