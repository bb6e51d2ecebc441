//! STAC metadata for UKCP18 climate projections.
//!
//! Two builders sit on top of the dataset loader:
//!
//! - [`create_collection`] summarises one or more granules as a STAC
//!   Collection: WGS84 bbox, temporal interval, datacube dimensions and the
//!   configured custom fields.
//! - [`create_item`] turns a single granule and time slice into a STAC Item
//!   and writes the slice as a Cloud-Optimized GeoTIFF next to it.
//!
//! Records are [`stac`] crate objects. They are validated before they are
//! returned and serialise deterministically, so writing the same inputs twice
//! gives identical bytes.

pub mod collection;
pub mod error;
pub mod io;
pub mod item;
pub mod metadata;
pub mod options;
pub mod validate;

pub use collection::{collection_from_source, create_collection};
pub use error::{ErrorKind, StacError, StacResult};
pub use io::{collection_path, item_path, read_json, write_json, COLLECTION_FILENAME};
pub use item::{create_item, ItemOutput};
pub use metadata::{extensions, GranuleParts};
pub use stac::{Asset, Collection, Item, Link};
pub use options::{CollectionOptions, CustomField, ItemOptions};
pub use validate::{validate_collection, validate_item};
