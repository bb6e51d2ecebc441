//! Builder options. All settings are passed explicitly; nothing is read from
//! process-wide state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use cog_writer::CogOptions;
use netcdf_parser::LoaderConfig;
use storage::StorageConfig;

use crate::metadata;

/// A collection field copied verbatim from a global attribute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomField {
    /// Output key, e.g. `ukcp18:scenario`
    pub field: String,
    /// Source global attribute name
    pub attribute: String,
    /// Missing attribute aborts with `MissingAttribute` instead of a warning
    #[serde(default)]
    pub mandatory: bool,
}

impl CustomField {
    pub fn optional(field: &str, attribute: &str) -> Self {
        Self {
            field: field.to_string(),
            attribute: attribute.to_string(),
            mandatory: false,
        }
    }
}

fn default_custom_fields() -> Vec<CustomField> {
    vec![
        CustomField::optional("ukcp18:scenario", "scenario"),
        CustomField::optional("ukcp18:resolution", "resolution"),
    ]
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CollectionOptions {
    pub id: String,
    pub title: String,
    pub description: String,
    pub license: String,
    pub keywords: Vec<String>,
    pub custom_fields: Vec<CustomField>,
}

impl Default for CollectionOptions {
    fn default() -> Self {
        Self {
            id: metadata::COLLECTION_ID.to_string(),
            title: metadata::COLLECTION_TITLE.to_string(),
            description: metadata::COLLECTION_DESCRIPTION.to_string(),
            license: metadata::LICENSE.to_string(),
            keywords: metadata::KEYWORDS.iter().map(|k| k.to_string()).collect(),
            custom_fields: default_custom_fields(),
        }
    }
}

impl CollectionOptions {
    /// Mark the custom field reading `attribute` as mandatory, adding a
    /// `ukcp18:<attribute>` field when none reads it yet.
    pub fn require_attribute(&mut self, attribute: &str) {
        match self
            .custom_fields
            .iter_mut()
            .find(|f| f.attribute == attribute)
        {
            Some(field) => field.mandatory = true,
            None => self.custom_fields.push(CustomField {
                field: format!("ukcp18:{}", attribute),
                attribute: attribute.to_string(),
                mandatory: true,
            }),
        }
    }
}

/// Settings for a single `create_item` run.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ItemOptions {
    /// Data variable to rasterise; the first data variable when unset
    pub variable: Option<String>,
    /// Time slice by index
    pub time_index: Option<usize>,
    /// Time slice by timestamp (matched exactly or within the slice's bounds)
    pub datetime: Option<DateTime<Utc>>,
    /// COG file name inside the destination; `<item id>.tif` when unset
    pub asset_filename: Option<String>,
    /// Parent collection id recorded on the item
    pub collection_id: Option<String>,
    pub loader: LoaderConfig,
    pub storage: StorageConfig,
    pub cog: CogOptions,
}
