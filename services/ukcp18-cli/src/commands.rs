//! Subcommand implementations.

use anyhow::Result;
use chrono::{DateTime, Utc};
use std::path::PathBuf;
use tracing::info;

use stac_builder::{
    collection_from_source, collection_path, create_item, item_path, write_json, ItemOptions,
};
use storage::SourceResolver;
use ukcp18_common::CrsDescriptor;

use crate::config::Ukcp18Config;

/// Arguments of `create-collection`.
#[derive(Debug, Clone)]
pub struct CollectionArgs {
    pub source: String,
    pub destination: PathBuf,
    pub output: Option<String>,
    pub crs: Option<CrsDescriptor>,
    pub require_attributes: Vec<String>,
    pub id: Option<String>,
}

/// Arguments of `create-item`.
#[derive(Debug, Clone)]
pub struct ItemArgs {
    pub source: String,
    pub destination: PathBuf,
    pub output: Option<String>,
    pub variable: Option<String>,
    pub crs: Option<CrsDescriptor>,
    pub time_index: Option<usize>,
    pub datetime: Option<DateTime<Utc>>,
    pub asset_filename: Option<String>,
    pub collection_id: Option<String>,
}

/// Build the collection and write it; returns the written path.
pub async fn create_collection(config: Ukcp18Config, args: CollectionArgs) -> Result<PathBuf> {
    let mut loader = config.loader;
    if let Some(crs) = args.crs {
        loader.crs_override = Some(crs);
    }

    let mut options = config.collection;
    if let Some(id) = args.id {
        options.id = id;
    }
    for attribute in &args.require_attributes {
        options.require_attribute(attribute);
    }

    let resolver = SourceResolver::new(config.storage);
    let collection = collection_from_source(&args.source, &resolver, &loader, &options).await?;

    let path = collection_path(&args.destination, args.output.as_deref());
    write_json(&collection, &path)?;
    info!(id = %collection.id, path = %path.display(), "Collection written");
    Ok(path)
}

/// Build the item, write its COG and the item record; returns the record path.
pub async fn create_item_record(config: Ukcp18Config, args: ItemArgs) -> Result<PathBuf> {
    let mut loader = config.loader;
    if let Some(crs) = args.crs {
        loader.crs_override = Some(crs);
    }

    let options = ItemOptions {
        variable: args.variable,
        time_index: args.time_index,
        datetime: args.datetime,
        asset_filename: args.asset_filename,
        collection_id: args.collection_id,
        loader,
        storage: config.storage,
        cog: config.cog,
    };

    let output = create_item(&args.source, &args.destination, &options).await?;
    let path = item_path(&args.destination, &output.item.id, args.output.as_deref());
    write_json(&output.item, &path)?;
    info!(
        id = %output.item.id,
        path = %path.display(),
        asset = %output.asset_path.display(),
        "Item written"
    );
    Ok(path)
}
