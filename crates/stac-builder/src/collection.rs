//! Collection Builder.

use chrono::{DateTime, Utc};
use serde_json::{json, Map, Value};
use stac::{Bbox, Collection, ItemAsset};
use tracing::{debug, info, instrument, warn};

use netcdf_parser::{open_dataset, AttributeKey, CoordinateAxis, Dataset, LoaderConfig, VariableInfo};
use projection::Reprojector;
use storage::SourceResolver;
use ukcp18_common::{format_rfc3339, BoundingBox, CrsDescriptor};

use crate::error::{StacError, StacResult};
use crate::metadata::{self, declare_extension, extensions};
use crate::options::{CollectionOptions, CustomField};
use crate::validate::{check_schema, validate_collection};

/// Build the collection record for an opened dataset.
///
/// Requires at least one time value and a CRS. Pure: nothing is written.
#[instrument(skip_all, fields(id = %options.id, sources = dataset.sources().len()))]
pub fn create_collection(dataset: &Dataset, options: &CollectionOptions) -> StacResult<Collection> {
    let interval = dataset
        .temporal_interval()
        .ok_or_else(|| StacError::Schema("dataset has no time values".to_string()))?;
    let crs = dataset
        .crs()
        .ok_or_else(|| StacError::Schema("dataset has no coordinate reference system".to_string()))?;

    let native = dataset
        .native_bbox()
        .ok_or_else(|| StacError::Schema("dataset has empty spatial axes".to_string()))?;
    let bbox = geographic_bbox(&native, crs)?;

    if interval.is_degenerate() {
        debug!(start = %interval.start, "Single time value; interval is degenerate");
    }

    let mut collection = Collection::new(&options.id, &options.description);
    collection.title = Some(options.title.clone());
    collection.license = options.license.clone();
    collection.keywords = Some(options.keywords.clone());
    collection.providers = Some(metadata::providers());
    collection.links = metadata::links();
    collection.extent.spatial.bbox = vec![Bbox::TwoDimensional(bbox.to_array())];
    collection.extent.temporal.interval = vec![[Some(interval.start), Some(interval.end)]];

    for field in &options.custom_fields {
        match custom_field_value(dataset, field) {
            Some(value) => {
                collection
                    .additional_fields
                    .insert(field.field.clone(), value);
            }
            None if field.mandatory => {
                return Err(StacError::MissingAttribute {
                    field: field.field.clone(),
                    attribute: field.attribute.clone(),
                });
            }
            None => {
                warn!(field = %field.field, attribute = %field.attribute, "Attribute missing; field omitted");
            }
        }
    }

    let data_variables = dataset.data_variables();

    let times = dataset.time();
    let time_extent = times.iter().min().zip(times.iter().max()).map(|(a, b)| [*a, *b]);

    declare_extension(&mut collection.extensions, extensions::DATACUBE);
    collection.additional_fields.insert(
        "cube:dimensions".to_string(),
        cube_dimensions(dataset, crs, &data_variables, time_extent),
    );
    collection
        .additional_fields
        .insert("cube:variables".to_string(), cube_variables(&data_variables));

    declare_extension(&mut collection.extensions, extensions::ITEM_ASSETS);
    for variable in &data_variables {
        collection
            .item_assets
            .insert(variable.name.clone(), item_asset(variable)?);
    }

    declare_extension(&mut collection.extensions, extensions::SCIENTIFIC);
    collection
        .additional_fields
        .insert("sci:citation".to_string(), json!(metadata::CITATION));

    let mut summaries = Map::new();
    summaries.insert("ukcp18:variable".to_string(), json!(metadata::VARIABLES));
    summaries.insert(
        "ukcp18:temporal_resolution".to_string(),
        json!(metadata::TEMPORAL_RESOLUTIONS),
    );
    collection.summaries = Some(summaries);

    validate_collection(&collection)?;

    info!(
        bbox = ?bbox.to_array(),
        start = %interval.start,
        end = %interval.end,
        variables = data_variables.len(),
        "Created collection"
    );
    Ok(collection)
}

/// Resolve `source` (globs allowed), open every granule as one dataset and
/// build its collection.
pub async fn collection_from_source(
    source: &str,
    resolver: &SourceResolver,
    loader: &LoaderConfig,
    options: &CollectionOptions,
) -> StacResult<Collection> {
    let resolved = resolver.resolve_str(source).await?;
    let dataset = open_dataset(&resolved.local_paths(), loader)?;
    let collection = create_collection(&dataset, options)?;
    check_schema(&collection).await?;
    Ok(collection)
}

/// Reproject a native bbox to WGS84; geographic sources have their
/// longitudes folded into -180..180.
fn geographic_bbox(native: &BoundingBox, crs: &CrsDescriptor) -> StacResult<BoundingBox> {
    Ok(Reprojector::new(crs)?.to_geographic(native)?)
}

fn custom_field_value(dataset: &Dataset, field: &CustomField) -> Option<Value> {
    let attributes = dataset.attributes();
    match AttributeKey::from_name(&field.attribute) {
        Some(key) => attributes.get_str(key).map(|s| json!(s)),
        None => {
            debug!(attribute = %field.attribute, "Attribute outside the known UKCP18 set");
            attributes
                .get(&field.attribute)
                .and_then(|v| serde_json::to_value(v).ok())
        }
    }
}

fn reference_system(crs: &CrsDescriptor) -> Value {
    match crs {
        CrsDescriptor::Epsg(code) => json!(code),
        CrsDescriptor::Wkt(wkt) => json!(wkt),
    }
}

fn spatial_dimension(axis: &CoordinateAxis, name: &str, crs: &CrsDescriptor) -> Value {
    let mut dim = Map::new();
    dim.insert("type".into(), json!("spatial"));
    dim.insert("axis".into(), json!(name));

    let (lo, hi) = axis
        .values
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| (lo.min(*v), hi.max(*v)));
    dim.insert("extent".into(), json!([lo, hi]));

    if let [first, second, ..] = axis.values.as_slice() {
        dim.insert("step".into(), json!(second - first));
    }
    dim.insert("reference_system".into(), reference_system(crs));
    if let Some(long_name) = axis.attributes.get_text("long_name") {
        dim.insert("description".into(), json!(long_name));
    }
    Value::Object(dim)
}

/// `cube:dimensions` for `variables`, with the time dimension spanning
/// `time_extent`.
pub(crate) fn cube_dimensions(
    dataset: &Dataset,
    crs: &CrsDescriptor,
    variables: &[&VariableInfo],
    time_extent: Option<[DateTime<Utc>; 2]>,
) -> Value {
    let mut dims = Map::new();
    dims.insert(
        dataset.x().dimension.clone(),
        spatial_dimension(dataset.x(), "x", crs),
    );
    dims.insert(
        dataset.y().dimension.clone(),
        spatial_dimension(dataset.y(), "y", crs),
    );

    if let Some([first, last]) = time_extent {
        dims.insert(
            dataset.time_name().to_string(),
            json!({
                "type": "temporal",
                "extent": [format_rfc3339(&first), format_rfc3339(&last)],
            }),
        );
    }

    // dimensions such as ensemble_member that are neither space nor time
    for variable in variables {
        for (name, len) in variable.dimensions.iter().zip(&variable.shape) {
            if !dims.contains_key(name) {
                dims.insert(
                    name.clone(),
                    json!({
                        "type": "other",
                        "extent": [0, len.saturating_sub(1)],
                    }),
                );
            }
        }
    }
    Value::Object(dims)
}

pub(crate) fn cube_variables(variables: &[&VariableInfo]) -> Value {
    Value::Object(
        variables
            .iter()
            .map(|v| (v.name.clone(), cube_variable(v)))
            .collect(),
    )
}

fn cube_variable(variable: &VariableInfo) -> Value {
    let mut var = Map::new();
    var.insert("type".into(), json!("data"));
    var.insert("dimensions".into(), json!(variable.dimensions));
    if let Some(description) = variable.description() {
        var.insert("description".into(), json!(description));
    }
    if let Some(units) = variable.units() {
        var.insert("unit".into(), json!(units));
    }

    let attrs: Map<String, Value> = variable
        .attributes
        .iter()
        .filter_map(|(k, v)| serde_json::to_value(v).ok().map(|v| (k.to_string(), v)))
        .collect();
    var.insert("attrs".into(), Value::Object(attrs));
    Value::Object(var)
}

fn item_asset(variable: &VariableInfo) -> StacResult<ItemAsset> {
    let mut asset = json!({
        "type": cog_writer::COG_MEDIA_TYPE,
        "title": variable.long_name().unwrap_or(variable.name.as_str()),
        "roles": ["data"],
    });
    if let Some(description) = variable.description() {
        asset["description"] = json!(description);
    }
    Ok(serde_json::from_value(asset)?)
}
