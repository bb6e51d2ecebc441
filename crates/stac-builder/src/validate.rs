//! Checks on assembled records.
//!
//! Records are checked before they are returned so that nothing invalid is
//! ever persisted. The structural checks below always run; full JSON Schema
//! validation through the `stac` crate is available with the
//! `schema-validation` feature (schemas are fetched over the network).

use serde_json::{Map, Value};
use stac::{Bbox, Collection, Item};

use ukcp18_common::BoundingBox;

use crate::error::{StacError, StacResult};
use crate::metadata::{extensions, EXTENSION_PREFIXES};

fn invalid(message: impl Into<String>) -> StacError {
    StacError::Validation(message.into())
}

fn planar(bbox: &Bbox) -> BoundingBox {
    match bbox {
        Bbox::TwoDimensional([min_x, min_y, max_x, max_y]) => {
            BoundingBox::new(*min_x, *min_y, *max_x, *max_y)
        }
        Bbox::ThreeDimensional([min_x, min_y, _, max_x, max_y, _]) => {
            BoundingBox::new(*min_x, *min_y, *max_x, *max_y)
        }
    }
}

fn check_bbox(bbox: &Bbox, what: &str) -> StacResult<BoundingBox> {
    let b = planar(bbox);
    if !b.is_valid() {
        return Err(invalid(format!("{} bbox {:?} is not a valid box", what, b.to_array())));
    }
    if b.min_y < -90.0 || b.max_y > 90.0 || b.min_x < -180.0 || b.max_x > 180.0 {
        return Err(invalid(format!(
            "{} bbox {:?} is outside WGS84 bounds",
            what,
            b.to_array()
        )));
    }
    Ok(b)
}

/// Every `prefix:` key must have its extension declared.
fn check_extensions(fields: &Map<String, Value>, declared: &[String]) -> StacResult<()> {
    for key in fields.keys() {
        for (prefix, schema) in EXTENSION_PREFIXES {
            if key.starts_with(prefix) && !declared.iter().any(|s| s == schema) {
                return Err(invalid(format!("field {} used without extension {}", key, schema)));
            }
        }
    }
    Ok(())
}

pub fn validate_collection(collection: &Collection) -> StacResult<()> {
    if collection.id.trim().is_empty() {
        return Err(invalid("collection id is empty"));
    }
    if collection.description.trim().is_empty() {
        return Err(invalid("collection description is empty"));
    }
    if collection.license.trim().is_empty() {
        return Err(invalid("collection license is empty"));
    }

    let bboxes = &collection.extent.spatial.bbox;
    if bboxes.is_empty() {
        return Err(invalid("spatial extent has no bbox"));
    }
    for bbox in bboxes {
        check_bbox(bbox, "collection")?;
    }

    let intervals = &collection.extent.temporal.interval;
    if intervals.is_empty() {
        return Err(invalid("temporal extent has no interval"));
    }
    for [start, end] in intervals {
        match (start, end) {
            (None, None) => return Err(invalid("temporal interval is open at both ends")),
            (Some(s), Some(e)) if s > e => {
                return Err(invalid(format!("interval start {} is after end {}", s, e)))
            }
            _ => {}
        }
    }

    if let Some(link) = collection.links.iter().find(|l| l.href.is_empty()) {
        return Err(invalid(format!("link '{}' has an empty href", link.rel)));
    }

    check_extensions(&collection.additional_fields, &collection.extensions)?;
    if !collection.item_assets.is_empty()
        && !collection
            .extensions
            .iter()
            .any(|s| s == extensions::ITEM_ASSETS)
    {
        return Err(invalid("item_assets used without the item-assets extension"));
    }
    Ok(())
}

pub fn validate_item(item: &Item) -> StacResult<()> {
    if item.id.trim().is_empty() {
        return Err(invalid("item id is empty"));
    }

    let bbox = item
        .bbox
        .as_ref()
        .ok_or_else(|| invalid("item has no bbox"))
        .and_then(|b| check_bbox(b, "item"))?;
    let geometry = item
        .geometry
        .as_ref()
        .ok_or_else(|| invalid("item has no geometry"))?;
    let geometry_bbox = polygon_envelope(&serde_json::to_value(geometry)?)?;
    if !geometry_bbox.approx_eq(&bbox, 1e-9) {
        return Err(invalid("bbox does not match geometry"));
    }

    let props = &item.properties;
    match (props.datetime, props.start_datetime, props.end_datetime) {
        (None, None, _) | (None, _, None) => {
            return Err(invalid(
                "null datetime requires start_datetime and end_datetime",
            ))
        }
        (_, Some(start), Some(end)) if start > end => {
            return Err(invalid(format!(
                "start_datetime {} is after end_datetime {}",
                start, end
            )))
        }
        _ => {}
    }

    if item.assets.is_empty() {
        return Err(invalid("item has no assets"));
    }
    for (key, asset) in &item.assets {
        if asset.href.is_empty() {
            return Err(invalid(format!("asset '{}' has an empty href", key)));
        }
        check_extensions(&asset.additional_fields, &item.extensions)?;
    }

    check_extensions(&props.additional_fields, &item.extensions)?;
    Ok(())
}

/// Envelope of a GeoJSON polygon whose rings are all closed.
fn polygon_envelope(geometry: &Value) -> StacResult<BoundingBox> {
    let rings = geometry["coordinates"]
        .as_array()
        .ok_or_else(|| invalid("geometry has no coordinates"))?;

    let mut points = Vec::new();
    for ring in rings {
        let ring: Vec<[f64; 2]> = serde_json::from_value(ring.clone())
            .map_err(|e| invalid(format!("geometry ring is malformed: {}", e)))?;
        if ring.len() < 4 || ring.first() != ring.last() {
            return Err(invalid("geometry ring is not closed"));
        }
        points.extend(ring);
    }

    BoundingBox::from_extents(points.iter().map(|p| p[0]), points.iter().map(|p| p[1]))
        .ok_or_else(|| invalid("geometry has no positions"))
}

/// JSON Schema validation of the record and its declared extensions.
#[cfg(feature = "schema-validation")]
pub(crate) async fn check_schema<T: stac::Validate>(value: &T) -> StacResult<()> {
    value
        .validate()
        .await
        .map_err(|e| StacError::Validation(e.to_string()))
}

#[cfg(not(feature = "schema-validation"))]
pub(crate) async fn check_schema<T>(_value: &T) -> StacResult<()> {
    Ok(())
}
