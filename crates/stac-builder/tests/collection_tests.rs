//! Collection builder against generated granules.

use std::path::PathBuf;

use chrono::{TimeZone, Utc};
use netcdf_parser::{open_dataset, LoaderConfig};
use serde_json::{json, Value};
use stac_builder::{
    collection_from_source, collection_path, create_collection, read_json, write_json,
    extensions, Collection, CollectionOptions, ErrorKind, StacError,
};
use storage::{SourceResolver, StorageConfig};
use test_utils::{assert_bbox_approx_eq, GranuleSpec, UK_BBOX};

fn write(spec: &GranuleSpec) -> (tempfile::TempDir, PathBuf) {
    let dir = tempfile::tempdir().expect("temp dir");
    let path = spec.write_to_dir(dir.path()).expect("write fixture");
    (dir, path)
}

fn build(spec: &GranuleSpec, options: &CollectionOptions) -> Result<Collection, StacError> {
    let (_dir, path) = write(spec);
    let dataset = open_dataset(&[&path], &LoaderConfig::default())?;
    create_collection(&dataset, options)
}

fn json(collection: &Collection) -> Value {
    serde_json::to_value(collection).unwrap()
}

fn spatial_bbox(collection: &Value) -> [f64; 4] {
    serde_json::from_value(collection["extent"]["spatial"]["bbox"][0].clone()).unwrap()
}

#[test]
fn test_uk_collection_extent() {
    let collection = json(&build(&GranuleSpec::uk_monthly(), &CollectionOptions::default()).unwrap());

    assert_eq!(collection["type"], "Collection");
    assert_eq!(collection["id"], "ukcp-18");
    assert_eq!(collection["license"], "OGL-UK-3.0");
    assert_eq!(collection["extent"]["spatial"]["bbox"].as_array().unwrap().len(), 1);
    assert_bbox_approx_eq!(spatial_bbox(&collection), UK_BBOX, 1e-6);

    // a single time step gives a degenerate interval
    assert_eq!(
        collection["extent"]["temporal"]["interval"],
        json!([["1999-12-01T00:00:00Z", "1999-12-01T00:00:00Z"]])
    );
}

#[test]
fn test_temporal_extent_spans_all_steps() {
    let spec = GranuleSpec::uk_monthly().with_time_steps(3);
    let collection = build(&spec, &CollectionOptions::default()).unwrap();

    let [start, end] = collection.extent.temporal.interval[0];
    let december = Utc.with_ymd_and_hms(1999, 12, 1, 0, 0, 0).unwrap();
    assert_eq!(start, Some(december));
    let end = end.unwrap();
    assert!(end > december, "end {} not after start", end);
}

#[test]
fn test_custom_fields_copied_from_attributes() {
    let collection = build(&GranuleSpec::uk_monthly(), &CollectionOptions::default()).unwrap();

    let fields = &collection.additional_fields;
    assert_eq!(fields.get("ukcp18:scenario"), Some(&json!("rcp85")));
    assert_eq!(fields.get("ukcp18:resolution"), Some(&json!("60km")));
}

#[test]
fn test_optional_field_omitted_when_attribute_missing() {
    let spec = GranuleSpec::uk_monthly().without_global_attribute("scenario");
    let collection = build(&spec, &CollectionOptions::default()).unwrap();

    assert!(!collection.additional_fields.contains_key("ukcp18:scenario"));
    assert!(collection.additional_fields.contains_key("ukcp18:resolution"));
}

#[test]
fn test_mandatory_field_missing_fails() {
    let spec = GranuleSpec::uk_monthly().without_global_attribute("scenario");
    let mut options = CollectionOptions::default();
    options.require_attribute("scenario");

    let err = build(&spec, &options).unwrap_err();
    match &err {
        StacError::MissingAttribute { field, attribute } => {
            assert_eq!(field, "ukcp18:scenario");
            assert_eq!(attribute, "scenario");
        }
        other => panic!("expected MissingAttribute, got {:?}", other),
    }
    assert_eq!(err.kind(), ErrorKind::MissingAttribute);
}

#[test]
fn test_datacube_and_item_assets() {
    let collection = build(&GranuleSpec::uk_monthly(), &CollectionOptions::default()).unwrap();
    let value = json(&collection);

    let dims = &value["cube:dimensions"];
    assert_eq!(dims["longitude"]["type"], "spatial");
    assert_eq!(dims["longitude"]["axis"], "x");
    assert_eq!(dims["latitude"]["axis"], "y");
    assert_eq!(dims["longitude"]["reference_system"], 4326);
    assert_eq!(dims["time"]["type"], "temporal");
    assert_eq!(dims["ensemble_member"]["type"], "other");

    let tas = &value["cube:variables"]["tas"];
    assert_eq!(tas["type"], "data");
    assert_eq!(tas["unit"], "K");

    let asset = &value["item_assets"]["tas"];
    assert_eq!(asset["title"], "Mean air temperature at 1.5m");
    assert_eq!(
        asset["type"],
        "image/tiff; application=geotiff; profile=cloud-optimized"
    );

    for ext in [extensions::DATACUBE, extensions::ITEM_ASSETS] {
        assert!(collection.extensions.iter().any(|s| s == ext), "{} missing", ext);
    }
}

#[test]
fn test_osgb_collection_is_reprojected() {
    let collection = json(&build(&GranuleSpec::osgb_monthly(), &CollectionOptions::default()).unwrap());

    let [min_x, min_y, max_x, max_y] = spatial_bbox(&collection);
    assert!(min_x < max_x && min_y < max_y);
    assert!((-10.0..=2.0).contains(&min_x), "min_x {}", min_x);
    assert!((-10.0..=2.0).contains(&max_x), "max_x {}", max_x);
    assert!((49.0..=58.0).contains(&min_y), "min_y {}", min_y);
    assert!((49.0..=58.0).contains(&max_y), "max_y {}", max_y);
}

#[test]
fn test_global_collection_longitudes_normalised() {
    let collection = json(&build(&GranuleSpec::global_0_360(), &CollectionOptions::default()).unwrap());
    assert_bbox_approx_eq!(spatial_bbox(&collection), [-180.0, -90.0, 180.0, 90.0], 1e-9);
}

#[test]
fn test_collection_is_deterministic() {
    let (_dir, path) = write(&GranuleSpec::uk_monthly());
    let dataset = open_dataset(&[&path], &LoaderConfig::default()).unwrap();
    let options = CollectionOptions::default();

    let first = serde_json::to_string_pretty(&create_collection(&dataset, &options).unwrap()).unwrap();
    let second = serde_json::to_string_pretty(&create_collection(&dataset, &options).unwrap()).unwrap();
    assert_eq!(first, second);
}

#[test]
fn test_written_collection_reads_back() {
    let collection = build(&GranuleSpec::uk_monthly(), &CollectionOptions::default()).unwrap();
    let out = tempfile::tempdir().unwrap();
    let path = collection_path(out.path(), None);

    write_json(&collection, &path).unwrap();
    let first = std::fs::read(&path).unwrap();
    write_json(&collection, &path).unwrap();
    assert_eq!(first, std::fs::read(&path).unwrap());

    let back: Collection = read_json(&path).unwrap();
    assert_eq!(back.id, collection.id);
    assert_eq!(json(&back), json(&collection));
}

#[tokio::test]
async fn test_collection_from_glob() {
    let dir = tempfile::tempdir().unwrap();
    GranuleSpec::uk_monthly().write_to_dir(dir.path()).unwrap();
    GranuleSpec::uk_monthly()
        .with_variable("pr", "Precipitation rate")
        .write_to_dir(dir.path())
        .unwrap();

    let resolver = SourceResolver::new(StorageConfig::default());
    let pattern = format!("{}/*.nc", dir.path().display());
    let collection = collection_from_source(
        &pattern,
        &resolver,
        &LoaderConfig::default(),
        &CollectionOptions::default(),
    )
    .await
    .unwrap();

    let assets = &json(&collection)["item_assets"];
    assert!(assets.get("tas").is_some());
    assert!(assets.get("pr").is_some());
}

#[tokio::test]
async fn test_missing_time_is_schema_error() {
    let (dir, path) = write(&GranuleSpec::uk_monthly().without_time());
    let resolver = SourceResolver::new(StorageConfig::default());

    let err = collection_from_source(
        &path.display().to_string(),
        &resolver,
        &LoaderConfig::default(),
        &CollectionOptions::default(),
    )
    .await
    .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Schema, "{}", err);
    assert!(!dir.path().join("collection.json").exists());
}

#[tokio::test]
async fn test_missing_source_is_data_access_error() {
    let dir = tempfile::tempdir().unwrap();
    let resolver = SourceResolver::new(StorageConfig::default());

    let err = collection_from_source(
        &dir.path().join("absent.nc").display().to_string(),
        &resolver,
        &LoaderConfig::default(),
        &CollectionOptions::default(),
    )
    .await
    .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::DataAccess, "{}", err);
}
