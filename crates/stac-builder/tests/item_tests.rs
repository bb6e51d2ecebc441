//! Item builder against generated granules.

use std::path::{Path, PathBuf};

use chrono::{TimeZone, Utc};
use projection::Reprojector;
use serde_json::{json, Value};
use stac_builder::{create_item, extensions, item_path, write_json, ErrorKind, Item, ItemOptions};
use test_utils::{
    assert_approx_eq, assert_bbox_approx_eq, GranuleSpec, Storage, TimeSpec, UK_BBOX,
};
use ukcp18_common::{BoundingBox, CrsDescriptor};

const COG: &str = "image/tiff; application=geotiff; profile=cloud-optimized";

fn write(spec: &GranuleSpec) -> (tempfile::TempDir, String) {
    let dir = tempfile::tempdir().expect("temp dir");
    let path = spec.write_to_dir(dir.path()).expect("write fixture");
    (dir, path.display().to_string())
}

fn json(item: &Item) -> Value {
    serde_json::to_value(item).unwrap()
}

fn bbox(item: &Value) -> [f64; 4] {
    serde_json::from_value(item["bbox"].clone()).unwrap()
}

fn entries(dir: &Path) -> Vec<PathBuf> {
    let mut paths: Vec<PathBuf> = std::fs::read_dir(dir)
        .map(|rd| rd.map(|e| e.unwrap().path()).collect())
        .unwrap_or_default();
    paths.sort();
    paths
}

// =============================================================================
// Scenario granule
// =============================================================================

#[tokio::test]
async fn test_uk_item() {
    let (_src, source) = write(&GranuleSpec::uk_monthly());
    let out = tempfile::tempdir().unwrap();

    let output = create_item(&source, out.path(), &ItemOptions::default())
        .await
        .unwrap();
    let item = json(&output.item);

    assert_eq!(item["type"], "Feature");
    assert_eq!(item["id"], "ukcp18-mon-rcp85-1-tas-19991201");
    assert_eq!(item["properties"]["datetime"], "1999-12-01T00:00:00Z");
    assert_bbox_approx_eq!(bbox(&item), UK_BBOX, 1e-6);
    assert_eq!(item["geometry"]["type"], "Polygon");

    let data = &item["assets"]["data"];
    assert_eq!(data["type"], COG);
    assert_eq!(data["href"], "./ukcp18-mon-rcp85-1-tas-19991201.tif");
    assert_eq!(data["roles"], json!(["data"]));
    assert!(output.asset_path.is_file());
    assert_eq!(
        output.asset_path,
        out.path().join("ukcp18-mon-rcp85-1-tas-19991201.tif")
    );

    let props = &item["properties"];
    assert_eq!(props["proj:epsg"], 4326);
    assert_eq!(props["proj:shape"], json!([12, 12]));
    assert_eq!(props["ukcp18:scenario"], "rcp85");
    assert_eq!(props["ukcp18:member_id"], 1);
    assert_eq!(props["ukcp18:temporal_resolution"], "mon");
}

#[tokio::test]
async fn test_item_datacube_describes_selected_slice() {
    let (_src, source) = write(&GranuleSpec::uk_monthly().with_time_steps(3));
    let out = tempfile::tempdir().unwrap();
    let options = ItemOptions {
        time_index: Some(1),
        ..Default::default()
    };

    let output = create_item(&source, out.path(), &options).await.unwrap();
    let item = json(&output.item);
    let props = &item["properties"];

    let dims = &props["cube:dimensions"];
    assert_eq!(dims["longitude"]["axis"], "x");
    assert_eq!(dims["latitude"]["axis"], "y");
    assert_eq!(dims["time"]["type"], "temporal");
    let extent = dims["time"]["extent"].as_array().unwrap();
    assert_eq!(extent[0], props["datetime"]);
    assert_eq!(extent[1], props["datetime"]);

    let variables = props["cube:variables"].as_object().unwrap();
    assert_eq!(variables.len(), 1);
    assert_eq!(variables["tas"]["unit"], "K");

    assert!(output
        .item
        .extensions
        .iter()
        .any(|e| e == extensions::DATACUBE));
}

#[tokio::test]
async fn test_item_raster_band_metadata() {
    let (_src, source) = write(&GranuleSpec::uk_monthly());
    let out = tempfile::tempdir().unwrap();

    let output = create_item(&source, out.path(), &ItemOptions::default())
        .await
        .unwrap();

    let bands = &json(&output.item)["assets"]["data"]["raster:bands"];
    assert_eq!(bands[0]["data_type"], "float32");
    assert_eq!(bands[0]["unit"], "K");
    assert_approx_eq!(bands[0]["spatial_resolution"].as_f64().unwrap(), 1.0, 1e-9);
    assert_eq!(output.raster.data_type, "float32");
}

#[tokio::test]
async fn test_float64_variable_written_as_float64() {
    let (_src, source) = write(&GranuleSpec::uk_monthly().with_storage(Storage::Float64));
    let out = tempfile::tempdir().unwrap();

    let output = create_item(&source, out.path(), &ItemOptions::default())
        .await
        .unwrap();

    let bands = &json(&output.item)["assets"]["data"]["raster:bands"];
    assert_eq!(bands[0]["data_type"], "float64");
    assert_eq!(output.raster.data_type, "float64");
}

#[tokio::test]
async fn test_packed_variable_written_as_float32() {
    let (_src, source) = write(&GranuleSpec::uk_monthly().with_storage(Storage::PackedInt16));
    let out = tempfile::tempdir().unwrap();

    let output = create_item(&source, out.path(), &ItemOptions::default())
        .await
        .unwrap();

    assert_eq!(output.raster.data_type, "float32");
}

#[tokio::test]
async fn test_item_time_range_from_bounds() {
    let (_src, source) = write(&GranuleSpec::uk_monthly());
    let out = tempfile::tempdir().unwrap();

    let item = create_item(&source, out.path(), &ItemOptions::default())
        .await
        .unwrap()
        .item;

    let start = Utc.with_ymd_and_hms(1999, 12, 1, 0, 0, 0).unwrap();
    assert_eq!(item.properties.start_datetime, Some(start));
    assert!(item.properties.end_datetime.unwrap() > start);
}

#[tokio::test]
async fn test_native_bbox_round_trip() {
    let (_src, source) = write(&GranuleSpec::uk_monthly());
    let out = tempfile::tempdir().unwrap();

    let item = json(
        &create_item(&source, out.path(), &ItemOptions::default())
            .await
            .unwrap()
            .item,
    );

    let proj_bbox: [f64; 4] =
        serde_json::from_value(item["properties"]["proj:bbox"].clone()).unwrap();
    let [min_x, min_y, max_x, max_y] = bbox(&item);
    let reprojector = Reprojector::new(&CrsDescriptor::Epsg(4326)).unwrap();
    let native = reprojector
        .to_native(&BoundingBox::new(min_x, min_y, max_x, max_y))
        .unwrap();

    assert_bbox_approx_eq!(native.to_array(), proj_bbox, 1e-6);
}

#[tokio::test]
async fn test_osgb_item_keeps_native_projection() {
    let (_src, source) = write(&GranuleSpec::osgb_monthly());
    let out = tempfile::tempdir().unwrap();

    let output = create_item(&source, out.path(), &ItemOptions::default())
        .await
        .unwrap();
    let item = json(&output.item);
    let props = &item["properties"];

    assert_eq!(props["proj:epsg"], 27700);
    assert_eq!(props["proj:shape"], json!([12, 10]));
    assert_eq!(props["proj:bbox"], json!([0.0, 0.0, 600000.0, 720000.0]));

    let [min_x, min_y, max_x, max_y] = bbox(&item);
    assert!((-10.0..=2.0).contains(&min_x) && (-10.0..=2.0).contains(&max_x));
    assert!((49.0..=58.0).contains(&min_y) && (49.0..=58.0).contains(&max_y));
}

#[tokio::test]
async fn test_osgb_geometry_maps_back_to_proj_bbox() {
    let (_src, source) = write(&GranuleSpec::osgb_monthly());
    let out = tempfile::tempdir().unwrap();

    let item = json(
        &create_item(&source, out.path(), &ItemOptions::default())
            .await
            .unwrap()
            .item,
    );

    let proj_bbox: [f64; 4] =
        serde_json::from_value(item["properties"]["proj:bbox"].clone()).unwrap();
    let ring: Vec<[f64; 2]> =
        serde_json::from_value(item["geometry"]["coordinates"][0].clone()).unwrap();

    let reprojector = Reprojector::new(&CrsDescriptor::Epsg(27700)).unwrap();
    let native = reprojector.points_to_native(&ring).unwrap();
    let envelope =
        BoundingBox::from_extents(native.iter().map(|p| p[0]), native.iter().map(|p| p[1]))
            .unwrap();

    let extent = (proj_bbox[2] - proj_bbox[0]).max(proj_bbox[3] - proj_bbox[1]);
    assert_bbox_approx_eq!(envelope.to_array(), proj_bbox, 1e-5 * extent);
}

#[tokio::test]
async fn test_geographic_wkt_override_normalises_longitudes() {
    let (_src, source) = write(&GranuleSpec::global_0_360());
    let out = tempfile::tempdir().unwrap();
    let wkt = projection::to_wkt(&CrsDescriptor::Epsg(4326)).unwrap();
    let mut options = ItemOptions::default();
    options.loader.crs_override = Some(CrsDescriptor::Wkt(wkt));

    let output = create_item(&source, out.path(), &options).await.unwrap();
    let item = json(&output.item);

    assert_bbox_approx_eq!(bbox(&item), [-180.0, -90.0, 180.0, 90.0], 1e-9);
    let proj_bbox: [f64; 4] =
        serde_json::from_value(item["properties"]["proj:bbox"].clone()).unwrap();
    assert_bbox_approx_eq!(proj_bbox, [0.0, -90.0, 360.0, 90.0], 1e-9);
    assert!(output.asset_path.is_file());
}

#[tokio::test]
async fn test_invalid_record_leaves_no_asset() {
    let mut time = TimeSpec::monthly_360(1);
    // bounds reversed so the item's start is after its end
    time.bounds = time.bounds.map(|b| vec![b[1], b[0]]);
    let (_src, source) = write(&GranuleSpec::uk_monthly().with_time(time));
    let out = tempfile::tempdir().unwrap();

    let err = create_item(&source, out.path(), &ItemOptions::default())
        .await
        .unwrap_err();

    assert!(matches!(err, stac_builder::StacError::Validation(_)), "{}", err);
    assert!(entries(out.path()).is_empty());
}

#[tokio::test]
async fn test_item_json_is_idempotent() {
    let (_src, source) = write(&GranuleSpec::uk_monthly());
    let out = tempfile::tempdir().unwrap();

    let first = create_item(&source, out.path(), &ItemOptions::default())
        .await
        .unwrap();
    let path = item_path(out.path(), &first.item.id, None);
    write_json(&first.item, &path).unwrap();
    let first_bytes = std::fs::read(&path).unwrap();

    let second = create_item(&source, out.path(), &ItemOptions::default())
        .await
        .unwrap();
    write_json(&second.item, &path).unwrap();

    assert_eq!(first_bytes, std::fs::read(&path).unwrap());
    assert_eq!(entries(out.path()).len(), 2);

    let back: Item = stac_builder::read_json(&path).unwrap();
    assert_eq!(back.id, first.item.id);
    assert_eq!(back.assets["data"].href, first.item.assets["data"].href);
    assert_eq!(json(&back), json(&first.item));
}

#[tokio::test]
async fn test_collection_link() {
    let (_src, source) = write(&GranuleSpec::uk_monthly());
    let out = tempfile::tempdir().unwrap();
    let options = ItemOptions {
        collection_id: Some("ukcp-18".to_string()),
        asset_filename: Some("tas.tif".to_string()),
        ..Default::default()
    };

    let output = create_item(&source, out.path(), &options).await.unwrap();

    assert_eq!(output.item.collection.as_deref(), Some("ukcp-18"));
    assert!(output
        .item
        .links
        .iter()
        .any(|l| l.rel == "collection" && l.href == "./collection.json"));
    assert_eq!(output.item.assets["data"].href, "./tas.tif");
    assert!(out.path().join("tas.tif").is_file());
}

// =============================================================================
// Time and variable selection
// =============================================================================

#[tokio::test]
async fn test_multiple_time_steps_need_selection() {
    let (_src, source) = write(&GranuleSpec::uk_monthly().with_time_steps(3));
    let out = tempfile::tempdir().unwrap();

    let err = create_item(&source, out.path(), &ItemOptions::default())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::AmbiguousSource, "{}", err);
    assert!(entries(out.path()).is_empty());

    let by_index = ItemOptions {
        time_index: Some(1),
        ..Default::default()
    };
    let december = Utc.with_ymd_and_hms(1999, 12, 1, 0, 0, 0).unwrap();
    let item = create_item(&source, out.path(), &by_index).await.unwrap().item;
    assert_ne!(item.properties.datetime, Some(december));

    let by_datetime = ItemOptions {
        datetime: Some(december),
        ..Default::default()
    };
    let item = create_item(&source, out.path(), &by_datetime).await.unwrap().item;
    assert_eq!(item.properties.datetime, Some(december));
}

#[tokio::test]
async fn test_time_index_out_of_range() {
    let (_src, source) = write(&GranuleSpec::uk_monthly());
    let out = tempfile::tempdir().unwrap();
    let options = ItemOptions {
        time_index: Some(5),
        ..Default::default()
    };

    let err = create_item(&source, out.path(), &options).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::AmbiguousSource);
}

#[tokio::test]
async fn test_unknown_variable_is_schema_error() {
    let (_src, source) = write(&GranuleSpec::uk_monthly());
    let out = tempfile::tempdir().unwrap();
    let options = ItemOptions {
        variable: Some("pr".to_string()),
        ..Default::default()
    };

    let err = create_item(&source, out.path(), &options).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Schema, "{}", err);
}

// =============================================================================
// Failures
// =============================================================================

#[tokio::test]
async fn test_missing_time_is_schema_error() {
    let (_src, source) = write(&GranuleSpec::uk_monthly().without_time());
    let out = tempfile::tempdir().unwrap();

    let err = create_item(&source, out.path(), &ItemOptions::default())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Schema, "{}", err);
    assert!(entries(out.path()).is_empty());
}

#[tokio::test]
async fn test_glob_with_several_granules_is_ambiguous() {
    let src = tempfile::tempdir().unwrap();
    GranuleSpec::uk_monthly().write_to_dir(src.path()).unwrap();
    GranuleSpec::uk_monthly()
        .with_variable("pr", "Precipitation rate")
        .write_to_dir(src.path())
        .unwrap();
    let out = tempfile::tempdir().unwrap();

    let pattern = format!("{}/*.nc", src.path().display());
    let err = create_item(&pattern, out.path(), &ItemOptions::default())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::AmbiguousSource, "{}", err);
    assert!(entries(out.path()).is_empty());
}

#[tokio::test]
async fn test_glob_without_matches_is_ambiguous() {
    let src = tempfile::tempdir().unwrap();
    let out = tempfile::tempdir().unwrap();

    let pattern = format!("{}/*.nc", src.path().display());
    let err = create_item(&pattern, out.path(), &ItemOptions::default())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::AmbiguousSource, "{}", err);
}

#[tokio::test]
async fn test_unwritable_destination_is_raster_write_error() {
    let (_src, source) = write(&GranuleSpec::uk_monthly());
    let out = tempfile::tempdir().unwrap();
    let blocker = out.path().join("not-a-dir");
    std::fs::write(&blocker, b"x").unwrap();
    let destination = blocker.join("items");

    let err = create_item(&source, &destination, &ItemOptions::default())
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::RasterWrite, "{}", err);
    assert_eq!(err.exit_code(), 6);
    assert_eq!(entries(out.path()), vec![blocker]);
}
