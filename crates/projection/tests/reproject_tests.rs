//! Reprojection against PROJ. British National Grid is the native CRS of the
//! UKCP18 regional products.

use projection::{identify_epsg, to_wkt, Reprojector};
use test_utils::assert_approx_eq;
use ukcp18_common::{BoundingBox, CrsDescriptor};

#[test]
fn test_bng_to_geographic_covers_great_britain() {
    let reprojector = Reprojector::new(&CrsDescriptor::Epsg(27700)).unwrap();
    assert!(!reprojector.is_identity());

    let native = BoundingBox::new(0.0, 0.0, 700_000.0, 1_250_000.0);
    let geo = reprojector.to_geographic(&native).unwrap();

    assert!(geo.min_x > -10.0 && geo.min_x < -7.0, "min lon {}", geo.min_x);
    assert!(geo.max_x > 1.0 && geo.max_x < 4.0, "max lon {}", geo.max_x);
    assert!(geo.min_y > 49.0 && geo.min_y < 50.0, "min lat {}", geo.min_y);
    assert!(geo.max_y > 60.0 && geo.max_y < 61.5, "max lat {}", geo.max_y);
}

#[test]
fn test_round_trip_envelope_contains_original() {
    let reprojector = Reprojector::new(&CrsDescriptor::Epsg(27700)).unwrap();
    let native = BoundingBox::new(300_000.0, 400_000.0, 400_000.0, 500_000.0);

    let back = reprojector
        .to_native(&reprojector.to_geographic(&native).unwrap())
        .unwrap();

    // envelope of an envelope grows, never shrinks
    assert!(back.contains(&native, 1.0));
    assert!(back.approx_eq(&native, 10_000.0));
}

#[test]
fn test_epsg_resolved_from_wkt() {
    let wkt = to_wkt(&CrsDescriptor::Epsg(27700)).unwrap();
    assert!(wkt.contains("British"));
    assert_eq!(identify_epsg(&CrsDescriptor::Wkt(wkt)), Some(27700));
    assert_eq!(identify_epsg(&CrsDescriptor::Epsg(4326)), Some(4326));
}

#[test]
fn test_invalid_wkt_rejected() {
    let crs = CrsDescriptor::Wkt("NOT A CRS".to_string());
    assert!(Reprojector::new(&crs).is_err());
    assert_eq!(identify_epsg(&crs), None);
}

#[test]
fn test_geographic_passthrough_preserves_values() {
    let reprojector = Reprojector::new(&CrsDescriptor::Epsg(4326)).unwrap();
    let bbox = BoundingBox::new(-10.0, 49.0, 2.0, 61.0);
    let out = reprojector.to_geographic(&bbox).unwrap();
    assert_approx_eq!(out.min_x, -10.0, 1e-12);
    assert_approx_eq!(out.max_y, 61.0, 1e-12);
}

#[test]
fn test_wgs84_wkt_is_geographic() {
    let wkt = to_wkt(&CrsDescriptor::Epsg(4326)).unwrap();
    let reprojector = Reprojector::new(&CrsDescriptor::Wkt(wkt)).unwrap();
    assert!(reprojector.is_geographic());

    let geo = reprojector
        .to_geographic(&BoundingBox::new(0.0, -90.0, 360.0, 90.0))
        .unwrap();
    assert_approx_eq!(geo.min_x, -180.0, 1e-9);
    assert_approx_eq!(geo.max_x, 180.0, 1e-9);
}

#[test]
fn test_bng_is_not_geographic() {
    let reprojector = Reprojector::new(&CrsDescriptor::Epsg(27700)).unwrap();
    assert!(!reprojector.is_geographic());
}

#[test]
fn test_footprint_maps_back_to_native_bbox() {
    let reprojector = Reprojector::new(&CrsDescriptor::Epsg(27700)).unwrap();
    let native = BoundingBox::new(0.0, 0.0, 600_000.0, 720_000.0);

    let ring = reprojector.footprint(&native).unwrap();
    assert_eq!(ring.first(), ring.last());

    let back = reprojector.points_to_native(&ring).unwrap();
    let envelope = BoundingBox::from_extents(
        back.iter().map(|p| p[0]),
        back.iter().map(|p| p[1]),
    )
    .unwrap();
    assert!(envelope.approx_eq(&native, 1e-5 * native.width()));
}
