//! Bounding-box reprojection between a native CRS and WGS84.

use gdal::spatial_ref::{AxisMappingStrategy, CoordTransform, SpatialRef};
use tracing::debug;

use ukcp18_common::{BoundingBox, CrsDescriptor, WGS84_EPSG};

use crate::error::{ProjectionError, ProjectionResult};

/// Points sampled along each bbox edge before transforming.
pub const DENSIFY_POINTS: usize = 21;

/// Build a GDAL spatial reference with longitude/easting first.
pub fn to_spatial_ref(crs: &CrsDescriptor) -> ProjectionResult<SpatialRef> {
    let result = match crs {
        CrsDescriptor::Epsg(code) => SpatialRef::from_epsg(*code),
        CrsDescriptor::Wkt(wkt) => SpatialRef::from_wkt(wkt),
    };
    let mut srs = result.map_err(|e| ProjectionError::InvalidCrs {
        crs: crs.to_string(),
        message: e.to_string(),
    })?;
    srs.set_axis_mapping_strategy(AxisMappingStrategy::TraditionalGisOrder);
    Ok(srs)
}

/// The EPSG code GDAL associates with `srs`, if any.
pub fn epsg_code(srs: &SpatialRef) -> Option<u32> {
    match srs.auth_name() {
        Ok(name) if name.eq_ignore_ascii_case("EPSG") => {
            srs.auth_code().ok().and_then(|c| u32::try_from(c).ok())
        }
        _ => None,
    }
}

/// Resolve a descriptor to an EPSG code, consulting GDAL for WKT definitions.
pub fn identify_epsg(crs: &CrsDescriptor) -> Option<u32> {
    match crs {
        CrsDescriptor::Epsg(code) => Some(*code),
        CrsDescriptor::Wkt(_) => to_spatial_ref(crs).ok().as_ref().and_then(epsg_code),
    }
}

/// WKT of a CRS as GDAL exports it.
pub fn to_wkt(crs: &CrsDescriptor) -> ProjectionResult<String> {
    match crs {
        CrsDescriptor::Wkt(wkt) => Ok(wkt.clone()),
        CrsDescriptor::Epsg(_) => {
            to_spatial_ref(crs)?
                .to_wkt()
                .map_err(|e| ProjectionError::InvalidCrs {
                    crs: crs.to_string(),
                    message: e.to_string(),
                })
        }
    }
}

/// Transforms bounding boxes between a native CRS and EPSG:4326.
///
/// WGS84 sources, by code or by WKT, pass through unchanged. Longitudes of
/// any geographic source are normalised to `[-180, 180]` on the way out.
pub struct Reprojector {
    crs: CrsDescriptor,
    geographic: bool,
    transforms: Option<(CoordTransform, CoordTransform)>,
}

impl std::fmt::Debug for Reprojector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reprojector")
            .field("crs", &self.crs.to_string())
            .field("geographic", &self.geographic)
            .field("identity", &self.transforms.is_none())
            .finish()
    }
}

impl Reprojector {
    pub fn new(crs: &CrsDescriptor) -> ProjectionResult<Self> {
        if crs.is_wgs84() {
            return Ok(Self::identity(crs));
        }

        let native = to_spatial_ref(crs)?;
        if epsg_code(&native) == Some(WGS84_EPSG) {
            return Ok(Self::identity(crs));
        }
        let wgs84 = to_spatial_ref(&CrsDescriptor::Epsg(WGS84_EPSG))?;

        let build = |from: &SpatialRef, to: &SpatialRef| {
            CoordTransform::new(from, to).map_err(|e| ProjectionError::InvalidCrs {
                crs: crs.to_string(),
                message: e.to_string(),
            })
        };
        let forward = build(&native, &wgs84)?;
        let inverse = build(&wgs84, &native)?;

        Ok(Self {
            crs: crs.clone(),
            geographic: native.is_geographic(),
            transforms: Some((forward, inverse)),
        })
    }

    fn identity(crs: &CrsDescriptor) -> Self {
        Self {
            crs: crs.clone(),
            geographic: true,
            transforms: None,
        }
    }

    pub fn is_identity(&self) -> bool {
        self.transforms.is_none()
    }

    /// Whether native coordinates are longitude/latitude.
    pub fn is_geographic(&self) -> bool {
        self.geographic
    }

    /// Native bbox to WGS84 `[lon, lat]` bbox.
    pub fn to_geographic(&self, bbox: &BoundingBox) -> ProjectionResult<BoundingBox> {
        let bbox = self.normalized(bbox);
        match &self.transforms {
            None => Ok(bbox),
            Some((forward, _)) => transform_bbox(forward, &bbox),
        }
    }

    /// WGS84 bbox back to the native CRS.
    pub fn to_native(&self, bbox: &BoundingBox) -> ProjectionResult<BoundingBox> {
        match &self.transforms {
            None => Ok(*bbox),
            Some((_, inverse)) => transform_bbox(inverse, bbox),
        }
    }

    /// Closed WGS84 ring tracing the native bbox outline.
    ///
    /// Projected outlines are densified so the ring follows curved edges;
    /// geographic ones are the normalised rectangle.
    pub fn footprint(&self, bbox: &BoundingBox) -> ProjectionResult<Vec<[f64; 2]>> {
        let bbox = self.normalized(bbox);
        if !bbox.is_valid() {
            return Err(ProjectionError::InvalidBbox(bbox.to_array()));
        }
        let forward = match &self.transforms {
            Some((forward, _)) if !self.geographic => forward,
            _ => return Ok(self.to_geographic(&bbox)?.to_polygon_ring()),
        };

        let (mut xs, mut ys) = densify(&bbox, DENSIFY_POINTS);
        let mut zs = vec![0.0; xs.len()];
        forward
            .transform_coords(&mut xs, &mut ys, &mut zs)
            .map_err(|e| ProjectionError::Transform(e.to_string()))?;

        let mut ring: Vec<[f64; 2]> = xs.into_iter().zip(ys).map(|(x, y)| [x, y]).collect();
        if let Some(first) = ring.first().copied() {
            ring.push(first);
        }
        Ok(ring)
    }

    /// WGS84 `[lon, lat]` points in the native CRS.
    pub fn points_to_native(&self, points: &[[f64; 2]]) -> ProjectionResult<Vec<[f64; 2]>> {
        let inverse = match &self.transforms {
            None => return Ok(points.to_vec()),
            Some((_, inverse)) => inverse,
        };
        let mut xs: Vec<f64> = points.iter().map(|p| p[0]).collect();
        let mut ys: Vec<f64> = points.iter().map(|p| p[1]).collect();
        let mut zs = vec![0.0; points.len()];
        inverse
            .transform_coords(&mut xs, &mut ys, &mut zs)
            .map_err(|e| ProjectionError::Transform(e.to_string()))?;
        Ok(xs.into_iter().zip(ys).map(|(x, y)| [x, y]).collect())
    }

    fn normalized(&self, bbox: &BoundingBox) -> BoundingBox {
        if self.geographic {
            bbox.normalize_longitudes()
        } else {
            *bbox
        }
    }
}

/// Transform every densified edge point and take the envelope.
fn transform_bbox(transform: &CoordTransform, bbox: &BoundingBox) -> ProjectionResult<BoundingBox> {
    if !bbox.is_valid() {
        return Err(ProjectionError::InvalidBbox(bbox.to_array()));
    }

    let (mut xs, mut ys) = densify(bbox, DENSIFY_POINTS);
    let mut zs = vec![0.0; xs.len()];

    transform
        .transform_coords(&mut xs, &mut ys, &mut zs)
        .map_err(|e| ProjectionError::Transform(e.to_string()))?;

    let out = BoundingBox::from_extents(xs, ys)
        .ok_or(ProjectionError::InvalidBbox(bbox.to_array()))?;
    debug!(input = ?bbox.to_array(), output = ?out.to_array(), "Reprojected bbox");
    Ok(out)
}

/// Points along the perimeter, `per_edge` per side (corners shared).
fn densify(bbox: &BoundingBox, per_edge: usize) -> (Vec<f64>, Vec<f64>) {
    let steps = per_edge.max(2) - 1;
    let mut xs = Vec::with_capacity(steps * 4);
    let mut ys = Vec::with_capacity(steps * 4);

    let corners = [
        (bbox.min_x, bbox.min_y),
        (bbox.max_x, bbox.min_y),
        (bbox.max_x, bbox.max_y),
        (bbox.min_x, bbox.max_y),
    ];
    for i in 0..4 {
        let (x0, y0) = corners[i];
        let (x1, y1) = corners[(i + 1) % 4];
        for s in 0..steps {
            let t = s as f64 / steps as f64;
            xs.push(x0 + (x1 - x0) * t);
            ys.push(y0 + (y1 - y0) * t);
        }
    }
    (xs, ys)
}
