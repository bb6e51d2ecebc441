//! Item Builder.

use chrono::{DateTime, Utc};
use serde_json::{json, Map, Value};
use stac::{Asset, Bbox, Item, Link};
use std::path::{Path, PathBuf};
use tracing::{info, instrument, warn};

use cog_writer::{write_cog, AxisCoords, GeoGrid, RasterInfo, COG_MEDIA_TYPE};
use netcdf_parser::{open_dataset, AttributeKey, Dataset, VariableInfo};
use projection::Reprojector;
use storage::{SourceResolver, StorageError};
use ukcp18_common::{format_rfc3339, BoundingBox, CrsDescriptor};

use crate::collection::{cube_dimensions, cube_variables};
use crate::error::{StacError, StacResult};
use crate::metadata::{declare_extension, extensions, GranuleParts, NETCDF_MEDIA_TYPE};
use crate::options::ItemOptions;
use crate::validate::{check_schema, validate_item};

/// Result of [`create_item`]: the record plus the asset it references.
#[derive(Debug, Clone)]
pub struct ItemOutput {
    pub item: Item,
    /// Where the COG was written
    pub asset_path: PathBuf,
    /// Native grid of the written COG
    pub raster: RasterInfo,
}

/// Build the item for one granule and write its COG into `destination`.
///
/// `source` must resolve to exactly one file and, after applying the time
/// selection in `options`, to exactly one time slice.
#[instrument(skip(options, destination), fields(destination = %destination.display()))]
pub async fn create_item(
    source: &str,
    destination: &Path,
    options: &ItemOptions,
) -> StacResult<ItemOutput> {
    let resolver = SourceResolver::new(options.storage.clone());
    let resolved = match resolver.resolve_str(source).await {
        Ok(resolved) => resolved,
        Err(StorageError::NoMatches(location)) => {
            return Err(StacError::AmbiguousSource(format!(
                "{} matches no granules",
                location
            )))
        }
        Err(e) => return Err(e.into()),
    };
    let granule = resolved.single().ok_or_else(|| {
        StacError::AmbiguousSource(format!(
            "{} resolves to {} granules; expected one",
            source,
            resolved.len()
        ))
    })?;

    let dataset = open_dataset(&[granule.local_path.as_path()], &options.loader)?;
    let time_index = select_time(&dataset, options)?;
    let variable = select_variable(&dataset, options.variable.as_deref())?;
    let crs = dataset.crs().cloned().ok_or_else(|| {
        StacError::RasterWrite("dataset has no coordinate reference system".to_string())
    })?;

    let datetime = dataset.time()[time_index];
    let parts = granule.file_name().and_then(GranuleParts::from_filename);
    let id = item_id(
        parts.as_ref(),
        granule.file_name().unwrap_or("granule"),
        &variable.name,
        datetime,
    );

    let grid = dataset.read_slice(&variable.name, time_index)?;
    let x = dataset.x();
    let y = dataset.y();
    let geo_grid = GeoGrid::from_coordinates(
        AxisCoords::new(&x.values).with_bounds(x.bounds.as_deref()),
        AxisCoords::new(&y.values).with_bounds(y.bounds.as_deref()),
        grid.values,
        grid.nodata,
    )?
    .with_data_type(grid.data_type);

    std::fs::create_dir_all(destination).map_err(|e| {
        StacError::RasterWrite(format!("cannot create {}: {}", destination.display(), e))
    })?;
    let asset_name = options
        .asset_filename
        .clone()
        .unwrap_or_else(|| format!("{}.tif", id));
    let asset_path = destination.join(&asset_name);
    let raster = write_cog(&geo_grid, &crs, &asset_path, &options.cog)?;

    let record = ItemRecord {
        id: &id,
        dataset: &dataset,
        variable,
        time_index,
        crs: &crs,
        source_href: &granule.href,
        parts: parts.as_ref(),
    };
    let item = match record.assemble(&raster, &asset_name, options).await {
        Ok(item) => item,
        Err(e) => {
            // no asset without a valid record
            if let Err(remove) = std::fs::remove_file(&asset_path) {
                warn!(asset = %asset_path.display(), error = %remove, "Failed to remove asset");
            }
            return Err(e);
        }
    };

    info!(
        id = %item.id,
        variable = %variable.name,
        time_index,
        asset = %asset_path.display(),
        "Created item"
    );
    Ok(ItemOutput {
        item,
        asset_path,
        raster,
    })
}

/// Everything an item describes apart from the written COG.
struct ItemRecord<'a> {
    id: &'a str,
    dataset: &'a Dataset,
    variable: &'a VariableInfo,
    time_index: usize,
    crs: &'a CrsDescriptor,
    source_href: &'a str,
    parts: Option<&'a GranuleParts>,
}

impl ItemRecord<'_> {
    /// Build and check the item for the COG described by `raster`.
    async fn assemble(
        &self,
        raster: &RasterInfo,
        asset_name: &str,
        options: &ItemOptions,
    ) -> StacResult<Item> {
        let ItemRecord {
            id,
            dataset,
            variable,
            time_index,
            crs,
            source_href,
            parts,
        } = *self;

        let footprint = Reprojector::new(crs)?.footprint(&raster.bbox)?;
        let bbox = BoundingBox::from_extents(
            footprint.iter().map(|p| p[0]),
            footprint.iter().map(|p| p[1]),
        )
        .ok_or_else(|| StacError::Validation("item footprint is empty".to_string()))?;

        let mut item = Item::new(id);
        item.bbox = Some(Bbox::TwoDimensional(bbox.to_array()));
        item.geometry = Some(serde_json::from_value(json!({
            "type": "Polygon",
            "coordinates": [footprint],
        }))?);

        let datetime = dataset.time()[time_index];
        item.properties.datetime = Some(datetime);
        if let Some((start, end)) = dataset.time_bounds().map(|b| b[time_index]) {
            item.properties.start_datetime = Some(start);
            item.properties.end_datetime = Some(end);
        }

        declare_extension(&mut item.extensions, extensions::PROJECTION);
        insert_projection(&mut item.properties.additional_fields, raster, crs);

        insert_ukcp18_properties(
            &mut item.properties.additional_fields,
            dataset,
            parts,
            &variable.name,
        );

        declare_extension(&mut item.extensions, extensions::DATACUBE);
        let props = &mut item.properties.additional_fields;
        props.insert(
            "cube:dimensions".to_string(),
            cube_dimensions(dataset, crs, &[variable], Some([datetime, datetime])),
        );
        props.insert("cube:variables".to_string(), cube_variables(&[variable]));

        declare_extension(&mut item.extensions, extensions::RASTER);
        let mut data = Asset::new(format!("./{}", asset_name));
        data.r#type = Some(COG_MEDIA_TYPE.to_string());
        data.title = Some(variable.long_name().unwrap_or(variable.name.as_str()).to_string());
        data.description = variable.description().map(str::to_string);
        data.roles = vec!["data".to_string()];
        data.additional_fields
            .insert("raster:bands".to_string(), json!([raster_band(raster, variable)]));
        item.assets.insert("data".to_string(), data);

        let mut source = Asset::new(source_href);
        source.r#type = Some(NETCDF_MEDIA_TYPE.to_string());
        source.title = Some("Source NetCDF granule".to_string());
        source.roles = vec!["source".to_string()];
        item.assets.insert("source".to_string(), source);

        if let Some(collection_id) = &options.collection_id {
            item.collection = Some(collection_id.clone());
            let mut link = Link::new("./collection.json", "collection");
            link.r#type = Some("application/json".to_string());
            item.links.push(link);
        }

        validate_item(&item)?;
        check_schema(&item).await?;
        Ok(item)
    }
}

/// Pick the time slice: explicit index, then datetime, then the only slice.
fn select_time(dataset: &Dataset, options: &ItemOptions) -> StacResult<usize> {
    let times = dataset.time();

    if let Some(index) = options.time_index {
        return if index < times.len() {
            Ok(index)
        } else {
            Err(StacError::AmbiguousSource(format!(
                "time index {} is out of range; dataset has {} slices",
                index,
                times.len()
            )))
        };
    }

    if let Some(target) = options.datetime {
        let bounds = dataset.time_bounds();
        let matches: Vec<usize> = (0..times.len())
            .filter(|&i| {
                times[i] == target
                    || bounds
                        .map(|b| b[i].0 <= target && target < b[i].1)
                        .unwrap_or(false)
            })
            .collect();
        return match matches.as_slice() {
            [index] => Ok(*index),
            [] => Err(StacError::AmbiguousSource(format!(
                "no time slice matches {}",
                format_rfc3339(&target)
            ))),
            _ => Err(StacError::AmbiguousSource(format!(
                "{} time slices match {}",
                matches.len(),
                format_rfc3339(&target)
            ))),
        };
    }

    match times.len() {
        1 => Ok(0),
        n => Err(StacError::AmbiguousSource(format!(
            "dataset has {} time slices; select one by index or datetime",
            n
        ))),
    }
}

fn select_variable<'a>(dataset: &'a Dataset, name: Option<&str>) -> StacResult<&'a VariableInfo> {
    let candidates = dataset.data_variables();
    match name {
        Some(name) => candidates
            .into_iter()
            .find(|v| v.name == name)
            .ok_or_else(|| StacError::Schema(format!("data variable '{}' not found", name))),
        None => candidates
            .into_iter()
            .next()
            .ok_or_else(|| StacError::Schema("dataset has no data variables".to_string())),
    }
}

/// `ukcp18-<res>-<scenario>-<member>-<variable>-<YYYYMMDD>` for UKCP18 file
/// names, otherwise `<file stem>-<variable>-<YYYYMMDD>`.
fn item_id(
    parts: Option<&GranuleParts>,
    file_name: &str,
    variable: &str,
    datetime: DateTime<Utc>,
) -> String {
    let date = datetime.format("%Y%m%d");
    match parts {
        Some(p) => format!(
            "ukcp18-{}-{}-{}-{}-{}",
            p.temporal_resolution, p.scenario, p.member_id, variable, date
        ),
        None => {
            let stem = file_name
                .strip_suffix(".nc")
                .unwrap_or(file_name);
            format!("{}-{}-{}", stem, variable, date)
        }
    }
}

/// Projection fields describe the written native grid, not the geometry.
fn insert_projection(props: &mut Map<String, Value>, raster: &RasterInfo, crs: &CrsDescriptor) {
    match raster.epsg {
        Some(code) => {
            props.insert("proj:epsg".to_string(), json!(code));
        }
        None => {
            props.insert("proj:epsg".to_string(), Value::Null);
            let wkt = match crs {
                CrsDescriptor::Wkt(wkt) => Some(wkt.clone()),
                CrsDescriptor::Epsg(_) => raster.wkt.clone(),
            };
            if let Some(wkt) = wkt {
                props.insert("proj:wkt2".to_string(), json!(wkt));
            }
        }
    }
    props.insert("proj:shape".to_string(), json!(raster.shape()));
    props.insert("proj:transform".to_string(), json!(raster.stac_transform()));
    props.insert("proj:bbox".to_string(), json!(raster.bbox.to_array()));
}

/// Filename parts first, global attributes as fallback.
fn insert_ukcp18_properties(
    props: &mut Map<String, Value>,
    dataset: &Dataset,
    parts: Option<&GranuleParts>,
    variable: &str,
) {
    let attributes = dataset.attributes();

    props.insert("ukcp18:variable".to_string(), json!(variable));

    let scenario = parts
        .map(|p| p.scenario.as_str())
        .or_else(|| attributes.get_str(AttributeKey::Scenario));
    if let Some(scenario) = scenario {
        props.insert("ukcp18:scenario".to_string(), json!(scenario));
    }

    let resolution = parts
        .map(|p| p.temporal_resolution.as_str())
        .or_else(|| attributes.get_str(AttributeKey::Frequency));
    if let Some(resolution) = resolution {
        props.insert("ukcp18:temporal_resolution".to_string(), json!(resolution));
    }

    if let Some(parts) = parts {
        props.insert("ukcp18:member_id".to_string(), json!(parts.member_id));
        props.insert("ukcp18:granule_id".to_string(), json!(parts.item_id()));
    }
}

fn raster_band(raster: &RasterInfo, variable: &VariableInfo) -> Value {
    let mut band = json!({
        "data_type": raster.data_type,
        "spatial_resolution": raster.transform[1].abs(),
    });
    if let Some(nodata) = raster.nodata {
        band["nodata"] = if nodata.is_nan() {
            json!("nan")
        } else {
            json!(nodata)
        };
    }
    if let Some(units) = variable.units() {
        band["unit"] = json!(units);
    }
    band
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_item_id_from_parts() {
        let parts = GranuleParts::from_filename(
            "tas_rcp85_land-gcm_global_60km_01_mon_19991201-20091130.nc",
        )
        .unwrap();
        let t = Utc.with_ymd_and_hms(1999, 12, 1, 0, 0, 0).unwrap();
        assert_eq!(
            item_id(Some(&parts), &parts.filename, "tas", t),
            "ukcp18-mon-rcp85-1-tas-19991201"
        );
    }

    #[test]
    fn test_item_id_fallback() {
        let t = Utc.with_ymd_and_hms(2000, 1, 1, 0, 0, 0).unwrap();
        assert_eq!(item_id(None, "uk_tas.nc", "tas", t), "uk_tas-tas-20000101");
    }
}
