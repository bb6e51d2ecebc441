//! Synthetic UKCP18-like NetCDF granules.
//!
//! [`GranuleSpec`] describes a small file laid out like the UKCP18 land-gcm
//! products: `(ensemble_member, time, latitude, longitude)` data, `*_bnds`
//! cell edges, a `360_day` time axis and the usual global attributes.

use std::path::{Path, PathBuf};

use crate::generators::{cell_bounds, cell_centres, create_temperature_grid};

/// `_FillValue` written into data variables.
pub const FILL_VALUE: f32 = 1.0e20;

/// Edges of the default UK grid: `[min_lon, min_lat, max_lon, max_lat]`.
pub const UK_BBOX: [f64; 4] = [-10.0, 49.0, 2.0, 61.0];

/// 1999-12-01T00:00:00 as `hours since 1970-01-01 00:00:00` in the `360_day` calendar.
pub const DEC_1999_HOURS_360: f64 = 258_480.0;

/// Hours in one 360-day calendar month.
pub const HOURS_PER_MONTH_360: f64 = 720.0;

/// CF grid mapping written alongside the data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GridMapping {
    /// No grid-mapping variable; the CRS is implied by the axis names
    None,
    /// A `crs` variable with `grid_mapping_name = latitude_longitude`
    LatitudeLongitude,
    /// An OSGB `transverse_mercator` variable
    BritishNationalGrid,
}

/// On-disk type of the data variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Storage {
    Float32,
    Float64,
    /// `short` counts with `scale_factor = 0.01`, `add_offset = 270`
    PackedInt16,
}

/// Added to [`Storage::Float64`] values; below float32 resolution near 280 K.
pub const FLOAT64_FRACTION: f64 = 1.0e-6;

/// `_FillValue` of [`Storage::PackedInt16`] variables.
pub const PACKED_FILL_VALUE: i16 = -32767;

/// Time coordinate of a fixture.
#[derive(Debug, Clone, PartialEq)]
pub struct TimeSpec {
    pub values: Vec<f64>,
    pub units: String,
    pub calendar: String,
    /// Flattened `(n, 2)` bounds
    pub bounds: Option<Vec<f64>>,
}

impl TimeSpec {
    /// `steps` monthly values starting at 1999-12-01 in the 360-day calendar.
    pub fn monthly_360(steps: usize) -> Self {
        let values: Vec<f64> = (0..steps)
            .map(|i| DEC_1999_HOURS_360 + HOURS_PER_MONTH_360 * i as f64)
            .collect();
        let bounds = values
            .iter()
            .flat_map(|v| [*v, v + HOURS_PER_MONTH_360])
            .collect();
        Self {
            values,
            units: "hours since 1970-01-01 00:00:00".to_string(),
            calendar: "360_day".to_string(),
            bounds: Some(bounds),
        }
    }
}

/// Description of a synthetic granule.
#[derive(Debug, Clone, PartialEq)]
pub struct GranuleSpec {
    pub variable: String,
    pub long_name: String,
    pub units: String,
    pub scenario: String,
    pub member: u32,
    pub frequency: String,
    pub period: (String, String),
    pub x_name: String,
    pub y_name: String,
    pub x_units: String,
    pub y_units: String,
    pub x_start: f64,
    pub x_step: f64,
    pub width: usize,
    pub y_start: f64,
    pub y_step: f64,
    pub height: usize,
    pub descending_y: bool,
    pub with_bounds: bool,
    pub time: Option<TimeSpec>,
    pub grid_mapping: GridMapping,
    pub storage: Storage,
    /// Write the fill value into the first cell of every slice
    pub missing_corner: bool,
    pub global_attributes: Vec<(String, String)>,
}

impl GranuleSpec {
    /// A 12 x 12 one-degree grid over the UK with one monthly step at 1999-12-01.
    pub fn uk_monthly() -> Self {
        Self {
            variable: "tas".to_string(),
            long_name: "Mean air temperature at 1.5m".to_string(),
            units: "K".to_string(),
            scenario: "rcp85".to_string(),
            member: 1,
            frequency: "mon".to_string(),
            period: ("19991201".to_string(), "19991230".to_string()),
            x_name: "longitude".to_string(),
            y_name: "latitude".to_string(),
            x_units: "degrees_east".to_string(),
            y_units: "degrees_north".to_string(),
            x_start: UK_BBOX[0],
            x_step: 1.0,
            width: 12,
            y_start: UK_BBOX[1],
            y_step: 1.0,
            height: 12,
            descending_y: false,
            with_bounds: true,
            time: Some(TimeSpec::monthly_360(1)),
            grid_mapping: GridMapping::None,
            storage: Storage::Float32,
            missing_corner: true,
            global_attributes: vec![
                ("project".to_string(), "UKCP18".to_string()),
                ("scenario".to_string(), "rcp85".to_string()),
                ("resolution".to_string(), "60km".to_string()),
                ("domain".to_string(), "global".to_string()),
                ("frequency".to_string(), "mon".to_string()),
                ("collection".to_string(), "land-gcm".to_string()),
                ("institution".to_string(), "Met Office Hadley Centre (MOHC), FitzRoy Road, Exeter, Devon, EX1 3PB, UK.".to_string()),
                ("institution_id".to_string(), "MOHC".to_string()),
                ("title".to_string(), "UKCP18 land projections - 60km global".to_string()),
                ("version".to_string(), "v20190731".to_string()),
            ],
        }
    }

    /// The same grid size on British National Grid (60 km cells).
    pub fn osgb_monthly() -> Self {
        Self {
            x_name: "projection_x_coordinate".to_string(),
            y_name: "projection_y_coordinate".to_string(),
            x_units: "m".to_string(),
            y_units: "m".to_string(),
            x_start: 0.0,
            x_step: 60_000.0,
            width: 10,
            y_start: 0.0,
            y_step: 60_000.0,
            height: 12,
            grid_mapping: GridMapping::BritishNationalGrid,
            ..Self::uk_monthly()
        }
    }

    /// A global 30-degree grid with longitudes in `[0, 360)`.
    pub fn global_0_360() -> Self {
        Self {
            x_start: 0.0,
            x_step: 30.0,
            width: 12,
            y_start: -90.0,
            y_step: 30.0,
            height: 6,
            ..Self::uk_monthly()
        }
    }

    pub fn with_storage(mut self, storage: Storage) -> Self {
        self.storage = storage;
        self
    }

    pub fn with_variable(mut self, variable: &str, long_name: &str) -> Self {
        self.variable = variable.to_string();
        self.long_name = long_name.to_string();
        self
    }

    pub fn with_time_steps(mut self, steps: usize) -> Self {
        self.time = Some(TimeSpec::monthly_360(steps));
        self
    }

    pub fn with_time(mut self, time: TimeSpec) -> Self {
        self.time = Some(time);
        self
    }

    /// Omit the time dimension and coordinate entirely.
    pub fn without_time(mut self) -> Self {
        self.time = None;
        self
    }

    /// Grow the y axis by one leading row, as on the UKCP18 wind grids.
    pub fn with_extra_leading_row(mut self) -> Self {
        self.y_start -= self.y_step;
        self.height += 1;
        self
    }

    pub fn with_descending_y(mut self) -> Self {
        self.descending_y = true;
        self
    }

    pub fn without_bounds(mut self) -> Self {
        self.with_bounds = false;
        self
    }

    pub fn without_global_attribute(mut self, name: &str) -> Self {
        self.global_attributes.retain(|(k, _)| k != name);
        self
    }

    /// UKCP18 file name for this granule.
    pub fn filename(&self) -> String {
        format!(
            "{}_{}_land-gcm_global_60km_{:02}_{}_{}-{}.nc",
            self.variable, self.scenario, self.member, self.frequency, self.period.0, self.period.1
        )
    }

    pub fn x_values(&self) -> Vec<f64> {
        cell_centres(self.x_start, self.x_step, self.width)
    }

    pub fn y_values(&self) -> Vec<f64> {
        let mut values = cell_centres(self.y_start, self.y_step, self.height);
        if self.descending_y {
            values.reverse();
        }
        values
    }

    /// Write the granule into `dir` under [`filename`](Self::filename).
    pub fn write_to_dir(&self, dir: &Path) -> Result<PathBuf, netcdf::Error> {
        let path = dir.join(self.filename());
        self.write(&path)?;
        Ok(path)
    }

    /// Write the granule to `path`.
    pub fn write(&self, path: &Path) -> Result<(), netcdf::Error> {
        let mut file = netcdf::create(path)?;

        for (name, value) in &self.global_attributes {
            file.add_attribute(name, value.as_str())?;
        }

        file.add_dimension("ensemble_member", 1)?;
        if let Some(time) = &self.time {
            file.add_dimension("time", time.values.len())?;
        }
        file.add_dimension(&self.y_name, self.height)?;
        file.add_dimension(&self.x_name, self.width)?;
        file.add_dimension("bnds", 2)?;

        let x_bounds = cell_bounds(self.x_start, self.x_step, self.width);
        let mut y_bounds = cell_bounds(self.y_start, self.y_step, self.height);
        if self.descending_y {
            let mut pairs: Vec<[f64; 2]> =
                y_bounds.chunks_exact(2).map(|c| [c[0], c[1]]).collect();
            pairs.reverse();
            y_bounds = pairs.into_iter().flatten().collect();
        }

        let axes = [
            (&self.x_name, &self.x_units, "X", self.x_values(), x_bounds),
            (&self.y_name, &self.y_units, "Y", self.y_values(), y_bounds),
        ];
        for (name, units, axis, values, bounds) in axes {
            let bounds_name = format!("{}_bnds", name);
            {
                let mut var = file.add_variable::<f64>(name, &[name.as_str()])?;
                var.put_attribute("units", units.as_str())?;
                var.put_attribute("axis", axis)?;
                if self.with_bounds {
                    var.put_attribute("bounds", bounds_name.as_str())?;
                }
                var.put_values(&values, ..)?;
            }
            if self.with_bounds {
                let mut var = file.add_variable::<f64>(&bounds_name, &[name.as_str(), "bnds"])?;
                var.put_values(&bounds, ..)?;
            }
        }

        if let Some(time) = &self.time {
            {
                let mut var = file.add_variable::<f64>("time", &["time"])?;
                var.put_attribute("units", time.units.as_str())?;
                var.put_attribute("calendar", time.calendar.as_str())?;
                var.put_attribute("axis", "T")?;
                if time.bounds.is_some() {
                    var.put_attribute("bounds", "time_bnds")?;
                }
                var.put_values(&time.values, ..)?;
            }
            if let Some(bounds) = &time.bounds {
                let mut var = file.add_variable::<f64>("time_bnds", &["time", "bnds"])?;
                var.put_values(bounds, ..)?;
            }
        }

        let mapping_name = match self.grid_mapping {
            GridMapping::None => None,
            GridMapping::LatitudeLongitude => {
                let mut var = file.add_variable::<i32>("crs", &[])?;
                var.put_attribute("grid_mapping_name", "latitude_longitude")?;
                Some("crs")
            }
            GridMapping::BritishNationalGrid => {
                let mut var = file.add_variable::<i32>("transverse_mercator", &[])?;
                var.put_attribute("grid_mapping_name", "transverse_mercator")?;
                var.put_attribute("longitude_of_central_meridian", -2.0)?;
                var.put_attribute("latitude_of_projection_origin", 49.0)?;
                var.put_attribute("scale_factor_at_central_meridian", 0.9996012717)?;
                var.put_attribute("false_easting", 400000.0)?;
                var.put_attribute("false_northing", -100000.0)?;
                Some("transverse_mercator")
            }
        };

        let steps = self.time.as_ref().map_or(1, |t| t.values.len());
        let mut data = Vec::with_capacity(steps * self.width * self.height);
        for step in 0..steps {
            let mut slice = create_temperature_grid(self.width, self.height, step);
            if self.missing_corner {
                slice[0] = FILL_VALUE;
            }
            data.extend(slice);
        }

        let mut dims: Vec<&str> = vec!["ensemble_member"];
        if self.time.is_some() {
            dims.push("time");
        }
        dims.push(&self.y_name);
        dims.push(&self.x_name);

        let mut var = match self.storage {
            Storage::Float32 => {
                let mut var = file.add_variable::<f32>(&self.variable, &dims)?;
                var.put_attribute("_FillValue", FILL_VALUE)?;
                var
            }
            Storage::Float64 => {
                let mut var = file.add_variable::<f64>(&self.variable, &dims)?;
                var.put_attribute("_FillValue", FILL_VALUE as f64)?;
                var
            }
            Storage::PackedInt16 => {
                let mut var = file.add_variable::<i16>(&self.variable, &dims)?;
                var.put_attribute("_FillValue", PACKED_FILL_VALUE)?;
                var.put_attribute("scale_factor", 0.01_f32)?;
                var.put_attribute("add_offset", 270.0_f32)?;
                var
            }
        };
        var.put_attribute("long_name", self.long_name.as_str())?;
        var.put_attribute("units", self.units.as_str())?;
        if let Some(mapping) = mapping_name {
            var.put_attribute("grid_mapping", mapping)?;
        }

        match self.storage {
            Storage::Float32 => var.put_values(&data, ..)?,
            Storage::Float64 => {
                let wide: Vec<f64> = data
                    .iter()
                    .map(|v| {
                        if *v == FILL_VALUE {
                            FILL_VALUE as f64
                        } else {
                            *v as f64 + FLOAT64_FRACTION
                        }
                    })
                    .collect();
                var.put_values(&wide, ..)?
            }
            Storage::PackedInt16 => {
                let packed: Vec<i16> = data
                    .iter()
                    .map(|v| {
                        if *v == FILL_VALUE {
                            PACKED_FILL_VALUE
                        } else {
                            ((*v - 270.0) * 100.0).round() as i16
                        }
                    })
                    .collect();
                var.put_values(&packed, ..)?
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filename_follows_ukcp18_pattern() {
        assert_eq!(
            GranuleSpec::uk_monthly().filename(),
            "tas_rcp85_land-gcm_global_60km_01_mon_19991201-19991230.nc"
        );
    }

    #[test]
    fn test_uk_grid_edges() {
        let spec = GranuleSpec::uk_monthly();
        let xs = spec.x_values();
        assert_eq!(xs.first(), Some(&-9.5));
        assert_eq!(xs.last(), Some(&1.5));
        let ys = spec.with_descending_y().y_values();
        assert_eq!(ys.first(), Some(&60.5));
    }

    #[test]
    fn test_extra_leading_row() {
        let spec = GranuleSpec::uk_monthly().with_extra_leading_row();
        assert_eq!(spec.height, 13);
        assert_eq!(spec.y_values()[1], 49.5);
    }

    #[test]
    fn test_global_grid_spans_full_circle() {
        let spec = GranuleSpec::global_0_360();
        assert_eq!(spec.x_values().first(), Some(&15.0));
        assert_eq!(spec.x_values().last(), Some(&345.0));
        assert_eq!(spec.y_values().first(), Some(&-75.0));
    }

    #[test]
    fn test_write_creates_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = GranuleSpec::uk_monthly().write_to_dir(dir.path()).unwrap();
        assert!(path.exists());
    }
}
