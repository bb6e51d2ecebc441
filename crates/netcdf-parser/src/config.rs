//! Loader configuration.

use serde::{Deserialize, Serialize};
use ukcp18_common::CrsDescriptor;

/// Controls how coordinate axes and the CRS are discovered in NetCDF files.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoaderConfig {
    /// Candidate names of the x (longitude / easting) coordinate, in priority order.
    pub x_names: Vec<String>,
    /// Candidate names of the y (latitude / northing) coordinate, in priority order.
    pub y_names: Vec<String>,
    /// Candidate names of the time coordinate, in priority order.
    pub time_names: Vec<String>,
    /// Variables ignored entirely (e.g. scalar `height` coordinates that differ between files).
    pub drop_variables: Vec<String>,
    /// Use this CRS instead of whatever the files declare.
    pub crs_override: Option<CrsDescriptor>,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            x_names: to_strings(&[
                "longitude",
                "lon",
                "x",
                "projection_x_coordinate",
                "grid_longitude",
            ]),
            y_names: to_strings(&[
                "latitude",
                "lat",
                "y",
                "projection_y_coordinate",
                "grid_latitude",
            ]),
            time_names: to_strings(&["time"]),
            drop_variables: to_strings(&["height"]),
            crs_override: None,
        }
    }
}

impl LoaderConfig {
    pub fn with_crs_override(mut self, crs: CrsDescriptor) -> Self {
        self.crs_override = Some(crs);
        self
    }
}

fn to_strings(names: &[&str]) -> Vec<String> {
    names.iter().map(|s| s.to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let config: LoaderConfig = serde_yaml::from_str("crs_override: EPSG:27700\n").unwrap();
        assert_eq!(config.crs_override, Some(CrsDescriptor::Epsg(27700)));
        assert_eq!(config.x_names[0], "longitude");
        assert_eq!(config.drop_variables, vec!["height".to_string()]);
    }
}
