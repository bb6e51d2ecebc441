//! Coordinate Reference System descriptors.

use serde::{Deserialize, Serialize};
use std::fmt;

/// EPSG code of WGS84 geographic coordinates, the CRS of STAC geometries.
pub const WGS84_EPSG: u32 = 4326;

/// WKT keywords that can open a CRS definition (WKT1 and WKT2).
const WKT_KEYWORDS: [&str; 9] = [
    "GEOGCS",
    "PROJCS",
    "GEOCCS",
    "COMPD_CS",
    "GEOGCRS",
    "GEODCRS",
    "PROJCRS",
    "COMPOUNDCRS",
    "BOUNDCRS",
];

/// How a dataset's coordinate reference system is identified.
///
/// Serialized as a plain string (`"EPSG:4326"` or a WKT definition) so it can
/// appear directly in YAML configuration and on the command line.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum CrsDescriptor {
    /// An EPSG registry code.
    Epsg(u32),
    /// A full WKT (1 or 2) definition.
    Wkt(String),
}

impl CrsDescriptor {
    /// WGS84 geographic coordinates.
    pub fn wgs84() -> Self {
        CrsDescriptor::Epsg(WGS84_EPSG)
    }

    /// Parse a CRS string.
    ///
    /// Accepts formats like:
    /// - "EPSG:27700" / "epsg:27700"
    /// - "27700"
    /// - "urn:ogc:def:crs:EPSG::4326"
    /// - "CRS:84" (equivalent to EPSG:4326 with lon/lat axis order)
    /// - a WKT definition
    pub fn parse(s: &str) -> Result<Self, CrsParseError> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(CrsParseError::Empty);
        }

        let upper = trimmed.to_uppercase();
        if WKT_KEYWORDS.iter().any(|k| upper.starts_with(k)) {
            return Ok(CrsDescriptor::Wkt(trimmed.to_string()));
        }

        if upper == "CRS:84" || upper == "OGC:CRS84" {
            return Ok(CrsDescriptor::wgs84());
        }

        let code = upper
            .strip_prefix("URN:OGC:DEF:CRS:EPSG::")
            .or_else(|| upper.strip_prefix("EPSG:"))
            .unwrap_or(&upper);

        code.parse::<u32>()
            .map(CrsDescriptor::Epsg)
            .map_err(|_| CrsParseError::Unrecognized(trimmed.to_string()))
    }

    /// The EPSG code, if this CRS is identified by one.
    pub fn epsg(&self) -> Option<u32> {
        match self {
            CrsDescriptor::Epsg(code) => Some(*code),
            CrsDescriptor::Wkt(_) => None,
        }
    }

    /// Check if this is WGS84 lon/lat, for which no reprojection is needed.
    pub fn is_wgs84(&self) -> bool {
        self.epsg() == Some(WGS84_EPSG)
    }
}

impl fmt::Display for CrsDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CrsDescriptor::Epsg(code) => write!(f, "EPSG:{}", code),
            CrsDescriptor::Wkt(wkt) => write!(f, "{}", wkt),
        }
    }
}

impl TryFrom<String> for CrsDescriptor {
    type Error = CrsParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        CrsDescriptor::parse(&value)
    }
}

impl From<CrsDescriptor> for String {
    fn from(value: CrsDescriptor) -> Self {
        value.to_string()
    }
}

impl std::str::FromStr for CrsDescriptor {
    type Err = CrsParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CrsDescriptor::parse(s)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CrsParseError {
    #[error("empty CRS definition")]
    Empty,

    #[error("Unrecognized CRS: {0}. Expected 'EPSG:<code>' or a WKT definition")]
    Unrecognized(String),
}
