//! Fixed UKCP18 catalogue metadata and granule filename parsing.

use chrono::{DateTime, NaiveDate, Utc};
use regex::Regex;
use std::sync::OnceLock;

use stac::{Link, Provider};

/// Extension schema URIs.
pub mod extensions {
    pub const PROJECTION: &str = "https://stac-extensions.github.io/projection/v1.1.0/schema.json";
    pub const RASTER: &str = "https://stac-extensions.github.io/raster/v1.1.0/schema.json";
    pub const DATACUBE: &str = "https://stac-extensions.github.io/datacube/v2.2.0/schema.json";
    pub const ITEM_ASSETS: &str = "https://stac-extensions.github.io/item-assets/v1.0.0/schema.json";
    pub const SCIENTIFIC: &str = "https://stac-extensions.github.io/scientific/v1.0.0/schema.json";
}

/// Field prefix and the extension that defines it.
pub(crate) const EXTENSION_PREFIXES: &[(&str, &str)] = &[
    ("proj:", extensions::PROJECTION),
    ("raster:", extensions::RASTER),
    ("cube:", extensions::DATACUBE),
    ("sci:", extensions::SCIENTIFIC),
];

/// Add `schema` to a record's `stac_extensions` once.
pub(crate) fn declare_extension(declared: &mut Vec<String>, schema: &str) {
    if !declared.iter().any(|s| s == schema) {
        declared.push(schema.to_string());
    }
}

pub const COLLECTION_ID: &str = "ukcp-18";
pub const COLLECTION_TITLE: &str = "UKCP18 Global Climate Model Projections for the entire globe";
pub const COLLECTION_DESCRIPTION: &str = "Global climate model runs from 1900-2100 produced by \
    the Met Office for UK Climate Projections 2018 (UKCP18) using the HadGEM3 climate model, \
    provided on a 60km grid for the entire globe.";
pub const LICENSE: &str = "OGL-UK-3.0";
pub const KEYWORDS: &[&str] = &["UKCP18", "UK Met Office", "Climate"];

pub const CITATION: &str = "Met Office Hadley Centre (2018): UKCP18 Global Climate Model \
    Projections for the entire globe. Centre for Environmental Data Analysis, date of citation. \
    http://catalogue.ceda.ac.uk/uuid/f1a2fc3c120f400396a92f5de84d596a";

/// Variables published in the global 60km product.
pub const VARIABLES: &[&str] = &[
    "clt", "hurs", "huss", "pr", "psl", "rls", "rss", "sfcWind", "tas", "tasmax", "tasmin", "uas",
    "vas",
];

pub const TEMPORAL_RESOLUTIONS: &[&str] = &["day", "mon"];

pub const NETCDF_MEDIA_TYPE: &str = "application/netcdf";

fn provider(name: &str, role: &str, url: &str) -> Provider {
    let mut provider = Provider::new(name);
    provider.roles = Some(vec![role.to_string()]);
    provider.url = Some(url.to_string());
    provider
}

pub fn providers() -> Vec<Provider> {
    vec![
        provider(
            "Met Office Hadley Centre",
            "producer",
            "https://www.metoffice.gov.uk/weather/climate/met-office-hadley-centre/index",
        ),
        provider("The CEDA Archive", "host", "https://archive.ceda.ac.uk/"),
    ]
}

fn link(href: impl ToString, rel: &str, media_type: &str, title: &str) -> Link {
    let mut link = Link::new(href.to_string(), rel);
    link.r#type = Some(media_type.to_string());
    link.title = Some(title.to_string());
    link
}

/// License and documentation links.
pub fn links() -> Vec<Link> {
    const PDF_BASE: &str =
        "https://www.metoffice.gov.uk/binaries/content/assets/metofficegovuk/pdf/research/ukcp";
    vec![
        link(
            "https://www.nationalarchives.gov.uk/doc/open-government-licence/version/3/",
            "license",
            "text/html",
            "Open Government License",
        ),
        link(
            format!("{}/ukcp18-guidance-data-availability-access-and-formats.pdf", PDF_BASE),
            "documentation",
            "application/pdf",
            "UKCP18 Guidance: Data availability, access and formats",
        ),
        link(
            format!("{}/ukcp18-guidance---caveats-and-limitations.pdf", PDF_BASE),
            "documentation",
            "application/pdf",
            "UKCP18 Guidance: Caveats and limitations",
        ),
        link(
            "https://www.metoffice.gov.uk/research/approach/collaboration/ukcp/guidance-science-reports",
            "documentation",
            "text/html",
            "UKCP18 Science Reports",
        ),
        link(
            "https://catalogue.ceda.ac.uk/uuid/97bc0c622a24489aa105f5b8a8efa3f0",
            "documentation",
            "text/html",
            "CEDA Archive dataset",
        ),
    ]
}

fn filename_regex() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"^(?P<variable>\w+?)_(?P<scenario>\w+?)_land-gcm_global_60km_(?P<member>\d+)_(?P<res>[^_]+)_(?P<start>\d{8})-(?P<end>\d{8})\.nc$",
        )
        .ok()
    })
    .as_ref()
}

/// Fields encoded in a UKCP18 global granule filename, e.g.
/// `tas_rcp85_land-gcm_global_60km_01_mon_18991201-19091130.nc`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GranuleParts {
    pub variable: String,
    pub scenario: String,
    pub member_id: u32,
    pub temporal_resolution: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub filename: String,
}

impl GranuleParts {
    /// Parse a filename or path; directories and URL prefixes are ignored.
    pub fn from_filename(path: &str) -> Option<Self> {
        let filename = path.rsplit(['/', '\\']).next().unwrap_or(path);
        let caps = filename_regex()?.captures(filename)?;

        let date = |name: &str| -> Option<DateTime<Utc>> {
            NaiveDate::parse_from_str(&caps[name], "%Y%m%d")
                .ok()?
                .and_hms_opt(0, 0, 0)
                .map(|dt| dt.and_utc())
        };

        Some(Self {
            variable: caps["variable"].to_string(),
            scenario: caps["scenario"].to_string(),
            member_id: caps["member"].parse().ok()?,
            temporal_resolution: caps["res"].to_string(),
            start: date("start")?,
            end: date("end")?,
            filename: filename.to_string(),
        })
    }

    /// Identifier of the whole granule:
    /// `ukcp18-<res>-<scenario>-<member>-<start>Z-<end>Z`.
    pub fn item_id(&self) -> String {
        format!(
            "ukcp18-{}-{}-{}-{}Z-{}Z",
            self.temporal_resolution,
            self.scenario,
            self.member_id,
            self.start.format("%Y-%m-%dT%H:%M:%S"),
            self.end.format("%Y-%m-%dT%H:%M:%S"),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_granule_filename() {
        let parts = GranuleParts::from_filename(
            "az://ukcp18/badc/ukcp18/data/land-gcm/global/60km/rcp26/01/tas/mon/v20200302/tas_rcp26_land-gcm_global_60km_01_mon_18991201-19091130.nc",
        )
        .unwrap();

        assert_eq!(parts.variable, "tas");
        assert_eq!(parts.scenario, "rcp26");
        assert_eq!(parts.member_id, 1);
        assert_eq!(parts.temporal_resolution, "mon");
        assert_eq!(parts.start.to_rfc3339(), "1899-12-01T00:00:00+00:00");
        assert!(VARIABLES.contains(&parts.variable.as_str()));
        assert_eq!(
            parts.item_id(),
            "ukcp18-mon-rcp26-1-1899-12-01T00:00:00Z-1909-11-30T00:00:00Z"
        );
    }

    #[test]
    fn test_variable_with_capitals() {
        let parts = GranuleParts::from_filename(
            "sfcWind_rcp85_land-gcm_global_60km_15_day_19991201-20091130.nc",
        )
        .unwrap();
        assert_eq!(parts.variable, "sfcWind");
        assert_eq!(parts.member_id, 15);
    }

    #[test]
    fn test_non_matching_filename() {
        assert!(GranuleParts::from_filename("tas_regional.nc").is_none());
        assert!(GranuleParts::from_filename(
            "tas_rcp85_land-gcm_global_60km_01_mon_19991301-20000101.nc"
        )
        .is_none());
    }

    #[test]
    fn test_links_and_providers() {
        let links = links();
        assert_eq!(links.iter().filter(|l| l.rel == "license").count(), 1);
        assert_eq!(links.iter().filter(|l| l.rel == "documentation").count(), 4);
        assert_eq!(providers()[0].roles, Some(vec!["producer".to_string()]));
        assert_eq!(links[0].r#type.as_deref(), Some("text/html"));
    }
}
