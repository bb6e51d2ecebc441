//! COG creation options.

use serde::{Deserialize, Serialize};
use ukcp18_common::DataType;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum Compression {
    #[default]
    Deflate,
    Lzw,
    Zstd,
    None,
}

impl Compression {
    pub fn as_gdal(&self) -> &'static str {
        match self {
            Compression::Deflate => "DEFLATE",
            Compression::Lzw => "LZW",
            Compression::Zstd => "ZSTD",
            Compression::None => "NONE",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum BigTiff {
    Yes,
    No,
    #[default]
    IfNeeded,
    IfSafer,
}

impl BigTiff {
    pub fn as_gdal(&self) -> &'static str {
        match self {
            BigTiff::Yes => "YES",
            BigTiff::No => "NO",
            BigTiff::IfNeeded => "IF_NEEDED",
            BigTiff::IfSafer => "IF_SAFER",
        }
    }
}

/// Options passed to GDAL's COG driver.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CogOptions {
    pub compression: Compression,
    /// Compression level; driver default when unset
    pub level: Option<u8>,
    /// Internal tile size in pixels
    pub block_size: u32,
    /// Predictor for DEFLATE/LZW/ZSTD, matched to the band type
    pub predictor: bool,
    /// Resampling used to build overviews
    pub overview_resampling: String,
    pub bigtiff: BigTiff,
}

impl Default for CogOptions {
    fn default() -> Self {
        Self {
            compression: Compression::Deflate,
            level: None,
            block_size: 512,
            predictor: true,
            overview_resampling: "NEAREST".to_string(),
            bigtiff: BigTiff::IfNeeded,
        }
    }
}

impl CogOptions {
    /// Creation options as GDAL `KEY=VALUE` pairs for a band of `data_type`.
    pub fn to_pairs(&self, data_type: DataType) -> Vec<(&'static str, String)> {
        let mut pairs = vec![
            ("COMPRESS", self.compression.as_gdal().to_string()),
            ("BLOCKSIZE", self.block_size.to_string()),
            ("OVERVIEW_RESAMPLING", self.overview_resampling.to_uppercase()),
            ("BIGTIFF", self.bigtiff.as_gdal().to_string()),
        ];
        if self.compression != Compression::None {
            if let Some(level) = self.level {
                pairs.push(("LEVEL", level.to_string()));
            }
            if self.predictor {
                let predictor = if data_type.is_float() {
                    "FLOATING_POINT"
                } else {
                    "STANDARD"
                };
                pairs.push(("PREDICTOR", predictor.to_string()));
            }
        }
        pairs
    }
}
