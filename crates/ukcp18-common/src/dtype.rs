//! Sample types of gridded variables.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Storage type of a raster band.
///
/// Names follow the STAC raster extension (`int16`, `float32`, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    UInt8,
    Int16,
    UInt16,
    Int32,
    UInt32,
    #[default]
    Float32,
    Float64,
}

impl DataType {
    pub fn name(&self) -> &'static str {
        match self {
            DataType::UInt8 => "uint8",
            DataType::Int16 => "int16",
            DataType::UInt16 => "uint16",
            DataType::Int32 => "int32",
            DataType::UInt32 => "uint32",
            DataType::Float32 => "float32",
            DataType::Float64 => "float64",
        }
    }

    pub fn is_float(&self) -> bool {
        matches!(self, DataType::Float32 | DataType::Float64)
    }

    /// Float type that holds unpacked (`scale_factor`/`add_offset`) values of
    /// this type without losing integer precision.
    pub fn unpacked(&self) -> DataType {
        match self {
            DataType::Int32 | DataType::UInt32 | DataType::Float64 => DataType::Float64,
            _ => DataType::Float32,
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
