//! Element data types and their persisted tags

use crate::error::{N5Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Element types supported by N5 datasets
///
/// The serialized form is the lower-case tag stored under `dataType`
/// in `attributes.json`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataType {
    /// Unsigned 8-bit integer
    #[serde(rename = "uint8")]
    U8,
    /// Unsigned 16-bit integer
    #[serde(rename = "uint16")]
    U16,
    /// Unsigned 32-bit integer
    #[serde(rename = "uint32")]
    U32,
    /// Unsigned 64-bit integer
    #[serde(rename = "uint64")]
    U64,
    /// Signed 8-bit integer
    #[serde(rename = "int8")]
    I8,
    /// Signed 16-bit integer
    #[serde(rename = "int16")]
    I16,
    /// Signed 32-bit integer
    #[serde(rename = "int32")]
    I32,
    /// Signed 64-bit integer
    #[serde(rename = "int64")]
    I64,
    /// 32-bit floating point
    #[serde(rename = "float32")]
    F32,
    /// 64-bit floating point
    #[serde(rename = "float64")]
    F64,
}

impl DataType {
    /// Every registered type, in tag order
    pub const ALL: [DataType; 10] = [
        DataType::U8,
        DataType::U16,
        DataType::U32,
        DataType::U64,
        DataType::I8,
        DataType::I16,
        DataType::I32,
        DataType::I64,
        DataType::F32,
        DataType::F64,
    ];

    /// Size in bytes of this data type
    pub fn size_in_bytes(&self) -> usize {
        match self {
            DataType::U8 | DataType::I8 => 1,
            DataType::U16 | DataType::I16 => 2,
            DataType::U32 | DataType::I32 | DataType::F32 => 4,
            DataType::U64 | DataType::I64 | DataType::F64 => 8,
        }
    }

    /// Check if this is a floating point type
    pub fn is_float(&self) -> bool {
        matches!(self, DataType::F32 | DataType::F64)
    }

    /// Check if this is an integer type
    pub fn is_integer(&self) -> bool {
        !self.is_float()
    }

    /// The persisted tag
    pub fn tag(&self) -> &'static str {
        match self {
            DataType::U8 => "uint8",
            DataType::U16 => "uint16",
            DataType::U32 => "uint32",
            DataType::U64 => "uint64",
            DataType::I8 => "int8",
            DataType::I16 => "int16",
            DataType::I32 => "int32",
            DataType::I64 => "int64",
            DataType::F32 => "float32",
            DataType::F64 => "float64",
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

impl FromStr for DataType {
    type Err = N5Error;

    fn from_str(s: &str) -> Result<Self> {
        DataType::ALL
            .iter()
            .copied()
            .find(|t| t.tag() == s)
            .ok_or_else(|| N5Error::UnsupportedFormat(format!("unknown data type: {}", s)))
    }
}
