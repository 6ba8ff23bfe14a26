//! Dataset attributes - the descriptor that governs how blocks are interpreted

use crate::compression::CompressionType;
use crate::grid;
use crate::types::DataType;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::warn;

/// Structured metadata of a group or dataset, as stored in `attributes.json`
pub type AttributeMap = serde_json::Map<String, Value>;

/// Key of the array dimensions
pub const DIMENSIONS_KEY: &str = "dimensions";
/// Key of the nominal block size
pub const BLOCK_SIZE_KEY: &str = "blockSize";
/// Key of the element data type
pub const DATA_TYPE_KEY: &str = "dataType";
/// Key of the block compression
pub const COMPRESSION_TYPE_KEY: &str = "compressionType";

/// Mandatory attributes of a dataset
///
/// Immutable once built. The block size is not checked against the
/// dimensions, so a descriptor can exist before its dataset does and block
/// sizes larger than the array are allowed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetAttributes {
    dimensions: Vec<u64>,
    block_size: Vec<u32>,
    data_type: DataType,
    compression: CompressionType,
}

impl DatasetAttributes {
    pub fn new(
        dimensions: Vec<u64>,
        block_size: Vec<u32>,
        data_type: DataType,
        compression: CompressionType,
    ) -> Self {
        debug_assert_eq!(dimensions.len(), block_size.len());
        Self {
            dimensions,
            block_size,
            data_type,
            compression,
        }
    }

    pub fn dimensions(&self) -> &[u64] {
        &self.dimensions
    }

    pub fn num_dimensions(&self) -> usize {
        self.dimensions.len()
    }

    pub fn block_size(&self) -> &[u32] {
        &self.block_size
    }

    pub fn data_type(&self) -> DataType {
        self.data_type
    }

    pub fn compression(&self) -> CompressionType {
        self.compression
    }

    /// Number of elements in a full (non-boundary) block
    pub fn num_elements_per_block(&self) -> usize {
        self.block_size.iter().map(|&b| b as usize).product()
    }

    /// Number of blocks along each dimension
    pub fn grid_size(&self) -> Vec<u64> {
        grid::grid_size(&self.dimensions, &self.block_size)
    }

    /// Actual extents of the block at `grid_position`, truncated at the boundary
    pub fn block_extent(&self, grid_position: &[u64]) -> Option<Vec<u32>> {
        grid::block_extent(&self.dimensions, &self.block_size, grid_position)
    }

    /// Projection to the four reserved keys
    pub fn as_map(&self) -> AttributeMap {
        let mut map = AttributeMap::new();
        map.insert(DIMENSIONS_KEY.to_string(), Value::from(self.dimensions.clone()));
        map.insert(BLOCK_SIZE_KEY.to_string(), Value::from(self.block_size.clone()));
        map.insert(
            DATA_TYPE_KEY.to_string(),
            Value::String(self.data_type.to_string()),
        );
        map.insert(
            COMPRESSION_TYPE_KEY.to_string(),
            Value::String(self.compression.to_string()),
        );
        map
    }

    /// Rebuild the descriptor from a group's attributes
    ///
    /// `dimensions` and `dataType` must be present and decodable. A missing
    /// or bad `blockSize` falls back to one block covering the whole array.
    /// A missing `compressionType` means "not a dataset", while a present but
    /// undecodable one falls back to [`CompressionType::Raw`].
    pub fn from_map(map: &AttributeMap) -> Option<Self> {
        let dimensions: Vec<u64> = decode(map.get(DIMENSIONS_KEY)?)?;
        let data_type: DataType = decode(map.get(DATA_TYPE_KEY)?)?;

        let block_size = map
            .get(BLOCK_SIZE_KEY)
            .and_then(decode::<Vec<u32>>)
            .filter(|b| b.len() == dimensions.len() && b.iter().all(|&s| s > 0 && s <= i32::MAX as u32))
            .unwrap_or_else(|| {
                dimensions
                    .iter()
                    .map(|&d| d.min(i32::MAX as u64) as u32)
                    .collect()
            });

        let compression_value = map.get(COMPRESSION_TYPE_KEY)?;
        let compression = decode(compression_value).unwrap_or_else(|| {
            warn!(
                value = %compression_value,
                "undecodable compressionType, falling back to raw"
            );
            CompressionType::Raw
        });

        Some(Self::new(dimensions, block_size, data_type, compression))
    }
}

fn decode<T: DeserializeOwned>(value: &Value) -> Option<T> {
    serde_json::from_value(value.clone()).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn map(value: Value) -> AttributeMap {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected a JSON object"),
        }
    }

    fn create_test_attributes() -> DatasetAttributes {
        DatasetAttributes::new(
            vec![10, 10],
            vec![4, 4],
            DataType::I32,
            CompressionType::Gzip,
        )
    }

    #[test]
    fn test_accessors() {
        let attrs = create_test_attributes();
        assert_eq!(attrs.num_dimensions(), 2);
        assert_eq!(attrs.dimensions(), &[10, 10]);
        assert_eq!(attrs.block_size(), &[4, 4]);
        assert_eq!(attrs.num_elements_per_block(), 16);
        assert_eq!(attrs.grid_size(), vec![3, 3]);
        assert_eq!(attrs.block_extent(&[2, 2]), Some(vec![2, 2]));
    }

    #[test]
    fn test_as_map() {
        let attrs = create_test_attributes();
        let projected = attrs.as_map();
        assert_eq!(projected.len(), 4);
        assert_eq!(projected[DIMENSIONS_KEY], json!([10, 10]));
        assert_eq!(projected[BLOCK_SIZE_KEY], json!([4, 4]));
        assert_eq!(projected[DATA_TYPE_KEY], json!("int32"));
        assert_eq!(projected[COMPRESSION_TYPE_KEY], json!("gzip"));
        assert_eq!(DatasetAttributes::from_map(&projected), Some(attrs));
    }

    #[test]
    fn test_missing_dimensions_is_absent() {
        let attrs = map(json!({
            "blockSize": [4, 4],
            "dataType": "int32",
            "compressionType": "raw"
        }));
        assert_eq!(DatasetAttributes::from_map(&attrs), None);
    }

    #[test]
    fn test_bad_data_type_is_absent() {
        let attrs = map(json!({
            "dimensions": [10, 10],
            "blockSize": [4, 4],
            "dataType": "complex128",
            "compressionType": "raw"
        }));
        assert_eq!(DatasetAttributes::from_map(&attrs), None);
    }

    #[test]
    fn test_missing_block_size_defaults_to_dimensions() {
        let attrs = map(json!({
            "dimensions": [100, 20, 3],
            "dataType": "uint8",
            "compressionType": "raw"
        }));
        let parsed = DatasetAttributes::from_map(&attrs).unwrap();
        assert_eq!(parsed.block_size(), &[100, 20, 3]);
    }

    #[test]
    fn test_bad_block_size_defaults_to_dimensions() {
        let attrs = map(json!({
            "dimensions": [100, 20],
            "blockSize": "big",
            "dataType": "uint8",
            "compressionType": "raw"
        }));
        let parsed = DatasetAttributes::from_map(&attrs).unwrap();
        assert_eq!(parsed.block_size(), &[100, 20]);
    }

    #[test]
    fn test_compression_asymmetry() {
        let missing = map(json!({
            "dimensions": [10],
            "blockSize": [4],
            "dataType": "float64"
        }));
        assert_eq!(DatasetAttributes::from_map(&missing), None);

        let undecodable = map(json!({
            "dimensions": [10],
            "blockSize": [4],
            "dataType": "float64",
            "compressionType": {"type": "mystery"}
        }));
        let parsed = DatasetAttributes::from_map(&undecodable).unwrap();
        assert_eq!(parsed.compression(), CompressionType::Raw);
        assert_eq!(parsed.data_type(), DataType::F64);
    }
}
