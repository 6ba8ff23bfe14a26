//! Data blocks - the materialized content of one stored block

use crate::error::{N5Error, Result};
use crate::grid::GridPosition;
use crate::types::DataType;
use ndarray::{ArrayViewD, IxDyn, ShapeBuilder};

/// Typed element payload of a block
#[derive(Debug, Clone, PartialEq)]
pub enum BlockData {
    U8(Vec<u8>),
    U16(Vec<u16>),
    U32(Vec<u32>),
    U64(Vec<u64>),
    I8(Vec<i8>),
    I16(Vec<i16>),
    I32(Vec<i32>),
    I64(Vec<i64>),
    F32(Vec<f32>),
    F64(Vec<f64>),
}

macro_rules! for_each_variant {
    ($data:expr, $v:ident => $body:expr) => {
        match $data {
            BlockData::U8($v) => $body,
            BlockData::U16($v) => $body,
            BlockData::U32($v) => $body,
            BlockData::U64($v) => $body,
            BlockData::I8($v) => $body,
            BlockData::I16($v) => $body,
            BlockData::I32($v) => $body,
            BlockData::I64($v) => $body,
            BlockData::F32($v) => $body,
            BlockData::F64($v) => $body,
        }
    };
}

fn decode_be<T, const N: usize>(bytes: &[u8], from: fn([u8; N]) -> T) -> Vec<T> {
    bytes
        .chunks_exact(N)
        .map(|chunk| {
            let mut buf = [0u8; N];
            buf.copy_from_slice(chunk);
            from(buf)
        })
        .collect()
}

impl BlockData {
    /// Decode big-endian element bytes
    pub fn from_be_bytes(data_type: DataType, bytes: &[u8]) -> Result<Self> {
        if bytes.len() % data_type.size_in_bytes() != 0 {
            return Err(N5Error::UnsupportedFormat(format!(
                "{} bytes is not a whole number of {} elements",
                bytes.len(),
                data_type
            )));
        }

        Ok(match data_type {
            DataType::U8 => BlockData::U8(bytes.to_vec()),
            DataType::I8 => BlockData::I8(decode_be(bytes, i8::from_be_bytes)),
            DataType::U16 => BlockData::U16(decode_be(bytes, u16::from_be_bytes)),
            DataType::I16 => BlockData::I16(decode_be(bytes, i16::from_be_bytes)),
            DataType::U32 => BlockData::U32(decode_be(bytes, u32::from_be_bytes)),
            DataType::I32 => BlockData::I32(decode_be(bytes, i32::from_be_bytes)),
            DataType::U64 => BlockData::U64(decode_be(bytes, u64::from_be_bytes)),
            DataType::I64 => BlockData::I64(decode_be(bytes, i64::from_be_bytes)),
            DataType::F32 => BlockData::F32(decode_be(bytes, f32::from_be_bytes)),
            DataType::F64 => BlockData::F64(decode_be(bytes, f64::from_be_bytes)),
        })
    }

    /// Encode elements as big-endian bytes
    pub fn to_be_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(self.len() * self.data_type().size_in_bytes());
        for_each_variant!(self, values => {
            for value in values {
                bytes.extend_from_slice(&value.to_be_bytes());
            }
        });
        bytes
    }

    pub fn data_type(&self) -> DataType {
        match self {
            BlockData::U8(_) => DataType::U8,
            BlockData::U16(_) => DataType::U16,
            BlockData::U32(_) => DataType::U32,
            BlockData::U64(_) => DataType::U64,
            BlockData::I8(_) => DataType::I8,
            BlockData::I16(_) => DataType::I16,
            BlockData::I32(_) => DataType::I32,
            BlockData::I64(_) => DataType::I64,
            BlockData::F32(_) => DataType::F32,
            BlockData::F64(_) => DataType::F64,
        }
    }

    pub fn len(&self) -> usize {
        for_each_variant!(self, values => values.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Element types a block payload can be viewed as
pub trait Element: Copy + Sized {
    const DATA_TYPE: DataType;

    fn slice(data: &BlockData) -> Option<&[Self]>;

    fn into_block_data(values: Vec<Self>) -> BlockData;
}

macro_rules! impl_element {
    ($t:ty, $variant:ident) => {
        impl Element for $t {
            const DATA_TYPE: DataType = DataType::$variant;

            fn slice(data: &BlockData) -> Option<&[Self]> {
                match data {
                    BlockData::$variant(values) => Some(values),
                    _ => None,
                }
            }

            fn into_block_data(values: Vec<Self>) -> BlockData {
                BlockData::$variant(values)
            }
        }
    };
}

impl_element!(u8, U8);
impl_element!(u16, U16);
impl_element!(u32, U32);
impl_element!(u64, U64);
impl_element!(i8, I8);
impl_element!(i16, I16);
impl_element!(i32, I32);
impl_element!(i64, I64);
impl_element!(f32, F32);
impl_element!(f64, F64);

/// One block of a dataset
///
/// `size` is the actual extent of this block, which is smaller than the
/// dataset's nominal block size on the upper array boundary. The element
/// count normally equals the product of `size` but is allowed to differ
/// (varlength blocks).
#[derive(Debug, Clone, PartialEq)]
pub struct DataBlock {
    size: Vec<u32>,
    grid_position: GridPosition,
    data: BlockData,
}

impl DataBlock {
    pub fn new(size: Vec<u32>, grid_position: GridPosition, data: BlockData) -> Self {
        Self {
            size,
            grid_position,
            data,
        }
    }

    /// Build a block from a typed element vector
    pub fn from_vec<T: Element>(size: Vec<u32>, grid_position: GridPosition, values: Vec<T>) -> Self {
        Self::new(size, grid_position, T::into_block_data(values))
    }

    /// Element count implied by an extent vector; `None` if it overflows
    pub fn num_elements_for(size: &[u32]) -> Option<usize> {
        size.iter()
            .try_fold(1usize, |count, &extent| count.checked_mul(extent as usize))
    }

    pub fn size(&self) -> &[u32] {
        &self.size
    }

    pub fn grid_position(&self) -> &[u64] {
        &self.grid_position
    }

    pub fn num_elements(&self) -> usize {
        self.data.len()
    }

    pub fn data_type(&self) -> DataType {
        self.data.data_type()
    }

    pub fn data(&self) -> &BlockData {
        &self.data
    }

    pub fn into_data(self) -> BlockData {
        self.data
    }

    /// Typed view of the elements, or `None` on a type mismatch
    pub fn as_slice<T: Element>(&self) -> Option<&[T]> {
        T::slice(&self.data)
    }

    /// Whether the element count is implied by the extents
    pub fn is_dense(&self) -> bool {
        Self::num_elements_for(&self.size) == Some(self.num_elements())
    }

    /// N-dimensional view of the block
    ///
    /// Elements are laid out with the first dimension varying fastest, so
    /// `view[[x, y]]` addresses the element at `x` along dimension 0.
    /// Returns `None` for a type mismatch or a varlength block.
    pub fn as_array<T: Element>(&self) -> Option<ArrayViewD<'_, T>> {
        if !self.is_dense() {
            return None;
        }
        let shape: Vec<usize> = self.size.iter().map(|&s| s as usize).collect();
        ArrayViewD::from_shape(IxDyn(&shape).f(), self.as_slice::<T>()?).ok()
    }
}
