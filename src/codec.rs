//! Block codec - the binary layout of a single block file
//!
//! ```text
//! offset  size              field
//! 0       i16               mode (0 = default, 1 = varlength)
//! 2       i16               number of dimensions n
//! 4       i32 x n           actual block size
//! 4+4n    i32 (mode 1)      number of elements
//! ...     rest of file      compressed payload
//! ```
//!
//! All header fields and payload elements are big-endian. The grid position
//! is not stored; it is implied by the file's path.

use crate::attributes::DatasetAttributes;
use crate::block::{BlockData, DataBlock};
use crate::compression::get_compressor;
use crate::error::{N5Error, Result};
use std::io::{self, Read, Write};

/// Element count is the product of the block size
pub const MODE_DEFAULT: i16 = 0;
/// Element count is stored explicitly after the block size
pub const MODE_VARLENGTH: i16 = 1;

/// Decoded block header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockHeader {
    pub mode: i16,
    pub size: Vec<u32>,
    pub num_elements: usize,
}

impl BlockHeader {
    /// Header for a block about to be written
    ///
    /// Varlength mode is chosen only when the element count cannot be
    /// derived from the extents.
    pub fn for_block(block: &DataBlock) -> Self {
        let mode = if block.is_dense() {
            MODE_DEFAULT
        } else {
            MODE_VARLENGTH
        };
        Self {
            mode,
            size: block.size().to_vec(),
            num_elements: block.num_elements(),
        }
    }

    pub fn read_from<R: Read>(reader: &mut R) -> Result<Self> {
        let mode = read_i16(reader)?;
        if mode != MODE_DEFAULT && mode != MODE_VARLENGTH {
            return Err(N5Error::UnsupportedFormat(format!("unknown block mode {}", mode)));
        }

        let n_dim = read_i16(reader)?;
        let n_dim = usize::try_from(n_dim).map_err(|_| {
            N5Error::UnsupportedFormat(format!("negative dimension count {}", n_dim))
        })?;

        let mut size = Vec::with_capacity(n_dim);
        for _ in 0..n_dim {
            let extent = read_i32(reader)?;
            size.push(u32::try_from(extent).map_err(|_| {
                N5Error::UnsupportedFormat(format!("negative block extent {}", extent))
            })?);
        }

        let num_elements = if mode == MODE_VARLENGTH {
            let count = read_i32(reader)?;
            usize::try_from(count).map_err(|_| {
                N5Error::UnsupportedFormat(format!("negative element count {}", count))
            })?
        } else {
            DataBlock::num_elements_for(&size).ok_or_else(|| {
                N5Error::UnsupportedFormat(format!("element count of extents {:?} overflows", size))
            })?
        };

        Ok(Self {
            mode,
            size,
            num_elements,
        })
    }

    pub fn write_to<W: Write>(&self, writer: &mut W) -> Result<()> {
        let n_dim = i16::try_from(self.size.len()).map_err(|_| {
            N5Error::InvalidBlock(format!("{} dimensions do not fit the header", self.size.len()))
        })?;

        writer.write_all(&self.mode.to_be_bytes())?;
        writer.write_all(&n_dim.to_be_bytes())?;
        for &extent in &self.size {
            let extent = i32::try_from(extent).map_err(|_| {
                N5Error::InvalidBlock(format!("block extent {} does not fit the header", extent))
            })?;
            writer.write_all(&extent.to_be_bytes())?;
        }
        if self.mode == MODE_VARLENGTH {
            let count = i32::try_from(self.num_elements).map_err(|_| {
                N5Error::InvalidBlock(format!(
                    "element count {} does not fit the header",
                    self.num_elements
                ))
            })?;
            writer.write_all(&count.to_be_bytes())?;
        }
        Ok(())
    }
}

fn read_i16<R: Read>(reader: &mut R) -> Result<i16> {
    let mut buf = [0u8; 2];
    reader.read_exact(&mut buf).map_err(truncated)?;
    Ok(i16::from_be_bytes(buf))
}

fn read_i32<R: Read>(reader: &mut R) -> Result<i32> {
    let mut buf = [0u8; 4];
    reader.read_exact(&mut buf).map_err(truncated)?;
    Ok(i32::from_be_bytes(buf))
}

fn truncated(err: io::Error) -> N5Error {
    if err.kind() == io::ErrorKind::UnexpectedEof {
        N5Error::UnsupportedFormat("truncated block header".to_string())
    } else {
        N5Error::Io(err)
    }
}

/// Decode one block from `reader`
///
/// The element decoder comes from the dataset's data type and the payload
/// transform from its compression; the header's extents are trusted over
/// the dataset's nominal block size.
pub fn read_block<R: Read>(
    reader: &mut R,
    attributes: &DatasetAttributes,
    grid_position: &[u64],
) -> Result<DataBlock> {
    let header = BlockHeader::read_from(reader)?;
    let compressor = get_compressor(attributes.compression())?;

    let data_type = attributes.data_type();
    let expected_bytes = header
        .num_elements
        .checked_mul(data_type.size_in_bytes())
        .ok_or_else(|| {
            N5Error::UnsupportedFormat(format!("element count {} overflows", header.num_elements))
        })?;

    let mut payload = Vec::new();
    reader.read_to_end(&mut payload)?;
    let bytes = compressor.decompress(&payload, expected_bytes)?;
    let data = BlockData::from_be_bytes(data_type, &bytes)?;

    Ok(DataBlock::new(header.size, grid_position.to_vec(), data))
}

/// Encode one block to `writer`
pub fn write_block<W: Write>(
    writer: &mut W,
    attributes: &DatasetAttributes,
    block: &DataBlock,
) -> Result<()> {
    if block.data_type() != attributes.data_type() {
        return Err(N5Error::InvalidBlock(format!(
            "block holds {} elements but the dataset is {}",
            block.data_type(),
            attributes.data_type()
        )));
    }
    if block.size().len() != attributes.num_dimensions() {
        return Err(N5Error::InvalidBlock(format!(
            "block has {} dimensions but the dataset has {}",
            block.size().len(),
            attributes.num_dimensions()
        )));
    }

    let compression = attributes.compression();
    let compressor = get_compressor(compression)?;
    let header = BlockHeader::for_block(block);
    let payload = compressor.compress(&block.data().to_be_bytes(), compression.default_level())?;

    header.write_to(writer)?;
    writer.write_all(&payload)?;
    writer.flush()?;
    Ok(())
}
