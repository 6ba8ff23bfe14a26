//! Block payload compression
//!
//! Compression types are a closed set keyed by the `compressionType` tag
//! stored in `attributes.json`. A tag can be recognised without this build
//! carrying a codec for it; such blocks fail to decode with
//! [`N5Error::UnsupportedFormat`] instead of being read as garbage.

use crate::error::{N5Error, Result};
use flate2::read::{GzEncoder, MultiGzDecoder};
use flate2::Compression as FlateCompression;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::Read;
use std::str::FromStr;

/// Compression types known to the N5 format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompressionType {
    /// No compression
    #[default]
    Raw,
    /// Gzip (RFC 1952) stream
    Gzip,
    /// Bzip2 stream (recognised, no codec in this build)
    Bzip2,
    /// LZ4 block stream (recognised, no codec in this build)
    Lz4,
    /// XZ stream (recognised, no codec in this build)
    Xz,
    /// Zstandard frame
    Zstd,
}

impl CompressionType {
    /// Every registered type, in tag order
    pub const ALL: [CompressionType; 6] = [
        CompressionType::Raw,
        CompressionType::Gzip,
        CompressionType::Bzip2,
        CompressionType::Lz4,
        CompressionType::Xz,
        CompressionType::Zstd,
    ];

    /// The persisted tag
    pub fn tag(&self) -> &'static str {
        match self {
            CompressionType::Raw => "raw",
            CompressionType::Gzip => "gzip",
            CompressionType::Bzip2 => "bzip2",
            CompressionType::Lz4 => "lz4",
            CompressionType::Xz => "xz",
            CompressionType::Zstd => "zstd",
        }
    }

    /// Level used when writing with this compression
    pub fn default_level(&self) -> CompressionLevel {
        match self {
            CompressionType::Zstd => CompressionLevel::new(3),
            CompressionType::Raw => CompressionLevel::none(),
            _ => CompressionLevel::default(),
        }
    }

    /// Whether this build can encode and decode the type
    pub fn is_supported(&self) -> bool {
        matches!(
            self,
            CompressionType::Raw | CompressionType::Gzip | CompressionType::Zstd
        )
    }
}

impl fmt::Display for CompressionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

impl FromStr for CompressionType {
    type Err = N5Error;

    fn from_str(s: &str) -> Result<Self> {
        CompressionType::ALL
            .iter()
            .copied()
            .find(|c| c.tag() == s)
            .ok_or_else(|| N5Error::UnsupportedFormat(format!("unknown compression type: {}", s)))
    }
}

/// Compression level (0-9 for gzip, up to 22 for zstd)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompressionLevel(u8);

impl CompressionLevel {
    pub fn new(level: u8) -> Self {
        Self(level.min(22))
    }

    pub fn none() -> Self {
        Self(0)
    }

    pub fn fast() -> Self {
        Self(1)
    }

    pub fn best() -> Self {
        Self(9)
    }

    pub fn value(&self) -> u8 {
        self.0
    }
}

impl Default for CompressionLevel {
    fn default() -> Self {
        Self(6)
    }
}

/// Trait for compression/decompression operations
pub trait Compressor: Send + Sync {
    /// Compress data
    fn compress(&self, data: &[u8], level: CompressionLevel) -> Result<Vec<u8>>;

    /// Decompress data, expecting exactly `expected_size` output bytes
    fn decompress(&self, data: &[u8], expected_size: usize) -> Result<Vec<u8>>;

    /// Get the compression type
    fn compression_type(&self) -> CompressionType;
}

fn check_size(kind: CompressionType, actual: usize, expected: usize) -> Result<()> {
    if actual != expected {
        return Err(N5Error::UnsupportedFormat(format!(
            "{} payload decoded to {} bytes, expected {}",
            kind, actual, expected
        )));
    }
    Ok(())
}

/// Drain a decoder, stopping one byte past `expected_size`
///
/// The expected size comes from a block header, so it is never used to
/// size an allocation; oversized output is caught by [`check_size`].
fn read_bounded<R: Read>(kind: CompressionType, decoder: R, expected_size: usize) -> Result<Vec<u8>> {
    let limit = u64::try_from(expected_size)
        .unwrap_or(u64::MAX)
        .saturating_add(1);
    let mut decompressed = Vec::new();
    decoder
        .take(limit)
        .read_to_end(&mut decompressed)
        .map_err(|e| N5Error::UnsupportedFormat(format!("{} payload: {}", kind, e)))?;
    check_size(kind, decompressed.len(), expected_size)?;
    Ok(decompressed)
}

/// No compression
#[derive(Debug, Default)]
pub struct RawCompressor;

impl Compressor for RawCompressor {
    fn compress(&self, data: &[u8], _level: CompressionLevel) -> Result<Vec<u8>> {
        Ok(data.to_vec())
    }

    fn decompress(&self, data: &[u8], expected_size: usize) -> Result<Vec<u8>> {
        check_size(CompressionType::Raw, data.len(), expected_size)?;
        Ok(data.to_vec())
    }

    fn compression_type(&self) -> CompressionType {
        CompressionType::Raw
    }
}

/// Gzip compression
#[derive(Debug, Default)]
pub struct GzipCompressor;

impl Compressor for GzipCompressor {
    fn compress(&self, data: &[u8], level: CompressionLevel) -> Result<Vec<u8>> {
        let level = u32::from(level.value().min(9));
        let mut encoder = GzEncoder::new(data, FlateCompression::new(level));
        let mut compressed = Vec::new();
        encoder.read_to_end(&mut compressed)?;
        Ok(compressed)
    }

    fn decompress(&self, data: &[u8], expected_size: usize) -> Result<Vec<u8>> {
        read_bounded(CompressionType::Gzip, MultiGzDecoder::new(data), expected_size)
    }

    fn compression_type(&self) -> CompressionType {
        CompressionType::Gzip
    }
}

/// Zstandard compression
#[derive(Debug, Default)]
pub struct ZstdCompressor;

impl Compressor for ZstdCompressor {
    fn compress(&self, data: &[u8], level: CompressionLevel) -> Result<Vec<u8>> {
        Ok(zstd::encode_all(data, i32::from(level.value()))?)
    }

    fn decompress(&self, data: &[u8], expected_size: usize) -> Result<Vec<u8>> {
        let decoder = zstd::stream::read::Decoder::new(data)
            .map_err(|e| N5Error::UnsupportedFormat(format!("zstd payload: {}", e)))?;
        read_bounded(CompressionType::Zstd, decoder, expected_size)
    }

    fn compression_type(&self) -> CompressionType {
        CompressionType::Zstd
    }
}

/// Get a compressor for a given compression type
pub fn get_compressor(compression: CompressionType) -> Result<Box<dyn Compressor>> {
    match compression {
        CompressionType::Raw => Ok(Box::new(RawCompressor)),
        CompressionType::Gzip => Ok(Box::new(GzipCompressor)),
        CompressionType::Zstd => Ok(Box::new(ZstdCompressor)),
        CompressionType::Bzip2 | CompressionType::Lz4 | CompressionType::Xz => Err(
            N5Error::UnsupportedFormat(format!("no codec for compression type {}", compression)),
        ),
    }
}
