//! n5fs - N5 chunked array storage on a plain filesystem
//!
//! A pure Rust implementation of the N5 filesystem layout: N-dimensional
//! datasets split into blocks, one file per block, with per-group metadata
//! in an `attributes.json` sidecar.
//!
//! # Features
//!
//! - Block files addressed by grid position (`dataset/x/y/z`)
//! - Byte-exact block header and big-endian payload layout
//! - Raw, gzip and zstd block compression
//! - Advisory file locking so independent processes can read and write
//!   the same store without a coordinator
//! - Async API; locked file work runs on the blocking pool
//!
//! # Concurrency
//!
//! Readers take shared locks and writers exclusive locks, per file. A reader
//! sees a block as absent, fully old or fully new, never half written. The
//! locks are advisory, so every process touching a store must go through
//! this crate (or another implementation following the same protocol).
//!
//! # Example
//!
//! ```rust,ignore
//! use n5fs::{CompressionType, DataBlock, DataType, DatasetAttributes};
//! use n5fs::{FileSystemStore, N5Reader, N5Writer};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let store = FileSystemStore::create("file:///data/sample.n5").await?;
//! let attrs = DatasetAttributes::new(vec![10, 10], vec![4, 4], DataType::I32, CompressionType::Gzip);
//! store.create_dataset("volumes/raw", &attrs).await?;
//!
//! let block = DataBlock::from_vec(vec![2, 2], vec![2, 2], vec![1i32, 2, 3, 4]);
//! store.write_block("volumes/raw", &attrs, &block).await?;
//!
//! let read = store.read_block("volumes/raw", &attrs, &[2, 2]).await?;
//! # Ok(())
//! # }
//! ```

pub mod attributes;
pub mod block;
pub mod codec;
pub mod compression;
pub mod config;
pub mod error;
pub mod grid;
pub mod io;
pub mod lock;
pub mod reader;
pub mod types;
pub mod writer;

// Re-exports
pub use attributes::{AttributeMap, DatasetAttributes};
pub use block::{BlockData, DataBlock, Element};
pub use compression::{CompressionType, Compressor};
pub use config::{StoreConfig, ATTRIBUTES_FILE};
pub use error::{N5Error, Result};
pub use grid::{block_path, GridPosition};
pub use io::FileSystemStore;
pub use lock::{CancellationFlag, LockMode, LockPolicy, LockedFile};
pub use reader::N5Reader;
pub use types::DataType;
pub use writer::N5Writer;

/// Version of this crate
pub const N5FS_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Version of the N5 format written by this crate
pub const N5_FORMAT_VERSION: &str = "1.0.0";
