//! Integration tests for a filesystem N5 store
//!
//! These exercise the public API end to end: datasets are created, blocks
//! written and read back through separate store handles, and the on-disk
//! layout is checked byte for byte where interop depends on it.

use n5fs::{
    grid, BlockData, CompressionType, DataBlock, DataType, DatasetAttributes, FileSystemStore,
    LockPolicy, LockedFile, N5Error, N5Reader, N5Writer, StoreConfig,
};
use std::fs;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

fn open(temp_dir: &TempDir) -> FileSystemStore {
    FileSystemStore::open(temp_dir.path().to_str().unwrap()).unwrap()
}

#[tokio::test]
async fn test_boundary_block_scenario() {
    let temp_dir = TempDir::new().unwrap();
    let store = open(&temp_dir);
    let attrs = DatasetAttributes::new(
        vec![10, 10],
        vec![4, 4],
        DataType::I32,
        CompressionType::Raw,
    );
    store.create_dataset("scenario", &attrs).await.unwrap();

    let extent = attrs.block_extent(&[2, 2]).unwrap();
    assert_eq!(extent, vec![2, 2]);
    let block = DataBlock::from_vec(extent, vec![2, 2], vec![10i32, -20, 30, i32::MIN]);
    store.write_block("scenario", &attrs, &block).await.unwrap();

    let block_file = temp_dir.path().join("scenario").join("2").join("2");
    assert!(block_file.is_file());
    let bytes = fs::read(&block_file).unwrap();
    assert_eq!(bytes.len(), 2 + 2 + 4 * 2 + 4 * 4);
    assert_eq!(&bytes[..4], &[0, 0, 0, 2]);

    // a fresh handle reads what the first one wrote
    let reader = open(&temp_dir);
    let reread_attrs = reader.get_dataset_attributes("scenario").await.unwrap().unwrap();
    assert_eq!(reread_attrs, attrs);

    let read = reader
        .read_block("scenario", &reread_attrs, &[2, 2])
        .await
        .unwrap()
        .unwrap();
    assert_eq!(read.size(), &[2, 2]);
    assert_eq!(read.num_elements(), 4);
    assert_eq!(read.grid_position(), &[2, 2]);
    assert_eq!(read.as_slice::<i32>(), Some(&[10, -20, 30, i32::MIN][..]));
}

#[tokio::test]
async fn test_sparse_dataset() {
    let temp_dir = TempDir::new().unwrap();
    let store = open(&temp_dir);
    let attrs = DatasetAttributes::new(
        vec![64, 64, 64],
        vec![16, 16, 16],
        DataType::F32,
        CompressionType::Zstd,
    );
    store.create_dataset("sparse", &attrs).await.unwrap();

    let written = vec![1, 2, 3];
    let block = DataBlock::from_vec(vec![16, 16, 16], written.clone(), vec![0.5f32; 4096]);
    store.write_block("sparse", &attrs, &block).await.unwrap();

    let positions: Vec<_> = grid::grid_positions(attrs.dimensions(), attrs.block_size()).collect();
    assert_eq!(positions.len(), 64);
    let blocks = store.read_blocks("sparse", &attrs, &positions).await.unwrap();

    for (position, block) in positions.iter().zip(blocks) {
        if *position == written {
            let block = block.unwrap();
            let view = block.as_array::<f32>().unwrap();
            assert_eq!(view.shape(), &[16, 16, 16]);
            assert!(view.iter().all(|&v| v == 0.5));
        } else {
            assert!(block.is_none(), "unexpected block at {:?}", position);
        }
    }
}

#[tokio::test]
async fn test_every_type_and_supported_codec() {
    let temp_dir = TempDir::new().unwrap();
    let store = open(&temp_dir);

    for compression in CompressionType::ALL.into_iter().filter(|c| c.is_supported()) {
        for data_type in DataType::ALL {
            let path = format!("types/{}/{}", compression, data_type);
            let attrs = DatasetAttributes::new(vec![5, 3], vec![4, 4], data_type, compression);
            store.create_dataset(&path, &attrs).await.unwrap();

            let raw: Vec<u8> = (0..3 * data_type.size_in_bytes()).map(|i| (i * 3) as u8).collect();
            let data = BlockData::from_be_bytes(data_type, &raw).unwrap();
            let block = DataBlock::new(attrs.block_extent(&[1, 0]).unwrap(), vec![1, 0], data);
            assert_eq!(block.size(), &[1, 3]);

            store.write_block(&path, &attrs, &block).await.unwrap();
            let read = store.read_block(&path, &attrs, &[1, 0]).await.unwrap();
            assert_eq!(read, Some(block), "{}", path);
        }
    }
}

#[tokio::test]
async fn test_unsupported_compression_fails_to_read() {
    let temp_dir = TempDir::new().unwrap();
    let store = open(&temp_dir);
    let raw = DatasetAttributes::new(vec![4], vec![4], DataType::U8, CompressionType::Raw);
    store.create_dataset("ds", &raw).await.unwrap();
    store
        .write_block("ds", &raw, &DataBlock::from_vec(vec![4], vec![0], vec![1u8, 2, 3, 4]))
        .await
        .unwrap();

    // another tool relabels the dataset with a codec this build lacks
    store.set_attribute("ds", "compressionType", "bzip2").await.unwrap();
    let attrs = store.get_dataset_attributes("ds").await.unwrap().unwrap();
    assert_eq!(attrs.compression(), CompressionType::Bzip2);

    let result = store.read_block("ds", &attrs, &[0]).await;
    assert!(matches!(result, Err(N5Error::UnsupportedFormat(_))));
}

#[tokio::test]
async fn test_dataset_attribute_recovery_rules() {
    let temp_dir = TempDir::new().unwrap();
    let store = open(&temp_dir);

    store.set_attribute("no_dims", "blockSize", [4, 4]).await.unwrap();
    store.set_attribute("no_dims", "dataType", "int32").await.unwrap();
    store.set_attribute("no_dims", "compressionType", "raw").await.unwrap();
    assert_eq!(store.get_dataset_attributes("no_dims").await.unwrap(), None);
    assert!(!store.dataset_exists("no_dims").await.unwrap());

    store.set_attribute("odd_codec", "dimensions", [10, 10]).await.unwrap();
    store.set_attribute("odd_codec", "dataType", "int32").await.unwrap();
    store.set_attribute("odd_codec", "compressionType", 17).await.unwrap();
    let attrs = store.get_dataset_attributes("odd_codec").await.unwrap().unwrap();
    assert_eq!(attrs.compression(), CompressionType::Raw);
    assert_eq!(attrs.block_size(), &[10, 10]);
}

#[tokio::test]
async fn test_list_scenario() {
    let temp_dir = TempDir::new().unwrap();
    let store = open(&temp_dir);
    let attrs = DatasetAttributes::new(vec![4], vec![2], DataType::U8, CompressionType::Raw);
    store.create_dataset("ds", &attrs).await.unwrap();
    for x in 0..2 {
        let block = DataBlock::from_vec(vec![2], vec![x], vec![x as u8; 2]);
        store.write_block("ds", &attrs, &block).await.unwrap();
    }
    store.create_group("ds/labels").await.unwrap();

    assert_eq!(store.list("ds").await.unwrap(), vec!["labels".to_string()]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_readers_never_see_torn_blocks() {
    let temp_dir = TempDir::new().unwrap();
    let config = StoreConfig::new(temp_dir.path())
        .with_lock_policy(LockPolicy::default().with_retry_interval(Duration::from_millis(1)));
    let store = Arc::new(FileSystemStore::new(config));
    let attrs = DatasetAttributes::new(
        vec![256, 256],
        vec![256, 256],
        DataType::U32,
        CompressionType::Raw,
    );
    store.create_dataset("hot", &attrs).await.unwrap();

    let writer = {
        let store = Arc::clone(&store);
        let attrs = attrs.clone();
        tokio::spawn(async move {
            for round in 0..20u32 {
                let block = DataBlock::from_vec(vec![256, 256], vec![0, 0], vec![round; 65536]);
                store.write_block("hot", &attrs, &block).await.unwrap();
            }
        })
    };

    let readers: Vec<_> = (0..4)
        .map(|_| {
            let store = Arc::clone(&store);
            let attrs = attrs.clone();
            tokio::spawn(async move {
                for _ in 0..20 {
                    if let Some(block) = store.read_block("hot", &attrs, &[0, 0]).await.unwrap() {
                        let values = block.as_slice::<u32>().unwrap();
                        assert_eq!(values.len(), 65536);
                        assert!(values.iter().all(|&v| v == values[0]));
                    }
                }
            })
        })
        .collect();

    writer.await.unwrap();
    for reader in readers {
        reader.await.unwrap();
    }
}

#[tokio::test]
async fn test_held_lock_blocks_reader_until_deadline() {
    let temp_dir = TempDir::new().unwrap();
    let policy = LockPolicy::default()
        .with_retry_interval(Duration::from_millis(5))
        .with_timeout(Duration::from_millis(100));
    let config = StoreConfig::new(temp_dir.path()).with_lock_policy(policy);
    let store = FileSystemStore::new(config);
    let attrs = DatasetAttributes::new(vec![2], vec![2], DataType::I8, CompressionType::Raw);
    store.create_dataset("ds", &attrs).await.unwrap();
    store
        .write_block("ds", &attrs, &DataBlock::from_vec(vec![2], vec![0], vec![-1i8, 1]))
        .await
        .unwrap();

    // another process is mid-write on the block
    let held = LockedFile::open_for_writing(
        temp_dir.path().join("ds").join("0"),
        &LockPolicy::default(),
    )
    .unwrap();

    let result = store.read_block("ds", &attrs, &[0]).await;
    assert!(matches!(result, Err(N5Error::LockInterrupted { .. })));
    drop(held);
}
