//! Storage writer - creates groups and writes attributes and blocks

use crate::attributes::{AttributeMap, DatasetAttributes};
use crate::block::DataBlock;
use crate::codec;
use crate::error::{N5Error, Result};
use crate::io::{blocking, is_dir, FileSystemStore};
use crate::lock::{LockPolicy, LockedFile};
use crate::reader::{parse_attributes, N5Reader};
use async_trait::async_trait;
use serde::Serialize;
use std::io::{ErrorKind, Write};
use std::path::Path;
use tokio::fs;
use tracing::debug;

/// Write access to an N5 container
#[async_trait]
pub trait N5Writer: N5Reader {
    /// Create a group and all missing parents
    async fn create_group(&self, path: &str) -> Result<()>;

    /// Merge `attributes` into the group's attributes
    ///
    /// Existing keys not named in `attributes` are kept. The group is
    /// created if needed.
    async fn set_attributes(&self, path: &str, attributes: AttributeMap) -> Result<()>;

    /// Set a single attribute
    async fn set_attribute<T>(&self, path: &str, key: &str, value: T) -> Result<()>
    where
        T: Serialize + Send + 'static,
    {
        let mut attributes = AttributeMap::new();
        attributes.insert(key.to_string(), serde_json::to_value(value)?);
        self.set_attributes(path, attributes).await
    }

    /// Store the four dataset keys
    async fn set_dataset_attributes(
        &self,
        path: &str,
        attributes: &DatasetAttributes,
    ) -> Result<()> {
        self.set_attributes(path, attributes.as_map()).await
    }

    /// Create a group and mark it as a dataset
    async fn create_dataset(&self, path: &str, attributes: &DatasetAttributes) -> Result<()> {
        self.create_group(path).await?;
        self.set_dataset_attributes(path, attributes).await
    }

    /// Write one block at its grid position
    async fn write_block(
        &self,
        path: &str,
        attributes: &DatasetAttributes,
        block: &DataBlock,
    ) -> Result<()>;

    /// Delete one block; `false` if it did not exist
    async fn delete_block(&self, path: &str, grid_position: &[u64]) -> Result<bool>;

    /// Remove a group or dataset with everything below it; `false` if absent
    async fn remove(&self, path: &str) -> Result<bool>;
}

fn write_attributes_locked(
    path: &Path,
    attributes: AttributeMap,
    policy: &LockPolicy,
    pretty: bool,
) -> Result<()> {
    let mut locked = LockedFile::open_for_writing(path, policy)?;
    let mut merged = parse_attributes(path, &locked.read_all()?)?;
    merged.extend(attributes);

    let body = if pretty {
        serde_json::to_vec_pretty(&merged)?
    } else {
        serde_json::to_vec(&merged)?
    };
    locked.truncate()?;
    locked
        .write_all(&body)
        .and_then(|_| locked.flush())
        .map_err(|e| N5Error::io_at(path, e))
}

fn write_block_locked(
    path: &Path,
    attributes: &DatasetAttributes,
    block: &DataBlock,
    policy: &LockPolicy,
) -> Result<()> {
    let mut locked = LockedFile::open_for_writing(path, policy)?;
    locked.truncate()?;
    codec::write_block(&mut locked, attributes, block)
}

fn delete_locked(path: &Path, policy: &LockPolicy) -> Result<bool> {
    let locked = match LockedFile::open_existing_for_writing(path, policy) {
        Ok(locked) => locked,
        Err(N5Error::IoAt { source, .. }) if source.kind() == ErrorKind::NotFound => {
            return Ok(false);
        }
        Err(e) => return Err(e),
    };
    let removed = match std::fs::remove_file(path) {
        Ok(()) => true,
        Err(e) if e.kind() == ErrorKind::NotFound => false,
        Err(e) => return Err(N5Error::io_at(path, e)),
    };
    drop(locked);
    Ok(removed)
}

/// Delete every file below `dir` under its write lock, then the directories
fn remove_tree_locked(dir: &Path, policy: &LockPolicy) -> Result<()> {
    let entries = std::fs::read_dir(dir).map_err(|e| N5Error::io_at(dir, e))?;
    for entry in entries {
        let entry = entry.map_err(|e| N5Error::io_at(dir, e))?;
        let path = entry.path();
        let file_type = entry.file_type().map_err(|e| N5Error::io_at(&path, e))?;
        if file_type.is_dir() {
            remove_tree_locked(&path, policy)?;
        } else {
            delete_locked(&path, policy)?;
        }
    }
    match std::fs::remove_dir(dir) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(N5Error::io_at(dir, e)),
    }
}

#[async_trait]
impl N5Writer for FileSystemStore {
    async fn create_group(&self, path: &str) -> Result<()> {
        let group = self.group_path(path)?;
        fs::create_dir_all(&group)
            .await
            .map_err(|e| N5Error::io_at(&group, e))
    }

    async fn set_attributes(&self, path: &str, attributes: AttributeMap) -> Result<()> {
        self.create_group(path).await?;
        let attributes_path = self.attributes_path(path)?;
        let policy = self.config().lock_policy.clone();
        let pretty = self.config().json_pretty;

        debug!(path = %attributes_path.display(), keys = attributes.len(), "writing attributes");
        blocking(move || write_attributes_locked(&attributes_path, attributes, &policy, pretty)).await
    }

    async fn write_block(
        &self,
        path: &str,
        attributes: &DatasetAttributes,
        block: &DataBlock,
    ) -> Result<()> {
        let block_path = self.block_path(path, block.grid_position())?;
        if let Some(parent) = block_path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| N5Error::io_at(parent, e))?;
        }

        debug!(
            path = %block_path.display(),
            grid_position = ?block.grid_position(),
            elements = block.num_elements(),
            "writing block"
        );
        let attributes = attributes.clone();
        let block = block.clone();
        let policy = self.config().lock_policy.clone();
        blocking(move || write_block_locked(&block_path, &attributes, &block, &policy)).await
    }

    async fn delete_block(&self, path: &str, grid_position: &[u64]) -> Result<bool> {
        let block_path = self.block_path(path, grid_position)?;
        let policy = self.config().lock_policy.clone();
        blocking(move || delete_locked(&block_path, &policy)).await
    }

    async fn remove(&self, path: &str) -> Result<bool> {
        let group = self.group_path(path)?;
        if !is_dir(&group).await {
            return Ok(false);
        }

        debug!(path = %group.display(), "removing group");
        let policy = self.config().lock_policy.clone();
        blocking(move || remove_tree_locked(&group, &policy)).await?;
        Ok(true)
    }
}
