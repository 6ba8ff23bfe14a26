//! Storage reader - groups, attributes and blocks of an N5 store

use crate::attributes::{AttributeMap, DatasetAttributes};
use crate::block::DataBlock;
use crate::codec;
use crate::error::{N5Error, Result};
use crate::io::{blocking, is_dir, FileSystemStore};
use crate::lock::{LockPolicy, LockedFile};
use async_trait::async_trait;
use futures::future::try_join_all;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::io::ErrorKind;
use std::path::Path;
use tokio::fs;
use tracing::{debug, warn};

/// Read access to an N5 container
#[async_trait]
pub trait N5Reader: Send + Sync {
    /// Whether a group (or dataset) directory exists at `path`
    async fn exists(&self, path: &str) -> bool;

    /// Whether `path` exists and carries valid dataset attributes
    async fn dataset_exists(&self, path: &str) -> Result<bool> {
        Ok(self.exists(path).await && self.get_dataset_attributes(path).await?.is_some())
    }

    /// All attributes of a group
    ///
    /// An existing group without `attributes.json` has an empty map.
    async fn get_attributes(&self, path: &str) -> Result<AttributeMap>;

    /// One attribute, deserialized into `T`; `None` if the key is absent
    async fn get_attribute<T>(&self, path: &str, key: &str) -> Result<Option<T>>
    where
        T: DeserializeOwned + Send + 'static;

    /// Dataset attributes of `path`, or `None` if it is not a dataset
    async fn get_dataset_attributes(&self, path: &str) -> Result<Option<DatasetAttributes>> {
        Ok(DatasetAttributes::from_map(&self.get_attributes(path).await?))
    }

    /// The block at `grid_position`; `None` if it was never written
    async fn read_block(
        &self,
        path: &str,
        attributes: &DatasetAttributes,
        grid_position: &[u64],
    ) -> Result<Option<DataBlock>>;

    /// Several blocks concurrently, in the order requested
    async fn read_blocks(
        &self,
        path: &str,
        attributes: &DatasetAttributes,
        grid_positions: &[Vec<u64>],
    ) -> Result<Vec<Option<DataBlock>>> {
        let futures = grid_positions
            .iter()
            .map(|position| self.read_block(path, attributes, position));
        try_join_all(futures).await
    }

    /// Names of the immediate child groups of `path`
    async fn list(&self, path: &str) -> Result<Vec<String>>;
}

/// Parse an `attributes.json` body
///
/// An empty file or a JSON `null` is an empty map; anything other than an
/// object is malformed.
pub(crate) fn parse_attributes(path: &Path, bytes: &[u8]) -> Result<AttributeMap> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(AttributeMap::new());
    }

    let malformed = |reason: String| N5Error::MalformedMetadata {
        path: path.to_path_buf(),
        reason,
    };
    match serde_json::from_slice::<Value>(bytes).map_err(|e| malformed(e.to_string()))? {
        Value::Object(map) => Ok(map),
        Value::Null => Ok(AttributeMap::new()),
        other => Err(malformed(format!("expected a JSON object, found {}", json_kind(&other)))),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Read and parse `attributes.json` under a shared lock
///
/// A file that vanished before it could be opened reads as empty.
pub(crate) fn read_attributes_locked(path: &Path, policy: &LockPolicy) -> Result<AttributeMap> {
    let mut locked = match LockedFile::open_for_reading(path, policy) {
        Ok(locked) => locked,
        Err(N5Error::IoAt { source, .. }) if source.kind() == ErrorKind::NotFound => {
            return Ok(AttributeMap::new());
        }
        Err(e) => return Err(e),
    };
    let bytes = locked.read_all()?;
    parse_attributes(path, &bytes)
}

fn read_block_locked(
    path: &Path,
    attributes: &DatasetAttributes,
    grid_position: &[u64],
    policy: &LockPolicy,
) -> Result<Option<DataBlock>> {
    let mut locked = match LockedFile::open_for_reading(path, policy) {
        Ok(locked) => locked,
        Err(N5Error::IoAt { source, .. }) if source.kind() == ErrorKind::NotFound => {
            return Ok(None);
        }
        Err(e) => return Err(e),
    };
    // created by a writer that has not written it yet
    if locked.is_empty()? {
        return Ok(None);
    }
    codec::read_block(&mut locked, attributes, grid_position).map(Some)
}

#[async_trait]
impl N5Reader for FileSystemStore {
    async fn exists(&self, path: &str) -> bool {
        match self.group_path(path) {
            Ok(group) => is_dir(&group).await,
            Err(_) => false,
        }
    }

    async fn get_attributes(&self, path: &str) -> Result<AttributeMap> {
        let group = self.group_path(path)?;
        if !is_dir(&group).await {
            return Err(N5Error::NotFound(group));
        }

        let attributes_path = self.attributes_path(path)?;
        let policy = self.config().lock_policy.clone();
        blocking(move || read_attributes_locked(&attributes_path, &policy)).await
    }

    async fn get_attribute<T>(&self, path: &str, key: &str) -> Result<Option<T>>
    where
        T: DeserializeOwned + Send + 'static,
    {
        let mut attributes = self.get_attributes(path).await?;
        let Some(value) = attributes.remove(key) else {
            return Ok(None);
        };
        serde_json::from_value(value)
            .map(Some)
            .map_err(|e| N5Error::MalformedMetadata {
                path: self.group_path(path).unwrap_or_default(),
                reason: format!("attribute {}: {}", key, e),
            })
    }

    async fn read_block(
        &self,
        path: &str,
        attributes: &DatasetAttributes,
        grid_position: &[u64],
    ) -> Result<Option<DataBlock>> {
        let block_path = self.block_path(path, grid_position)?;
        debug!(path = %block_path.display(), ?grid_position, "reading block");
        let attributes = attributes.clone();
        let grid_position = grid_position.to_vec();
        let policy = self.config().lock_policy.clone();
        blocking(move || read_block_locked(&block_path, &attributes, &grid_position, &policy)).await
    }

    async fn list(&self, path: &str) -> Result<Vec<String>> {
        let group = self.group_path(path)?;
        if !is_dir(&group).await {
            return Err(N5Error::NotFound(group));
        }

        let mut children = Vec::new();
        let mut read_dir = fs::read_dir(&group)
            .await
            .map_err(|e| N5Error::io_at(&group, e))?;
        while let Some(entry) = read_dir
            .next_entry()
            .await
            .map_err(|e| N5Error::io_at(&group, e))?
        {
            if !is_dir(&entry.path()).await {
                continue;
            }
            let name = entry.file_name();
            match name.to_str() {
                Some(name) => children.push(name.to_string()),
                None => {
                    warn!(group = %group.display(), name = ?name, "child name is not UTF-8");
                    children.push(name.to_string_lossy().into_owned());
                }
            }
        }
        children.sort();
        Ok(children)
    }
}
