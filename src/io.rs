//! Filesystem store - resolves group paths below the store root

use crate::config::{StoreConfig, ATTRIBUTES_FILE};
use crate::error::{N5Error, Result};
use crate::grid::block_path;
use crate::writer::N5Writer;
use crate::N5_FORMAT_VERSION;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use tokio::fs;

/// Root attribute holding the format version
pub const VERSION_KEY: &str = "n5";

/// N5 store on a local filesystem
///
/// Cheap to clone; clones share the configuration. Nothing is cached:
/// every attribute and block access goes to disk under a file lock.
#[derive(Debug, Clone)]
pub struct FileSystemStore {
    config: Arc<StoreConfig>,
}

impl FileSystemStore {
    pub fn new(config: StoreConfig) -> Self {
        Self {
            config: Arc::new(config),
        }
    }

    /// Open a store at a `file://` URL or bare path
    ///
    /// The root is not created; if it does not exist every group lookup
    /// reports it missing.
    pub fn open(url: &str) -> Result<Self> {
        Ok(Self::new(StoreConfig::from_url(url)?))
    }

    /// Open a store, creating its root directory
    ///
    /// The root's attributes record the format version under `n5`.
    pub async fn create(url: &str) -> Result<Self> {
        let store = Self::open(url)?;
        fs::create_dir_all(store.base_path())
            .await
            .map_err(|e| N5Error::io_at(store.base_path(), e))?;
        store
            .set_attribute("", VERSION_KEY, N5_FORMAT_VERSION)
            .await?;
        Ok(store)
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub fn base_path(&self) -> &Path {
        &self.config.base_path
    }

    /// Directory of the group at `path`
    ///
    /// `path` uses `/` separators and is always relative to the store root,
    /// with or without a leading slash. `..` segments are rejected.
    pub fn group_path(&self, path: &str) -> Result<PathBuf> {
        let mut full = self.config.base_path.clone();
        for component in Path::new(path).components() {
            match component {
                Component::Normal(segment) => full.push(segment),
                Component::RootDir | Component::CurDir => {}
                Component::ParentDir | Component::Prefix(_) => {
                    return Err(N5Error::InvalidPath(path.to_string()));
                }
            }
        }
        Ok(full)
    }

    /// `attributes.json` of the group at `path`
    pub fn attributes_path(&self, path: &str) -> Result<PathBuf> {
        Ok(self.group_path(path)?.join(ATTRIBUTES_FILE))
    }

    /// Block file of the dataset at `path`
    pub fn block_path(&self, path: &str, grid_position: &[u64]) -> Result<PathBuf> {
        Ok(block_path(self.group_path(path)?, grid_position))
    }
}

/// Run filesystem work that holds file locks on the blocking pool
pub(crate) async fn blocking<T, F>(f: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| N5Error::Io(std::io::Error::other(e)))?
}

/// Whether `path` is an existing directory
pub(crate) async fn is_dir(path: &Path) -> bool {
    fs::metadata(path)
        .await
        .map(|m| m.is_dir())
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reader::N5Reader;
    use tempfile::TempDir;

    #[test]
    fn test_group_path() {
        let store = FileSystemStore::open("file:///data/store.n5").unwrap();
        assert_eq!(
            store.group_path("/volumes/raw").unwrap(),
            PathBuf::from("/data/store.n5/volumes/raw")
        );
        assert_eq!(
            store.group_path("volumes/./raw/").unwrap(),
            PathBuf::from("/data/store.n5/volumes/raw")
        );
        assert_eq!(store.group_path("").unwrap(), PathBuf::from("/data/store.n5"));
        assert_eq!(store.group_path("/").unwrap(), PathBuf::from("/data/store.n5"));
        assert!(matches!(
            store.group_path("../escape"),
            Err(N5Error::InvalidPath(_))
        ));
    }

    #[test]
    fn test_attributes_and_block_paths() {
        let store = FileSystemStore::open("/data/store.n5").unwrap();
        assert_eq!(
            store.attributes_path("ds").unwrap(),
            PathBuf::from("/data/store.n5/ds/attributes.json")
        );
        assert_eq!(
            store.block_path("/ds", &[2, 2]).unwrap(),
            PathBuf::from("/data/store.n5/ds/2/2")
        );
    }

    #[tokio::test]
    async fn test_create_makes_root() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path().join("nested").join("store.n5");
        let store = FileSystemStore::create(root.to_str().unwrap()).await.unwrap();
        assert!(is_dir(store.base_path()).await);

        let version: Option<String> = store.get_attribute("/", VERSION_KEY).await.unwrap();
        assert_eq!(version.as_deref(), Some(N5_FORMAT_VERSION));
    }

    #[tokio::test]
    async fn test_blocking_propagates_errors() {
        let result: Result<()> =
            blocking(|| Err(N5Error::InvalidBlock("nope".to_string()))).await;
        assert!(matches!(result, Err(N5Error::InvalidBlock(_))));
    }
}
