//! Store configuration

use crate::error::{N5Error, Result};
use crate::lock::LockPolicy;
use std::path::{Path, PathBuf};

/// Name of the per-group attributes file
pub const ATTRIBUTES_FILE: &str = "attributes.json";

/// Configuration of a filesystem store
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Root directory of the store
    pub base_path: PathBuf,
    /// How file locks are acquired
    pub lock_policy: LockPolicy,
    /// Write `attributes.json` pretty-printed
    pub json_pretty: bool,
}

impl StoreConfig {
    pub fn new(base_path: impl AsRef<Path>) -> Self {
        Self {
            base_path: base_path.as_ref().to_path_buf(),
            lock_policy: LockPolicy::default(),
            json_pretty: false,
        }
    }

    /// Parse a `file://` URL or a bare path
    ///
    /// Any other scheme is rejected; the store only lives on a filesystem.
    pub fn from_url(url: &str) -> Result<Self> {
        if let Some(path) = url.strip_prefix("file://") {
            if path.is_empty() {
                return Err(N5Error::Configuration(format!("empty path in URL: {}", url)));
            }
            return Ok(Self::new(path));
        }

        if let Some(scheme_end) = url.find("://") {
            return Err(N5Error::Configuration(format!(
                "unsupported scheme {}: only file:// stores are supported",
                &url[..scheme_end]
            )));
        }

        if url.is_empty() {
            return Err(N5Error::Configuration("empty store path".to_string()));
        }
        Ok(Self::new(url))
    }

    pub fn with_lock_policy(mut self, lock_policy: LockPolicy) -> Self {
        self.lock_policy = lock_policy;
        self
    }

    pub fn with_pretty_json(mut self, pretty: bool) -> Self {
        self.json_pretty = pretty;
        self
    }
}
