//! Persistence backends for the interval record

use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Store-related errors
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

/// Raw byte storage for the persisted config record.
///
/// The location is the implementor's concern; the interval logic only ever
/// sees the bytes.
pub trait ConfigStore: Send + Sync {
    fn load(&self) -> Result<Vec<u8>, StoreError>;

    fn save(&self, bytes: &[u8]) -> Result<(), StoreError>;
}

/// Config store backed by a single JSON file
#[derive(Debug, Clone)]
pub struct FileConfigStore {
    path: PathBuf,
}

impl FileConfigStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ConfigStore for FileConfigStore {
    fn load(&self) -> Result<Vec<u8>, StoreError> {
        Ok(fs::read(&self.path)?)
    }

    fn save(&self, bytes: &[u8]) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent)?;
            }
        }
        fs::write(&self.path, bytes)?;

        tracing::debug!("Saved config to {:?}", self.path);
        Ok(())
    }
}
