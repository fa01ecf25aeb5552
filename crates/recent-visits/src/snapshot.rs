//! Snapshot file handling
//!
//! The snapshot is always read and written as a whole. With atomic writes
//! enabled the new state goes to a sibling temp file which is then renamed
//! over the old one, so a crash mid-write leaves the previous snapshot intact.

use std::ffi::OsString;
use std::fs::{self, File};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, trace};

use crate::config::ManagerConfig;
use crate::error::StorageError;

/// Location and write policy of a snapshot file
#[derive(Debug, Clone)]
pub struct SnapshotFile {
    path: PathBuf,
    atomic: bool,
    sync: bool,
}

impl SnapshotFile {
    /// Create a handle; nothing touches the filesystem yet
    pub fn new(path: impl AsRef<Path>, atomic: bool, sync: bool) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            atomic,
            sync,
        }
    }

    /// Create a handle from a manager config
    pub fn from_config(config: &ManagerConfig) -> Self {
        Self::new(&config.path, config.atomic_writes, config.sync_writes)
    }

    /// The snapshot path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Sibling path used for atomic writes
    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(OsString::from)
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    /// Read the whole snapshot, or `None` if there is no file
    pub fn read(&self) -> Result<Option<Vec<u8>>, StorageError> {
        match fs::read(&self.path) {
            Ok(data) => {
                trace!(path = ?self.path, bytes = data.len(), "Read snapshot");
                Ok(Some(data))
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Replace the snapshot with `data`
    pub fn write(&self, data: &[u8]) -> Result<(), StorageError> {
        if !self.atomic {
            self.write_to(&self.path, data)?;
            trace!(path = ?self.path, bytes = data.len(), "Wrote snapshot in place");
            return Ok(());
        }

        let temp_path = self.temp_path();
        if let Err(e) = self.write_to(&temp_path, data) {
            let _ = fs::remove_file(&temp_path);
            return Err(e);
        }
        if let Err(e) = fs::rename(&temp_path, &self.path) {
            let _ = fs::remove_file(&temp_path);
            return Err(e.into());
        }

        debug!(path = ?self.path, bytes = data.len(), "Wrote snapshot");
        Ok(())
    }

    fn write_to(&self, path: &Path, data: &[u8]) -> Result<(), StorageError> {
        let mut file = File::create(path)?;
        file.write_all(data)?;
        if self.sync {
            file.sync_all()?;
        }
        Ok(())
    }
}
