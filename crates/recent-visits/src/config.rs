//! Manager configuration
//!
//! The only required inputs are the snapshot path and the per-user capacity
//! bound. The remaining knobs control how the snapshot is written and whether
//! persistence failures reach the caller.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::StorageError;

/// Configuration for a [`VisitManager`](crate::VisitManager)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManagerConfig {
    /// Snapshot file
    pub path: PathBuf,
    /// Maximum visits retained per user, fixed for the manager's lifetime
    pub max_visits: usize,
    /// Write to a temp file and rename it over the snapshot
    pub atomic_writes: bool,
    /// fsync the snapshot before it replaces the previous one
    pub sync_writes: bool,
    /// Return persistence failures from mutating calls instead of only logging them
    pub strict_persistence: bool,
}

impl ManagerConfig {
    /// Create a config with default write behaviour
    pub fn new(path: impl AsRef<Path>, max_visits: usize) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            max_visits,
            atomic_writes: true,
            sync_writes: false,
            strict_persistence: false,
        }
    }

    /// Start a builder for the given path
    pub fn builder(path: impl AsRef<Path>) -> ManagerConfigBuilder {
        ManagerConfigBuilder::new(path)
    }

    /// Check the config is usable
    pub fn validate(&self) -> Result<(), StorageError> {
        if self.max_visits == 0 {
            return Err(StorageError::invalid_config("max_visits must be at least 1"));
        }
        if self.path.as_os_str().is_empty() {
            return Err(StorageError::invalid_config("snapshot path is empty"));
        }
        Ok(())
    }
}

/// Builder for ManagerConfig
#[derive(Debug)]
pub struct ManagerConfigBuilder {
    path: PathBuf,
    max_visits: Option<usize>,
    atomic_writes: Option<bool>,
    sync_writes: Option<bool>,
    strict_persistence: Option<bool>,
}

impl ManagerConfigBuilder {
    /// Default capacity when none is given
    pub const DEFAULT_MAX_VISITS: usize = 10;

    /// Create a new builder
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            max_visits: None,
            atomic_writes: None,
            sync_writes: None,
            strict_persistence: None,
        }
    }

    /// Set maximum visits per user
    pub fn max_visits(mut self, max: usize) -> Self {
        self.max_visits = Some(max);
        self
    }

    /// Enable or disable temp-file-and-rename writes
    pub fn atomic_writes(mut self, enabled: bool) -> Self {
        self.atomic_writes = Some(enabled);
        self
    }

    /// Enable or disable fsync on every snapshot
    pub fn sync_writes(mut self, enabled: bool) -> Self {
        self.sync_writes = Some(enabled);
        self
    }

    /// Surface persistence failures from mutating calls
    pub fn strict_persistence(mut self, enabled: bool) -> Self {
        self.strict_persistence = Some(enabled);
        self
    }

    /// Build and validate the config
    pub fn build(self) -> Result<ManagerConfig, StorageError> {
        let mut config = ManagerConfig::new(
            self.path,
            self.max_visits.unwrap_or(Self::DEFAULT_MAX_VISITS),
        );

        if let Some(enabled) = self.atomic_writes {
            config.atomic_writes = enabled;
        }
        if let Some(enabled) = self.sync_writes {
            config.sync_writes = enabled;
        }
        if let Some(enabled) = self.strict_persistence {
            config.strict_persistence = enabled;
        }

        config.validate()?;
        Ok(config)
    }
}
