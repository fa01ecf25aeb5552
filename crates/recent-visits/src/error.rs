//! Error types for recent-visits
//!
//! This module defines the error types used throughout the crate.

use std::collections::TryReserveError;

use thiserror::Error;

/// Errors that can occur in visit history operations
#[derive(Debug, Clone, Error)]
pub enum StorageError {
    /// I/O error while reading or writing the snapshot file
    #[error("I/O error: {0}")]
    Io(String),

    /// The snapshot file could not be decoded
    #[error("Deserialization error: {0}")]
    Deserialization(String),

    /// Memory for a new user or visit could not be reserved
    #[error("Resource exhausted: {0}")]
    ResourceExhausted(String),

    /// The manager configuration is unusable
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// An argument cannot be represented in the snapshot format
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl From<std::io::Error> for StorageError {
    fn from(err: std::io::Error) -> Self {
        StorageError::Io(err.to_string())
    }
}

impl From<TryReserveError> for StorageError {
    fn from(err: TryReserveError) -> Self {
        StorageError::ResourceExhausted(err.to_string())
    }
}

impl StorageError {
    /// Create a new Deserialization error
    pub fn deserialization(message: impl Into<String>) -> Self {
        Self::Deserialization(message.into())
    }

    /// Create a new InvalidConfig error
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig(message.into())
    }

    /// Create a new InvalidInput error
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }

    /// Create a new I/O error
    pub fn io(message: impl Into<String>) -> Self {
        Self::Io(message.into())
    }
}
