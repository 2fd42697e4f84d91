use std::time::Duration;

use thiserror::Error;

use crate::types::ProviderType;

/// Boxed SDK error carried by [`StratusError::Provider`].
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Debug, Error)]
pub enum StratusError {
    // IO
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // Config
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Configuration file not found at {0}, run `stratus init` first")]
    ConfigNotFound(String),

    #[error("TOML deserialization error: {0}")]
    TomlDe(String),

    #[error("TOML serialization error: {0}")]
    TomlSer(String),

    #[error("Invalid provider type: {0}")]
    InvalidProviderType(String),

    #[error("Provider not found: {0}")]
    ProviderNotFound(String),

    // Planning
    #[error("Invalid block size {0}: must be greater than zero")]
    InvalidBlockSize(u64),

    #[error("Invalid transfer properties: {0}")]
    InvalidProperties(String),

    // Lifecycle
    #[error("Invalid container or object name '{0}'")]
    InvalidName(String),

    #[error("Container '{0}' not found")]
    ContainerNotFound(String),

    #[error("Object '{object}' not found in container '{container}'")]
    ObjectNotFound { container: String, object: String },

    #[error("Timed out after {waited:?} waiting for container '{container}' to be deleted")]
    DeleteTimeout { container: String, waited: Duration },

    // Transfer
    #[error("Transfer of '{object}' failed: {failed} of {total} blocks failed ({detail})")]
    BlocksFailed {
        object: String,
        failed: usize,
        total: usize,
        detail: String,
    },

    #[error("Transfer cancelled")]
    Cancelled,

    #[error("Block task panicked: {0}")]
    TaskPanicked(String),

    // Provider SDKs
    #[error("{provider} {op} failed: {source}")]
    Provider {
        provider: ProviderType,
        op: &'static str,
        #[source]
        source: BoxError,
    },
}

impl StratusError {
    /// Wrap an SDK error for the given provider operation.
    pub fn provider<E>(provider: ProviderType, op: &'static str, err: E) -> Self
    where
        E: Into<BoxError>,
    {
        StratusError::Provider {
            provider,
            op,
            source: err.into(),
        }
    }

    /// True for errors that mean the container or object does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            StratusError::ContainerNotFound(_) | StratusError::ObjectNotFound { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, StratusError>;
