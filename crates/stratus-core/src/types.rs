use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

use crate::error::{Result, StratusError};

pub const MIB: u64 = 1024 * 1024;

/// Cloud (or local) platform behind a storage provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderType {
    Local,
    S3,
    /// S3-compatible: MinIO, RustFS, Garage, Ceph RGW, SeaweedFS, etc.
    #[serde(alias = "s3-compatible")]
    S3Compatible,
    Azure,
    Gcs,
}

impl fmt::Display for ProviderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderType::Local => write!(f, "local"),
            ProviderType::S3 => write!(f, "s3"),
            ProviderType::S3Compatible => write!(f, "s3compatible"),
            ProviderType::Azure => write!(f, "azure"),
            ProviderType::Gcs => write!(f, "gcs"),
        }
    }
}

impl std::str::FromStr for ProviderType {
    type Err = StratusError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "local" => Ok(ProviderType::Local),
            "s3" | "aws" => Ok(ProviderType::S3),
            "s3compatible" | "s3-compatible" | "minio" | "rustfs" | "garage" => {
                Ok(ProviderType::S3Compatible)
            }
            "azure" => Ok(ProviderType::Azure),
            "gcs" | "google" => Ok(ProviderType::Gcs),
            _ => Err(StratusError::InvalidProviderType(s.to_string())),
        }
    }
}

/// Tunables for a storage provider. Every instance keeps its own copy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferProperties {
    /// Bytes per block for chunked transfers.
    pub block_size: u64,
    /// Maximum number of block operations in flight.
    pub concurrency: usize,
    /// Upper bound on waiting for a container delete to settle.
    pub delete_timeout: Duration,
    /// Interval between existence checks while waiting on a delete.
    pub delete_poll_interval: Duration,
}

impl TransferProperties {
    pub const DEFAULT_DELETE_TIMEOUT: Duration = Duration::from_secs(120);
    pub const DEFAULT_DELETE_POLL_INTERVAL: Duration = Duration::from_millis(500);

    pub fn new(block_size: u64, concurrency: usize) -> Self {
        Self {
            block_size,
            concurrency,
            delete_timeout: Self::DEFAULT_DELETE_TIMEOUT,
            delete_poll_interval: Self::DEFAULT_DELETE_POLL_INTERVAL,
        }
    }

    pub fn with_block_size(mut self, block_size: u64) -> Self {
        self.block_size = block_size;
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    pub fn with_delete_wait(mut self, timeout: Duration, poll_interval: Duration) -> Self {
        self.delete_timeout = timeout;
        self.delete_poll_interval = poll_interval;
        self
    }

    /// Reject properties the transfer engine cannot run with.
    pub fn validate(&self, min_block_size: u64) -> Result<()> {
        if self.block_size == 0 {
            return Err(StratusError::InvalidBlockSize(0));
        }
        if self.block_size < min_block_size {
            return Err(StratusError::InvalidProperties(format!(
                "block size {} is below the provider minimum of {min_block_size}",
                self.block_size
            )));
        }
        if self.concurrency == 0 {
            return Err(StratusError::InvalidProperties(
                "concurrency must be at least 1".to_string(),
            ));
        }
        if self.delete_poll_interval.is_zero() {
            return Err(StratusError::InvalidProperties(
                "delete poll interval must be non-zero".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for TransferProperties {
    fn default() -> Self {
        Self::new(4 * MIB, 4)
    }
}

/// One contiguous byte range of an object, transferred as a unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlockRange {
    pub index: usize,
    pub offset: u64,
    pub length: u64,
}

impl BlockRange {
    /// Exclusive end offset.
    pub fn end(&self) -> u64 {
        self.offset + self.length
    }
}

impl fmt::Display for BlockRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "block {} [{}..{})", self.index, self.offset, self.end())
    }
}
