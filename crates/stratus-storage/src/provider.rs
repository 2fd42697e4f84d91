use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use stratus_core::error::Result;
use stratus_core::types::{BlockRange, ProviderType, TransferProperties};

/// An in-progress chunked upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadTicket {
    pub object: String,
    pub content_type: String,
    /// Provider upload handle (S3 upload id, staging id). Empty when the
    /// provider keeps no server-side session.
    pub upload_id: String,
}

/// Receipt for one staged block, needed to commit it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedBlock {
    pub index: usize,
    /// ETag, block id or part object name depending on the provider.
    pub tag: String,
}

/// Object-level primitives of one container or bucket.
///
/// The chunked transfer engine drives these; implementations map each call
/// onto a single native SDK operation where possible.
#[async_trait]
pub trait TransferAdapter: Send + Sync {
    /// Container or bucket this adapter addresses.
    fn container(&self) -> &str;

    /// Most blocks one staged upload may commit. `None` means unbounded.
    fn max_blocks(&self) -> Option<usize> {
        None
    }

    /// All object names under `prefix`, following pagination to the end.
    async fn list_objects(&self, prefix: &str) -> Result<Vec<String>>;

    /// Size of an object in bytes.
    async fn object_size(&self, object: &str) -> Result<u64>;

    async fn delete_object(&self, object: &str) -> Result<()>;

    /// Single-call upload for objects that fit in one block.
    async fn put_object(&self, object: &str, content_type: &str, data: Bytes) -> Result<()>;

    /// Start a staged upload.
    async fn begin_upload(&self, object: &str, content_type: &str) -> Result<UploadTicket>;

    /// Stage one block. Staged blocks are invisible until committed.
    async fn stage_block(
        &self,
        ticket: &UploadTicket,
        block: BlockRange,
        data: Bytes,
    ) -> Result<StagedBlock>;

    /// Make the object visible from its staged blocks, in index order.
    async fn commit_blocks(&self, ticket: &UploadTicket, blocks: Vec<StagedBlock>) -> Result<()>;

    /// Discard staged data of an upload that will not be committed.
    async fn abort_upload(&self, ticket: &UploadTicket) -> Result<()>;

    /// Read `[block.offset, block.end())` of an object.
    async fn read_range(&self, object: &str, block: BlockRange) -> Result<Bytes>;
}

/// Container-level primitives of one cloud account or project.
#[async_trait]
pub trait ContainerApi: Send + Sync {
    fn provider_type(&self) -> ProviderType;

    /// Defaults handed to a new `StorageProvider`.
    fn default_properties(&self) -> TransferProperties;

    /// Smallest block size the native upload primitive accepts.
    fn min_block_size(&self) -> u64 {
        1
    }

    /// `Ok(false)` only when the provider reports the container as missing.
    async fn container_exists(&self, name: &str) -> Result<bool>;

    /// Create a container with private access.
    async fn create_container(&self, name: &str) -> Result<()>;

    async fn delete_container(&self, name: &str) -> Result<()>;

    async fn list_containers(&self) -> Result<Vec<String>>;

    /// Object-level adapter bound to `container`.
    fn adapter(&self, container: &str) -> Arc<dyn TransferAdapter>;

    /// Test connectivity.
    async fn test_connection(&self) -> Result<()> {
        self.list_containers().await.map(|_| ())
    }
}
