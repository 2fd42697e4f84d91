#[cfg(feature = "azure")]
mod inner {
    use std::sync::Arc;

    use async_trait::async_trait;
    use azure_core::StatusCode;
    use azure_storage::StorageCredentials;
    use azure_storage_blobs::prelude::*;
    use bytes::{Bytes, BytesMut};
    use futures::StreamExt;
    use stratus_core::error::{Result, StratusError};
    use stratus_core::plan::{block_id_bytes, encode_block_id};
    use stratus_core::types::{BlockRange, MIB, ProviderType, TransferProperties};
    use tracing::debug;

    use crate::provider::{ContainerApi, StagedBlock, TransferAdapter, UploadTicket};

    /// Most committed blocks one block blob may have.
    const AZURE_MAX_BLOCKS: usize = 50_000;

    fn is_missing(e: &azure_core::Error) -> bool {
        e.as_http_error()
            .is_some_and(|h| h.status() == StatusCode::NotFound)
    }

    fn err(op: &'static str, e: azure_core::Error) -> StratusError {
        StratusError::provider(ProviderType::Azure, op, e)
    }

    /// Azure Blob Storage account.
    pub struct AzureService {
        service: BlobServiceClient,
    }

    impl AzureService {
        /// Create from storage account name + access key.
        pub fn new(account: &str, access_key: &str) -> Self {
            let credentials = StorageCredentials::access_key(account, access_key.to_string());
            Self {
                service: ClientBuilder::new(account, credentials).blob_service_client(),
            }
        }

        /// Create using the emulator (Azurite).
        pub fn emulator() -> Self {
            Self {
                service: ClientBuilder::emulator().blob_service_client(),
            }
        }
    }

    #[async_trait]
    impl ContainerApi for AzureService {
        fn provider_type(&self) -> ProviderType {
            ProviderType::Azure
        }

        fn default_properties(&self) -> TransferProperties {
            TransferProperties::new(100 * MIB, 8)
        }

        async fn container_exists(&self, name: &str) -> Result<bool> {
            match self.service.container_client(name).get_properties().await {
                Ok(_) => Ok(true),
                Err(e) if is_missing(&e) => Ok(false),
                Err(e) => Err(err("get_container_properties", e)),
            }
        }

        async fn create_container(&self, name: &str) -> Result<()> {
            self.service
                .container_client(name)
                .create()
                .public_access(PublicAccess::None)
                .await
                .map_err(|e| err("create_container", e))?;
            debug!("Created Azure container '{name}'");
            Ok(())
        }

        async fn delete_container(&self, name: &str) -> Result<()> {
            match self.service.container_client(name).delete().await {
                Ok(_) => Ok(()),
                Err(e) if is_missing(&e) => Err(StratusError::ContainerNotFound(name.to_string())),
                Err(e) => Err(err("delete_container", e)),
            }
        }

        async fn list_containers(&self) -> Result<Vec<String>> {
            let mut names = Vec::new();
            let mut pages = self.service.list_containers().into_stream();
            while let Some(page) = pages.next().await {
                let page = page.map_err(|e| err("list_containers", e))?;
                names.extend(page.containers.into_iter().map(|c| c.name));
            }
            Ok(names)
        }

        fn adapter(&self, container: &str) -> Arc<dyn TransferAdapter> {
            Arc::new(AzureContainer {
                name: container.to_string(),
                client: self.service.container_client(container),
            })
        }
    }

    /// Blob operations on one Azure container.
    pub struct AzureContainer {
        name: String,
        client: ContainerClient,
    }

    impl AzureContainer {
        fn not_found(&self, object: &str) -> StratusError {
            StratusError::ObjectNotFound {
                container: self.name.clone(),
                object: object.to_string(),
            }
        }
    }

    #[async_trait]
    impl TransferAdapter for AzureContainer {
        fn container(&self) -> &str {
            &self.name
        }

        fn max_blocks(&self) -> Option<usize> {
            Some(AZURE_MAX_BLOCKS)
        }

        async fn list_objects(&self, prefix: &str) -> Result<Vec<String>> {
            let mut names = Vec::new();
            let mut pages = self
                .client
                .list_blobs()
                .prefix(prefix.to_string())
                .into_stream();
            while let Some(page) = pages.next().await {
                let page = page.map_err(|e| {
                    if is_missing(&e) {
                        StratusError::ContainerNotFound(self.name.clone())
                    } else {
                        err("list_blobs", e)
                    }
                })?;
                let before = names.len();
                names.extend(page.blobs.blobs().map(|b| b.name.clone()));
                debug!("Listed page of {} blobs in '{}'", names.len() - before, self.name);
            }
            Ok(names)
        }

        async fn object_size(&self, object: &str) -> Result<u64> {
            let props = self
                .client
                .blob_client(object)
                .get_properties()
                .await
                .map_err(|e| {
                    if is_missing(&e) {
                        self.not_found(object)
                    } else {
                        err("get_blob_properties", e)
                    }
                })?;
            Ok(props.blob.properties.content_length)
        }

        async fn delete_object(&self, object: &str) -> Result<()> {
            match self
                .client
                .blob_client(object)
                .delete()
                .delete_snapshots_method(DeleteSnapshotsMethod::Include)
                .await
            {
                Ok(_) => Ok(()),
                Err(e) if is_missing(&e) => Ok(()),
                Err(e) => Err(err("delete_blob", e)),
            }
        }

        async fn put_object(&self, object: &str, content_type: &str, data: Bytes) -> Result<()> {
            self.client
                .blob_client(object)
                .put_block_blob(data)
                .content_type(content_type.to_string())
                .await
                .map_err(|e| err("put_block_blob", e))?;
            Ok(())
        }

        async fn begin_upload(&self, object: &str, content_type: &str) -> Result<UploadTicket> {
            // Uncommitted blocks are keyed by blob name; there is no upload session.
            Ok(UploadTicket {
                object: object.to_string(),
                content_type: content_type.to_string(),
                upload_id: String::new(),
            })
        }

        async fn stage_block(
            &self,
            ticket: &UploadTicket,
            block: BlockRange,
            data: Bytes,
        ) -> Result<StagedBlock> {
            self.client
                .blob_client(&ticket.object)
                .put_block(BlockId::new(block_id_bytes(block.index).to_vec()), data)
                .await
                .map_err(|e| err("put_block", e))?;
            Ok(StagedBlock {
                index: block.index,
                tag: encode_block_id(block.index),
            })
        }

        async fn commit_blocks(
            &self,
            ticket: &UploadTicket,
            blocks: Vec<StagedBlock>,
        ) -> Result<()> {
            let block_list = BlockList {
                blocks: blocks
                    .iter()
                    .map(|b| {
                        BlobBlockType::new_uncommitted(BlockId::new(
                            block_id_bytes(b.index).to_vec(),
                        ))
                    })
                    .collect(),
            };
            self.client
                .blob_client(&ticket.object)
                .put_block_list(block_list)
                .content_type(ticket.content_type.clone())
                .await
                .map_err(|e| err("put_block_list", e))?;
            Ok(())
        }

        async fn abort_upload(&self, ticket: &UploadTicket) -> Result<()> {
            // Uncommitted blocks are garbage collected by the service.
            debug!(
                "Leaving uncommitted blocks of '{}/{}' to expire",
                self.name, ticket.object
            );
            Ok(())
        }

        async fn read_range(&self, object: &str, block: BlockRange) -> Result<Bytes> {
            let mut buf = BytesMut::with_capacity(block.length as usize);
            let mut chunks = self
                .client
                .blob_client(object)
                .get()
                .range(block.offset..block.end())
                .into_stream();
            while let Some(chunk) = chunks.next().await {
                let chunk = chunk.map_err(|e| {
                    if is_missing(&e) {
                        self.not_found(object)
                    } else {
                        err("get_blob", e)
                    }
                })?;
                let data = chunk.data.collect().await.map_err(|e| err("get_blob", e))?;
                buf.extend_from_slice(&data);
            }
            Ok(buf.freeze())
        }
    }
}

#[cfg(feature = "azure")]
pub use inner::{AzureContainer, AzureService};
