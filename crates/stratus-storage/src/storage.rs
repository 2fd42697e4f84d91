use std::path::Path;
use std::sync::Arc;

use stratus_core::error::{Result, StratusError};
use stratus_core::types::{ProviderType, TransferProperties};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::provider::{ContainerApi, TransferAdapter};
use crate::transfer::{
    self, BlockSink, BlockSource, FileSink, FileSource, TransferReport,
};

/// Per-cloud factory for storage instances.
///
/// Holds the provider's client handle and the transfer defaults that new
/// instances copy at creation.
pub struct StorageProvider {
    api: Arc<dyn ContainerApi>,
    props: TransferProperties,
}

impl std::fmt::Debug for StorageProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageProvider")
            .field("provider", &self.api.provider_type())
            .field("props", &self.props)
            .finish()
    }
}

impl StorageProvider {
    /// Wrap a provider API with its own defaults.
    pub fn new(api: Arc<dyn ContainerApi>) -> Self {
        let props = api.default_properties();
        Self { api, props }
    }

    /// Wrap a provider API with explicit properties.
    pub fn with_properties(api: Arc<dyn ContainerApi>, props: TransferProperties) -> Result<Self> {
        let mut provider = Self::new(api);
        provider.set_properties(props)?;
        Ok(provider)
    }

    pub fn provider_type(&self) -> ProviderType {
        self.api.provider_type()
    }

    pub fn properties(&self) -> TransferProperties {
        self.props
    }

    /// Replace the defaults used by instances created from now on.
    /// Instances that already exist keep their own copy.
    pub fn set_properties(&mut self, props: TransferProperties) -> Result<()> {
        props.validate(self.api.min_block_size())?;
        self.props = props;
        Ok(())
    }

    pub async fn test_connection(&self) -> Result<()> {
        self.api.test_connection().await
    }

    /// Locate container `name`, creating it with private access if absent.
    ///
    /// Only a "not found" answer triggers creation; any other failure of the
    /// existence check is returned as is.
    pub async fn new_instance(&self, name: &str) -> Result<StorageInstance> {
        if self.api.container_exists(name).await? {
            debug!("Reusing existing {} container '{name}'", self.provider_type());
        } else {
            info!(
                "Container '{name}' was not found on {} so creating it with private access",
                self.provider_type()
            );
            self.api.create_container(name).await?;
        }
        Ok(self.instance(name))
    }

    /// Locate container `name` without creating it.
    pub async fn open_instance(&self, name: &str) -> Result<StorageInstance> {
        if !self.api.container_exists(name).await? {
            return Err(StratusError::ContainerNotFound(name.to_string()));
        }
        Ok(self.instance(name))
    }

    /// All containers visible to this provider.
    pub async fn list_instances(&self) -> Result<Vec<StorageInstance>> {
        let names = self.api.list_containers().await?;
        Ok(names.iter().map(|n| self.instance(n)).collect())
    }

    fn instance(&self, name: &str) -> StorageInstance {
        StorageInstance {
            name: name.to_string(),
            api: self.api.clone(),
            adapter: self.api.adapter(name),
            props: self.props,
            cancel: CancellationToken::new(),
        }
    }
}

/// Handle to one bucket or container.
#[derive(Clone)]
pub struct StorageInstance {
    name: String,
    api: Arc<dyn ContainerApi>,
    adapter: Arc<dyn TransferAdapter>,
    props: TransferProperties,
    cancel: CancellationToken,
}

impl std::fmt::Debug for StorageInstance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageInstance")
            .field("name", &self.name)
            .field("provider", &self.api.provider_type())
            .field("props", &self.props)
            .finish()
    }
}

impl StorageInstance {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn properties(&self) -> TransferProperties {
        self.props
    }

    /// A copy of this handle whose transfers stop when `cancel` fires.
    pub fn with_cancellation(&self, cancel: CancellationToken) -> Self {
        Self {
            cancel,
            ..self.clone()
        }
    }

    /// Delete the container and wait until the provider no longer reports it.
    pub async fn delete(&self) -> Result<()> {
        info!("Deleting {} container '{}'", self.api.provider_type(), self.name);
        self.api.delete_container(&self.name).await?;
        self.wait_until_deleted().await
    }

    async fn wait_until_deleted(&self) -> Result<()> {
        let started = Instant::now();
        loop {
            if !self.api.container_exists(&self.name).await? {
                return Ok(());
            }
            let waited = started.elapsed();
            if waited >= self.props.delete_timeout {
                return Err(StratusError::DeleteTimeout {
                    container: self.name.clone(),
                    waited,
                });
            }
            debug!("Waiting for container '{}' to be deleted", self.name);
            tokio::time::sleep(self.props.delete_poll_interval).await;
        }
    }

    pub async fn list_objects(&self, prefix: &str) -> Result<Vec<String>> {
        let objects = self.adapter.list_objects(prefix).await?;
        debug!(
            "Listed {} objects in '{}' under prefix '{prefix}'",
            objects.len(),
            self.name
        );
        Ok(objects)
    }

    pub async fn delete_object(&self, object: &str) -> Result<()> {
        debug!("Deleting object '{object}' in '{}'", self.name);
        self.adapter.delete_object(object).await
    }

    pub async fn object_size(&self, object: &str) -> Result<u64> {
        self.adapter.object_size(object).await
    }

    /// Stream `size` bytes from `reader` into `object`.
    pub async fn upload(
        &self,
        object: &str,
        content_type: &str,
        reader: &mut (dyn AsyncRead + Send + Unpin),
        size: u64,
    ) -> Result<()> {
        debug!(
            "Uploading object '{object}' of size {size} to '{}'",
            self.name
        );
        transfer::upload_stream(
            self.adapter.clone(),
            object,
            content_type,
            reader,
            size,
            &self.props,
            &self.cancel,
        )
        .await
    }

    /// Chunked upload from any positional source.
    pub async fn upload_async(
        &self,
        object: &str,
        content_type: &str,
        source: Arc<dyn BlockSource>,
        size: u64,
    ) -> Result<TransferReport> {
        transfer::upload_blocks(
            self.adapter.clone(),
            object,
            content_type,
            source,
            size,
            &self.props,
            &self.cancel,
        )
        .await
    }

    /// Chunked upload of a local file. Returns the uploaded size.
    pub async fn upload_file(&self, object: &str, content_type: &str, path: &Path) -> Result<u64> {
        let size = tokio::fs::metadata(path).await?.len();
        debug!(
            "Uploading file '{}' as '{object}' ({size} bytes) to '{}'",
            path.display(),
            self.name
        );
        let source = Arc::new(FileSource::new(path));
        self.upload_async(object, content_type, source, size)
            .await?
            .into_result()
    }

    /// Stream `object` into `writer`. Returns the bytes written.
    pub async fn download(
        &self,
        object: &str,
        writer: &mut (dyn AsyncWrite + Send + Unpin),
    ) -> Result<u64> {
        debug!("Downloading object '{object}' from '{}'", self.name);
        transfer::download_stream(self.adapter.clone(), object, writer, &self.props, &self.cancel)
            .await
    }

    /// Chunked download into any positional sink.
    ///
    /// The sink may hold partial data when the report carries failures.
    pub async fn download_async(
        &self,
        object: &str,
        sink: Arc<dyn BlockSink>,
    ) -> Result<TransferReport> {
        transfer::download_blocks(self.adapter.clone(), object, sink, &self.props, &self.cancel)
            .await
    }

    /// Chunked download into a local file. Returns the object size.
    ///
    /// On success the file is truncated to the object size. On failure a
    /// file that already existed is truncated to zero and one created here
    /// is removed, so partial data is never mistaken for the object.
    pub async fn download_file(&self, object: &str, path: &Path) -> Result<u64> {
        debug!(
            "Downloading object '{object}' from '{}' to path '{}'",
            self.name,
            path.display()
        );
        let existed = tokio::fs::metadata(path).await.is_ok();
        let sink = Arc::new(FileSink::create(path)?);

        let outcome = match self.download_async(object, sink.clone()).await {
            Ok(report) => report.into_result(),
            Err(e) => Err(e),
        };

        match outcome {
            Ok(size) => {
                sink.set_len(size)?;
                Ok(size)
            }
            Err(e) => {
                let cleanup = if existed {
                    sink.set_len(0)
                } else {
                    drop(sink);
                    tokio::fs::remove_file(path).await
                };
                if let Err(cleanup_err) = cleanup {
                    warn!(
                        "Failed to clean up '{}' after failed download: {cleanup_err}",
                        path.display()
                    );
                }
                Err(e)
            }
        }
    }
}
