use std::io::{ErrorKind, SeekFrom};
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use stratus_core::error::{Result, StratusError};
use stratus_core::plan::encode_block_id;
use stratus_core::types::{BlockRange, MIB, ProviderType, TransferProperties};
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt};
use tracing::debug;
use uuid::Uuid;

use crate::provider::{ContainerApi, StagedBlock, TransferAdapter, UploadTicket};

const STAGING_DIR: &str = ".stratus-staging";
const DEFAULT_PAGE_SIZE: usize = 1000;

/// Filesystem-backed store for development and tests.
///
/// Each container is a directory under `root`. Staged blocks live under
/// `root/.stratus-staging` until committed.
pub struct LocalService {
    root: PathBuf,
    page_size: usize,
}

impl LocalService {
    pub fn new(root: &Path) -> Result<Self> {
        std::fs::create_dir_all(root)?;
        Ok(Self {
            root: root.to_path_buf(),
            page_size: DEFAULT_PAGE_SIZE,
        })
    }

    /// Number of names returned per internal listing page.
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    fn container_path(&self, name: &str) -> Result<PathBuf> {
        validate_container_name(name)?;
        Ok(self.root.join(name))
    }

    fn staging_path(&self, name: &str) -> PathBuf {
        self.root.join(STAGING_DIR).join(name)
    }
}

fn validate_container_name(name: &str) -> Result<()> {
    let valid = !name.is_empty()
        && !name.starts_with('.')
        && !name.contains(['/', '\\'])
        && name != "..";
    if valid {
        Ok(())
    } else {
        Err(StratusError::InvalidName(name.to_string()))
    }
}

async fn is_dir(path: &Path) -> bool {
    tokio::fs::metadata(path)
        .await
        .is_ok_and(|meta| meta.is_dir())
}

/// Object names are relative paths with no parent or root components.
fn object_relative_path(object: &str) -> Result<PathBuf> {
    let path = Path::new(object);
    let valid = !object.is_empty()
        && !object.ends_with('/')
        && path.components().all(|c| matches!(c, Component::Normal(_)));
    if valid {
        Ok(path.to_path_buf())
    } else {
        Err(StratusError::InvalidName(object.to_string()))
    }
}

#[async_trait]
impl ContainerApi for LocalService {
    fn provider_type(&self) -> ProviderType {
        ProviderType::Local
    }

    fn default_properties(&self) -> TransferProperties {
        TransferProperties::new(4 * MIB, 4)
    }

    async fn container_exists(&self, name: &str) -> Result<bool> {
        let path = self.container_path(name)?;
        match tokio::fs::metadata(&path).await {
            Ok(meta) => Ok(meta.is_dir()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn create_container(&self, name: &str) -> Result<()> {
        let path = self.container_path(name)?;
        tokio::fs::create_dir_all(&path).await?;
        debug!("Created local container at {}", path.display());
        Ok(())
    }

    async fn delete_container(&self, name: &str) -> Result<()> {
        let path = self.container_path(name)?;
        match tokio::fs::remove_dir_all(&path).await {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(StratusError::ContainerNotFound(name.to_string()));
            }
            Err(e) => return Err(e.into()),
        }
        let staging = self.staging_path(name);
        if tokio::fs::metadata(&staging).await.is_ok() {
            tokio::fs::remove_dir_all(&staging).await?;
        }
        Ok(())
    }

    async fn list_containers(&self) -> Result<Vec<String>> {
        let mut names = Vec::new();
        let mut entries = tokio::fs::read_dir(&self.root).await?;
        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_dir() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            if !name.starts_with('.') {
                names.push(name);
            }
        }
        names.sort();
        Ok(names)
    }

    fn adapter(&self, container: &str) -> Arc<dyn TransferAdapter> {
        Arc::new(LocalContainer {
            name: container.to_string(),
            path: self.root.join(container),
            staging: self.staging_path(container),
            page_size: self.page_size,
        })
    }

    async fn test_connection(&self) -> Result<()> {
        if !is_dir(&self.root).await {
            return Err(StratusError::Config(format!(
                "Local root does not exist: {}",
                self.root.display()
            )));
        }
        Ok(())
    }
}

/// One local container directory.
pub struct LocalContainer {
    name: String,
    path: PathBuf,
    staging: PathBuf,
    page_size: usize,
}

impl LocalContainer {
    fn object_path(&self, object: &str) -> Result<PathBuf> {
        validate_container_name(&self.name)?;
        Ok(self.path.join(object_relative_path(object)?))
    }

    fn upload_dir(&self, ticket: &UploadTicket) -> PathBuf {
        self.staging.join(&ticket.upload_id)
    }

    /// Map a filesystem error on `object` to the store's error taxonomy.
    async fn map_io(&self, object: &str, e: std::io::Error) -> StratusError {
        if e.kind() != ErrorKind::NotFound {
            return e.into();
        }
        if is_dir(&self.path).await {
            StratusError::ObjectNotFound {
                container: self.name.clone(),
                object: object.to_string(),
            }
        } else {
            StratusError::ContainerNotFound(self.name.clone())
        }
    }

    /// One page of names under `prefix`, strictly after `marker`.
    async fn list_page(
        &self,
        prefix: &str,
        marker: Option<&str>,
    ) -> Result<(Vec<String>, Option<String>)> {
        let mut all = match walk(&self.path).await {
            Ok(all) => all,
            Err(e) => return Err(self.map_io(prefix, e).await),
        };
        all.retain(|name| name.starts_with(prefix) && marker.is_none_or(|m| name.as_str() > m));
        all.sort();

        let next = if all.len() > self.page_size {
            all.truncate(self.page_size);
            all.last().cloned()
        } else {
            None
        };
        Ok((all, next))
    }

    /// Write `data` to a temp file and rename it over `dest`.
    async fn write_atomic(&self, object: &str, dest: &Path, data: &[u8]) -> Result<()> {
        tokio::fs::create_dir_all(&self.staging).await?;
        let tmp = self.staging.join(format!("{}.tmp", Uuid::now_v7()));
        tokio::fs::write(&tmp, data).await?;
        self.publish(object, &tmp, dest).await
    }

    async fn publish(&self, object: &str, tmp: &Path, dest: &Path) -> Result<()> {
        if !is_dir(&self.path).await {
            let _ = tokio::fs::remove_file(tmp).await;
            return Err(StratusError::ContainerNotFound(self.name.clone()));
        }
        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        match tokio::fs::rename(tmp, dest).await {
            Ok(()) => Ok(()),
            Err(e) => Err(self.map_io(object, e).await),
        }
    }
}

/// Relative `/`-separated names of every file below `dir`.
async fn walk(dir: &Path) -> std::io::Result<Vec<String>> {
    let mut names = Vec::new();
    let mut pending = vec![(dir.to_path_buf(), String::new())];

    while let Some((path, rel)) = pending.pop() {
        let mut entries = tokio::fs::read_dir(&path).await?;
        while let Some(entry) = entries.next_entry().await? {
            let file_name = entry.file_name().to_string_lossy().into_owned();
            let name = if rel.is_empty() {
                file_name
            } else {
                format!("{rel}/{file_name}")
            };
            if entry.file_type().await?.is_dir() {
                pending.push((entry.path(), name));
            } else {
                names.push(name);
            }
        }
    }
    Ok(names)
}

#[async_trait]
impl TransferAdapter for LocalContainer {
    fn container(&self) -> &str {
        &self.name
    }

    async fn list_objects(&self, prefix: &str) -> Result<Vec<String>> {
        let mut objects = Vec::new();
        let mut marker: Option<String> = None;
        loop {
            let (page, next) = self.list_page(prefix, marker.as_deref()).await?;
            objects.extend(page);
            match next {
                Some(m) => marker = Some(m),
                None => break,
            }
        }
        Ok(objects)
    }

    async fn object_size(&self, object: &str) -> Result<u64> {
        let path = self.object_path(object)?;
        let meta = match tokio::fs::metadata(&path).await {
            Ok(meta) if meta.is_file() => meta,
            Ok(_) => return Err(self.map_io(object, ErrorKind::NotFound.into()).await),
            Err(e) => return Err(self.map_io(object, e).await),
        };
        Ok(meta.len())
    }

    async fn delete_object(&self, object: &str) -> Result<()> {
        let path = self.object_path(object)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) => match self.map_io(object, e).await {
                StratusError::ObjectNotFound { .. } => Ok(()),
                other => Err(other),
            },
        }
    }

    async fn put_object(&self, object: &str, _content_type: &str, data: Bytes) -> Result<()> {
        let dest = self.object_path(object)?;
        self.write_atomic(object, &dest, &data).await
    }

    async fn begin_upload(&self, object: &str, content_type: &str) -> Result<UploadTicket> {
        self.object_path(object)?;
        if !is_dir(&self.path).await {
            return Err(StratusError::ContainerNotFound(self.name.clone()));
        }
        let ticket = UploadTicket {
            object: object.to_string(),
            content_type: content_type.to_string(),
            upload_id: Uuid::now_v7().to_string(),
        };
        tokio::fs::create_dir_all(self.upload_dir(&ticket)).await?;
        Ok(ticket)
    }

    async fn stage_block(
        &self,
        ticket: &UploadTicket,
        block: BlockRange,
        data: Bytes,
    ) -> Result<StagedBlock> {
        let tag = encode_block_id(block.index);
        tokio::fs::write(self.upload_dir(ticket).join(&tag), &data).await?;
        Ok(StagedBlock {
            index: block.index,
            tag,
        })
    }

    async fn commit_blocks(&self, ticket: &UploadTicket, blocks: Vec<StagedBlock>) -> Result<()> {
        let upload_dir = self.upload_dir(ticket);
        let assembled = upload_dir.join("assembled");
        let mut out = tokio::fs::File::create(&assembled).await?;
        for block in &blocks {
            let mut part = tokio::fs::File::open(upload_dir.join(&block.tag)).await?;
            tokio::io::copy(&mut part, &mut out).await?;
        }
        out.flush().await?;
        drop(out);

        let dest = self.object_path(&ticket.object)?;
        self.publish(&ticket.object, &assembled, &dest).await?;
        tokio::fs::remove_dir_all(&upload_dir).await?;
        debug!(
            "Committed {} blocks into '{}/{}'",
            blocks.len(),
            self.name,
            ticket.object
        );
        Ok(())
    }

    async fn abort_upload(&self, ticket: &UploadTicket) -> Result<()> {
        match tokio::fs::remove_dir_all(self.upload_dir(ticket)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn read_range(&self, object: &str, block: BlockRange) -> Result<Bytes> {
        let path = self.object_path(object)?;
        let mut file = match tokio::fs::File::open(&path).await {
            Ok(file) => file,
            Err(e) => return Err(self.map_io(object, e).await),
        };
        file.seek(SeekFrom::Start(block.offset)).await?;
        let mut buf = vec![0u8; block.length as usize];
        file.read_exact(&mut buf).await?;
        Ok(Bytes::from(buf))
    }
}
