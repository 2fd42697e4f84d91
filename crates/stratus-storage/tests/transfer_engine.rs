/// End-to-end tests of the chunked transfer engine against the local store.
///
/// A fault-injecting adapter wraps the local adapter to fail chosen blocks.
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use bytes::Bytes;
use stratus_core::error::{Result, StratusError};
use stratus_core::types::{BlockRange, ProviderType, TransferProperties};
use stratus_storage::local::LocalService;
use stratus_storage::transfer::MemorySink;
use stratus_storage::{
    ContainerApi, StagedBlock, StorageProvider, TransferAdapter, UploadTicket,
};
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

const BLOCK: u64 = 1024;

fn props() -> TransferProperties {
    TransferProperties::new(BLOCK, 3)
}

fn payload(len: u64) -> Bytes {
    (0..len).map(|i| (i * 31 % 251) as u8).collect::<Vec<u8>>().into()
}

fn local_provider(root: &Path) -> StorageProvider {
    let api = Arc::new(LocalService::new(root).unwrap());
    StorageProvider::with_properties(api, props()).unwrap()
}

// ── Fault injection ────────────────────────────────────────

/// Faults injected around the local adapter.
#[derive(Clone, Default)]
struct Faults {
    /// Block index that fails on stage and on read.
    fail_index: Option<usize>,
    fail_commit: bool,
    /// Block limit reported to the engine.
    max_blocks: Option<usize>,
    /// Fired once blocks 0 and 1 are staged. Later blocks stall until then.
    cancel_after_two_blocks: Option<CancellationToken>,
    stages: Arc<AtomicUsize>,
    aborts: Arc<AtomicUsize>,
}

/// Local adapter with injected faults.
struct FaultyAdapter {
    inner: Arc<dyn TransferAdapter>,
    faults: Faults,
}

impl FaultyAdapter {
    fn injected(&self, block: BlockRange) -> Result<()> {
        if self.faults.fail_index == Some(block.index) {
            return Err(StratusError::provider(
                ProviderType::Local,
                "injected",
                format!("fault on block {}", block.index),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl TransferAdapter for FaultyAdapter {
    fn container(&self) -> &str {
        self.inner.container()
    }
    fn max_blocks(&self) -> Option<usize> {
        self.faults.max_blocks
    }
    async fn list_objects(&self, prefix: &str) -> Result<Vec<String>> {
        self.inner.list_objects(prefix).await
    }
    async fn object_size(&self, object: &str) -> Result<u64> {
        self.inner.object_size(object).await
    }
    async fn delete_object(&self, object: &str) -> Result<()> {
        self.inner.delete_object(object).await
    }
    async fn put_object(&self, object: &str, content_type: &str, data: Bytes) -> Result<()> {
        self.inner.put_object(object, content_type, data).await
    }
    async fn begin_upload(&self, object: &str, content_type: &str) -> Result<UploadTicket> {
        self.inner.begin_upload(object, content_type).await
    }
    async fn stage_block(
        &self,
        ticket: &UploadTicket,
        block: BlockRange,
        data: Bytes,
    ) -> Result<StagedBlock> {
        self.injected(block)?;
        if let Some(token) = &self.faults.cancel_after_two_blocks {
            if block.index > 1 {
                token.cancelled().await;
            }
        }
        let staged = self.inner.stage_block(ticket, block, data).await?;
        self.faults.stages.fetch_add(1, Ordering::SeqCst);
        if let Some(token) = &self.faults.cancel_after_two_blocks {
            if block.index == 1 {
                while self.faults.stages.load(Ordering::SeqCst) < 2 {
                    tokio::task::yield_now().await;
                }
                token.cancel();
            }
        }
        Ok(staged)
    }
    async fn commit_blocks(&self, ticket: &UploadTicket, blocks: Vec<StagedBlock>) -> Result<()> {
        if self.faults.fail_commit {
            return Err(StratusError::provider(
                ProviderType::Local,
                "injected",
                "commit rejected",
            ));
        }
        self.inner.commit_blocks(ticket, blocks).await
    }
    async fn abort_upload(&self, ticket: &UploadTicket) -> Result<()> {
        self.faults.aborts.fetch_add(1, Ordering::SeqCst);
        self.inner.abort_upload(ticket).await
    }
    async fn read_range(&self, object: &str, block: BlockRange) -> Result<Bytes> {
        self.injected(block)?;
        self.inner.read_range(object, block).await
    }
}

struct FaultyApi {
    inner: LocalService,
    faults: Faults,
}

#[async_trait]
impl ContainerApi for FaultyApi {
    fn provider_type(&self) -> ProviderType {
        ProviderType::Local
    }
    fn default_properties(&self) -> TransferProperties {
        props()
    }
    async fn container_exists(&self, name: &str) -> Result<bool> {
        self.inner.container_exists(name).await
    }
    async fn create_container(&self, name: &str) -> Result<()> {
        self.inner.create_container(name).await
    }
    async fn delete_container(&self, name: &str) -> Result<()> {
        self.inner.delete_container(name).await
    }
    async fn list_containers(&self) -> Result<Vec<String>> {
        self.inner.list_containers().await
    }
    fn adapter(&self, container: &str) -> Arc<dyn TransferAdapter> {
        Arc::new(FaultyAdapter {
            inner: self.inner.adapter(container),
            faults: self.faults.clone(),
        })
    }
}

fn injected_provider(root: &Path, faults: Faults) -> StorageProvider {
    StorageProvider::new(Arc::new(FaultyApi {
        inner: LocalService::new(root).unwrap(),
        faults,
    }))
}

fn faulty_provider(root: &Path, fail_index: usize) -> StorageProvider {
    injected_provider(
        root,
        Faults {
            fail_index: Some(fail_index),
            ..Default::default()
        },
    )
}

/// Uploads still staged for `container` under the local store at `root`.
fn staged_uploads(root: &Path, container: &str) -> usize {
    match std::fs::read_dir(root.join(".stratus-staging").join(container)) {
        Ok(entries) => entries.count(),
        Err(_) => 0,
    }
}

// ── Round trips ────────────────────────────────────────────

#[tokio::test]
async fn chunked_round_trip_across_block_boundaries() {
    let tmp = TempDir::new().unwrap();
    let provider = local_provider(tmp.path());
    let instance = provider.new_instance("roundtrip").await.unwrap();

    for size in [0, 1, BLOCK - 1, BLOCK, BLOCK + 1, 3 * BLOCK, 5 * BLOCK + 17] {
        let name = format!("obj-{size}");
        let data = payload(size);

        let report = instance
            .upload_async(&name, "application/octet-stream", Arc::new(data.clone()), size)
            .await
            .unwrap();
        assert!(report.is_success(), "upload of {size} bytes");
        assert_eq!(report.block_count(), size.div_ceil(BLOCK) as usize);
        assert_eq!(instance.object_size(&name).await.unwrap(), size);

        let sink = Arc::new(MemorySink::new());
        let report = instance.download_async(&name, sink.clone()).await.unwrap();
        assert_eq!(report.into_result().unwrap(), size);
        assert_eq!(sink.to_vec(), data.to_vec(), "download of {size} bytes");
    }
}

#[tokio::test]
async fn file_round_trip() {
    let tmp = TempDir::new().unwrap();
    let provider = local_provider(&tmp.path().join("store"));
    let instance = provider.new_instance("files").await.unwrap();

    let data = payload(4 * BLOCK + 100);
    let src = tmp.path().join("src.bin");
    let dest = tmp.path().join("dest.bin");
    std::fs::write(&src, &data).unwrap();
    // Stale content longer than the object must not survive.
    std::fs::write(&dest, vec![0xffu8; 8 * BLOCK as usize]).unwrap();

    let uploaded = instance.upload_file("nested/file.bin", "", &src).await.unwrap();
    assert_eq!(uploaded, data.len() as u64);

    let downloaded = instance.download_file("nested/file.bin", &dest).await.unwrap();
    assert_eq!(downloaded, data.len() as u64);
    assert_eq!(std::fs::read(&dest).unwrap(), data.to_vec());
}

#[tokio::test]
async fn streaming_round_trip() {
    let tmp = TempDir::new().unwrap();
    let provider = local_provider(tmp.path());
    let instance = provider.new_instance("stream").await.unwrap();

    for size in [0, 10, BLOCK, 7 * BLOCK + 3] {
        let name = format!("stream-{size}");
        let data = payload(size);

        let mut reader: &[u8] = &data;
        instance
            .upload(&name, "text/plain", &mut reader, size)
            .await
            .unwrap();

        let mut out: Vec<u8> = Vec::new();
        let written = instance.download(&name, &mut out).await.unwrap();
        assert_eq!(written, size);
        assert_eq!(out, data.to_vec());
    }
}

#[tokio::test]
async fn streaming_upload_rejects_short_reader() {
    let tmp = TempDir::new().unwrap();
    let provider = local_provider(tmp.path());
    let instance = provider.new_instance("short").await.unwrap();

    let data = payload(2 * BLOCK);
    let mut reader: &[u8] = &data;
    let err = instance
        .upload("short", "", &mut reader, 3 * BLOCK)
        .await
        .unwrap_err();
    assert!(matches!(err, StratusError::Io(_)));
    assert!(instance.object_size("short").await.unwrap_err().is_not_found());
}

#[tokio::test]
async fn concurrent_downloads_are_identical() {
    let tmp = TempDir::new().unwrap();
    let provider = local_provider(tmp.path());
    let instance = provider.new_instance("shared").await.unwrap();

    let data = payload(9 * BLOCK + 5);
    instance
        .upload_async("big", "", Arc::new(data.clone()), data.len() as u64)
        .await
        .unwrap()
        .into_result()
        .unwrap();

    let a = Arc::new(MemorySink::new());
    let b = Arc::new(MemorySink::new());
    let (ra, rb) = tokio::join!(
        instance.download_async("big", a.clone()),
        instance.download_async("big", b.clone()),
    );
    ra.unwrap().into_result().unwrap();
    rb.unwrap().into_result().unwrap();

    assert_eq!(a.to_vec(), b.to_vec());
    assert_eq!(a.to_vec(), data.to_vec());
}

// ── Failures ───────────────────────────────────────────────

#[tokio::test]
async fn failed_block_fails_upload_and_commits_nothing() {
    let tmp = TempDir::new().unwrap();
    let provider = faulty_provider(tmp.path(), 2);
    let instance = provider.new_instance("faulty").await.unwrap();

    let data = payload(5 * BLOCK);
    let report = instance
        .upload_async("obj", "", Arc::new(data), 5 * BLOCK)
        .await
        .unwrap();

    assert_eq!(report.block_count(), 5);
    for (i, slot) in report.block_errors.iter().enumerate() {
        assert_eq!(slot.is_some(), i == 2, "slot {i}");
    }
    assert_eq!(report.transferred, 4 * BLOCK);

    match report.into_result() {
        Err(StratusError::BlocksFailed { failed, total, .. }) => {
            assert_eq!((failed, total), (1, 5));
        }
        other => panic!("expected aggregate failure, got {other:?}"),
    }
    assert!(instance.object_size("obj").await.unwrap_err().is_not_found());
    assert!(instance.list_objects("").await.unwrap().is_empty());
}

#[tokio::test]
async fn failed_block_fails_download_but_others_land() {
    let tmp = TempDir::new().unwrap();
    let data = payload(5 * BLOCK);

    let healthy = local_provider(tmp.path()).new_instance("mixed").await.unwrap();
    healthy
        .upload_async("obj", "", Arc::new(data.clone()), 5 * BLOCK)
        .await
        .unwrap()
        .into_result()
        .unwrap();

    let faulty = faulty_provider(tmp.path(), 2).new_instance("mixed").await.unwrap();
    let sink = Arc::new(MemorySink::new());
    let report = faulty.download_async("obj", sink.clone()).await.unwrap();

    assert!(!report.is_success());
    assert_eq!(report.failed_blocks().count(), 1);
    assert_eq!(report.failed_blocks().next().unwrap().block.index, 2);

    let got = sink.to_vec();
    for i in [0u64, 1, 3, 4] {
        let range = (i * BLOCK) as usize..((i + 1) * BLOCK) as usize;
        assert_eq!(got[range.clone()], data[range], "block {i}");
    }
}

#[tokio::test]
async fn failed_file_download_truncates_destination() {
    let tmp = TempDir::new().unwrap();
    let data = payload(5 * BLOCK);

    local_provider(tmp.path())
        .new_instance("trunc")
        .await
        .unwrap()
        .upload_async("obj", "", Arc::new(data), 5 * BLOCK)
        .await
        .unwrap()
        .into_result()
        .unwrap();

    let dest = tmp.path().join("out.bin");
    std::fs::write(&dest, b"previous contents").unwrap();

    let faulty = faulty_provider(tmp.path(), 2).new_instance("trunc").await.unwrap();
    assert!(faulty.download_file("obj", &dest).await.is_err());
    assert_eq!(std::fs::metadata(&dest).unwrap().len(), 0);
}

#[tokio::test]
async fn missing_object_download_is_not_found() {
    let tmp = TempDir::new().unwrap();
    let instance = local_provider(tmp.path()).new_instance("empty").await.unwrap();
    let sink = Arc::new(MemorySink::new());
    let err = instance.download_async("ghost", sink).await.unwrap_err();
    assert!(matches!(err, StratusError::ObjectNotFound { .. }));
}

#[tokio::test]
async fn cancelled_upload_commits_nothing() {
    let tmp = TempDir::new().unwrap();
    let instance = local_provider(tmp.path()).new_instance("cancel").await.unwrap();

    let token = CancellationToken::new();
    token.cancel();
    let cancelled = instance.with_cancellation(token);

    let src = tmp.path().join("src.bin");
    std::fs::write(&src, payload(4 * BLOCK)).unwrap();

    let err = cancelled.upload_file("obj", "", &src).await.unwrap_err();
    assert!(matches!(err, StratusError::Cancelled));
    assert!(instance.object_size("obj").await.unwrap_err().is_not_found());
}

#[tokio::test]
async fn missing_object_file_download_leaves_no_file() {
    let tmp = TempDir::new().unwrap();
    let instance = local_provider(tmp.path()).new_instance("empty").await.unwrap();
    let dest = tmp.path().join("ghost.bin");

    let err = instance.download_file("ghost", &dest).await.unwrap_err();
    assert!(err.is_not_found());
    assert!(!dest.exists());
}

#[tokio::test]
async fn cancellation_mid_transfer_commits_nothing() {
    let tmp = TempDir::new().unwrap();
    let token = CancellationToken::new();
    let faults = Faults {
        cancel_after_two_blocks: Some(token.clone()),
        ..Default::default()
    };
    let provider = injected_provider(tmp.path(), faults.clone());
    let instance = provider
        .new_instance("midway")
        .await
        .unwrap()
        .with_cancellation(token.clone());

    let report = instance
        .upload_async("obj", "", Arc::new(payload(6 * BLOCK)), 6 * BLOCK)
        .await
        .unwrap();

    assert!(token.is_cancelled());
    assert_eq!(faults.stages.load(Ordering::SeqCst), 2);
    assert_eq!(report.failed_blocks().count(), 4);
    assert!(matches!(report.into_result(), Err(StratusError::Cancelled)));
    assert!(faults.aborts.load(Ordering::SeqCst) >= 1);
    assert!(instance.object_size("obj").await.unwrap_err().is_not_found());
    assert_eq!(staged_uploads(tmp.path(), "midway"), 0);
}

#[tokio::test]
async fn failed_commit_aborts_staged_blocks() {
    let tmp = TempDir::new().unwrap();
    let faults = Faults {
        fail_commit: true,
        ..Default::default()
    };
    let instance = injected_provider(tmp.path(), faults.clone())
        .new_instance("commit")
        .await
        .unwrap();

    let err = instance
        .upload_async("chunked", "", Arc::new(payload(4 * BLOCK)), 4 * BLOCK)
        .await
        .unwrap_err();
    assert!(matches!(err, StratusError::Provider { .. }));
    assert_eq!(faults.aborts.load(Ordering::SeqCst), 1);

    let data = payload(3 * BLOCK);
    let mut reader: &[u8] = &data;
    let err = instance
        .upload("streamed", "", &mut reader, 3 * BLOCK)
        .await
        .unwrap_err();
    assert!(matches!(err, StratusError::Provider { .. }));
    assert_eq!(faults.aborts.load(Ordering::SeqCst), 2);

    assert!(instance.list_objects("").await.unwrap().is_empty());
    assert_eq!(staged_uploads(tmp.path(), "commit"), 0);
}

#[tokio::test]
async fn block_limit_grows_block_size() {
    let tmp = TempDir::new().unwrap();
    let faults = Faults {
        max_blocks: Some(2),
        ..Default::default()
    };
    let instance = injected_provider(tmp.path(), faults.clone())
        .new_instance("limited")
        .await
        .unwrap();

    let data = payload(5 * BLOCK);
    let report = instance
        .upload_async("chunked", "", Arc::new(data.clone()), 5 * BLOCK)
        .await
        .unwrap();
    assert_eq!(report.block_count(), 2);
    report.into_result().unwrap();
    assert_eq!(faults.stages.load(Ordering::SeqCst), 2);

    let streamed = payload(7 * BLOCK + 3);
    let mut reader: &[u8] = &streamed;
    instance
        .upload("streamed", "", &mut reader, 7 * BLOCK + 3)
        .await
        .unwrap();
    assert_eq!(faults.stages.load(Ordering::SeqCst), 4);

    let sink = Arc::new(MemorySink::new());
    instance
        .download_async("chunked", sink.clone())
        .await
        .unwrap()
        .into_result()
        .unwrap();
    assert_eq!(sink.to_vec(), data.to_vec());

    let mut out = Vec::new();
    instance.download("streamed", &mut out).await.unwrap();
    assert_eq!(out, streamed.to_vec());
}

// ── Lifecycle ──────────────────────────────────────────────

#[tokio::test]
async fn new_instance_is_idempotent() {
    let tmp = TempDir::new().unwrap();
    let provider = local_provider(tmp.path());

    let first = provider.new_instance("alpha").await.unwrap();
    first
        .upload_async("keep", "", Arc::new(payload(10)), 10)
        .await
        .unwrap();

    let second = provider.new_instance("alpha").await.unwrap();
    assert_eq!(second.name(), "alpha");
    assert_eq!(second.object_size("keep").await.unwrap(), 10);

    let names: Vec<String> = provider
        .list_instances()
        .await
        .unwrap()
        .iter()
        .map(|i| i.name().to_string())
        .collect();
    assert_eq!(names, vec!["alpha"]);
}

#[tokio::test]
async fn deleted_instance_is_not_listed() {
    let tmp = TempDir::new().unwrap();
    let provider = local_provider(tmp.path());

    provider.new_instance("keep").await.unwrap();
    let doomed = provider.new_instance("doomed").await.unwrap();
    doomed
        .upload_async("obj", "", Arc::new(payload(3 * BLOCK)), 3 * BLOCK)
        .await
        .unwrap();

    doomed.delete().await.unwrap();

    let names: Vec<String> = provider
        .list_instances()
        .await
        .unwrap()
        .iter()
        .map(|i| i.name().to_string())
        .collect();
    assert_eq!(names, vec!["keep"]);
}

#[tokio::test]
async fn listing_follows_every_page() {
    let tmp = TempDir::new().unwrap();
    let api = Arc::new(LocalService::new(tmp.path()).unwrap().with_page_size(3));
    let provider = StorageProvider::with_properties(api, props()).unwrap();
    let instance = provider.new_instance("paged").await.unwrap();

    let mut expected = Vec::new();
    for i in 0..10 {
        let name = format!("logs/{i:02}");
        instance
            .upload_async(&name, "", Arc::new(payload(1)), 1)
            .await
            .unwrap();
        expected.push(name);
    }
    instance
        .upload_async("other", "", Arc::new(payload(1)), 1)
        .await
        .unwrap();

    assert_eq!(instance.list_objects("logs/").await.unwrap(), expected);
    assert_eq!(instance.list_objects("").await.unwrap().len(), 11);

    instance.delete_object("logs/00").await.unwrap();
    assert_eq!(instance.list_objects("logs/").await.unwrap().len(), 9);
}

#[tokio::test]
async fn property_changes_leave_live_instances_alone() {
    let tmp = TempDir::new().unwrap();
    let mut provider = local_provider(tmp.path());
    let live = provider.new_instance("props").await.unwrap();

    provider.set_properties(props().with_block_size(4 * BLOCK)).unwrap();

    assert_eq!(live.properties().block_size, BLOCK);
    let fresh = provider.new_instance("props").await.unwrap();
    assert_eq!(fresh.properties().block_size, 4 * BLOCK);
}
