//! Concurrent block transfer engine.
//!
//! Objects are split into fixed-size blocks by [`plan`]. Each block moves in
//! its own tokio task, at most `concurrency` at a time, and every task is
//! joined before a result is produced. Failures are captured per block and
//! folded into a [`TransferReport`].

use std::future::Future;
use std::io::SeekFrom;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use stratus_core::error::{Result, StratusError};
use stratus_core::plan::{block_count, plan};
use stratus_core::types::{BlockRange, TransferProperties};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncSeekExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::provider::{StagedBlock, TransferAdapter, UploadTicket};

/// Failures listed by name in an aggregate error message.
const MAX_REPORTED_FAILURES: usize = 5;

// ── Sources and sinks ──────────────────────────────────────

/// Position-addressable input for chunked uploads.
#[async_trait]
pub trait BlockSource: Send + Sync {
    async fn read_block(&self, block: BlockRange) -> std::io::Result<Bytes>;
}

/// Position-addressable output for chunked downloads.
///
/// Blocks complete out of order, so writes at disjoint offsets must be safe
/// to run concurrently.
#[async_trait]
pub trait BlockSink: Send + Sync {
    async fn write_block(&self, offset: u64, data: Bytes) -> std::io::Result<()>;
}

/// Reads blocks from a local file. Each read opens its own handle, so
/// concurrent reads never share a cursor.
pub struct FileSource {
    path: PathBuf,
}

impl FileSource {
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
        }
    }
}

#[async_trait]
impl BlockSource for FileSource {
    async fn read_block(&self, block: BlockRange) -> std::io::Result<Bytes> {
        let mut file = tokio::fs::File::open(&self.path).await?;
        file.seek(SeekFrom::Start(block.offset)).await?;
        let mut buf = vec![0u8; block.length as usize];
        file.read_exact(&mut buf).await?;
        Ok(Bytes::from(buf))
    }
}

#[async_trait]
impl BlockSource for Bytes {
    async fn read_block(&self, block: BlockRange) -> std::io::Result<Bytes> {
        let end = block.end() as usize;
        if end > self.len() {
            return Err(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                format!("{block} is past the end of a {} byte buffer", self.len()),
            ));
        }
        Ok(self.slice(block.offset as usize..end))
    }
}

/// Writes blocks into a local file with positional writes.
pub struct FileSink {
    file: Arc<std::fs::File>,
}

impl FileSink {
    /// Open (or create) `path` for positional writes without truncating it.
    pub fn create(path: &Path) -> std::io::Result<Self> {
        let file = std::fs::OpenOptions::new()
            .create(true)
            .truncate(false)
            .read(true)
            .write(true)
            .open(path)?;
        Ok(Self {
            file: Arc::new(file),
        })
    }

    /// Truncate or extend the file to `size` bytes.
    pub fn set_len(&self, size: u64) -> std::io::Result<()> {
        self.file.set_len(size)
    }
}

#[async_trait]
impl BlockSink for FileSink {
    async fn write_block(&self, offset: u64, data: Bytes) -> std::io::Result<()> {
        let file = self.file.clone();
        tokio::task::spawn_blocking(move || write_all_at(&file, &data, offset))
            .await
            .map_err(std::io::Error::other)?
    }
}

#[cfg(unix)]
fn write_all_at(file: &std::fs::File, data: &[u8], offset: u64) -> std::io::Result<()> {
    use std::os::unix::fs::FileExt;
    file.write_all_at(data, offset)
}

#[cfg(windows)]
fn write_all_at(file: &std::fs::File, mut data: &[u8], mut offset: u64) -> std::io::Result<()> {
    use std::os::windows::fs::FileExt;
    while !data.is_empty() {
        let n = file.seek_write(data, offset)?;
        if n == 0 {
            return Err(std::io::ErrorKind::WriteZero.into());
        }
        data = &data[n..];
        offset += n as u64;
    }
    Ok(())
}

/// In-memory positional buffer.
#[derive(Default)]
pub struct MemorySink {
    buf: Mutex<Vec<u8>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn into_inner(self) -> Vec<u8> {
        self.buf.into_inner().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Copy of the current contents.
    pub fn to_vec(&self) -> Vec<u8> {
        match self.buf.lock() {
            Ok(buf) => buf.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

#[async_trait]
impl BlockSink for MemorySink {
    async fn write_block(&self, offset: u64, data: Bytes) -> std::io::Result<()> {
        let mut buf = self
            .buf
            .lock()
            .map_err(|_| std::io::Error::other("memory sink lock poisoned"))?;
        let start = offset as usize;
        let end = start + data.len();
        if buf.len() < end {
            buf.resize(end, 0);
        }
        buf[start..end].copy_from_slice(&data);
        Ok(())
    }
}

// ── Outcomes ───────────────────────────────────────────────

/// A failed block and the error it produced.
#[derive(Debug)]
pub struct BlockError {
    pub block: BlockRange,
    pub error: StratusError,
}

/// Aggregated outcome of a chunked transfer.
#[derive(Debug)]
pub struct TransferReport {
    pub object: String,
    /// Object size in bytes.
    pub size: u64,
    /// Bytes moved by successful blocks.
    pub transferred: u64,
    /// One slot per block, `None` on success.
    pub block_errors: Vec<Option<BlockError>>,
}

impl TransferReport {
    pub fn empty(object: &str) -> Self {
        Self {
            object: object.to_string(),
            size: 0,
            transferred: 0,
            block_errors: Vec::new(),
        }
    }

    pub fn block_count(&self) -> usize {
        self.block_errors.len()
    }

    pub fn failed_blocks(&self) -> impl Iterator<Item = &BlockError> {
        self.block_errors.iter().flatten()
    }

    pub fn is_success(&self) -> bool {
        self.block_errors.iter().all(Option::is_none)
    }

    /// The aggregate error, if any block failed.
    pub fn error(&self) -> Option<StratusError> {
        let failed: Vec<&BlockError> = self.failed_blocks().collect();
        if failed.is_empty() {
            return None;
        }
        if failed
            .iter()
            .all(|f| matches!(f.error, StratusError::Cancelled))
        {
            return Some(StratusError::Cancelled);
        }

        let mut detail = failed
            .iter()
            .take(MAX_REPORTED_FAILURES)
            .map(|f| format!("block {}: {}", f.block.index, f.error))
            .collect::<Vec<_>>()
            .join("; ");
        if failed.len() > MAX_REPORTED_FAILURES {
            detail.push_str("; ...");
        }

        Some(StratusError::BlocksFailed {
            object: self.object.clone(),
            failed: failed.len(),
            total: self.block_count(),
            detail,
        })
    }

    /// Transferred size on success, the aggregate error otherwise.
    pub fn into_result(self) -> Result<u64> {
        match self.error() {
            Some(err) => Err(err),
            None => Ok(self.size),
        }
    }
}

// ── Executor ───────────────────────────────────────────────

/// Per-block values and errors collected by [`BlockPool::join`].
pub struct Joined<T> {
    pub outputs: Vec<Option<T>>,
    pub errors: Vec<Option<BlockError>>,
    pub transferred: u64,
}

/// Bounded set of block tasks.
///
/// A task is only spawned once a semaphore permit is free, so at most
/// `concurrency` blocks (and their buffers) are alive at once.
pub struct BlockPool<T> {
    semaphore: Arc<Semaphore>,
    cancel: CancellationToken,
    tasks: Vec<(BlockRange, JoinHandle<Result<T>>)>,
    skipped: Vec<BlockRange>,
}

impl<T: Send + 'static> BlockPool<T> {
    pub fn new(concurrency: usize, cancel: CancellationToken) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(concurrency.max(1))),
            cancel,
            tasks: Vec::new(),
            skipped: Vec::new(),
        }
    }

    /// Wait for a free slot and start `task` for `block`.
    ///
    /// Returns `false`, recording the block as cancelled, once the
    /// cancellation token has fired.
    pub async fn spawn<F>(&mut self, block: BlockRange, task: F) -> bool
    where
        F: Future<Output = Result<T>> + Send + 'static,
    {
        let permit = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => None,
            permit = self.semaphore.clone().acquire_owned() => permit.ok(),
        };
        let Some(permit) = permit else {
            self.skipped.push(block);
            return false;
        };

        let cancel = self.cancel.clone();
        let handle = tokio::spawn(async move {
            let _permit = permit;
            tokio::select! {
                biased;
                _ = cancel.cancelled() => Err(StratusError::Cancelled),
                result = task => result,
            }
        });
        self.tasks.push((block, handle));
        true
    }

    /// Record a block that will not be started.
    pub fn skip(&mut self, block: BlockRange) {
        self.skipped.push(block);
    }

    /// Wait for every spawned task and collect outcomes by block index.
    pub async fn join(self, block_count: usize) -> Joined<T> {
        let mut outputs: Vec<Option<T>> = (0..block_count).map(|_| None).collect();
        let mut errors: Vec<Option<BlockError>> = (0..block_count).map(|_| None).collect();
        let mut transferred = 0u64;

        for (block, handle) in self.tasks {
            let outcome = match handle.await {
                Ok(result) => result,
                Err(join_err) => Err(StratusError::TaskPanicked(join_err.to_string())),
            };
            match outcome {
                Ok(value) => {
                    transferred += block.length;
                    if let Some(slot) = outputs.get_mut(block.index) {
                        *slot = Some(value);
                    }
                }
                Err(error) => {
                    debug!("{block} failed: {error}");
                    if let Some(slot) = errors.get_mut(block.index) {
                        *slot = Some(BlockError { block, error });
                    }
                }
            }
        }

        for block in self.skipped {
            if let Some(slot) = errors.get_mut(block.index) {
                *slot = Some(BlockError {
                    block,
                    error: StratusError::Cancelled,
                });
            }
        }

        Joined {
            outputs,
            errors,
            transferred,
        }
    }
}

/// Run `op` for every block with bounded concurrency and join them all.
pub async fn run_blocks<T, F, Fut>(
    blocks: &[BlockRange],
    concurrency: usize,
    cancel: &CancellationToken,
    op: F,
) -> Joined<T>
where
    T: Send + 'static,
    F: Fn(BlockRange) -> Fut,
    Fut: Future<Output = Result<T>> + Send + 'static,
{
    let mut pool = BlockPool::new(concurrency, cancel.clone());
    let mut pending = blocks.iter().copied();

    while let Some(block) = pending.next() {
        if !pool.spawn(block, op(block)).await {
            pending.by_ref().for_each(|rest| pool.skip(rest));
            break;
        }
    }

    pool.join(blocks.len()).await
}

// ── Chunked paths ──────────────────────────────────────────

/// Block size for uploading `size` bytes, grown so the plan stays within
/// `max_blocks` when the configured size would exceed it.
pub fn upload_block_size(size: u64, block_size: u64, max_blocks: Option<usize>) -> u64 {
    match max_blocks {
        Some(max) if max > 0 && block_size > 0 && block_count(size, block_size) > max => {
            size.div_ceil(max as u64)
        }
        _ => block_size,
    }
}

fn plan_upload(
    adapter: &dyn TransferAdapter,
    object: &str,
    size: u64,
    props: &TransferProperties,
) -> Result<Vec<BlockRange>> {
    let block_size = upload_block_size(size, props.block_size, adapter.max_blocks());
    if block_size != props.block_size {
        debug!(
            "Growing block size of '{object}' from {} to {block_size} bytes to fit the block limit of '{}'",
            props.block_size,
            adapter.container()
        );
    }
    plan(size, block_size)
}

/// Upload `size` bytes from `source` as staged blocks, committing only if
/// every block succeeded.
///
/// Fatal errors (bad properties, failing begin or commit, cancellation
/// before commit) return `Err`; per-block failures come back in the report.
pub async fn upload_blocks(
    adapter: Arc<dyn TransferAdapter>,
    object: &str,
    content_type: &str,
    source: Arc<dyn BlockSource>,
    size: u64,
    props: &TransferProperties,
    cancel: &CancellationToken,
) -> Result<TransferReport> {
    let blocks = plan_upload(adapter.as_ref(), object, size, props)?;
    if blocks.is_empty() {
        adapter.put_object(object, content_type, Bytes::new()).await?;
        return Ok(TransferReport::empty(object));
    }

    let ticket = Arc::new(adapter.begin_upload(object, content_type).await?);
    debug!(
        "Uploading '{object}' ({size} bytes) to '{}' in {} blocks",
        adapter.container(),
        blocks.len()
    );

    let joined = run_blocks(&blocks, props.concurrency, cancel, |block| {
        let adapter = adapter.clone();
        let source = source.clone();
        let ticket = ticket.clone();
        async move {
            let data = source.read_block(block).await?;
            if data.len() as u64 != block.length {
                return Err(short_block(block, data.len()));
            }
            debug!("Staging {block} of '{}'", ticket.object);
            adapter.stage_block(&ticket, block, data).await
        }
    })
    .await;

    finish_upload(adapter.as_ref(), &ticket, joined, size, cancel).await
}

/// Commit a staged upload if all blocks landed, abort it otherwise.
async fn finish_upload(
    adapter: &dyn TransferAdapter,
    ticket: &UploadTicket,
    joined: Joined<StagedBlock>,
    size: u64,
    cancel: &CancellationToken,
) -> Result<TransferReport> {
    let report = TransferReport {
        object: ticket.object.clone(),
        size,
        transferred: joined.transferred,
        block_errors: joined.errors,
    };

    if !report.is_success() || cancel.is_cancelled() {
        if let Err(e) = adapter.abort_upload(ticket).await {
            warn!("Failed to abort upload of '{}': {e}", ticket.object);
        }
        if report.is_success() {
            return Err(StratusError::Cancelled);
        }
        return Ok(report);
    }

    let staged: Vec<StagedBlock> = joined.outputs.into_iter().flatten().collect();
    debug!("Committing {} blocks of '{}'", staged.len(), ticket.object);
    if let Err(e) = adapter.commit_blocks(ticket, staged).await {
        if let Err(abort_err) = adapter.abort_upload(ticket).await {
            warn!(
                "Failed to abort upload of '{}' after failed commit: {abort_err}",
                ticket.object
            );
        }
        return Err(e);
    }
    Ok(report)
}

/// Download an object into `sink` with one ranged read per block.
pub async fn download_blocks(
    adapter: Arc<dyn TransferAdapter>,
    object: &str,
    sink: Arc<dyn BlockSink>,
    props: &TransferProperties,
    cancel: &CancellationToken,
) -> Result<TransferReport> {
    let size = adapter.object_size(object).await?;
    let blocks = plan(size, props.block_size)?;
    debug!(
        "Downloading '{object}' ({size} bytes) from '{}' in {} blocks",
        adapter.container(),
        blocks.len()
    );

    let name: Arc<str> = Arc::from(object);
    let joined = run_blocks(&blocks, props.concurrency, cancel, |block| {
        let adapter = adapter.clone();
        let sink = sink.clone();
        let name = name.clone();
        async move {
            debug!("Downloading {block} of '{name}'");
            let data = adapter.read_range(&name, block).await?;
            if data.len() as u64 != block.length {
                return Err(short_block(block, data.len()));
            }
            sink.write_block(block.offset, data).await?;
            Ok(())
        }
    })
    .await;

    Ok(TransferReport {
        object: object.to_string(),
        size,
        transferred: joined.transferred,
        block_errors: joined.errors,
    })
}

// ── Streaming paths ────────────────────────────────────────

/// Upload from a sequential reader.
///
/// Objects that fit in one block go up in a single put. Larger ones are read
/// block by block and staged with bounded concurrency while the next block
/// is being read.
pub async fn upload_stream(
    adapter: Arc<dyn TransferAdapter>,
    object: &str,
    content_type: &str,
    reader: &mut (dyn AsyncRead + Send + Unpin),
    size: u64,
    props: &TransferProperties,
    cancel: &CancellationToken,
) -> Result<()> {
    let blocks = plan_upload(adapter.as_ref(), object, size, props)?;
    if blocks.len() <= 1 {
        let mut buf = Vec::with_capacity(size as usize);
        (&mut *reader).take(size).read_to_end(&mut buf).await?;
        if buf.len() as u64 != size {
            return Err(short_read(size, buf.len() as u64));
        }
        return adapter.put_object(object, content_type, Bytes::from(buf)).await;
    }

    let ticket = Arc::new(adapter.begin_upload(object, content_type).await?);
    let mut pool = BlockPool::new(props.concurrency, cancel.clone());
    let mut read_error = None;
    let mut pending = blocks.iter().copied();

    while let Some(block) = pending.next() {
        let mut buf = vec![0u8; block.length as usize];
        if let Err(e) = reader.read_exact(&mut buf).await {
            read_error = Some(e);
            pending.by_ref().for_each(|rest| pool.skip(rest));
            break;
        }

        let adapter = adapter.clone();
        let ticket_ref = ticket.clone();
        let task = async move {
            adapter
                .stage_block(&ticket_ref, block, Bytes::from(buf))
                .await
        };
        if !pool.spawn(block, task).await {
            pending.by_ref().for_each(|rest| pool.skip(rest));
            break;
        }
    }

    let joined = pool.join(blocks.len()).await;
    if let Some(e) = read_error {
        if let Err(abort_err) = adapter.abort_upload(&ticket).await {
            warn!("Failed to abort upload of '{object}': {abort_err}");
        }
        return Err(e.into());
    }

    finish_upload(adapter.as_ref(), &ticket, joined, size, cancel)
        .await?
        .into_result()
        .map(|_| ())
}

/// Download into a sequential writer, keeping up to `concurrency` ranged
/// reads in flight and writing them back in order.
pub async fn download_stream(
    adapter: Arc<dyn TransferAdapter>,
    object: &str,
    writer: &mut (dyn AsyncWrite + Send + Unpin),
    props: &TransferProperties,
    cancel: &CancellationToken,
) -> Result<u64> {
    let size = adapter.object_size(object).await?;
    let blocks = plan(size, props.block_size)?;

    let name: Arc<str> = Arc::from(object);
    let mut ranges = futures::stream::iter(blocks)
        .map(|block| {
            let adapter = adapter.clone();
            let name = name.clone();
            async move { adapter.read_range(&name, block).await.map(|d| (block, d)) }
        })
        .buffered(props.concurrency.max(1));

    let mut written = 0u64;
    loop {
        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(StratusError::Cancelled),
            next = ranges.next() => next,
        };
        let Some(item) = next else { break };
        let (block, data) = item?;
        if data.len() as u64 != block.length {
            return Err(short_block(block, data.len()));
        }
        writer.write_all(&data).await?;
        written += block.length;
    }
    writer.flush().await?;

    Ok(written)
}

fn short_block(block: BlockRange, got: usize) -> StratusError {
    StratusError::Io(std::io::Error::new(
        std::io::ErrorKind::UnexpectedEof,
        format!("{block} returned {got} bytes, expected {}", block.length),
    ))
}

fn short_read(expected: u64, got: u64) -> StratusError {
    StratusError::Io(std::io::Error::new(
        std::io::ErrorKind::UnexpectedEof,
        format!("reader ended after {got} of {expected} bytes"),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn blocks(n: usize) -> Vec<BlockRange> {
        plan(n as u64 * 10, 10).unwrap()
    }

    #[tokio::test]
    async fn run_blocks_joins_every_block() {
        let cancel = CancellationToken::new();
        let joined = run_blocks(&blocks(6), 2, &cancel, |b| async move { Ok(b.index) }).await;

        assert_eq!(joined.transferred, 60);
        assert!(joined.errors.iter().all(Option::is_none));
        let outputs: Vec<usize> = joined.outputs.into_iter().flatten().collect();
        assert_eq!(outputs, vec![0, 1, 2, 3, 4, 5]);
    }

    #[tokio::test]
    async fn failure_is_isolated_to_its_slot() {
        let cancel = CancellationToken::new();
        let joined = run_blocks(&blocks(5), 5, &cancel, |b| async move {
            if b.index == 2 {
                Err(StratusError::Io(std::io::Error::other("injected")))
            } else {
                Ok(())
            }
        })
        .await;

        assert_eq!(joined.transferred, 40);
        for (i, slot) in joined.errors.iter().enumerate() {
            assert_eq!(slot.is_some(), i == 2, "slot {i}");
        }
        assert!(joined.outputs[2].is_none());
        assert!(joined.outputs[4].is_some());
    }

    #[tokio::test]
    async fn concurrency_is_bounded() {
        let active = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let cancel = CancellationToken::new();

        run_blocks(&blocks(12), 3, &cancel, |_| {
            let active = active.clone();
            let peak = peak.clone();
            async move {
                let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(5)).await;
                active.fetch_sub(1, Ordering::SeqCst);
                Ok(())
            }
        })
        .await;

        assert!(peak.load(Ordering::SeqCst) <= 3);
        assert!(peak.load(Ordering::SeqCst) >= 1);
    }

    #[tokio::test]
    async fn cancelled_token_marks_blocks_cancelled() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let joined = run_blocks(&blocks(3), 2, &cancel, |_| async move { Ok(()) }).await;

        assert_eq!(joined.transferred, 0);
        assert!(
            joined
                .errors
                .iter()
                .all(|e| matches!(e, Some(BlockError { error: StratusError::Cancelled, .. })))
        );
    }

    #[test]
    fn report_aggregates_failures() {
        let blocks = blocks(3);
        let report = TransferReport {
            object: "obj".into(),
            size: 30,
            transferred: 20,
            block_errors: vec![
                None,
                Some(BlockError {
                    block: blocks[1],
                    error: StratusError::Io(std::io::Error::other("reset")),
                }),
                None,
            ],
        };

        assert!(!report.is_success());
        assert_eq!(report.failed_blocks().count(), 1);
        match report.into_result() {
            Err(StratusError::BlocksFailed {
                failed,
                total,
                detail,
                ..
            }) => {
                assert_eq!(failed, 1);
                assert_eq!(total, 3);
                assert!(detail.contains("block 1"));
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn report_of_only_cancellations_is_cancelled() {
        let blocks = blocks(2);
        let report = TransferReport {
            object: "obj".into(),
            size: 20,
            transferred: 0,
            block_errors: blocks
                .iter()
                .map(|b| {
                    Some(BlockError {
                        block: *b,
                        error: StratusError::Cancelled,
                    })
                })
                .collect(),
        };
        assert!(matches!(report.error(), Some(StratusError::Cancelled)));
    }

    #[test]
    fn block_size_grows_to_respect_block_limit() {
        const MIB: u64 = 1024 * 1024;
        // 100 GiB at 8 MiB would need 12800 parts.
        let size = 100 * 1024 * MIB;
        let grown = upload_block_size(size, 8 * MIB, Some(10_000));
        assert!(grown > 8 * MIB);
        assert!(block_count(size, grown) <= 10_000);

        assert_eq!(upload_block_size(size, 8 * MIB, None), 8 * MIB);
        assert_eq!(upload_block_size(40 * MIB, 8 * MIB, Some(10_000)), 8 * MIB);
        assert_eq!(upload_block_size(0, 8 * MIB, Some(1)), 8 * MIB);
    }

    #[tokio::test]
    async fn memory_sink_accepts_out_of_order_writes() {
        let sink = MemorySink::new();
        sink.write_block(4, Bytes::from_static(b"5678")).await.unwrap();
        sink.write_block(0, Bytes::from_static(b"1234")).await.unwrap();
        assert_eq!(sink.into_inner(), b"12345678");
    }

    #[tokio::test]
    async fn bytes_source_slices_blocks() {
        let source = Bytes::from_static(b"abcdefghij");
        let block = BlockRange {
            index: 1,
            offset: 4,
            length: 3,
        };
        assert_eq!(source.read_block(block).await.unwrap(), Bytes::from_static(b"efg"));

        let past_end = BlockRange {
            index: 2,
            offset: 8,
            length: 5,
        };
        assert!(source.read_block(past_end).await.is_err());
    }

    #[tokio::test]
    async fn file_sink_and_source_share_positions() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("blocks.bin");

        let sink = FileSink::create(&path).unwrap();
        sink.write_block(3, Bytes::from_static(b"def")).await.unwrap();
        sink.write_block(0, Bytes::from_static(b"abc")).await.unwrap();
        sink.set_len(6).unwrap();

        let source = FileSource::new(&path);
        let block = BlockRange {
            index: 0,
            offset: 2,
            length: 3,
        };
        assert_eq!(source.read_block(block).await.unwrap(), Bytes::from_static(b"cde"));
    }
}
