//! Chunked object storage on top of an [`ObjectStore`] backend.
//!
//! An upload is split into `chunk_size` slices written in sequence order and
//! published as a single metadata record on close. A download walks the same
//! sequence from 0, checking every chunk length and the content MD5 as it goes.
//! Neither side holds more than one chunk in memory.

use crate::{
    models::video::{Chunk, ObjectMetadata},
    services::object_store::{
        ChunkRepo, MetadataIndex, ObjectStore, StorageError, StorageResult,
    },
};
use bytes::{Bytes, BytesMut};
use chrono::{DateTime, Utc};
use futures::Stream;
use md5::Context;
use std::{io, sync::Arc, time::Duration};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Default chunk size: 255 KiB.
pub const DEFAULT_CHUNK_SIZE: usize = 255 * 1024;

/// A `put_chunk` cancelled with its request may still be committed by the
/// database after the first cleanup pass; a second pass runs after this delay.
const DROP_RECHECK_DELAY: Duration = Duration::from_millis(500);

#[derive(Clone)]
pub struct ChunkStore {
    backend: Arc<dyn ObjectStore>,
    chunk_size: usize,
}

impl ChunkStore {
    pub fn new(backend: Arc<dyn ObjectStore>, chunk_size: usize) -> Self {
        Self {
            backend,
            chunk_size: chunk_size.max(1),
        }
    }

    pub fn backend(&self) -> &Arc<dyn ObjectStore> {
        &self.backend
    }

    /// Allocate a new object id and start an upload for it.
    pub async fn open_upload(&self, filename: &str) -> StorageResult<UploadHandle> {
        self.backend.ping().await?;

        let handle = UploadHandle {
            backend: self.backend.clone(),
            id: Uuid::new_v4(),
            filename: filename.to_string(),
            created_at: Utc::now(),
            chunk_size: self.chunk_size,
            buffer: BytesMut::with_capacity(self.chunk_size),
            next_n: 0,
            length: 0,
            digest: Context::new(),
            allow_empty: false,
            finished: false,
        };
        debug!(video_id = %handle.id, filename, "opened upload");
        Ok(handle)
    }

    /// Open a published object for reading from its first chunk.
    pub async fn open_download(&self, id: Uuid) -> StorageResult<DownloadHandle> {
        let meta = self.backend.resolve(id).await?;
        Ok(self.open_resolved(meta))
    }

    /// Open a reader on a record the caller already looked up.
    pub fn open_resolved(&self, meta: ObjectMetadata) -> DownloadHandle {
        DownloadHandle {
            backend: self.backend.clone(),
            meta,
            next_n: 0,
            digest: Some(Context::new()),
            closed: false,
        }
    }

    /// Remove a published object and all of its chunks.
    pub async fn delete(&self, id: Uuid) -> StorageResult<ObjectMetadata> {
        let meta = self.backend.delete_object(id).await?;
        info!(video_id = %id, chunks = meta.chunk_count(), "deleted video");
        Ok(meta)
    }
}

/// An upload in progress. Nothing written through it is visible to readers
/// until [`UploadHandle::close`] succeeds.
///
/// Dropping the handle without closing or aborting it schedules removal of the
/// chunks it already wrote.
pub struct UploadHandle {
    backend: Arc<dyn ObjectStore>,
    id: Uuid,
    filename: String,
    created_at: DateTime<Utc>,
    chunk_size: usize,
    buffer: BytesMut,
    next_n: i64,
    length: i64,
    digest: Context,
    allow_empty: bool,
    finished: bool,
}

impl UploadHandle {
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Let `close` publish a zero-length object instead of failing.
    pub fn allow_empty(mut self) -> Self {
        self.allow_empty = true;
        self
    }

    /// Append bytes, flushing a chunk every time the buffer fills.
    pub async fn write(&mut self, data: &[u8]) -> StorageResult<()> {
        self.length += data.len() as i64;
        self.digest.consume(data);
        self.buffer.extend_from_slice(data);

        while self.buffer.len() >= self.chunk_size {
            let chunk = self.buffer.split_to(self.chunk_size).freeze();
            self.flush_chunk(chunk).await?;
        }
        Ok(())
    }

    async fn flush_chunk(&mut self, data: Bytes) -> StorageResult<()> {
        self.backend
            .put_chunk(Chunk {
                object_id: self.id,
                n: self.next_n,
                data,
            })
            .await?;
        self.next_n += 1;
        Ok(())
    }

    /// Flush the final partial chunk and publish the metadata record.
    pub async fn close(mut self) -> StorageResult<ObjectMetadata> {
        let result = self.publish().await;
        if result.is_err() {
            if let Err(err) = self.backend.discard_chunks(self.id).await {
                warn!(
                    video_id = %self.id,
                    error = %err,
                    "failed to discard chunks of failed upload"
                );
            }
        }
        self.finished = true;
        result
    }

    async fn publish(&mut self) -> StorageResult<ObjectMetadata> {
        if !self.buffer.is_empty() {
            let tail = self.buffer.split().freeze();
            self.flush_chunk(tail).await?;
        }
        if self.next_n == 0 && !self.allow_empty {
            return Err(StorageError::IncompleteUpload(self.id));
        }

        let digest = std::mem::replace(&mut self.digest, Context::new());
        let meta = ObjectMetadata {
            id: self.id,
            filename: self.filename.clone(),
            length: self.length,
            chunk_size: self.chunk_size as i64,
            created_at: self.created_at,
            checksum: format!("{:x}", digest.compute()),
        };
        self.backend.register(&meta).await?;

        info!(
            video_id = %meta.id,
            filename = %meta.filename,
            length = meta.length,
            chunks = self.next_n,
            "published video"
        );
        Ok(meta)
    }

    /// Give up on the upload and remove whatever was written.
    pub async fn abort(mut self) -> StorageResult<()> {
        self.finished = true;
        warn!(video_id = %self.id, chunks = self.next_n, "aborting upload");
        self.backend.discard_chunks(self.id).await
    }
}

impl Drop for UploadHandle {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        let backend = self.backend.clone();
        let id = self.id;
        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                warn!(video_id = %id, "upload dropped before close, discarding chunks");
                runtime.spawn(async move {
                    if let Err(err) = backend.discard_chunks(id).await {
                        warn!(video_id = %id, error = %err, "failed to discard chunks");
                    }
                    tokio::time::sleep(DROP_RECHECK_DELAY).await;
                    if let Err(err) = backend.discard_chunks(id).await {
                        warn!(video_id = %id, error = %err, "failed to discard late chunks");
                    }
                });
            }
            Err(_) => {
                warn!(video_id = %id, "upload dropped outside a runtime, chunks left behind")
            }
        }
    }
}

/// A read cursor over one published object. Each handle keeps its own
/// position, so any number of them can read the same object at once.
pub struct DownloadHandle {
    backend: Arc<dyn ObjectStore>,
    meta: ObjectMetadata,
    next_n: i64,
    digest: Option<Context>,
    closed: bool,
}

impl DownloadHandle {
    pub fn metadata(&self) -> &ObjectMetadata {
        &self.meta
    }

    /// Next chunk in sequence order, or `None` once the object is exhausted
    /// or the handle is closed.
    pub async fn read(&mut self) -> StorageResult<Option<Bytes>> {
        if self.closed {
            return Ok(None);
        }
        let id = self.meta.id;

        let Some(expected) = self.meta.expected_chunk_len(self.next_n) else {
            self.finish()?;
            return Ok(None);
        };

        let data = self
            .backend
            .get_chunk(id, self.next_n)
            .await?
            .ok_or_else(|| StorageError::Corrupt {
                id,
                reason: format!("chunk {} is missing", self.next_n),
            })?;
        if data.len() as i64 != expected {
            return Err(StorageError::Corrupt {
                id,
                reason: format!(
                    "chunk {} has {} bytes, expected {}",
                    self.next_n,
                    data.len(),
                    expected
                ),
            });
        }

        if let Some(digest) = self.digest.as_mut() {
            digest.consume(&data);
        }
        self.next_n += 1;
        Ok(Some(data))
    }

    fn finish(&mut self) -> StorageResult<()> {
        let digest = self.digest.take();
        self.close();
        if let Some(digest) = digest {
            let actual = format!("{:x}", digest.compute());
            if actual != self.meta.checksum {
                return Err(StorageError::Corrupt {
                    id: self.meta.id,
                    reason: format!("checksum {} does not match {}", actual, self.meta.checksum),
                });
            }
        }
        Ok(())
    }

    /// Release the cursor. Safe to call more than once.
    pub fn close(&mut self) {
        self.closed = true;
        self.digest = None;
    }

    /// Turn the handle into a byte stream suitable for an HTTP body.
    pub fn into_stream(self) -> impl Stream<Item = io::Result<Bytes>> + Send + 'static {
        futures::stream::try_unfold(self, |mut handle| async move {
            match handle.read().await {
                Ok(Some(chunk)) => Ok(Some((chunk, handle))),
                Ok(None) => Ok(None),
                Err(err) => {
                    warn!(video_id = %handle.meta.id, error = %err, "video stream aborted");
                    handle.close();
                    Err(io::Error::new(io::ErrorKind::Other, err))
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::memory_store::{MemoryObjectStore, testing::InstrumentedStore};
    use futures::TryStreamExt;

    fn pattern(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i * 31 % 251) as u8).collect()
    }

    fn store(chunk_size: usize) -> (Arc<MemoryObjectStore>, ChunkStore) {
        let backend = Arc::new(MemoryObjectStore::new());
        let store = ChunkStore::new(backend.clone(), chunk_size);
        (backend, store)
    }

    async fn upload(store: &ChunkStore, data: &[u8], write_size: usize) -> ObjectMetadata {
        let mut handle = store.open_upload("clip.mp4").await.unwrap().allow_empty();
        for piece in data.chunks(write_size.max(1)) {
            handle.write(piece).await.unwrap();
        }
        handle.close().await.unwrap()
    }

    async fn download(store: &ChunkStore, id: Uuid) -> Vec<u8> {
        let handle = store.open_download(id).await.unwrap();
        let chunks: Vec<Bytes> = handle.into_stream().try_collect().await.unwrap();
        chunks.concat()
    }

    #[tokio::test]
    async fn round_trip_preserves_bytes_at_chunk_boundaries() {
        let chunk_size = 16;
        let (backend, store) = store(chunk_size);

        for len in [0, 1, chunk_size, chunk_size * 3, chunk_size * 4 + 5] {
            let data = pattern(len);
            let meta = upload(&store, &data, 7).await;

            assert_eq!(meta.length, len as i64);
            assert_eq!(meta.checksum, format!("{:x}", md5::compute(&data)));
            let expected: Vec<i64> = (0..meta.chunk_count()).collect();
            assert_eq!(backend.chunk_numbers(meta.id).await, expected);
            assert_eq!(download(&store, meta.id).await, data, "length {len}");
        }
    }

    #[tokio::test]
    async fn six_hundred_kib_splits_into_three_chunks() {
        let (backend, store) = store(DEFAULT_CHUNK_SIZE);
        let data = pattern(600 * 1024);
        let meta = upload(&store, &data, 64 * 1024).await;

        assert_eq!(meta.length, 614_400);
        assert_eq!(backend.chunk_numbers(meta.id).await, vec![0, 1, 2]);
        let last = backend.get_chunk(meta.id, 2).await.unwrap().unwrap();
        assert_eq!(last.len(), 90 * 1024);
        assert_eq!(download(&store, meta.id).await, data);
    }

    #[tokio::test]
    async fn empty_upload_fails_unless_requested() {
        let (backend, store) = store(8);
        let handle = store.open_upload("empty.mp4").await.unwrap();
        let id = handle.id();

        assert!(matches!(
            handle.close().await,
            Err(StorageError::IncompleteUpload(failed)) if failed == id
        ));
        assert!(matches!(backend.resolve(id).await, Err(StorageError::NotFound(_))));
    }

    #[tokio::test]
    async fn abort_leaves_nothing_readable() {
        let (backend, store) = store(4);
        let mut handle = store.open_upload("partial.mp4").await.unwrap();
        let id = handle.id();
        handle.write(b"0123456789").await.unwrap();
        assert_eq!(backend.chunk_numbers(id).await, vec![0, 1]);

        handle.abort().await.unwrap();
        assert!(backend.chunk_numbers(id).await.is_empty());
        assert!(matches!(
            store.open_download(id).await,
            Err(StorageError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn download_reports_not_found_for_unknown_id() {
        let (_, store) = store(4);
        assert!(matches!(
            store.open_download(Uuid::new_v4()).await,
            Err(StorageError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn concurrent_downloads_keep_independent_positions() {
        let (_, store) = store(4);
        let data = pattern(19);
        let meta = upload(&store, &data, 19).await;

        let mut first = store.open_download(meta.id).await.unwrap();
        let mut second = store.open_download(meta.id).await.unwrap();
        assert_eq!(first.read().await.unwrap().unwrap().as_ref(), &data[..4]);
        assert_eq!(first.read().await.unwrap().unwrap().as_ref(), &data[4..8]);
        assert_eq!(second.read().await.unwrap().unwrap().as_ref(), &data[..4]);

        first.close();
        first.close();
        assert!(first.read().await.unwrap().is_none());
        assert_eq!(second.read().await.unwrap().unwrap().as_ref(), &data[4..8]);
    }

    #[tokio::test]
    async fn tampered_chunk_fails_the_stream() {
        let (backend, store) = store(4);
        let meta = upload(&store, b"abcdefgh", 8).await;

        backend.discard_chunks(meta.id).await.unwrap();
        for (n, data) in [(0, "abcd"), (1, "efgX")] {
            backend
                .put_chunk(Chunk {
                    object_id: meta.id,
                    n,
                    data: Bytes::from_static(data.as_bytes()),
                })
                .await
                .unwrap();
        }

        let handle = store.open_download(meta.id).await.unwrap();
        let result: io::Result<Vec<Bytes>> = handle.into_stream().try_collect().await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn delete_removes_published_video() {
        let (backend, store) = store(4);
        let meta = upload(&store, b"abcdef", 6).await;

        store.delete(meta.id).await.unwrap();
        assert!(backend.chunk_numbers(meta.id).await.is_empty());
        assert!(matches!(
            store.delete(meta.id).await,
            Err(StorageError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn dropped_upload_discards_its_chunks() {
        let (backend, store) = store(2);
        let mut handle = store.open_upload("dropped.mp4").await.unwrap();
        let id = handle.id();
        handle.write(b"abcd").await.unwrap();
        drop(handle);

        for _ in 0..50 {
            if backend.chunk_numbers(id).await.is_empty() {
                return;
            }
            tokio::task::yield_now().await;
        }
        panic!("chunks of dropped upload were not discarded");
    }

    #[tokio::test]
    async fn dropped_upload_discards_chunks_committed_late() {
        let memory = Arc::new(MemoryObjectStore::new());
        let backend = Arc::new(
            InstrumentedStore::new(memory.clone()).with_put_delay(Duration::from_millis(50)),
        );
        let store = ChunkStore::new(backend, 2);
        let mut handle = store.open_upload("cancelled.mp4").await.unwrap();
        let id = handle.id();

        let write = tokio::time::timeout(Duration::from_millis(10), handle.write(b"ab")).await;
        assert!(write.is_err(), "write should still be waiting on the chunk insert");
        drop(handle);

        tokio::time::sleep(DROP_RECHECK_DELAY + Duration::from_millis(300)).await;
        assert!(memory.chunk_numbers(id).await.is_empty());
    }
}
