//! Upload and download pipelines for videos.
//!
//! Uploads are copied from the inbound stream in bounded reads so a request
//! never buffers a whole file. Downloads resolve a selector to a published
//! record and hand back a lazily-read chunk stream.

use crate::{
    models::video::ObjectMetadata,
    services::{
        chunk_store::{ChunkStore, DownloadHandle, UploadHandle},
        object_store::{ChunkRepo, MetadataIndex, StorageError, StorageResult},
    },
};
use bytes::Bytes;
use futures::{Stream, pin_mut};
use std::io;
use tokio::io::AsyncReadExt;
use tokio_util::io::StreamReader;
use tracing::warn;
use uuid::Uuid;

/// Size of each read from the inbound upload stream.
const READ_BUF_SIZE: usize = 64 * 1024;

/// Which video a download refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VideoSelector {
    Id(Uuid),
    Earliest,
    Latest,
}

/// Parse a path segment into a video id.
pub fn parse_video_id(raw: &str) -> StorageResult<Uuid> {
    Uuid::try_parse(raw).map_err(|_| StorageError::InvalidIdentifier(raw.to_string()))
}

#[derive(Clone)]
pub struct VideoService {
    store: ChunkStore,
}

impl VideoService {
    pub fn new(store: ChunkStore) -> Self {
        Self { store }
    }

    /// Copy `stream` into a new video and publish it.
    ///
    /// If the stream fails part-way the upload is aborted and nothing becomes
    /// readable; the error is reported as `UploadFailed`.
    pub async fn upload<S>(&self, filename: &str, stream: S) -> StorageResult<ObjectMetadata>
    where
        S: Stream<Item = io::Result<Bytes>> + Send,
    {
        let mut handle = self.store.open_upload(filename).await?;
        let reader = StreamReader::new(stream);
        pin_mut!(reader);

        let mut buf = vec![0u8; READ_BUF_SIZE];
        loop {
            let read = match reader.read(&mut buf).await {
                Ok(0) => break,
                Ok(read) => read,
                Err(err) => {
                    let id = handle.id();
                    abort_quietly(handle).await;
                    return Err(StorageError::UploadFailed { id, source: err });
                }
            };
            if let Err(err) = handle.write(&buf[..read]).await {
                abort_quietly(handle).await;
                return Err(err);
            }
        }

        handle.close().await
    }

    /// Find the published record a selector points at.
    pub async fn resolve(&self, selector: VideoSelector) -> StorageResult<ObjectMetadata> {
        let backend = self.store.backend();
        match selector {
            VideoSelector::Id(id) => backend.resolve(id).await,
            VideoSelector::Earliest => backend.earliest().await,
            VideoSelector::Latest => backend.latest().await,
        }
    }

    /// Resolve a selector and open a read cursor on the result.
    pub async fn open(&self, selector: VideoSelector) -> StorageResult<DownloadHandle> {
        let meta = self.resolve(selector).await?;
        Ok(self.store.open_resolved(meta))
    }

    pub async fn delete(&self, id: Uuid) -> StorageResult<ObjectMetadata> {
        self.store.delete(id).await
    }

    pub async fn ping(&self) -> StorageResult<()> {
        self.store.backend().ping().await
    }
}

async fn abort_quietly(handle: UploadHandle) {
    let id = handle.id();
    if let Err(err) = handle.abort().await {
        warn!(video_id = %id, error = %err, "failed to clean up aborted upload");
    }
}
