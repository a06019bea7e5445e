//! Persistence seam for chunked video objects.
//!
//! The chunk store and the pipelines above it only talk to these traits, so a
//! SQLite database and an in-process map are interchangeable underneath.

use crate::models::video::{Chunk, ObjectMetadata};
use async_trait::async_trait;
use bytes::Bytes;
use std::io;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("video `{0}` not found")]
    NotFound(Uuid),
    #[error("no videos have been uploaded")]
    NoVideos,
    #[error("invalid video id `{0}`")]
    InvalidIdentifier(String),
    #[error("video `{0}` already exists")]
    DuplicateId(Uuid),
    #[error("upload `{0}` finished without any content")]
    IncompleteUpload(Uuid),
    #[error("upload `{id}` failed: {source}")]
    UploadFailed {
        id: Uuid,
        #[source]
        source: io::Error,
    },
    #[error("store unavailable: {0}")]
    StoreUnavailable(String),
    #[error("video `{id}` is corrupt: {reason}")]
    Corrupt { id: Uuid, reason: String },
    #[error(transparent)]
    Database(sqlx::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
}

impl From<sqlx::Error> for StorageError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
                StorageError::StoreUnavailable(err.to_string())
            }
            other => StorageError::Database(other),
        }
    }
}

pub type StorageResult<T> = Result<T, StorageError>;

/// Raw chunk persistence. Chunks written here are invisible to readers until
/// the owning object is registered in the [`MetadataIndex`].
#[async_trait]
pub trait ChunkRepo: Send + Sync {
    /// Check that the backing medium is reachable.
    async fn ping(&self) -> StorageResult<()>;

    /// Store one chunk. `(object_id, n)` must not already exist.
    async fn put_chunk(&self, chunk: Chunk) -> StorageResult<()>;

    /// Fetch chunk `n` of an object.
    async fn get_chunk(&self, object_id: Uuid, n: i64) -> StorageResult<Option<Bytes>>;

    /// Remove every chunk of an unpublished object.
    async fn discard_chunks(&self, object_id: Uuid) -> StorageResult<()>;
}

/// Lookup of published objects by id and by creation order.
#[async_trait]
pub trait MetadataIndex: Send + Sync {
    /// Publish a record. Fails with `DuplicateId` on collision and with
    /// `Corrupt` if the stored chunks do not match the record exactly.
    async fn register(&self, meta: &ObjectMetadata) -> StorageResult<()>;

    async fn resolve(&self, id: Uuid) -> StorageResult<ObjectMetadata>;

    /// Oldest record by `(created_at, id)`.
    async fn earliest(&self) -> StorageResult<ObjectMetadata>;

    /// Newest record by `(created_at, id)`.
    async fn latest(&self) -> StorageResult<ObjectMetadata>;
}

/// A complete backend for the chunk store.
#[async_trait]
pub trait ObjectStore: ChunkRepo + MetadataIndex {
    /// Remove a published object's metadata and chunks together.
    async fn delete_object(&self, id: Uuid) -> StorageResult<ObjectMetadata>;
}

/// Check that chunk statistics describe exactly the run `0..k` a record needs.
pub(crate) fn verify_chunk_run(
    meta: &ObjectMetadata,
    count: i64,
    total: i64,
    min_n: i64,
    max_n: i64,
) -> StorageResult<()> {
    let expected = meta.chunk_count();
    let contiguous = count == 0 || (min_n == 0 && max_n == count - 1);
    if count != expected || total != meta.length || !contiguous {
        return Err(StorageError::Corrupt {
            id: meta.id,
            reason: format!(
                "expected {} chunks of {} bytes, found {} chunks (n {}..={}) of {} bytes",
                expected, meta.length, count, min_n, max_n, total
            ),
        });
    }
    Ok(())
}

/// Return true if SQLx error indicates a unique constraint violation.
pub(crate) fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(
        err,
        sqlx::Error::Database(db_err) if db_err.message().to_ascii_lowercase().contains("unique")
    )
}
