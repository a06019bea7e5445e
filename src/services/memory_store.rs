//! In-process [`ObjectStore`] used in tests and anywhere a database is not wanted.

use crate::{
    models::video::{Chunk, ObjectMetadata},
    services::object_store::{
        ChunkRepo, MetadataIndex, ObjectStore, StorageError, StorageResult, verify_chunk_run,
    },
};
use async_trait::async_trait;
use bytes::Bytes;
use std::collections::{BTreeMap, HashMap};
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Default)]
pub struct MemoryObjectStore {
    chunks: RwLock<BTreeMap<(Uuid, i64), Bytes>>,
    files: RwLock<HashMap<Uuid, ObjectMetadata>>,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sequence numbers currently stored for an object, published or not.
    pub async fn chunk_numbers(&self, object_id: Uuid) -> Vec<i64> {
        self.chunks
            .read()
            .await
            .range((object_id, i64::MIN)..=(object_id, i64::MAX))
            .map(|((_, n), _)| *n)
            .collect()
    }

    async fn pick(&self, newest: bool) -> StorageResult<ObjectMetadata> {
        let files = self.files.read().await;
        let ordered = files.values().map(|m| ((m.created_at, m.id), m));
        let found = if newest {
            ordered.max_by_key(|(key, _)| *key)
        } else {
            ordered.min_by_key(|(key, _)| *key)
        };
        found
            .map(|(_, meta)| meta.clone())
            .ok_or(StorageError::NoVideos)
    }
}

#[async_trait]
impl ChunkRepo for MemoryObjectStore {
    async fn ping(&self) -> StorageResult<()> {
        Ok(())
    }

    async fn put_chunk(&self, chunk: Chunk) -> StorageResult<()> {
        let mut chunks = self.chunks.write().await;
        if chunks.contains_key(&(chunk.object_id, chunk.n)) {
            return Err(StorageError::Corrupt {
                id: chunk.object_id,
                reason: format!("chunk {} written twice", chunk.n),
            });
        }
        chunks.insert((chunk.object_id, chunk.n), chunk.data);
        Ok(())
    }

    async fn get_chunk(&self, object_id: Uuid, n: i64) -> StorageResult<Option<Bytes>> {
        Ok(self.chunks.read().await.get(&(object_id, n)).cloned())
    }

    async fn discard_chunks(&self, object_id: Uuid) -> StorageResult<()> {
        self.chunks
            .write()
            .await
            .retain(|(id, _), _| *id != object_id);
        Ok(())
    }
}

#[async_trait]
impl MetadataIndex for MemoryObjectStore {
    async fn register(&self, meta: &ObjectMetadata) -> StorageResult<()> {
        // Lock order: chunks before files, same as delete_object.
        let chunks = self.chunks.read().await;
        let mut files = self.files.write().await;
        if files.contains_key(&meta.id) {
            return Err(StorageError::DuplicateId(meta.id));
        }

        let run: Vec<(i64, usize)> = chunks
            .range((meta.id, i64::MIN)..=(meta.id, i64::MAX))
            .map(|((_, n), data)| (*n, data.len()))
            .collect();
        let total = run.iter().map(|(_, len)| *len as i64).sum();
        let min_n = run.first().map(|(n, _)| *n).unwrap_or(-1);
        let max_n = run.last().map(|(n, _)| *n).unwrap_or(-1);
        verify_chunk_run(meta, run.len() as i64, total, min_n, max_n)?;

        files.insert(meta.id, meta.clone());
        Ok(())
    }

    async fn resolve(&self, id: Uuid) -> StorageResult<ObjectMetadata> {
        self.files
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or(StorageError::NotFound(id))
    }

    async fn earliest(&self) -> StorageResult<ObjectMetadata> {
        self.pick(false).await
    }

    async fn latest(&self) -> StorageResult<ObjectMetadata> {
        self.pick(true).await
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn delete_object(&self, id: Uuid) -> StorageResult<ObjectMetadata> {
        let mut chunks = self.chunks.write().await;
        let mut files = self.files.write().await;
        let meta = files.remove(&id).ok_or(StorageError::NotFound(id))?;
        chunks.retain(|(object_id, _), _| *object_id != id);
        Ok(meta)
    }
}
