//! SQLite-backed [`ObjectStore`].
//!
//! Chunks live in `video_chunks` keyed by `(files_id, n)`; published metadata
//! lives in `video_files`. A row in `video_files` is the only way readers find
//! an object, so chunks written ahead of it stay invisible until `register`.

use crate::{
    models::video::{Chunk, ObjectMetadata},
    services::object_store::{
        ChunkRepo, MetadataIndex, ObjectStore, StorageError, StorageResult, is_unique_violation,
        verify_chunk_run,
    },
};
use async_trait::async_trait;
use bytes::Bytes;
use sqlx::SqlitePool;
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

const SELECT_METADATA: &str =
    "SELECT id, filename, length, chunk_size, created_at, checksum FROM video_files";

#[derive(Clone)]
pub struct SqliteObjectStore {
    /// Shared SQLite connection pool.
    pub db: Arc<SqlitePool>,
}

impl SqliteObjectStore {
    pub fn new(db: Arc<SqlitePool>) -> Self {
        Self { db }
    }

    async fn fetch_ordered(&self, order: &str) -> StorageResult<ObjectMetadata> {
        let sql = format!(
            "{} ORDER BY created_at {order}, id {order} LIMIT 1",
            SELECT_METADATA
        );
        sqlx::query_as::<_, ObjectMetadata>(&sql)
            .fetch_optional(&*self.db)
            .await?
            .ok_or(StorageError::NoVideos)
    }
}

#[async_trait]
impl ChunkRepo for SqliteObjectStore {
    async fn ping(&self) -> StorageResult<()> {
        sqlx::query_scalar::<_, i64>("SELECT 1")
            .fetch_one(&*self.db)
            .await?;
        Ok(())
    }

    async fn put_chunk(&self, chunk: Chunk) -> StorageResult<()> {
        let len = chunk.data.len();
        sqlx::query("INSERT INTO video_chunks (files_id, n, data) VALUES (?, ?, ?)")
            .bind(chunk.object_id)
            .bind(chunk.n)
            .bind(chunk.data.as_ref())
            .execute(&*self.db)
            .await
            .map_err(|err| {
                if is_unique_violation(&err) {
                    StorageError::Corrupt {
                        id: chunk.object_id,
                        reason: format!("chunk {} written twice", chunk.n),
                    }
                } else {
                    StorageError::from(err)
                }
            })?;
        debug!(video_id = %chunk.object_id, n = chunk.n, len, "stored chunk");
        Ok(())
    }

    async fn get_chunk(&self, object_id: Uuid, n: i64) -> StorageResult<Option<Bytes>> {
        let data = sqlx::query_scalar::<_, Vec<u8>>(
            "SELECT data FROM video_chunks WHERE files_id = ? AND n = ?",
        )
        .bind(object_id)
        .bind(n)
        .fetch_optional(&*self.db)
        .await?;
        Ok(data.map(Bytes::from))
    }

    async fn discard_chunks(&self, object_id: Uuid) -> StorageResult<()> {
        let result = sqlx::query("DELETE FROM video_chunks WHERE files_id = ?")
            .bind(object_id)
            .execute(&*self.db)
            .await?;
        debug!(video_id = %object_id, chunks = result.rows_affected(), "discarded chunks");
        Ok(())
    }
}

#[async_trait]
impl MetadataIndex for SqliteObjectStore {
    async fn register(&self, meta: &ObjectMetadata) -> StorageResult<()> {
        // Write before reading: a deferred transaction that reads first cannot
        // wait out a concurrent writer and fails with SQLITE_BUSY.
        let mut tx = self.db.begin().await?;

        sqlx::query(
            "INSERT INTO video_files (id, filename, length, chunk_size, created_at, checksum)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(meta.id)
        .bind(&meta.filename)
        .bind(meta.length)
        .bind(meta.chunk_size)
        .bind(meta.created_at)
        .bind(&meta.checksum)
        .execute(&mut *tx)
        .await
        .map_err(|err| {
            if is_unique_violation(&err) {
                StorageError::DuplicateId(meta.id)
            } else {
                StorageError::from(err)
            }
        })?;

        let (count, total, min_n, max_n): (i64, i64, i64, i64) = sqlx::query_as(
            "SELECT COUNT(*), COALESCE(SUM(LENGTH(data)), 0),
                    COALESCE(MIN(n), -1), COALESCE(MAX(n), -1)
             FROM video_chunks WHERE files_id = ?",
        )
        .bind(meta.id)
        .fetch_one(&mut *tx)
        .await?;
        if let Err(err) = verify_chunk_run(meta, count, total, min_n, max_n) {
            tx.rollback().await?;
            return Err(err);
        }

        tx.commit().await?;
        Ok(())
    }

    async fn resolve(&self, id: Uuid) -> StorageResult<ObjectMetadata> {
        let sql = format!("{} WHERE id = ?", SELECT_METADATA);
        sqlx::query_as::<_, ObjectMetadata>(&sql)
            .bind(id)
            .fetch_optional(&*self.db)
            .await?
            .ok_or(StorageError::NotFound(id))
    }

    async fn earliest(&self) -> StorageResult<ObjectMetadata> {
        self.fetch_ordered("ASC").await
    }

    async fn latest(&self) -> StorageResult<ObjectMetadata> {
        self.fetch_ordered("DESC").await
    }
}

#[async_trait]
impl ObjectStore for SqliteObjectStore {
    async fn delete_object(&self, id: Uuid) -> StorageResult<ObjectMetadata> {
        let mut tx = self.db.begin().await?;

        // Write first; see `register`.
        let Some(meta) = sqlx::query_as::<_, ObjectMetadata>(
            "DELETE FROM video_files WHERE id = ?
             RETURNING id, filename, length, chunk_size, created_at, checksum",
        )
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        else {
            tx.rollback().await?;
            return Err(StorageError::NotFound(id));
        };

        sqlx::query("DELETE FROM video_chunks WHERE files_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(meta)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use chrono::{Duration, TimeZone, Utc};

    async fn store() -> SqliteObjectStore {
        let pool = db::connect_in_memory().await.unwrap();
        db::run_migrations(&pool).await.unwrap();
        SqliteObjectStore::new(Arc::new(pool))
    }

    fn empty_meta(secs: i64) -> ObjectMetadata {
        ObjectMetadata {
            id: Uuid::new_v4(),
            filename: format!("{secs}.mp4"),
            length: 0,
            chunk_size: 4,
            created_at: Utc.timestamp_opt(1_700_000_000, 0).unwrap() + Duration::seconds(secs),
            checksum: format!("{:x}", md5::compute(b"")),
        }
    }

    #[tokio::test]
    async fn earliest_and_latest_follow_created_at_not_insertion_order() {
        let store = store().await;
        assert!(matches!(store.earliest().await, Err(StorageError::NoVideos)));
        assert!(matches!(store.latest().await, Err(StorageError::NoVideos)));

        let t2 = empty_meta(2);
        let t3 = empty_meta(3);
        let t1 = empty_meta(1);
        for meta in [&t2, &t3, &t1] {
            store.register(meta).await.unwrap();
        }

        assert_eq!(store.earliest().await.unwrap().id, t1.id);
        assert_eq!(store.latest().await.unwrap().id, t3.id);
    }

    #[tokio::test]
    async fn register_rejects_duplicate_id() {
        let store = store().await;
        let meta = empty_meta(0);
        store.register(&meta).await.unwrap();
        assert!(matches!(
            store.register(&meta).await,
            Err(StorageError::DuplicateId(id)) if id == meta.id
        ));
    }

    #[tokio::test]
    async fn register_refuses_gaps_in_chunk_run() {
        let store = store().await;
        let mut meta = empty_meta(0);
        meta.length = 8;
        store
            .put_chunk(Chunk {
                object_id: meta.id,
                n: 1,
                data: Bytes::from_static(b"abcd"),
            })
            .await
            .unwrap();

        assert!(matches!(
            store.register(&meta).await,
            Err(StorageError::Corrupt { .. })
        ));
        assert!(matches!(
            store.resolve(meta.id).await,
            Err(StorageError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn delete_removes_metadata_and_chunks() {
        let store = store().await;
        let mut meta = empty_meta(0);
        meta.length = 3;
        store
            .put_chunk(Chunk {
                object_id: meta.id,
                n: 0,
                data: Bytes::from_static(b"abc"),
            })
            .await
            .unwrap();
        store.register(&meta).await.unwrap();

        let removed = store.delete_object(meta.id).await.unwrap();
        assert_eq!(removed.id, meta.id);
        assert!(store.get_chunk(meta.id, 0).await.unwrap().is_none());
        assert!(matches!(
            store.delete_object(meta.id).await,
            Err(StorageError::NotFound(_))
        ));
    }
}
