//! Stored video objects: the published metadata record and its chunks.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Metadata describing a stored video.
///
/// A record exists in the index only once every chunk of the object has been
/// written, so holding one means the full byte stream can be reconstructed.
#[derive(Serialize, Deserialize, Clone, FromRow, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ObjectMetadata {
    /// Identifier generated when the upload was opened.
    pub id: Uuid,

    /// Original filename as supplied by the uploader.
    pub filename: String,

    /// Total number of bytes across all chunks.
    pub length: i64,

    /// Maximum size of every chunk; only the last one may be shorter.
    pub chunk_size: i64,

    /// When the upload was opened.
    pub created_at: DateTime<Utc>,

    /// Lowercase hex MD5 of the full content.
    pub checksum: String,
}

impl ObjectMetadata {
    /// Number of chunks the object is split into. Empty objects have none.
    pub fn chunk_count(&self) -> i64 {
        if self.length <= 0 || self.chunk_size <= 0 {
            return 0;
        }
        (self.length + self.chunk_size - 1) / self.chunk_size
    }

    /// Exact byte length chunk `n` must have, or `None` if `n` is out of range.
    pub fn expected_chunk_len(&self, n: i64) -> Option<i64> {
        let count = self.chunk_count();
        if n < 0 || n >= count {
            return None;
        }
        if n + 1 < count {
            Some(self.chunk_size)
        } else {
            Some(self.length - self.chunk_size * (count - 1))
        }
    }
}

/// One slice of an object's content, addressed by `(object_id, n)`.
#[derive(Clone, Debug)]
pub struct Chunk {
    pub object_id: Uuid,

    /// 0-based sequence number.
    pub n: i64,

    pub data: Bytes,
}
