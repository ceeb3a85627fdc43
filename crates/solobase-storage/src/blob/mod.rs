//! Blob backend: content-addressed storage of object bytes, independent of
//! bucket/object metadata (which lives in `solobase-db`).

mod local;
mod s3;

pub use local::LocalFsBackend;
pub use s3::S3CompatibleBackend;

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::StorageResult;

/// Metadata about a stored blob, independent of its content.
#[derive(Debug, Clone)]
pub struct BlobStat {
    /// Size in bytes.
    pub size: u64,
}

/// Content-addressed blob storage.
///
/// Blobs are keyed by their SHA-256 content hash (hex-encoded), so two
/// objects with identical bytes share one underlying blob. Callers are
/// responsible for reference counting at the object-metadata layer; the
/// backend itself performs no garbage collection beyond [`Self::delete`].
#[async_trait]
pub trait BlobBackend: Send + Sync + 'static {
    /// Write `data` under `content_hash`, replacing nothing if the blob
    /// already exists (content-addressed writes are idempotent).
    ///
    /// Implementations must write to a temporary location and atomically
    /// rename into place, so a concurrent reader never observes a partial
    /// write.
    async fn put(&self, content_hash: &str, data: Bytes) -> StorageResult<()>;

    /// Read the full contents of a blob.
    async fn get(&self, content_hash: &str) -> StorageResult<Bytes>;

    /// Remove a blob. Not an error if it is already absent.
    async fn delete(&self, content_hash: &str) -> StorageResult<()>;

    /// Whether a blob exists.
    async fn exists(&self, content_hash: &str) -> StorageResult<bool>;

    /// Fetch size metadata without reading the blob's contents.
    async fn stat(&self, content_hash: &str) -> StorageResult<BlobStat>;
}
