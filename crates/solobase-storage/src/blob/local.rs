//! Local filesystem blob backend.

use std::path::PathBuf;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::io::AsyncWriteExt;
use tracing::trace;
use uuid::Uuid;

use crate::blob::{BlobBackend, BlobStat};
use crate::error::{StorageError, StorageResult};

/// Blob backend rooted at a writable directory on the local filesystem.
///
/// Blobs are sharded two levels deep by the first four hex characters of
/// their content hash (`ab/cd/abcd1234...`) to keep any one directory from
/// accumulating too many entries.
#[derive(Debug, Clone)]
pub struct LocalFsBackend {
    root: PathBuf,
}

impl LocalFsBackend {
    /// Open (creating if absent) a local blob store rooted at `root`.
    pub async fn open(root: impl Into<PathBuf>) -> StorageResult<Self> {
        let root = root.into();
        tokio::fs::create_dir_all(&root).await?;
        Ok(Self { root })
    }

    fn path_for(&self, content_hash: &str) -> PathBuf {
        let shard_a = &content_hash[0..2.min(content_hash.len())];
        let shard_b = &content_hash[2.min(content_hash.len())..4.min(content_hash.len())];
        self.root.join(shard_a).join(shard_b).join(content_hash)
    }
}

#[async_trait]
impl BlobBackend for LocalFsBackend {
    async fn put(&self, content_hash: &str, data: Bytes) -> StorageResult<()> {
        let final_path = self.path_for(content_hash);
        if tokio::fs::try_exists(&final_path).await.unwrap_or(false) {
            trace!(content_hash, "blob already present, skipping write");
            return Ok(());
        }

        let parent = final_path.parent().expect("blob path always has a parent");
        tokio::fs::create_dir_all(parent).await?;

        let tmp_path = parent.join(format!(".{}.tmp", Uuid::new_v4()));
        {
            let mut file = tokio::fs::File::create(&tmp_path).await?;
            file.write_all(&data).await?;
            file.sync_all().await?;
        }
        tokio::fs::rename(&tmp_path, &final_path).await?;

        Ok(())
    }

    async fn get(&self, content_hash: &str) -> StorageResult<Bytes> {
        let path = self.path_for(content_hash);
        let data = tokio::fs::read(&path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                StorageError::ObjectNotFound(content_hash.to_owned())
            } else {
                StorageError::Io(e)
            }
        })?;
        Ok(Bytes::from(data))
    }

    async fn delete(&self, content_hash: &str) -> StorageResult<()> {
        let path = self.path_for(content_hash);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StorageError::Io(e)),
        }
    }

    async fn exists(&self, content_hash: &str) -> StorageResult<bool> {
        Ok(tokio::fs::try_exists(self.path_for(content_hash)).await?)
    }

    async fn stat(&self, content_hash: &str) -> StorageResult<BlobStat> {
        let path = self.path_for(content_hash);
        let meta = tokio::fs::metadata(&path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                StorageError::ObjectNotFound(content_hash.to_owned())
            } else {
                StorageError::Io(e)
            }
        })?;
        Ok(BlobStat { size: meta.len() })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_should_round_trip_a_blob() {
        let dir = tempfile::tempdir().unwrap();
        let backend = LocalFsBackend::open(dir.path()).await.unwrap();

        backend.put("deadbeef", Bytes::from("hello")).await.unwrap();
        assert!(backend.exists("deadbeef").await.unwrap());

        let data = backend.get("deadbeef").await.unwrap();
        assert_eq!(data.as_ref(), b"hello");

        let stat = backend.stat("deadbeef").await.unwrap();
        assert_eq!(stat.size, 5);
    }

    #[tokio::test]
    async fn test_should_be_idempotent_on_duplicate_put() {
        let dir = tempfile::tempdir().unwrap();
        let backend = LocalFsBackend::open(dir.path()).await.unwrap();

        backend.put("abc123", Bytes::from("first")).await.unwrap();
        backend.put("abc123", Bytes::from("second")).await.unwrap();

        let data = backend.get("abc123").await.unwrap();
        assert_eq!(data.as_ref(), b"first");
    }

    #[tokio::test]
    async fn test_delete_is_not_an_error_when_absent() {
        let dir = tempfile::tempdir().unwrap();
        let backend = LocalFsBackend::open(dir.path()).await.unwrap();
        backend.delete("never-existed").await.unwrap();
    }

    #[tokio::test]
    async fn test_get_missing_blob_returns_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let backend = LocalFsBackend::open(dir.path()).await.unwrap();
        let err = backend.get("missing").await.unwrap_err();
        assert!(matches!(err, StorageError::ObjectNotFound(_)));
    }
}
