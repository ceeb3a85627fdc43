//! S3-compatible blob backend, for deployments pointing `STORAGE_TYPE=s3`
//! at AWS S3 or any S3-compatible object store (including, fittingly, a
//! Solobase instance's own teacher-compatible emulator).

use async_trait::async_trait;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use bytes::Bytes;

use crate::blob::{BlobBackend, BlobStat};
use crate::error::{StorageError, StorageResult};

/// Blob backend backed by an S3-compatible object store. Objects are keyed
/// by content hash under `blobs/<hash>`.
#[derive(Debug, Clone)]
pub struct S3CompatibleBackend {
    client: Client,
    bucket: String,
}

impl S3CompatibleBackend {
    /// Build a backend over an already-configured S3 client.
    #[must_use]
    pub fn new(client: Client, bucket: String) -> Self {
        Self { client, bucket }
    }

    fn object_key(content_hash: &str) -> String {
        format!("blobs/{content_hash}")
    }
}

#[async_trait]
impl BlobBackend for S3CompatibleBackend {
    async fn put(&self, content_hash: &str, data: Bytes) -> StorageResult<()> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(Self::object_key(content_hash))
            .body(ByteStream::from(data))
            .send()
            .await
            .map_err(|e| StorageError::Internal(anyhow::anyhow!(e)))?;
        Ok(())
    }

    async fn get(&self, content_hash: &str) -> StorageResult<Bytes> {
        let output = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(Self::object_key(content_hash))
            .send()
            .await
            .map_err(|e| map_not_found(content_hash, e))?;

        let bytes = output
            .body
            .collect()
            .await
            .map_err(|e| StorageError::Internal(anyhow::anyhow!(e)))?
            .into_bytes();

        Ok(bytes)
    }

    async fn delete(&self, content_hash: &str) -> StorageResult<()> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(Self::object_key(content_hash))
            .send()
            .await
            .map_err(|e| StorageError::Internal(anyhow::anyhow!(e)))?;
        Ok(())
    }

    async fn exists(&self, content_hash: &str) -> StorageResult<bool> {
        match self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(Self::object_key(content_hash))
            .send()
            .await
        {
            Ok(_) => Ok(true),
            Err(e) if is_not_found(&e) => Ok(false),
            Err(e) => Err(StorageError::Internal(anyhow::anyhow!(e))),
        }
    }

    async fn stat(&self, content_hash: &str) -> StorageResult<BlobStat> {
        let output = self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(Self::object_key(content_hash))
            .send()
            .await
            .map_err(|e| map_not_found(content_hash, e))?;

        Ok(BlobStat {
            size: u64::try_from(output.content_length().unwrap_or(0)).unwrap_or(0),
        })
    }
}

fn is_not_found<E>(err: &aws_sdk_s3::error::SdkError<E>) -> bool
where
    E: std::error::Error + 'static,
{
    err.raw_response()
        .is_some_and(|resp| resp.status().as_u16() == 404)
}

fn map_not_found<E>(content_hash: &str, err: aws_sdk_s3::error::SdkError<E>) -> StorageError
where
    E: std::error::Error + Send + Sync + 'static,
{
    if is_not_found(&err) {
        StorageError::ObjectNotFound(content_hash.to_owned())
    } else {
        StorageError::Internal(anyhow::anyhow!(err))
    }
}
