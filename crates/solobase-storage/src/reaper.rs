//! Blob reaper: the background sweep that reclaims bytes a soft-delete
//! left behind. Bucket deletion and object deletion both only flip
//! `deleted_at`; this is what actually frees disk/object-store space,
//! asynchronously, so the delete request itself stays fast.

use std::sync::Arc;

use solobase_db::Repos;
use tracing::{debug, warn};

use crate::blob::BlobBackend;
use crate::error::StorageResult;

/// Counts of work done by one [`BlobReaper::sweep`] pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReapStats {
    /// Blobs removed from the backend because no live object references
    /// their content hash anymore.
    pub blobs_deleted: u64,
    /// Soft-deleted object rows permanently removed.
    pub objects_purged: u64,
    /// Soft-deleted bucket rows permanently removed once empty.
    pub buckets_purged: u64,
}

/// Reclaims blobs and rows left behind by soft deletes.
#[derive(Clone)]
pub struct BlobReaper {
    repos: Repos,
    blobs: Arc<dyn BlobBackend>,
}

impl std::fmt::Debug for BlobReaper {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlobReaper").finish_non_exhaustive()
    }
}

impl BlobReaper {
    /// Build a reaper over the repositories and blob backend it sweeps.
    #[must_use]
    pub fn new(repos: Repos, blobs: Arc<dyn BlobBackend>) -> Self {
        Self { repos, blobs }
    }

    /// Run one sweep: cascade bucket deletion into its objects, reap blobs
    /// no live object references anymore, then purge fully-drained rows.
    ///
    /// Idempotent and safe to run concurrently with normal traffic: a
    /// content hash is only deleted from the backend after confirming no
    /// live object still points at it, and a bucket row is only purged
    /// once every object row underneath it is gone.
    pub async fn sweep(&self) -> StorageResult<ReapStats> {
        let mut stats = ReapStats::default();

        for bucket in self.repos.buckets.list_soft_deleted().await? {
            for object in self.repos.objects.list_all_in_bucket(&bucket.id).await? {
                if object.deleted_at.is_none() {
                    self.repos.objects.soft_delete(&bucket.id, &object.object_key).await?;
                }
            }
        }

        for object in self.repos.objects.list_deleted().await? {
            if !object.is_folder {
                match self.repos.objects.hash_in_use(&object.content_hash).await {
                    Ok(false) => {
                        if let Err(e) = self.blobs.delete(&object.content_hash).await {
                            warn!(object_id = %object.id, error = %e, "failed to delete orphaned blob, will retry next sweep");
                            continue;
                        }
                        stats.blobs_deleted += 1;
                    }
                    Ok(true) => {}
                    Err(e) => {
                        warn!(object_id = %object.id, error = %e, "failed to check blob reference count, skipping");
                        continue;
                    }
                }
            }

            self.repos.objects.purge(&object.id).await?;
            stats.objects_purged += 1;
        }

        for bucket in self.repos.buckets.list_soft_deleted().await? {
            if self.repos.objects.list_all_in_bucket(&bucket.id).await?.is_empty() {
                self.repos.buckets.purge(&bucket.id).await?;
                stats.buckets_purged += 1;
            }
        }

        debug!(?stats, "blob reaper sweep complete");
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blob::LocalFsBackend;
    use crate::checksums::sha256_hex;
    use crate::quota::QuotaAccountant;
    use crate::service::StorageService;
    use crate::token::TokenService;
    use bytes::Bytes;
    use chrono::Duration;
    use solobase_db::connect;

    async fn service_and_reaper() -> (StorageService, BlobReaper, Arc<dyn BlobBackend>, tempfile::TempDir) {
        let pool = connect("sqlite::memory:").await.unwrap();
        let repos = Repos::new(pool);
        let dir = tempfile::tempdir().unwrap();
        let blobs: Arc<dyn BlobBackend> = Arc::new(LocalFsBackend::open(dir.path()).await.unwrap());
        let quota = QuotaAccountant::new(repos.buckets.clone(), repos.quotas.clone(), repos.user_quotas.clone());
        let tokens = TokenService::new(repos.tokens.clone(), quota.clone(), Duration::minutes(15));
        let service = StorageService::new(repos.clone(), blobs.clone(), quota, tokens);
        let reaper = BlobReaper::new(repos, blobs.clone());
        (service, reaper, blobs, dir)
    }

    #[tokio::test]
    async fn test_should_reap_blob_after_object_deleted() {
        let (service, reaper, blobs, _dir) = service_and_reaper().await;
        service.create_bucket("solobase", "photos", "user-1", None, false).await.unwrap();

        let data = Bytes::from_static(b"hello world");
        let hash = sha256_hex(&data);
        let token = service
            .request_upload("solobase", "photos", "a.txt", "user-1", data.len() as i64)
            .await
            .unwrap();
        service.complete_upload(&token.id, data, None).await.unwrap();

        service.delete_object("solobase", "photos", "a.txt").await.unwrap();
        assert!(blobs.exists(&hash).await.unwrap());

        let stats = reaper.sweep().await.unwrap();
        assert_eq!(stats.blobs_deleted, 1);
        assert_eq!(stats.objects_purged, 1);
        assert!(!blobs.exists(&hash).await.unwrap());
    }

    #[tokio::test]
    async fn test_should_keep_blob_shared_by_another_object() {
        let (service, reaper, blobs, _dir) = service_and_reaper().await;
        service.create_bucket("solobase", "photos", "user-1", None, false).await.unwrap();

        let data = Bytes::from_static(b"shared bytes");
        let hash = sha256_hex(&data);

        let t1 = service
            .request_upload("solobase", "photos", "a.txt", "user-1", data.len() as i64)
            .await
            .unwrap();
        service.complete_upload(&t1.id, data.clone(), None).await.unwrap();

        let t2 = service
            .request_upload("solobase", "photos", "b.txt", "user-1", data.len() as i64)
            .await
            .unwrap();
        service.complete_upload(&t2.id, data, None).await.unwrap();

        service.delete_object("solobase", "photos", "a.txt").await.unwrap();

        let stats = reaper.sweep().await.unwrap();
        assert_eq!(stats.blobs_deleted, 0);
        assert_eq!(stats.objects_purged, 1);
        assert!(blobs.exists(&hash).await.unwrap());
    }

    #[tokio::test]
    async fn test_should_purge_bucket_once_all_objects_are_reaped() {
        let (service, reaper, _blobs, _dir) = service_and_reaper().await;
        let bucket = service.create_bucket("solobase", "photos", "user-1", None, false).await.unwrap();

        let data = Bytes::from_static(b"bytes");
        let token = service
            .request_upload("solobase", "photos", "a.txt", "user-1", data.len() as i64)
            .await
            .unwrap();
        service.complete_upload(&token.id, data, None).await.unwrap();

        service.delete_bucket("solobase", "photos", true).await.unwrap();

        let stats = reaper.sweep().await.unwrap();
        assert_eq!(stats.objects_purged, 1, "the bucket's still-live object must be cascaded and reaped");
        assert_eq!(stats.buckets_purged, 1, "the bucket can be purged in the same sweep once drained");

        assert!(service.list_buckets("solobase").await.unwrap().iter().all(|b| b.id != bucket.id));
    }
}
