//! Storage service (C5): the orchestration layer tying together bucket and
//! object metadata, the blob backend, the quota accountant, and the token
//! service into the operations the HTTP surface calls.

use std::sync::Arc;

use bytes::Bytes;
use solobase_db::{Bucket, Object, Repos};

use crate::blob::BlobBackend;
use crate::checksums::sha256_hex;
use crate::error::{StorageError, StorageResult};
use crate::quota::QuotaAccountant;
use crate::token::TokenService;
use crate::validation::{validate_bucket_name, validate_object_key};

/// A completed download: the object's metadata plus its bytes.
#[derive(Debug, Clone)]
pub struct DownloadedObject {
    /// The object's metadata row.
    pub object: Object,
    /// The object's content.
    pub data: Bytes,
}

/// Identity of the caller performing a storage operation, used to gate
/// ownership-scoped access to objects addressed directly by id. Built by the
/// HTTP layer from verified [`solobase_auth::Claims`].
#[derive(Debug, Clone)]
pub struct Caller {
    /// The authenticated user's id.
    pub user_id: String,
    /// The caller's tenant.
    pub app_id: String,
    /// Whether the caller holds the `admin` role, bypassing ownership
    /// checks entirely.
    pub is_admin: bool,
}

/// Orchestrates bucket and object operations across metadata, blobs, and
/// quota.
#[derive(Clone)]
pub struct StorageService {
    repos: Repos,
    blobs: Arc<dyn BlobBackend>,
    quota: QuotaAccountant,
    tokens: TokenService,
}

impl std::fmt::Debug for StorageService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageService").finish_non_exhaustive()
    }
}

impl StorageService {
    /// Build the storage service over its dependencies.
    #[must_use]
    pub fn new(repos: Repos, blobs: Arc<dyn BlobBackend>, quota: QuotaAccountant, tokens: TokenService) -> Self {
        Self {
            repos,
            blobs,
            quota,
            tokens,
        }
    }

    /// Create a new bucket owned by `owner_user_id`.
    pub async fn create_bucket(
        &self,
        app_id: &str,
        name: &str,
        owner_user_id: &str,
        quota_bytes: Option<i64>,
        public: bool,
    ) -> StorageResult<Bucket> {
        validate_bucket_name(name)?;

        if self.repos.buckets.get_by_name(app_id, name).await?.is_some() {
            return Err(StorageError::BucketAlreadyExists(name.to_owned()));
        }

        Ok(self.repos.buckets.create(app_id, name, owner_user_id, quota_bytes, public).await?)
    }

    /// Soft-delete a bucket. Fails with [`StorageError::BucketNotEmpty`]
    /// unless the bucket has no live objects, or `force` is set, in which
    /// case every live object is soft-deleted along with the bucket (blobs
    /// are reaped asynchronously, same as any other delete).
    pub async fn delete_bucket(&self, app_id: &str, name: &str, force: bool) -> StorageResult<()> {
        let bucket = self.get_bucket(app_id, name).await?;

        let live_objects = self.repos.objects.list_prefix(&bucket.id, "").await?;
        if !live_objects.is_empty() {
            if !force {
                return Err(StorageError::BucketNotEmpty(name.to_owned()));
            }
            for object in &live_objects {
                self.repos.objects.soft_delete(&bucket.id, &object.object_key).await?;
            }
        }

        Ok(self.repos.buckets.soft_delete(&bucket.id).await?)
    }

    /// List every live bucket in a tenant.
    pub async fn list_buckets(&self, app_id: &str) -> StorageResult<Vec<Bucket>> {
        Ok(self.repos.buckets.list(app_id).await?)
    }

    async fn get_bucket(&self, app_id: &str, name: &str) -> StorageResult<Bucket> {
        self.repos
            .buckets
            .get_by_name(app_id, name)
            .await?
            .ok_or_else(|| StorageError::BucketNotFound(name.to_owned()))
    }

    async fn get_bucket_by_id(&self, bucket_id: &str) -> StorageResult<Bucket> {
        self.repos
            .buckets
            .get_by_id(bucket_id)
            .await?
            .ok_or_else(|| StorageError::BucketNotFound(bucket_id.to_owned()))
    }

    /// Resolve the id of the folder marker that directly contains `key`,
    /// if one has been explicitly created. `None` for root-level keys or
    /// keys whose parent folder was never materialized.
    async fn resolve_parent_folder_id(&self, bucket_id: &str, key: &str) -> StorageResult<Option<String>> {
        match key.rfind('/') {
            Some(0) | None => Ok(None),
            Some(idx) => {
                let parent_key = &key[..idx];
                Ok(self.repos.objects.get_by_key(bucket_id, parent_key).await?.map(|o| o.id))
            }
        }
    }

    /// Check that `caller` may access `object`, which lives in `bucket`.
    /// Admins always pass. When `allow_public_bypass` is set (read paths
    /// only; writes always require ownership), a public bucket also
    /// bypasses the check.
    fn check_object_access(
        &self,
        object: &Object,
        bucket: &Bucket,
        caller: &Caller,
        allow_public_bypass: bool,
    ) -> StorageResult<()> {
        if caller.is_admin {
            return Ok(());
        }
        if allow_public_bypass && bucket.public {
            return Ok(());
        }

        let is_owner = object.user_id == caller.user_id
            && (caller.app_id.is_empty() || object.app_id == caller.app_id);

        if is_owner {
            Ok(())
        } else {
            Err(StorageError::Forbidden)
        }
    }

    /// Create a zero-byte folder marker.
    pub async fn create_folder(
        &self,
        app_id: &str,
        bucket_name: &str,
        key: &str,
        user_id: &str,
    ) -> StorageResult<Object> {
        validate_object_key(key)?;
        let bucket = self.get_bucket(app_id, bucket_name).await?;

        if self.repos.objects.get_by_key(&bucket.id, key).await?.is_some() {
            return Err(StorageError::ObjectAlreadyExists(key.to_owned()));
        }

        let parent_folder_id = self.resolve_parent_folder_id(&bucket.id, key).await?;
        Ok(self
            .repos
            .objects
            .create_folder(&bucket.id, key, user_id, app_id, parent_folder_id.as_deref())
            .await?)
    }

    /// Begin a resumable upload: reserve quota and issue an upload token.
    /// The caller streams bytes to a later `complete_upload` call.
    pub async fn request_upload(
        &self,
        app_id: &str,
        bucket_name: &str,
        key: &str,
        user_id: &str,
        expected_bytes: i64,
    ) -> StorageResult<solobase_db::UploadToken> {
        validate_object_key(key)?;
        let bucket = self.get_bucket(app_id, bucket_name).await?;
        self.tokens.issue_upload(app_id, &bucket.id, key, user_id, expected_bytes).await
    }

    /// Complete an upload: verify the uploaded bytes, write them to the
    /// blob backend, record object metadata, and consume the token.
    ///
    /// Rejects the upload with [`StorageError::QuotaExceeded`] if the
    /// actual uploaded length exceeds the `expected_bytes` cap declared
    /// when the token was issued; without this check a short declaration
    /// followed by a larger upload would let a bucket's `used_bytes`
    /// permanently drift from the true sum of its object sizes.
    pub async fn complete_upload(
        &self,
        token_id: &str,
        data: Bytes,
        content_type: Option<&str>,
    ) -> StorageResult<Object> {
        let token = self.tokens.get_upload(token_id).await?;

        let content_hash = sha256_hex(&data);
        let size_bytes = i64::try_from(data.len()).unwrap_or(i64::MAX);

        let reservation = self
            .repos
            .quotas
            .get(&token.reservation_id)
            .await?
            .ok_or(StorageError::InvalidToken)?;
        if size_bytes > reservation.reserved_bytes {
            return Err(StorageError::QuotaExceeded {
                requested: size_bytes,
                available: reservation.reserved_bytes,
            });
        }

        self.blobs.put(&content_hash, data).await?;

        let bucket = self.get_bucket_by_id(&token.bucket_id).await?;
        let parent_folder_id = self.resolve_parent_folder_id(&token.bucket_id, &token.object_key).await?;

        let object = self
            .repos
            .objects
            .upsert(
                &token.bucket_id,
                &token.object_key,
                &content_hash,
                size_bytes,
                content_type,
                &token.issued_to_user,
                &bucket.app_id,
                parent_folder_id.as_deref(),
            )
            .await?;

        self.tokens.consume_upload(token_id).await?;

        Ok(object)
    }

    /// Abort an in-progress upload, releasing its quota reservation.
    pub async fn abort_upload(&self, token_id: &str) -> StorageResult<()> {
        self.tokens.abandon_upload(token_id).await
    }

    /// Issue a download token for an object and immediately resolve it to
    /// bytes, for callers that don't need a separate redeem step.
    pub async fn download(
        &self,
        app_id: &str,
        bucket_name: &str,
        key: &str,
        user_id: &str,
    ) -> StorageResult<DownloadedObject> {
        let bucket = self.get_bucket(app_id, bucket_name).await?;
        let object = self
            .repos
            .objects
            .get_by_key(&bucket.id, key)
            .await?
            .ok_or_else(|| StorageError::ObjectNotFound(key.to_owned()))?;

        let token = self.tokens.issue_download(&bucket.id, key, user_id, true).await?;
        self.tokens.consume_download(&token.id).await?;

        let data = self.blobs.get(&object.content_hash).await?;

        Ok(DownloadedObject { object, data })
    }

    /// Redeem a previously issued download token.
    pub async fn download_with_token(&self, token_id: &str) -> StorageResult<DownloadedObject> {
        let token = self.tokens.consume_download(token_id).await?;

        let object = self
            .repos
            .objects
            .get_by_key(&token.bucket_id, &token.object_key)
            .await?
            .ok_or_else(|| StorageError::ObjectNotFound(token.object_key.clone()))?;

        let data = self.blobs.get(&object.content_hash).await?;

        Ok(DownloadedObject { object, data })
    }

    /// Soft-delete an object and release its bytes from the bucket's quota.
    pub(crate) async fn delete_object(&self, app_id: &str, bucket_name: &str, key: &str) -> StorageResult<()> {
        let bucket = self.get_bucket(app_id, bucket_name).await?;
        let deleted = self.repos.objects.soft_delete(&bucket.id, key).await?;
        if !deleted.is_folder {
            self.repos.buckets.adjust_used_bytes(&bucket.id, -deleted.size_bytes).await?;
            self.repos
                .user_quotas
                .adjust_used_bytes(&deleted.app_id, &deleted.user_id, -deleted.size_bytes)
                .await?;
        }
        Ok(())
    }

    /// Fetch a live object by id, regardless of which bucket it lives in.
    pub async fn get_object(&self, object_id: &str) -> StorageResult<Object> {
        self.repos
            .objects
            .get_by_id(object_id)
            .await?
            .ok_or_else(|| StorageError::ObjectNotFound(object_id.to_owned()))
    }

    /// Download an object directly by id, bypassing the upload/download
    /// token flow used for resumable transfers. Requires ownership, unless
    /// the caller is an admin or the bucket is public.
    pub async fn download_by_id(&self, object_id: &str, caller: &Caller) -> StorageResult<DownloadedObject> {
        let object = self.get_object(object_id).await?;
        let bucket = self.get_bucket_by_id(&object.bucket_id).await?;
        self.check_object_access(&object, &bucket, caller, true)?;

        let data = self.blobs.get(&object.content_hash).await?;
        Ok(DownloadedObject { object, data })
    }

    /// Soft-delete an object by id, releasing its bytes from the bucket's
    /// quota. Requires ownership (or admin); bucket-public never bypasses
    /// a write.
    pub async fn delete_object_by_id(&self, object_id: &str, caller: &Caller) -> StorageResult<()> {
        let object = self.get_object(object_id).await?;
        let bucket = self.get_bucket_by_id(&object.bucket_id).await?;
        self.check_object_access(&object, &bucket, caller, false)?;

        self.delete_object(&bucket.app_id, &bucket.name, &object.object_key).await
    }

    /// Rename and/or move an object addressed by id. `new_bucket_name`
    /// defaults to the object's current bucket; `new_key` defaults to its
    /// current key. Requires ownership (or admin).
    pub async fn patch_object(
        &self,
        app_id: &str,
        object_id: &str,
        new_key: Option<&str>,
        new_bucket_name: Option<&str>,
        caller: &Caller,
    ) -> StorageResult<Object> {
        let object = self.get_object(object_id).await?;
        let src_bucket = self.get_bucket_by_id(&object.bucket_id).await?;
        self.check_object_access(&object, &src_bucket, caller, false)?;

        let dst_key = new_key.unwrap_or(&object.object_key);
        let dst_bucket_name = new_bucket_name.unwrap_or(&src_bucket.name);

        if dst_bucket_name == src_bucket.name && dst_key == object.object_key {
            return Ok(object);
        }

        self.move_object(app_id, &src_bucket.name, &object.object_key, dst_bucket_name, dst_key).await
    }

    /// Rename/move an object within the same bucket.
    pub async fn rename_object(
        &self,
        app_id: &str,
        bucket_name: &str,
        from_key: &str,
        to_key: &str,
    ) -> StorageResult<Object> {
        validate_object_key(to_key)?;
        let bucket = self.get_bucket(app_id, bucket_name).await?;
        let parent_folder_id = self.resolve_parent_folder_id(&bucket.id, to_key).await?;
        Ok(self.repos.objects.rename(&bucket.id, from_key, to_key, parent_folder_id.as_deref()).await?)
    }

    /// Move an object to a different bucket and/or key. Implemented as a
    /// copy-then-delete since the two buckets may carry independent
    /// quotas; the blob itself is never duplicated on disk, only the
    /// metadata row and the quota reservation.
    pub async fn move_object(
        &self,
        app_id: &str,
        src_bucket_name: &str,
        src_key: &str,
        dst_bucket_name: &str,
        dst_key: &str,
    ) -> StorageResult<Object> {
        validate_object_key(dst_key)?;

        let src_bucket = self.get_bucket(app_id, src_bucket_name).await?;
        let dst_bucket = self.get_bucket(app_id, dst_bucket_name).await?;

        let src_object = self
            .repos
            .objects
            .get_by_key(&src_bucket.id, src_key)
            .await?
            .ok_or_else(|| StorageError::ObjectNotFound(src_key.to_owned()))?;

        if self.repos.objects.get_by_key(&dst_bucket.id, dst_key).await?.is_some() {
            return Err(StorageError::ObjectAlreadyExists(dst_key.to_owned()));
        }

        if src_bucket.id == dst_bucket.id {
            let parent_folder_id = self.resolve_parent_folder_id(&src_bucket.id, dst_key).await?;
            return Ok(self
                .repos
                .objects
                .rename(&src_bucket.id, src_key, dst_key, parent_folder_id.as_deref())
                .await?);
        }

        let reservation = self
            .quota
            .reserve(&dst_bucket.id, src_object.size_bytes, chrono::Duration::minutes(15))
            .await?;

        let parent_folder_id = self.resolve_parent_folder_id(&dst_bucket.id, dst_key).await?;
        let dst_object = self
            .repos
            .objects
            .upsert(
                &dst_bucket.id,
                dst_key,
                &src_object.content_hash,
                src_object.size_bytes,
                src_object.content_type.as_deref(),
                &src_object.user_id,
                &src_object.app_id,
                parent_folder_id.as_deref(),
            )
            .await?;

        self.quota.commit(&reservation.id).await?;
        self.repos.objects.soft_delete(&src_bucket.id, src_key).await?;
        self.repos.buckets.adjust_used_bytes(&src_bucket.id, -src_object.size_bytes).await?;

        Ok(dst_object)
    }

    /// List objects under a key prefix.
    pub async fn list_objects(&self, app_id: &str, bucket_name: &str, prefix: &str) -> StorageResult<Vec<Object>> {
        let bucket = self.get_bucket(app_id, bucket_name).await?;
        Ok(self.repos.objects.list_prefix(&bucket.id, prefix).await?)
    }

    /// Counts of soft-deleted rows still awaiting the background blob
    /// reaper. Nonzero counts are expected under steady delete traffic;
    /// they only indicate a problem if they grow without bound.
    pub async fn integrity_report(&self) -> StorageResult<IntegrityReport> {
        let buckets_pending_reap = self.repos.buckets.list_soft_deleted().await?.len();
        let objects_pending_reap = self.repos.objects.list_deleted().await?.len();
        Ok(IntegrityReport { buckets_pending_reap, objects_pending_reap })
    }
}

/// Snapshot of not-yet-reaped rows, reported by the admin health endpoint.
#[derive(Debug, Clone, Copy, Default)]
pub struct IntegrityReport {
    /// Soft-deleted buckets whose objects haven't all been purged yet.
    pub buckets_pending_reap: usize,
    /// Soft-deleted objects whose blobs haven't been reaped yet.
    pub objects_pending_reap: usize,
}
