//! Quota accountant (C3): reserve/commit/release byte budgets against a
//! bucket and, independently, against the `(app_id, user_id)` that owns the
//! bytes, guarding every write path against racing uploads overrunning
//! either budget.

use chrono::Duration;
use solobase_db::{BucketRepo, QuotaRepo, QuotaReservation, UserQuotaRepo, UserQuotaReservation};
use tracing::warn;

use crate::error::{StorageError, StorageResult};

/// Reserves, commits, and releases byte budgets against bucket quotas and
/// app+user quotas.
#[derive(Debug, Clone)]
pub struct QuotaAccountant {
    buckets: BucketRepo,
    quotas: QuotaRepo,
    user_quotas: UserQuotaRepo,
}

impl QuotaAccountant {
    /// Build an accountant over the bucket, quota, and user-quota
    /// repositories.
    #[must_use]
    pub fn new(buckets: BucketRepo, quotas: QuotaRepo, user_quotas: UserQuotaRepo) -> Self {
        Self {
            buckets,
            quotas,
            user_quotas,
        }
    }

    /// Reserve `bytes` against `bucket_id`'s quota for `ttl`.
    ///
    /// Rejects the reservation if `used_bytes + sum(reserved) + bytes`
    /// would exceed the bucket's configured quota. A `None` quota means
    /// unlimited.
    pub async fn reserve(&self, bucket_id: &str, bytes: i64, ttl: Duration) -> StorageResult<QuotaReservation> {
        let bucket = self
            .buckets
            .get_by_id(bucket_id)
            .await?
            .ok_or_else(|| StorageError::BucketNotFound(bucket_id.to_owned()))?;

        if let Some(quota_bytes) = bucket.quota_bytes {
            let already_reserved = self.quotas.reserved_total(bucket_id).await?;
            let available = quota_bytes - bucket.used_bytes - already_reserved;
            if bytes > available {
                return Err(StorageError::QuotaExceeded {
                    requested: bytes,
                    available: available.max(0),
                });
            }
        }

        Ok(self.quotas.reserve(bucket_id, bytes, ttl).await?)
    }

    /// Commit a reservation, moving its bytes into the bucket's
    /// `used_bytes` total. Idempotent failures (already committed/released)
    /// surface as [`StorageError::InvalidToken`].
    pub async fn commit(&self, reservation_id: &str) -> StorageResult<()> {
        let reservation = self
            .quotas
            .commit(reservation_id)
            .await
            .map_err(|_| StorageError::InvalidToken)?;

        self.buckets
            .adjust_used_bytes(&reservation.bucket_id, reservation.reserved_bytes)
            .await?;

        Ok(())
    }

    /// Release a reservation without committing it, freeing its bytes
    /// back to the bucket's available headroom.
    pub async fn release(&self, reservation_id: &str) -> StorageResult<()> {
        self.quotas
            .release(reservation_id)
            .await
            .map_err(|_| StorageError::InvalidToken)?;
        Ok(())
    }

    /// Reserve `bytes` against `(app_id, user_id)`'s own budget for `ttl`,
    /// independent of any bucket's quota.
    pub async fn reserve_user(
        &self,
        app_id: &str,
        user_id: &str,
        bytes: i64,
        ttl: Duration,
    ) -> StorageResult<UserQuotaReservation> {
        let quota = self.user_quotas.get_or_create(app_id, user_id).await?;

        if let Some(quota_bytes) = quota.quota_bytes {
            let already_reserved = self.user_quotas.reserved_total(app_id, user_id).await?;
            let available = quota_bytes - quota.used_bytes - already_reserved;
            if bytes > available {
                return Err(StorageError::QuotaExceeded {
                    requested: bytes,
                    available: available.max(0),
                });
            }
        }

        Ok(self.user_quotas.reserve(app_id, user_id, bytes, ttl).await?)
    }

    /// Commit an app+user reservation, moving its bytes into the user's
    /// `used_bytes` total.
    pub async fn commit_user(&self, reservation_id: &str) -> StorageResult<()> {
        let reservation = self
            .user_quotas
            .commit(reservation_id)
            .await
            .map_err(|_| StorageError::InvalidToken)?;

        self.user_quotas
            .adjust_used_bytes(&reservation.app_id, &reservation.user_id, reservation.reserved_bytes)
            .await?;

        Ok(())
    }

    /// Release an app+user reservation without committing it.
    pub async fn release_user(&self, reservation_id: &str) -> StorageResult<()> {
        self.user_quotas
            .release(reservation_id)
            .await
            .map_err(|_| StorageError::InvalidToken)?;
        Ok(())
    }

    /// Sweep reservations (both bucket-scope and app+user-scope) that
    /// expired without being committed or released, returning them to the
    /// pool. Run periodically by the background reservation sweeper.
    pub async fn sweep_expired(&self) -> StorageResult<usize> {
        let expired = self.quotas.list_expired(chrono::Utc::now()).await?;
        let mut released = 0;

        for reservation in &expired {
            match self.quotas.release(&reservation.id).await {
                Ok(_) => released += 1,
                Err(e) => warn!(reservation_id = %reservation.id, error = %e, "failed to sweep expired reservation"),
            }
        }

        let expired_user = self.user_quotas.list_expired(chrono::Utc::now()).await?;
        for reservation in &expired_user {
            match self.user_quotas.release(&reservation.id).await {
                Ok(_) => released += 1,
                Err(e) => {
                    warn!(reservation_id = %reservation.id, error = %e, "failed to sweep expired user reservation");
                }
            }
        }

        Ok(released)
    }
}
