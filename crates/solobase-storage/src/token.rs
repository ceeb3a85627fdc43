//! Token service (C4): single-use credentials gating resumable uploads and
//! downloads.

use chrono::{Duration, Utc};
use solobase_db::{DownloadToken, TokenRepo, UploadToken};
use tracing::warn;

use crate::error::{StorageError, StorageResult};
use crate::quota::QuotaAccountant;

/// Issues and consumes upload/download tokens.
#[derive(Debug, Clone)]
pub struct TokenService {
    tokens: TokenRepo,
    quota: QuotaAccountant,
    default_ttl: Duration,
}

impl TokenService {
    /// Build a token service over the token repository and quota
    /// accountant, using `default_ttl` for newly issued tokens.
    #[must_use]
    pub fn new(tokens: TokenRepo, quota: QuotaAccountant, default_ttl: Duration) -> Self {
        Self {
            tokens,
            quota,
            default_ttl,
        }
    }

    /// Reserve bucket-scope and app+user-scope quota and issue an upload
    /// token for `object_key` in `bucket_id`, sized at `expected_bytes`.
    pub async fn issue_upload(
        &self,
        app_id: &str,
        bucket_id: &str,
        object_key: &str,
        issued_to_user: &str,
        expected_bytes: i64,
    ) -> StorageResult<UploadToken> {
        let reservation = self.quota.reserve(bucket_id, expected_bytes, self.default_ttl).await?;

        let user_reservation = match self
            .quota
            .reserve_user(app_id, issued_to_user, expected_bytes, self.default_ttl)
            .await
        {
            Ok(r) => r,
            Err(e) => {
                if let Err(release_err) = self.quota.release(&reservation.id).await {
                    warn!(error = %release_err, "failed to release bucket reservation after user reservation failure");
                }
                return Err(e);
            }
        };

        match self
            .tokens
            .issue_upload(
                bucket_id,
                object_key,
                &reservation.id,
                &user_reservation.id,
                issued_to_user,
                self.default_ttl,
            )
            .await
        {
            Ok(token) => Ok(token),
            Err(e) => {
                // Issuing the token row failed after both reservations were
                // already taken; release them so neither quota is leaked.
                if let Err(release_err) = self.quota.release(&reservation.id).await {
                    warn!(error = %release_err, "failed to release bucket reservation after token issuance failure");
                }
                if let Err(release_err) = self.quota.release_user(&user_reservation.id).await {
                    warn!(error = %release_err, "failed to release user reservation after token issuance failure");
                }
                Err(e.into())
            }
        }
    }

    /// Look up an upload token by id without consuming it.
    pub async fn get_upload(&self, token_id: &str) -> StorageResult<UploadToken> {
        self.tokens
            .get_upload(token_id)
            .await?
            .ok_or(StorageError::InvalidToken)
    }

    /// Consume an upload token, committing both of its reservations.
    /// Callers must have already written the blob before calling this.
    pub async fn consume_upload(&self, token_id: &str) -> StorageResult<UploadToken> {
        let token = self
            .tokens
            .consume_upload(token_id)
            .await
            .map_err(|_| StorageError::InvalidToken)?;

        self.quota.commit(&token.reservation_id).await?;
        self.quota.commit_user(&token.user_reservation_id).await?;

        Ok(token)
    }

    /// Release an upload token without completing it (client abort).
    pub async fn abandon_upload(&self, token_id: &str) -> StorageResult<()> {
        let token = self.get_upload(token_id).await?;
        self.quota.release(&token.reservation_id).await?;
        self.quota.release_user(&token.user_reservation_id).await?;
        Ok(())
    }

    /// Issue a download token. `single_use = false` tokens remain valid
    /// until expiry regardless of prior use (the resolved download-token
    /// reuse scoping: scoped to one object, not one request).
    pub async fn issue_download(
        &self,
        bucket_id: &str,
        object_key: &str,
        issued_to_user: &str,
        single_use: bool,
    ) -> StorageResult<DownloadToken> {
        Ok(self
            .tokens
            .issue_download(bucket_id, object_key, issued_to_user, single_use, self.default_ttl)
            .await?)
    }

    /// Validate and consume a download token, checking expiry explicitly
    /// since the sweeper only reaps rows lazily.
    pub async fn consume_download(&self, token_id: &str) -> StorageResult<DownloadToken> {
        let token = self
            .tokens
            .consume_download(token_id)
            .await
            .map_err(|_| StorageError::InvalidToken)?;

        if token.expires_at < Utc::now() {
            return Err(StorageError::InvalidToken);
        }

        Ok(token)
    }

    /// Mark expired-but-unconsumed upload tokens expired and release both
    /// of their reservations. Run periodically by the background token
    /// sweeper.
    pub async fn sweep_expired(&self) -> StorageResult<usize> {
        let expired = self.tokens.list_expired_uploads(Utc::now()).await?;
        let mut swept = 0;

        for token in &expired {
            if let Err(e) = self.quota.release(&token.reservation_id).await {
                warn!(token_id = %token.id, error = %e, "failed to release reservation for expired upload token");
                continue;
            }
            if let Err(e) = self.quota.release_user(&token.user_reservation_id).await {
                warn!(token_id = %token.id, error = %e, "failed to release user reservation for expired upload token");
                continue;
            }
            if let Err(e) = self.tokens.mark_upload_expired(&token.id).await {
                warn!(token_id = %token.id, error = %e, "failed to mark upload token expired");
                continue;
            }
            swept += 1;
        }

        Ok(swept)
    }
}
