//! Upload/download token repository backing the C4 Token Service.

use chrono::{DateTime, Duration, Utc};
use sqlx::{AnyPool, Row};
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use crate::models::{DownloadToken, TokenState, UploadToken};
use crate::util::{fmt_ts, parse_bool, parse_opt_ts, parse_ts};

/// Data access for `upload_tokens` and `download_tokens`.
#[derive(Debug, Clone)]
pub struct TokenRepo {
    pool: AnyPool,
}

impl TokenRepo {
    /// Build a repo over an existing pool.
    #[must_use]
    pub fn new(pool: AnyPool) -> Self {
        Self { pool }
    }

    /// Issue a new upload token bound to a bucket-scope and an
    /// app+user-scope quota reservation.
    #[allow(clippy::too_many_arguments)]
    pub async fn issue_upload(
        &self,
        bucket_id: &str,
        object_key: &str,
        reservation_id: &str,
        user_reservation_id: &str,
        issued_to_user: &str,
        ttl: Duration,
    ) -> DbResult<UploadToken> {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now();
        let expires_at = now + ttl;

        sqlx::query(
            "INSERT INTO upload_tokens (id, bucket_id, object_key, reservation_id, user_reservation_id, \
             issued_to_user, state, created_at, expires_at) VALUES (?, ?, ?, ?, ?, ?, 'issued', ?, ?)",
        )
        .bind(&id)
        .bind(bucket_id)
        .bind(object_key)
        .bind(reservation_id)
        .bind(user_reservation_id)
        .bind(issued_to_user)
        .bind(fmt_ts(now))
        .bind(fmt_ts(expires_at))
        .execute(&self.pool)
        .await?;

        Ok(UploadToken {
            id,
            bucket_id: bucket_id.to_owned(),
            object_key: object_key.to_owned(),
            reservation_id: reservation_id.to_owned(),
            user_reservation_id: user_reservation_id.to_owned(),
            issued_to_user: issued_to_user.to_owned(),
            state: TokenState::Issued,
            created_at: now,
            expires_at,
        })
    }

    /// Look up an upload token still in the `issued` state, without
    /// consuming it.
    pub async fn get_upload(&self, token_id: &str) -> DbResult<Option<UploadToken>> {
        let row = sqlx::query("SELECT * FROM upload_tokens WHERE id = ?")
            .bind(token_id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(|row| row_to_upload(&row)).transpose()
    }

    /// Atomically consume an upload token: succeeds only if it is still
    /// `issued`, preventing a token from completing two uploads.
    pub async fn consume_upload(&self, token_id: &str) -> DbResult<UploadToken> {
        let result = sqlx::query("UPDATE upload_tokens SET state = 'consumed' WHERE id = ? AND state = 'issued'")
            .bind(token_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::Conflict);
        }

        self.get_upload(token_id).await?.ok_or(DbError::NotFound)
    }

    /// List upload tokens still `issued` past their expiry, for the token
    /// sweeper.
    pub async fn list_expired_uploads(&self, now: DateTime<Utc>) -> DbResult<Vec<UploadToken>> {
        let rows = sqlx::query("SELECT * FROM upload_tokens WHERE state = 'issued' AND expires_at < ?")
            .bind(fmt_ts(now))
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(row_to_upload).collect()
    }

    /// Mark an upload token expired (sweeper-driven, idempotent).
    pub async fn mark_upload_expired(&self, token_id: &str) -> DbResult<()> {
        sqlx::query("UPDATE upload_tokens SET state = 'expired' WHERE id = ? AND state = 'issued'")
            .bind(token_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Issue a download token for an object.
    pub async fn issue_download(
        &self,
        bucket_id: &str,
        object_key: &str,
        issued_to_user: &str,
        single_use: bool,
        ttl: Duration,
    ) -> DbResult<DownloadToken> {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now();
        let expires_at = now + ttl;

        sqlx::query(
            "INSERT INTO download_tokens (id, bucket_id, object_key, issued_to_user, single_use, \
             consumed_at, created_at, expires_at) VALUES (?, ?, ?, ?, ?, NULL, ?, ?)",
        )
        .bind(&id)
        .bind(bucket_id)
        .bind(object_key)
        .bind(issued_to_user)
        .bind(i64::from(single_use))
        .bind(fmt_ts(now))
        .bind(fmt_ts(expires_at))
        .execute(&self.pool)
        .await?;

        Ok(DownloadToken {
            id,
            bucket_id: bucket_id.to_owned(),
            object_key: object_key.to_owned(),
            issued_to_user: issued_to_user.to_owned(),
            single_use,
            consumed_at: None,
            created_at: now,
            expires_at,
        })
    }

    /// Fetch a download token by id.
    pub async fn get_download(&self, token_id: &str) -> DbResult<Option<DownloadToken>> {
        let row = sqlx::query("SELECT * FROM download_tokens WHERE id = ?")
            .bind(token_id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(|row| row_to_download(&row)).transpose()
    }

    /// Mark a single-use download token consumed. A no-op (but not an
    /// error) for reusable tokens, matching the reuse-scoping decision for
    /// non-single-use tokens.
    pub async fn consume_download(&self, token_id: &str) -> DbResult<DownloadToken> {
        let existing = self.get_download(token_id).await?.ok_or(DbError::NotFound)?;

        if !existing.single_use {
            return Ok(existing);
        }

        if existing.consumed_at.is_some() {
            return Err(DbError::Conflict);
        }

        let result = sqlx::query("UPDATE download_tokens SET consumed_at = ? WHERE id = ? AND consumed_at IS NULL")
            .bind(fmt_ts(Utc::now()))
            .bind(token_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::Conflict);
        }

        self.get_download(token_id).await?.ok_or(DbError::NotFound)
    }
}

fn row_to_upload(row: &sqlx::any::AnyRow) -> DbResult<UploadToken> {
    let state_raw: String = row.try_get("state")?;
    Ok(UploadToken {
        id: row.try_get("id")?,
        bucket_id: row.try_get("bucket_id")?,
        object_key: row.try_get("object_key")?,
        reservation_id: row.try_get("reservation_id")?,
        user_reservation_id: row.try_get("user_reservation_id")?,
        issued_to_user: row.try_get("issued_to_user")?,
        state: TokenState::from_str(&state_raw).ok_or(DbError::NotFound)?,
        created_at: parse_ts(row, "created_at")?,
        expires_at: parse_ts(row, "expires_at")?,
    })
}

fn row_to_download(row: &sqlx::any::AnyRow) -> DbResult<DownloadToken> {
    Ok(DownloadToken {
        id: row.try_get("id")?,
        bucket_id: row.try_get("bucket_id")?,
        object_key: row.try_get("object_key")?,
        issued_to_user: row.try_get("issued_to_user")?,
        single_use: parse_bool(row, "single_use")?,
        consumed_at: parse_opt_ts(row, "consumed_at")?,
        created_at: parse_ts(row, "created_at")?,
        expires_at: parse_ts(row, "expires_at")?,
    })
}
