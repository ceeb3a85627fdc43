//! Quota reservation repository backing the C3 Quota Accountant's
//! reserve/commit/release lifecycle.

use chrono::{Duration, Utc};
use sqlx::{AnyPool, Row};
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use crate::models::{QuotaReservation, ReservationState};
use crate::util::{fmt_ts, parse_ts};

/// Data access for the `quota_reservations` table.
#[derive(Debug, Clone)]
pub struct QuotaRepo {
    pool: AnyPool,
}

impl QuotaRepo {
    /// Build a repo over an existing pool.
    #[must_use]
    pub fn new(pool: AnyPool) -> Self {
        Self { pool }
    }

    /// Reserve `bytes` against a bucket for `ttl`. Callers must check the
    /// bucket's remaining quota themselves before calling this; the
    /// reservation row only records the hold.
    pub async fn reserve(&self, bucket_id: &str, bytes: i64, ttl: Duration) -> DbResult<QuotaReservation> {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now();
        let expires_at = now + ttl;

        sqlx::query(
            "INSERT INTO quota_reservations (id, bucket_id, reserved_bytes, state, created_at, expires_at) \
             VALUES (?, ?, ?, 'reserved', ?, ?)",
        )
        .bind(&id)
        .bind(bucket_id)
        .bind(bytes)
        .bind(fmt_ts(now))
        .bind(fmt_ts(expires_at))
        .execute(&self.pool)
        .await?;

        Ok(QuotaReservation {
            id,
            bucket_id: bucket_id.to_owned(),
            reserved_bytes: bytes,
            state: ReservationState::Reserved,
            created_at: now,
            expires_at,
        })
    }

    /// Sum of bytes held by all still-`reserved` reservations for a bucket.
    pub async fn reserved_total(&self, bucket_id: &str) -> DbResult<i64> {
        let row = sqlx::query(
            "SELECT COALESCE(SUM(reserved_bytes), 0) AS total FROM quota_reservations \
             WHERE bucket_id = ? AND state = 'reserved'",
        )
        .bind(bucket_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.try_get("total")?)
    }

    /// Transition a reservation from `reserved` to `committed`. This is a
    /// compare-and-swap on `state`: the row only updates if it is still
    /// `reserved`, so a reservation can never be committed twice.
    pub async fn commit(&self, reservation_id: &str) -> DbResult<QuotaReservation> {
        let result = sqlx::query(
            "UPDATE quota_reservations SET state = 'committed' WHERE id = ? AND state = 'reserved'",
        )
        .bind(reservation_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::Conflict);
        }

        self.get(reservation_id).await?.ok_or(DbError::NotFound)
    }

    /// Transition a reservation from `reserved` to `released`, same CAS
    /// semantics as [`Self::commit`].
    pub async fn release(&self, reservation_id: &str) -> DbResult<QuotaReservation> {
        let result = sqlx::query(
            "UPDATE quota_reservations SET state = 'released' WHERE id = ? AND state = 'reserved'",
        )
        .bind(reservation_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::Conflict);
        }

        self.get(reservation_id).await?.ok_or(DbError::NotFound)
    }

    /// Fetch a reservation by id.
    pub async fn get(&self, reservation_id: &str) -> DbResult<Option<QuotaReservation>> {
        let row = sqlx::query("SELECT * FROM quota_reservations WHERE id = ?")
            .bind(reservation_id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(|row| row_to_reservation(&row)).transpose()
    }

    /// List reservations still `reserved` past their expiry, for the
    /// background sweeper to release.
    pub async fn list_expired(&self, now: chrono::DateTime<Utc>) -> DbResult<Vec<QuotaReservation>> {
        let rows = sqlx::query("SELECT * FROM quota_reservations WHERE state = 'reserved' AND expires_at < ?")
            .bind(fmt_ts(now))
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(row_to_reservation).collect()
    }
}

fn row_to_reservation(row: &sqlx::any::AnyRow) -> DbResult<QuotaReservation> {
    let state_raw: String = row.try_get("state")?;
    Ok(QuotaReservation {
        id: row.try_get("id")?,
        bucket_id: row.try_get("bucket_id")?,
        reserved_bytes: row.try_get("reserved_bytes")?,
        state: ReservationState::from_str(&state_raw).ok_or(DbError::NotFound)?,
        created_at: parse_ts(row, "created_at")?,
        expires_at: parse_ts(row, "expires_at")?,
    })
}
