//! User quota repository: the `(app_id, user_id)`-scoped twin of
//! [`super::quota::QuotaRepo`], backing the App+User Quota Accountant.

use chrono::{Duration, Utc};
use sqlx::{AnyPool, Row};
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use crate::models::{ReservationState, UserQuota, UserQuotaReservation};
use crate::util::{fmt_ts, parse_ts};

/// Data access for `user_quotas` and `user_quota_reservations`.
#[derive(Debug, Clone)]
pub struct UserQuotaRepo {
    pool: AnyPool,
}

impl UserQuotaRepo {
    /// Build a repo over an existing pool.
    #[must_use]
    pub fn new(pool: AnyPool) -> Self {
        Self { pool }
    }

    /// Fetch the quota row for `(app_id, user_id)`, creating one with an
    /// unlimited (`None`) budget if it does not exist yet.
    pub async fn get_or_create(&self, app_id: &str, user_id: &str) -> DbResult<UserQuota> {
        if let Some(existing) = self.get(app_id, user_id).await? {
            return Ok(existing);
        }

        let now = Utc::now();
        let result = sqlx::query(
            "INSERT INTO user_quotas (app_id, user_id, quota_bytes, used_bytes, created_at) \
             VALUES (?, ?, NULL, 0, ?)",
        )
        .bind(app_id)
        .bind(user_id)
        .bind(fmt_ts(now))
        .execute(&self.pool)
        .await;

        // Another request may have raced us to create the row; either way
        // the row now exists, so fetch it fresh.
        if let Err(e) = result {
            if !matches!(&e, sqlx::Error::Database(db_err) if db_err.is_unique_violation()) {
                return Err(DbError::Sqlx(e));
            }
        }

        self.get(app_id, user_id).await?.ok_or(DbError::NotFound)
    }

    /// Fetch the quota row for `(app_id, user_id)`, if it has ever been
    /// created.
    pub async fn get(&self, app_id: &str, user_id: &str) -> DbResult<Option<UserQuota>> {
        let row = sqlx::query("SELECT * FROM user_quotas WHERE app_id = ? AND user_id = ?")
            .bind(app_id)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(|row| row_to_quota(&row)).transpose()
    }

    /// Atomically add (or subtract) bytes from a user's `used_bytes`.
    pub async fn adjust_used_bytes(&self, app_id: &str, user_id: &str, delta: i64) -> DbResult<()> {
        self.get_or_create(app_id, user_id).await?;

        let result = sqlx::query(
            "UPDATE user_quotas SET used_bytes = used_bytes + ? WHERE app_id = ? AND user_id = ?",
        )
        .bind(delta)
        .bind(app_id)
        .bind(user_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::NotFound);
        }
        Ok(())
    }

    /// Reserve `bytes` against `(app_id, user_id)` for `ttl`. Callers must
    /// check remaining quota themselves before calling this.
    pub async fn reserve(
        &self,
        app_id: &str,
        user_id: &str,
        bytes: i64,
        ttl: Duration,
    ) -> DbResult<UserQuotaReservation> {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now();
        let expires_at = now + ttl;

        sqlx::query(
            "INSERT INTO user_quota_reservations (id, app_id, user_id, reserved_bytes, state, created_at, expires_at) \
             VALUES (?, ?, ?, ?, 'reserved', ?, ?)",
        )
        .bind(&id)
        .bind(app_id)
        .bind(user_id)
        .bind(bytes)
        .bind(fmt_ts(now))
        .bind(fmt_ts(expires_at))
        .execute(&self.pool)
        .await?;

        Ok(UserQuotaReservation {
            id,
            app_id: app_id.to_owned(),
            user_id: user_id.to_owned(),
            reserved_bytes: bytes,
            state: ReservationState::Reserved,
            created_at: now,
            expires_at,
        })
    }

    /// Sum of bytes held by all still-`reserved` reservations for a scope.
    pub async fn reserved_total(&self, app_id: &str, user_id: &str) -> DbResult<i64> {
        let row = sqlx::query(
            "SELECT COALESCE(SUM(reserved_bytes), 0) AS total FROM user_quota_reservations \
             WHERE app_id = ? AND user_id = ? AND state = 'reserved'",
        )
        .bind(app_id)
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.try_get("total")?)
    }

    /// Transition a reservation from `reserved` to `committed`, CAS-guarded
    /// the same way as [`super::quota::QuotaRepo::commit`].
    pub async fn commit(&self, reservation_id: &str) -> DbResult<UserQuotaReservation> {
        let result = sqlx::query(
            "UPDATE user_quota_reservations SET state = 'committed' WHERE id = ? AND state = 'reserved'",
        )
        .bind(reservation_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::Conflict);
        }

        self.get_reservation(reservation_id).await?.ok_or(DbError::NotFound)
    }

    /// Transition a reservation from `reserved` to `released`.
    pub async fn release(&self, reservation_id: &str) -> DbResult<UserQuotaReservation> {
        let result = sqlx::query(
            "UPDATE user_quota_reservations SET state = 'released' WHERE id = ? AND state = 'reserved'",
        )
        .bind(reservation_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::Conflict);
        }

        self.get_reservation(reservation_id).await?.ok_or(DbError::NotFound)
    }

    /// Fetch a reservation by id.
    pub async fn get_reservation(&self, reservation_id: &str) -> DbResult<Option<UserQuotaReservation>> {
        let row = sqlx::query("SELECT * FROM user_quota_reservations WHERE id = ?")
            .bind(reservation_id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(|row| row_to_reservation(&row)).transpose()
    }

    /// List reservations still `reserved` past their expiry, for the
    /// background sweeper to release.
    pub async fn list_expired(&self, now: chrono::DateTime<Utc>) -> DbResult<Vec<UserQuotaReservation>> {
        let rows = sqlx::query(
            "SELECT * FROM user_quota_reservations WHERE state = 'reserved' AND expires_at < ?",
        )
        .bind(fmt_ts(now))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_reservation).collect()
    }
}

fn row_to_quota(row: &sqlx::any::AnyRow) -> DbResult<UserQuota> {
    Ok(UserQuota {
        app_id: row.try_get("app_id")?,
        user_id: row.try_get("user_id")?,
        quota_bytes: row.try_get("quota_bytes")?,
        used_bytes: row.try_get("used_bytes")?,
        created_at: parse_ts(row, "created_at")?,
    })
}

fn row_to_reservation(row: &sqlx::any::AnyRow) -> DbResult<UserQuotaReservation> {
    let state_raw: String = row.try_get("state")?;
    Ok(UserQuotaReservation {
        id: row.try_get("id")?,
        app_id: row.try_get("app_id")?,
        user_id: row.try_get("user_id")?,
        reserved_bytes: row.try_get("reserved_bytes")?,
        state: ReservationState::from_str(&state_raw).ok_or(DbError::NotFound)?,
        created_at: parse_ts(row, "created_at")?,
        expires_at: parse_ts(row, "expires_at")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_should_build_repo_without_connecting() {
        let _ = std::mem::size_of::<UserQuotaRepo>();
    }
}
