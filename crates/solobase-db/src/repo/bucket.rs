//! Bucket repository.

use chrono::Utc;
use sqlx::{AnyPool, Row};
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use crate::models::Bucket;
use crate::util::{fmt_ts, map_write_err, parse_bool, parse_opt_ts, parse_ts};

/// Data access for the `buckets` table.
#[derive(Debug, Clone)]
pub struct BucketRepo {
    pool: AnyPool,
}

impl BucketRepo {
    /// Build a repo over an existing pool.
    #[must_use]
    pub fn new(pool: AnyPool) -> Self {
        Self { pool }
    }

    /// Create a new bucket owned by `owner_user_id`.
    pub async fn create(
        &self,
        app_id: &str,
        name: &str,
        owner_user_id: &str,
        quota_bytes: Option<i64>,
        public: bool,
    ) -> DbResult<Bucket> {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now();
        sqlx::query(
            "INSERT INTO buckets (id, app_id, name, owner_user_id, quota_bytes, used_bytes, public, created_at, deleted_at) \
             VALUES (?, ?, ?, ?, ?, 0, ?, ?, NULL)",
        )
        .bind(&id)
        .bind(app_id)
        .bind(name)
        .bind(owner_user_id)
        .bind(quota_bytes)
        .bind(i64::from(public))
        .bind(fmt_ts(now))
        .execute(&self.pool)
        .await
        .map_err(map_write_err)?;

        Ok(Bucket {
            id,
            app_id: app_id.to_owned(),
            name: name.to_owned(),
            owner_user_id: owner_user_id.to_owned(),
            quota_bytes,
            used_bytes: 0,
            public,
            created_at: now,
            deleted_at: None,
        })
    }

    /// Fetch a live (non-deleted) bucket by name.
    pub async fn get_by_name(&self, app_id: &str, name: &str) -> DbResult<Option<Bucket>> {
        let row = sqlx::query(
            "SELECT * FROM buckets WHERE app_id = ? AND name = ? AND deleted_at IS NULL",
        )
        .bind(app_id)
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|row| row_to_bucket(&row)).transpose()
    }

    /// Fetch a live bucket by id.
    pub async fn get_by_id(&self, bucket_id: &str) -> DbResult<Option<Bucket>> {
        let row = sqlx::query("SELECT * FROM buckets WHERE id = ? AND deleted_at IS NULL")
            .bind(bucket_id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(|row| row_to_bucket(&row)).transpose()
    }

    /// List all live buckets for a tenant.
    pub async fn list(&self, app_id: &str) -> DbResult<Vec<Bucket>> {
        let rows = sqlx::query("SELECT * FROM buckets WHERE app_id = ? AND deleted_at IS NULL ORDER BY name")
            .bind(app_id)
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(row_to_bucket).collect()
    }

    /// Soft-delete a bucket. Returns `Err(NotFound)` if it does not exist
    /// or is already deleted.
    pub async fn soft_delete(&self, bucket_id: &str) -> DbResult<()> {
        let result = sqlx::query("UPDATE buckets SET deleted_at = ? WHERE id = ? AND deleted_at IS NULL")
            .bind(fmt_ts(Utc::now()))
            .bind(bucket_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::NotFound);
        }
        Ok(())
    }

    /// Atomically add (or subtract, via a negative delta) bytes from
    /// `used_bytes`. Used by the quota accountant on commit/release.
    pub async fn adjust_used_bytes(&self, bucket_id: &str, delta: i64) -> DbResult<()> {
        let result = sqlx::query("UPDATE buckets SET used_bytes = used_bytes + ? WHERE id = ?")
            .bind(delta)
            .bind(bucket_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::NotFound);
        }
        Ok(())
    }

    /// List every soft-deleted bucket, across all tenants, for the
    /// background blob reaper to sweep.
    pub async fn list_soft_deleted(&self) -> DbResult<Vec<Bucket>> {
        let rows = sqlx::query("SELECT * FROM buckets WHERE deleted_at IS NOT NULL")
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(row_to_bucket).collect()
    }

    /// Permanently remove a soft-deleted bucket's row once its objects and
    /// blobs have been reaped.
    pub async fn purge(&self, bucket_id: &str) -> DbResult<()> {
        sqlx::query("DELETE FROM buckets WHERE id = ? AND deleted_at IS NOT NULL")
            .bind(bucket_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

fn row_to_bucket(row: &sqlx::any::AnyRow) -> DbResult<Bucket> {
    Ok(Bucket {
        id: row.try_get("id")?,
        app_id: row.try_get("app_id")?,
        name: row.try_get("name")?,
        owner_user_id: row.try_get("owner_user_id")?,
        quota_bytes: row.try_get("quota_bytes")?,
        used_bytes: row.try_get("used_bytes")?,
        public: parse_bool(row, "public")?,
        created_at: parse_ts(row, "created_at")?,
        deleted_at: parse_opt_ts(row, "deleted_at")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_should_build_repo_without_connecting() {
        // construction is infallible and requires no I/O; exercised here so
        // the type is covered even without a live database in CI.
        let _ = std::mem::size_of::<BucketRepo>();
    }
}
