//! Object repository.

use chrono::Utc;
use sqlx::{AnyPool, Row};
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use crate::models::Object;
use crate::util::{fmt_ts, map_write_err, parse_opt_ts, parse_ts};

/// Data access for the `objects` table.
#[derive(Debug, Clone)]
pub struct ObjectRepo {
    pool: AnyPool,
}

impl ObjectRepo {
    /// Build a repo over an existing pool.
    #[must_use]
    pub fn new(pool: AnyPool) -> Self {
        Self { pool }
    }

    /// Insert a new object row, or overwrite the existing live row at the
    /// same key (a fresh upload to an existing key replaces its content).
    /// `user_id`/`app_id`/`parent_folder_id` only take effect on insert; an
    /// overwrite keeps the original owner and parent.
    #[allow(clippy::too_many_arguments)]
    pub async fn upsert(
        &self,
        bucket_id: &str,
        object_key: &str,
        content_hash: &str,
        size_bytes: i64,
        content_type: Option<&str>,
        user_id: &str,
        app_id: &str,
        parent_folder_id: Option<&str>,
    ) -> DbResult<Object> {
        let existing = self.get_by_key(bucket_id, object_key).await?;
        let now = Utc::now();

        if let Some(existing) = existing {
            sqlx::query(
                "UPDATE objects SET content_hash = ?, size_bytes = ?, content_type = ?, updated_at = ? \
                 WHERE id = ?",
            )
            .bind(content_hash)
            .bind(size_bytes)
            .bind(content_type)
            .bind(fmt_ts(now))
            .bind(&existing.id)
            .execute(&self.pool)
            .await?;

            return Ok(Object {
                content_hash: content_hash.to_owned(),
                size_bytes,
                content_type: content_type.map(str::to_owned),
                updated_at: now,
                ..existing
            });
        }

        let id = Uuid::new_v4().to_string();
        sqlx::query(
            "INSERT INTO objects (id, bucket_id, object_key, user_id, app_id, parent_folder_id, content_hash, \
             size_bytes, content_type, is_folder, created_at, updated_at, deleted_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, 0, ?, ?, NULL)",
        )
        .bind(&id)
        .bind(bucket_id)
        .bind(object_key)
        .bind(user_id)
        .bind(app_id)
        .bind(parent_folder_id)
        .bind(content_hash)
        .bind(size_bytes)
        .bind(content_type)
        .bind(fmt_ts(now))
        .bind(fmt_ts(now))
        .execute(&self.pool)
        .await
        .map_err(map_write_err)?;

        Ok(Object {
            id,
            bucket_id: bucket_id.to_owned(),
            object_key: object_key.to_owned(),
            user_id: user_id.to_owned(),
            app_id: app_id.to_owned(),
            parent_folder_id: parent_folder_id.map(str::to_owned),
            content_hash: content_hash.to_owned(),
            size_bytes,
            content_type: content_type.map(str::to_owned),
            is_folder: false,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        })
    }

    /// Create a zero-byte folder marker at `object_key`.
    pub async fn create_folder(
        &self,
        bucket_id: &str,
        object_key: &str,
        user_id: &str,
        app_id: &str,
        parent_folder_id: Option<&str>,
    ) -> DbResult<Object> {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now();
        sqlx::query(
            "INSERT INTO objects (id, bucket_id, object_key, user_id, app_id, parent_folder_id, content_hash, \
             size_bytes, content_type, is_folder, created_at, updated_at, deleted_at) \
             VALUES (?, ?, ?, ?, ?, ?, '', 0, NULL, 1, ?, ?, NULL)",
        )
        .bind(&id)
        .bind(bucket_id)
        .bind(object_key)
        .bind(user_id)
        .bind(app_id)
        .bind(parent_folder_id)
        .bind(fmt_ts(now))
        .bind(fmt_ts(now))
        .execute(&self.pool)
        .await
        .map_err(map_write_err)?;

        Ok(Object {
            id,
            bucket_id: bucket_id.to_owned(),
            object_key: object_key.to_owned(),
            user_id: user_id.to_owned(),
            app_id: app_id.to_owned(),
            parent_folder_id: parent_folder_id.map(str::to_owned),
            content_hash: String::new(),
            size_bytes: 0,
            content_type: None,
            is_folder: true,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        })
    }

    /// Fetch a live object by its id, regardless of bucket.
    pub async fn get_by_id(&self, object_id: &str) -> DbResult<Option<Object>> {
        let row = sqlx::query("SELECT * FROM objects WHERE id = ? AND deleted_at IS NULL")
            .bind(object_id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(|row| row_to_object(&row)).transpose()
    }

    /// Fetch a live object by its exact key.
    pub async fn get_by_key(&self, bucket_id: &str, object_key: &str) -> DbResult<Option<Object>> {
        let row = sqlx::query(
            "SELECT * FROM objects WHERE bucket_id = ? AND object_key = ? AND deleted_at IS NULL",
        )
        .bind(bucket_id)
        .bind(object_key)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|row| row_to_object(&row)).transpose()
    }

    /// List live objects under a key prefix, ordered by key.
    pub async fn list_prefix(&self, bucket_id: &str, prefix: &str) -> DbResult<Vec<Object>> {
        let pattern = format!("{prefix}%");
        let rows = sqlx::query(
            "SELECT * FROM objects WHERE bucket_id = ? AND object_key LIKE ? AND deleted_at IS NULL \
             ORDER BY object_key",
        )
        .bind(bucket_id)
        .bind(pattern)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_object).collect()
    }

    /// Soft-delete an object by key.
    pub async fn soft_delete(&self, bucket_id: &str, object_key: &str) -> DbResult<Object> {
        let existing = self
            .get_by_key(bucket_id, object_key)
            .await?
            .ok_or(DbError::NotFound)?;

        sqlx::query("UPDATE objects SET deleted_at = ? WHERE id = ?")
            .bind(fmt_ts(Utc::now()))
            .bind(&existing.id)
            .execute(&self.pool)
            .await?;

        Ok(existing)
    }

    /// Rename/move an object to a new key within the same bucket.
    /// `parent_folder_id` replaces the renamed row's parent, since a move
    /// can change which folder the key sits directly under.
    pub async fn rename(
        &self,
        bucket_id: &str,
        from_key: &str,
        to_key: &str,
        parent_folder_id: Option<&str>,
    ) -> DbResult<Object> {
        if self.get_by_key(bucket_id, to_key).await?.is_some() {
            return Err(DbError::Conflict);
        }

        let existing = self
            .get_by_key(bucket_id, from_key)
            .await?
            .ok_or(DbError::NotFound)?;

        let now = Utc::now();
        sqlx::query("UPDATE objects SET object_key = ?, parent_folder_id = ?, updated_at = ? WHERE id = ?")
            .bind(to_key)
            .bind(parent_folder_id)
            .bind(fmt_ts(now))
            .bind(&existing.id)
            .execute(&self.pool)
            .await?;

        Ok(Object {
            object_key: to_key.to_owned(),
            parent_folder_id: parent_folder_id.map(str::to_owned),
            updated_at: now,
            ..existing
        })
    }

    /// List every soft-deleted object (any bucket), for the blob reaper.
    pub async fn list_deleted(&self) -> DbResult<Vec<Object>> {
        let rows = sqlx::query("SELECT * FROM objects WHERE deleted_at IS NOT NULL")
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(row_to_object).collect()
    }

    /// List every soft-deleted object in a bucket, for reaping bucket
    /// contents once the bucket itself has been soft-deleted.
    pub async fn list_deleted_in_bucket(&self, bucket_id: &str) -> DbResult<Vec<Object>> {
        let rows = sqlx::query("SELECT * FROM objects WHERE bucket_id = ? AND deleted_at IS NOT NULL")
            .bind(bucket_id)
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(row_to_object).collect()
    }

    /// List every live object in a bucket, deleted or not, for the reaper's
    /// "can I purge this bucket yet" check.
    pub async fn list_all_in_bucket(&self, bucket_id: &str) -> DbResult<Vec<Object>> {
        let rows = sqlx::query("SELECT * FROM objects WHERE bucket_id = ?")
            .bind(bucket_id)
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(row_to_object).collect()
    }

    /// Whether any live object (in any bucket) still references a content
    /// hash. Used before a blob is deleted from the backend, since objects
    /// across buckets can share one content-addressed blob.
    pub async fn hash_in_use(&self, content_hash: &str) -> DbResult<bool> {
        let row = sqlx::query(
            "SELECT COUNT(*) AS total FROM objects WHERE content_hash = ? AND deleted_at IS NULL",
        )
        .bind(content_hash)
        .fetch_one(&self.pool)
        .await?;
        let total: i64 = row.try_get("total")?;
        Ok(total > 0)
    }

    /// Permanently remove a soft-deleted object's row once its blob has
    /// been reaped (or confirmed still in use elsewhere).
    pub async fn purge(&self, object_id: &str) -> DbResult<()> {
        sqlx::query("DELETE FROM objects WHERE id = ? AND deleted_at IS NOT NULL")
            .bind(object_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

fn row_to_object(row: &sqlx::any::AnyRow) -> DbResult<Object> {
    Ok(Object {
        id: row.try_get("id")?,
        bucket_id: row.try_get("bucket_id")?,
        object_key: row.try_get("object_key")?,
        user_id: row.try_get("user_id")?,
        app_id: row.try_get("app_id")?,
        parent_folder_id: row.try_get("parent_folder_id")?,
        content_hash: row.try_get("content_hash")?,
        size_bytes: row.try_get("size_bytes")?,
        content_type: row.try_get("content_type")?,
        is_folder: crate::util::parse_bool(row, "is_folder")?,
        created_at: parse_ts(row, "created_at")?,
        updated_at: parse_ts(row, "updated_at")?,
        deleted_at: parse_opt_ts(row, "deleted_at")?,
    })
}
