//! User repository backing the C6 Auth/Identity component.

use chrono::Utc;
use sqlx::{AnyPool, Row};
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use crate::models::User;
use crate::util::{fmt_ts, map_write_err, parse_bool, parse_ts};

/// Data access for the `users` table.
#[derive(Debug, Clone)]
pub struct UserRepo {
    pool: AnyPool,
}

impl UserRepo {
    /// Build a repo over an existing pool.
    #[must_use]
    pub fn new(pool: AnyPool) -> Self {
        Self { pool }
    }

    /// Create a new user with an already-hashed password.
    pub async fn create(
        &self,
        app_id: &str,
        email: &str,
        password_hash: &str,
        display_name: Option<&str>,
    ) -> DbResult<User> {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now();

        sqlx::query(
            "INSERT INTO users (id, app_id, email, password_hash, display_name, is_active, \
             created_at, updated_at) VALUES (?, ?, ?, ?, ?, 1, ?, ?)",
        )
        .bind(&id)
        .bind(app_id)
        .bind(email)
        .bind(password_hash)
        .bind(display_name)
        .bind(fmt_ts(now))
        .bind(fmt_ts(now))
        .execute(&self.pool)
        .await
        .map_err(map_write_err)?;

        Ok(User {
            id,
            app_id: app_id.to_owned(),
            email: email.to_owned(),
            password_hash: password_hash.to_owned(),
            display_name: display_name.map(str::to_owned),
            is_active: true,
            created_at: now,
            updated_at: now,
        })
    }

    /// Fetch a user by email within a tenant.
    pub async fn get_by_email(&self, app_id: &str, email: &str) -> DbResult<Option<User>> {
        let row = sqlx::query("SELECT * FROM users WHERE app_id = ? AND email = ?")
            .bind(app_id)
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;

        row.map(|row| row_to_user(&row)).transpose()
    }

    /// Fetch a user by id.
    pub async fn get_by_id(&self, user_id: &str) -> DbResult<Option<User>> {
        let row = sqlx::query("SELECT * FROM users WHERE id = ?")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(|row| row_to_user(&row)).transpose()
    }

    /// Whether any user exists for this tenant yet, used to gate the
    /// bootstrap-admin creation path.
    pub async fn any_exists(&self, app_id: &str) -> DbResult<bool> {
        let row = sqlx::query("SELECT COUNT(*) AS total FROM users WHERE app_id = ?")
            .bind(app_id)
            .fetch_one(&self.pool)
            .await?;
        let total: i64 = row.try_get("total")?;
        Ok(total > 0)
    }

    /// Deactivate a user without deleting their row.
    pub async fn deactivate(&self, user_id: &str) -> DbResult<()> {
        let result = sqlx::query("UPDATE users SET is_active = 0, updated_at = ? WHERE id = ?")
            .bind(fmt_ts(Utc::now()))
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::NotFound);
        }
        Ok(())
    }
}

fn row_to_user(row: &sqlx::any::AnyRow) -> DbResult<User> {
    Ok(User {
        id: row.try_get("id")?,
        app_id: row.try_get("app_id")?,
        email: row.try_get("email")?,
        password_hash: row.try_get("password_hash")?,
        display_name: row.try_get("display_name")?,
        is_active: parse_bool(row, "is_active")?,
        created_at: parse_ts(row, "created_at")?,
        updated_at: parse_ts(row, "updated_at")?,
    })
}
