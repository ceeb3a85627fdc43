//! Extension registry repository backing the C8 Extension Registry's
//! persisted lifecycle state.

use chrono::Utc;
use sqlx::{AnyPool, Row};

use crate::error::{DbError, DbResult};
use crate::models::{Extension, ExtensionState};
use crate::util::{fmt_ts, parse_bool, parse_ts};

/// Data access for the `extensions` table.
#[derive(Debug, Clone)]
pub struct ExtensionRepo {
    pool: AnyPool,
}

impl ExtensionRepo {
    /// Build a repo over an existing pool.
    #[must_use]
    pub fn new(pool: AnyPool) -> Self {
        Self { pool }
    }

    /// Register an extension for the first time. A no-op (returns the
    /// existing row) if it is already registered, since registration
    /// happens on every process start.
    pub async fn register(&self, app_id: &str, name: &str, version: &str) -> DbResult<Extension> {
        if let Some(existing) = self.get(name).await? {
            return Ok(existing);
        }

        let now = Utc::now();
        let table_prefix = format!("ext_{name}_");
        sqlx::query(
            "INSERT INTO extensions (name, app_id, version, enabled, state, table_prefix, \
             schema_version, installed_at, updated_at) VALUES (?, ?, ?, 0, 'unregistered', ?, 0, ?, ?)",
        )
        .bind(name)
        .bind(app_id)
        .bind(version)
        .bind(&table_prefix)
        .bind(fmt_ts(now))
        .bind(fmt_ts(now))
        .execute(&self.pool)
        .await?;

        Ok(Extension {
            name: name.to_owned(),
            app_id: app_id.to_owned(),
            version: version.to_owned(),
            enabled: false,
            state: ExtensionState::Unregistered,
            table_prefix,
            schema_version: 0,
            installed_at: now,
            updated_at: now,
        })
    }

    /// Run every migration in `migrations` whose version exceeds the
    /// extension's currently applied `schema_version`, in order, recording
    /// each in `extension_migrations` and bumping `schema_version` as it
    /// goes. Stops and returns the failing error on the first migration
    /// that fails to apply; migrations already recorded stay applied (no
    /// rollback, matching the rest of this crate's migration model).
    ///
    /// Each `(version, sql)` pair is expected to contain DDL scoped to the
    /// extension's own `ext_<name>_`-prefixed tables; this runner only
    /// tracks which versions have been applied, it doesn't inspect the SQL.
    pub async fn run_migrations(&self, name: &str, migrations: &[(i64, &str)]) -> DbResult<i64> {
        let extension = self.get(name).await?.ok_or(DbError::NotFound)?;
        let mut schema_version = extension.schema_version;

        for (version, sql) in migrations {
            if *version <= schema_version {
                continue;
            }

            let mut tx = self.pool.begin().await?;
            sqlx::query(sql).execute(&mut *tx).await?;
            sqlx::query("INSERT INTO extension_migrations (extension_name, version, applied_at) VALUES (?, ?, ?)")
                .bind(name)
                .bind(version)
                .bind(fmt_ts(Utc::now()))
                .execute(&mut *tx)
                .await?;
            sqlx::query("UPDATE extensions SET schema_version = ?, updated_at = ? WHERE name = ?")
                .bind(version)
                .bind(fmt_ts(Utc::now()))
                .bind(name)
                .execute(&mut *tx)
                .await?;
            tx.commit().await?;

            schema_version = *version;
        }

        Ok(schema_version)
    }

    /// Fetch an extension by name.
    pub async fn get(&self, name: &str) -> DbResult<Option<Extension>> {
        let row = sqlx::query("SELECT * FROM extensions WHERE name = ?")
            .bind(name)
            .fetch_optional(&self.pool)
            .await?;

        row.map(|row| row_to_extension(&row)).transpose()
    }

    /// List every registered extension.
    pub async fn list(&self) -> DbResult<Vec<Extension>> {
        let rows = sqlx::query("SELECT * FROM extensions ORDER BY name")
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(row_to_extension).collect()
    }

    /// Persist a lifecycle state transition.
    pub async fn set_state(&self, name: &str, state: ExtensionState) -> DbResult<()> {
        let result = sqlx::query("UPDATE extensions SET state = ?, updated_at = ? WHERE name = ?")
            .bind(state.as_str())
            .bind(fmt_ts(Utc::now()))
            .bind(name)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::NotFound);
        }
        Ok(())
    }

    /// Persist an operator enable/disable toggle.
    pub async fn set_enabled(&self, name: &str, enabled: bool) -> DbResult<()> {
        let result = sqlx::query("UPDATE extensions SET enabled = ?, updated_at = ? WHERE name = ?")
            .bind(i64::from(enabled))
            .bind(fmt_ts(Utc::now()))
            .bind(name)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::NotFound);
        }
        Ok(())
    }
}

fn row_to_extension(row: &sqlx::any::AnyRow) -> DbResult<Extension> {
    let state_raw: String = row.try_get("state")?;
    Ok(Extension {
        name: row.try_get("name")?,
        app_id: row.try_get("app_id")?,
        version: row.try_get("version")?,
        enabled: parse_bool(row, "enabled")?,
        state: ExtensionState::from_str(&state_raw).ok_or(DbError::NotFound)?,
        table_prefix: row.try_get("table_prefix")?,
        schema_version: row.try_get("schema_version")?,
        installed_at: parse_ts(row, "installed_at")?,
        updated_at: parse_ts(row, "updated_at")?,
    })
}
