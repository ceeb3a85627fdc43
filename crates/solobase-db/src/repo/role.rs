//! Role and path-policy repository backing the C7 Authorization component.

use chrono::Utc;
use sqlx::{AnyPool, Row};
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use crate::models::{PathPolicy, PolicyEffect, Role};
use crate::util::{fmt_ts, map_write_err, parse_ts};

/// Data access for `roles`, `user_roles`, and `path_policies`.
#[derive(Debug, Clone)]
pub struct RoleRepo {
    pool: AnyPool,
}

impl RoleRepo {
    /// Build a repo over an existing pool.
    #[must_use]
    pub fn new(pool: AnyPool) -> Self {
        Self { pool }
    }

    /// Create a role.
    pub async fn create(&self, app_id: &str, name: &str) -> DbResult<Role> {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now();
        sqlx::query("INSERT INTO roles (id, app_id, name, created_at) VALUES (?, ?, ?, ?)")
            .bind(&id)
            .bind(app_id)
            .bind(name)
            .bind(fmt_ts(now))
            .execute(&self.pool)
            .await
            .map_err(map_write_err)?;

        Ok(Role {
            id,
            app_id: app_id.to_owned(),
            name: name.to_owned(),
            created_at: now,
        })
    }

    /// Fetch a role by its name within a tenant.
    pub async fn get_by_name(&self, app_id: &str, name: &str) -> DbResult<Option<Role>> {
        let row = sqlx::query("SELECT * FROM roles WHERE app_id = ? AND name = ?")
            .bind(app_id)
            .bind(name)
            .fetch_optional(&self.pool)
            .await?;

        row.map(|row| row_to_role(&row)).transpose()
    }

    /// Grant a role to a user.
    pub async fn assign(&self, user_id: &str, role_id: &str) -> DbResult<()> {
        sqlx::query("INSERT INTO user_roles (user_id, role_id) VALUES (?, ?)")
            .bind(user_id)
            .bind(role_id)
            .execute(&self.pool)
            .await
            .map_err(map_write_err)?;
        Ok(())
    }

    /// List the role names held by a user.
    pub async fn roles_for_user(&self, user_id: &str) -> DbResult<Vec<String>> {
        let rows = sqlx::query(
            "SELECT roles.name AS name FROM roles JOIN user_roles ON roles.id = user_roles.role_id \
             WHERE user_roles.user_id = ?",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(|row| row.try_get("name").map_err(DbError::from)).collect()
    }

    /// Add a path policy rule for a role.
    pub async fn add_policy(
        &self,
        app_id: &str,
        role_name: &str,
        path_glob: &str,
        method: &str,
        effect: PolicyEffect,
        priority: i64,
    ) -> DbResult<PathPolicy> {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now();
        sqlx::query(
            "INSERT INTO path_policies (id, app_id, role_name, path_glob, method, effect, priority, created_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&id)
        .bind(app_id)
        .bind(role_name)
        .bind(path_glob)
        .bind(method)
        .bind(effect.as_str())
        .bind(priority)
        .bind(fmt_ts(now))
        .execute(&self.pool)
        .await?;

        Ok(PathPolicy {
            id,
            app_id: app_id.to_owned(),
            role_name: role_name.to_owned(),
            path_glob: path_glob.to_owned(),
            method: method.to_owned(),
            effect,
            priority,
            created_at: now,
        })
    }

    /// List every policy applicable to a set of role names, highest
    /// priority first (deny-wins is resolved by the caller: evaluate in
    /// this order and stop at the first match).
    pub async fn policies_for_roles(&self, app_id: &str, role_names: &[String]) -> DbResult<Vec<PathPolicy>> {
        if role_names.is_empty() {
            return Ok(Vec::new());
        }

        let placeholders = role_names.iter().map(|_| "?").collect::<Vec<_>>().join(", ");
        let sql = format!(
            "SELECT * FROM path_policies WHERE app_id = ? AND role_name IN ({placeholders}) \
             ORDER BY priority DESC"
        );

        let mut query = sqlx::query(&sql).bind(app_id);
        for name in role_names {
            query = query.bind(name);
        }

        let rows = query.fetch_all(&self.pool).await?;
        rows.iter().map(row_to_policy).collect()
    }
}

fn row_to_role(row: &sqlx::any::AnyRow) -> DbResult<Role> {
    Ok(Role {
        id: row.try_get("id")?,
        app_id: row.try_get("app_id")?,
        name: row.try_get("name")?,
        created_at: parse_ts(row, "created_at")?,
    })
}

fn row_to_policy(row: &sqlx::any::AnyRow) -> DbResult<PathPolicy> {
    let effect_raw: String = row.try_get("effect")?;
    Ok(PathPolicy {
        id: row.try_get("id")?,
        app_id: row.try_get("app_id")?,
        role_name: row.try_get("role_name")?,
        path_glob: row.try_get("path_glob")?,
        method: row.try_get("method")?,
        effect: PolicyEffect::from_str(&effect_raw).ok_or(DbError::NotFound)?,
        priority: row.try_get("priority")?,
        created_at: parse_ts(row, "created_at")?,
    })
}
