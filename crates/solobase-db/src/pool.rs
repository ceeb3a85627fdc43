//! Connection pool setup and migration bootstrap.

use sqlx::any::{AnyPoolOptions, install_default_drivers};
use sqlx::AnyPool;

use crate::error::DbResult;

/// Open a connection pool against the configured database URL and apply
/// pending core migrations.
///
/// A single [`sqlx::Any`] pool backs both supported database kinds
/// (sqlite, postgres) so the repository layer never forks on backend —
/// the SQL in `migrations/` is written portable across both.
pub async fn connect(database_url: &str) -> DbResult<AnyPool> {
    install_default_drivers();

    let pool = AnyPoolOptions::new()
        .max_connections(10)
        .connect(database_url)
        .await?;

    sqlx::migrate!("./migrations").run(&pool).await?;

    Ok(pool)
}
