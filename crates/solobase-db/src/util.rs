//! Helpers shared by the repository modules.

use chrono::{DateTime, Utc};
use sqlx::any::AnyRow;
use sqlx::Row;

use crate::error::{DbError, DbResult};

/// Format a timestamp the way it is stored in portable TEXT columns.
#[must_use]
pub fn fmt_ts(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339()
}

/// Parse a TEXT timestamp column back into a [`DateTime<Utc>`].
pub fn parse_ts(row: &AnyRow, column: &str) -> DbResult<DateTime<Utc>> {
    let raw: String = row.try_get(column)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| DbError::Sqlx(sqlx::Error::ColumnDecode {
            index: column.to_owned(),
            source: "invalid RFC 3339 timestamp".into(),
        }))
}

/// Parse an optional TEXT timestamp column.
pub fn parse_opt_ts(row: &AnyRow, column: &str) -> DbResult<Option<DateTime<Utc>>> {
    let raw: Option<String> = row.try_get(column)?;
    raw.map(|raw| {
        DateTime::parse_from_rfc3339(&raw)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|_| DbError::Sqlx(sqlx::Error::ColumnDecode {
                index: column.to_owned(),
                source: "invalid RFC 3339 timestamp".into(),
            }))
    })
    .transpose()
}

/// Decode an INTEGER(0/1) column as a bool, portable across sqlite/postgres.
pub fn parse_bool(row: &AnyRow, column: &str) -> DbResult<bool> {
    let raw: i64 = row.try_get(column)?;
    Ok(raw != 0)
}

/// Treat a unique-constraint violation as [`DbError::Conflict`], passing
/// through any other driver error.
pub fn map_write_err(err: sqlx::Error) -> DbError {
    if let sqlx::Error::Database(ref db_err) = err {
        if db_err.is_unique_violation() {
            return DbError::Conflict;
        }
    }
    DbError::Sqlx(err)
}
