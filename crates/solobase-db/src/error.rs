//! Error types for the persistence layer.

/// Error type returned by repository operations.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    /// The requested row does not exist.
    #[error("not found")]
    NotFound,

    /// A unique constraint was violated (duplicate name/key).
    #[error("already exists")]
    Conflict,

    /// Underlying database driver error.
    #[error("database error: {0}")]
    Sqlx(#[from] sqlx::Error),

    /// Migration failed to apply.
    #[error("migration error: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),
}

/// Convenience result type for repository operations.
pub type DbResult<T> = Result<T, DbError>;
