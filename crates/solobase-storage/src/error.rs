//! Error types for the storage stack.

/// Error type shared by the blob backend, quota accountant, token service,
/// and storage service.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// A bucket or object name failed validation.
    #[error("invalid name {name}: {reason}")]
    InvalidName {
        /// The rejected name.
        name: String,
        /// Why it was rejected.
        reason: String,
    },

    /// The named bucket does not exist.
    #[error("bucket not found: {0}")]
    BucketNotFound(String),

    /// The bucket already exists.
    #[error("bucket already exists: {0}")]
    BucketAlreadyExists(String),

    /// The named object does not exist.
    #[error("object not found: {0}")]
    ObjectNotFound(String),

    /// The object already exists and the operation does not allow overwrite.
    #[error("object already exists: {0}")]
    ObjectAlreadyExists(String),

    /// The caller does not own the target resource and no bypass applies.
    #[error("forbidden")]
    Forbidden,

    /// The bucket still has live objects and the delete was not forced.
    #[error("bucket not empty: {0}")]
    BucketNotEmpty(String),

    /// The bucket's quota does not have enough remaining headroom.
    #[error("quota exceeded: requested {requested} bytes, {available} available")]
    QuotaExceeded {
        /// Bytes requested.
        requested: i64,
        /// Bytes actually available.
        available: i64,
    },

    /// A token was not found, already consumed, or expired.
    #[error("invalid or expired token")]
    InvalidToken,

    /// The uploaded content hash did not match the declared hash.
    #[error("content hash mismatch: expected {expected}, computed {computed}")]
    HashMismatch {
        /// Hash the client declared up front.
        expected: String,
        /// Hash actually computed from the uploaded bytes.
        computed: String,
    },

    /// The server is in readonly/maintenance mode.
    #[error("server is in readonly mode")]
    ReadOnly,

    /// Underlying blob I/O failure.
    #[error("blob I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Underlying database failure.
    #[error("database error: {0}")]
    Db(#[from] solobase_db::DbError),

    /// Internal error with context.
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

/// Convenience result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;
