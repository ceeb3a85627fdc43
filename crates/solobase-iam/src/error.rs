//! Authorization error types.

/// Error type returned by the authorization layer.
#[derive(Debug, thiserror::Error)]
pub enum IamError {
    /// No matching policy granted access, and there was no default allow.
    #[error("access denied for {method} {path}")]
    Denied {
        /// HTTP method of the denied request.
        method: String,
        /// Path of the denied request.
        path: String,
    },

    /// The caller exceeded their rate limit.
    #[error("rate limit exceeded")]
    RateLimited,

    /// The request would push the caller's `(app_id, user_id)` quota over
    /// its limit. Advisory only: authoritative admission still happens in
    /// the token service and storage service.
    #[error("quota exceeded: requested {requested}, available {available}")]
    QuotaExceeded {
        /// Bytes requested.
        requested: i64,
        /// Bytes actually available.
        available: i64,
    },

    /// Underlying database failure.
    #[error("database error: {0}")]
    Db(#[from] solobase_db::DbError),
}

/// Convenience result type for authorization operations.
pub type IamResult<T> = Result<T, IamError>;
