//! Authentication error types.

/// Error type returned by password hashing, token issuance, and
/// verification.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// Email/password did not match a known active user.
    #[error("invalid credentials")]
    InvalidCredentials,

    /// The account exists but is deactivated.
    #[error("account is deactivated")]
    AccountDeactivated,

    /// A bearer token was malformed or its signature did not verify.
    #[error("invalid token")]
    InvalidToken,

    /// A bearer token verified but has expired.
    #[error("token expired")]
    TokenExpired,

    /// A redirect target failed the same-origin check.
    #[error("redirect target is not same-origin")]
    UnsafeRedirect,

    /// Underlying database failure.
    #[error("database error: {0}")]
    Db(#[from] solobase_db::DbError),

    /// Internal error with context.
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

/// Convenience result type for auth operations.
pub type AuthResult<T> = Result<T, AuthError>;
