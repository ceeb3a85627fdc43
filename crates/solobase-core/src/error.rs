//! Error types for the Solobase core.

/// Core error type for configuration and process bootstrap failures.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// A required configuration value was missing or invalid.
    #[error("configuration error: {0}")]
    Config(String),

    /// Internal error with context.
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

/// Convenience result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;
