//! Extension registry error types.

/// Error type returned by extension lifecycle operations.
#[derive(Debug, thiserror::Error)]
pub enum ExtensionError {
    /// No extension is registered under this name.
    #[error("extension not registered: {0}")]
    NotRegistered(String),

    /// The requested lifecycle transition is not valid from the
    /// extension's current state.
    #[error("invalid transition for {name}: cannot go from {from:?} to {to:?}")]
    InvalidTransition {
        /// Extension name.
        name: String,
        /// Current state.
        from: solobase_db::ExtensionState,
        /// Requested state.
        to: solobase_db::ExtensionState,
    },

    /// The extension's handler panicked while processing a request.
    #[error("extension {0} panicked while handling a request")]
    HandlerPanicked(String),

    /// A schema migration failed to apply; the extension is left `errored`
    /// with no automatic retry or rollback.
    #[error("migration for extension {name} failed: {source}")]
    MigrationFailed {
        /// Extension name.
        name: String,
        /// Underlying database error.
        #[source]
        source: solobase_db::DbError,
    },

    /// Underlying database failure.
    #[error("database error: {0}")]
    Db(#[from] solobase_db::DbError),
}

/// Convenience result type for extension operations.
pub type ExtensionResult<T> = Result<T, ExtensionError>;
