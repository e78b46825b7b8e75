use thiserror::Error;

/// Error type for every operation in the access layer.
///
/// The taxonomy is deliberate: configuration problems fail at `connect`,
/// caller contract violations fail before any SQL is executed, and execution
/// failures always carry the statement text alongside the driver's cause.
#[derive(Debug, Error)]
pub enum PgAccessError {
    #[error(transparent)]
    PostgresError(#[from] tokio_postgres::Error),

    #[error(transparent)]
    PoolError(#[from] deadpool_postgres::PoolError),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("SQL execution error for `{statement}`: {cause}")]
    ExecutionError { statement: String, cause: String },

    #[error("Publish error: {0}")]
    PublishError(String),
}

impl PgAccessError {
    /// Build an `ExecutionError` that records the offending statement.
    pub(crate) fn execution(statement: impl Into<String>, cause: impl ToString) -> Self {
        PgAccessError::ExecutionError {
            statement: statement.into(),
            cause: cause.to_string(),
        }
    }

    /// True when the error is a pool acquisition timeout, i.e. the pool was
    /// exhausted for longer than the configured wait timeout.
    #[must_use]
    pub fn is_pool_exhausted(&self) -> bool {
        matches!(
            self,
            PgAccessError::PoolError(deadpool_postgres::PoolError::Timeout(_))
        )
    }
}
