//! Metadata store error types.

use thiserror::Error;

/// Metadata store operation errors.
#[derive(Debug, Error)]
pub enum MetadataError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("already exists: {0}")]
    AlreadyExists(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("constraint violation: {0}")]
    Constraint(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl From<std::io::Error> for MetadataError {
    fn from(e: std::io::Error) -> Self {
        MetadataError::Config(e.to_string())
    }
}

/// Result type for metadata operations.
pub type MetadataResult<T> = std::result::Result<T, MetadataError>;

/// Map a UNIQUE violation on an insert into `AlreadyExists`.
///
/// SQLite reports these as "UNIQUE constraint failed: table.column"; `what`
/// names the record for the caller. Other errors pass through untouched.
pub(crate) fn map_unique_violation(
    err: sqlx::Error,
    what: impl FnOnce(&str) -> String,
) -> MetadataError {
    match err {
        sqlx::Error::Database(db_err) if db_err.message().contains("UNIQUE constraint") => {
            MetadataError::AlreadyExists(what(db_err.message()))
        }
        other => MetadataError::Database(other),
    }
}
