//! Error types for envmon-store.

use std::path::PathBuf;

/// Result type for envmon-store operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in envmon-store.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Database error from SQLite.
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Failed to create database directory.
    #[error("Failed to create database directory {path}: {source}")]
    CreateDirectory {
        path: PathBuf,
        source: std::io::Error,
    },

    /// No live row with this id.
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: i64 },

    /// A uniqueness or referential rule was violated.
    #[error("{0}")]
    Conflict(String),
}

impl Error {
    /// Whether this error means the requested row does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound { .. })
    }
}

/// Turn a SQLite constraint violation into [`Error::Conflict`].
pub(crate) fn conflict_on_constraint(err: rusqlite::Error, message: impl Into<String>) -> Error {
    match err {
        rusqlite::Error::SqliteFailure(ref e, _)
            if e.code == rusqlite::ErrorCode::ConstraintViolation =>
        {
            Error::Conflict(message.into())
        }
        other => Error::Database(other),
    }
}
