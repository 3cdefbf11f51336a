//! Error types for gridstore-core

use thiserror::Error;

/// Main error type for the gridstore-core library
#[derive(Error, Debug)]
pub enum Error {
    /// Database error
    #[error("database error: {0}")]
    Database(#[source] rusqlite::Error),

    /// Uniqueness or foreign-key failure
    #[error("constraint violation: {0}")]
    Constraint(String),

    /// Row absent for an id the caller expected to exist
    #[error("{entity} not found: {id}")]
    NotFound {
        /// Entity kind ("file" or "filter")
        entity: &'static str,
        /// The id that was looked up
        id: i64,
    },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Connection pool error
    #[error("connection pool error: {0}")]
    Pool(String),
}

impl From<rusqlite::Error> for Error {
    fn from(e: rusqlite::Error) -> Self {
        // Surface constraint failures as their own variant so callers can
        // distinguish a duplicate link or dangling foreign key from driver
        // trouble.
        match &e {
            rusqlite::Error::SqliteFailure(f, msg)
                if f.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                Error::Constraint(msg.clone().unwrap_or_else(|| f.to_string()))
            }
            _ => Error::Database(e),
        }
    }
}

/// Result type alias for gridstore-core
pub type Result<T> = std::result::Result<T, Error>;
