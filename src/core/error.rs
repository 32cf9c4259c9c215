//! Error Module
//!
//! This module defines the error types for dbhandle. Every public operation
//! returns these errors instead of panicking, and the handle keeps the display
//! text of the most recent one so callers can inspect it afterwards.

use thiserror::Error;

/// Coarse classification of a [`DbError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Opening, configuring or closing the connection failed
    Connection,
    /// A statement failed to prepare or execute
    Statement,
    /// Commit or rollback failed
    Transaction,
    /// The call itself was invalid (bad identifier, no data, not connected)
    Usage,
    /// Defaults file or configuration problems
    Config,
}

/// Error type for every database handle operation.
#[derive(Error, Debug)]
pub enum DbError {
    /// The driver refused to open or configure the connection
    #[error("Connect error: {0}")]
    Connect(String),

    /// A statement failed; `sql` is the rendered statement text
    #[error("Statement error: {message} SQL: {sql}")]
    Statement { message: String, sql: String },

    #[error("Commit failed: {0}")]
    Commit(String),

    #[error("Rollback failed: {0}")]
    Rollback(String),

    #[error("Close failed: {0}")]
    Close(String),

    /// A batch or record had nothing in it
    #[error("No data to write")]
    NoData,

    #[error("Not connected to a database")]
    NotConnected,

    /// A table or column name that cannot be safely placed into SQL
    #[error("Invalid identifier: {0:?}")]
    InvalidIdentifier(String),

    /// A statement that must be filtered was given no condition
    #[error("Refusing to run {0} without a condition")]
    MissingCondition(&'static str),

    /// The defaults file is missing or has the wrong extension
    #[error("Defaults file error: {0}")]
    DefaultsFile(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl DbError {
    /// Returns the structured kind of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            DbError::Connect(_) | DbError::Close(_) => ErrorKind::Connection,
            DbError::Statement { .. } | DbError::Database(_) => ErrorKind::Statement,
            DbError::Commit(_) | DbError::Rollback(_) => ErrorKind::Transaction,
            DbError::NoData
            | DbError::NotConnected
            | DbError::InvalidIdentifier(_)
            | DbError::MissingCondition(_)
            | DbError::Json(_) => ErrorKind::Usage,
            DbError::DefaultsFile(_) | DbError::Config(_) | DbError::Io(_) | DbError::Toml(_) => {
                ErrorKind::Config
            }
        }
    }
}

/// Type alias for Result with [`DbError`] as the error type.
pub type Result<T> = std::result::Result<T, DbError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = DbError::Statement {
            message: "no such table: users".to_string(),
            sql: "SELECT * FROM users".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Statement error: no such table: users SQL: SELECT * FROM users"
        );

        assert!(DbError::NoData.to_string().contains("No data"));
        assert!(DbError::MissingCondition("DELETE").to_string().contains("DELETE"));
    }

    #[test]
    fn test_error_kinds() {
        assert_eq!(DbError::Connect("x".into()).kind(), ErrorKind::Connection);
        assert_eq!(DbError::Commit("x".into()).kind(), ErrorKind::Transaction);
        assert_eq!(DbError::NotConnected.kind(), ErrorKind::Usage);
        assert_eq!(
            DbError::Database(rusqlite::Error::ExecuteReturnedResults).kind(),
            ErrorKind::Statement
        );
    }

    #[test]
    fn test_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: DbError = io_err.into();
        match err {
            DbError::Io(_) => {}
            _ => panic!("Expected IO error"),
        }

        let toml_err = toml::from_str::<toml::Value>("= broken").unwrap_err();
        let err: DbError = toml_err.into();
        assert_eq!(err.kind(), ErrorKind::Config);
    }
}
