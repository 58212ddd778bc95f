//! Error types for docsql-core.
//!
//! Kept free of storage concerns; the root crate folds these into its own
//! `DbError`.

use thiserror::Error;

/// SQL front-end error type
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SqlError {
    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Unterminated {0}")]
    Unterminated(&'static str),

    #[error("Unsupported statement: {0}")]
    UnsupportedStatement(String),
}

/// Result type for SQL front-end operations
pub type SqlResult<T> = Result<T, SqlError>;
