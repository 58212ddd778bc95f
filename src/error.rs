use docsql_core::SqlError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DbError {
    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Insufficient arguments: placeholder #{needed} has no value ({provided} provided)")]
    InsufficientArguments { needed: usize, provided: usize },

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Decode error: {0}")]
    DecodeError(String),

    #[error("Unsupported: {0}")]
    Unsupported(String),

    #[error("Document with key '{0}' not found")]
    DocumentNotFound(String),

    #[error("Invalid document: {0}")]
    InvalidDocument(String),

    #[error("Store error ({context}): {reason}")]
    StoreError { context: String, reason: String },

    /// A multi-document mutation stopped part way; `completed` documents were
    /// already written and are not rolled back.
    #[error("Batch aborted at document '{key}' after {completed} document(s): {source}")]
    BatchAborted {
        key: String,
        completed: u64,
        #[source]
        source: Box<DbError>,
    },

    #[error("Connection is closed")]
    ConnectionClosed,

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),
}

pub type DbResult<T> = Result<T, DbError>;

impl DbError {
    pub fn store(context: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        DbError::StoreError {
            context: context.into(),
            reason: reason.to_string(),
        }
    }

    /// Wraps a failure hit while mutating `key`. Nothing written yet means
    /// nothing to report, so the original error passes through.
    pub fn batch_aborted(key: impl Into<String>, completed: u64, source: DbError) -> Self {
        if completed == 0 {
            return source;
        }
        DbError::BatchAborted {
            key: key.into(),
            completed,
            source: Box::new(source),
        }
    }
}

impl From<SqlError> for DbError {
    fn from(err: SqlError) -> Self {
        match err {
            SqlError::UnsupportedStatement(sql) => {
                DbError::Unsupported(format!("unsupported statement: {}", sql))
            }
            SqlError::ParseError(msg) => DbError::ParseError(msg),
            other => DbError::ParseError(other.to_string()),
        }
    }
}

impl serde::Serialize for DbError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.collect_str(self)
    }
}
