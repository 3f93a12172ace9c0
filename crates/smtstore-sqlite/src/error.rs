//! Error types for SQLite storage

use smtstore_core::StorageError;
use thiserror::Error;

/// SQLite storage error type
#[derive(Error, Debug)]
pub enum SqliteError {
    /// Database connection error
    #[error("Connection error: {0}")]
    Connection(String),

    /// Schema bootstrap error
    #[error("Schema error: {0}")]
    Schema(String),

    /// A tree id that does not fit SQLite's signed 64-bit INTEGER
    #[error("Invalid tree id: {0}")]
    InvalidTreeId(u64),

    /// No row matched
    #[error("Not found")]
    NotFound,

    /// Stored leaf entry of the wrong length
    #[error("node bytes have bad size: entry is {0} bytes")]
    BadEntrySize(usize),

    /// Stored row that does not describe a valid node or root
    #[error("Malformed record: {0}")]
    MalformedRecord(String),

    /// The blocking task running a statement failed to complete
    #[error("Task error: {0}")]
    Task(String),

    /// A backend-independent error passed through unchanged, such as a
    /// cancelled or expired context
    #[error(transparent)]
    Storage(StorageError),

    /// Underlying rusqlite error
    #[error("SQLite error: {0}")]
    Rusqlite(#[from] rusqlite::Error),
}

/// Result type for SQLite operations
pub type SqliteResult<T> = Result<T, SqliteError>;

impl From<SqliteError> for StorageError {
    fn from(err: SqliteError) -> Self {
        match err {
            SqliteError::NotFound => Self::NotFound,
            SqliteError::BadEntrySize(len) => Self::BadEntrySize { len },
            SqliteError::MalformedRecord(msg) => Self::MalformedRecord(msg),
            SqliteError::InvalidTreeId(id) => {
                Self::Configuration(format!("tree id {} exceeds i64::MAX", id))
            }
            SqliteError::Storage(err) => err,
            SqliteError::Connection(msg) | SqliteError::Schema(msg) | SqliteError::Task(msg) => {
                Self::Backend(msg)
            }
            SqliteError::Rusqlite(e) => Self::Backend(e.to_string()),
        }
    }
}

impl From<StorageError> for SqliteError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound => Self::NotFound,
            StorageError::BadEntrySize { len } => Self::BadEntrySize(len),
            StorageError::MalformedRecord(msg) | StorageError::InvalidHash(msg) => {
                Self::MalformedRecord(msg)
            }
            other => Self::Storage(other),
        }
    }
}
