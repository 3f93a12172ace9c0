//! Storage Error Types
//!
//! Error taxonomy shared by every node/root storage backend.

use thiserror::Error;

/// Error type for node and root storage operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StorageError {
    /// No node or root is stored under the requested key
    #[error("key not found")]
    NotFound,

    /// A stored leaf entry is not exactly two hash-sized halves
    #[error("node bytes have bad size: entry is {len} bytes")]
    BadEntrySize { len: usize },

    /// A stored row does not describe a valid node or root
    #[error("malformed record: {0}")]
    MalformedRecord(String),

    #[error("invalid hash: {0}")]
    InvalidHash(String),

    /// The database (or other persistence layer) failed
    #[error("storage backend error: {0}")]
    Backend(String),

    /// The operation context was cancelled
    #[error("operation cancelled")]
    Cancelled,

    /// The operation context deadline passed
    #[error("operation timed out after {duration_ms}ms")]
    Timeout { duration_ms: u64 },

    /// Persisting a new root failed; the source holds the cause
    #[error("failed to update current root hash: {source}")]
    RootUpdate {
        #[source]
        source: Box<StorageError>,
    },

    #[error("configuration error: {0}")]
    Configuration(String),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

impl StorageError {
    /// Create a generic backend error
    pub fn backend<S: Into<String>>(msg: S) -> Self {
        Self::Backend(msg.into())
    }

    /// Create a malformed record error
    pub fn malformed<S: Into<String>>(msg: S) -> Self {
        Self::MalformedRecord(msg.into())
    }

    /// Wrap a failed root write
    pub fn root_update(cause: StorageError) -> Self {
        Self::RootUpdate {
            source: Box::new(cause),
        }
    }

    /// Check if this is the distinguished not-found condition
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound)
    }

    /// Check if the error indicates corrupted or mismatched stored data
    pub fn is_corruption(&self) -> bool {
        match self {
            Self::BadEntrySize { .. } | Self::MalformedRecord(_) | Self::InvalidHash(_) => true,
            Self::RootUpdate { source } => source.is_corruption(),
            _ => false,
        }
    }

    /// Check if the error came from a cancelled or expired context
    pub fn is_cancellation(&self) -> bool {
        match self {
            Self::Cancelled | Self::Timeout { .. } => true,
            Self::RootUpdate { source } => source.is_cancellation(),
            _ => false,
        }
    }

    /// The innermost error, skipping any context wrappers
    pub fn root_cause(&self) -> &StorageError {
        match self {
            Self::RootUpdate { source } => source.root_cause(),
            other => other,
        }
    }
}
