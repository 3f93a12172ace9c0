//! SQLite connection configuration

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

const MEMORY_PATH: &str = ":memory:";

/// Settings applied when [`SqlitePool::new`](crate::SqlitePool::new) opens a
/// database
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SqliteConfig {
    /// Database file, or `:memory:` for an in-process database
    pub path: PathBuf,
    /// Write-ahead logging (ignored for in-memory databases)
    pub wal_mode: bool,
    /// How long a statement waits on a locked database before failing
    pub busy_timeout_ms: u32,
    /// `PRAGMA cache_size`; negative values are KiB, positive are pages
    pub cache_size: i64,
    /// Create the node and root tables on open
    pub create_schema: bool,
}

impl Default for SqliteConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from(MEMORY_PATH),
            wal_mode: true,
            busy_timeout_ms: 5_000,
            cache_size: -16_000,
            create_schema: true,
        }
    }
}

impl SqliteConfig {
    /// Configuration for a database file at `path`
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            ..Self::default()
        }
    }

    /// Configuration for an in-memory database
    pub fn memory() -> Self {
        Self::default()
    }

    pub fn is_memory(&self) -> bool {
        self.path.as_os_str() == MEMORY_PATH
    }

    #[must_use]
    pub fn with_wal_mode(mut self, enabled: bool) -> Self {
        self.wal_mode = enabled;
        self
    }

    #[must_use]
    pub fn with_busy_timeout_ms(mut self, timeout_ms: u32) -> Self {
        self.busy_timeout_ms = timeout_ms;
        self
    }

    #[must_use]
    pub fn with_cache_size(mut self, cache_size: i64) -> Self {
        self.cache_size = cache_size;
        self
    }

    #[must_use]
    pub fn with_create_schema(mut self, create: bool) -> Self {
        self.create_schema = create;
        self
    }
}
