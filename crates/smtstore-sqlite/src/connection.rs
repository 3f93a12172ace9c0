//! SQLite connection management
//!
//! Uses a simple Arc<Mutex<Connection>> pattern; rusqlite connections are
//! not `Sync`, so every statement runs while holding the lock.

use crate::config::SqliteConfig;
use crate::error::{SqliteError, SqliteResult};
use crate::schema;
use parking_lot::Mutex;
use rusqlite::{Connection, InterruptHandle};
use std::sync::Arc;
use tracing::{debug, info};

/// Thread-safe SQLite connection wrapper
///
/// Cheap to clone; clones share the connection. Several tree instances may
/// use the same pool.
#[derive(Clone)]
pub struct SqlitePool {
    conn: Arc<Mutex<Connection>>,
    interrupt: Arc<InterruptHandle>,
}

impl SqlitePool {
    /// Open and configure a database with the given configuration
    pub fn new(config: SqliteConfig) -> SqliteResult<Self> {
        info!(path = ?config.path, "Opening SQLite database");

        let conn = if config.is_memory() {
            Connection::open_in_memory()?
        } else {
            // Ensure parent directory exists
            if let Some(parent) = config.path.parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent).map_err(|e| {
                        SqliteError::Connection(format!("Failed to create directory: {}", e))
                    })?;
                }
            }
            Connection::open(&config.path)?
        };

        configure_pragmas(&conn, &config)?;
        if config.create_schema {
            schema::ensure_schema(&conn)?;
            info!("SQLite tree storage initialized");
        }

        Ok(Self::from_connection(conn))
    }

    /// Wrap a connection opened and set up by the caller
    ///
    /// No PRAGMAs are changed and no tables are created.
    pub fn from_connection(conn: Connection) -> Self {
        let interrupt = conn.get_interrupt_handle();
        Self {
            conn: Arc::new(Mutex::new(conn)),
            interrupt: Arc::new(interrupt),
        }
    }

    /// Create an in-memory database with the tables in place
    pub fn memory() -> SqliteResult<Self> {
        Self::new(SqliteConfig::memory())
    }

    /// Execute a closure with the connection
    pub fn with_connection<F, T>(&self, f: F) -> SqliteResult<T>
    where
        F: FnOnce(&Connection) -> SqliteResult<T>,
    {
        let conn = self.conn.lock();
        f(&conn)
    }

    /// Abort the statement currently running on the connection, if any
    pub fn interrupt(&self) {
        debug!("Interrupting running SQLite statement");
        self.interrupt.interrupt();
    }
}

/// Configure SQLite PRAGMA settings
fn configure_pragmas(conn: &Connection, config: &SqliteConfig) -> SqliteResult<()> {
    debug!(
        wal_mode = config.wal_mode,
        busy_timeout_ms = config.busy_timeout_ms,
        cache_size = config.cache_size,
        "Configuring SQLite pragmas"
    );

    // WAL mode is meaningless for an in-memory database
    if config.wal_mode && !config.is_memory() {
        conn.execute_batch("PRAGMA journal_mode = WAL;")?;
        conn.execute_batch("PRAGMA synchronous = NORMAL;")?;
    }

    conn.execute_batch(&format!(
        "PRAGMA busy_timeout = {};",
        config.busy_timeout_ms
    ))?;
    conn.execute_batch(&format!("PRAGMA cache_size = {};", config.cache_size))?;

    Ok(())
}
