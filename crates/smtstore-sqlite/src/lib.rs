//! SQLite storage backend for sparse Merkle trees
//!
//! This crate stores tree nodes and the current root of each tree instance
//! in two tables, `mt_nodes` and `mt_roots`, partitioned by an integer tree
//! id so many trees can share one database.
//!
//! ## Features
//!
//! - **Upserts**: every write is a single `INSERT ... ON CONFLICT DO UPDATE`
//! - **Root cache**: the current root is read from storage at most once per
//!   backend value
//! - **Cancellation**: statements race the call's [`Context`] and are
//!   interrupted when it is cancelled or expires
//! - **Thread Safety**: Arc<Mutex<Connection>> pattern for concurrent access
//!
//! ## Usage
//!
//! ```rust,ignore
//! use smtstore_core::{Context, MerkleStorage};
//! use smtstore_sqlite::{SqliteConfig, SqliteMerkleStorage, SqlitePool};
//!
//! let pool = SqlitePool::new(SqliteConfig::new("./trees.db"))?;
//! let storage = SqliteMerkleStorage::new(pool, 1)?;
//!
//! let ctx = Context::with_timeout(std::time::Duration::from_secs(5));
//! let root = storage.get_root(&ctx).await?;
//! let node = storage.get(&ctx, &root).await?;
//! ```
//!
//! [`Context`]: smtstore_core::Context

pub mod config;
pub mod connection;
pub mod error;
pub mod record;
pub mod schema;
pub mod storage;

// Re-exports
pub use config::SqliteConfig;
pub use connection::SqlitePool;
pub use error::{SqliteError, SqliteResult};
pub use record::{NodeRow, RootRow};
pub use schema::{ensure_schema, SCHEMA};
pub use storage::SqliteMerkleStorage;
