//! Runs the shared MerkleStorage conformance suite against SQLite
//!
//! All backends produced by one builder share a single database, so the
//! namespace checks exercise real tree-id partitioning.

use smtstore_core::test_support::{run_all, StorageBuilder};
use smtstore_core::TreeId;
use smtstore_sqlite::{SqliteConfig, SqliteMerkleStorage, SqlitePool};
use tempfile::TempDir;

struct SqliteBuilder {
    pool: SqlitePool,
}

impl StorageBuilder for SqliteBuilder {
    type Storage = SqliteMerkleStorage;

    fn storage(&mut self, mt_id: TreeId) -> SqliteMerkleStorage {
        SqliteMerkleStorage::new(self.pool.clone(), mt_id).expect("valid tree id")
    }
}

#[tokio::test]
async fn test_conformance_in_memory() {
    let mut builder = SqliteBuilder {
        pool: SqlitePool::memory().unwrap(),
    };
    run_all(&mut builder).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_conformance_on_disk() {
    let dir = TempDir::new().unwrap();
    let pool = SqlitePool::new(SqliteConfig::new(dir.path().join("trees.db"))).unwrap();

    let mut builder = SqliteBuilder { pool };
    run_all(&mut builder).await;
}
