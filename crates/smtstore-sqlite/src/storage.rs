//! MerkleStorage implementation for SQLite
//!
//! Each operation is one parameterized statement run on the blocking pool.
//! The call races its [`Context`]. If the context ends before the statement
//! starts, the call returns at once and the statement is never run. If it
//! ends while the statement is running, the statement is interrupted and the
//! call waits for it to unwind before reporting the cancellation, so a write
//! is either fully applied or not at all.

use crate::connection::SqlitePool;
use crate::error::{SqliteError, SqliteResult};
use crate::record::{NodeRow, RootRow, NODE_COLUMNS, ROOT_COLUMNS};
use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};
use smtstore_core::{
    Context, Hash, KeyValue, MerkleStorage, Node, StorageError, StorageResult, TreeId,
};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use tokio::sync::{Mutex, MutexGuard};
use tokio::task::JoinError;
use tracing::{debug, trace};

const UPSERT_NODE: &str = r#"
    INSERT INTO mt_nodes (mt_id, key, type, child_l, child_r, entry, created_at)
    VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
    ON CONFLICT (mt_id, key) DO UPDATE SET
        type = excluded.type,
        child_l = excluded.child_l,
        child_r = excluded.child_r,
        entry = excluded.entry
"#;

const UPSERT_ROOT: &str = r#"
    INSERT INTO mt_roots (mt_id, key, created_at)
    VALUES (?1, ?2, ?3)
    ON CONFLICT (mt_id) DO UPDATE SET key = excluded.key
"#;

// Lifecycle of one statement, shared between the blocking task and the
// caller racing the context.
const PENDING: u8 = 0;
const RUNNING: u8 = 1;
const INTERRUPTING: u8 = 2;
const INTERRUPTED: u8 = 3;
const FINISHED: u8 = 4;
const ABANDONED: u8 = 5;

/// SQLite implementation of [`MerkleStorage`] for one tree instance
///
/// The current root is cached after the first successful read or write and
/// served from memory afterwards. The cache assumes this value is the only
/// writer of its tree's root; construct a new instance to re-read storage.
pub struct SqliteMerkleStorage {
    pool: SqlitePool,
    mt_id: TreeId,
    /// `mt_id` as bound to SQLite's signed INTEGER column
    db_mt_id: i64,
    current_root: Mutex<Option<Hash>>,
}

impl SqliteMerkleStorage {
    /// Create storage for tree `mt_id` over an open pool
    ///
    /// # Errors
    ///
    /// [`SqliteError::InvalidTreeId`] if `mt_id` does not fit in an `i64`.
    pub fn new(pool: SqlitePool, mt_id: TreeId) -> SqliteResult<Self> {
        let db_mt_id = i64::try_from(mt_id).map_err(|_| SqliteError::InvalidTreeId(mt_id))?;
        Ok(Self {
            pool,
            mt_id,
            db_mt_id,
            current_root: Mutex::new(None),
        })
    }

    pub fn mt_id(&self) -> TreeId {
        self.mt_id
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Nodes of this tree ordered by key, at most `limit` of them
    pub async fn list(&self, ctx: &Context, limit: Option<usize>) -> StorageResult<Vec<KeyValue>> {
        let mt_id = self.db_mt_id;
        let limit = limit.map_or(-1, |n| i64::try_from(n).unwrap_or(i64::MAX));

        let rows = self
            .run(ctx, move |conn| {
                let mut stmt = conn.prepare_cached(&format!(
                    "SELECT {} FROM mt_nodes WHERE mt_id = ?1 ORDER BY key LIMIT ?2",
                    NODE_COLUMNS
                ))?;
                let rows = stmt
                    .query_map(params![mt_id, limit], NodeRow::from_row)?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(rows)
            })
            .await?;

        rows.iter()
            .map(|row| {
                Ok(KeyValue {
                    mt_id: self.mt_id,
                    key: row.key()?,
                    node: row.to_node()?,
                })
            })
            .collect::<SqliteResult<Vec<_>>>()
            .map_err(Into::into)
    }

    /// Run `f` against the connection on the blocking pool, racing `ctx`
    async fn run<T, F>(&self, ctx: &Context, f: F) -> SqliteResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> SqliteResult<T> + Send + 'static,
    {
        if let Some(err) = ctx.err() {
            return Err(SqliteError::Storage(err));
        }

        let state = Arc::new(AtomicU8::new(PENDING));
        let mut task = {
            let pool = self.pool.clone();
            let state = Arc::clone(&state);
            tokio::task::spawn_blocking(move || {
                pool.with_connection(|conn| run_statement(conn, &state, f))
            })
        };

        tokio::select! {
            biased;
            joined = &mut task => flatten(joined),
            reason = ctx.done() => {
                // Never started: the detached task will see ABANDONED and skip `f`.
                if state
                    .compare_exchange(PENDING, ABANDONED, Ordering::AcqRel, Ordering::Acquire)
                    .is_ok()
                {
                    return Err(SqliteError::Storage(reason));
                }
                if state
                    .compare_exchange(RUNNING, INTERRUPTING, Ordering::AcqRel, Ordering::Acquire)
                    .is_ok()
                {
                    debug!(mt_id = self.mt_id, error = %reason, "Aborting statement");
                    self.pool.interrupt();
                    state.store(INTERRUPTED, Ordering::Release);
                }

                // A statement that finished before the interrupt keeps its result.
                match flatten(task.await) {
                    Ok(value) => Ok(value),
                    Err(_) => Err(SqliteError::Storage(reason)),
                }
            }
        }
    }

    /// Lock the root cache, giving up if `ctx` ends first
    async fn lock_root(&self, ctx: &Context) -> StorageResult<MutexGuard<'_, Option<Hash>>> {
        tokio::select! {
            biased;
            guard = self.current_root.lock() => Ok(guard),
            reason = ctx.done() => Err(reason),
        }
    }
}

/// Execute `f` unless the caller already gave up
///
/// The connection lock is held until any interrupt aimed at `f` has been
/// delivered, so it can never reach another caller's statement.
fn run_statement<T, F>(conn: &Connection, state: &AtomicU8, f: F) -> SqliteResult<T>
where
    F: FnOnce(&Connection) -> SqliteResult<T>,
{
    if state
        .compare_exchange(PENDING, RUNNING, Ordering::AcqRel, Ordering::Acquire)
        .is_err()
    {
        return Err(SqliteError::Storage(StorageError::Cancelled));
    }

    let result = f(conn);

    loop {
        match state.compare_exchange(RUNNING, FINISHED, Ordering::AcqRel, Ordering::Acquire) {
            Ok(_) => break,
            Err(INTERRUPTING) => std::hint::spin_loop(),
            Err(_) => {
                state.store(FINISHED, Ordering::Release);
                break;
            }
        }
    }

    result
}

fn flatten<T>(joined: Result<SqliteResult<T>, JoinError>) -> SqliteResult<T> {
    joined.map_err(|e| SqliteError::Task(e.to_string()))?
}

#[async_trait]
impl MerkleStorage for SqliteMerkleStorage {
    async fn get(&self, ctx: &Context, key: &Hash) -> StorageResult<Node> {
        trace!(mt_id = self.mt_id, key = %key, "get node");
        let mt_id = self.db_mt_id;
        let key_bytes = key.as_bytes().to_vec();

        let row = self
            .run(ctx, move |conn| {
                conn.prepare_cached(&format!(
                    "SELECT {} FROM mt_nodes WHERE mt_id = ?1 AND key = ?2",
                    NODE_COLUMNS
                ))?
                .query_row(params![mt_id, key_bytes], NodeRow::from_row)
                .optional()?
                .ok_or(SqliteError::NotFound)
            })
            .await?;

        Ok(row.to_node()?)
    }

    async fn put(&self, ctx: &Context, key: &Hash, node: &Node) -> StorageResult<()> {
        trace!(mt_id = self.mt_id, key = %key, node_type = %node.node_type(), "put node");
        let row = NodeRow::encode(self.db_mt_id, key, node);

        self.run(ctx, move |conn| {
            conn.prepare_cached(UPSERT_NODE)?.execute(params![
                row.mt_id,
                row.key,
                row.node_type,
                row.child_l,
                row.child_r,
                row.entry,
                row.created_at,
            ])?;
            Ok(())
        })
        .await?;

        Ok(())
    }

    async fn get_root(&self, ctx: &Context) -> StorageResult<Hash> {
        let mut cached = self.lock_root(ctx).await?;
        if let Some(root) = *cached {
            return Ok(root);
        }

        let mt_id = self.db_mt_id;
        let row = self
            .run(ctx, move |conn| {
                conn.prepare_cached(&format!(
                    "SELECT {} FROM mt_roots WHERE mt_id = ?1",
                    ROOT_COLUMNS
                ))?
                .query_row(params![mt_id], RootRow::from_row)
                .optional()?
                .ok_or(SqliteError::NotFound)
            })
            .await?;

        let root = row.hash()?;
        debug!(mt_id = self.mt_id, root = %root, "Loaded current root");
        *cached = Some(root);
        Ok(root)
    }

    async fn set_root(&self, ctx: &Context, root: &Hash) -> StorageResult<()> {
        let mut cached = self.lock_root(ctx).await.map_err(StorageError::root_update)?;

        let row = RootRow::encode(self.db_mt_id, root);
        self.run(ctx, move |conn| {
            conn.prepare_cached(UPSERT_ROOT)?
                .execute(params![row.mt_id, row.key, row.created_at])?;
            Ok(())
        })
        .await
        .map_err(|e| StorageError::root_update(e.into()))?;

        // Only a durable write moves the cache.
        *cached = Some(*root);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn h(byte: u8) -> Hash {
        Hash::new([byte; 32])
    }

    fn storage(mt_id: TreeId) -> SqliteMerkleStorage {
        SqliteMerkleStorage::new(SqlitePool::memory().unwrap(), mt_id).unwrap()
    }

    #[test]
    fn test_tree_id_must_fit_integer_column() {
        let pool = SqlitePool::memory().unwrap();
        assert!(SqliteMerkleStorage::new(pool.clone(), i64::MAX as u64).is_ok());
        assert!(matches!(
            SqliteMerkleStorage::new(pool, u64::MAX),
            Err(SqliteError::InvalidTreeId(u64::MAX))
        ));
    }

    #[tokio::test]
    async fn test_put_writes_single_row() {
        let ctx = Context::new();
        let storage = storage(3);
        let key = h(1);

        storage.put(&ctx, &key, &Node::middle(h(2), h(3))).await.unwrap();
        storage.put(&ctx, &key, &Node::leaf(h(4), h(5))).await.unwrap();

        let count: i64 = storage
            .pool()
            .with_connection(|conn| {
                Ok(conn.query_row(
                    "SELECT COUNT(*) FROM mt_nodes WHERE mt_id = 3",
                    [],
                    |row| row.get(0),
                )?)
            })
            .unwrap();
        assert_eq!(count, 1);
        assert_eq!(storage.get(&ctx, &key).await.unwrap(), Node::leaf(h(4), h(5)));
    }

    #[tokio::test]
    async fn test_upsert_keeps_created_at_and_clears_stale_children() {
        let ctx = Context::new();
        let storage = storage(1);
        let key = h(1);

        storage.put(&ctx, &key, &Node::middle(h(2), h(3))).await.unwrap();
        storage
            .pool()
            .with_connection(|conn| {
                conn.execute("UPDATE mt_nodes SET created_at = 42", [])?;
                Ok(())
            })
            .unwrap();
        storage.put(&ctx, &key, &Node::empty()).await.unwrap();

        let (created_at, child_l, deleted_at): (i64, Option<Vec<u8>>, Option<i64>) = storage
            .pool()
            .with_connection(|conn| {
                Ok(conn.query_row(
                    "SELECT created_at, child_l, deleted_at FROM mt_nodes",
                    [],
                    |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
                )?)
            })
            .unwrap();
        assert_eq!(created_at, 42);
        assert_eq!(child_l, None);
        assert_eq!(deleted_at, None);
    }

    #[tokio::test]
    async fn test_corrupt_entry_is_not_masked_as_not_found() {
        let ctx = Context::new();
        let storage = storage(1);
        storage.put(&ctx, &h(1), &Node::leaf(h(2), h(3))).await.unwrap();
        storage
            .pool()
            .with_connection(|conn| {
                conn.execute("UPDATE mt_nodes SET entry = zeroblob(65)", [])?;
                Ok(())
            })
            .unwrap();

        let err = storage.get(&ctx, &h(1)).await.unwrap_err();
        assert_eq!(err, StorageError::BadEntrySize { len: 65 });
    }

    #[tokio::test]
    async fn test_get_root_caches_first_read() {
        let ctx = Context::new();
        let pool = SqlitePool::memory().unwrap();
        let writer = SqliteMerkleStorage::new(pool.clone(), 9).unwrap();
        writer.set_root(&ctx, &h(1)).await.unwrap();

        let reader = SqliteMerkleStorage::new(pool.clone(), 9).unwrap();
        assert_eq!(reader.get_root(&ctx).await.unwrap(), h(1));

        // Another writer moves the durable root; the reader keeps serving its cache.
        writer.set_root(&ctx, &h(2)).await.unwrap();
        assert_eq!(reader.get_root(&ctx).await.unwrap(), h(1));

        let fresh = SqliteMerkleStorage::new(pool, 9).unwrap();
        assert_eq!(fresh.get_root(&ctx).await.unwrap(), h(2));
    }

    #[tokio::test]
    async fn test_failed_set_root_leaves_cache_untouched() {
        let ctx = Context::new();
        let storage = storage(1);
        storage.set_root(&ctx, &h(1)).await.unwrap();

        storage
            .pool()
            .with_connection(|conn| {
                conn.execute_batch("DROP TABLE mt_roots;")?;
                Ok(())
            })
            .unwrap();

        let err = storage.set_root(&ctx, &h(2)).await.unwrap_err();
        assert!(err.to_string().starts_with("failed to update current root hash: "));
        assert!(matches!(err.root_cause(), StorageError::Backend(_)));
        assert_eq!(storage.get_root(&ctx).await.unwrap(), h(1));
    }

    #[tokio::test]
    async fn test_list_orders_by_key_within_tree() {
        let ctx = Context::new();
        let pool = SqlitePool::memory().unwrap();
        let first = SqliteMerkleStorage::new(pool.clone(), 1).unwrap();
        let second = SqliteMerkleStorage::new(pool, 2).unwrap();

        first.put(&ctx, &h(9), &Node::empty()).await.unwrap();
        first.put(&ctx, &h(4), &Node::middle(h(5), h(6))).await.unwrap();
        second.put(&ctx, &h(1), &Node::empty()).await.unwrap();

        let listed = first.list(&ctx, None).await.unwrap();
        assert_eq!(
            listed,
            vec![
                KeyValue {
                    mt_id: 1,
                    key: h(4),
                    node: Node::middle(h(5), h(6)),
                },
                KeyValue {
                    mt_id: 1,
                    key: h(9),
                    node: Node::empty(),
                },
            ]
        );
        assert_eq!(first.list(&ctx, Some(1)).await.unwrap().len(), 1);
        assert!(SqliteMerkleStorage::new(SqlitePool::memory().unwrap(), 3)
            .unwrap()
            .list(&ctx, None)
            .await
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_abandoned_statement_never_runs() {
        let conn = Connection::open_in_memory().unwrap();
        let state = AtomicU8::new(ABANDONED);

        let result = run_statement(&conn, &state, |_| -> SqliteResult<()> {
            panic!("statement ran after its caller gave up")
        });
        assert!(matches!(
            result,
            Err(SqliteError::Storage(StorageError::Cancelled))
        ));
    }

    #[test]
    fn test_late_interrupt_does_not_leak() {
        let conn = Connection::open_in_memory().unwrap();
        let handle = conn.get_interrupt_handle();
        let state = AtomicU8::new(PENDING);

        let result = run_statement(&conn, &state, |conn| {
            let value: i64 = conn.query_row("SELECT 7", [], |row| row.get(0))?;
            // The caller interrupts just after the statement finished.
            state.store(INTERRUPTING, Ordering::Release);
            handle.interrupt();
            state.store(INTERRUPTED, Ordering::Release);
            Ok(value)
        });

        assert_eq!(result.unwrap(), 7);
        assert_eq!(state.load(Ordering::Acquire), FINISHED);
        let next: i64 = conn.query_row("SELECT 1", [], |row| row.get(0)).unwrap();
        assert_eq!(next, 1);
    }
}
