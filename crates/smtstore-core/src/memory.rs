//! In-memory storage backend
//!
//! Keeps nodes and roots in process memory with the same per-tree
//! partitioning as the SQL backend. Useful for engine tests and as the
//! reference behaviour the persistent backends are checked against.

use crate::context::Context;
use crate::error::{StorageError, StorageResult};
use crate::hash::Hash;
use crate::node::Node;
use crate::storage::{KeyValue, MerkleStorage, TreeId};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::trace;

#[derive(Debug, Default)]
struct MemoryState {
    /// (tree, key) -> node, ordered so listing is stable
    nodes: BTreeMap<(TreeId, Hash), Node>,
    roots: HashMap<TreeId, Hash>,
    /// When set, every operation fails with this backend message
    fail_with: Option<String>,
}

/// In-memory [`MerkleStorage`] for one tree instance
///
/// Handles created with [`for_tree`](Self::for_tree) share the same maps, the
/// way several SQL backends share one database.
///
/// ```rust
/// use smtstore_core::{Context, Hash, MemoryStorage, MerkleStorage, Node};
///
/// # async fn example() -> smtstore_core::StorageResult<()> {
/// let ctx = Context::new();
/// let storage = MemoryStorage::new(1);
/// let key = Hash::new([1; 32]);
/// storage.put(&ctx, &key, &Node::empty()).await?;
/// assert_eq!(storage.get(&ctx, &key).await?, Node::empty());
///
/// let other = storage.for_tree(2);
/// assert!(other.get(&ctx, &key).await.unwrap_err().is_not_found());
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct MemoryStorage {
    mt_id: TreeId,
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryStorage {
    pub fn new(mt_id: TreeId) -> Self {
        Self {
            mt_id,
            state: Arc::new(Mutex::new(MemoryState::default())),
        }
    }

    /// A handle on another tree instance backed by the same maps
    pub fn for_tree(&self, mt_id: TreeId) -> Self {
        Self {
            mt_id,
            state: Arc::clone(&self.state),
        }
    }

    pub fn mt_id(&self) -> TreeId {
        self.mt_id
    }

    /// Make every subsequent operation fail with a backend error, or restore
    /// normal operation with `None`
    pub fn set_failure(&self, message: Option<&str>) {
        self.state.lock().fail_with = message.map(str::to_string);
    }

    /// Number of nodes stored for this tree
    pub fn node_count(&self) -> usize {
        let state = self.state.lock();
        state.nodes.keys().filter(|(id, _)| *id == self.mt_id).count()
    }

    /// Nodes of this tree ordered by key, at most `limit` of them
    pub fn list(&self, ctx: &Context, limit: Option<usize>) -> StorageResult<Vec<KeyValue>> {
        check(ctx)?;
        let state = self.state.lock();
        check_failure(&state)?;

        let start = (self.mt_id, Hash::zero());
        Ok(state
            .nodes
            .range(start..)
            .take_while(|((id, _), _)| *id == self.mt_id)
            .take(limit.unwrap_or(usize::MAX))
            .map(|((mt_id, key), node)| KeyValue {
                mt_id: *mt_id,
                key: *key,
                node: *node,
            })
            .collect())
    }
}

fn check(ctx: &Context) -> StorageResult<()> {
    match ctx.err() {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

fn check_failure(state: &MemoryState) -> StorageResult<()> {
    match &state.fail_with {
        Some(message) => Err(StorageError::Backend(message.clone())),
        None => Ok(()),
    }
}

#[async_trait]
impl MerkleStorage for MemoryStorage {
    async fn get(&self, ctx: &Context, key: &Hash) -> StorageResult<Node> {
        check(ctx)?;
        let state = self.state.lock();
        check_failure(&state)?;

        trace!(mt_id = self.mt_id, key = %key, "get node");
        state
            .nodes
            .get(&(self.mt_id, *key))
            .copied()
            .ok_or(StorageError::NotFound)
    }

    async fn put(&self, ctx: &Context, key: &Hash, node: &Node) -> StorageResult<()> {
        check(ctx)?;
        let mut state = self.state.lock();
        check_failure(&state)?;

        trace!(mt_id = self.mt_id, key = %key, node_type = %node.node_type(), "put node");
        state.nodes.insert((self.mt_id, *key), *node);
        Ok(())
    }

    async fn get_root(&self, ctx: &Context) -> StorageResult<Hash> {
        check(ctx)?;
        let state = self.state.lock();
        check_failure(&state)?;

        state
            .roots
            .get(&self.mt_id)
            .copied()
            .ok_or(StorageError::NotFound)
    }

    async fn set_root(&self, ctx: &Context, root: &Hash) -> StorageResult<()> {
        check(ctx).map_err(StorageError::root_update)?;
        let mut state = self.state.lock();
        check_failure(&state).map_err(StorageError::root_update)?;

        state.roots.insert(self.mt_id, *root);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn h(byte: u8) -> Hash {
        Hash::new([byte; 32])
    }

    #[tokio::test]
    async fn test_list_is_scoped_and_ordered() {
        let ctx = Context::new();
        let first = MemoryStorage::new(1);
        let second = first.for_tree(2);

        first.put(&ctx, &h(3), &Node::empty()).await.unwrap();
        first.put(&ctx, &h(1), &Node::leaf(h(8), h(9))).await.unwrap();
        second.put(&ctx, &h(2), &Node::empty()).await.unwrap();

        let listed = first.list(&ctx, None).unwrap();
        let keys: Vec<Hash> = listed.iter().map(|kv| kv.key).collect();
        assert_eq!(keys, vec![h(1), h(3)]);
        assert!(listed.iter().all(|kv| kv.mt_id == 1));

        assert_eq!(first.list(&ctx, Some(1)).unwrap().len(), 1);
        assert_eq!(second.node_count(), 1);
    }

    #[tokio::test]
    async fn test_failure_injection() {
        let ctx = Context::new();
        let storage = MemoryStorage::new(1);
        storage.set_failure(Some("disk full"));

        let err = storage.put(&ctx, &h(1), &Node::empty()).await.unwrap_err();
        assert_eq!(err, StorageError::backend("disk full"));

        let err = storage.set_root(&ctx, &h(1)).await.unwrap_err();
        assert!(matches!(err, StorageError::RootUpdate { .. }));
        assert_eq!(err.root_cause(), &StorageError::backend("disk full"));

        storage.set_failure(None);
        storage.put(&ctx, &h(1), &Node::empty()).await.unwrap();
    }

    #[tokio::test]
    async fn test_cancelled_context_is_rejected() {
        let ctx = Context::new();
        ctx.cancel();
        let storage = MemoryStorage::new(1);

        let err = storage.put(&ctx, &h(1), &Node::empty()).await.unwrap_err();
        assert_eq!(err, StorageError::Cancelled);
        assert_eq!(storage.node_count(), 0);
    }
}
