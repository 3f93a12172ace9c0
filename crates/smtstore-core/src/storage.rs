//! Node and root storage contract
//!
//! This is the whole interface a sparse Merkle tree engine needs from its
//! persistence layer: fetch and store nodes by key, and read and replace the
//! current root of one tree instance.
//!
//! ## Example
//!
//! ```rust,ignore
//! use smtstore_core::{Context, Hash, MerkleStorage, Node, StorageResult};
//!
//! async fn store_leaf<S: MerkleStorage>(storage: &S, key: Hash, leaf: Node) -> StorageResult<()> {
//!     let ctx = Context::new();
//!     storage.put(&ctx, &key, &leaf).await?;
//!     storage.set_root(&ctx, &key).await
//! }
//! ```

use crate::context::Context;
use crate::error::StorageResult;
use crate::hash::Hash;
use crate::node::Node;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Identifier of one logical tree; nodes and roots are partitioned by it
pub type TreeId = u64;

/// Storage backend for the nodes and root of one tree instance
///
/// Every method takes `&self`; implementations synchronize their own state
/// so a single backend can be shared between tasks.
#[async_trait]
pub trait MerkleStorage: Send + Sync {
    /// Fetch the node stored under `key`
    ///
    /// # Errors
    ///
    /// [`StorageError::NotFound`](crate::StorageError::NotFound) if nothing is
    /// stored under `key` for this tree. A stored row that cannot be decoded
    /// is reported as a corruption error, never as not-found.
    async fn get(&self, ctx: &Context, key: &Hash) -> StorageResult<Node>;

    /// Store `node` under `key`, replacing whatever was stored there
    async fn put(&self, ctx: &Context, key: &Hash, node: &Node) -> StorageResult<()>;

    /// Current root of this tree
    ///
    /// # Errors
    ///
    /// [`StorageError::NotFound`](crate::StorageError::NotFound) if no root has
    /// ever been set for this tree.
    async fn get_root(&self, ctx: &Context) -> StorageResult<Hash>;

    /// Replace the current root of this tree
    ///
    /// # Errors
    ///
    /// A failed write is wrapped in
    /// [`StorageError::RootUpdate`](crate::StorageError::RootUpdate).
    async fn set_root(&self, ctx: &Context, root: &Hash) -> StorageResult<()>;
}

#[async_trait]
impl<S: MerkleStorage + ?Sized> MerkleStorage for Arc<S> {
    async fn get(&self, ctx: &Context, key: &Hash) -> StorageResult<Node> {
        (**self).get(ctx, key).await
    }

    async fn put(&self, ctx: &Context, key: &Hash, node: &Node) -> StorageResult<()> {
        (**self).put(ctx, key, node).await
    }

    async fn get_root(&self, ctx: &Context) -> StorageResult<Hash> {
        (**self).get_root(ctx).await
    }

    async fn set_root(&self, ctx: &Context, root: &Hash) -> StorageResult<()> {
        (**self).set_root(ctx, root).await
    }
}

/// One stored node together with its tree and key
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyValue {
    pub mt_id: TreeId,
    pub key: Hash,
    pub node: Node,
}
