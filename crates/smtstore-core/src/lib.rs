//! Storage contract for sparse Merkle tree nodes and roots
//!
//! A tree engine (hashing, traversal, proofs) persists its nodes through the
//! [`MerkleStorage`] trait defined here. Backends live in their own crates;
//! this crate only defines the types that cross that boundary:
//!
//! - [`Hash`]: 32-byte content key for nodes and roots
//! - [`Node`]: tagged union of middle, leaf and empty nodes
//! - [`Context`]: cancellation and deadline for each call
//! - [`StorageError`]: not-found, corruption and backend failures
//! - [`MemoryStorage`]: in-process reference backend

pub mod context;
pub mod error;
pub mod hash;
pub mod memory;
pub mod node;
pub mod storage;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_support;

pub use context::Context;
pub use error::{StorageError, StorageResult};
pub use hash::{Hash, HASH_LEN};
pub use memory::MemoryStorage;
pub use node::{Node, NodeType};
pub use storage::{KeyValue, MerkleStorage, TreeId};
