//! Tree node representation
//!
//! A node is one vertex of the sparse Merkle tree. The tree engine decides the
//! shape and computes the key; storage only needs to know which of the three
//! shapes a node has and the hashes it carries.

use crate::error::StorageError;
use crate::hash::Hash;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Discriminant byte stored alongside every node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum NodeType {
    /// Internal node with two children
    Middle = 0,
    /// Leaf node carrying an entry
    Leaf = 1,
    /// Placeholder for an empty subtree
    Empty = 2,
}

impl NodeType {
    /// The byte persisted for this type
    pub fn as_u8(self) -> u8 {
        self as u8
    }
}

impl TryFrom<u8> for NodeType {
    type Error = StorageError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Middle),
            1 => Ok(Self::Leaf),
            2 => Ok(Self::Empty),
            other => Err(StorageError::MalformedRecord(format!(
                "unknown node type {}",
                other
            ))),
        }
    }
}

impl fmt::Display for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Middle => write!(f, "middle"),
            Self::Leaf => write!(f, "leaf"),
            Self::Empty => write!(f, "empty"),
        }
    }
}

/// A node of the tree
///
/// Each variant carries exactly the data its shape allows: a middle node has
/// both children and no entry, a leaf has both entry halves and no children,
/// and an empty node has neither.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Node {
    /// Internal node pointing at two subtrees
    Middle {
        /// Key of the left child
        left: Hash,
        /// Key of the right child
        right: Hash,
    },
    /// Leaf holding a two-element entry (index half, value half)
    Leaf {
        /// The entry halves, in storage order
        entry: [Hash; 2],
    },
    /// Empty subtree
    #[default]
    Empty,
}

impl Node {
    /// Create a middle node
    pub fn middle(left: Hash, right: Hash) -> Self {
        Self::Middle { left, right }
    }

    /// Create a leaf node from its two entry halves
    pub fn leaf(first: Hash, second: Hash) -> Self {
        Self::Leaf {
            entry: [first, second],
        }
    }

    /// Create an empty node
    pub fn empty() -> Self {
        Self::Empty
    }

    pub fn node_type(&self) -> NodeType {
        match self {
            Self::Middle { .. } => NodeType::Middle,
            Self::Leaf { .. } => NodeType::Leaf,
            Self::Empty => NodeType::Empty,
        }
    }

    /// Left child, present only for middle nodes
    pub fn child_l(&self) -> Option<&Hash> {
        match self {
            Self::Middle { left, .. } => Some(left),
            _ => None,
        }
    }

    /// Right child, present only for middle nodes
    pub fn child_r(&self) -> Option<&Hash> {
        match self {
            Self::Middle { right, .. } => Some(right),
            _ => None,
        }
    }

    /// Entry halves, present only for leaf nodes
    pub fn entry(&self) -> Option<&[Hash; 2]> {
        match self {
            Self::Leaf { entry } => Some(entry),
            _ => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_type_bytes() {
        for ty in [NodeType::Middle, NodeType::Leaf, NodeType::Empty] {
            assert_eq!(NodeType::try_from(ty.as_u8()).unwrap(), ty);
        }
        assert_eq!(NodeType::Middle.as_u8(), 0);
        assert_eq!(NodeType::Leaf.as_u8(), 1);
        assert_eq!(NodeType::Empty.as_u8(), 2);
    }

    #[test]
    fn test_unknown_node_type_is_malformed() {
        let err = NodeType::try_from(7).unwrap_err();
        assert!(err.is_corruption());
    }

    #[test]
    fn test_accessors_follow_shape() {
        let a = Hash::new([1; 32]);
        let b = Hash::new([2; 32]);

        let middle = Node::middle(a, b);
        assert_eq!(middle.node_type(), NodeType::Middle);
        assert_eq!(middle.child_l(), Some(&a));
        assert_eq!(middle.child_r(), Some(&b));
        assert!(middle.entry().is_none());

        let leaf = Node::leaf(a, b);
        assert_eq!(leaf.node_type(), NodeType::Leaf);
        assert!(leaf.child_l().is_none());
        assert!(leaf.child_r().is_none());
        assert_eq!(leaf.entry(), Some(&[a, b]));

        let empty = Node::empty();
        assert!(empty.is_empty());
        assert!(empty.child_l().is_none());
        assert!(empty.entry().is_none());
    }
}
