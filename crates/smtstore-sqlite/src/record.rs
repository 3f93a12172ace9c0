//! Row encoding for nodes and roots
//!
//! A node is stored as one `mt_nodes` row: tree id, key, type byte, the two
//! child hashes (NULL unless middle) and the entry (NULL unless leaf, both
//! halves concatenated). Decoding is strict: a row whose columns do not match
//! its type is reported as malformed, never repaired.

use crate::error::{SqliteError, SqliteResult};
use chrono::Utc;
use rusqlite::Row;
use smtstore_core::{Hash, Node, NodeType, HASH_LEN};

/// Column list shared by every node query, in [`NodeRow::from_row`] order
pub(crate) const NODE_COLUMNS: &str =
    "mt_id, key, type, child_l, child_r, entry, created_at, deleted_at";

/// Column list shared by every root query, in [`RootRow::from_row`] order
pub(crate) const ROOT_COLUMNS: &str = "mt_id, key, created_at, deleted_at";

/// One `mt_nodes` row
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeRow {
    pub mt_id: i64,
    pub key: Vec<u8>,
    pub node_type: i64,
    pub child_l: Option<Vec<u8>>,
    pub child_r: Option<Vec<u8>>,
    pub entry: Option<Vec<u8>>,
    pub created_at: Option<i64>,
    pub deleted_at: Option<i64>,
}

impl NodeRow {
    /// Encode `node` for storage under `key` in tree `mt_id`
    pub fn encode(mt_id: i64, key: &Hash, node: &Node) -> Self {
        let entry = node.entry().map(|[first, second]| {
            let mut bytes = Vec::with_capacity(2 * HASH_LEN);
            bytes.extend_from_slice(first.as_bytes());
            bytes.extend_from_slice(second.as_bytes());
            bytes
        });

        Self {
            mt_id,
            key: key.as_bytes().to_vec(),
            node_type: i64::from(node.node_type().as_u8()),
            child_l: node.child_l().map(|h| h.as_bytes().to_vec()),
            child_r: node.child_r().map(|h| h.as_bytes().to_vec()),
            entry,
            created_at: Some(Utc::now().timestamp()),
            deleted_at: None,
        }
    }

    /// Read a row selected with [`NODE_COLUMNS`]
    pub fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Self {
            mt_id: row.get(0)?,
            key: row.get(1)?,
            node_type: row.get(2)?,
            child_l: row.get(3)?,
            child_r: row.get(4)?,
            entry: row.get(5)?,
            created_at: row.get(6)?,
            deleted_at: row.get(7)?,
        })
    }

    /// The node key stored in this row
    pub fn key(&self) -> SqliteResult<Hash> {
        Hash::from_slice(&self.key).map_err(|_| {
            SqliteError::MalformedRecord(format!("key is {} bytes", self.key.len()))
        })
    }

    /// Decode the node this row describes
    ///
    /// # Errors
    ///
    /// [`SqliteError::BadEntrySize`] when a non-empty entry is not exactly two
    /// hashes long; [`SqliteError::MalformedRecord`] for an unknown type, a
    /// child of the wrong length, or columns inconsistent with the type.
    pub fn to_node(&self) -> SqliteResult<Node> {
        let entry = decode_entry(self.entry.as_deref())?;
        let node_type = u8::try_from(self.node_type)
            .map_err(|_| SqliteError::MalformedRecord(format!("type {}", self.node_type)))
            .and_then(|byte| NodeType::try_from(byte).map_err(SqliteError::from))?;
        let child_l = decode_child("child_l", self.child_l.as_deref())?;
        let child_r = decode_child("child_r", self.child_r.as_deref())?;

        match (node_type, child_l, child_r, entry) {
            (NodeType::Middle, Some(left), Some(right), None) => Ok(Node::middle(left, right)),
            (NodeType::Leaf, None, None, Some(entry)) => Ok(Node::Leaf { entry }),
            (NodeType::Empty, None, None, None) => Ok(Node::Empty),
            (node_type, child_l, child_r, entry) => Err(SqliteError::MalformedRecord(format!(
                "{} node with child_l={} child_r={} entry={}",
                node_type,
                presence(child_l.is_some()),
                presence(child_r.is_some()),
                presence(entry.is_some()),
            ))),
        }
    }
}

/// One `mt_roots` row
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RootRow {
    pub mt_id: i64,
    pub key: Option<Vec<u8>>,
    pub created_at: Option<i64>,
    pub deleted_at: Option<i64>,
}

impl RootRow {
    pub fn encode(mt_id: i64, root: &Hash) -> Self {
        Self {
            mt_id,
            key: Some(root.as_bytes().to_vec()),
            created_at: Some(Utc::now().timestamp()),
            deleted_at: None,
        }
    }

    /// Read a row selected with [`ROOT_COLUMNS`]
    pub fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Self {
            mt_id: row.get(0)?,
            key: row.get(1)?,
            created_at: row.get(2)?,
            deleted_at: row.get(3)?,
        })
    }

    /// The root hash this row points at
    pub fn hash(&self) -> SqliteResult<Hash> {
        let key = self
            .key
            .as_deref()
            .ok_or_else(|| SqliteError::MalformedRecord("root key is NULL".to_string()))?;
        Hash::from_slice(key)
            .map_err(|_| SqliteError::MalformedRecord(format!("root key is {} bytes", key.len())))
    }
}

fn decode_entry(bytes: Option<&[u8]>) -> SqliteResult<Option<[Hash; 2]>> {
    match bytes {
        None | Some([]) => Ok(None),
        Some(bytes) if bytes.len() == 2 * HASH_LEN => {
            let (first, second) = bytes.split_at(HASH_LEN);
            Ok(Some([Hash::from_slice(first)?, Hash::from_slice(second)?]))
        }
        Some(bytes) => Err(SqliteError::BadEntrySize(bytes.len())),
    }
}

fn decode_child(column: &str, bytes: Option<&[u8]>) -> SqliteResult<Option<Hash>> {
    bytes
        .map(|bytes| {
            Hash::from_slice(bytes).map_err(|_| {
                SqliteError::MalformedRecord(format!("{} is {} bytes", column, bytes.len()))
            })
        })
        .transpose()
}

fn presence(present: bool) -> &'static str {
    if present {
        "set"
    } else {
        "null"
    }
}
