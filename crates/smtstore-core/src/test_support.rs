//! Conformance suite for [`MerkleStorage`] implementations
//!
//! Backends implement [`StorageBuilder`] in their tests and call
//! [`run_all`]. Every check panics with a descriptive message on failure.

use crate::context::Context;
use crate::error::StorageError;
use crate::hash::Hash;
use crate::node::Node;
use crate::storage::{MerkleStorage, TreeId};

/// Hands out fresh tree ids for one test fixture
#[derive(Debug, Clone)]
pub struct TreeIds {
    next: TreeId,
}

impl TreeIds {
    pub fn starting_at(first: TreeId) -> Self {
        Self { next: first }
    }

    pub fn next_id(&mut self) -> TreeId {
        let id = self.next;
        self.next += 1;
        id
    }
}

impl Default for TreeIds {
    fn default() -> Self {
        Self::starting_at(1)
    }
}

/// Creates backends that all share one underlying store
pub trait StorageBuilder {
    type Storage: MerkleStorage;

    /// A backend for tree `mt_id`
    fn storage(&mut self, mt_id: TreeId) -> Self::Storage;
}

/// A hash whose bytes are all `byte`
pub fn hash_of(byte: u8) -> Hash {
    Hash::new([byte; 32])
}

/// Run every check against backends produced by `builder`
pub async fn run_all<B: StorageBuilder>(builder: &mut B) {
    // Ids at 1000+ leave the small ids used by named scenarios free.
    let mut ids = TreeIds::starting_at(1000);

    check_get_missing_is_not_found(&builder.storage(ids.next_id())).await;
    check_put_get_every_shape(&builder.storage(ids.next_id())).await;
    check_put_overwrites(&builder.storage(ids.next_id())).await;
    check_root_lifecycle(&builder.storage(ids.next_id())).await;
    check_cancelled_context(&builder.storage(ids.next_id())).await;

    let (a, b) = (ids.next_id(), ids.next_id());
    check_namespace_isolation(&builder.storage(a), &builder.storage(b)).await;

    check_root_scenario(builder).await;
}

pub async fn check_get_missing_is_not_found<S: MerkleStorage>(storage: &S) {
    let ctx = Context::new();
    match storage.get(&ctx, &hash_of(0xee)).await {
        Err(StorageError::NotFound) => {}
        other => panic!("expected NotFound for a missing key, got {:?}", other),
    }
}

pub async fn check_put_get_every_shape<S: MerkleStorage>(storage: &S) {
    let ctx = Context::new();
    let cases = [
        (hash_of(1), Node::middle(hash_of(10), hash_of(11))),
        (hash_of(2), Node::leaf(hash_of(20), hash_of(21))),
        (hash_of(3), Node::empty()),
        (hash_of(4), Node::middle(Hash::zero(), hash_of(41))),
    ];

    for (key, node) in &cases {
        storage
            .put(&ctx, key, node)
            .await
            .unwrap_or_else(|e| panic!("put {} failed: {}", key, e));
    }
    for (key, node) in &cases {
        let stored = storage
            .get(&ctx, key)
            .await
            .unwrap_or_else(|e| panic!("get {} failed: {}", key, e));
        assert_eq!(&stored, node, "node under {} changed in storage", key);
    }
}

pub async fn check_put_overwrites<S: MerkleStorage>(storage: &S) {
    let ctx = Context::new();
    let key = hash_of(5);
    let first = Node::middle(hash_of(50), hash_of(51));
    let second = Node::leaf(hash_of(52), hash_of(53));

    storage.put(&ctx, &key, &first).await.expect("first put");
    storage.put(&ctx, &key, &second).await.expect("second put");
    assert_eq!(storage.get(&ctx, &key).await.expect("get"), second);

    storage.put(&ctx, &key, &first).await.expect("third put");
    assert_eq!(storage.get(&ctx, &key).await.expect("get"), first);
}

pub async fn check_root_lifecycle<S: MerkleStorage>(storage: &S) {
    let ctx = Context::new();
    match storage.get_root(&ctx).await {
        Err(StorageError::NotFound) => {}
        other => panic!("expected NotFound before any root is set, got {:?}", other),
    }

    storage.set_root(&ctx, &hash_of(60)).await.expect("set root");
    assert_eq!(storage.get_root(&ctx).await.expect("get root"), hash_of(60));

    storage.set_root(&ctx, &hash_of(61)).await.expect("replace root");
    assert_eq!(storage.get_root(&ctx).await.expect("get root"), hash_of(61));
}

pub async fn check_namespace_isolation<S: MerkleStorage>(a: &S, b: &S) {
    let ctx = Context::new();
    let key = hash_of(7);

    a.put(&ctx, &key, &Node::leaf(hash_of(70), hash_of(71)))
        .await
        .expect("put in a");
    a.set_root(&ctx, &hash_of(72)).await.expect("set root in a");

    assert!(
        b.get(&ctx, &key).await.unwrap_err().is_not_found(),
        "node written under one tree id is visible under another"
    );
    assert!(
        b.get_root(&ctx).await.unwrap_err().is_not_found(),
        "root written under one tree id is visible under another"
    );

    b.put(&ctx, &key, &Node::empty()).await.expect("put in b");
    assert_eq!(
        a.get(&ctx, &key).await.expect("get in a"),
        Node::leaf(hash_of(70), hash_of(71))
    );
}

pub async fn check_cancelled_context<S: MerkleStorage>(storage: &S) {
    let ctx = Context::new();
    ctx.cancel();

    let err = storage
        .put(&ctx, &hash_of(8), &Node::empty())
        .await
        .expect_err("put with a cancelled context");
    assert!(err.is_cancellation(), "expected cancellation, got {:?}", err);

    let err = storage
        .set_root(&ctx, &hash_of(8))
        .await
        .expect_err("set_root with a cancelled context");
    assert!(err.is_cancellation(), "expected cancellation, got {:?}", err);

    let live = Context::new();
    assert!(storage.get(&live, &hash_of(8)).await.unwrap_err().is_not_found());
    assert!(storage.get_root(&live).await.unwrap_err().is_not_found());
}

/// Fresh tree 7: missing root, then set, read, put a leaf, replace the root
pub async fn check_root_scenario<B: StorageBuilder>(builder: &mut B) {
    let ctx = Context::new();
    let storage = builder.storage(7);
    let (h1, h2, k1) = (hash_of(0xa1), hash_of(0xa2), hash_of(0xb1));
    let leaf = Node::leaf(hash_of(0xc1), hash_of(0xc2));

    assert!(storage.get_root(&ctx).await.unwrap_err().is_not_found());
    storage.set_root(&ctx, &h1).await.expect("set h1");
    assert_eq!(storage.get_root(&ctx).await.expect("get h1"), h1);
    storage.put(&ctx, &k1, &leaf).await.expect("put leaf");
    assert_eq!(storage.get(&ctx, &k1).await.expect("get leaf"), leaf);
    storage.set_root(&ctx, &h2).await.expect("set h2");
    assert_eq!(storage.get_root(&ctx).await.expect("get h2"), h2);
}
