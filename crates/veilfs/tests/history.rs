//! Integration tests for history traversal

mod common;

use veilfs::node::{FsError, NodeType};
use veilfs::path::Path;
use veilfs::store::Store;

#[tokio::test]
async fn test_history_newest_first() {
    let (mut root, _store) = common::setup_root().await;
    let path = Path::parse("doc");

    root.add(&path, common::bytes(b"v1")).await.unwrap();
    root.add(&path, common::bytes(b"v2-longer")).await.unwrap();
    root.add(&path, common::bytes(b"v3-longest!")).await.unwrap();

    let history = root.history(&path, 10).await.unwrap();
    assert_eq!(history.len(), 3);

    // newest first: sizes |v3|, |v2|, |v1|
    assert_eq!(history[0].size, 11);
    assert_eq!(history[1].size, 9);
    assert_eq!(history[2].size, 2);

    for entry in &history {
        assert_eq!(entry.node_type, NodeType::File);
    }

    // entry 0 is the current state
    let node = root.get(&path).await.unwrap();
    assert_eq!(history[0].cid, node.cid().unwrap());
    assert_eq!(history[0].key, node.key());
    assert_eq!(history[0].pointer, node.private_name());
}

#[tokio::test]
async fn test_history_entries_have_distinct_pointers() {
    let (mut root, _store) = common::setup_root().await;
    let path = Path::parse("doc");

    for body in [b"a".as_slice(), b"bb", b"ccc"] {
        root.add(&path, common::bytes(body)).await.unwrap();
    }

    let history = root.history(&path, 10).await.unwrap();
    assert_eq!(history.len(), 3);
    assert_ne!(history[0].pointer, history[1].pointer);
    assert_ne!(history[1].pointer, history[2].pointer);
    assert_ne!(history[0].key, history[1].key);
}

#[tokio::test]
async fn test_history_respects_max_revs() {
    let (mut root, _store) = common::setup_root().await;
    let path = Path::parse("doc");

    for i in 0..6u8 {
        root.add(&path, common::bytes(&[i])).await.unwrap();
    }

    let history = root.history(&path, 3).await.unwrap();
    // current revision plus three prior ones
    assert_eq!(history.len(), 4);
}

#[tokio::test]
async fn test_history_single_revision() {
    let (mut root, _store) = common::setup_root().await;
    let path = Path::parse("once");

    root.add(&path, common::bytes(b"only")).await.unwrap();

    let history = root.history(&path, 10).await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].size, 4);
}

#[tokio::test]
async fn test_history_of_directory() {
    let (mut root, _store) = common::setup_root().await;

    root.add(&Path::parse("dir/one"), common::bytes(b"1"))
        .await
        .unwrap();
    root.add(&Path::parse("dir/two"), common::bytes(b"2"))
        .await
        .unwrap();

    let history = root.history(&Path::parse("dir"), 10).await.unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].node_type, NodeType::Dir);
    // the directory grew between revisions
    assert_eq!(history[0].size, 2);
    assert_eq!(history[1].size, 1);
}

#[tokio::test]
async fn test_history_without_ratchet_store_is_no_history() {
    let (mut root, store) = common::setup_root().await;
    let path = Path::parse("doc");
    root.add(&path, common::bytes(b"v1")).await.unwrap();

    // reopen against the same blocks and index, but with an empty ratchet
    // store: the oldest known state is gone
    let index_root = store.index().root().await.unwrap();
    let reopened = Store::open(store.blocks().clone(), Some(index_root), None)
        .await
        .unwrap();
    let mut root = veilfs::node::Root::load(
        reopened,
        "private",
        &root.key(),
        &root.private_name(),
    )
    .await
    .unwrap();

    let result = root.history(&path, 10).await;
    assert!(matches!(result, Err(FsError::NoHistory)));
}
