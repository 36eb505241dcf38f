//! Integration tests for rm

mod common;

use veilfs::node::{load_node, FsError, PrivateNode};
use veilfs::path::Path;

#[tokio::test]
async fn test_rm_file() {
    let (mut root, _store) = common::setup_root().await;

    root.add(&Path::parse("a.txt"), common::bytes(b"a"))
        .await
        .unwrap();
    root.add(&Path::parse("b.txt"), common::bytes(b"b"))
        .await
        .unwrap();

    root.rm(&Path::parse("a.txt")).await.unwrap();

    let names: Vec<_> = root
        .ls(&Path::parse(""))
        .await
        .unwrap()
        .into_iter()
        .map(|e| e.name)
        .collect();
    assert_eq!(names, ["b.txt"]);

    let result = root.get(&Path::parse("a.txt")).await;
    assert!(matches!(result, Err(FsError::NotFound)));
}

#[tokio::test]
async fn test_rm_nested() {
    let (mut root, _store) = common::setup_root().await;

    root.add(&Path::parse("dir/inner/file.txt"), common::bytes(b"x"))
        .await
        .unwrap();
    root.rm(&Path::parse("dir/inner/file.txt")).await.unwrap();

    assert!(matches!(
        root.get(&Path::parse("dir/inner/file.txt")).await,
        Err(FsError::NotFound)
    ));
    // the directory spine survives
    assert!(root.get(&Path::parse("dir/inner")).await.unwrap().is_dir());
}

#[tokio::test]
async fn test_rm_missing_is_not_found() {
    let (mut root, _store) = common::setup_root().await;
    assert!(matches!(
        root.rm(&Path::parse("ghost")).await,
        Err(FsError::NotFound)
    ));
}

#[tokio::test]
async fn test_rm_leaves_blocks_recoverable() {
    let (mut root, store) = common::setup_root().await;

    root.add(&Path::parse("f"), common::bytes(b"A")).await.unwrap();
    let node = root.get(&Path::parse("f")).await.unwrap();
    let (cid, key) = (node.cid().unwrap(), node.key());

    root.rm(&Path::parse("f")).await.unwrap();
    assert!(matches!(
        root.get(&Path::parse("f")).await,
        Err(FsError::NotFound)
    ));

    // removal unlinks; it does not delete. The old header still decodes
    // under its original key.
    let recovered = load_node(&store, "f", cid, &key).await.unwrap();
    let PrivateNode::File(mut file) = recovered else {
        panic!("expected a file");
    };
    assert_eq!(file.read().await.unwrap().as_ref(), b"A");
}

#[tokio::test]
async fn test_rm_directory() {
    let (mut root, _store) = common::setup_root().await;

    root.add(&Path::parse("dir/file.txt"), common::bytes(b"x"))
        .await
        .unwrap();
    root.rm(&Path::parse("dir")).await.unwrap();

    assert!(matches!(
        root.get(&Path::parse("dir")).await,
        Err(FsError::NotFound)
    ));
    assert!(root.ls(&Path::parse("")).await.unwrap().is_empty());
}
