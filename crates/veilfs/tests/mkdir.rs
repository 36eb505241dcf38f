//! Integration tests for mkdir

mod common;

use veilfs::node::FsError;
use veilfs::path::Path;

#[tokio::test]
async fn test_mkdir() {
    let (mut root, _store) = common::setup_root().await;

    root.mkdir(&Path::parse("docs")).await.unwrap();

    let entries = root.ls(&Path::parse("")).await.unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].name, "docs");
    assert!(!entries[0].is_file);
}

#[tokio::test]
async fn test_mkdir_nested() {
    let (mut root, _store) = common::setup_root().await;

    root.mkdir(&Path::parse("a/b/c")).await.unwrap();

    let entries = root.ls(&Path::parse("a/b")).await.unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].name, "c");
    assert!(!entries[0].is_file);
}

#[tokio::test]
async fn test_mkdir_idempotent() {
    let (mut root, _store) = common::setup_root().await;

    root.mkdir(&Path::parse("x/y")).await.unwrap();
    root.add(&Path::parse("x/y/file.txt"), common::bytes(b"keep me"))
        .await
        .unwrap();

    // second mkdir succeeds and leaves the contents alone
    root.mkdir(&Path::parse("x/y")).await.unwrap();

    let entries = root.ls(&Path::parse("x/y")).await.unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].name, "file.txt");
    assert_eq!(
        root.cat(&Path::parse("x/y/file.txt")).await.unwrap().as_ref(),
        b"keep me"
    );
}

#[tokio::test]
async fn test_mkdir_same_inumber_across_calls() {
    let (mut root, _store) = common::setup_root().await;

    root.mkdir(&Path::parse("stable")).await.unwrap();
    let first = root.get(&Path::parse("stable")).await.unwrap().inumber();

    root.mkdir(&Path::parse("stable")).await.unwrap();
    let second = root.get(&Path::parse("stable")).await.unwrap().inumber();

    assert_eq!(first, second);
}

#[tokio::test]
async fn test_mkdir_over_file_is_error() {
    let (mut root, _store) = common::setup_root().await;

    root.add(&Path::parse("taken"), common::bytes(b"file"))
        .await
        .unwrap();

    let result = root.mkdir(&Path::parse("taken")).await;
    assert!(matches!(result, Err(FsError::NodeExists(_))));
}

#[tokio::test]
async fn test_mkdir_empty_path_is_error() {
    let (mut root, _store) = common::setup_root().await;
    let result = root.mkdir(&Path::parse("/")).await;
    assert!(matches!(result, Err(FsError::InvalidPath(_))));
}

#[tokio::test]
async fn test_mkdir_propagates_mtime() {
    let (mut root, _store) = common::setup_root().await;

    root.mkdir(&Path::parse("outer/inner")).await.unwrap();
    let outer = root.get(&Path::parse("outer")).await.unwrap();
    let before = outer.mtime();
    assert!(before > 0);

    // the put on a repeat mkdir still rewrites the spine
    let cid_before = root.cid().await.unwrap();
    root.mkdir(&Path::parse("outer/inner")).await.unwrap();
    assert_ne!(root.cid().await.unwrap(), cid_before);
}
