//! Shared test utilities for private filesystem integration tests
#![allow(dead_code)]

use veilfs::node::Root;
use veilfs::store::Store;

/// Set up a test environment with an empty, persisted root over an
/// in-memory store.
pub async fn setup_root() -> (Root, Store) {
    let store = Store::memory();
    let mut root = Root::new_empty(store.clone(), "private");
    root.put().await.unwrap();
    (root, store)
}

pub fn bytes(data: &[u8]) -> veilfs::node::Source {
    veilfs::node::Source::Bytes(bytes::Bytes::copy_from_slice(data))
}
