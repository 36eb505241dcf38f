use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::crypto::INumber;
use crate::linked_data::{Block, BlockEncoded, Cid, CodecError, DagCborCodec};
use crate::ratchet::{RatchetError, Spiral};

use super::block_store::{BlockStore, BlockStoreError};

/// Side-index of the oldest known ratchet state per INumber.
///
/// Every put records the node's ratchet here; only the first state seen for
/// an INumber is kept, so the stored state is the lower bound a history walk
/// replays forward from. Flushed as a dag-cbor block of
/// `inumber → encoded spiral`.
#[derive(Clone, Debug)]
pub struct RatchetStore {
    blocks: BlockStore,
    inner: Arc<RwLock<RatchetInner>>,
}

#[derive(Debug, Default)]
struct RatchetInner {
    oldest: BTreeMap<String, String>,
    root: Option<Cid>,
}

#[derive(Debug, Serialize, Deserialize, Default)]
struct RatchetBlock {
    oldest: BTreeMap<String, String>,
}

impl BlockEncoded<DagCborCodec> for RatchetBlock {}

#[derive(Debug, thiserror::Error)]
pub enum RatchetStoreError {
    #[error("ratchet store backend error: {0}")]
    Backend(#[from] BlockStoreError),
    #[error("ratchet store codec error: {0}")]
    Codec(#[from] CodecError),
    #[error("ratchet store entry: {0}")]
    Ratchet(#[from] RatchetError),
}

impl RatchetStore {
    pub fn empty(blocks: BlockStore) -> Self {
        RatchetStore {
            blocks,
            inner: Arc::new(RwLock::new(RatchetInner::default())),
        }
    }

    pub async fn load(blocks: BlockStore, root: Cid) -> Result<Self, RatchetStoreError> {
        let data = blocks.get(&root).await?;
        let decoded = RatchetBlock::decode(&data)?;
        tracing::debug!(%root, entries = decoded.oldest.len(), "RatchetStore::load");
        Ok(RatchetStore {
            blocks,
            inner: Arc::new(RwLock::new(RatchetInner {
                oldest: decoded.oldest,
                root: Some(root),
            })),
        })
    }

    /// Record a node's ratchet state. The first state seen for an INumber
    /// sticks; later calls return the stored (older) state untouched.
    pub async fn put_ratchet(
        &self,
        inumber: &INumber,
        ratchet: &Spiral,
    ) -> Result<Option<Spiral>, RatchetStoreError> {
        let key = inumber.encode();
        let mut inner = self.inner.write().await;
        if let Some(existing) = inner.oldest.get(&key) {
            return Ok(Some(Spiral::decode(existing)?));
        }
        inner.oldest.insert(key, ratchet.encode());
        Ok(None)
    }

    /// The oldest persisted state for an INumber, if any.
    pub async fn oldest_known_ratchet(
        &self,
        inumber: &INumber,
    ) -> Result<Option<Spiral>, RatchetStoreError> {
        let inner = self.inner.read().await;
        match inner.oldest.get(&inumber.encode()) {
            Some(encoded) => Ok(Some(Spiral::decode(encoded)?)),
            None => Ok(None),
        }
    }

    pub async fn flush(&self) -> Result<Cid, RatchetStoreError> {
        let mut inner = self.inner.write().await;
        let block = Block::dag_cbor(
            RatchetBlock {
                oldest: inner.oldest.clone(),
            }
            .encode()?,
        );
        self.blocks.put(&block).await?;
        inner.root = Some(block.cid());
        tracing::debug!(root = %block.cid(), entries = inner.oldest.len(), "RatchetStore::flush");
        Ok(block.cid())
    }

    pub async fn root(&self) -> Option<Cid> {
        self.inner.read().await.root
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[tokio::test]
    async fn test_keeps_oldest_state() {
        let store = RatchetStore::empty(BlockStore::memory());
        let inumber = INumber::generate();

        let oldest = Spiral::new();
        let mut newer = oldest.clone();
        newer.inc();
        newer.inc();

        assert!(store.put_ratchet(&inumber, &oldest).await.unwrap().is_none());
        // a later state does not displace the recorded one
        let prev = store.put_ratchet(&inumber, &newer).await.unwrap().unwrap();
        assert_eq!(prev, oldest);

        let stored = store.oldest_known_ratchet(&inumber).await.unwrap().unwrap();
        assert_eq!(stored, oldest);
    }

    #[tokio::test]
    async fn test_missing_inumber() {
        let store = RatchetStore::empty(BlockStore::memory());
        assert!(store
            .oldest_known_ratchet(&INumber::generate())
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_flush_and_reload() {
        let blocks = BlockStore::memory();
        let store = RatchetStore::empty(blocks.clone());
        let inumber = INumber::generate();
        let spiral = Spiral::new();
        store.put_ratchet(&inumber, &spiral).await.unwrap();

        let root = store.flush().await.unwrap();
        let reloaded = RatchetStore::load(blocks, root).await.unwrap();
        let stored = reloaded
            .oldest_known_ratchet(&inumber)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored, spiral);
    }
}
