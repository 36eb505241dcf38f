use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::linked_data::{Block, BlockEncoded, Cid, CodecError, DagCborCodec};
use crate::namefilter::Name;

use super::block_store::{BlockStore, BlockStoreError};

/// The authenticated `name → header CID` map.
///
/// This is the flat lookup surface every private node writes through: one
/// entry per live revision, keyed by the node's opaque [`Name`]. Entries are
/// buffered in memory; [`NameIndex::write`] serializes the whole map as a
/// dag-cbor block whose CID becomes the authenticated root — the
/// filesystem's public handle.
#[derive(Clone, Debug)]
pub struct NameIndex {
    blocks: BlockStore,
    inner: Arc<RwLock<IndexInner>>,
}

#[derive(Debug, Default)]
struct IndexInner {
    entries: BTreeMap<String, Cid>,
    root: Option<Cid>,
}

#[derive(Debug, Serialize, Deserialize, Default)]
struct IndexBlock {
    entries: BTreeMap<String, Cid>,
}

impl BlockEncoded<DagCborCodec> for IndexBlock {}

#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    #[error("index backend error: {0}")]
    Backend(#[from] BlockStoreError),
    #[error("index codec error: {0}")]
    Codec(#[from] CodecError),
}

impl NameIndex {
    pub fn empty(blocks: BlockStore) -> Self {
        NameIndex {
            blocks,
            inner: Arc::new(RwLock::new(IndexInner::default())),
        }
    }

    /// Reopen an index from its authenticated root.
    pub async fn load(blocks: BlockStore, root: Cid) -> Result<Self, IndexError> {
        let data = blocks.get(&root).await?;
        let decoded = IndexBlock::decode(&data)?;
        tracing::debug!(%root, entries = decoded.entries.len(), "NameIndex::load");
        Ok(NameIndex {
            blocks,
            inner: Arc::new(RwLock::new(IndexInner {
                entries: decoded.entries,
                root: Some(root),
            })),
        })
    }

    /// Look up the header CID stored under a name.
    pub async fn find(&self, name: &Name) -> Result<Option<Cid>, IndexError> {
        Ok(self.inner.read().await.entries.get(name.as_str()).copied())
    }

    /// Like [`NameIndex::find`], but returns the stored value as raw
    /// dag-cbor bytes (a tag-42 CID), for callers that forward the mapping
    /// value without decoding it.
    pub async fn find_raw(&self, name: &Name) -> Result<Option<Vec<u8>>, IndexError> {
        match self.find(name).await? {
            Some(cid) => Ok(Some(serde_ipld_dagcbor::to_vec(&cid).map_err(CodecError::from)?)),
            None => Ok(None),
        }
    }

    /// Insert or overwrite a mapping. Takes effect in the authenticated
    /// root at the next [`NameIndex::write`].
    pub async fn set(&self, name: Name, cid: Cid) -> Result<(), IndexError> {
        tracing::debug!(name = %name, %cid, "NameIndex::set");
        self.inner
            .write()
            .await
            .entries
            .insert(name.as_str().to_string(), cid);
        Ok(())
    }

    /// Flush the map and recompute the authenticated root.
    pub async fn write(&self) -> Result<Cid, IndexError> {
        let mut inner = self.inner.write().await;
        let block = Block::dag_cbor(
            IndexBlock {
                entries: inner.entries.clone(),
            }
            .encode()?,
        );
        self.blocks.put(&block).await?;
        inner.root = Some(block.cid());
        tracing::debug!(root = %block.cid(), entries = inner.entries.len(), "NameIndex::write");
        Ok(block.cid())
    }

    /// The current authenticated root, if the index has ever been written.
    pub async fn root(&self) -> Option<Cid> {
        self.inner.read().await.root
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn name(s: &str) -> Name {
        Name::from(s.to_string())
    }

    #[tokio::test]
    async fn test_set_find() {
        let index = NameIndex::empty(BlockStore::memory());
        let cid = Block::raw(b"header".to_vec()).cid();

        assert!(index.find(&name("missing")).await.unwrap().is_none());

        index.set(name("abc"), cid).await.unwrap();
        assert_eq!(index.find(&name("abc")).await.unwrap(), Some(cid));
    }

    #[tokio::test]
    async fn test_find_raw_is_tagged_cid() {
        let index = NameIndex::empty(BlockStore::memory());
        let cid = Block::raw(b"header".to_vec()).cid();
        index.set(name("abc"), cid).await.unwrap();

        let raw = index.find_raw(&name("abc")).await.unwrap().unwrap();
        let decoded: Cid = serde_ipld_dagcbor::from_slice(&raw).unwrap();
        assert_eq!(decoded, cid);
    }

    #[tokio::test]
    async fn test_write_and_reload() {
        let blocks = BlockStore::memory();
        let index = NameIndex::empty(blocks.clone());
        let cid = Block::raw(b"header".to_vec()).cid();
        index.set(name("abc"), cid).await.unwrap();

        assert!(index.root().await.is_none());
        let root = index.write().await.unwrap();
        assert_eq!(index.root().await, Some(root));

        let reloaded = NameIndex::load(blocks, root).await.unwrap();
        assert_eq!(reloaded.find(&name("abc")).await.unwrap(), Some(cid));
    }

    #[tokio::test]
    async fn test_root_changes_with_contents() {
        let index = NameIndex::empty(BlockStore::memory());
        index
            .set(name("a"), Block::raw(b"1".to_vec()).cid())
            .await
            .unwrap();
        let first = index.write().await.unwrap();

        index
            .set(name("b"), Block::raw(b"2".to_vec()).cid())
            .await
            .unwrap();
        let second = index.write().await.unwrap();

        assert_ne!(first, second);
    }
}
