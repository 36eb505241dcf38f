mod block_store;
mod name_index;
mod ratchet_store;

pub use block_store::{BlockStore, BlockStoreError};
pub use name_index::{IndexError, NameIndex};
pub use ratchet_store::{RatchetStore, RatchetStoreError};

use std::path::Path;

use bytes::Bytes;

use crate::crypto::{CryptoError, Key};
use crate::linked_data::{Block, Cid};

/// The storage bundle a filesystem handle threads through its nodes: the
/// content-addressed block store, the authenticated name index, and the
/// ratchet side-index. Cheap to clone; all three share state across clones.
#[derive(Clone, Debug)]
pub struct Store {
    blocks: BlockStore,
    index: NameIndex,
    ratchets: RatchetStore,
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("store backend error: {0}")]
    Backend(#[from] BlockStoreError),
    #[error("store crypto error: {0}")]
    Crypto(#[from] CryptoError),
    #[error("store index error: {0}")]
    Index(#[from] IndexError),
    #[error("store ratchet error: {0}")]
    Ratchets(#[from] RatchetStoreError),
}

/// What [`Store::put_encrypted_file`] hands back: where the ciphertext
/// lives and how many userland bytes it holds.
#[derive(Debug, Clone)]
pub struct FilePut {
    pub cid: Cid,
    pub size: i64,
}

impl Store {
    /// A fully in-memory store.
    pub fn memory() -> Self {
        let blocks = BlockStore::memory();
        Store {
            index: NameIndex::empty(blocks.clone()),
            ratchets: RatchetStore::empty(blocks.clone()),
            blocks,
        }
    }

    /// A store over an on-disk block directory, with a fresh index and
    /// ratchet store.
    pub async fn fs(path: &Path) -> Result<Self, StoreError> {
        let blocks = BlockStore::fs(path).await?;
        Ok(Store {
            index: NameIndex::empty(blocks.clone()),
            ratchets: RatchetStore::empty(blocks.clone()),
            blocks,
        })
    }

    /// Reopen a store from persisted index and ratchet-store roots.
    pub async fn open(
        blocks: BlockStore,
        index_root: Option<Cid>,
        ratchet_root: Option<Cid>,
    ) -> Result<Self, StoreError> {
        let index = match index_root {
            Some(root) => NameIndex::load(blocks.clone(), root).await?,
            None => NameIndex::empty(blocks.clone()),
        };
        let ratchets = match ratchet_root {
            Some(root) => RatchetStore::load(blocks.clone(), root).await?,
            None => RatchetStore::empty(blocks.clone()),
        };
        Ok(Store {
            blocks,
            index,
            ratchets,
        })
    }

    pub fn blocks(&self) -> &BlockStore {
        &self.blocks
    }

    pub fn index(&self) -> &NameIndex {
        &self.index
    }

    pub fn ratchets(&self) -> &RatchetStore {
        &self.ratchets
    }

    /// Seal file bytes under `key` and store them as a raw block.
    pub async fn put_encrypted_file(
        &self,
        content: &[u8],
        key: &Key,
    ) -> Result<FilePut, StoreError> {
        let sealed = key.seal(content)?;
        let block = Block::raw(sealed);
        self.blocks.put(&block).await?;
        Ok(FilePut {
            cid: block.cid(),
            size: content.len() as i64,
        })
    }

    /// Fetch and open a sealed file block.
    pub async fn get_encrypted_file(&self, cid: &Cid, key: &Key) -> Result<Bytes, StoreError> {
        let sealed = self.blocks.get(cid).await?;
        Ok(Bytes::from(key.open(&sealed)?))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[tokio::test]
    async fn test_encrypted_file_round_trip() {
        let store = Store::memory();
        let key = Key::generate();

        let put = store.put_encrypted_file(b"file body", &key).await.unwrap();
        assert_eq!(put.size, 9);

        let body = store.get_encrypted_file(&put.cid, &key).await.unwrap();
        assert_eq!(body.as_ref(), b"file body");
    }

    #[tokio::test]
    async fn test_encrypted_file_wrong_key() {
        let store = Store::memory();
        let put = store
            .put_encrypted_file(b"secret", &Key::generate())
            .await
            .unwrap();

        let err = store
            .get_encrypted_file(&put.cid, &Key::generate())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            StoreError::Crypto(CryptoError::KeyMismatch)
        ));
    }

    #[tokio::test]
    async fn test_open_empty_roots() {
        let blocks = BlockStore::memory();
        let store = Store::open(blocks, None, None).await.unwrap();
        assert!(store.index().root().await.is_none());
        assert!(store.ratchets().root().await.is_none());
    }
}
