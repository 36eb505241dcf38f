use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use bytes::Bytes;
use tokio::sync::RwLock;

use crate::linked_data::{cid_for, Block, Cid};

/// Content-addressed, immutable blob repository.
///
/// Blocks are keyed by their CID; a fetched block is rehashed against the
/// CID it was requested under before it is returned. Backed either by an
/// in-memory map or by a directory of one file per block.
#[derive(Clone, Debug)]
pub struct BlockStore {
    backend: Arc<Backend>,
}

#[derive(Debug)]
enum Backend {
    Memory(RwLock<HashMap<Cid, Bytes>>),
    Fs(PathBuf),
}

#[derive(Debug, thiserror::Error)]
pub enum BlockStoreError {
    #[error("block store error: {0}")]
    Default(#[from] anyhow::Error),
    #[error("block store i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error("block not found: {0}")]
    NotFound(Cid),
    #[error("block {cid} does not match its content hash")]
    Corrupt { cid: Cid },
}

impl BlockStore {
    /// An in-memory store, for tests and scratch work.
    pub fn memory() -> Self {
        BlockStore {
            backend: Arc::new(Backend::Memory(RwLock::new(HashMap::new()))),
        }
    }

    /// A store over a directory of block files, one file per CID.
    pub async fn fs(path: &Path) -> Result<Self, BlockStoreError> {
        tracing::debug!(path = %path.display(), "BlockStore::fs");
        tokio::fs::create_dir_all(path).await?;
        Ok(BlockStore {
            backend: Arc::new(Backend::Fs(path.to_path_buf())),
        })
    }

    /// Fetch a block's bytes, verifying them against the CID.
    pub async fn get(&self, cid: &Cid) -> Result<Bytes, BlockStoreError> {
        let data = match &*self.backend {
            Backend::Memory(map) => map
                .read()
                .await
                .get(cid)
                .cloned()
                .ok_or(BlockStoreError::NotFound(*cid))?,
            Backend::Fs(dir) => match tokio::fs::read(dir.join(cid.to_string())).await {
                Ok(data) => Bytes::from(data),
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                    return Err(BlockStoreError::NotFound(*cid))
                }
                Err(err) => return Err(err.into()),
            },
        };

        if cid_for(cid.codec(), &data) != *cid {
            return Err(BlockStoreError::Corrupt { cid: *cid });
        }
        Ok(data)
    }

    /// Store one block.
    pub async fn put(&self, block: &Block) -> Result<Cid, BlockStoreError> {
        let cid = block.cid();
        tracing::debug!(%cid, len = block.data().len(), "BlockStore::put");
        match &*self.backend {
            Backend::Memory(map) => {
                map.write().await.insert(cid, block.data().clone());
            }
            Backend::Fs(dir) => {
                tokio::fs::write(dir.join(cid.to_string()), block.data()).await?;
            }
        }
        Ok(cid)
    }

    /// Store a batch of blocks.
    pub async fn put_many(&self, blocks: &[Block]) -> Result<(), BlockStoreError> {
        for block in blocks {
            self.put(block).await?;
        }
        Ok(())
    }

    pub async fn has(&self, cid: &Cid) -> Result<bool, BlockStoreError> {
        match &*self.backend {
            Backend::Memory(map) => Ok(map.read().await.contains_key(cid)),
            Backend::Fs(dir) => Ok(tokio::fs::try_exists(dir.join(cid.to_string())).await?),
        }
    }
}
