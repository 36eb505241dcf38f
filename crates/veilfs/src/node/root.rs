use bytes::Bytes;

use crate::crypto::Key;
use crate::linked_data::Cid;
use crate::namefilter::{BareNamefilter, Name};
use crate::path::Path;
use crate::store::Store;

use super::tree::Tree;
use super::{CopySource, DirEntry, FsError, HistoryEntry, PrivateNode, PutResult, Source};

/// The filesystem handle: a [`Tree`] plus the bookkeeping that makes its
/// mutations durable.
///
/// Every top-level mutation ends by flushing the name index (recomputing its
/// authenticated root) and the ratchet store. The root's CID *is* the index
/// root — that CID, the root key, and the root's private name are the whole
/// reopen handle.
#[derive(Debug, Clone)]
pub struct Root {
    tree: Tree,
}

impl Root {
    /// A fresh, empty filesystem. Nothing is persisted until the first put.
    pub fn new_empty(store: Store, name: &str) -> Root {
        Root {
            tree: Tree::new_empty(store, &BareNamefilter::identity(), name),
        }
    }

    /// Reopen a filesystem from its handle: the caller supplies a store
    /// opened at the index root, plus the root key and private name.
    pub async fn load(store: Store, name: &str, key: &Key, pointer: &Name) -> Result<Root, FsError> {
        tracing::debug!(name, pointer = %pointer, "Root::load");
        let tree = Tree::load_from_name(store, name, key, pointer).await?;
        Ok(Root { tree })
    }

    /// The authenticated index root; changes after every mutation.
    pub async fn cid(&self) -> Option<Cid> {
        self.tree.store().index().root().await
    }

    /// The current root key; half of the reopen handle.
    pub fn key(&self) -> Key {
        self.tree.key()
    }

    /// The current root pointer; the other half of the reopen handle.
    pub fn private_name(&self) -> Name {
        self.tree.private_name()
    }

    pub fn store(&self) -> &Store {
        self.tree.store()
    }

    /// Parse and walk a `/`-separated path.
    pub async fn open(&mut self, path: &str) -> Result<PrivateNode, FsError> {
        self.get(&Path::parse(path)).await
    }

    pub async fn get(&mut self, path: &Path) -> Result<PrivateNode, FsError> {
        self.tree.get(path).await
    }

    pub async fn add(&mut self, path: &Path, source: Source) -> Result<PutResult, FsError> {
        let res = self.tree.add(path, source).await?;
        self.put_root().await?;
        Ok(res)
    }

    pub async fn copy(
        &mut self,
        path: &Path,
        src_path: &std::path::Path,
        src: &dyn CopySource,
    ) -> Result<PutResult, FsError> {
        let res = self.tree.copy(path, src_path, src).await?;
        self.put_root().await?;
        Ok(res)
    }

    pub async fn rm(&mut self, path: &Path) -> Result<PutResult, FsError> {
        let res = self.tree.rm(path).await?;
        self.put_root().await?;
        Ok(res)
    }

    pub async fn mkdir(&mut self, path: &Path) -> Result<PutResult, FsError> {
        let res = self.tree.mkdir(path).await?;
        self.put_root().await?;
        Ok(res)
    }

    /// Persist the root tree as-is (used to materialize a new filesystem).
    pub async fn put(&mut self) -> Result<PutResult, FsError> {
        let res = self.tree.put().await?;
        self.put_root().await?;
        Ok(res)
    }

    /// Directory listing at `path` (the root itself for the empty path).
    pub async fn ls(&mut self, path: &Path) -> Result<Vec<DirEntry>, FsError> {
        match self.get(path).await? {
            PrivateNode::Tree(mut tree) => tree.read_dir(None).await,
            _ => Err(FsError::NotADirectory(path.to_string())),
        }
    }

    /// File bytes at `path`; data-file values come back as their CBOR
    /// encoding.
    pub async fn cat(&mut self, path: &Path) -> Result<Bytes, FsError> {
        match self.get(path).await? {
            PrivateNode::File(mut file) => file.read().await,
            PrivateNode::DataFile(df) => df.read(),
            PrivateNode::Tree(_) => Err(FsError::NotAFile(path.to_string())),
        }
    }

    /// Revision history of the node at `path`, newest first.
    pub async fn history(
        &mut self,
        path: &Path,
        max_revs: usize,
    ) -> Result<Vec<HistoryEntry>, FsError> {
        let node = self.get(path).await?;
        node.history(max_revs).await
    }

    /// Flush the index (writing its authenticated root) and the ratchet
    /// store. Runs after every top-level mutation.
    async fn put_root(&mut self) -> Result<(), FsError> {
        let store = self.tree.store();
        let index_root = store.index().write().await?;
        store.ratchets().flush().await?;
        tracing::debug!(%index_root, name = %self.private_name(), "Root::put_root");
        Ok(())
    }
}
