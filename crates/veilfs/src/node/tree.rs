use crate::crypto::{INumber, Key};
use crate::linked_data::Cid;
use crate::namefilter::{BareNamefilter, Name};
use crate::path::Path;
use crate::ratchet::Spiral;
use crate::store::Store;

use super::header::{Header, NodeType};
use super::links::PrivateLinks;
use super::{
    cid_from_name, load_header, load_node, node_history, timestamp, CopyEntry, CopySource,
    DirEntry, FsError, HistoryEntry, PrivateNode, PutResult, Source,
};

/// An encrypted directory.
///
/// Owns a link table (lazily loaded from its content block), a live ratchet,
/// and a header. All mutations run copy-on-write up the spine: the affected
/// leaf is put first, then each ancestor re-links the fresh child and puts
/// itself.
#[derive(Debug, Clone)]
pub struct Tree {
    store: Store,
    // not persisted; names live in parent link tables
    name: String,
    // header cid this tree was loaded from, if stored
    cid: Option<Cid>,

    header: Header,
    ratchet: Spiral,
    links: Option<PrivateLinks>,
}

impl Tree {
    /// A fresh, unstored directory under the given parent filter.
    pub fn new_empty(store: Store, parent: &BareNamefilter, name: &str) -> Tree {
        let inumber = INumber::generate();
        let bare_namefilter = BareNamefilter::with_inumber(parent, &inumber);

        Tree {
            store,
            name: name.to_string(),
            cid: None,
            header: Header::new(NodeType::Dir, inumber, bare_namefilter),
            ratchet: Spiral::new(),
            links: Some(PrivateLinks::new()),
        }
    }

    /// Load a stored directory from its header CID.
    pub async fn load(store: Store, name: &str, key: &Key, cid: Cid) -> Result<Tree, FsError> {
        tracing::debug!(name, %cid, "Tree::load");
        let (header, ratchet) = load_header(&store, &cid, key).await?;
        if header.info.node_type != NodeType::Dir {
            return Err(FsError::NotADirectory(name.to_string()));
        }
        Ok(Tree::from_parts(store, name, cid, header, ratchet))
    }

    /// Load a stored directory by its private name, through the index.
    pub async fn load_from_name(
        store: Store,
        name: &str,
        key: &Key,
        pointer: &Name,
    ) -> Result<Tree, FsError> {
        let cid = cid_from_name(&store, pointer).await?;
        Tree::load(store, name, key, cid).await
    }

    pub(super) fn from_parts(
        store: Store,
        name: &str,
        cid: Cid,
        header: Header,
        ratchet: Spiral,
    ) -> Tree {
        Tree {
            store,
            name: name.to_string(),
            cid: Some(cid),
            header,
            ratchet,
            links: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn header(&self) -> &Header {
        &self.header
    }

    pub fn ratchet(&self) -> &Spiral {
        &self.ratchet
    }

    pub fn cid(&self) -> Option<Cid> {
        self.cid
    }

    pub fn inumber(&self) -> INumber {
        self.header.info.inumber
    }

    pub fn bare_namefilter(&self) -> &BareNamefilter {
        &self.header.info.bare_namefilter
    }

    pub fn size(&self) -> i64 {
        self.header.info.size
    }

    pub fn mtime(&self) -> i64 {
        self.header.info.mtime
    }

    pub fn mode(&self) -> u32 {
        self.header.info.mode
    }

    pub fn key(&self) -> Key {
        self.ratchet.key()
    }

    /// The current index pointer: ancestry + INumber + current key, hashed.
    pub fn private_name(&self) -> Name {
        self.header
            .info
            .bare_namefilter
            .add_key(&self.ratchet.key())
            .to_name()
    }

    pub(super) fn store(&self) -> &Store {
        &self.store
    }

    /// Load the link table from the content block if it isn't in memory yet.
    async fn ensure_links(&mut self) -> Result<&mut PrivateLinks, FsError> {
        if self.links.is_none() {
            let cid = self
                .header
                .content
                .ok_or(FsError::MalformedNode("directory has no content cid"))?;
            let sealed = self.store.blocks().get(&cid).await?;
            self.links = Some(PrivateLinks::open(&sealed, &self.ratchet.key())?);
        }
        Ok(self.links.as_mut().expect("links just ensured"))
    }

    /// Entries sorted ascending by name; `limit` caps the count.
    pub async fn read_dir(&mut self, limit: Option<usize>) -> Result<Vec<DirEntry>, FsError> {
        let links = self.ensure_links().await?;
        let take = limit.unwrap_or(usize::MAX);
        Ok(links
            .sorted()
            .take(take)
            .map(|l| DirEntry {
                name: l.name.clone(),
                is_file: l.is_file,
            })
            .collect())
    }

    /// Walk `path` down from this directory. The empty path is this node.
    pub async fn get(&mut self, path: &Path) -> Result<PrivateNode, FsError> {
        let Some((head, tail)) = path.shift() else {
            return Ok(PrivateNode::Tree(self.clone()));
        };

        let link = self
            .ensure_links()
            .await?
            .get(head)
            .cloned()
            .ok_or(FsError::NotFound)?;

        if tail.is_empty() {
            load_node(&self.store, head, link.cid, &link.key).await
        } else {
            if link.is_file {
                return Err(FsError::NotADirectory(head.to_string()));
            }
            let mut child = Tree::load(self.store.clone(), head, &link.key, link.cid).await?;
            Box::pin(child.get(&tail)).await
        }
    }

    /// Write a file (bytes or structured value) at `path`, creating
    /// intermediate directories.
    pub async fn add(&mut self, path: &Path, source: Source) -> Result<PutResult, FsError> {
        tracing::debug!(path = %path, "Tree::add");
        let Some((head, tail)) = path.shift() else {
            return Err(FsError::InvalidPath("empty".to_string()));
        };

        let res = if tail.is_empty() {
            self.create_or_update_child_file(head, source).await?
        } else {
            let mut child = self.get_or_create_child_tree(head).await?;
            Box::pin(child.add(&tail, source)).await?
        };

        self.update_userland_link(head, &res);
        // contents of this tree changed, write an update
        self.put().await
    }

    /// Copy a file or directory tree in from a host filesystem. Source
    /// reads are sequential.
    pub async fn copy(
        &mut self,
        path: &Path,
        src_path: &std::path::Path,
        src: &dyn CopySource,
    ) -> Result<PutResult, FsError> {
        tracing::debug!(path = %path, src = %src_path.display(), "Tree::copy");
        let Some((head, tail)) = path.shift() else {
            return Err(FsError::InvalidPath("empty".to_string()));
        };

        let res = if tail.is_empty() {
            match src.entry(src_path)? {
                CopyEntry::File(bytes) => {
                    self.create_or_update_child_file(head, Source::Bytes(bytes))
                        .await?
                }
                CopyEntry::Dir(entries) => {
                    self.copy_dir_into(head, src_path, entries, src).await?
                }
            }
        } else {
            let mut child = self.get_or_create_child_tree(head).await?;
            Box::pin(child.copy(&tail, src_path, src)).await?
        };

        self.update_userland_link(head, &res);
        self.put().await
    }

    async fn copy_dir_into(
        &mut self,
        name: &str,
        src_path: &std::path::Path,
        entries: Vec<String>,
        src: &dyn CopySource,
    ) -> Result<PutResult, FsError> {
        let mut tree = self.get_or_create_child_tree(name).await?;

        let mut res = None;
        for entry in entries {
            let child_src = src_path.join(&entry);
            res = Some(Box::pin(tree.copy(&Path::parse(&entry), &child_src, src)).await?);
        }

        match res {
            Some(res) => Ok(res),
            // empty source directory: still materialize it
            None => tree.put().await,
        }
    }

    /// Remove the link at `path`. Blocks stay in the store; prior revisions
    /// remain reachable through history with the right key.
    pub async fn rm(&mut self, path: &Path) -> Result<PutResult, FsError> {
        let Some((head, tail)) = path.shift() else {
            return Err(FsError::InvalidPath("empty".to_string()));
        };
        self.ensure_links().await?;

        if tail.is_empty() {
            if !self.remove_userland_link(head) {
                return Err(FsError::NotFound);
            }
        } else {
            let link = self
                .ensure_links()
                .await?
                .get(head)
                .cloned()
                .ok_or(FsError::NotFound)?;
            if link.is_file {
                return Err(FsError::NotADirectory(head.to_string()));
            }
            let mut child = Tree::load(self.store.clone(), head, &link.key, link.cid).await?;
            let res = Box::pin(child.rm(&tail)).await?;
            self.update_userland_link(head, &res);
        }

        self.put().await
    }

    /// Create directories along `path`. Existing directories are walked,
    /// missing ones created; a file in the way is [`FsError::NodeExists`].
    /// Puts run regardless so mtimes propagate.
    pub async fn mkdir(&mut self, path: &Path) -> Result<PutResult, FsError> {
        let Some((head, tail)) = path.shift() else {
            return Err(FsError::InvalidPath("empty".to_string()));
        };

        let mut child = self.get_or_create_child_tree(head).await?;
        let res = if tail.is_empty() {
            child.put().await?
        } else {
            Box::pin(child.mkdir(&tail)).await?
        };

        self.update_userland_link(head, &res);
        self.put().await
    }

    pub async fn history(&self, max_revs: usize) -> Result<Vec<HistoryEntry>, FsError> {
        node_history(
            &self.store,
            &self.header.info.bare_namefilter,
            &self.header.info.inumber,
            &self.ratchet,
            max_revs,
        )
        .await
    }

    async fn get_or_create_child_tree(&mut self, name: &str) -> Result<Tree, FsError> {
        let link = self.ensure_links().await?.get(name).cloned();
        match link {
            None => Ok(Tree::new_empty(
                self.store.clone(),
                &self.header.info.bare_namefilter,
                name,
            )),
            Some(link) if link.is_file => Err(FsError::NodeExists(name.to_string())),
            Some(link) => Tree::load(self.store.clone(), name, &link.key, link.cid).await,
        }
    }

    async fn create_or_update_child_file(
        &mut self,
        name: &str,
        source: Source,
    ) -> Result<PutResult, FsError> {
        let existing = self.ensure_links().await?.get(name).cloned();
        if let Some(link) = existing {
            let mut prev = load_node(&self.store, name, link.cid, &link.key).await?;
            if prev.is_dir() {
                return Err(FsError::NodeExists(name.to_string()));
            }
            return prev.update(source).await;
        }

        match source {
            Source::Value(value) => {
                let mut child = super::DataFile::new(
                    self.store.clone(),
                    name,
                    value,
                    &self.header.info.bare_namefilter,
                );
                child.put().await
            }
            Source::Bytes(bytes) => {
                let mut child = super::File::new(
                    self.store.clone(),
                    name,
                    bytes,
                    &self.header.info.bare_namefilter,
                );
                child.put().await
            }
        }
    }

    fn update_userland_link(&mut self, name: &str, res: &PutResult) {
        self.links
            .as_mut()
            .expect("links loaded before mutation")
            .add(res.to_private_link(name));
        self.header.info.mtime = timestamp();
    }

    fn remove_userland_link(&mut self, name: &str) -> bool {
        let removed = self
            .links
            .as_mut()
            .expect("links loaded before mutation")
            .remove(name);
        if removed {
            self.header.info.mtime = timestamp();
        }
        removed
    }

    /// The canonical write pipeline: advance the ratchet, re-seal the link
    /// table and header under the new key, publish both blocks, record the
    /// ratchet state, install `name → CID` in the index.
    ///
    /// If anything fails after the ratchet advance the node is invalid and
    /// must be discarded; the caller reloads from the last committed root.
    pub async fn put(&mut self) -> Result<PutResult, FsError> {
        self.ensure_links().await?;
        self.ratchet.inc();
        let key = self.ratchet.key();
        tracing::debug!(name = %self.name, ratchet = %self.ratchet.summary(), "Tree::put");

        self.header.info.ratchet = self.ratchet.encode();
        let links = self.links.as_ref().expect("links loaded before mutation");
        self.header.info.size = links.size_sum();

        let links_block = links.seal(&key)?;
        self.header.content = Some(links_block.cid());

        let header_block = self.header.seal(&key)?;
        self.store
            .blocks()
            .put_many(&[header_block.clone(), links_block])
            .await?;
        self.cid = Some(header_block.cid());

        let pointer = self.private_name();
        self.store
            .ratchets()
            .put_ratchet(&self.header.info.inumber, &self.ratchet)
            .await?;
        self.store
            .index()
            .set(pointer.clone(), header_block.cid())
            .await?;

        tracing::debug!(name = %self.name, cid = %header_block.cid(), size = self.header.info.size, "Tree::put done");
        Ok(PutResult {
            cid: header_block.cid(),
            size: self.header.info.size,
            node_type: NodeType::Dir,
            key,
            pointer,
        })
    }
}
