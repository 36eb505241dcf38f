//! The private node engine.
//!
//! Three node variants share one write protocol: every mutation advances the
//! node's ratchet, re-seals its blocks under the new key, publishes them,
//! records the ratchet state, and installs the fresh `name → CID` mapping in
//! the authenticated index. Parents repeat the dance up the spine, so one
//! leaf write re-keys the whole path to the root and nothing else.

mod data_file;
mod file;
mod header;
mod links;
mod root;
mod tree;

pub use data_file::DataFile;
pub use file::File;
pub use header::{Header, HeaderInfo, NodeType, LATEST_VERSION, MODE_DEFAULT};
pub use links::{PrivateLink, PrivateLinks};
pub use root::Root;
pub use tree::Tree;

use std::time::{SystemTime, UNIX_EPOCH};

use bytes::Bytes;

use crate::crypto::{CryptoError, INumber, Key};
use crate::linked_data::{Cid, CodecError, Ipld};
use crate::namefilter::{BareNamefilter, Name};
use crate::ratchet::{RatchetError, Spiral};
use crate::store::{
    BlockStoreError, IndexError, RatchetStoreError, Store, StoreError,
};

#[derive(Debug, thiserror::Error)]
pub enum FsError {
    #[error("not found")]
    NotFound,
    #[error("node already exists: {0}")]
    NodeExists(String),
    #[error("invalid path: {0}")]
    InvalidPath(String),
    #[error("malformed node: {0}")]
    MalformedNode(&'static str),
    #[error("not a file: {0}")]
    NotAFile(String),
    #[error("not a directory: {0}")]
    NotADirectory(String),
    #[error("no history: oldest ratchet state unknown")]
    NoHistory,
    #[error(transparent)]
    Crypto(#[from] CryptoError),
    #[error(transparent)]
    Codec(#[from] CodecError),
    #[error(transparent)]
    Ratchet(#[from] RatchetError),
    #[error("backend: {0}")]
    Backend(#[from] BlockStoreError),
    #[error("backend: {0}")]
    Index(#[from] IndexError),
    #[error("backend: {0}")]
    RatchetStore(#[from] RatchetStoreError),
    #[error("backend: {0}")]
    Store(#[from] StoreError),
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

/// What a successful put hands back up the spine: enough for the parent to
/// rebuild its link and for the caller to reopen the node.
#[derive(Debug, Clone)]
pub struct PutResult {
    pub cid: Cid,
    pub size: i64,
    pub node_type: NodeType,
    pub key: Key,
    pub pointer: Name,
}

impl PutResult {
    pub fn to_private_link(&self, name: &str) -> PrivateLink {
        PrivateLink {
            name: name.to_string(),
            size: self.size,
            is_file: self.node_type.is_file(),
            cid: self.cid,
            key: self.key.clone(),
            pointer: self.pointer.clone(),
        }
    }
}

/// One revision of a node, newest first in a history listing.
#[derive(Debug, Clone)]
pub struct HistoryEntry {
    pub cid: Cid,
    pub size: i64,
    pub mtime: i64,
    pub node_type: NodeType,
    pub key: Key,
    pub pointer: Name,
}

/// A directory listing entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    pub name: String,
    pub is_file: bool,
}

/// What a write brings: raw bytes become a [`File`], a structured value
/// becomes a [`DataFile`].
#[derive(Debug, Clone)]
pub enum Source {
    Bytes(Bytes),
    Value(Ipld),
}

/// A host filesystem to copy from. Reads are sequential; this layer never
/// parallelizes source traversal.
pub trait CopySource: Send + Sync {
    fn entry(&self, path: &std::path::Path) -> std::io::Result<CopyEntry>;
}

pub enum CopyEntry {
    File(Bytes),
    /// Child names of a directory.
    Dir(Vec<String>),
}

/// [`CopySource`] over the process's own filesystem.
pub struct OsFs;

impl CopySource for OsFs {
    fn entry(&self, path: &std::path::Path) -> std::io::Result<CopyEntry> {
        if std::fs::metadata(path)?.is_dir() {
            let mut names = Vec::new();
            for entry in std::fs::read_dir(path)? {
                names.push(entry?.file_name().to_string_lossy().to_string());
            }
            names.sort();
            Ok(CopyEntry::Dir(names))
        } else {
            Ok(CopyEntry::File(Bytes::from(std::fs::read(path)?)))
        }
    }
}

/// A loaded private node, dispatched on its header type.
#[derive(Debug, Clone)]
pub enum PrivateNode {
    Tree(Tree),
    File(File),
    DataFile(DataFile),
}

impl PrivateNode {
    pub fn node_type(&self) -> NodeType {
        match self {
            PrivateNode::Tree(_) => NodeType::Dir,
            PrivateNode::File(_) => NodeType::File,
            PrivateNode::DataFile(_) => NodeType::DataFile,
        }
    }

    pub fn is_dir(&self) -> bool {
        matches!(self, PrivateNode::Tree(_))
    }

    pub fn inumber(&self) -> INumber {
        self.header().info.inumber
    }

    pub fn bare_namefilter(&self) -> &BareNamefilter {
        &self.header().info.bare_namefilter
    }

    pub fn ratchet(&self) -> &Spiral {
        match self {
            PrivateNode::Tree(t) => t.ratchet(),
            PrivateNode::File(f) => f.ratchet(),
            PrivateNode::DataFile(d) => d.ratchet(),
        }
    }

    pub fn private_name(&self) -> Name {
        self.bare_namefilter()
            .add_key(&self.ratchet().key())
            .to_name()
    }

    pub fn key(&self) -> Key {
        self.ratchet().key()
    }

    pub fn size(&self) -> i64 {
        self.header().info.size
    }

    pub fn mtime(&self) -> i64 {
        self.header().info.mtime
    }

    pub fn mode(&self) -> u32 {
        self.header().info.mode
    }

    pub fn cid(&self) -> Option<Cid> {
        match self {
            PrivateNode::Tree(t) => t.cid(),
            PrivateNode::File(f) => f.cid(),
            PrivateNode::DataFile(d) => d.cid(),
        }
    }

    /// The structured value, for data files.
    pub fn data(&self) -> Option<&Ipld> {
        match self {
            PrivateNode::DataFile(d) => Some(d.content()),
            _ => None,
        }
    }

    pub async fn update(&mut self, source: Source) -> Result<PutResult, FsError> {
        match self {
            PrivateNode::Tree(_) => Err(FsError::NotAFile("directories don't support updating".to_string())),
            PrivateNode::File(f) => f.update(source).await,
            PrivateNode::DataFile(d) => d.update(source).await,
        }
    }

    pub async fn put(&mut self) -> Result<PutResult, FsError> {
        match self {
            PrivateNode::Tree(t) => t.put().await,
            PrivateNode::File(f) => f.put().await,
            PrivateNode::DataFile(d) => d.put().await,
        }
    }

    pub async fn history(&self, max_revs: usize) -> Result<Vec<HistoryEntry>, FsError> {
        match self {
            PrivateNode::Tree(t) => t.history(max_revs).await,
            PrivateNode::File(f) => f.history(max_revs).await,
            PrivateNode::DataFile(d) => d.history(max_revs).await,
        }
    }

    fn header(&self) -> &Header {
        match self {
            PrivateNode::Tree(t) => t.header(),
            PrivateNode::File(f) => f.header(),
            PrivateNode::DataFile(d) => d.header(),
        }
    }
}

/// Load any node by header CID + key, dispatching on the decoded type.
pub async fn load_node(
    store: &Store,
    name: &str,
    cid: Cid,
    key: &Key,
) -> Result<PrivateNode, FsError> {
    tracing::debug!(name, %cid, "load_node");
    let (header, ratchet) = load_header(store, &cid, key).await?;

    Ok(match header.info.node_type {
        NodeType::Dir => PrivateNode::Tree(Tree::from_parts(store.clone(), name, cid, header, ratchet)),
        NodeType::File => {
            PrivateNode::File(File::from_parts(store.clone(), name, cid, header, ratchet))
        }
        NodeType::DataFile => PrivateNode::DataFile(DataFile::from_parts(
            store.clone(),
            name,
            cid,
            header,
            ratchet,
        )?),
    })
}

/// Fetch and decode a header block, splitting out the live ratchet.
///
/// The encoded ratchet is cleared from the returned header: in memory the
/// [`Spiral`] is authoritative and the string is only re-populated at seal
/// time.
pub(crate) async fn load_header(
    store: &Store,
    cid: &Cid,
    key: &Key,
) -> Result<(Header, Spiral), FsError> {
    let data = store.blocks().get(cid).await?;
    let mut header = Header::decode(&data, key)?;
    let ratchet = Spiral::decode(&header.info.ratchet)
        .map_err(|_| FsError::MalformedNode("invalid header ratchet"))?;
    header.info.ratchet.clear();
    Ok((header, ratchet))
}

/// Resolve a private name to its header CID through the index.
pub(crate) async fn cid_from_name(store: &Store, name: &Name) -> Result<Cid, FsError> {
    store.index().find(name).await?.ok_or(FsError::NotFound)
}

/// Walk a node's revisions, newest first.
///
/// Re-derives up to `max_revs` prior ratchet states from the oldest one the
/// ratchet store knows, then resolves and decrypts each revision's header
/// through the index. Entry 0 is the current state.
pub(crate) async fn node_history(
    store: &Store,
    bare_namefilter: &BareNamefilter,
    inumber: &INumber,
    current: &Spiral,
    max_revs: usize,
) -> Result<Vec<HistoryEntry>, FsError> {
    let oldest = store
        .ratchets()
        .oldest_known_ratchet(inumber)
        .await?
        .ok_or(FsError::NoHistory)?;

    let mut ratchets = vec![current.clone()];
    ratchets.extend(current.previous(&oldest, max_revs)?);
    tracing::debug!(revs = ratchets.len(), oldest = %oldest.summary(), "node_history");

    let mut history = Vec::with_capacity(ratchets.len());
    for ratchet in &ratchets {
        let key = ratchet.key();
        let pointer = bare_namefilter.add_key(&key).to_name();
        let cid = cid_from_name(store, &pointer).await?;
        let (header, _) = load_header(store, &cid, &key).await?;

        history.push(HistoryEntry {
            cid,
            size: header.info.size,
            mtime: header.info.mtime,
            node_type: header.info.node_type,
            key,
            pointer,
        });
    }
    Ok(history)
}

/// Seconds since the epoch; header ctime/mtime resolution.
pub(crate) fn timestamp() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}
