use bytes::Bytes;

use crate::crypto::{INumber, Key};
use crate::linked_data::{Cid, CodecError, Ipld};
use crate::namefilter::{BareNamefilter, Name};
use crate::ratchet::Spiral;
use crate::store::Store;

use super::header::{Header, NodeType};
use super::{node_history, timestamp, File, FsError, HistoryEntry, PutResult, Source};

/// An encrypted structured-data file.
///
/// Holds an arbitrary CBOR-serializable value inline in the header envelope
/// rather than in a separate content block; its size is the length of the
/// value's CBOR encoding.
#[derive(Debug, Clone)]
pub struct DataFile {
    store: Store,
    name: String,
    cid: Option<Cid>,

    header: Header,
    ratchet: Spiral,
    content: Ipld,
}

impl DataFile {
    /// A fresh, unstored data file under the given parent filter.
    pub fn new(store: Store, name: &str, content: Ipld, parent: &BareNamefilter) -> DataFile {
        let inumber = INumber::generate();
        let bare_namefilter = BareNamefilter::with_inumber(parent, &inumber);

        DataFile {
            store,
            name: name.to_string(),
            cid: None,
            header: Header::new(NodeType::DataFile, inumber, bare_namefilter),
            ratchet: Spiral::new(),
            content,
        }
    }

    pub(super) fn from_parts(
        store: Store,
        name: &str,
        cid: Cid,
        mut header: Header,
        ratchet: Spiral,
    ) -> Result<DataFile, FsError> {
        let content = header
            .value
            .take()
            .ok_or(FsError::MalformedNode("data file header has no value"))?;
        Ok(DataFile {
            store,
            name: name.to_string(),
            cid: Some(cid),
            header,
            ratchet,
            content,
        })
    }

    /// Rebuild a byte file as a data file, keeping its identity: INumber,
    /// bare filter, metadata, and ratchet all carry over; only the type and
    /// content change.
    pub(super) fn transmuted(
        store: Store,
        name: &str,
        cid: Option<Cid>,
        mut header: Header,
        ratchet: Spiral,
        content: Ipld,
    ) -> DataFile {
        header.info.node_type = NodeType::DataFile;
        header.content = None;
        header.value = None;
        DataFile {
            store,
            name: name.to_string(),
            cid,
            header,
            ratchet,
            content,
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

    pub fn private_name(&self) -> Name {
        self.header
            .info
            .bare_namefilter
            .add_key(&self.ratchet.key())
            .to_name()
    }

    pub fn content(&self) -> &Ipld {
        &self.content
    }

    pub fn set_content(&mut self, content: Ipld) {
        self.content = content;
    }

    /// Replace the value. A byte-stream source transmutes this node into a
    /// [`File`]; this is the only supported type change.
    pub async fn update(&mut self, source: Source) -> Result<PutResult, FsError> {
        match source {
            Source::Value(value) => {
                self.set_content(value);
                self.put().await
            }
            Source::Bytes(bytes) => {
                let mut transmuted = File::transmuted(
                    self.store.clone(),
                    &self.name,
                    self.cid,
                    self.header.clone(),
                    self.ratchet.clone(),
                    bytes,
                );
                transmuted.put().await
            }
        }
    }

    /// The canonical write pipeline for data files: the sealed value rides
    /// inline in the header envelope, so a single block is published.
    pub async fn put(&mut self) -> Result<PutResult, FsError> {
        self.ratchet.inc();
        let key = self.ratchet.key();
        tracing::debug!(name = %self.name, ratchet = %self.ratchet.summary(), "DataFile::put");

        let encoded = serde_ipld_dagcbor::to_vec(&self.content).map_err(CodecError::from)?;
        self.header.info.size = encoded.len() as i64;
        self.header.info.ratchet = self.ratchet.encode();
        self.header.info.mtime = timestamp();
        self.header.value = Some(self.content.clone());

        let header_block = self.header.seal(&key)?;
        self.store.blocks().put(&header_block).await?;
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

        tracing::debug!(name = %self.name, cid = %header_block.cid(), size = self.header.info.size, "DataFile::put done");
        Ok(PutResult {
            cid: header_block.cid(),
            size: self.header.info.size,
            node_type: NodeType::DataFile,
            key,
            pointer,
        })
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

    /// The value rendered as bytes, for byte-oriented readers.
    pub fn read(&self) -> Result<Bytes, FsError> {
        let encoded = serde_ipld_dagcbor::to_vec(&self.content).map_err(CodecError::from)?;
        Ok(Bytes::from(encoded))
    }
}
