use bytes::Bytes;

use crate::crypto::{INumber, Key};
use crate::linked_data::Cid;
use crate::namefilter::{BareNamefilter, Name};
use crate::ratchet::Spiral;
use crate::store::Store;

use super::header::{Header, NodeType};
use super::{node_history, timestamp, DataFile, FsError, HistoryEntry, PutResult, Source};

/// An encrypted byte file.
///
/// Content is either newly supplied or lazily opened from the header's
/// content CID; the sealed content block lives separately from the header
/// envelope.
#[derive(Debug, Clone)]
pub struct File {
    store: Store,
    // not persisted; used for display and logs
    name: String,
    cid: Option<Cid>,

    header: Header,
    ratchet: Spiral,
    content: Option<Bytes>,
}

impl File {
    /// A fresh, unstored file under the given parent filter.
    pub fn new(store: Store, name: &str, content: Bytes, parent: &BareNamefilter) -> File {
        let inumber = INumber::generate();
        let bare_namefilter = BareNamefilter::with_inumber(parent, &inumber);

        File {
            store,
            name: name.to_string(),
            cid: None,
            header: Header::new(NodeType::File, inumber, bare_namefilter),
            ratchet: Spiral::new(),
            content: Some(content),
        }
    }

    pub(super) fn from_parts(
        store: Store,
        name: &str,
        cid: Cid,
        header: Header,
        ratchet: Spiral,
    ) -> File {
        File {
            store,
            name: name.to_string(),
            cid: Some(cid),
            header,
            ratchet,
            content: None,
        }
    }

    /// Rebuild a data file as a byte file, keeping its identity: INumber,
    /// bare filter, metadata, and ratchet all carry over; only the type and
    /// content change.
    pub(super) fn transmuted(
        store: Store,
        name: &str,
        cid: Option<Cid>,
        mut header: Header,
        ratchet: Spiral,
        content: Bytes,
    ) -> File {
        header.info.node_type = NodeType::File;
        header.content = None;
        header.value = None;
        File {
            store,
            name: name.to_string(),
            cid,
            header,
            ratchet,
            content: Some(content),
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

    pub fn set_content(&mut self, content: Bytes) {
        self.content = Some(content);
    }

    /// The file's bytes, fetched and decrypted on first use.
    pub async fn read(&mut self) -> Result<Bytes, FsError> {
        self.ensure_content().await?;
        Ok(self
            .content
            .clone()
            .expect("content ensured before read"))
    }

    async fn ensure_content(&mut self) -> Result<(), FsError> {
        if self.content.is_none() {
            let cid = self
                .header
                .content
                .ok_or(FsError::MalformedNode("file has no content cid"))?;
            tracing::debug!(name = %self.name, %cid, "File::ensure_content");
            // sealed under the key of the revision it was loaded from
            let content = self
                .store
                .get_encrypted_file(&cid, &self.ratchet.key())
                .await?;
            self.content = Some(content);
        }
        Ok(())
    }

    /// Replace the content. A structured value transmutes this node into a
    /// [`DataFile`]; this is the only supported type change.
    pub async fn update(&mut self, source: Source) -> Result<PutResult, FsError> {
        match source {
            Source::Bytes(bytes) => {
                self.set_content(bytes);
                self.put().await
            }
            Source::Value(value) => {
                let mut transmuted = DataFile::transmuted(
                    self.store.clone(),
                    &self.name,
                    self.cid,
                    self.header.clone(),
                    self.ratchet.clone(),
                    value,
                );
                transmuted.put().await
            }
        }
    }

    /// The canonical write pipeline for files: advance, re-seal content and
    /// header under the new key, publish, record ratchet, index the name.
    pub async fn put(&mut self) -> Result<PutResult, FsError> {
        // load lazy content under the old key before the ratchet moves
        self.ensure_content().await?;

        self.ratchet.inc();
        let key = self.ratchet.key();
        tracing::debug!(name = %self.name, ratchet = %self.ratchet.summary(), "File::put");

        let content = self.content.as_ref().expect("content ensured before put");
        let stored = self.store.put_encrypted_file(content, &key).await?;

        self.header.content = Some(stored.cid);
        self.header.info.size = stored.size;
        self.header.info.ratchet = self.ratchet.encode();
        self.header.info.mtime = timestamp();

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

        tracing::debug!(name = %self.name, cid = %header_block.cid(), size = stored.size, "File::put done");
        Ok(PutResult {
            cid: header_block.cid(),
            size: stored.size,
            node_type: NodeType::File,
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

}
