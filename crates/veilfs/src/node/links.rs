//! Encrypted link tables: how a directory finds its children.
//!
//! A [`PrivateLink`] carries everything needed to walk to a child without
//! consulting the global index: header CID, decryption key, index pointer,
//! size, and kind. The table serializes as CBOR, is sealed under the
//! directory's current key, and lands in the block store as a raw block
//! whose CID becomes the directory's `content`.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::crypto::Key;
use crate::linked_data::{Block, Cid, CodecError};
use crate::namefilter::Name;

use super::FsError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrivateLink {
    pub name: String,
    pub size: i64,
    pub is_file: bool,
    pub cid: Cid,
    pub key: Key,
    pub pointer: Name,
}

/// Map of child name to link. Set semantics are authoritative; listings
/// come out sorted ascending by name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PrivateLinks(BTreeMap<String, PrivateLink>);

impl PrivateLinks {
    pub fn new() -> Self {
        PrivateLinks(BTreeMap::new())
    }

    pub fn get(&self, name: &str) -> Option<&PrivateLink> {
        self.0.get(name)
    }

    pub fn add(&mut self, link: PrivateLink) {
        self.0.insert(link.name.clone(), link);
    }

    pub fn remove(&mut self, name: &str) -> bool {
        self.0.remove(name).is_some()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Links in ascending name order.
    pub fn sorted(&self) -> impl Iterator<Item = &PrivateLink> {
        self.0.values()
    }

    /// Sum of child sizes; a directory's own size.
    pub fn size_sum(&self) -> i64 {
        self.0.values().map(|l| l.size).sum()
    }

    /// Seal the table under the directory's current key as a raw block.
    pub fn seal(&self, key: &Key) -> Result<Block, FsError> {
        let plain = serde_ipld_dagcbor::to_vec(self).map_err(CodecError::from)?;
        Ok(Block::raw(key.seal(&plain)?))
    }

    pub fn open(data: &[u8], key: &Key) -> Result<Self, FsError> {
        let plain = key.open(data)?;
        serde_ipld_dagcbor::from_slice(&plain)
            .map_err(|_| FsError::MalformedNode("invalid link table"))
    }
}
