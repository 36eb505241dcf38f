//! Node headers and their sealed block envelopes.
//!
//! Every persisted node is a dag-cbor envelope `{ info, content | value,
//! metadata? }`. `info` is the AEAD-sealed CBOR of [`HeaderInfo`]; `content`
//! is the CID of a separately stored payload block (link table or file
//! bytes); data files inline their sealed CBOR value instead. Ciphertexts
//! carry their random 12-byte nonce as a prefix.

use serde::{Deserialize, Serialize};

use crate::crypto::{INumber, Key};
use crate::linked_data::{Block, Cid, CodecError, Ipld};
use crate::namefilter::BareNamefilter;

use super::{timestamp, FsError};

/// Schema version written into every header.
pub const LATEST_VERSION: &str = "1.0.0";
/// Mode bits for new nodes.
pub const MODE_DEFAULT: u32 = 0o644;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeType {
    Dir,
    File,
    DataFile,
}

impl NodeType {
    pub fn is_file(&self) -> bool {
        !matches!(self, NodeType::Dir)
    }
}

/// The per-node metadata sealed into the `info` field.
///
/// `ratchet` is only populated on disk; in memory the live
/// [`Spiral`](crate::ratchet::Spiral) owned by the node is the source of
/// truth and this field stays empty.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeaderInfo {
    pub version: String,
    #[serde(rename = "type")]
    pub node_type: NodeType,
    pub mode: u32,
    pub ctime: i64,
    pub mtime: i64,
    pub size: i64,
    pub inumber: INumber,
    pub bare_namefilter: BareNamefilter,
    pub ratchet: String,
}

impl HeaderInfo {
    pub fn new(node_type: NodeType, inumber: INumber, bare_namefilter: BareNamefilter) -> Self {
        let now = timestamp();
        HeaderInfo {
            version: LATEST_VERSION.to_string(),
            node_type,
            mode: MODE_DEFAULT,
            ctime: now,
            mtime: now,
            size: 0,
            inumber,
            bare_namefilter,
            ratchet: String::new(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Header {
    pub info: HeaderInfo,
    pub metadata: Option<Cid>,
    pub content: Option<Cid>,
    /// Decrypted inline value; data-file nodes only.
    pub value: Option<Ipld>,
}

#[derive(Serialize, Deserialize)]
struct Envelope {
    #[serde(with = "serde_bytes")]
    info: Vec<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    content: Option<Cid>,
    #[serde(default, skip_serializing_if = "Option::is_none", with = "serde_bytes")]
    value: Option<Vec<u8>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    metadata: Option<Cid>,
}

impl Header {
    pub fn new(node_type: NodeType, inumber: INumber, bare_namefilter: BareNamefilter) -> Self {
        Header {
            info: HeaderInfo::new(node_type, inumber, bare_namefilter),
            metadata: None,
            content: None,
            value: None,
        }
    }

    /// Seal into a dag-cbor envelope block under `key`.
    pub fn seal(&self, key: &Key) -> Result<Block, FsError> {
        let info_plain = serde_ipld_dagcbor::to_vec(&self.info).map_err(CodecError::from)?;
        let info = key.seal(&info_plain)?;

        let envelope = match self.info.node_type {
            NodeType::DataFile => {
                let value = self
                    .value
                    .as_ref()
                    .ok_or(FsError::MalformedNode("data file has no value"))?;
                let value_plain = serde_ipld_dagcbor::to_vec(value).map_err(CodecError::from)?;
                Envelope {
                    info,
                    content: None,
                    value: Some(key.seal(&value_plain)?),
                    metadata: self.metadata,
                }
            }
            _ => Envelope {
                info,
                content: Some(
                    self.content
                        .ok_or(FsError::MalformedNode("node has no content cid"))?,
                ),
                value: None,
                metadata: self.metadata,
            },
        };

        let bytes = serde_ipld_dagcbor::to_vec(&envelope).map_err(CodecError::from)?;
        Ok(Block::dag_cbor(bytes))
    }

    /// Decode an envelope block. AEAD failures surface as
    /// [`CryptoError::KeyMismatch`](crate::crypto::CryptoError::KeyMismatch),
    /// shape violations as [`FsError::MalformedNode`].
    pub fn decode(data: &[u8], key: &Key) -> Result<Header, FsError> {
        let envelope: Envelope = serde_ipld_dagcbor::from_slice(data)
            .map_err(|_| FsError::MalformedNode("invalid node envelope"))?;

        let info_plain = key.open(&envelope.info)?;
        let info: HeaderInfo = serde_ipld_dagcbor::from_slice(&info_plain)
            .map_err(|_| FsError::MalformedNode("invalid header info"))?;

        match info.node_type {
            NodeType::DataFile => {
                let sealed = envelope
                    .value
                    .ok_or(FsError::MalformedNode("data file header has no value field"))?;
                let value_plain = key.open(&sealed)?;
                let value: Ipld = serde_ipld_dagcbor::from_slice(&value_plain)
                    .map_err(|_| FsError::MalformedNode("invalid data file value"))?;
                Ok(Header {
                    info,
                    metadata: envelope.metadata,
                    content: None,
                    value: Some(value),
                })
            }
            _ => {
                let content = envelope
                    .content
                    .ok_or(FsError::MalformedNode("header has no content cid"))?;
                Ok(Header {
                    info,
                    metadata: envelope.metadata,
                    content: Some(content),
                    value: None,
                })
            }
        }
    }
}
