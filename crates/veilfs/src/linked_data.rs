//! CID and block plumbing for linked data.
//!
//! Every persisted artifact is a content-addressed [`Block`]: CIDv1 with a
//! SHA2-256 multihash, raw codec (0x55) for encrypted byte payloads and
//! dag-cbor (0x71) for node envelopes and index blocks. Mutating a block's
//! bytes mutates its identity.
//!
//! [`BlockEncoded`] is the (de)serialization seam: implement it on a type
//! and it round-trips through dag-cbor, with [`Cid`] fields encoded as CBOR
//! tag 42.

use bytes::Bytes;
use multihash::Multihash;
use serde::de::DeserializeOwned;
use serde::Serialize;
use sha2::{Digest, Sha256};

pub use ipld_core::cid::Cid;
pub use ipld_core::ipld::Ipld;
pub use serde_ipld_dagcbor::codec::DagCborCodec;

/// Multicodec code for raw blocks.
pub const LD_RAW_CODEC: u64 = 0x55;
/// Multicodec code for dag-cbor blocks.
pub const LD_DAG_CBOR_CODEC: u64 = 0x71;
/// Multihash code for SHA2-256.
pub const LD_SHA2_256: u64 = 0x12;

#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("cbor encode error: {0}")]
    Encode(
        #[from] serde_ipld_dagcbor::error::EncodeError<std::collections::TryReserveError>,
    ),
    #[error("cbor decode error: {0}")]
    Decode(#[from] serde_ipld_dagcbor::error::DecodeError<std::convert::Infallible>),
    #[error("cid error: {0}")]
    Cid(#[from] ipld_core::cid::Error),
}

/// Types that serialize to a single dag-cbor block.
pub trait BlockEncoded<C>: Serialize + DeserializeOwned {
    fn encode(&self) -> Result<Vec<u8>, CodecError> {
        Ok(serde_ipld_dagcbor::to_vec(self)?)
    }

    fn decode(data: &[u8]) -> Result<Self, CodecError> {
        Ok(serde_ipld_dagcbor::from_slice(data)?)
    }

    fn codec(&self) -> u64 {
        LD_DAG_CBOR_CODEC
    }
}

/// A content-addressed block: the CID is computed from the bytes at
/// construction and never drifts from them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    cid: Cid,
    data: Bytes,
}

impl Block {
    pub fn with_codec(codec: u64, data: Vec<u8>) -> Block {
        let cid = cid_for(codec, &data);
        Block {
            cid,
            data: Bytes::from(data),
        }
    }

    /// An encrypted payload block (link tables, file contents).
    pub fn raw(data: Vec<u8>) -> Block {
        Block::with_codec(LD_RAW_CODEC, data)
    }

    /// A node envelope or index block.
    pub fn dag_cbor(data: Vec<u8>) -> Block {
        Block::with_codec(LD_DAG_CBOR_CODEC, data)
    }

    pub fn cid(&self) -> Cid {
        self.cid
    }

    pub fn data(&self) -> &Bytes {
        &self.data
    }
}

/// The CID a byte slice would have under the given codec.
pub fn cid_for(codec: u64, data: &[u8]) -> Cid {
    let digest = Sha256::digest(data);
    let hash =
        Multihash::<64>::wrap(LD_SHA2_256, &digest).expect("sha-256 digest fits a multihash");
    Cid::new_v1(codec, hash)
}

#[cfg(test)]
mod test {
    use std::collections::BTreeMap;

    use serde::{Deserialize, Serialize};

    use super::*;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Sample {
        name: String,
        link: Cid,
    }

    impl BlockEncoded<DagCborCodec> for Sample {}

    #[test]
    fn test_block_cid_tracks_bytes() {
        let a = Block::raw(b"one".to_vec());
        let b = Block::raw(b"two".to_vec());
        assert_ne!(a.cid(), b.cid());
        assert_eq!(a.cid(), Block::raw(b"one".to_vec()).cid());

        // same bytes, different codec, different identity
        assert_ne!(a.cid(), Block::dag_cbor(b"one".to_vec()).cid());
    }

    #[test]
    fn test_cid_parameters() {
        let blk = Block::raw(b"check".to_vec());
        assert_eq!(blk.cid().version(), ipld_core::cid::Version::V1);
        assert_eq!(blk.cid().codec(), LD_RAW_CODEC);
        assert_eq!(blk.cid().hash().code(), LD_SHA2_256);
    }

    #[test]
    fn test_cid_round_trips_through_cbor() {
        let sample = Sample {
            name: "entry".to_string(),
            link: Block::raw(b"payload".to_vec()).cid(),
        };

        let encoded = sample.encode().unwrap();
        let decoded = Sample::decode(&encoded).unwrap();
        assert_eq!(sample, decoded);
    }

    #[test]
    fn test_map_of_cids_round_trips() {
        let mut map: BTreeMap<String, Cid> = BTreeMap::new();
        map.insert("a".to_string(), Block::raw(b"a".to_vec()).cid());
        map.insert("b".to_string(), Block::raw(b"b".to_vec()).cid());

        let encoded = serde_ipld_dagcbor::to_vec(&map).unwrap();
        let decoded: BTreeMap<String, Cid> = serde_ipld_dagcbor::from_slice(&encoded).unwrap();
        assert_eq!(map, decoded);
    }
}
