//! Name filters: unlinkable per-revision node identifiers.
//!
//! A filter is a 2048-bit Bloom set over 256-bit elements. A node's **bare**
//! filter holds its ancestors' filter bits plus its own INumber; adding the
//! current ratchet key yields the **keyed** filter; saturating that to a
//! fixed popcount and hashing produces the [`Name`] used as the lookup key
//! in the external index.
//!
//! Saturation pads every filter to (at least) the same density, so a name
//! reveals neither how deep the node sits nor anything about its siblings,
//! and two revisions of the same node produce unrelated names.

use std::fmt;

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};

use crate::crypto::{INumber, Key};

/// Filter width in bytes (2048 bits).
pub const FILTER_SIZE: usize = 256;
/// Bit indices set per element.
pub const HASH_COUNT: usize = 30;
/// Minimum popcount of a saturated filter.
pub const SATURATION_THRESHOLD: u32 = 1019;

const FILTER_BITS: u64 = (FILTER_SIZE * 8) as u64;

#[derive(Clone, Copy, PartialEq, Eq)]
struct Filter([u8; FILTER_SIZE]);

impl Filter {
    fn empty() -> Self {
        Filter([0u8; FILTER_SIZE])
    }

    /// Set the element's [`HASH_COUNT`] bit indices. Index `i` of element
    /// `e` is the first 8 bytes of `SHA-256(e || [i])` mod the filter width.
    fn add(&mut self, element: &[u8]) {
        for i in 0..HASH_COUNT {
            let mut hasher = Sha256::new();
            hasher.update(element);
            hasher.update([i as u8]);
            let digest = hasher.finalize();

            let mut prefix = [0u8; 8];
            prefix.copy_from_slice(&digest[..8]);
            let bit = u64::from_be_bytes(prefix) % FILTER_BITS;
            self.0[(bit / 8) as usize] |= 1 << (bit % 8);
        }
    }

    fn popcount(&self) -> u32 {
        self.0.iter().map(|b| b.count_ones()).sum()
    }

    /// Pad towards [`SATURATION_THRESHOLD`] ones by repeatedly adding the
    /// filter's own hash as an element. Deterministic; stops early if a
    /// round sets no new bits.
    fn saturate(&mut self) {
        while self.popcount() < SATURATION_THRESHOLD {
            let digest = Sha256::digest(self.0);
            let before = self.popcount();
            self.add(&digest);
            if self.popcount() == before {
                break;
            }
        }
    }
}

/// A node's ancestry + INumber, without any key.
///
/// Assigned at creation from the parent's bare filter and fixed for the
/// node's lifetime.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct BareNamefilter(Filter);

impl BareNamefilter {
    /// The empty filter: parent of the root.
    pub fn identity() -> Self {
        BareNamefilter(Filter::empty())
    }

    /// A child's bare filter: the parent's bits plus the child's INumber.
    pub fn with_inumber(parent: &BareNamefilter, inumber: &INumber) -> Self {
        let mut filter = parent.0;
        filter.add(inumber.bytes());
        BareNamefilter(filter)
    }

    /// Mix in the current revision key.
    pub fn add_key(&self, key: &Key) -> KeyedNamefilter {
        let mut filter = self.0;
        filter.add(key.bytes());
        KeyedNamefilter(filter)
    }
}

impl fmt::Debug for BareNamefilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BareNamefilter({} bits)", self.0.popcount())
    }
}

/// Bare filter + current key; hashes to a [`Name`].
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct KeyedNamefilter(Filter);

impl KeyedNamefilter {
    /// Saturate, then hash: the flat lookup key for the external index.
    pub fn to_name(&self) -> Name {
        let mut filter = self.0;
        filter.saturate();
        Name(hex::encode(Sha256::digest(filter.0)))
    }
}

/// An opaque index pointer: hex SHA-256 of a saturated keyed filter.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Name(String);

impl Name {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for Name {
    fn from(s: String) -> Self {
        Name(s)
    }
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Serialize for BareNamefilter {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_bytes(&self.0 .0)
    }
}

impl<'de> Deserialize<'de> for BareNamefilter {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct FilterVisitor;

        impl<'de> Visitor<'de> for FilterVisitor {
            type Value = BareNamefilter;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{} bytes of filter", FILTER_SIZE)
            }

            fn visit_bytes<E: de::Error>(self, v: &[u8]) -> Result<BareNamefilter, E> {
                let buff: [u8; FILTER_SIZE] = v
                    .try_into()
                    .map_err(|_| E::invalid_length(v.len(), &self))?;
                Ok(BareNamefilter(Filter(buff)))
            }

            fn visit_byte_buf<E: de::Error>(self, v: Vec<u8>) -> Result<BareNamefilter, E> {
                self.visit_bytes(&v)
            }
        }

        deserializer.deserialize_bytes(FilterVisitor)
    }
}
