/**
 * Cryptographic primitives:
 *  - symmetric per-revision keys (ChaCha20-Poly1305)
 *  - random per-node identities (INumbers)
 */
pub mod crypto;
/**
 * Internal wrapper around IPLD, renamed to
 *  something a little more down-to-earth.
 * Content identifiers, content-addressed blocks,
 *  and dag-cbor (de)serialization for linked data.
 */
pub mod linked_data;
/**
 * Probabilistic name filters.
 * Encode a node's ancestry + current key into an
 *  opaque, unlinkable lookup name for the index.
 */
pub mod namefilter;
/**
 * The private node engine: encrypted directory
 *  trees, byte files, and structured data files,
 *  plus the root handle that keeps the name index
 *  consistent across mutations.
 */
pub mod node;
/**
 * Slash-separated path segments for walking trees.
 */
pub mod path;
/**
 * The spiral ratchet: a forward-secure key schedule
 *  with bounded reverse search for history walks.
 */
pub mod ratchet;
/**
 * Storage layer implementation.
 *  Content-addressed block store (memory or disk),
 *  the authenticated name index, and the ratchet
 *  side-index used for history.
 */
pub mod store;

pub mod prelude {
    pub use crate::crypto::{INumber, Key};
    pub use crate::linked_data::Cid;
    pub use crate::namefilter::{BareNamefilter, Name};
    pub use crate::node::{FsError, HistoryEntry, PrivateNode, PutResult, Root, Source};
    pub use crate::path::Path;
    pub use crate::ratchet::Spiral;
    pub use crate::store::Store;
}
