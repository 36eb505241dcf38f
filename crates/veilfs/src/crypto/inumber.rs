use std::fmt;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Size of an INumber in bytes (256 bits)
pub const INUMBER_SIZE: usize = 32;

/// A random identifier assigned once per node at creation.
///
/// Immutable for the life of the node. Revisions of the same node share an
/// INumber; it keys the ratchet side-index and salts the node's name filter
/// so sibling names stay unlinkable.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct INumber([u8; INUMBER_SIZE]);

impl INumber {
    pub fn generate() -> Self {
        let mut buff = [0; INUMBER_SIZE];
        getrandom::getrandom(&mut buff).expect("failed to generate random bytes");
        Self(buff)
    }

    pub fn bytes(&self) -> &[u8] {
        self.0.as_ref()
    }

    /// URL-safe base64 without padding; the ratchet store's map key.
    pub fn encode(&self) -> String {
        URL_SAFE_NO_PAD.encode(self.0)
    }
}

impl From<[u8; INUMBER_SIZE]> for INumber {
    fn from(bytes: [u8; INUMBER_SIZE]) -> Self {
        INumber(bytes)
    }
}

impl fmt::Debug for INumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "INumber({})", &self.encode()[..8])
    }
}

impl Serialize for INumber {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_bytes(&self.0)
    }
}

impl<'de> Deserialize<'de> for INumber {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct INumberVisitor;

        impl<'de> Visitor<'de> for INumberVisitor {
            type Value = INumber;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{} bytes", INUMBER_SIZE)
            }

            fn visit_bytes<E: de::Error>(self, v: &[u8]) -> Result<INumber, E> {
                let buff: [u8; INUMBER_SIZE] = v
                    .try_into()
                    .map_err(|_| E::invalid_length(v.len(), &self))?;
                Ok(INumber(buff))
            }

            fn visit_byte_buf<E: de::Error>(self, v: Vec<u8>) -> Result<INumber, E> {
                self.visit_bytes(&v)
            }
        }

        deserializer.deserialize_bytes(INumberVisitor)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_generate_is_unique() {
        assert_ne!(INumber::generate(), INumber::generate());
    }

    #[test]
    fn test_encode_length() {
        // 32 bytes -> 43 base64url chars, no padding
        assert_eq!(INumber::generate().encode().len(), 43);
    }
}
