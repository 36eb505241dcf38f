//! Per-revision content encryption using ChaCha20-Poly1305
//!
//! Every node revision is sealed under its own [`Key`], derived from the
//! node's ratchet. Compromising one revision's key exposes that revision
//! and later ones of the same node, never siblings and never the past.

use std::fmt;
use std::ops::Deref;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chacha20poly1305::Key as AeadKey;
use chacha20poly1305::{
    aead::{Aead, KeyInit},
    ChaCha20Poly1305, Nonce,
};
use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use zeroize::Zeroize;

/// Size of a ChaCha20-Poly1305 key in bytes (256 bits)
pub const KEY_SIZE: usize = 32;
/// Size of a ChaCha20-Poly1305 nonce in bytes
pub const NONCE_SIZE: usize = 12;

#[derive(Debug, thiserror::Error)]
pub enum CryptoError {
    #[error("crypto error: {0}")]
    Default(#[from] anyhow::Error),
    /// AEAD verification failed: wrong key or tampered ciphertext.
    #[error("ciphertext did not verify under the supplied key")]
    KeyMismatch,
    #[error("invalid key encoding")]
    InvalidKey,
}

/// A 256-bit symmetric key.
///
/// Always ratchet-derived except for externally supplied root keys. Sealed
/// output is `nonce (12 bytes) || ciphertext || tag (16 bytes)`; a fresh
/// random nonce is drawn per seal. Key bytes are wiped on drop.
#[derive(Clone, PartialEq, Eq)]
pub struct Key([u8; KEY_SIZE]);

impl Key {
    /// Generate a new random key using a cryptographically secure RNG
    pub fn generate() -> Self {
        let mut buff = [0; KEY_SIZE];
        getrandom::getrandom(&mut buff).expect("failed to generate random bytes");
        Self(buff)
    }

    pub fn from_slice(data: &[u8]) -> Result<Self, CryptoError> {
        if data.len() != KEY_SIZE {
            return Err(CryptoError::InvalidKey);
        }
        let mut buff = [0; KEY_SIZE];
        buff.copy_from_slice(data);
        Ok(Key(buff))
    }

    pub fn bytes(&self) -> &[u8] {
        self.0.as_ref()
    }

    /// URL-safe base64 without padding, for debug output and external
    /// handles.
    pub fn encode(&self) -> String {
        URL_SAFE_NO_PAD.encode(self.0)
    }

    pub fn decode(s: &str) -> Result<Self, CryptoError> {
        let data = URL_SAFE_NO_PAD.decode(s).map_err(|_| CryptoError::InvalidKey)?;
        Key::from_slice(&data)
    }

    /// Seal plaintext: `nonce || ct || tag`.
    pub fn seal(&self, plaintext: &[u8]) -> Result<Vec<u8>, CryptoError> {
        let cipher = ChaCha20Poly1305::new(AeadKey::from_slice(self.bytes()));

        let mut nonce_bytes = [0u8; NONCE_SIZE];
        getrandom::getrandom(&mut nonce_bytes)
            .map_err(|e| anyhow::anyhow!("failed to generate nonce: {}", e))?;
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = cipher
            .encrypt(nonce, plaintext)
            .map_err(|_| anyhow::anyhow!("seal error"))?;

        let mut out = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
        out.extend_from_slice(nonce.as_ref());
        out.extend_from_slice(ciphertext.as_ref());
        Ok(out)
    }

    /// Open `nonce || ct || tag`. [`CryptoError::KeyMismatch`] on
    /// verification failure.
    pub fn open(&self, data: &[u8]) -> Result<Vec<u8>, CryptoError> {
        if data.len() < NONCE_SIZE {
            return Err(anyhow::anyhow!("ciphertext too short for nonce").into());
        }

        let cipher = ChaCha20Poly1305::new(AeadKey::from_slice(self.bytes()));
        let nonce = Nonce::from_slice(&data[..NONCE_SIZE]);
        cipher
            .decrypt(nonce, &data[NONCE_SIZE..])
            .map_err(|_| CryptoError::KeyMismatch)
    }
}

impl Deref for Key {
    type Target = [u8; KEY_SIZE];
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl From<[u8; KEY_SIZE]> for Key {
    fn from(bytes: [u8; KEY_SIZE]) -> Self {
        Key(bytes)
    }
}

impl Drop for Key {
    fn drop(&mut self) {
        self.0.zeroize();
    }
}

// key material stays out of logs
impl fmt::Debug for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Key(..)")
    }
}

impl Serialize for Key {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_bytes(&self.0)
    }
}

impl<'de> Deserialize<'de> for Key {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct KeyVisitor;

        impl<'de> Visitor<'de> for KeyVisitor {
            type Value = Key;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{} bytes of key material", KEY_SIZE)
            }

            fn visit_bytes<E: de::Error>(self, v: &[u8]) -> Result<Key, E> {
                Key::from_slice(v).map_err(|_| E::invalid_length(v.len(), &self))
            }

            fn visit_byte_buf<E: de::Error>(self, v: Vec<u8>) -> Result<Key, E> {
                self.visit_bytes(&v)
            }
        }

        deserializer.deserialize_bytes(KeyVisitor)
    }
}
