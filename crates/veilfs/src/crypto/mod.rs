mod inumber;
mod key;

pub use inumber::{INumber, INUMBER_SIZE};
pub use key::{CryptoError, Key, KEY_SIZE, NONCE_SIZE};
