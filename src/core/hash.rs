//! Fixed-width hash primitives shared by every layer of the ledger.
//!
//! Every hash in this crate is a 32-byte SHA-256 digest. Row 0 of any
//! ledger is abstract and its hash is the all-zero [`SENTINEL`].

use sha2::{Digest, Sha256};
use std::fmt;

/// A fixed 32-byte opaque hash value.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Hash(pub [u8; 32]);

/// The all-zero hash. Stands in for the hash of row 0, which has no
/// physical representation.
pub const SENTINEL: Hash = Hash([0u8; 32]);

impl Hash {
    pub const LEN: usize = 32;

    pub fn from_slice(bytes: &[u8]) -> Option<Self> {
        if bytes.len() != Self::LEN {
            return None;
        }
        let mut buf = [0u8; 32];
        buf.copy_from_slice(bytes);
        Some(Hash(buf))
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn is_sentinel(&self) -> bool {
        self.0 == [0u8; 32]
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Debug for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Hash({}…)", &self.to_hex()[..8])
    }
}

impl fmt::Display for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl AsRef<[u8]> for Hash {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl From<[u8; 32]> for Hash {
    fn from(bytes: [u8; 32]) -> Self {
        Hash(bytes)
    }
}

/// SHA-256 of an arbitrary byte slice.
pub fn sha256(data: &[u8]) -> Hash {
    let mut hasher = Sha256::new();
    hasher.update(data);
    Hash(hasher.finalize().into())
}

/// SHA-256 over the concatenation of several byte slices, computed without
/// materializing the concatenation.
pub fn sha256_concat(parts: &[&[u8]]) -> Hash {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update(part);
    }
    Hash(hasher.finalize().into())
}

/// Row-hash combinator: `SHA256(input_hash || levels_root)`.
pub fn combine_row_hash(input_hash: &Hash, levels_root: &Hash) -> Hash {
    sha256_concat(&[input_hash.as_ref(), levels_root.as_ref()])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sentinel_is_all_zero() {
        assert!(SENTINEL.is_sentinel());
        assert_eq!(SENTINEL.as_bytes(), &[0u8; 32]);
    }

    #[test]
    fn sha256_matches_known_vector() {
        // SHA256("") = e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855
        let h = sha256(b"");
        assert_eq!(
            h.to_hex(),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn from_slice_rejects_wrong_length() {
        assert!(Hash::from_slice(&[0u8; 31]).is_none());
        assert!(Hash::from_slice(&[0u8; 33]).is_none());
        assert!(Hash::from_slice(&[0u8; 32]).is_some());
    }
}
