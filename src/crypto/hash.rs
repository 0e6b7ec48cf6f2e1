//! Keccak-256 hashing and the packed message encoding used by signed receipts.

use crate::types::{Address, CurvePoint, Hash};
use sha3::{Digest, Keccak256};

/// Prefix applied before signing a 32-byte digest (EIP-191 personal message).
const PERSONAL_MESSAGE_PREFIX: &[u8] = b"\x19Ethereum Signed Message:\n32";

/// Keccak-256 of arbitrary bytes.
#[must_use]
pub fn keccak256(data: &[u8]) -> Hash {
    let mut hasher = Keccak256::new();
    hasher.update(data);
    let result = hasher.finalize();
    let mut hash = [0u8; 32];
    hash.copy_from_slice(&result);
    hash
}

/// Digest actually signed for a message digest: `keccak(prefix ‖ digest)`.
#[must_use]
pub fn personal_message_hash(digest: &Hash) -> Hash {
    let mut buf = Vec::with_capacity(PERSONAL_MESSAGE_PREFIX.len() + 32);
    buf.extend_from_slice(PERSONAL_MESSAGE_PREFIX);
    buf.extend_from_slice(digest);
    keccak256(&buf)
}

/// Packed big-endian message builder.
///
/// Integers occupy 32 bytes, addresses 20, strings their raw UTF-8 bytes.
/// Field order is fixed by each message type, so no length prefixes are
/// needed.
#[derive(Debug, Default, Clone)]
pub struct Packed {
    buf: Vec<u8>,
}

impl Packed {
    /// Start an empty message.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an unsigned integer as a 256-bit big-endian word.
    #[must_use]
    pub fn uint(mut self, value: u64) -> Self {
        self.buf.extend_from_slice(&[0u8; 24]);
        self.buf.extend_from_slice(&value.to_be_bytes());
        self
    }

    /// Append a 32-byte word.
    #[must_use]
    pub fn bytes32(mut self, word: &Hash) -> Self {
        self.buf.extend_from_slice(word);
        self
    }

    /// Append a 20-byte address.
    #[must_use]
    pub fn address(mut self, address: &Address) -> Self {
        self.buf.extend_from_slice(address.as_bytes());
        self
    }

    /// Append raw string bytes.
    #[must_use]
    pub fn string(mut self, s: &str) -> Self {
        self.buf.extend_from_slice(s.as_bytes());
        self
    }

    /// Append a curve point as `x ‖ y`.
    #[must_use]
    pub fn point(mut self, point: &CurvePoint) -> Self {
        self.buf.extend_from_slice(&point.to_bytes());
        self
    }

    /// Encoded bytes so far.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    /// Keccak-256 of the encoded message.
    #[must_use]
    pub fn digest(&self) -> Hash {
        keccak256(&self.buf)
    }
}
