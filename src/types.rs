//! Primitive types shared by every component.

use serde::{Deserialize, Serialize};
use std::fmt;

/// 32-byte content-addressed digest (keccak-256).
pub type Hash = [u8; 32];

/// All-zero digest, the value of unset hash fields.
pub const ZERO_HASH: Hash = [0u8; 32];

/// Monetary amount in the smallest native value unit.
pub type Amount = u128;

/// Unix time in seconds.
pub type Timestamp = u64;

/// 20-byte party address: the last 20 bytes of keccak(uncompressed public key).
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct Address(pub [u8; 20]);

impl Address {
    /// The zero address, the value of unset address fields.
    pub const ZERO: Self = Self([0u8; 20]);

    /// Build an address from a byte slice.
    ///
    /// Returns `None` unless the slice is exactly 20 bytes long.
    #[must_use]
    pub fn from_slice(bytes: &[u8]) -> Option<Self> {
        <[u8; 20]>::try_from(bytes).ok().map(Self)
    }

    /// Raw address bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    /// Whether this is the zero address.
    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 20]
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

/// Affine curve point carried as raw big-endian coordinates.
///
/// Points arrive from callers unvalidated; the proof backend checks curve
/// membership before any arithmetic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CurvePoint {
    /// X coordinate.
    pub x: [u8; 32],
    /// Y coordinate.
    pub y: [u8; 32],
}

impl CurvePoint {
    /// Build a point from its coordinates.
    #[must_use]
    pub fn new(x: [u8; 32], y: [u8; 32]) -> Self {
        Self { x, y }
    }

    /// Canonical 64-byte encoding `x ‖ y`.
    #[must_use]
    pub fn to_bytes(&self) -> [u8; 64] {
        let mut out = [0u8; 64];
        out[..32].copy_from_slice(&self.x);
        out[32..].copy_from_slice(&self.y);
        out
    }
}
