//! Hierarchical content keys.
//!
//! The provider holds one master secret per content item. Every tree position
//! has a pair of key halves (curve points); children are derived from their
//! parent's halves, so revealing an interior node hands over every leaf key
//! below it and nothing else. A leaf's halves hash to the symmetric key that
//! encrypts its chunk.

use crate::crypto::curve::{hash_to_scalar, mul_base};
use crate::crypto::hash::{keccak256, Packed};
use crate::crypto::tree::{is_child_of, last_position, leaf_position, path_from_root};
use crate::types::{CurvePoint, Hash};

/// Key halves for one tree position.
pub type KeyHalves = [CurvePoint; 2];

/// Derive a child's halves from its parent's.
#[must_use]
pub fn derive_child(parent: &KeyHalves, child_position: u64) -> KeyHalves {
    let seed = Packed::new()
        .point(&parent[0])
        .point(&parent[1])
        .uint(child_position)
        .digest();
    [half_from_seed(&seed, 0), half_from_seed(&seed, 1)]
}

/// Walk `path` downward from the halves of `path[0]`.
///
/// Returns `None` unless each step is a child of the one before it.
#[must_use]
pub fn descend(start: &KeyHalves, path: &[u64]) -> Option<KeyHalves> {
    let mut halves = *start;
    for pair in path.windows(2) {
        if !is_child_of(pair[1], pair[0]) {
            return None;
        }
        halves = derive_child(&halves, pair[1]);
    }
    Some(halves)
}

/// Symmetric chunk key of a leaf.
#[must_use]
pub fn symmetric_key(halves: &KeyHalves) -> Hash {
    Packed::new().point(&halves[0]).point(&halves[1]).digest()
}

/// XOR each 32-byte word with the keystream `keccak(key ‖ j)`.
///
/// Encryption and decryption are the same operation.
#[must_use]
pub fn apply_keystream(key: &Hash, words: &[Hash]) -> Vec<Hash> {
    words
        .iter()
        .enumerate()
        .map(|(j, word)| {
            let pad = Packed::new().bytes32(key).uint(j as u64).digest();
            let mut out = *word;
            for (o, p) in out.iter_mut().zip(pad.iter()) {
                *o ^= p;
            }
            out
        })
        .collect()
}

fn half_from_seed(seed: &Hash, j: u64) -> CurvePoint {
    mul_base(&hash_to_scalar(&Packed::new().bytes32(seed).uint(j).digest()))
}

/// Provider-side key tree over `n` chunks.
#[derive(Clone)]
pub struct KeyTree {
    n: u64,
    root: KeyHalves,
}

impl KeyTree {
    /// Build the tree from a master secret.
    #[must_use]
    pub fn new(master: &[u8], n: u64) -> Self {
        let mut seed_input = master.to_vec();
        seed_input.extend_from_slice(b"root");
        let seed = keccak256(&seed_input);
        Self {
            n,
            root: [half_from_seed(&seed, 0), half_from_seed(&seed, 1)],
        }
    }

    /// Chunk count.
    #[must_use]
    pub fn len(&self) -> u64 {
        self.n
    }

    /// Whether the tree covers no chunks.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.n == 0
    }

    /// Halves of the node at `position`.
    ///
    /// Returns `None` for positions outside the tree.
    #[must_use]
    pub fn node_key(&self, position: u64) -> Option<KeyHalves> {
        if position > last_position(self.n)? {
            return None;
        }
        descend(&self.root, &path_from_root(position))
    }

    /// Symmetric key of 1-based chunk `index`.
    #[must_use]
    pub fn leaf_key(&self, index: u64) -> Option<Hash> {
        let position = leaf_position(self.n, index)?;
        self.node_key(position).map(|halves| symmetric_key(&halves))
    }

    /// Encrypt the plaintext words of chunk `index`.
    #[must_use]
    pub fn encrypt_chunk(&self, index: u64, words: &[Hash]) -> Option<Vec<Hash>> {
        self.leaf_key(index).map(|key| apply_keystream(&key, words))
    }
}

impl std::fmt::Debug for KeyTree {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyTree")
            .field("n", &self.n)
            .finish_non_exhaustive()
    }
}
