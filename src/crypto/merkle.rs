//! Content Merkle tree over chunk hashes.
//!
//! `root_m` is the label of position 0 in a heap-layout tree whose leaves are
//! the keccak hashes of the plaintext chunks. Inclusion proofs list sibling
//! labels from the leaf upward, each tagged with which side the sibling sits.

use crate::crypto::hash::keccak256;
use crate::crypto::tree::{is_left_child, leaf_position, parent, sibling};
use crate::types::{Hash, ZERO_HASH};
use serde::{Deserialize, Serialize};

/// Sibling sits to the left of the running hash.
pub const SIBLING_LEFT: u8 = 0;
/// Sibling sits to the right of the running hash.
pub const SIBLING_RIGHT: u8 = 1;

/// One step of an inclusion proof.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MerkleNode {
    /// Sibling label.
    pub label: Hash,
    /// [`SIBLING_LEFT`] or [`SIBLING_RIGHT`].
    pub pos_iden: u8,
}

/// Label of an internal node.
#[must_use]
pub fn hash_pair(left: &Hash, right: &Hash) -> Hash {
    let mut buf = [0u8; 64];
    buf[..32].copy_from_slice(left);
    buf[32..].copy_from_slice(right);
    keccak256(&buf)
}

/// Hash of a chunk given as 32-byte words.
#[must_use]
pub fn chunk_hash(words: &[Hash]) -> Hash {
    let mut buf = Vec::with_capacity(words.len() * 32);
    for word in words {
        buf.extend_from_slice(word);
    }
    keccak256(&buf)
}

/// Recompute the root from `leaf` at 1-based chunk `index` and compare it to
/// `root`.
///
/// Each step's side tag must agree with the leaf position, so a valid proof
/// for one index never verifies for another.
#[must_use]
pub fn verify_proof(root: &Hash, n: u64, index: u64, leaf: &Hash, proof: &[MerkleNode]) -> bool {
    let Some(mut position) = leaf_position(n, index) else {
        return false;
    };

    let mut current = *leaf;
    for node in proof {
        let Some(up) = parent(position) else {
            return false;
        };
        let sibling_on_right = match node.pos_iden {
            SIBLING_RIGHT => true,
            SIBLING_LEFT => false,
            _ => return false,
        };
        if sibling_on_right != is_left_child(position) {
            return false;
        }
        current = if sibling_on_right {
            hash_pair(&current, &node.label)
        } else {
            hash_pair(&node.label, &current)
        };
        position = up;
    }

    position == 0 && current == *root
}

/// Full tree, built by the provider when it publishes content.
#[derive(Debug, Clone)]
pub struct MerkleTree {
    n: u64,
    labels: Vec<Hash>,
}

impl MerkleTree {
    /// Build the tree over chunk hashes in chunk order.
    ///
    /// Returns `None` for an empty chunk list.
    #[must_use]
    pub fn build(leaves: &[Hash]) -> Option<Self> {
        if leaves.is_empty() {
            return None;
        }
        let n = leaves.len();
        let mut labels = vec![ZERO_HASH; 2 * n - 1];
        labels[n - 1..].copy_from_slice(leaves);
        for p in (0..n - 1).rev() {
            labels[p] = hash_pair(&labels[2 * p + 1], &labels[2 * p + 2]);
        }
        Some(Self {
            n: n as u64,
            labels,
        })
    }

    /// Root label (`root_m`).
    #[must_use]
    pub fn root(&self) -> Hash {
        self.labels[0]
    }

    /// Number of leaves.
    #[must_use]
    pub fn len(&self) -> u64 {
        self.n
    }

    /// Whether the tree has no leaves (never true for a built tree).
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.n == 0
    }

    /// Inclusion proof for 1-based chunk `index`.
    #[must_use]
    pub fn proof(&self, index: u64) -> Option<Vec<MerkleNode>> {
        let mut position = leaf_position(self.n, index)?;
        let mut proof = Vec::new();
        while let Some(sib) = sibling(position) {
            let pos_iden = if is_left_child(position) {
                SIBLING_RIGHT
            } else {
                SIBLING_LEFT
            };
            proof.push(MerkleNode {
                label: self.labels[usize::try_from(sib).ok()?],
                pos_iden,
            });
            position = parent(position)?;
        }
        Some(proof)
    }
}
