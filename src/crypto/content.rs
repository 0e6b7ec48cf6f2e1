//! Provider-side content packaging.
//!
//! Bundles the plaintext chunks with the Merkle tree over their hashes and the
//! key tree that encrypts them, which is everything a provider needs to list
//! content, serve encrypted chunks and reveal keys.

use crate::crypto::keytree::KeyTree;
use crate::crypto::merkle::{chunk_hash, MerkleNode, MerkleTree};
use crate::types::Hash;

/// Chunks plus their commitment and key trees.
#[derive(Debug, Clone)]
pub struct ContentPackage {
    chunks: Vec<Vec<Hash>>,
    merkle: MerkleTree,
    keys: KeyTree,
}

impl ContentPackage {
    /// Package chunks (each a list of 32-byte words) under `master`.
    ///
    /// Returns `None` for an empty chunk list.
    #[must_use]
    pub fn new(master: &[u8], chunks: Vec<Vec<Hash>>) -> Option<Self> {
        let leaves: Vec<Hash> = chunks.iter().map(|c| chunk_hash(c)).collect();
        let merkle = MerkleTree::build(&leaves)?;
        let keys = KeyTree::new(master, merkle.len());
        Some(Self {
            chunks,
            merkle,
            keys,
        })
    }

    /// Content root (`root_m`).
    #[must_use]
    pub fn root(&self) -> Hash {
        self.merkle.root()
    }

    /// Chunk count.
    #[must_use]
    pub fn len(&self) -> u64 {
        self.merkle.len()
    }

    /// Whether the package has no chunks (never true once built).
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Plaintext words of 1-based chunk `index`.
    #[must_use]
    pub fn chunk(&self, index: u64) -> Option<&[Hash]> {
        let slot = usize::try_from(index.checked_sub(1)?).ok()?;
        self.chunks.get(slot).map(Vec::as_slice)
    }

    /// Committed hash of chunk `index`.
    #[must_use]
    pub fn chunk_hash(&self, index: u64) -> Option<Hash> {
        self.chunk(index).map(chunk_hash)
    }

    /// Encrypted words of chunk `index`.
    #[must_use]
    pub fn encrypted_chunk(&self, index: u64) -> Option<Vec<Hash>> {
        self.keys.encrypt_chunk(index, self.chunk(index)?)
    }

    /// Inclusion proof for chunk `index`.
    #[must_use]
    pub fn merkle_proof(&self, index: u64) -> Option<Vec<MerkleNode>> {
        self.merkle.proof(index)
    }

    /// Key tree encrypting the chunks.
    #[must_use]
    pub fn key_tree(&self) -> &KeyTree {
        &self.keys
    }
}
