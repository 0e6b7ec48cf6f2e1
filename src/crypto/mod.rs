//! Cryptographic primitives for delivery proofs, key reveal and disputes.
//!
//! The session controller never touches curve arithmetic directly. It asks a
//! [`ProofBackend`] to recover signers, check curve membership and verify
//! decryption proofs, so an alternative curve construction can be swapped in
//! without changing settlement logic. [`Secp256k1Backend`] is the default.
//!
//! The remaining modules are the party-side tooling: building Merkle trees,
//! deriving and encrypting content keys, signing receipts.

pub mod content;
pub mod curve;
pub mod hash;
pub mod keytree;
pub mod merkle;
pub mod signature;
pub mod tree;
pub mod vpke;

pub use content::ContentPackage;
pub use curve::SecretKey;
pub use hash::{keccak256, Packed};
pub use keytree::{KeyHalves, KeyTree};
pub use merkle::{MerkleNode, MerkleTree};
pub use vpke::{ErkEntry, RevealedKey, VpkeProof};

use crate::error::Result;
use crate::types::{Address, CurvePoint, Hash};

/// Proof capabilities the dispute resolver and delivery verifier rely on.
pub trait ProofBackend: Send + Sync {
    /// Recover the address that signed `digest` (personal-message convention).
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::BadSignature`] for malformed or unrecoverable
    /// signatures.
    fn recover_signer(&self, digest: &Hash, signature: &[u8]) -> Result<Address>;

    /// Whether a point lies on the curve.
    fn is_on_curve(&self, point: &CurvePoint) -> bool;

    /// Whether `proof` shows `rk` is the decryption of `erk` under `key`.
    fn verify_vpke(
        &self,
        key: &CurvePoint,
        erk: &ErkEntry,
        rk: &RevealedKey,
        proof: &VpkeProof,
    ) -> bool;

    /// Symmetric key of the leaf reached by walking `path` from `start`.
    ///
    /// Returns `None` if `path` is not a parent→child chain.
    fn derive_leaf_key(&self, start: &[CurvePoint; 2], path: &[u64]) -> Option<Hash>;
}

/// secp256k1 + keccak-256 backend.
#[derive(Debug, Clone, Copy, Default)]
pub struct Secp256k1Backend;

impl ProofBackend for Secp256k1Backend {
    fn recover_signer(&self, digest: &Hash, signature: &[u8]) -> Result<Address> {
        signature::recover_signer(digest, signature)
    }

    fn is_on_curve(&self, point: &CurvePoint) -> bool {
        curve::is_on_curve(point)
    }

    fn verify_vpke(
        &self,
        key: &CurvePoint,
        erk: &ErkEntry,
        rk: &RevealedKey,
        proof: &VpkeProof,
    ) -> bool {
        vpke::verify(key, erk, rk, proof)
    }

    fn derive_leaf_key(&self, start: &[CurvePoint; 2], path: &[u64]) -> Option<Hash> {
        keytree::descend(start, path).map(|halves| keytree::symmetric_key(&halves))
    }
}
