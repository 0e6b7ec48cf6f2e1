//! Proof-of-misbehavior adjudication.
//!
//! A consumer that contests the revealed keys submits a [`DisputeBundle`]
//! showing that a chunk the provider signed decrypts, under the revealed key,
//! to something other than the chunk committed in the content root.
//! [`adjudicate`] is pure: it reads the session context and the bundle and
//! returns a [`Verdict`]; the controller applies the consequences.

use crate::crypto::hash::Packed;
use crate::crypto::keytree::apply_keystream;
use crate::crypto::merkle::{chunk_hash, verify_proof, MerkleNode, SIBLING_LEFT, SIBLING_RIGHT};
use crate::crypto::signature::sign_digest;
use crate::crypto::tree::{chunk_index, is_child_of};
use crate::crypto::vpke::{ErkEntry, RevealedKey, VpkeProof};
use crate::crypto::ProofBackend;
use crate::error::{Error, Result};
use crate::types::{Address, CurvePoint, Hash};
use k256::ecdsa::SigningKey;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Evidence submitted with a proof of misbehavior.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisputeBundle {
    /// Key-tree descent from a revealed node to the disputed leaf, both
    /// inclusive.
    pub steps: Vec<u64>,
    /// Encrypted chunk as delivered, in 32-byte words.
    pub chunk_ciphertext: Vec<Hash>,
    /// Provider's signature over the encrypted chunk.
    pub provider_signature: Vec<u8>,
    /// Hash of the chunk as committed in the content root.
    pub claimed_hash: Hash,
    /// Inclusion proof of `claimed_hash`.
    pub merkle_proof: Vec<MerkleNode>,
    /// Revealed entries the claim relies on.
    pub submitted_erk: Vec<ErkEntry>,
    /// Their decryptions.
    pub submitted_rk: Vec<RevealedKey>,
    /// Decryption proofs, one per entry.
    pub vpke_proofs: Vec<VpkeProof>,
}

/// Outcome of adjudication.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Verdict {
    /// The provider signed a chunk that decrypts to the wrong content.
    ProviderAtFault {
        /// Disputed chunk.
        chunk: u64,
    },
    /// The evidence does not establish provider fault.
    ClaimRejected,
}

/// Session facts the adjudicator checks a bundle against.
#[derive(Debug, Clone, Copy)]
pub struct DisputeContext<'a> {
    /// Content root.
    pub root_m: &'a Hash,
    /// Chunk count.
    pub n: u64,
    /// First requested chunk.
    pub a: u64,
    /// Last acknowledged chunk.
    pub ctr: u64,
    /// Provider under dispute.
    pub provider: &'a Address,
    /// Consumer's key-reveal public key.
    pub encryption_key: &'a CurvePoint,
    /// Entries the provider actually revealed.
    pub revealed: &'a [ErkEntry],
}

/// Digest the provider signs over each encrypted chunk it hands out.
#[must_use]
pub fn provider_chunk_digest(root_m: &Hash, i: u64, words: &[Hash]) -> Hash {
    words
        .iter()
        .fold(Packed::new().bytes32(root_m).uint(i), |packed, word| {
            packed.bytes32(word)
        })
        .digest()
}

/// Provider-side helper: sign an encrypted chunk.
///
/// # Errors
///
/// Returns [`Error::BadSignature`] if signing fails.
pub fn sign_chunk(key: &SigningKey, root_m: &Hash, i: u64, words: &[Hash]) -> Result<Vec<u8>> {
    sign_digest(key, &provider_chunk_digest(root_m, i, words))
}

fn malformed(reason: impl Into<String>) -> Error {
    let reason = reason.into();
    warn!("Rejected malformed dispute bundle: {reason}");
    Error::ProofInvalid(reason)
}

/// Check that a bundle is well formed; returns the disputed chunk index and
/// the revealed key the descent starts from.
fn check_shape<'b>(
    ctx: &DisputeContext<'_>,
    bundle: &'b DisputeBundle,
    backend: &dyn ProofBackend,
) -> Result<(u64, &'b RevealedKey)> {
    if bundle.steps.is_empty()
        || bundle.chunk_ciphertext.is_empty()
        || bundle.submitted_erk.is_empty()
        || (bundle.merkle_proof.is_empty() && ctx.n > 1)
    {
        return Err(malformed("empty evidence list"));
    }
    let count = bundle.submitted_erk.len();
    if bundle.submitted_rk.len() != count || bundle.vpke_proofs.len() != count {
        return Err(malformed(format!(
            "misaligned evidence: {count} erk, {} rk, {} proofs",
            bundle.submitted_rk.len(),
            bundle.vpke_proofs.len()
        )));
    }

    for ((erk, rk), proof) in bundle
        .submitted_erk
        .iter()
        .zip(&bundle.submitted_rk)
        .zip(&bundle.vpke_proofs)
    {
        if rk.position != erk.position || proof.position != erk.position {
            return Err(malformed(format!(
                "positions disagree at erk position {}",
                erk.position
            )));
        }
        if !ctx.revealed.contains(erk) {
            return Err(malformed(format!(
                "erk at position {} was never revealed",
                erk.position
            )));
        }
        let points = erk
            .c1
            .iter()
            .chain(&erk.c2)
            .chain(&rk.halves)
            .chain(std::iter::once(&proof.a))
            .chain(&proof.b);
        if points.into_iter().any(|p| !backend.is_on_curve(p)) {
            return Err(malformed(format!(
                "point off curve at position {}",
                erk.position
            )));
        }
    }
    if !backend.is_on_curve(ctx.encryption_key) {
        return Err(malformed("session encryption key is not a curve point"));
    }

    if bundle
        .merkle_proof
        .iter()
        .any(|node| node.pos_iden != SIBLING_LEFT && node.pos_iden != SIBLING_RIGHT)
    {
        return Err(malformed("merkle side tag is not 0 or 1"));
    }

    let start = bundle.steps[0];
    let rk = bundle
        .submitted_rk
        .iter()
        .find(|rk| rk.position == start)
        .ok_or_else(|| malformed(format!("descent starts at unrevealed position {start}")))?;
    if bundle
        .steps
        .windows(2)
        .any(|pair| !is_child_of(pair[1], pair[0]))
    {
        return Err(malformed("descent is not a parent to child path"));
    }

    let leaf = bundle.steps[bundle.steps.len() - 1];
    let chunk = chunk_index(ctx.n, leaf)
        .ok_or_else(|| malformed(format!("descent ends at non-leaf position {leaf}")))?;
    if chunk < ctx.a || chunk > ctx.ctr {
        return Err(malformed(format!(
            "chunk {chunk} outside delivered range {}..={}",
            ctx.a, ctx.ctr
        )));
    }
    Ok((chunk, rk))
}

/// Judge a proof of misbehavior.
///
/// # Errors
///
/// Returns [`Error::ProofInvalid`] for a malformed bundle; a well-formed
/// bundle always yields a [`Verdict`].
pub fn adjudicate(
    ctx: &DisputeContext<'_>,
    bundle: &DisputeBundle,
    backend: &dyn ProofBackend,
) -> Result<Verdict> {
    let (chunk, start) = check_shape(ctx, bundle, backend)?;

    let digest = provider_chunk_digest(ctx.root_m, chunk, &bundle.chunk_ciphertext);
    match backend.recover_signer(&digest, &bundle.provider_signature) {
        Ok(signer) if signer == *ctx.provider => {}
        Ok(signer) => {
            debug!("Chunk {chunk} signed by {signer}, not provider {}", ctx.provider);
            return Ok(Verdict::ClaimRejected);
        }
        Err(e) => {
            debug!("Chunk {chunk} signature unusable: {e}");
            return Ok(Verdict::ClaimRejected);
        }
    }

    let proofs_hold = bundle
        .submitted_erk
        .iter()
        .zip(&bundle.submitted_rk)
        .zip(&bundle.vpke_proofs)
        .all(|((erk, rk), proof)| backend.verify_vpke(ctx.encryption_key, erk, rk, proof));
    if !proofs_hold {
        debug!("Decryption proof failed for chunk {chunk}");
        return Ok(Verdict::ClaimRejected);
    }

    if !verify_proof(ctx.root_m, ctx.n, chunk, &bundle.claimed_hash, &bundle.merkle_proof) {
        debug!("Claimed hash for chunk {chunk} is not in the content root");
        return Ok(Verdict::ClaimRejected);
    }

    let Some(key) = backend.derive_leaf_key(&start.halves, &bundle.steps) else {
        return Ok(Verdict::ClaimRejected);
    };
    let plaintext = apply_keystream(&key, &bundle.chunk_ciphertext);
    if chunk_hash(&plaintext) == bundle.claimed_hash {
        debug!("Chunk {chunk} decrypts to the committed content");
        return Ok(Verdict::ClaimRejected);
    }

    warn!("Provider {} at fault for chunk {chunk}", ctx.provider);
    Ok(Verdict::ProviderAtFault { chunk })
}
