//! Verifiably decryptable key-reveal ciphertexts.
//!
//! Each revealed tree node carries two ElGamal ciphertexts, one per key half,
//! encrypted to the consumer's reveal key. The consumer can later prove what
//! the ciphertexts decrypt to with a Chaum–Pedersen proof of equal discrete
//! logs across `G` and both `c1` components, without disclosing its secret.

use crate::crypto::curve::{
    decode_point, encode_point, hash_to_scalar, scalar_from_bytes, scalar_to_bytes, SecretKey,
};
use crate::crypto::hash::Packed;
use crate::types::CurvePoint;
use k256::{ProjectivePoint, Scalar};
use serde::{Deserialize, Serialize};

/// Encrypted key material for one tree position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErkEntry {
    /// Tree position.
    pub position: u64,
    /// Ephemeral components `r_j · G`.
    pub c1: [CurvePoint; 2],
    /// Masked halves `M_j + r_j · PK`.
    pub c2: [CurvePoint; 2],
}

/// Decrypted key material for one tree position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevealedKey {
    /// Tree position.
    pub position: u64,
    /// Key halves `M_0`, `M_1`.
    pub halves: [CurvePoint; 2],
}

/// Proof that a [`RevealedKey`] is the decryption of an [`ErkEntry`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VpkeProof {
    /// Tree position the proof speaks for.
    pub position: u64,
    /// Commitment `t · G`.
    pub a: CurvePoint,
    /// Commitments `t · c1_j`.
    pub b: [CurvePoint; 2],
    /// Response `t + e · sk`.
    pub z: [u8; 32],
}

/// Encrypt node key halves to `recipient`.
///
/// Nonces are derived from `nonce_seed` and the position, so the provider can
/// regenerate a reveal deterministically. Returns `None` if `recipient` or a
/// half is not a curve point.
#[must_use]
pub fn encrypt(
    recipient: &CurvePoint,
    position: u64,
    halves: &[CurvePoint; 2],
    nonce_seed: &[u8],
) -> Option<ErkEntry> {
    let pk = decode_point(recipient)?;
    let mut c1 = [CurvePoint::default(); 2];
    let mut c2 = [CurvePoint::default(); 2];
    for j in 0..2 {
        let m = decode_point(&halves[j])?;
        let nonce_input = Packed::new()
            .string("erk-nonce")
            .uint(position)
            .uint(j as u64);
        let mut seeded = nonce_seed.to_vec();
        seeded.extend_from_slice(nonce_input.as_bytes());
        let r = hash_to_scalar(&seeded);
        c1[j] = encode_point(&(ProjectivePoint::GENERATOR * r));
        c2[j] = encode_point(&(m + pk * r));
    }
    Some(ErkEntry { position, c1, c2 })
}

/// Decrypt an entry with the recipient's secret.
#[must_use]
pub fn decrypt(secret: &SecretKey, erk: &ErkEntry) -> Option<RevealedKey> {
    let mut halves = [CurvePoint::default(); 2];
    for j in 0..2 {
        let c1 = decode_point(&erk.c1[j])?;
        let c2 = decode_point(&erk.c2[j])?;
        halves[j] = encode_point(&(c2 - c1 * secret.scalar()));
    }
    Some(RevealedKey {
        position: erk.position,
        halves,
    })
}

/// Prove that `rk` is the decryption of `erk` under `secret`.
#[must_use]
pub fn prove(secret: &SecretKey, erk: &ErkEntry, rk: &RevealedKey) -> Option<VpkeProof> {
    let sk = secret.scalar();
    let public = secret.public_point();

    let mut nonce_input = scalar_to_bytes(sk).to_vec();
    nonce_input.extend_from_slice(transcript(&public, erk, rk).as_bytes());
    let t = hash_to_scalar(&nonce_input);

    let a = encode_point(&(ProjectivePoint::GENERATOR * t));
    let mut b = [CurvePoint::default(); 2];
    for j in 0..2 {
        b[j] = encode_point(&(decode_point(&erk.c1[j])? * t));
    }

    let e = challenge(&public, erk, rk, &a, &b);
    let z = t + e * sk;
    Some(VpkeProof {
        position: erk.position,
        a,
        b,
        z: scalar_to_bytes(&z),
    })
}

/// Check a decryption proof against the reveal key it was made for.
#[must_use]
pub fn verify(key: &CurvePoint, erk: &ErkEntry, rk: &RevealedKey, proof: &VpkeProof) -> bool {
    if erk.position != rk.position || erk.position != proof.position {
        return false;
    }
    let Some(pk) = decode_point(key) else {
        return false;
    };
    let Some(a) = decode_point(&proof.a) else {
        return false;
    };
    let Some(z) = scalar_from_bytes(&proof.z) else {
        return false;
    };
    let e = challenge(key, erk, rk, &proof.a, &proof.b);

    if ProjectivePoint::GENERATOR * z != a + pk * e {
        return false;
    }

    for j in 0..2 {
        let (Some(c1), Some(c2), Some(m), Some(b)) = (
            decode_point(&erk.c1[j]),
            decode_point(&erk.c2[j]),
            decode_point(&rk.halves[j]),
            decode_point(&proof.b[j]),
        ) else {
            return false;
        };
        if c1 * z != b + (c2 - m) * e {
            return false;
        }
    }
    true
}

fn transcript(key: &CurvePoint, erk: &ErkEntry, rk: &RevealedKey) -> Packed {
    let mut packed = Packed::new().string("vpke").point(key).uint(erk.position);
    for j in 0..2 {
        packed = packed
            .point(&erk.c1[j])
            .point(&erk.c2[j])
            .point(&rk.halves[j]);
    }
    packed
}

fn challenge(
    key: &CurvePoint,
    erk: &ErkEntry,
    rk: &RevealedKey,
    a: &CurvePoint,
    b: &[CurvePoint; 2],
) -> Scalar {
    let packed = transcript(key, erk, rk).point(a).point(&b[0]).point(&b[1]);
    hash_to_scalar(packed.as_bytes())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::crypto::curve::mul_base;

    fn halves() -> [CurvePoint; 2] {
        [
            mul_base(&hash_to_scalar(b"half-0")),
            mul_base(&hash_to_scalar(b"half-1")),
        ]
    }

    #[test]
    fn test_decrypt_recovers_halves() {
        let consumer = SecretKey::from_seed(b"consumer").unwrap();
        let erk = encrypt(&consumer.public_point(), 3, &halves(), b"nonce").unwrap();
        let rk = decrypt(&consumer, &erk).unwrap();
        assert_eq!(rk.position, 3);
        assert_eq!(rk.halves, halves());
    }

    #[test]
    fn test_valid_proof_verifies() {
        let consumer = SecretKey::from_seed(b"consumer").unwrap();
        let erk = encrypt(&consumer.public_point(), 5, &halves(), b"nonce").unwrap();
        let rk = decrypt(&consumer, &erk).unwrap();
        let proof = prove(&consumer, &erk, &rk).unwrap();
        assert!(verify(&consumer.public_point(), &erk, &rk, &proof));
    }

    #[test]
    fn test_proof_for_wrong_plaintext_fails() {
        let consumer = SecretKey::from_seed(b"consumer").unwrap();
        let erk = encrypt(&consumer.public_point(), 5, &halves(), b"nonce").unwrap();
        let mut rk = decrypt(&consumer, &erk).unwrap();
        rk.halves[1] = mul_base(&hash_to_scalar(b"forged"));
        let proof = prove(&consumer, &erk, &rk).unwrap();
        assert!(!verify(&consumer.public_point(), &erk, &rk, &proof));
    }

    #[test]
    fn test_proof_under_other_key_fails() {
        let consumer = SecretKey::from_seed(b"consumer").unwrap();
        let other = SecretKey::from_seed(b"other").unwrap();
        let erk = encrypt(&consumer.public_point(), 1, &halves(), b"nonce").unwrap();
        let rk = decrypt(&consumer, &erk).unwrap();
        let proof = prove(&consumer, &erk, &rk).unwrap();
        assert!(!verify(&other.public_point(), &erk, &rk, &proof));
    }

    #[test]
    fn test_position_mismatch_fails() {
        let consumer = SecretKey::from_seed(b"consumer").unwrap();
        let erk = encrypt(&consumer.public_point(), 1, &halves(), b"nonce").unwrap();
        let rk = decrypt(&consumer, &erk).unwrap();
        let mut proof = prove(&consumer, &erk, &rk).unwrap();
        proof.position = 2;
        assert!(!verify(&consumer.public_point(), &erk, &rk, &proof));
    }
}
