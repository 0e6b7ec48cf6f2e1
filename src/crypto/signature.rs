//! Recoverable secp256k1 signatures over packed protocol messages.
//!
//! Parties sign `keccak(prefix ‖ keccak(packed message))`, the personal-message
//! convention, and the authority recovers the signer address from the 65-byte
//! `r ‖ s ‖ v` signature instead of storing public keys.

use crate::crypto::hash::{keccak256, personal_message_hash};
use crate::error::{Error, Result};
use crate::types::{Address, Hash};
use k256::ecdsa::{RecoveryId, Signature, SigningKey, VerifyingKey};
use tracing::debug;

/// Recoverable signature size in bytes (`r ‖ s ‖ v`).
pub const SIGNATURE_SIZE: usize = 65;

/// Offset added to the recovery id in the trailing `v` byte.
const RECOVERY_OFFSET: u8 = 27;

/// Address of a public key: last 20 bytes of keccak(uncompressed key without prefix).
#[must_use]
pub fn address_of(key: &VerifyingKey) -> Address {
    let encoded = key.to_encoded_point(false);
    let hash = keccak256(&encoded.as_bytes()[1..]);
    let mut address = [0u8; 20];
    address.copy_from_slice(&hash[12..]);
    Address(address)
}

/// Recover the signer of a message digest.
///
/// # Errors
///
/// Returns [`Error::BadSignature`] if:
/// - The signature has the wrong size
/// - The recovery byte is not 0, 1, 27 or 28
/// - The `r ‖ s` encoding is invalid
/// - Public key recovery fails
pub fn recover_signer(digest: &Hash, signature: &[u8]) -> Result<Address> {
    if signature.len() != SIGNATURE_SIZE {
        return Err(Error::BadSignature(format!(
            "invalid signature size: expected {SIGNATURE_SIZE}, got {}",
            signature.len()
        )));
    }

    let v = signature[64];
    let recovery_byte = match v {
        0 | 27 => 0,
        1 | 28 => 1,
        _ => {
            return Err(Error::BadSignature(format!("invalid recovery byte: {v}")));
        }
    };
    let recovery_id = RecoveryId::from_byte(recovery_byte)
        .ok_or_else(|| Error::BadSignature(format!("invalid recovery byte: {v}")))?;

    let sig = Signature::from_slice(&signature[..64])
        .map_err(|e| Error::BadSignature(format!("invalid signature format: {e}")))?;

    let prehash = personal_message_hash(digest);
    let key = VerifyingKey::recover_from_prehash(&prehash, &sig, recovery_id)
        .map_err(|e| Error::BadSignature(format!("public key recovery failed: {e}")))?;

    Ok(address_of(&key))
}

/// Verify that `signature` over `digest` was produced by `expected`.
///
/// # Errors
///
/// Returns [`Error::BadSignature`] if recovery fails or recovers a different
/// address.
pub fn verify_signer(digest: &Hash, signature: &[u8], expected: &Address) -> Result<()> {
    let recovered = recover_signer(digest, signature)?;
    if recovered == *expected {
        debug!("Signature by {} verified", expected);
        Ok(())
    } else {
        Err(Error::BadSignature(format!(
            "signer mismatch: expected {expected}, recovered {recovered}"
        )))
    }
}

/// Sign a message digest with a party key, producing a 65-byte signature.
///
/// # Errors
///
/// Returns [`Error::BadSignature`] if the signing primitive fails.
pub fn sign_digest(key: &SigningKey, digest: &Hash) -> Result<Vec<u8>> {
    let prehash = personal_message_hash(digest);
    let (sig, recovery_id) = key
        .sign_prehash_recoverable(&prehash)
        .map_err(|e| Error::BadSignature(format!("signing failed: {e}")))?;

    let mut out = Vec::with_capacity(SIGNATURE_SIZE);
    out.extend_from_slice(&sig.to_bytes());
    out.push(RECOVERY_OFFSET + recovery_id.to_byte());
    Ok(out)
}

/// Deterministic signing key from a 32-byte secret.
///
/// # Errors
///
/// Returns [`Error::InvalidArgument`] if the secret is zero or not below the
/// curve order.
pub fn signing_key_from_secret(secret: &Hash) -> Result<SigningKey> {
    SigningKey::from_slice(secret)
        .map_err(|e| Error::InvalidArgument(format!("invalid secret key: {e}")))
}
