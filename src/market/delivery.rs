//! First-chunk commitments, consumer receipts and delivery settlement.
//!
//! Message layouts (packed, big-endian, 32-byte integers):
//!
//! ```text
//! first chunk: sid ‖ start_chunk ‖ m1
//! receipt:     sid ‖ "receipt" ‖ i ‖ deliverer ‖ consumer
//! ```

use crate::crypto::hash::Packed;
use crate::crypto::signature::sign_digest;
use crate::error::{Error, Result};
use crate::ledger::Settlement;
use crate::types::{Address, Amount, Hash, Timestamp};
use k256::ecdsa::SigningKey;
use serde::{Deserialize, Serialize};

/// A deliverer's first-chunk upload, keyed by session id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkReceipt {
    /// First chunk index.
    pub start_chunk: u64,
    /// Hash of the first chunk.
    pub m1: Hash,
    /// Deliverer's signature over the first-chunk message.
    pub signature: Vec<u8>,
    /// Uploading deliverer.
    pub deliverer: Address,
    /// Whether the consumer accepted it.
    pub verified: bool,
    /// When the consumer accepted it.
    pub start_time: Timestamp,
}

/// Digest a deliverer signs when uploading the first chunk.
#[must_use]
pub fn first_chunk_digest(sid: u64, start_chunk: u64, m1: &Hash) -> Hash {
    Packed::new().uint(sid).uint(start_chunk).bytes32(m1).digest()
}

/// Digest a consumer signs to acknowledge chunks up to `i`.
#[must_use]
pub fn receipt_digest(sid: u64, i: u64, deliverer: &Address, consumer: &Address) -> Hash {
    Packed::new()
        .uint(sid)
        .string("receipt")
        .uint(i)
        .address(deliverer)
        .address(consumer)
        .digest()
}

/// Deliverer-side helper: sign a first-chunk upload.
///
/// # Errors
///
/// Returns [`Error::BadSignature`] if signing fails.
pub fn sign_first_chunk(key: &SigningKey, sid: u64, start_chunk: u64, m1: &Hash) -> Result<Vec<u8>> {
    sign_digest(key, &first_chunk_digest(sid, start_chunk, m1))
}

/// Consumer-side helper: sign a receipt.
///
/// # Errors
///
/// Returns [`Error::BadSignature`] if signing fails.
pub fn sign_receipt(
    key: &SigningKey,
    sid: u64,
    i: u64,
    deliverer: &Address,
    consumer: &Address,
) -> Result<Vec<u8>> {
    sign_digest(key, &receipt_digest(sid, i, deliverer, consumer))
}

/// Split of the delivery bond after a receipt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliverySplit {
    /// Chunks acknowledged.
    pub omega: u64,
    /// Paid to the deliverer.
    pub deliverer_payment: Amount,
    /// Returned to the bond owner.
    pub provider_refund: Amount,
    /// Ledger movements.
    pub plan: Settlement,
}

/// Split the `n × payment_pd` bond for a receipt acknowledging `a..=i`.
///
/// # Errors
///
/// - [`Error::InvalidArgument`] unless `a ≤ i ≤ n`
/// - [`Error::Overflow`] on arithmetic overflow
pub fn split_bond(
    owner: Address,
    deliverer: Address,
    n: u64,
    a: u64,
    i: u64,
    payment_pd: Amount,
) -> Result<DeliverySplit> {
    if a == 0 || i < a || i > n {
        return Err(Error::InvalidArgument(format!(
            "receipt index {i} outside {a}..={n}"
        )));
    }
    let omega = i - a + 1;
    let bond = Amount::from(n)
        .checked_mul(payment_pd)
        .ok_or(Error::Overflow)?;
    let deliverer_payment = Amount::from(omega)
        .checked_mul(payment_pd)
        .ok_or(Error::Overflow)?;
    let provider_refund = bond - deliverer_payment;

    let mut plan = Settlement::new()
        .debit(owner, bond)
        .release(deliverer, deliverer_payment);
    if provider_refund > 0 {
        plan = plan.release(owner, provider_refund);
    }
    Ok(DeliverySplit {
        omega,
        deliverer_payment,
        provider_refund,
        plan,
    })
}
