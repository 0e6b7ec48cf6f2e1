//! Error types for the escrow authority.

use crate::market::Round;
use crate::types::{Address, Amount};
use thiserror::Error;

/// Result type alias using the crate's error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by session entry points.
///
/// Every variant is raised before any state is mutated, so a failed call
/// leaves the session, ledger and tables exactly as they were.
#[derive(Debug, Error)]
pub enum Error {
    /// The call is not legal in the current round.
    #[error("{operation} is not allowed in round {round}")]
    InvalidTransition {
        /// Entry point that was called.
        operation: &'static str,
        /// Round the session was in.
        round: Round,
    },

    /// The caller does not hold the role required by the entry point.
    #[error("{caller} is not authorized to call {operation}")]
    Unauthorized {
        /// Entry point that was called.
        operation: &'static str,
        /// Offending caller.
        caller: Address,
    },

    /// Value attached to the call is below what the step requires.
    #[error("insufficient payment: required {required}, provided {provided}")]
    InsufficientPayment {
        /// Exact value required.
        required: Amount,
        /// Value supplied.
        provided: Amount,
    },

    /// A ledger entry cannot cover a withdrawal.
    #[error("insufficient funds for {party}: required {required}, available {available}")]
    InsufficientFunds {
        /// Ledger entry that was short.
        party: Address,
        /// Amount requested.
        required: Amount,
        /// Balance held.
        available: Amount,
    },

    /// A bid exceeds the ceiling it is checked against.
    #[error("bid {bid} exceeds maximum {max}")]
    BidTooHigh {
        /// Offending bid.
        bid: Amount,
        /// Ceiling.
        max: Amount,
    },

    /// Deliverer never confirmed it holds the content.
    #[error("deliverer {0} is not prepared")]
    NotPrepared(Address),

    /// Parallel argument arrays have incompatible lengths.
    #[error("length mismatch: expected {expected}, got {actual}")]
    LengthMismatch {
        /// Expected length.
        expected: usize,
        /// Actual length.
        actual: usize,
    },

    /// Signature does not recover to the expected signer.
    #[error("bad signature: {0}")]
    BadSignature(String),

    /// Proof material is malformed and cannot be adjudicated.
    #[error("proof invalid: {0}")]
    ProofInvalid(String),

    /// OPS found no provider willing to serve at the offered price.
    #[error("no eligible provider for the requested content")]
    NoEligibleProvider,

    /// A timeout fallback was invoked before its deadline.
    #[error("timeout not reached: now {now}, deadline {deadline}")]
    TimeoutNotReached {
        /// Clock reading at call time.
        now: u64,
        /// Deadline in unix seconds.
        deadline: u64,
    },

    /// A deadline-bound action arrived after its deadline.
    #[error("deadline passed: now {now}, deadline {deadline}")]
    DeadlinePassed {
        /// Clock reading at call time.
        now: u64,
        /// Deadline in unix seconds.
        deadline: u64,
    },

    /// No first-chunk receipt was uploaded under the session id.
    #[error("no chunk receipt uploaded for sid {0}")]
    NotUploaded(u64),

    /// A first-chunk receipt already exists under the session id.
    #[error("sid {0} already has a chunk receipt")]
    SessionIdInUse(u64),

    /// Argument outside its admissible range.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Amount arithmetic overflowed.
    #[error("amount overflow")]
    Overflow,

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
