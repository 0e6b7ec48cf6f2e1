//! End-to-end session tests.
//!
//! Every test drives a real [`p2pcdn_escrow::EscrowAuthority`] with real
//! secp256k1 parties and a manual clock, the way a deployment would drive it,
//! only without a network in between.
//!
//! ## Test Coverage
//!
//! - Full honest session and settlement amounts
//! - Receipt signature rejection
//! - Dispute window timeout and finalization
//! - Proof of misbehavior (provider at fault, claim rejected, malformed)
//! - Provider selection across competing providers
//! - Reset round-trip

mod harness;

mod disputes;
mod selection;
mod session_flow;

pub use harness::{Party, SessionHarness};
