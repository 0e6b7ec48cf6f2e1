//! Session event system.

use crate::market::{Outcome, Round, Verdict};
use crate::types::{Address, Amount, CurvePoint};
use tokio::sync::broadcast;

/// Default broadcast buffer size.
pub const DEFAULT_EVENT_CAPACITY: usize = 256;

/// Events emitted by the session controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// The session moved between rounds.
    RoundChanged {
        /// Previous round.
        from: Round,
        /// New round.
        to: Round,
    },

    /// Delivery was settled from the bond.
    PaymentSettled {
        /// Deliverer paid.
        deliverer: Address,
        /// Amount paid to the deliverer.
        deliverer_payment: Amount,
        /// Bond owner refunded.
        provider: Address,
        /// Amount refunded to the bond owner.
        provider_refund: Amount,
        /// Chunks acknowledged.
        omega: u64,
    },

    /// Encrypted key material for one tree position.
    KeyRevealed {
        /// Tree position.
        position: u64,
        /// Ephemeral components.
        c1: [CurvePoint; 2],
        /// Masked halves.
        c2: [CurvePoint; 2],
    },

    /// The consumer contested the revealed keys.
    DisputeFiled {
        /// Consumer that filed.
        consumer: Address,
        /// Deadline for proof of misbehavior.
        timeout_pom: u64,
    },

    /// A dispute was settled.
    DisputeResolved {
        /// Verdict reached.
        verdict: Verdict,
        /// Session outcome.
        outcome: Outcome,
    },

    /// Value left escrow.
    FundsReleased {
        /// Recipient.
        to: Address,
        /// Amount.
        amount: Amount,
    },

    /// The session returned to idle.
    SessionReset,
}

/// Channel for receiving session events.
pub type SessionEventsChannel = broadcast::Receiver<SessionEvent>;

/// Sender for session events.
pub type SessionEventsSender = broadcast::Sender<SessionEvent>;

/// Create a new event channel pair.
#[must_use]
pub fn create_event_channel(capacity: usize) -> (SessionEventsSender, SessionEventsChannel) {
    broadcast::channel(capacity.max(1))
}
