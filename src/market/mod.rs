//! The content-delivery session: bidding, provider selection, delivery
//! settlement, key reveal and dispute resolution.
//!
//! [`SessionController`] owns the single active [`Session`] and is the only
//! thing that moves it between [`Round`]s. The submodules hold the pure
//! pieces it composes: bid tables, provider ranking, receipt digests, the
//! reveal plan and proof adjudication.

pub mod bidding;
pub mod controller;
pub mod delivery;
pub mod dispute;
pub mod ops;
pub mod reveal;
mod session;

pub use bidding::{CandidateDeliverer, SelectedDeliverer};
pub use controller::{Registries, SessionController};
pub use delivery::ChunkReceipt;
pub use dispute::{DisputeBundle, Verdict};
pub use reveal::reveal_plan;
pub use session::{Outcome, Session, StartParams};

use serde::{Deserialize, Serialize};
use std::fmt;

/// Session state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Round {
    /// No session.
    #[default]
    Idle,
    /// Deliverers may join and bid.
    Joining,
    /// Bidding closed; deliverers confirm they hold the content.
    Ready,
    /// A consumer paid and a provider was chosen.
    Initiated,
    /// Deliverers were shortlisted.
    Selected,
    /// The consumer accepted the first chunk.
    FirstChunkVerified,
    /// Delivery finished; awaiting the receipt.
    Delivered,
    /// Payment settled; awaiting key material.
    Revealing,
    /// Keys revealed; dispute window open.
    Revealed,
    /// The consumer contested the keys.
    Disputed,
    /// A dispute was settled.
    Resolved,
    /// The session closed without dispute.
    Finalized,
}

impl Round {
    /// Whether `reset` may run from this round.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Resolved | Self::Finalized)
    }
}

impl fmt::Display for Round {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}
