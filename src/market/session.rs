use crate::market::Round;
use crate::types::{Address, Amount, CurvePoint, Hash, Timestamp, ZERO_HASH};
use serde::{Deserialize, Serialize};

/// Arguments to `start`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StartParams {
    /// Content root.
    pub root_m: Hash,
    /// Chunk count.
    pub n: u64,
    /// Per-chunk price paid to deliverers.
    pub payment_pd: Amount,
    /// Per-chunk price asked of consumers.
    pub payment_pc: Amount,
}

/// How a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Outcome {
    /// Not yet decided.
    #[default]
    Pending,
    /// The provider was paid for delivered chunks.
    Sold,
    /// The provider was found at fault.
    NotSold,
}

/// The single active delivery session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    /// Content root.
    pub root_m: Hash,
    /// Chunk count.
    pub n: u64,
    /// Per-chunk deliverer price.
    pub payment_pd: Amount,
    /// Per-chunk consumer price of the chosen provider.
    pub payment_pc: Amount,
    /// Consumer's per-chunk offer.
    pub payment_cp: Amount,
    /// Current round.
    pub round: Round,
    /// Address that started the session and posted the delivery bond.
    pub owner: Address,
    /// Provider serving this consumer.
    pub provider: Address,
    /// Paying consumer.
    pub consumer: Address,
    /// Consumer's key-reveal public key.
    pub encryption_key: CurvePoint,
    /// Content registered and open to consumers.
    pub listed: bool,
    /// First requested chunk (1-based).
    pub a: u64,
    /// Last acknowledged chunk.
    pub ctr: u64,
    /// Chunks acknowledged (`ctr - a + 1`).
    pub delivered_chunks: u64,
    /// Deliverer paid at settlement.
    pub settled_deliverer: Address,
    /// When delivery was settled.
    pub settled_at: Timestamp,
    /// End of the dispute window.
    pub timeout_dispute: Timestamp,
    /// End of the proof-of-misbehavior window.
    pub timeout_pom: Timestamp,
    /// Result once decided.
    pub outcome: Outcome,
}

impl Default for Session {
    fn default() -> Self {
        Self {
            root_m: ZERO_HASH,
            n: 0,
            payment_pd: 0,
            payment_pc: 0,
            payment_cp: 0,
            round: Round::Idle,
            owner: Address::ZERO,
            provider: Address::ZERO,
            consumer: Address::ZERO,
            encryption_key: CurvePoint::default(),
            listed: false,
            a: 0,
            ctr: 0,
            delivered_chunks: 0,
            settled_deliverer: Address::ZERO,
            settled_at: 0,
            timeout_dispute: 0,
            timeout_pom: 0,
            outcome: Outcome::Pending,
        }
    }
}

impl Session {
    /// Chunks the consumer paid for: `n - a + 1`.
    #[must_use]
    pub fn requested_chunks(&self) -> u64 {
        (self.n + 1).saturating_sub(self.a)
    }
}
