//! Reputation and content registries the session reports to.
//!
//! The controller only sees the traits. The in-memory implementations back
//! each trait with a locked map and keep a simple credibility score.

mod content;
mod reputation;

pub use content::InMemoryContentRegistry;
pub use reputation::{
    ConsumerInfo, DelivererInfo, InMemoryConsumerRegistry, InMemoryDelivererRegistry,
    InMemoryProviderRegistry, ProviderInfo, DEFAULT_CRED,
};

use crate::types::{Address, Amount, Hash};

/// Which providers serve a content root.
pub trait ContentRegistry: Send + Sync {
    /// Providers registered for `root`, in registration order.
    fn providers_by_content_hash(&self, root: &Hash) -> Vec<Address>;

    /// Register `provider` for `root`. Registering twice is a no-op.
    fn add_provider_to_content_hash(&self, root: Hash, provider: Address);
}

/// Provider reputation and advertised prices.
pub trait ProviderRegistry: Send + Sync {
    /// Create a record with default reputation if none exists.
    fn initialize(&self, provider: Address);
    /// Advertise per-chunk prices.
    fn set_payment(&self, provider: Address, payment_pd: Amount, payment_pc: Amount);
    /// Current record, if the provider is known.
    fn info(&self, provider: &Address) -> Option<ProviderInfo>;
    /// A new content item was listed.
    fn record_content_type(&self, provider: Address);
    /// A session completed; `deliverers` took part in it.
    fn record_provide(&self, provider: Address, deliverers: u64);
    /// A misbehavior was recorded.
    fn record_misbehave(&self, provider: Address);
    /// A provisional misbehavior was withdrawn.
    fn retract_misbehave(&self, provider: Address);
}

/// Deliverer reputation.
pub trait DelivererRegistry: Send + Sync {
    /// Create a record with default reputation if none exists.
    fn initialize(&self, deliverer: Address);
    /// Current record, if the deliverer is known.
    fn info(&self, deliverer: &Address) -> Option<DelivererInfo>;
    /// A delivery completed.
    fn record_delivery(&self, deliverer: Address, chunks: u64, amount: Amount, elapsed_secs: u64);
}

/// Consumer reputation.
pub trait ConsumerRegistry: Send + Sync {
    /// Create a record with default reputation if none exists.
    fn initialize(&self, consumer: Address);
    /// Current record, if the consumer is known.
    fn info(&self, consumer: &Address) -> Option<ConsumerInfo>;
    /// A download completed.
    fn record_download(&self, consumer: Address);
    /// A misbehavior was recorded.
    fn record_misbehave(&self, consumer: Address);
}
