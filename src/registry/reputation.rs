//! In-memory reputation registries.
//!
//! Credibility starts at [`DEFAULT_CRED`], gains one point per completed
//! interaction and loses ten per misbehavior, saturating at both ends. The
//! weighting is a placeholder for whatever scoring a deployment plugs in.

use crate::registry::{ConsumerRegistry, DelivererRegistry, ProviderRegistry};
use crate::types::{Address, Amount};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Starting credibility of a new party.
pub const DEFAULT_CRED: u64 = 100;

const SUCCESS_REWARD: u64 = 1;
const MISBEHAVE_PENALTY: u64 = 10;

/// Provider record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderInfo {
    /// Credibility score.
    pub cred: u64,
    /// Advertised per-chunk deliverer price.
    pub payment_pd: Amount,
    /// Advertised per-chunk consumer price.
    pub payment_pc: Amount,
    /// Content items listed.
    pub content_types: u64,
    /// Sessions completed.
    pub provide_times: u64,
    /// Deliverers involved across all sessions.
    pub involve_del: u64,
    /// Misbehaviors on record.
    pub misbehave_times: u64,
    /// Credibility actually deducted for each misbehavior on record, oldest
    /// first.
    pub penalties: Vec<u64>,
}

impl Default for ProviderInfo {
    fn default() -> Self {
        Self {
            cred: DEFAULT_CRED,
            payment_pd: 0,
            payment_pc: 0,
            content_types: 0,
            provide_times: 0,
            involve_del: 0,
            misbehave_times: 0,
            penalties: Vec::new(),
        }
    }
}

/// Deliverer record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DelivererInfo {
    /// Credibility score.
    pub cred: u64,
    /// Deliveries completed.
    pub deliver_times: u64,
    /// Chunks delivered.
    pub chunks: u64,
    /// Value earned.
    pub earned: Amount,
    /// Seconds spent delivering.
    pub total_secs: u64,
}

impl Default for DelivererInfo {
    fn default() -> Self {
        Self {
            cred: DEFAULT_CRED,
            deliver_times: 0,
            chunks: 0,
            earned: 0,
            total_secs: 0,
        }
    }
}

/// Consumer record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsumerInfo {
    /// Credibility score.
    pub cred: u64,
    /// Downloads completed.
    pub dl_times: u64,
    /// Misbehaviors on record.
    pub misbehave_times: u64,
}

impl Default for ConsumerInfo {
    fn default() -> Self {
        Self {
            cred: DEFAULT_CRED,
            dl_times: 0,
            misbehave_times: 0,
        }
    }
}

type Table<T> = Arc<Mutex<HashMap<Address, T>>>;

fn update<T: Default>(table: &Table<T>, party: Address, f: impl FnOnce(&mut T)) {
    f(table.lock().entry(party).or_default());
}

/// Provider registry backed by a locked map.
#[derive(Debug, Clone, Default)]
pub struct InMemoryProviderRegistry {
    inner: Table<ProviderInfo>,
}

impl InMemoryProviderRegistry {
    /// Empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl ProviderRegistry for InMemoryProviderRegistry {
    fn initialize(&self, provider: Address) {
        update(&self.inner, provider, |_| {});
    }

    fn set_payment(&self, provider: Address, payment_pd: Amount, payment_pc: Amount) {
        update(&self.inner, provider, |info| {
            info.payment_pd = payment_pd;
            info.payment_pc = payment_pc;
        });
        debug!("Provider {provider} advertises pd={payment_pd} pc={payment_pc}");
    }

    fn info(&self, provider: &Address) -> Option<ProviderInfo> {
        self.inner.lock().get(provider).cloned()
    }

    fn record_content_type(&self, provider: Address) {
        update(&self.inner, provider, |info| info.content_types += 1);
    }

    fn record_provide(&self, provider: Address, deliverers: u64) {
        update(&self.inner, provider, |info| {
            info.provide_times += 1;
            info.involve_del = info.involve_del.saturating_add(deliverers);
            info.cred = info.cred.saturating_add(SUCCESS_REWARD);
        });
    }

    fn record_misbehave(&self, provider: Address) {
        update(&self.inner, provider, |info| {
            let penalty = info.cred.min(MISBEHAVE_PENALTY);
            info.misbehave_times += 1;
            info.cred -= penalty;
            info.penalties.push(penalty);
        });
    }

    fn retract_misbehave(&self, provider: Address) {
        update(&self.inner, provider, |info| {
            if let Some(penalty) = info.penalties.pop() {
                info.misbehave_times = info.misbehave_times.saturating_sub(1);
                info.cred = info.cred.saturating_add(penalty);
            }
        });
    }
}

/// Deliverer registry backed by a locked map.
#[derive(Debug, Clone, Default)]
pub struct InMemoryDelivererRegistry {
    inner: Table<DelivererInfo>,
}

impl InMemoryDelivererRegistry {
    /// Empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl DelivererRegistry for InMemoryDelivererRegistry {
    fn initialize(&self, deliverer: Address) {
        update(&self.inner, deliverer, |_| {});
    }

    fn info(&self, deliverer: &Address) -> Option<DelivererInfo> {
        self.inner.lock().get(deliverer).cloned()
    }

    fn record_delivery(&self, deliverer: Address, chunks: u64, amount: Amount, elapsed_secs: u64) {
        update(&self.inner, deliverer, |info| {
            info.deliver_times += 1;
            info.chunks = info.chunks.saturating_add(chunks);
            info.earned = info.earned.saturating_add(amount);
            info.total_secs = info.total_secs.saturating_add(elapsed_secs);
            info.cred = info.cred.saturating_add(SUCCESS_REWARD);
        });
    }
}

/// Consumer registry backed by a locked map.
#[derive(Debug, Clone, Default)]
pub struct InMemoryConsumerRegistry {
    inner: Table<ConsumerInfo>,
}

impl InMemoryConsumerRegistry {
    /// Empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl ConsumerRegistry for InMemoryConsumerRegistry {
    fn initialize(&self, consumer: Address) {
        update(&self.inner, consumer, |_| {});
    }

    fn info(&self, consumer: &Address) -> Option<ConsumerInfo> {
        self.inner.lock().get(consumer).cloned()
    }

    fn record_download(&self, consumer: Address) {
        update(&self.inner, consumer, |info| {
            info.dl_times += 1;
            info.cred = info.cred.saturating_add(SUCCESS_REWARD);
        });
    }

    fn record_misbehave(&self, consumer: Address) {
        update(&self.inner, consumer, |info| {
            info.misbehave_times += 1;
            info.cred = info.cred.saturating_sub(MISBEHAVE_PENALTY);
        });
    }
}
