//! Optimal provider selection.
//!
//! Providers serving the requested content are ranked by credibility, then
//! by price, then by address, after dropping any whose price is above the
//! consumer's offer.

use crate::error::{Error, Result};
use crate::registry::{ContentRegistry, ProviderRegistry};
use crate::types::{Address, Amount, Hash};
use std::cmp::Reverse;

/// A ranked provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProviderOffer {
    /// Provider address.
    pub provider: Address,
    /// Credibility at ranking time.
    pub cred: u64,
    /// Advertised per-chunk consumer price.
    pub payment_pc: Amount,
}

/// Eligible offers, best first.
#[must_use]
pub fn rank(offers: &[ProviderOffer], max_price: Amount) -> Vec<ProviderOffer> {
    let mut eligible: Vec<ProviderOffer> = offers
        .iter()
        .filter(|offer| offer.payment_pc <= max_price)
        .copied()
        .collect();
    eligible.sort_by_key(|offer| (Reverse(offer.cred), offer.payment_pc, offer.provider));
    eligible
}

/// Pick the best provider registered for `root`.
///
/// # Errors
///
/// Returns [`Error::NoEligibleProvider`] if no registered provider prices at
/// or below `max_price`.
pub fn select_provider(
    content: &dyn ContentRegistry,
    providers: &dyn ProviderRegistry,
    root: &Hash,
    max_price: Amount,
) -> Result<ProviderOffer> {
    let offers: Vec<ProviderOffer> = content
        .providers_by_content_hash(root)
        .into_iter()
        .filter_map(|provider| {
            providers.info(&provider).map(|info| ProviderOffer {
                provider,
                cred: info.cred,
                payment_pc: info.payment_pc,
            })
        })
        .collect();
    rank(&offers, max_price)
        .into_iter()
        .next()
        .ok_or(Error::NoEligibleProvider)
}
