//! Deliverer bids, readiness and provider shortlisting.

use crate::error::{Error, Result};
use crate::types::{Address, Amount};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::debug;

/// A deliverer that joined the current session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateDeliverer {
    /// Deliverer address.
    pub address: Address,
    /// Declared per-chunk bid.
    pub bid: Amount,
    /// Whether the deliverer confirmed it holds the content.
    pub is_prepared: bool,
    /// Where the deliverer serves the content from.
    pub url: Option<String>,
}

/// A deliverer the provider shortlisted, at the agreed bid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectedDeliverer {
    /// Deliverer address.
    pub address: Address,
    /// Agreed per-chunk bid.
    pub bid: Amount,
}

/// Candidate and shortlist tables for one session.
#[derive(Debug, Clone, Default)]
pub struct BidBook {
    candidates: Vec<CandidateDeliverer>,
    selected: Vec<SelectedDeliverer>,
}

impl BidBook {
    /// Record a bid. A repeat join updates the bid.
    ///
    /// # Errors
    ///
    /// Returns [`Error::BidTooHigh`] if `bid` exceeds `max`.
    pub fn join(&mut self, deliverer: Address, bid: Amount, max: Amount) -> Result<()> {
        if bid > max {
            return Err(Error::BidTooHigh { bid, max });
        }
        match self.candidates.iter_mut().find(|c| c.address == deliverer) {
            Some(existing) => {
                debug!("Deliverer {deliverer} updated bid {} -> {bid}", existing.bid);
                existing.bid = bid;
            }
            None => self.candidates.push(CandidateDeliverer {
                address: deliverer,
                bid,
                is_prepared: false,
                url: None,
            }),
        }
        Ok(())
    }

    /// Mark a candidate prepared. Returns `false` if it already was.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Unauthorized`] if the deliverer never joined.
    pub fn mark_prepared(&mut self, deliverer: Address, url: &str) -> Result<bool> {
        let candidate = self
            .candidates
            .iter_mut()
            .find(|c| c.address == deliverer)
            .ok_or(Error::Unauthorized {
                operation: "deliverers_prepared",
                caller: deliverer,
            })?;
        if candidate.is_prepared {
            return Ok(false);
        }
        candidate.is_prepared = true;
        candidate.url = Some(url.to_string());
        Ok(true)
    }

    /// Check a shortlist without recording it.
    ///
    /// # Errors
    ///
    /// - [`Error::LengthMismatch`] if `addresses` and `bids` differ in length
    /// - [`Error::InvalidArgument`] for an empty or duplicated shortlist
    /// - [`Error::NotPrepared`] for a deliverer that is not prepared
    /// - [`Error::BidTooHigh`] if an agreed bid exceeds the declared one
    pub fn validate_selection(
        &self,
        addresses: &[Address],
        bids: &[Amount],
    ) -> Result<Vec<SelectedDeliverer>> {
        if addresses.len() != bids.len() {
            return Err(Error::LengthMismatch {
                expected: addresses.len(),
                actual: bids.len(),
            });
        }
        if addresses.is_empty() {
            return Err(Error::InvalidArgument("empty deliverer selection".into()));
        }

        let mut seen = HashSet::with_capacity(addresses.len());
        let mut selection = Vec::with_capacity(addresses.len());
        for (address, bid) in addresses.iter().zip(bids) {
            if !seen.insert(*address) {
                return Err(Error::InvalidArgument(format!(
                    "deliverer {address} selected twice"
                )));
            }
            let candidate = self
                .candidates
                .iter()
                .find(|c| c.address == *address && c.is_prepared)
                .ok_or(Error::NotPrepared(*address))?;
            if *bid > candidate.bid {
                return Err(Error::BidTooHigh {
                    bid: *bid,
                    max: candidate.bid,
                });
            }
            selection.push(SelectedDeliverer {
                address: *address,
                bid: *bid,
            });
        }
        Ok(selection)
    }

    /// Record a validated shortlist.
    pub fn commit_selection(&mut self, selection: Vec<SelectedDeliverer>) {
        self.selected = selection;
    }

    /// Whether any candidate is prepared.
    #[must_use]
    pub fn any_prepared(&self) -> bool {
        self.candidates.iter().any(|c| c.is_prepared)
    }

    /// Whether `address` is on the shortlist.
    #[must_use]
    pub fn is_selected(&self, address: &Address) -> bool {
        self.selected.iter().any(|s| s.address == *address)
    }

    /// Candidates in join order.
    #[must_use]
    pub fn candidates(&self) -> Vec<CandidateDeliverer> {
        self.candidates.clone()
    }

    /// Prepared candidates in join order.
    #[must_use]
    pub fn prepared(&self) -> Vec<CandidateDeliverer> {
        self.candidates
            .iter()
            .filter(|c| c.is_prepared)
            .cloned()
            .collect()
    }

    /// Shortlist in selection order.
    #[must_use]
    pub fn selected(&self) -> Vec<SelectedDeliverer> {
        self.selected.clone()
    }

    /// Drop every table.
    pub fn clear(&mut self) {
        self.candidates.clear();
        self.selected.clear();
    }
}
