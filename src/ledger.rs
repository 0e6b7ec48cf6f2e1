//! Escrow ledger.
//!
//! Balances are value held by the session on behalf of a party. Value enters
//! through [`Ledger::deposit`] and leaves through releases, which pay a party
//! out of escrow. Multi-party movements are described as a [`Settlement`] and
//! applied all-or-nothing, so the ledger conserves value:
//! `Σ balances + total_released == total_deposited`.

use crate::error::{Error, Result};
use crate::types::{Address, Amount};
use std::collections::BTreeMap;
use tracing::debug;

/// A set of balance movements applied atomically.
///
/// Debits take value out of balances; credits move it into other balances
/// and releases pay it out. The debited total must equal credits plus
/// releases.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Settlement {
    /// Balance decrements.
    pub debits: Vec<(Address, Amount)>,
    /// Balance increments funded by the debits.
    pub credits: Vec<(Address, Amount)>,
    /// Payouts funded by the debits.
    pub releases: Vec<(Address, Amount)>,
}

impl Settlement {
    /// Empty plan.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a debit.
    #[must_use]
    pub fn debit(mut self, party: Address, amount: Amount) -> Self {
        self.debits.push((party, amount));
        self
    }

    /// Add a credit.
    #[must_use]
    pub fn credit(mut self, party: Address, amount: Amount) -> Self {
        self.credits.push((party, amount));
        self
    }

    /// Add a release.
    #[must_use]
    pub fn release(mut self, party: Address, amount: Amount) -> Self {
        self.releases.push((party, amount));
        self
    }
}

/// Per-party escrow balances with running totals.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Ledger {
    balances: BTreeMap<Address, Amount>,
    paid_out: BTreeMap<Address, Amount>,
    total_deposited: Amount,
    total_released: Amount,
}

impl Ledger {
    /// Empty ledger.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Escrowed balance of `party`.
    #[must_use]
    pub fn balance(&self, party: &Address) -> Amount {
        self.balances.get(party).copied().unwrap_or(0)
    }

    /// Total value released to `party` so far.
    #[must_use]
    pub fn paid_out(&self, party: &Address) -> Amount {
        self.paid_out.get(party).copied().unwrap_or(0)
    }

    /// Sum of all balances.
    #[must_use]
    pub fn total_held(&self) -> Amount {
        self.balances.values().sum()
    }

    /// Value ever deposited.
    #[must_use]
    pub fn total_deposited(&self) -> Amount {
        self.total_deposited
    }

    /// Value ever released.
    #[must_use]
    pub fn total_released(&self) -> Amount {
        self.total_released
    }

    /// Non-zero balances in address order.
    #[must_use]
    pub fn balances(&self) -> Vec<(Address, Amount)> {
        self.balances
            .iter()
            .filter(|(_, amount)| **amount > 0)
            .map(|(party, amount)| (*party, *amount))
            .collect()
    }

    /// Add value to `party`'s balance.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Overflow`] if a balance or the deposit total would
    /// overflow.
    pub fn deposit(&mut self, party: Address, amount: Amount) -> Result<()> {
        let balance = self.balance(&party).checked_add(amount).ok_or(Error::Overflow)?;
        let total = self
            .total_deposited
            .checked_add(amount)
            .ok_or(Error::Overflow)?;
        self.balances.insert(party, balance);
        self.total_deposited = total;
        debug!("Deposited {amount} for {party}");
        Ok(())
    }

    /// Pay `amount` out of `party`'s own balance.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InsufficientFunds`] if the balance is short.
    pub fn withdraw(&mut self, party: Address, amount: Amount) -> Result<()> {
        self.apply(&Settlement::new().debit(party, amount).release(party, amount))
    }

    /// Release every remaining balance to its holder.
    ///
    /// Returns the releases made, in address order.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Overflow`] if the release total would overflow.
    pub fn release_all(&mut self) -> Result<Vec<(Address, Amount)>> {
        let remaining = self.balances();
        let plan = remaining
            .iter()
            .fold(Settlement::new(), |plan, (party, amount)| {
                plan.debit(*party, *amount).release(*party, *amount)
            });
        self.apply(&plan)?;
        Ok(remaining)
    }

    /// Validate and apply a settlement.
    ///
    /// Nothing is mutated unless every debit is covered and all arithmetic
    /// succeeds.
    ///
    /// # Errors
    ///
    /// - [`Error::InsufficientFunds`] if a party's debits exceed its balance
    /// - [`Error::InvalidArgument`] if debits do not equal credits plus releases
    /// - [`Error::Overflow`] on arithmetic overflow
    pub fn apply(&mut self, plan: &Settlement) -> Result<()> {
        let mut balances = self.balances.clone();
        let mut paid_out = self.paid_out.clone();

        let mut debited: Amount = 0;
        for (party, amount) in &plan.debits {
            let available = balances.get(party).copied().unwrap_or(0);
            let remaining = available
                .checked_sub(*amount)
                .ok_or(Error::InsufficientFunds {
                    party: *party,
                    required: *amount,
                    available,
                })?;
            balances.insert(*party, remaining);
            debited = debited.checked_add(*amount).ok_or(Error::Overflow)?;
        }

        let mut funded: Amount = 0;
        for (party, amount) in &plan.credits {
            let entry = balances.entry(*party).or_insert(0);
            *entry = entry.checked_add(*amount).ok_or(Error::Overflow)?;
            funded = funded.checked_add(*amount).ok_or(Error::Overflow)?;
        }

        let mut released: Amount = 0;
        for (party, amount) in &plan.releases {
            let entry = paid_out.entry(*party).or_insert(0);
            *entry = entry.checked_add(*amount).ok_or(Error::Overflow)?;
            released = released.checked_add(*amount).ok_or(Error::Overflow)?;
        }
        funded = funded.checked_add(released).ok_or(Error::Overflow)?;

        if debited != funded {
            return Err(Error::InvalidArgument(format!(
                "unbalanced settlement: debits {debited}, credits and releases {funded}"
            )));
        }
        let total_released = self
            .total_released
            .checked_add(released)
            .ok_or(Error::Overflow)?;

        balances.retain(|_, amount| *amount > 0);
        self.balances = balances;
        self.paid_out = paid_out;
        self.total_released = total_released;
        debug!(
            "Applied settlement: debited {debited}, released {released}, {} entries held",
            self.balances.len()
        );
        Ok(())
    }
}
