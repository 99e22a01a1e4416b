//! In-memory ledgers.
//!
//! [`MultiTokenBook`] is the exchange's share ledger and doubles as an
//! in-process asset ledger; [`CurrencyBook`] is its fungible counterpart.
//! Both keep every balance behind a single lock so batch transfers apply
//! atomically.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{PoisonError, RwLock};

use hydra_amm::domain::Amount;
use hydra_amm::math::CheckedArithmetic;
use serde::Deserialize;

use super::{CurrencyLedger, MultiTokenLedger};
use crate::domain::{AccountId, AssetId};
use crate::error::ExchangeError;

fn insufficient(
    holder: &AccountId,
    what: impl std::fmt::Display,
    has: Amount,
    needs: Amount,
) -> ExchangeError {
    ExchangeError::InsufficientBalance(format!("{holder} holds {has} {what}, needs {needs}"))
}

/// In-memory fungible currency ledger.
#[derive(Debug, Default)]
pub struct CurrencyBook {
    balances: RwLock<BTreeMap<AccountId, Amount>>,
}

impl CurrencyBook {
    /// Creates an empty book.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Credits `amount` to `to` out of thin air.
    ///
    /// # Errors
    ///
    /// Returns [`ExchangeError::Arithmetic`] if the balance overflows.
    pub fn mint(&self, to: &AccountId, amount: Amount) -> Result<(), ExchangeError> {
        let mut balances = self
            .balances
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let balance = balances.entry(to.clone()).or_default();
        *balance = balance.safe_add(&amount)?;
        Ok(())
    }

    /// Sum of every balance.
    #[cfg(test)]
    pub(crate) fn total(&self) -> u128 {
        self.balances
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .fold(0u128, |acc, b| acc.saturating_add(b.get()))
    }
}

impl CurrencyLedger for CurrencyBook {
    fn balance_of(&self, holder: &AccountId) -> Amount {
        self.balances
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(holder)
            .copied()
            .unwrap_or_default()
    }

    fn transfer(
        &self,
        from: &AccountId,
        to: &AccountId,
        amount: Amount,
    ) -> Result<(), ExchangeError> {
        let mut balances = self
            .balances
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let has = balances.get(from).copied().unwrap_or_default();
        if has < amount {
            return Err(insufficient(from, "currency", has, amount));
        }
        if from == to {
            return Ok(());
        }
        let credited = balances
            .get(to)
            .copied()
            .unwrap_or_default()
            .safe_add(&amount)?;
        balances.insert(from.clone(), has.safe_sub(&amount)?);
        balances.insert(to.clone(), credited);
        Ok(())
    }
}

#[derive(Debug, Default)]
struct Book {
    balances: BTreeMap<AssetId, BTreeMap<AccountId, Amount>>,
    supply: BTreeMap<AssetId, Amount>,
}

impl Book {
    fn balance(&self, holder: &AccountId, id: AssetId) -> Amount {
        self.balances
            .get(&id)
            .and_then(|holders| holders.get(holder))
            .copied()
            .unwrap_or_default()
    }

    fn set(&mut self, holder: &AccountId, id: AssetId, amount: Amount) {
        let holders = self.balances.entry(id).or_default();
        if amount.is_zero() {
            holders.remove(holder);
        } else {
            holders.insert(holder.clone(), amount);
        }
    }

    fn check_debits(
        &self,
        from: &AccountId,
        entries: &[(AssetId, Amount)],
    ) -> Result<(), ExchangeError> {
        let mut needed: BTreeMap<AssetId, Amount> = BTreeMap::new();
        for &(id, amount) in entries {
            let total = needed.entry(id).or_default();
            *total = total.safe_add(&amount)?;
        }
        for (id, needs) in needed {
            let has = self.balance(from, id);
            if has < needs {
                return Err(insufficient(from, format!("of id {id}"), has, needs));
            }
        }
        Ok(())
    }

    fn move_units(
        &mut self,
        from: &AccountId,
        to: &AccountId,
        id: AssetId,
        amount: Amount,
    ) -> Result<(), ExchangeError> {
        if from == to {
            return Ok(());
        }
        let debited = self.balance(from, id).safe_sub(&amount)?;
        let credited = self.balance(to, id).safe_add(&amount)?;
        self.set(from, id, debited);
        self.set(to, id, credited);
        Ok(())
    }
}

/// In-memory multi-id ledger.
#[derive(Debug, Default)]
pub struct MultiTokenBook {
    book: RwLock<Book>,
}

impl MultiTokenBook {
    /// Creates an empty book.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Every non-zero holder of `id` with their balance, in account order.
    #[cfg(test)]
    pub(crate) fn holders(&self, id: AssetId) -> Vec<(AccountId, Amount)> {
        self.book
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .balances
            .get(&id)
            .map(|holders| holders.iter().map(|(h, a)| (h.clone(), *a)).collect())
            .unwrap_or_default()
    }
}

impl MultiTokenLedger for MultiTokenBook {
    fn balance_of(&self, holder: &AccountId, id: AssetId) -> Amount {
        self.book
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .balance(holder, id)
    }

    fn total_supply(&self, id: AssetId) -> Amount {
        self.book
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .supply
            .get(&id)
            .copied()
            .unwrap_or_default()
    }

    fn transfer(
        &self,
        from: &AccountId,
        to: &AccountId,
        id: AssetId,
        amount: Amount,
    ) -> Result<(), ExchangeError> {
        self.batch_transfer(from, to, &[(id, amount)])
    }

    fn batch_transfer(
        &self,
        from: &AccountId,
        to: &AccountId,
        entries: &[(AssetId, Amount)],
    ) -> Result<(), ExchangeError> {
        let mut book = self.book.write().unwrap_or_else(PoisonError::into_inner);
        book.check_debits(from, entries)?;
        for &(id, amount) in entries {
            book.move_units(from, to, id, amount)?;
        }
        Ok(())
    }

    fn mint(&self, to: &AccountId, id: AssetId, amount: Amount) -> Result<(), ExchangeError> {
        let mut book = self.book.write().unwrap_or_else(PoisonError::into_inner);
        let supply = book
            .supply
            .get(&id)
            .copied()
            .unwrap_or_default()
            .safe_add(&amount)?;
        let balance = book.balance(to, id).safe_add(&amount)?;
        book.supply.insert(id, supply);
        book.set(to, id, balance);
        Ok(())
    }

    fn burn(&self, from: &AccountId, id: AssetId, amount: Amount) -> Result<(), ExchangeError> {
        let mut book = self.book.write().unwrap_or_else(PoisonError::into_inner);
        book.check_debits(from, &[(id, amount)])?;
        let supply = book
            .supply
            .get(&id)
            .copied()
            .unwrap_or_default()
            .safe_sub(&amount)?;
        let balance = book.balance(from, id).safe_sub(&amount)?;
        if supply.is_zero() {
            book.supply.remove(&id);
        } else {
            book.supply.insert(id, supply);
        }
        book.set(from, id, balance);
        Ok(())
    }
}

/// Initial balances loaded into the in-memory ledgers at startup.
///
/// ```json
/// {
///   "currency": { "alice": "1000000" },
///   "assets": { "alice": { "1": "500", "2": "500" } }
/// }
/// ```
#[derive(Debug, Default, Deserialize)]
pub struct Genesis {
    /// Currency balances keyed by account.
    #[serde(default)]
    pub currency: BTreeMap<AccountId, String>,
    /// Asset balances keyed by account, then by asset id.
    #[serde(default)]
    pub assets: BTreeMap<AccountId, BTreeMap<u64, String>>,
}

impl Genesis {
    /// Reads a genesis file.
    ///
    /// # Errors
    ///
    /// Returns [`ExchangeError::InvalidRequest`] if the file cannot be read
    /// or parsed.
    pub fn from_file(path: &Path) -> Result<Self, ExchangeError> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            ExchangeError::InvalidRequest(format!("cannot read {}: {e}", path.display()))
        })?;
        serde_json::from_str(&raw).map_err(|e| {
            ExchangeError::InvalidRequest(format!("invalid genesis {}: {e}", path.display()))
        })
    }

    /// Mints every listed balance into the given books.
    ///
    /// # Errors
    ///
    /// Returns [`ExchangeError::InvalidRequest`] for an amount that is not
    /// a decimal `u128`, or [`ExchangeError::Arithmetic`] on overflow.
    pub fn apply(
        &self,
        currency: &CurrencyBook,
        assets: &MultiTokenBook,
    ) -> Result<(), ExchangeError> {
        for (holder, amount) in &self.currency {
            currency.mint(holder, parse_amount(amount)?)?;
        }
        for (holder, ids) in &self.assets {
            for (id, amount) in ids {
                assets.mint(holder, AssetId::new(*id), parse_amount(amount)?)?;
            }
        }
        Ok(())
    }
}

fn parse_amount(raw: &str) -> Result<Amount, ExchangeError> {
    raw.parse::<u128>()
        .map(Amount::new)
        .map_err(|e| ExchangeError::InvalidRequest(format!("invalid amount {raw:?}: {e}")))
}
