//! External ledgers the exchange settles against.
//!
//! The exchange never owns balances itself. Currency lives on a
//! [`CurrencyLedger`], assets on a [`MultiTokenLedger`], and LP shares on a
//! second [`MultiTokenLedger`] keyed by the pool's asset id. Every movement
//! goes through the [`LedgerBridge`], which undoes the already-executed
//! steps of a batch when a later step fails.

pub mod bridge;
pub mod memory;

use std::fmt;

use hydra_amm::domain::Amount;

pub use bridge::{LedgerBridge, LedgerOp};
pub use memory::{CurrencyBook, Genesis, MultiTokenBook};

use crate::domain::{AccountId, AssetId};
use crate::error::ExchangeError;

/// Fungible currency ledger.
pub trait CurrencyLedger: Send + Sync + fmt::Debug {
    /// Currency held by `holder`.
    fn balance_of(&self, holder: &AccountId) -> Amount;

    /// Moves `amount` from `from` to `to`.
    ///
    /// # Errors
    ///
    /// Returns [`ExchangeError::InsufficientBalance`] if `from` cannot cover
    /// `amount`, or any error the ledger raises.
    fn transfer(
        &self,
        from: &AccountId,
        to: &AccountId,
        amount: Amount,
    ) -> Result<(), ExchangeError>;
}

/// Multi-id ledger used for both assets and LP shares.
pub trait MultiTokenLedger: Send + Sync + fmt::Debug {
    /// Units of `id` held by `holder`.
    fn balance_of(&self, holder: &AccountId, id: AssetId) -> Amount;

    /// Outstanding units of `id`.
    fn total_supply(&self, id: AssetId) -> Amount;

    /// Moves `amount` units of `id` from `from` to `to`.
    ///
    /// # Errors
    ///
    /// Returns [`ExchangeError::InsufficientBalance`] if `from` cannot cover
    /// `amount`.
    fn transfer(
        &self,
        from: &AccountId,
        to: &AccountId,
        id: AssetId,
        amount: Amount,
    ) -> Result<(), ExchangeError>;

    /// Moves every `(id, amount)` entry from `from` to `to`, all or nothing.
    /// Repeated ids are summed.
    ///
    /// # Errors
    ///
    /// Returns [`ExchangeError::InsufficientBalance`] if `from` cannot cover
    /// the entries; no entry is applied in that case.
    fn batch_transfer(
        &self,
        from: &AccountId,
        to: &AccountId,
        entries: &[(AssetId, Amount)],
    ) -> Result<(), ExchangeError>;

    /// Creates `amount` units of `id` for `to`.
    ///
    /// # Errors
    ///
    /// Returns [`ExchangeError::Arithmetic`] if the supply overflows.
    fn mint(&self, to: &AccountId, id: AssetId, amount: Amount) -> Result<(), ExchangeError>;

    /// Destroys `amount` units of `id` held by `from`.
    ///
    /// # Errors
    ///
    /// Returns [`ExchangeError::InsufficientBalance`] if `from` cannot cover
    /// `amount`.
    fn burn(&self, from: &AccountId, id: AssetId, amount: Amount) -> Result<(), ExchangeError>;
}
