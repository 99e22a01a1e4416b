//! Journaled settlement across the currency, asset and share ledgers.
//!
//! A batch settles as an ordered list of [`LedgerOp`]s. The bridge executes
//! them one by one and records each success. If a step fails, every recorded
//! step is reversed in reverse order before the error is returned, so the
//! ledgers end up exactly where they started.

use std::sync::Arc;

use hydra_amm::domain::Amount;

use super::{CurrencyLedger, MultiTokenLedger};
use crate::domain::{AccountId, AssetId};
use crate::error::ExchangeError;

/// One settlement step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LedgerOp {
    /// Currency transfer.
    Currency {
        /// Payer.
        from: AccountId,
        /// Payee.
        to: AccountId,
        /// Amount moved.
        amount: Amount,
    },
    /// Asset batch transfer.
    Assets {
        /// Sender.
        from: AccountId,
        /// Receiver.
        to: AccountId,
        /// `(id, amount)` entries.
        entries: Vec<(AssetId, Amount)>,
    },
    /// Share batch transfer.
    Shares {
        /// Sender.
        from: AccountId,
        /// Receiver.
        to: AccountId,
        /// `(id, amount)` entries.
        entries: Vec<(AssetId, Amount)>,
    },
    /// Share issuance.
    MintShares {
        /// Holder credited with the new shares.
        to: AccountId,
        /// `(id, amount)` entries.
        entries: Vec<(AssetId, Amount)>,
    },
    /// Share destruction.
    BurnShares {
        /// Holder whose shares are destroyed.
        from: AccountId,
        /// `(id, amount)` entries.
        entries: Vec<(AssetId, Amount)>,
    },
}

impl LedgerOp {
    /// The step that undoes this one.
    #[must_use]
    pub fn inverse(&self) -> Self {
        match self {
            Self::Currency { from, to, amount } => Self::Currency {
                from: to.clone(),
                to: from.clone(),
                amount: *amount,
            },
            Self::Assets { from, to, entries } => Self::Assets {
                from: to.clone(),
                to: from.clone(),
                entries: entries.clone(),
            },
            Self::Shares { from, to, entries } => Self::Shares {
                from: to.clone(),
                to: from.clone(),
                entries: entries.clone(),
            },
            Self::MintShares { to, entries } => Self::BurnShares {
                from: to.clone(),
                entries: entries.clone(),
            },
            Self::BurnShares { from, entries } => Self::MintShares {
                to: from.clone(),
                entries: entries.clone(),
            },
        }
    }

    /// Returns `true` if the step moves nothing.
    #[must_use]
    pub fn is_noop(&self) -> bool {
        match self {
            Self::Currency { amount, .. } => amount.is_zero(),
            Self::Assets { entries, .. }
            | Self::Shares { entries, .. }
            | Self::MintShares { entries, .. }
            | Self::BurnShares { entries, .. } => entries.iter().all(|(_, a)| a.is_zero()),
        }
    }

    const fn label(&self) -> &'static str {
        match self {
            Self::Currency { .. } => "currency",
            Self::Assets { .. } => "assets",
            Self::Shares { .. } => "shares",
            Self::MintShares { .. } => "mint_shares",
            Self::BurnShares { .. } => "burn_shares",
        }
    }
}

/// Settlement gateway to the three ledgers.
#[derive(Debug, Clone)]
pub struct LedgerBridge {
    currency: Arc<dyn CurrencyLedger>,
    assets: Arc<dyn MultiTokenLedger>,
    shares: Arc<dyn MultiTokenLedger>,
}

impl LedgerBridge {
    /// Creates a bridge over the given ledgers.
    #[must_use]
    pub fn new(
        currency: Arc<dyn CurrencyLedger>,
        assets: Arc<dyn MultiTokenLedger>,
        shares: Arc<dyn MultiTokenLedger>,
    ) -> Self {
        Self {
            currency,
            assets,
            shares,
        }
    }

    /// The currency ledger.
    #[must_use]
    pub fn currency(&self) -> &Arc<dyn CurrencyLedger> {
        &self.currency
    }

    /// The asset ledger.
    #[must_use]
    pub fn assets(&self) -> &Arc<dyn MultiTokenLedger> {
        &self.assets
    }

    /// The share ledger.
    #[must_use]
    pub fn shares(&self) -> &Arc<dyn MultiTokenLedger> {
        &self.shares
    }

    /// Executes `ops` in order, all or nothing.
    ///
    /// Zero-amount steps are skipped.
    ///
    /// # Errors
    ///
    /// Returns the error of the first failing step after reversing every
    /// step executed before it.
    pub fn settle(&self, ops: Vec<LedgerOp>) -> Result<(), ExchangeError> {
        let mut journal: Vec<LedgerOp> = Vec::with_capacity(ops.len());
        for op in ops.into_iter().filter(|op| !op.is_noop()) {
            if let Err(err) = self.apply(&op) {
                tracing::warn!(
                    step = op.label(),
                    executed = journal.len(),
                    error = %err,
                    "settlement failed, reversing executed steps"
                );
                self.unwind(journal);
                return Err(err);
            }
            journal.push(op);
        }
        Ok(())
    }

    fn unwind(&self, journal: Vec<LedgerOp>) {
        for op in journal.into_iter().rev() {
            let inverse = op.inverse();
            if let Err(err) = self.apply(&inverse) {
                tracing::error!(
                    step = inverse.label(),
                    error = %err,
                    "failed to reverse settlement step"
                );
            }
        }
    }

    fn apply(&self, op: &LedgerOp) -> Result<(), ExchangeError> {
        match op {
            LedgerOp::Currency { from, to, amount } => self.currency.transfer(from, to, *amount),
            LedgerOp::Assets { from, to, entries } => self.assets.batch_transfer(from, to, entries),
            LedgerOp::Shares { from, to, entries } => self.shares.batch_transfer(from, to, entries),
            LedgerOp::MintShares { to, entries } => each_or_undo(
                entries,
                |id, amount| self.shares.mint(to, id, amount),
                |id, amount| self.shares.burn(to, id, amount),
            ),
            LedgerOp::BurnShares { from, entries } => each_or_undo(
                entries,
                |id, amount| self.shares.burn(from, id, amount),
                |id, amount| self.shares.mint(from, id, amount),
            ),
        }
    }
}

/// Applies `step` to every entry; on failure undoes the applied prefix.
fn each_or_undo(
    entries: &[(AssetId, Amount)],
    step: impl Fn(AssetId, Amount) -> Result<(), ExchangeError>,
    undo: impl Fn(AssetId, Amount) -> Result<(), ExchangeError>,
) -> Result<(), ExchangeError> {
    for (done, &(id, amount)) in entries.iter().enumerate() {
        if let Err(err) = step(id, amount) {
            for &(id, amount) in entries.iter().take(done).rev() {
                if let Err(undo_err) = undo(id, amount) {
                    tracing::error!(%id, error = %undo_err, "failed to undo share entry");
                }
            }
            return Err(err);
        }
    }
    Ok(())
}
