//! Per-asset pool state and the registry entry wrapping it.

use chrono::{DateTime, Utc};
use hydra_amm::domain::Amount;
use hydra_amm::math::CheckedArithmetic;
use serde::Serialize;

use super::AssetId;
use crate::error::ExchangeError;

/// Reserve snapshot of one pool.
///
/// A pool with `total_shares == 0` is empty: it holds no reserves and the
/// next liquidity deposit sets its price freely.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Pool {
    currency_reserve: Amount,
    asset_reserve: Amount,
    total_shares: Amount,
}

impl Pool {
    /// An empty pool.
    pub const EMPTY: Self = Self {
        currency_reserve: Amount::ZERO,
        asset_reserve: Amount::ZERO,
        total_shares: Amount::ZERO,
    };

    /// Creates a pool snapshot from raw reserves.
    #[must_use]
    pub const fn new(
        currency_reserve: Amount,
        asset_reserve: Amount,
        total_shares: Amount,
    ) -> Self {
        Self {
            currency_reserve,
            asset_reserve,
            total_shares,
        }
    }

    /// Currency held by the pool.
    #[must_use]
    pub const fn currency_reserve(&self) -> Amount {
        self.currency_reserve
    }

    /// Asset units held by the pool.
    #[must_use]
    pub const fn asset_reserve(&self) -> Amount {
        self.asset_reserve
    }

    /// Outstanding LP shares.
    #[must_use]
    pub const fn total_shares(&self) -> Amount {
        self.total_shares
    }

    /// Returns `true` if no LP shares are outstanding.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.total_shares.is_zero()
    }

    /// The constant-product invariant `currency_reserve * asset_reserve`.
    ///
    /// # Errors
    ///
    /// Returns [`ExchangeError::Arithmetic`] if the product overflows `u128`.
    pub fn invariant(&self) -> Result<Amount, ExchangeError> {
        Ok(self.currency_reserve.safe_mul(&self.asset_reserve)?)
    }

    /// Spot price of one asset unit in currency, for display only.
    #[must_use]
    pub fn spot_price(&self) -> Option<f64> {
        if self.asset_reserve.is_zero() {
            return None;
        }
        #[allow(clippy::cast_precision_loss)]
        let price = self.currency_reserve.get() as f64 / self.asset_reserve.get() as f64;
        Some(price)
    }

    /// Pool after a buy: `asset_out` leaves, `currency_in` enters.
    ///
    /// # Errors
    ///
    /// Returns [`ExchangeError::Arithmetic`] on overflow or underflow.
    pub fn after_buy(&self, asset_out: Amount, currency_in: Amount) -> Result<Self, ExchangeError> {
        Ok(Self {
            currency_reserve: self.currency_reserve.safe_add(&currency_in)?,
            asset_reserve: self.asset_reserve.safe_sub(&asset_out)?,
            total_shares: self.total_shares,
        })
    }

    /// Pool after a sell: `asset_in` enters, `currency_out` leaves.
    ///
    /// # Errors
    ///
    /// Returns [`ExchangeError::Arithmetic`] on overflow or underflow.
    pub fn after_sell(
        &self,
        asset_in: Amount,
        currency_out: Amount,
    ) -> Result<Self, ExchangeError> {
        Ok(Self {
            currency_reserve: self.currency_reserve.safe_sub(&currency_out)?,
            asset_reserve: self.asset_reserve.safe_add(&asset_in)?,
            total_shares: self.total_shares,
        })
    }

    /// Pool after a liquidity deposit.
    ///
    /// # Errors
    ///
    /// Returns [`ExchangeError::Arithmetic`] on overflow.
    pub fn after_add(
        &self,
        asset_in: Amount,
        currency_in: Amount,
        shares_minted: Amount,
    ) -> Result<Self, ExchangeError> {
        Ok(Self {
            currency_reserve: self.currency_reserve.safe_add(&currency_in)?,
            asset_reserve: self.asset_reserve.safe_add(&asset_in)?,
            total_shares: self.total_shares.safe_add(&shares_minted)?,
        })
    }

    /// Pool after a liquidity withdrawal.
    ///
    /// # Errors
    ///
    /// Returns [`ExchangeError::Arithmetic`] on underflow.
    pub fn after_remove(
        &self,
        asset_out: Amount,
        currency_out: Amount,
        shares_burned: Amount,
    ) -> Result<Self, ExchangeError> {
        Ok(Self {
            currency_reserve: self.currency_reserve.safe_sub(&currency_out)?,
            asset_reserve: self.asset_reserve.safe_sub(&asset_out)?,
            total_shares: self.total_shares.safe_sub(&shares_burned)?,
        })
    }
}

/// Aggregate wrapping a [`Pool`] with registry metadata.
#[derive(Debug, Clone)]
pub struct PoolEntry {
    /// Asset id the pool trades (immutable after creation).
    pub asset_id: AssetId,

    /// Live reserves. Replaced on every committed batch touching the pool.
    pub pool: Pool,

    /// Timestamp of the first liquidity deposit.
    pub created_at: DateTime<Utc>,

    /// Timestamp of the last committed mutation.
    pub last_modified_at: DateTime<Utc>,

    /// Number of buy and sell legs executed against this pool.
    pub trade_count: u64,

    /// Cumulative currency traded through buys and sells.
    pub currency_volume: u128,
}

impl PoolEntry {
    /// Creates a new entry for a freshly seeded pool.
    #[must_use]
    pub fn new(asset_id: AssetId, pool: Pool) -> Self {
        let now = Utc::now();
        Self {
            asset_id,
            pool,
            created_at: now,
            last_modified_at: now,
            trade_count: 0,
            currency_volume: 0,
        }
    }
}

/// Lightweight summary of a pool for list endpoints.
#[derive(Debug, Clone, Serialize)]
pub struct PoolSummary {
    /// Pool asset id.
    pub asset_id: AssetId,
    /// Currency reserve (string-encoded u128).
    pub currency_reserve: String,
    /// Asset reserve (string-encoded u128).
    pub asset_reserve: String,
    /// Outstanding shares (string-encoded u128).
    pub total_shares: String,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Number of trades executed.
    pub trade_count: u64,
}

impl From<&PoolEntry> for PoolSummary {
    fn from(entry: &PoolEntry) -> Self {
        Self {
            asset_id: entry.asset_id,
            currency_reserve: entry.pool.currency_reserve().to_string(),
            asset_reserve: entry.pool.asset_reserve().to_string(),
            total_shares: entry.pool.total_shares().to_string(),
            created_at: entry.created_at,
            trade_count: entry.trade_count,
        }
    }
}
