//! Receipts describing committed batches.

use chrono::{DateTime, Utc};
use hydra_amm::domain::Amount;
use serde::Serialize;
use uuid::Uuid;

use crate::domain::{AccountId, AssetId, ExchangeEvent, LiquidityLeg, TradeLeg};

/// Kind of operation a batch performed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchKind {
    /// Liquidity deposit.
    AddLiquidity,
    /// Sale of assets for currency.
    SellAsset,
    /// Liquidity withdrawal.
    RemoveLiquidity,
    /// Direct purchase of assets with currency.
    Buy,
}

impl BatchKind {
    /// Returns the kind as a static string slice.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::AddLiquidity => "add_liquidity",
            Self::SellAsset => "sell_asset",
            Self::RemoveLiquidity => "remove_liquidity",
            Self::Buy => "buy",
        }
    }
}

/// Amounts settled for one `(id, amount)` entry of a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LegReceipt {
    /// Pool the leg executed against.
    pub asset_id: AssetId,
    /// Asset units moved into or out of the pool.
    pub asset_amount: Amount,
    /// Currency moved into or out of the pool.
    pub currency_amount: Amount,
    /// LP shares minted or burned (zero for trades).
    pub shares: Amount,
}

/// Outcome of a committed batch.
#[derive(Debug, Clone)]
pub struct BatchReceipt {
    /// Correlation id shared by the events of this batch.
    pub batch_id: Uuid,
    /// Operation performed.
    pub kind: BatchKind,
    /// Account that initiated the batch.
    pub sender: AccountId,
    /// Account that received the proceeds.
    pub recipient: AccountId,
    /// Per-entry amounts, in request order.
    pub legs: Vec<LegReceipt>,
    /// Currency paid or received across all legs.
    pub total_currency: Amount,
    /// Pools whose share supply reached zero.
    pub closed_pools: Vec<AssetId>,
    /// Exchange time the batch executed at (unix seconds).
    pub executed_at: u64,
    /// Commit timestamp.
    pub committed_at: DateTime<Utc>,
}

impl BatchReceipt {
    /// Builds the events announcing this batch: one for the operation,
    /// followed by one per closed pool.
    #[must_use]
    pub fn events(&self) -> Vec<ExchangeEvent> {
        let timestamp = self.committed_at;
        let batch_id = self.batch_id;
        let mut events = Vec::with_capacity(1 + self.closed_pools.len());

        let primary = match self.kind {
            BatchKind::AddLiquidity => ExchangeEvent::LiquidityAdded {
                batch_id,
                provider: self.sender.clone(),
                legs: self.liquidity_legs(),
                timestamp,
            },
            BatchKind::RemoveLiquidity => ExchangeEvent::LiquidityRemoved {
                batch_id,
                provider: self.sender.clone(),
                legs: self.liquidity_legs(),
                timestamp,
            },
            BatchKind::SellAsset => ExchangeEvent::AssetsSold {
                batch_id,
                seller: self.sender.clone(),
                recipient: self.recipient.clone(),
                legs: self.trade_legs(),
                total_currency: self.total_currency.to_string(),
                timestamp,
            },
            BatchKind::Buy => ExchangeEvent::AssetsPurchased {
                batch_id,
                buyer: self.sender.clone(),
                recipient: self.recipient.clone(),
                legs: self.trade_legs(),
                total_currency: self.total_currency.to_string(),
                timestamp,
            },
        };
        events.push(primary);

        events.extend(
            self.closed_pools
                .iter()
                .map(|&asset_id| ExchangeEvent::PoolClosed {
                    batch_id,
                    asset_id,
                    timestamp,
                }),
        );
        events
    }

    fn trade_legs(&self) -> Vec<TradeLeg> {
        self.legs
            .iter()
            .map(|leg| TradeLeg {
                asset_id: leg.asset_id,
                asset_amount: leg.asset_amount.to_string(),
                currency_amount: leg.currency_amount.to_string(),
            })
            .collect()
    }

    fn liquidity_legs(&self) -> Vec<LiquidityLeg> {
        self.legs
            .iter()
            .map(|leg| LiquidityLeg {
                asset_id: leg.asset_id,
                asset_amount: leg.asset_amount.to_string(),
                currency_amount: leg.currency_amount.to_string(),
                shares: leg.shares.to_string(),
            })
            .collect()
    }
}
