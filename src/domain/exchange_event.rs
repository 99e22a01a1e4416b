//! Domain events published after every committed batch.
//!
//! Each committed batch emits one [`ExchangeEvent`] through the
//! [`super::EventBus`], followed by a [`ExchangeEvent::PoolClosed`] for every
//! pool the batch drained. Events are broadcast to WebSocket subscribers and
//! optionally appended to the PostgreSQL event log.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use super::{AccountId, AssetId};

/// One priced buy or sell leg.
///
/// Amounts are string-encoded to preserve u128 precision in JSON.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TradeLeg {
    /// Pool the leg executed against.
    pub asset_id: AssetId,
    /// Asset units moved.
    pub asset_amount: String,
    /// Currency moved.
    pub currency_amount: String,
}

/// One liquidity deposit or withdrawal leg.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LiquidityLeg {
    /// Pool the leg executed against.
    pub asset_id: AssetId,
    /// Asset units deposited or withdrawn.
    pub asset_amount: String,
    /// Currency deposited or withdrawn.
    pub currency_amount: String,
    /// LP shares minted or burned.
    pub shares: String,
}

/// Event emitted after a batch commits.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event_type", rename_all = "snake_case")]
pub enum ExchangeEvent {
    /// Liquidity was deposited into one or more pools.
    LiquidityAdded {
        /// Batch correlation id.
        batch_id: Uuid,
        /// Account that supplied the liquidity and received the shares.
        provider: AccountId,
        /// Per-id deposit legs.
        legs: Vec<LiquidityLeg>,
        /// Commit timestamp.
        timestamp: DateTime<Utc>,
    },

    /// LP shares were burned for reserves.
    LiquidityRemoved {
        /// Batch correlation id.
        batch_id: Uuid,
        /// Account that burned the shares and received the reserves.
        provider: AccountId,
        /// Per-id withdrawal legs.
        legs: Vec<LiquidityLeg>,
        /// Commit timestamp.
        timestamp: DateTime<Utc>,
    },

    /// Assets were bought with currency.
    AssetsPurchased {
        /// Batch correlation id.
        batch_id: Uuid,
        /// Account that paid the currency.
        buyer: AccountId,
        /// Account that received the assets.
        recipient: AccountId,
        /// Per-id purchase legs.
        legs: Vec<TradeLeg>,
        /// Total currency paid (string-encoded u128).
        total_currency: String,
        /// Commit timestamp.
        timestamp: DateTime<Utc>,
    },

    /// Assets were sold for currency.
    AssetsSold {
        /// Batch correlation id.
        batch_id: Uuid,
        /// Account that transferred the assets in.
        seller: AccountId,
        /// Account that received the currency.
        recipient: AccountId,
        /// Per-id sale legs.
        legs: Vec<TradeLeg>,
        /// Total currency paid out (string-encoded u128).
        total_currency: String,
        /// Commit timestamp.
        timestamp: DateTime<Utc>,
    },

    /// A pool's share supply returned to zero and it was removed.
    PoolClosed {
        /// Batch that drained the pool.
        batch_id: Uuid,
        /// Asset id of the closed pool.
        asset_id: AssetId,
        /// Commit timestamp.
        timestamp: DateTime<Utc>,
    },

    /// The trading fee changed.
    FeeUpdated {
        /// Previous fee in basis points.
        old_fee_bps: u32,
        /// New fee in basis points.
        new_fee_bps: u32,
        /// Change timestamp.
        timestamp: DateTime<Utc>,
    },
}

impl ExchangeEvent {
    /// Returns the asset ids this event concerns, in leg order.
    ///
    /// [`ExchangeEvent::FeeUpdated`] concerns every pool and returns an
    /// empty list; use [`ExchangeEvent::touches`] for filtering.
    #[must_use]
    pub fn asset_ids(&self) -> Vec<AssetId> {
        match self {
            Self::LiquidityAdded { legs, .. } | Self::LiquidityRemoved { legs, .. } => {
                legs.iter().map(|leg| leg.asset_id).collect()
            }
            Self::AssetsPurchased { legs, .. } | Self::AssetsSold { legs, .. } => {
                legs.iter().map(|leg| leg.asset_id).collect()
            }
            Self::PoolClosed { asset_id, .. } => vec![*asset_id],
            Self::FeeUpdated { .. } => Vec::new(),
        }
    }

    /// Returns `true` if the event is relevant to subscribers of `asset_id`.
    #[must_use]
    pub fn touches(&self, asset_id: AssetId) -> bool {
        match self {
            Self::FeeUpdated { .. } => true,
            _ => self.asset_ids().contains(&asset_id),
        }
    }

    /// Returns the batch correlation id, if the event came from a batch.
    #[must_use]
    pub const fn batch_id(&self) -> Option<Uuid> {
        match self {
            Self::LiquidityAdded { batch_id, .. }
            | Self::LiquidityRemoved { batch_id, .. }
            | Self::AssetsPurchased { batch_id, .. }
            | Self::AssetsSold { batch_id, .. }
            | Self::PoolClosed { batch_id, .. } => Some(*batch_id),
            Self::FeeUpdated { .. } => None,
        }
    }

    /// Returns the event type as a static string slice.
    #[must_use]
    pub const fn event_type_str(&self) -> &'static str {
        match self {
            Self::LiquidityAdded { .. } => "liquidity_added",
            Self::LiquidityRemoved { .. } => "liquidity_removed",
            Self::AssetsPurchased { .. } => "assets_purchased",
            Self::AssetsSold { .. } => "assets_sold",
            Self::PoolClosed { .. } => "pool_closed",
            Self::FeeUpdated { .. } => "fee_updated",
        }
    }

    /// Returns the commit timestamp.
    #[must_use]
    pub const fn timestamp(&self) -> DateTime<Utc> {
        match self {
            Self::LiquidityAdded { timestamp, .. }
            | Self::LiquidityRemoved { timestamp, .. }
            | Self::AssetsPurchased { timestamp, .. }
            | Self::AssetsSold { timestamp, .. }
            | Self::PoolClosed { timestamp, .. }
            | Self::FeeUpdated { timestamp, .. } => *timestamp,
        }
    }
}
