//! Domain layer: identifiers, pools, commands and the event system.
//!
//! This module contains the exchange's domain model: asset and account
//! identity, per-asset pool reserves and their staged registry, the batch
//! commands accepted on inbound transfers, and the event bus broadcasting
//! committed state changes.

pub mod command;
pub mod event_bus;
pub mod exchange_event;
pub mod ids;
pub mod pool;
pub mod pool_registry;

pub use command::{
    AddLiquidity, BatchTransfer, BuyOrder, Command, RemoveLiquidity, SellAsset,
    ADD_LIQUIDITY_SELECTOR, REMOVE_LIQUIDITY_SELECTOR, SELL_ASSET_SELECTOR,
};
pub use event_bus::EventBus;
pub use exchange_event::{ExchangeEvent, LiquidityLeg, TradeLeg};
pub use ids::{AccountId, AssetId};
pub use pool::{Pool, PoolEntry, PoolSummary};
pub use pool_registry::{PoolBatch, PoolRegistry};
