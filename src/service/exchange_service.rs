//! Exchange service: serialises exchange calls and emits events.

use std::sync::Arc;

use chrono::Utc;
use hydra_amm::domain::{Amount, FeeTier};
use tokio::sync::Mutex;

use crate::domain::{
    AccountId, AssetId, BatchTransfer, BuyOrder, EventBus, ExchangeEvent, PoolEntry, PoolSummary,
};
use crate::engine::{AdminCapability, BatchReceipt, Exchange};
use crate::error::ExchangeError;

/// Orchestration layer over an [`Exchange`].
///
/// The exchange rejects overlapping calls as re-entrant, so every call here
/// first takes its turn on an async sequencer: concurrent requests queue
/// and each one observes the state committed by the previous one. Every
/// mutation follows the pattern: take turn → run batch → publish events →
/// return receipt.
#[derive(Debug)]
pub struct ExchangeService {
    exchange: Arc<Exchange>,
    event_bus: EventBus,
    sequencer: Mutex<()>,
}

impl ExchangeService {
    /// Creates a new `ExchangeService`.
    #[must_use]
    pub fn new(exchange: Arc<Exchange>, event_bus: EventBus) -> Self {
        Self {
            exchange,
            event_bus,
            sequencer: Mutex::new(()),
        }
    }

    /// Returns a reference to the inner [`EventBus`].
    #[must_use]
    pub fn event_bus(&self) -> &EventBus {
        &self.event_bus
    }

    /// Returns a reference to the inner [`Exchange`].
    #[must_use]
    pub fn exchange(&self) -> &Arc<Exchange> {
        &self.exchange
    }

    fn announce(&self, receipt: &BatchReceipt) {
        let delivered = self.event_bus.publish_all(receipt.events());
        tracing::debug!(batch_id = %receipt.batch_id, delivered, "batch events published");
    }

    /// Executes the command attached to an inbound batch transfer.
    ///
    /// # Errors
    ///
    /// Returns any error of [`Exchange::dispatch`].
    pub async fn dispatch(&self, transfer: BatchTransfer) -> Result<BatchReceipt, ExchangeError> {
        let _turn = self.sequencer.lock().await;
        let receipt = self.exchange.dispatch(transfer)?;
        self.announce(&receipt);
        Ok(receipt)
    }

    /// Decodes and executes an inbound batch transfer's opaque payload.
    ///
    /// # Errors
    ///
    /// Returns any error of [`Exchange::on_batch_received`].
    pub async fn on_batch_received(
        &self,
        sender: AccountId,
        ids: Vec<AssetId>,
        amounts: Vec<u128>,
        data: &[u8],
    ) -> Result<BatchReceipt, ExchangeError> {
        let _turn = self.sequencer.lock().await;
        let receipt = self.exchange.on_batch_received(sender, ids, amounts, data)?;
        self.announce(&receipt);
        Ok(receipt)
    }

    /// Buys assets for `buyer`.
    ///
    /// # Errors
    ///
    /// Returns any error of [`Exchange::buy_asset`].
    pub async fn buy(
        &self,
        buyer: &AccountId,
        order: BuyOrder,
    ) -> Result<BatchReceipt, ExchangeError> {
        let _turn = self.sequencer.lock().await;
        let receipt = self.exchange.buy_asset(buyer, order)?;
        self.announce(&receipt);
        Ok(receipt)
    }

    /// Prices a buy without executing it.
    ///
    /// # Errors
    ///
    /// Returns any error of [`Exchange::quote_buy`].
    pub async fn quote_buy(
        &self,
        ids: &[AssetId],
        amounts_out: &[u128],
    ) -> Result<Vec<Amount>, ExchangeError> {
        let _turn = self.sequencer.lock().await;
        self.exchange.quote_buy(ids, amounts_out)
    }

    /// Prices a sell without executing it.
    ///
    /// # Errors
    ///
    /// Returns any error of [`Exchange::quote_sell`].
    pub async fn quote_sell(
        &self,
        ids: &[AssetId],
        amounts_in: &[u128],
    ) -> Result<Vec<Amount>, ExchangeError> {
        let _turn = self.sequencer.lock().await;
        self.exchange.quote_sell(ids, amounts_in)
    }

    /// Returns a live pool.
    ///
    /// # Errors
    ///
    /// Returns [`ExchangeError::PoolNotFound`] if no pool exists for `asset_id`.
    pub async fn pool(&self, asset_id: AssetId) -> Result<PoolEntry, ExchangeError> {
        let _turn = self.sequencer.lock().await;
        self.exchange
            .pool(asset_id)?
            .ok_or(ExchangeError::PoolNotFound(asset_id))
    }

    /// Returns summaries of all live pools.
    ///
    /// # Errors
    ///
    /// Returns [`ExchangeError::Internal`] if the exchange state is poisoned.
    pub async fn list_pools(&self) -> Result<Vec<PoolSummary>, ExchangeError> {
        let _turn = self.sequencer.lock().await;
        self.exchange.pools()
    }

    /// Returns full entries of all live pools.
    ///
    /// # Errors
    ///
    /// Returns [`ExchangeError::Internal`] if the exchange state is poisoned.
    pub async fn pool_entries(&self) -> Result<Vec<PoolEntry>, ExchangeError> {
        let _turn = self.sequencer.lock().await;
        self.exchange.entries()
    }

    /// Returns the currency reserve of each id.
    ///
    /// # Errors
    ///
    /// Returns [`ExchangeError::Internal`] if the exchange state is poisoned.
    pub async fn currency_reserves(&self, ids: &[AssetId]) -> Result<Vec<Amount>, ExchangeError> {
        let _turn = self.sequencer.lock().await;
        self.exchange.currency_reserves(ids)
    }

    /// Returns `holder`'s LP shares of `asset_id` and the pool's share supply.
    ///
    /// # Errors
    ///
    /// Returns [`ExchangeError::Internal`] if the exchange state is poisoned.
    pub async fn shares(
        &self,
        holder: &AccountId,
        asset_id: AssetId,
    ) -> Result<(Amount, Amount), ExchangeError> {
        let _turn = self.sequencer.lock().await;
        let balance = self.exchange.share_balance(holder, asset_id);
        let supply = self.exchange.total_shares(asset_id)?;
        Ok((balance, supply))
    }

    /// Moves LP shares between holders.
    ///
    /// # Errors
    ///
    /// Returns any error of [`Exchange::transfer_shares`].
    pub async fn transfer_shares(
        &self,
        from: &AccountId,
        to: &AccountId,
        asset_id: AssetId,
        amount: Amount,
    ) -> Result<(), ExchangeError> {
        let _turn = self.sequencer.lock().await;
        self.exchange.transfer_shares(from, to, asset_id, amount)
    }

    /// Returns the current trading fee.
    ///
    /// # Errors
    ///
    /// Returns [`ExchangeError::Internal`] if the exchange state is poisoned.
    pub async fn fee(&self) -> Result<FeeTier, ExchangeError> {
        let _turn = self.sequencer.lock().await;
        self.exchange.fee()
    }

    /// Replaces the trading fee and announces the change.
    ///
    /// # Errors
    ///
    /// Returns any error of [`Exchange::set_fee`].
    pub async fn set_fee(
        &self,
        admin: &AdminCapability,
        fee: FeeTier,
    ) -> Result<FeeTier, ExchangeError> {
        let _turn = self.sequencer.lock().await;
        let previous = self.exchange.set_fee(admin, fee)?;
        let _ = self.event_bus.publish(ExchangeEvent::FeeUpdated {
            old_fee_bps: previous.basis_points().get(),
            new_fee_bps: fee.basis_points().get(),
            timestamp: Utc::now(),
        });
        Ok(previous)
    }
}
