//! Command dispatch and direct buys over the pool registry.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, TryLockError};

use chrono::Utc;
use hydra_amm::domain::{Amount, FeeTier};
use hydra_amm::math::CheckedArithmetic;
use uuid::Uuid;

use super::admin::AdminCapability;
use super::clock::Clock;
use super::pricing::PricingEngine;
use super::receipt::{BatchKind, BatchReceipt, LegReceipt};
use crate::domain::{
    AccountId, AddLiquidity, AssetId, BatchTransfer, BuyOrder, Command, PoolBatch, PoolEntry,
    PoolRegistry, PoolSummary, RemoveLiquidity, SellAsset,
};
use crate::error::ExchangeError;
use crate::ledger::{LedgerBridge, LedgerOp};

#[derive(Debug)]
struct ExchangeState {
    registry: PoolRegistry,
    pricing: PricingEngine,
}

/// A fully priced batch waiting for settlement.
#[derive(Debug)]
struct Plan {
    kind: BatchKind,
    sender: AccountId,
    recipient: AccountId,
    batch: PoolBatch,
    legs: Vec<LegReceipt>,
    total_currency: Amount,
    ops: Vec<LedgerOp>,
    executed_at: u64,
}

/// Multi-asset constant-product exchange.
///
/// One pool per asset id trades against a single currency. Liquidity
/// deposits, sells and withdrawals arrive as [`BatchTransfer`]s; purchases
/// go through [`Exchange::buy_asset`]. Each call is one all-or-nothing batch.
///
/// Every entry point, views included, takes the state lock with `try_lock`.
/// A call arriving while a batch is in flight, such as one made from inside
/// a ledger callback, fails with [`ExchangeError::ReentrantCall`] instead of
/// observing half-applied state. Independent callers must be sequenced by
/// the caller (see [`crate::service::ExchangeService`]).
#[derive(Debug)]
pub struct Exchange {
    id: Uuid,
    account: AccountId,
    state: Mutex<ExchangeState>,
    bridge: LedgerBridge,
    clock: Arc<dyn Clock>,
}

impl Exchange {
    /// Creates an exchange holding custody under `account`.
    ///
    /// Returns the exchange together with the only [`AdminCapability`]
    /// able to reconfigure it.
    ///
    /// # Errors
    ///
    /// Returns [`ExchangeError::InvalidRequest`] if `fee` is 100% or more.
    pub fn new(
        account: AccountId,
        bridge: LedgerBridge,
        clock: Arc<dyn Clock>,
        fee: FeeTier,
    ) -> Result<(Self, AdminCapability), ExchangeError> {
        let id = Uuid::new_v4();
        let exchange = Self {
            id,
            account,
            state: Mutex::new(ExchangeState {
                registry: PoolRegistry::new(),
                pricing: PricingEngine::new(fee)?,
            }),
            bridge,
            clock,
        };
        Ok((exchange, AdminCapability::mint(id)))
    }

    /// Account holding the pools' currency and assets.
    #[must_use]
    pub fn account(&self) -> &AccountId {
        &self.account
    }

    /// Ledgers the exchange settles against.
    #[must_use]
    pub fn bridge(&self) -> &LedgerBridge {
        &self.bridge
    }

    /// Current exchange time (unix seconds).
    #[must_use]
    pub fn now(&self) -> u64 {
        self.clock.now()
    }

    fn enter(&self) -> Result<MutexGuard<'_, ExchangeState>, ExchangeError> {
        match self.state.try_lock() {
            Ok(guard) => Ok(guard),
            Err(TryLockError::WouldBlock) => Err(ExchangeError::ReentrantCall),
            Err(TryLockError::Poisoned(_)) => {
                Err(ExchangeError::Internal("exchange state lock poisoned".to_string()))
            }
        }
    }

    /// Rejects the custody account as a trading party.
    fn check_counterparty(&self, who: &AccountId, role: &str) -> Result<(), ExchangeError> {
        if *who == self.account {
            return Err(ExchangeError::InvalidRequest(format!(
                "{role} cannot be the exchange custody account {who}"
            )));
        }
        Ok(())
    }

    // -- Inbound transfers --------------------------------------------------

    /// Handles an inbound batch transfer whose command is still encoded.
    ///
    /// # Errors
    ///
    /// Returns [`ExchangeError::InvalidCommand`] or
    /// [`ExchangeError::MalformedPayload`] if `data` does not decode, and
    /// otherwise anything [`Exchange::dispatch`] returns.
    pub fn on_batch_received(
        &self,
        sender: AccountId,
        ids: Vec<AssetId>,
        amounts: Vec<u128>,
        data: &[u8],
    ) -> Result<BatchReceipt, ExchangeError> {
        let command = Command::decode(data)?;
        self.dispatch(BatchTransfer {
            sender,
            ids,
            amounts,
            command,
        })
    }

    /// Executes the command attached to an inbound batch transfer.
    ///
    /// The transferred units are taken into custody, priced and settled as
    /// one batch. Repeated ids are applied one after the other.
    ///
    /// # Errors
    ///
    /// - [`ExchangeError::MalformedPayload`] for an empty batch or arrays
    ///   of different lengths.
    /// - [`ExchangeError::InvalidRequest`] if the sender or a sell recipient
    ///   is the custody account.
    /// - [`ExchangeError::Expired`] past the command deadline.
    /// - Any pricing, share or ledger error of any leg.
    /// - [`ExchangeError::ReentrantCall`] while another batch is in flight.
    pub fn dispatch(&self, transfer: BatchTransfer) -> Result<BatchReceipt, ExchangeError> {
        let mut state = self.enter()?;
        let now = self.clock.now();
        check_shape(&transfer.ids, &transfer.amounts)?;
        self.check_counterparty(&transfer.sender, "sender")?;
        if let Command::SellAsset(cmd) = &transfer.command {
            self.check_counterparty(&cmd.recipient, "recipient")?;
        }
        check_deadline(transfer.command.deadline(), now)?;

        let plan = match &transfer.command {
            Command::AddLiquidity(cmd) => self.plan_add(&state, &transfer, cmd, now)?,
            Command::SellAsset(cmd) => self.plan_sell(&state, &transfer, cmd, now)?,
            Command::RemoveLiquidity(cmd) => self.plan_remove(&state, &transfer, cmd, now)?,
        };
        self.execute(&mut state, plan)
    }

    fn plan_add(
        &self,
        state: &ExchangeState,
        transfer: &BatchTransfer,
        cmd: &AddLiquidity,
        now: u64,
    ) -> Result<Plan, ExchangeError> {
        check_bounds(transfer.ids.len(), cmd.max_currency.len(), "max_currency")?;

        let mut batch = PoolBatch::new();
        let mut legs = Vec::with_capacity(transfer.ids.len());
        let mut total = Amount::ZERO;
        let entries = transfer.ids.iter().zip(&transfer.amounts).zip(&cmd.max_currency);
        for ((&asset_id, &amount), &max_currency) in entries {
            let asset_in = Amount::new(amount);
            let pool = batch.pool(&state.registry, asset_id);
            let quote = state
                .pricing
                .add(asset_id, &pool, asset_in, Amount::new(max_currency))?;
            batch.put(
                asset_id,
                pool.after_add(asset_in, quote.currency_in, quote.shares_minted)?,
            );
            total = total.safe_add(&quote.currency_in)?;
            legs.push(LegReceipt {
                asset_id,
                asset_amount: asset_in,
                currency_amount: quote.currency_in,
                shares: quote.shares_minted,
            });
        }

        let sender = transfer.sender.clone();
        let ops = vec![
            LedgerOp::Assets {
                from: sender.clone(),
                to: self.account.clone(),
                entries: legs.iter().map(|l| (l.asset_id, l.asset_amount)).collect(),
            },
            LedgerOp::Currency {
                from: sender.clone(),
                to: self.account.clone(),
                amount: total,
            },
            LedgerOp::MintShares {
                to: sender.clone(),
                entries: legs.iter().map(|l| (l.asset_id, l.shares)).collect(),
            },
        ];
        Ok(Plan {
            kind: BatchKind::AddLiquidity,
            recipient: sender.clone(),
            sender,
            batch,
            legs,
            total_currency: total,
            ops,
            executed_at: now,
        })
    }

    fn plan_sell(
        &self,
        state: &ExchangeState,
        transfer: &BatchTransfer,
        cmd: &SellAsset,
        now: u64,
    ) -> Result<Plan, ExchangeError> {
        let mut batch = PoolBatch::new();
        let mut legs = Vec::with_capacity(transfer.ids.len());
        let mut total = Amount::ZERO;
        for (&asset_id, &amount) in transfer.ids.iter().zip(&transfer.amounts) {
            let asset_in = Amount::new(amount);
            let pool = batch.pool(&state.registry, asset_id);
            let currency_out = state.pricing.sell(asset_id, &pool, asset_in)?;
            let next = pool.after_sell(asset_in, currency_out)?;
            batch.put_trade(asset_id, next, currency_out);
            total = total.safe_add(&currency_out)?;
            legs.push(LegReceipt {
                asset_id,
                asset_amount: asset_in,
                currency_amount: currency_out,
                shares: Amount::ZERO,
            });
        }

        if total.get() < cmd.min_currency {
            return Err(ExchangeError::SlippageExceeded {
                asset_id: None,
                required: total.get(),
                limit: cmd.min_currency,
            });
        }

        let ops = vec![
            LedgerOp::Assets {
                from: transfer.sender.clone(),
                to: self.account.clone(),
                entries: legs.iter().map(|l| (l.asset_id, l.asset_amount)).collect(),
            },
            LedgerOp::Currency {
                from: self.account.clone(),
                to: cmd.recipient.clone(),
                amount: total,
            },
        ];
        Ok(Plan {
            kind: BatchKind::SellAsset,
            sender: transfer.sender.clone(),
            recipient: cmd.recipient.clone(),
            batch,
            legs,
            total_currency: total,
            ops,
            executed_at: now,
        })
    }

    fn plan_remove(
        &self,
        state: &ExchangeState,
        transfer: &BatchTransfer,
        cmd: &RemoveLiquidity,
        now: u64,
    ) -> Result<Plan, ExchangeError> {
        check_bounds(transfer.ids.len(), cmd.min_currency.len(), "min_currency")?;
        check_bounds(transfer.ids.len(), cmd.min_asset.len(), "min_asset")?;

        let holder = &transfer.sender;
        let mut batch = PoolBatch::new();
        let mut legs = Vec::with_capacity(transfer.ids.len());
        let mut total = Amount::ZERO;
        let mut burned: BTreeMap<AssetId, Amount> = BTreeMap::new();
        let entries = transfer
            .ids
            .iter()
            .zip(&transfer.amounts)
            .zip(cmd.min_currency.iter().zip(&cmd.min_asset));
        for ((&asset_id, &amount), (&min_currency, &min_asset)) in entries {
            let shares = Amount::new(amount);
            let pool = batch.pool(&state.registry, asset_id);
            if pool.is_empty() {
                return Err(ExchangeError::InsufficientLiquidity(asset_id));
            }

            let cumulative = burned.entry(asset_id).or_default();
            *cumulative = cumulative.safe_add(&shares)?;
            let held = self.bridge.shares().balance_of(holder, asset_id);
            if *cumulative > held || shares > pool.total_shares() {
                return Err(ExchangeError::InsufficientShares {
                    holder: holder.clone(),
                    asset_id,
                });
            }

            let quote = state.pricing.remove(
                asset_id,
                &pool,
                shares,
                Amount::new(min_currency),
                Amount::new(min_asset),
            )?;
            batch.put(
                asset_id,
                pool.after_remove(quote.asset_out, quote.currency_out, shares)?,
            );
            total = total.safe_add(&quote.currency_out)?;
            legs.push(LegReceipt {
                asset_id,
                asset_amount: quote.asset_out,
                currency_amount: quote.currency_out,
                shares,
            });
        }

        let share_entries: Vec<_> = legs.iter().map(|l| (l.asset_id, l.shares)).collect();
        let ops = vec![
            LedgerOp::Shares {
                from: holder.clone(),
                to: self.account.clone(),
                entries: share_entries.clone(),
            },
            LedgerOp::BurnShares {
                from: self.account.clone(),
                entries: share_entries,
            },
            LedgerOp::Assets {
                from: self.account.clone(),
                to: holder.clone(),
                entries: legs.iter().map(|l| (l.asset_id, l.asset_amount)).collect(),
            },
            LedgerOp::Currency {
                from: self.account.clone(),
                to: holder.clone(),
                amount: total,
            },
        ];
        Ok(Plan {
            kind: BatchKind::RemoveLiquidity,
            sender: holder.clone(),
            recipient: holder.clone(),
            batch,
            legs,
            total_currency: total,
            ops,
            executed_at: now,
        })
    }

    // -- Direct buys --------------------------------------------------------

    /// Buys exact asset amounts for `buyer`, delivering them to the order's
    /// recipient.
    ///
    /// The summed currency cost of all legs is pulled from `buyer`. Buying
    /// zero units of an id costs nothing and leaves its pool untouched.
    ///
    /// # Errors
    ///
    /// - [`ExchangeError::MalformedPayload`] for an empty order or arrays
    ///   of different lengths.
    /// - [`ExchangeError::InvalidRequest`] if the buyer or recipient is the
    ///   custody account.
    /// - [`ExchangeError::Expired`] past the order deadline.
    /// - [`ExchangeError::InsufficientLiquidity`] if a leg would drain its
    ///   pool.
    /// - [`ExchangeError::SlippageExceeded`] if the total cost exceeds
    ///   `max_currency`.
    /// - [`ExchangeError::InsufficientBalance`] if settlement fails.
    pub fn buy_asset(
        &self,
        buyer: &AccountId,
        order: BuyOrder,
    ) -> Result<BatchReceipt, ExchangeError> {
        let mut state = self.enter()?;
        let now = self.clock.now();
        check_shape(&order.ids, &order.amounts_out)?;
        self.check_counterparty(buyer, "buyer")?;
        self.check_counterparty(&order.recipient, "recipient")?;
        check_deadline(order.deadline, now)?;

        let mut batch = PoolBatch::new();
        let mut legs = Vec::with_capacity(order.ids.len());
        let mut total = Amount::ZERO;
        for (&asset_id, &amount) in order.ids.iter().zip(&order.amounts_out) {
            let asset_out = Amount::new(amount);
            let pool = batch.pool(&state.registry, asset_id);
            let currency_in = state.pricing.buy(asset_id, &pool, asset_out)?;
            if !asset_out.is_zero() {
                let next = pool.after_buy(asset_out, currency_in)?;
                batch.put_trade(asset_id, next, currency_in);
            }
            total = total.safe_add(&currency_in)?;
            legs.push(LegReceipt {
                asset_id,
                asset_amount: asset_out,
                currency_amount: currency_in,
                shares: Amount::ZERO,
            });
        }

        if total.get() > order.max_currency {
            return Err(ExchangeError::SlippageExceeded {
                asset_id: None,
                required: total.get(),
                limit: order.max_currency,
            });
        }

        let ops = vec![
            LedgerOp::Currency {
                from: buyer.clone(),
                to: self.account.clone(),
                amount: total,
            },
            LedgerOp::Assets {
                from: self.account.clone(),
                to: order.recipient.clone(),
                entries: legs.iter().map(|l| (l.asset_id, l.asset_amount)).collect(),
            },
        ];
        let plan = Plan {
            kind: BatchKind::Buy,
            sender: buyer.clone(),
            recipient: order.recipient,
            batch,
            legs,
            total_currency: total,
            ops,
            executed_at: now,
        };
        self.execute(&mut state, plan)
    }

    fn execute(
        &self,
        state: &mut ExchangeState,
        plan: Plan,
    ) -> Result<BatchReceipt, ExchangeError> {
        tracing::debug!(
            kind = plan.kind.as_str(),
            legs = plan.legs.len(),
            total_currency = %plan.total_currency,
            "batch priced, settling"
        );
        self.bridge.settle(plan.ops)?;

        let committed_at = Utc::now();
        let closed_pools = state.registry.commit(plan.batch, committed_at);
        let receipt = BatchReceipt {
            batch_id: Uuid::new_v4(),
            kind: plan.kind,
            sender: plan.sender,
            recipient: plan.recipient,
            legs: plan.legs,
            total_currency: plan.total_currency,
            closed_pools,
            executed_at: plan.executed_at,
            committed_at,
        };
        tracing::info!(
            batch_id = %receipt.batch_id,
            kind = receipt.kind.as_str(),
            sender = %receipt.sender,
            legs = receipt.legs.len(),
            total_currency = %receipt.total_currency,
            closed_pools = receipt.closed_pools.len(),
            "batch committed"
        );
        Ok(receipt)
    }

    // -- Quotes -------------------------------------------------------------

    /// Currency each leg of a buy would cost right now.
    ///
    /// Repeated ids are priced cumulatively. Nothing is mutated.
    ///
    /// # Errors
    ///
    /// Same validation and pricing errors as [`Exchange::buy_asset`].
    pub fn quote_buy(
        &self,
        ids: &[AssetId],
        amounts_out: &[u128],
    ) -> Result<Vec<Amount>, ExchangeError> {
        let state = self.enter()?;
        check_shape(ids, amounts_out)?;
        let mut batch = PoolBatch::new();
        ids.iter()
            .zip(amounts_out)
            .map(|(&asset_id, &amount)| {
                let asset_out = Amount::new(amount);
                let pool = batch.pool(&state.registry, asset_id);
                let cost = state.pricing.buy(asset_id, &pool, asset_out)?;
                batch.put(asset_id, pool.after_buy(asset_out, cost)?);
                Ok(cost)
            })
            .collect()
    }

    /// Currency each leg of a sell would pay out right now.
    ///
    /// Repeated ids are priced cumulatively. Nothing is mutated.
    ///
    /// # Errors
    ///
    /// Same validation and pricing errors as a sell command.
    pub fn quote_sell(
        &self,
        ids: &[AssetId],
        amounts_in: &[u128],
    ) -> Result<Vec<Amount>, ExchangeError> {
        let state = self.enter()?;
        check_shape(ids, amounts_in)?;
        let mut batch = PoolBatch::new();
        ids.iter()
            .zip(amounts_in)
            .map(|(&asset_id, &amount)| {
                let asset_in = Amount::new(amount);
                let pool = batch.pool(&state.registry, asset_id);
                let payout = state.pricing.sell(asset_id, &pool, asset_in)?;
                batch.put(asset_id, pool.after_sell(asset_in, payout)?);
                Ok(payout)
            })
            .collect()
    }

    // -- Views --------------------------------------------------------------

    /// Committed entry of a live pool.
    ///
    /// # Errors
    ///
    /// Returns [`ExchangeError::ReentrantCall`] while a batch is in flight.
    pub fn pool(&self, asset_id: AssetId) -> Result<Option<PoolEntry>, ExchangeError> {
        Ok(self.enter()?.registry.get(asset_id).cloned())
    }

    /// Summaries of every live pool in asset id order.
    ///
    /// # Errors
    ///
    /// Returns [`ExchangeError::ReentrantCall`] while a batch is in flight.
    pub fn pools(&self) -> Result<Vec<PoolSummary>, ExchangeError> {
        Ok(self.enter()?.registry.list())
    }

    /// Committed entries of every live pool.
    ///
    /// # Errors
    ///
    /// Returns [`ExchangeError::ReentrantCall`] while a batch is in flight.
    pub fn entries(&self) -> Result<Vec<PoolEntry>, ExchangeError> {
        Ok(self.enter()?.registry.entries())
    }

    /// Currency reserve per id; zero for ids without a pool.
    ///
    /// # Errors
    ///
    /// Returns [`ExchangeError::ReentrantCall`] while a batch is in flight.
    pub fn currency_reserves(&self, ids: &[AssetId]) -> Result<Vec<Amount>, ExchangeError> {
        let state = self.enter()?;
        Ok(ids
            .iter()
            .map(|&id| state.registry.pool(id).currency_reserve())
            .collect())
    }

    /// Outstanding LP shares of a pool; zero if it does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`ExchangeError::ReentrantCall`] while a batch is in flight.
    pub fn total_shares(&self, asset_id: AssetId) -> Result<Amount, ExchangeError> {
        Ok(self.enter()?.registry.pool(asset_id).total_shares())
    }

    /// LP shares of `asset_id` held by `holder`.
    #[must_use]
    pub fn share_balance(&self, holder: &AccountId, asset_id: AssetId) -> Amount {
        self.bridge.shares().balance_of(holder, asset_id)
    }

    /// Moves LP shares between holders.
    ///
    /// # Errors
    ///
    /// - [`ExchangeError::InsufficientShares`] if `from` holds too few.
    /// - [`ExchangeError::ReentrantCall`] while a batch is in flight.
    pub fn transfer_shares(
        &self,
        from: &AccountId,
        to: &AccountId,
        asset_id: AssetId,
        amount: Amount,
    ) -> Result<(), ExchangeError> {
        let _state = self.enter()?;
        if self.share_balance(from, asset_id) < amount {
            return Err(ExchangeError::InsufficientShares {
                holder: from.clone(),
                asset_id,
            });
        }
        self.bridge.settle(vec![LedgerOp::Shares {
            from: from.clone(),
            to: to.clone(),
            entries: vec![(asset_id, amount)],
        }])?;
        tracing::info!(%from, %to, %asset_id, %amount, "shares transferred");
        Ok(())
    }

    // -- Configuration ------------------------------------------------------

    /// Current trading fee.
    ///
    /// # Errors
    ///
    /// Returns [`ExchangeError::ReentrantCall`] while a batch is in flight.
    pub fn fee(&self) -> Result<FeeTier, ExchangeError> {
        Ok(self.enter()?.pricing.fee())
    }

    /// Replaces the trading fee, returning the previous one.
    ///
    /// # Errors
    ///
    /// - [`ExchangeError::InvalidRequest`] if `admin` belongs to another
    ///   exchange or `fee` is 100% or more.
    /// - [`ExchangeError::ReentrantCall`] while a batch is in flight.
    pub fn set_fee(
        &self,
        admin: &AdminCapability,
        fee: FeeTier,
    ) -> Result<FeeTier, ExchangeError> {
        if !admin.authorises(self.id) {
            return Err(ExchangeError::InvalidRequest(
                "admin capability belongs to a different exchange".to_string(),
            ));
        }
        let mut state = self.enter()?;
        let previous = state.pricing.fee();
        state.pricing = PricingEngine::new(fee)?;
        tracing::info!(
            old_fee_bps = previous.basis_points().get(),
            new_fee_bps = fee.basis_points().get(),
            "trading fee updated"
        );
        Ok(previous)
    }
}

fn check_shape(ids: &[AssetId], amounts: &[u128]) -> Result<(), ExchangeError> {
    if ids.is_empty() {
        return Err(ExchangeError::MalformedPayload("empty batch".to_string()));
    }
    if ids.len() != amounts.len() {
        return Err(ExchangeError::MalformedPayload(format!(
            "{} ids but {} amounts",
            ids.len(),
            amounts.len()
        )));
    }
    Ok(())
}

fn check_bounds(expected: usize, actual: usize, name: &str) -> Result<(), ExchangeError> {
    if expected != actual {
        return Err(ExchangeError::MalformedPayload(format!(
            "{expected} ids but {actual} {name} bounds"
        )));
    }
    Ok(())
}

fn check_deadline(deadline: u64, now: u64) -> Result<(), ExchangeError> {
    if now > deadline {
        return Err(ExchangeError::Expired { deadline, now });
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::{OnceLock, Weak};

    use hydra_amm::domain::BasisPoints;

    use super::*;
    use crate::engine::test_support::{acct, ex, harness, harness_with_fee, DEADLINE, NOW};
    use crate::engine::ManualClock;
    use crate::ledger::{CurrencyBook, CurrencyLedger, MultiTokenBook, MultiTokenLedger};
    use crate::domain::Pool;

    #[test]
    fn first_deposit_sets_reserves_and_mints_currency_scale_shares() {
        let h = harness();
        h.fund("lp", 1_000, &[(1, 100)]);

        let Ok(receipt) = h.add("lp", &[(1, 100, 250)]) else {
            panic!("add failed");
        };
        assert_eq!(receipt.kind, BatchKind::AddLiquidity);
        assert_eq!(receipt.total_currency, Amount::new(250));
        assert_eq!(h.pool(1), Pool::new(Amount::new(250), Amount::new(100), Amount::new(250)));
        assert_eq!(h.shares_of("lp", 1), 250);
        assert_eq!(h.currency_of("lp"), 750);
        assert_eq!(h.currency_of("exchange"), 250);
        h.assert_books_balanced(1);
    }

    #[test]
    fn buying_half_the_pool_costs_exactly_the_currency_reserve() {
        let h = harness();
        h.seed_pool("lp", 1, 100, 100);
        h.fund("alice", 500, &[]);

        let Ok(receipt) = h.buy("alice", "bob", &[(1, 50)], 100) else {
            panic!("buy failed");
        };
        assert_eq!(receipt.total_currency, Amount::new(100));
        assert_eq!(h.pool(1), Pool::new(Amount::new(200), Amount::new(50), Amount::new(100)));
        assert_eq!(h.currency_of("alice"), 400);
        assert_eq!(h.asset_of("bob", 1), 50);
        assert_eq!(h.asset_of("alice", 1), 0);
        h.assert_books_balanced(1);
    }

    #[test]
    fn selling_rounds_down_in_favour_of_the_pool() {
        let h = harness();
        h.seed_pool("lp", 1, 100, 100);
        h.fund("alice", 0, &[(1, 50)]);

        let Ok(receipt) = h.sell("alice", "carol", &[(1, 50)], 33) else {
            panic!("sell failed");
        };
        assert_eq!(receipt.total_currency, Amount::new(33));
        assert_eq!(h.pool(1), Pool::new(Amount::new(67), Amount::new(150), Amount::new(100)));
        assert_eq!(h.currency_of("carol"), 33);
        assert_eq!(h.asset_of("alice", 1), 0);
        h.assert_books_balanced(1);
    }

    #[test]
    fn sell_below_batch_minimum_is_slippage() {
        let h = harness();
        h.seed_pool("lp", 1, 100, 100);
        h.fund("alice", 0, &[(1, 50)]);

        let result = h.sell("alice", "alice", &[(1, 50)], 34);
        assert!(matches!(
            result,
            Err(ExchangeError::SlippageExceeded { asset_id: None, required: 33, limit: 34 })
        ));
        assert_eq!(h.asset_of("alice", 1), 50);
        assert_eq!(h.pool(1), Pool::new(Amount::new(100), Amount::new(100), Amount::new(100)));
    }

    #[test]
    fn repeated_ids_are_priced_sequentially() {
        let h = harness();
        h.seed_pool("lp", 1, 100, 100);
        h.fund("alice", 0, &[(1, 50)]);

        let Ok(receipt) = h.sell("alice", "alice", &[(1, 25), (1, 25)], 0) else {
            panic!("sell failed");
        };
        // 100*25/125 = 20, then 80*25/150 = 13.3
        let paid: Vec<u128> = receipt.legs.iter().map(|l| l.currency_amount.get()).collect();
        assert_eq!(paid, vec![20, 13]);
        assert_eq!(h.pool(1), Pool::new(Amount::new(67), Amount::new(150), Amount::new(100)));

        let Some(entry) = h.exchange.pool(AssetId::new(1)).unwrap_or_default() else {
            panic!("pool missing");
        };
        assert_eq!(entry.trade_count, 2);
    }

    #[test]
    fn redeeming_every_share_returns_the_reserves_and_closes_the_pool() {
        let h = harness();
        h.seed_pool("lp", 1, 100, 100);
        h.fund("alice", 100, &[]);
        let Ok(_) = h.buy("alice", "alice", &[(1, 50)], 100) else {
            panic!("buy failed");
        };

        let Ok(receipt) = h.remove("lp", &[(1, 100, 200, 50)]) else {
            panic!("remove failed");
        };
        assert_eq!(receipt.closed_pools, vec![AssetId::new(1)]);
        assert_eq!(h.pool(1), Pool::EMPTY);
        assert_eq!(h.currency_of("lp"), 200);
        assert_eq!(h.asset_of("lp", 1), 50);
        assert_eq!(h.shares_of("lp", 1), 0);
        assert_eq!(h.currency_of("exchange"), 0);
        assert!(h.exchange.pools().unwrap_or_default().is_empty());
        h.assert_books_balanced(1);
    }

    #[test]
    fn closed_pool_can_be_reopened_at_a_new_price() {
        let h = harness();
        h.seed_pool("lp", 1, 100, 100);
        let Ok(_) = h.remove("lp", &[(1, 100, 0, 0)]) else {
            panic!("remove failed");
        };
        let Ok(_) = h.add("lp", &[(1, 10, 40)]) else {
            panic!("reopen failed");
        };
        assert_eq!(h.pool(1), Pool::new(Amount::new(40), Amount::new(10), Amount::new(40)));
    }

    #[test]
    fn proportional_deposit_follows_the_reserve_ratio() {
        let h = harness();
        h.seed_pool("lp", 1, 200, 100);
        h.fund("lp2", 1_000, &[(1, 10)]);

        let Ok(receipt) = h.add("lp2", &[(1, 10, 1_000)]) else {
            panic!("add failed");
        };
        let [leg] = receipt.legs.as_slice() else {
            panic!("expected one leg");
        };
        assert_eq!(leg.currency_amount, Amount::new(20));
        assert_eq!(leg.shares, Amount::new(20));
        assert_eq!(h.currency_of("lp2"), 980);
        h.assert_books_balanced(1);
    }

    #[test]
    fn add_then_remove_returns_the_contribution() {
        let h = harness();
        h.seed_pool("lp", 1, 300, 200);
        h.fund("lp2", 1_000, &[(1, 7)]);

        let Ok(added) = h.add("lp2", &[(1, 7, 1_000)]) else {
            panic!("add failed");
        };
        let minted = added.legs.first().map(|l| l.shares.get()).unwrap_or_default();
        let Ok(removed) = h.remove("lp2", &[(1, minted, 0, 0)]) else {
            panic!("remove failed");
        };
        let (Some(a), Some(r)) = (added.legs.first(), removed.legs.first()) else {
            panic!("missing legs");
        };
        assert!(r.currency_amount <= a.currency_amount);
        assert!(r.asset_amount <= a.asset_amount);
        assert!(a.currency_amount.get() - r.currency_amount.get() <= 1);
        assert!(a.asset_amount.get() - r.asset_amount.get() <= 1);
        h.assert_books_balanced(1);
    }

    #[test]
    fn one_bad_leg_aborts_the_whole_batch() {
        let h = harness();
        h.seed_pool("lp", 1, 100, 100);
        h.seed_pool("lp", 2, 100, 100);
        h.fund("lp2", 1_000, &[(1, 10), (2, 10)]);

        // pool 2 needs 10 currency but only 9 is allowed
        let result = h.add("lp2", &[(1, 10, 10), (2, 10, 9)]);
        assert!(matches!(
            result,
            Err(ExchangeError::SlippageExceeded { asset_id: Some(id), .. }) if id == AssetId::new(2)
        ));
        assert_eq!(h.pool(1), Pool::new(Amount::new(100), Amount::new(100), Amount::new(100)));
        assert_eq!(h.asset_of("lp2", 1), 10);
        assert_eq!(h.currency_of("lp2"), 1_000);
        assert_eq!(h.shares_of("lp2", 1), 0);
    }

    #[test]
    fn failed_settlement_leaves_pools_and_ledgers_untouched() {
        let h = harness();
        h.seed_pool("lp", 1, 100, 100);
        h.fund("alice", 99, &[]);

        let result = h.buy("alice", "alice", &[(1, 50)], 100);
        assert!(matches!(result, Err(ExchangeError::InsufficientBalance(_))));
        assert_eq!(h.pool(1), Pool::new(Amount::new(100), Amount::new(100), Amount::new(100)));
        assert_eq!(h.currency_of("alice"), 99);
        assert_eq!(h.asset_of("exchange", 1), 100);
    }

    #[test]
    fn add_without_asset_balance_mints_nothing() {
        let h = harness();
        h.fund("lp", 1_000, &[]);
        let result = h.add("lp", &[(1, 10, 100)]);
        assert!(matches!(result, Err(ExchangeError::InsufficientBalance(_))));
        assert_eq!(h.shares_of("lp", 1), 0);
        assert!(h.exchange.pools().unwrap_or_default().is_empty());
    }

    #[test]
    fn buying_the_entire_reserve_is_insufficient_liquidity() {
        let h = harness();
        h.seed_pool("lp", 1, 100, 100);
        h.fund("alice", 1_000_000, &[]);
        let result = h.buy("alice", "alice", &[(1, 100)], u128::MAX);
        assert!(matches!(result, Err(ExchangeError::InsufficientLiquidity(_))));
    }

    #[test]
    fn buying_zero_is_a_free_no_op() {
        let h = harness();
        h.seed_pool("lp", 1, 100, 100);

        let Ok(receipt) = h.buy("nobody", "nobody", &[(1, 0)], 0) else {
            panic!("zero buy failed");
        };
        assert!(receipt.total_currency.is_zero());
        assert_eq!(h.pool(1), Pool::new(Amount::new(100), Amount::new(100), Amount::new(100)));
    }

    #[test]
    fn buy_over_budget_is_slippage() {
        let h = harness();
        h.seed_pool("lp", 1, 100, 100);
        h.fund("alice", 1_000, &[]);
        let result = h.buy("alice", "alice", &[(1, 50)], 99);
        assert!(matches!(
            result,
            Err(ExchangeError::SlippageExceeded { required: 100, limit: 99, .. })
        ));
        assert_eq!(h.currency_of("alice"), 1_000);
    }

    #[test]
    fn custody_account_cannot_trade_against_its_own_pools() {
        let h = harness();
        h.seed_pool("lp", 1, 100, 100);
        h.fund("alice", 1_000, &[(1, 10)]);

        let sell = h.sell("exchange", "thief", &[(1, 50)], 0);
        assert!(matches!(sell, Err(ExchangeError::InvalidRequest(_))));
        let add = h.add("exchange", &[(1, 50, 50)]);
        assert!(matches!(add, Err(ExchangeError::InvalidRequest(_))));
        let buy = h.buy("exchange", "thief", &[(1, 10)], 100);
        assert!(matches!(buy, Err(ExchangeError::InvalidRequest(_))));
        let buy_into_custody = h.buy("alice", "exchange", &[(1, 10)], 100);
        assert!(matches!(buy_into_custody, Err(ExchangeError::InvalidRequest(_))));
        let sell_into_custody = h.sell("alice", "exchange", &[(1, 10)], 0);
        assert!(matches!(sell_into_custody, Err(ExchangeError::InvalidRequest(_))));

        assert_eq!(h.currency_of("thief"), 0);
        assert_eq!(h.currency_of("alice"), 1_000);
        assert_eq!(h.pool(1), Pool::new(Amount::new(100), Amount::new(100), Amount::new(100)));
        h.assert_books_balanced(1);

        let Ok(_) = h.remove("lp", &[(1, 100, 100, 100)]) else {
            panic!("lp withdrawal failed");
        };
        assert_eq!(h.asset_of("lp", 1), 100);
    }

    #[test]
    fn sell_into_missing_pool_is_insufficient_liquidity() {
        let h = harness();
        h.fund("alice", 0, &[(5, 10)]);
        let result = h.sell("alice", "alice", &[(5, 10)], 0);
        assert!(matches!(
            result,
            Err(ExchangeError::InsufficientLiquidity(id)) if id == AssetId::new(5)
        ));
    }

    #[test]
    fn removing_more_shares_than_held_is_insufficient_shares() {
        let h = harness();
        h.seed_pool("lp", 1, 100, 100);
        h.seed_pool("lp2", 2, 100, 100);
        let transfer =
            h.exchange
                .transfer_shares(&acct("lp"), &acct("lp2"), AssetId::new(1), Amount::new(40));
        let Ok(()) = transfer else {
            panic!("share transfer failed");
        };

        let result = h.remove("lp2", &[(1, 30, 0, 0), (1, 30, 0, 0)]);
        assert!(matches!(
            result,
            Err(ExchangeError::InsufficientShares { ref holder, asset_id })
                if *holder == acct("lp2") && asset_id == AssetId::new(1)
        ));
        assert_eq!(h.shares_of("lp2", 1), 40);
        h.assert_books_balanced(1);
    }

    #[test]
    fn transferred_shares_are_redeemable_by_the_new_holder() {
        let h = harness();
        h.seed_pool("lp", 1, 100, 100);
        let transfer =
            h.exchange
                .transfer_shares(&acct("lp"), &acct("heir"), AssetId::new(1), Amount::new(25));
        let Ok(()) = transfer else {
            panic!("share transfer failed");
        };
        let Ok(receipt) = h.remove("heir", &[(1, 25, 25, 25)]) else {
            panic!("remove failed");
        };
        assert_eq!(receipt.total_currency, Amount::new(25));
        assert_eq!(h.asset_of("heir", 1), 25);
        h.assert_books_balanced(1);
    }

    #[test]
    fn share_transfer_beyond_balance_is_rejected() {
        let h = harness();
        h.seed_pool("lp", 1, 100, 100);
        let result =
            h.exchange
                .transfer_shares(&acct("lp"), &acct("x"), AssetId::new(1), Amount::new(101));
        assert!(matches!(result, Err(ExchangeError::InsufficientShares { .. })));
    }

    #[test]
    fn remove_on_empty_pool_is_insufficient_liquidity() {
        let h = harness();
        let result = h.remove("lp", &[(1, 1, 0, 0)]);
        assert!(matches!(result, Err(ExchangeError::InsufficientLiquidity(_))));
    }

    #[test]
    fn expired_deadline_is_rejected_but_equal_deadline_is_not() {
        let h = harness();
        h.seed_pool("lp", 1, 100, 100);
        h.fund("alice", 1_000, &[]);

        h.clock.set(DEADLINE);
        assert!(h.buy("alice", "alice", &[(1, 1)], 10).is_ok());

        h.clock.set(DEADLINE + 1);
        let result = h.buy("alice", "alice", &[(1, 1)], 10);
        assert!(matches!(
            result,
            Err(ExchangeError::Expired { deadline: DEADLINE, now }) if now == DEADLINE + 1
        ));
    }

    #[test]
    fn mismatched_arrays_are_malformed() {
        let h = harness();
        let result = h.exchange.dispatch(BatchTransfer {
            sender: acct("lp"),
            ids: vec![AssetId::new(1), AssetId::new(2)],
            amounts: vec![10, 10],
            command: Command::AddLiquidity(AddLiquidity {
                max_currency: vec![10],
                deadline: DEADLINE,
            }),
        });
        assert!(matches!(result, Err(ExchangeError::MalformedPayload(_))));

        let result = h.exchange.quote_buy(&[AssetId::new(1)], &[]);
        assert!(matches!(result, Err(ExchangeError::MalformedPayload(_))));

        let result = h.exchange.quote_sell(&[], &[]);
        assert!(matches!(result, Err(ExchangeError::MalformedPayload(_))));
    }

    #[test]
    fn encoded_commands_are_dispatched() {
        let h = harness();
        h.seed_pool("lp", 1, 100, 100);
        h.fund("alice", 0, &[(1, 50)]);

        let data = Command::SellAsset(SellAsset {
            recipient: acct("alice"),
            min_currency: 30,
            deadline: NOW,
        })
        .encode()
        .unwrap_or_default();
        let Ok(receipt) = h
            .exchange
            .on_batch_received(acct("alice"), vec![AssetId::new(1)], vec![50], &data)
        else {
            panic!("encoded sell failed");
        };
        assert_eq!(receipt.kind, BatchKind::SellAsset);
        assert_eq!(h.currency_of("alice"), 33);
    }

    #[test]
    fn unknown_selector_is_invalid_command() {
        let h = harness();
        let data = [0xde, 0xad, 0xbe, 0xef, 0, 0, 0, 0, 0, 0, 0, 0];
        let result = h
            .exchange
            .on_batch_received(acct("a"), vec![AssetId::new(1)], vec![1], &data);
        assert!(matches!(result, Err(ExchangeError::InvalidCommand(0xdead_beef))));
    }

    #[test]
    fn quotes_match_execution_and_mutate_nothing() {
        let h = harness();
        h.seed_pool("lp", 1, 100, 100);
        h.fund("alice", 1_000, &[(1, 50)]);

        let Ok(costs) = h.exchange.quote_buy(&[AssetId::new(1), AssetId::new(1)], &[25, 25]) else {
            panic!("quote failed");
        };
        // 100*25/75 = 33.3 -> 34, then 134*25/50 = 67
        assert_eq!(costs, vec![Amount::new(34), Amount::new(67)]);
        let Ok(payouts) = h.exchange.quote_sell(&[AssetId::new(1)], &[50]) else {
            panic!("quote failed");
        };
        assert_eq!(payouts, vec![Amount::new(33)]);
        assert_eq!(h.pool(1), Pool::new(Amount::new(100), Amount::new(100), Amount::new(100)));

        let Ok(receipt) = h.buy("alice", "alice", &[(1, 25), (1, 25)], 101) else {
            panic!("buy failed");
        };
        assert_eq!(receipt.total_currency, Amount::new(101));
    }

    #[test]
    fn reserve_and_supply_views() {
        let h = harness();
        h.seed_pool("lp", 1, 100, 100);
        h.seed_pool("lp", 3, 70, 10);

        let Ok(reserves) = h
            .exchange
            .currency_reserves(&[AssetId::new(1), AssetId::new(2), AssetId::new(3)])
        else {
            panic!("reserves view failed");
        };
        assert_eq!(reserves, vec![Amount::new(100), Amount::ZERO, Amount::new(70)]);
        assert_eq!(h.exchange.total_shares(AssetId::new(3)).ok(), Some(Amount::new(70)));
        assert_eq!(h.exchange.share_balance(&acct("lp"), AssetId::new(3)), Amount::new(70));
        assert_eq!(h.exchange.pools().unwrap_or_default().len(), 2);
        assert_eq!(h.currency_of("exchange"), 170);
    }

    #[test]
    fn fee_is_changed_only_with_own_capability() {
        let h = harness();
        let other = harness();
        let fee = FeeTier::new(BasisPoints::new(30));

        let result = h.exchange.set_fee(&other.admin, fee);
        assert!(matches!(result, Err(ExchangeError::InvalidRequest(_))));

        let Ok(previous) = h.exchange.set_fee(&h.admin, fee) else {
            panic!("set_fee failed");
        };
        assert_eq!(previous.basis_points().get(), 0);
        assert_eq!(h.exchange.fee().ok(), Some(fee));

        let result = h.exchange.set_fee(&h.admin, FeeTier::new(BasisPoints::new(10_000)));
        assert!(matches!(result, Err(ExchangeError::InvalidRequest(_))));
    }

    #[test]
    fn fees_stay_in_the_pool() {
        let h = harness_with_fee(100);
        h.seed_pool("lp", 1, 10_000, 10_000);
        h.fund("alice", 0, &[(1, 1_000)]);

        let Ok(receipt) = h.sell("alice", "alice", &[(1, 1_000)], 0) else {
            panic!("sell failed");
        };
        // fee-free would pay 909
        assert!(receipt.total_currency < Amount::new(909));

        let Ok(removed) = h.remove("lp", &[(1, 10_000, 0, 0)]) else {
            panic!("remove failed");
        };
        assert_eq!(
            removed.total_currency.get(),
            10_000 - receipt.total_currency.get()
        );
    }

    /// Currency ledger that calls back into the exchange mid-settlement.
    #[derive(Debug, Default)]
    struct CallbackCurrency {
        inner: CurrencyBook,
        exchange: OnceLock<Weak<Exchange>>,
        rejected: AtomicBool,
    }

    impl CurrencyLedger for CallbackCurrency {
        fn balance_of(&self, holder: &AccountId) -> Amount {
            self.inner.balance_of(holder)
        }

        fn transfer(
            &self,
            from: &AccountId,
            to: &AccountId,
            amount: Amount,
        ) -> Result<(), ExchangeError> {
            if let Some(exchange) = self.exchange.get().and_then(Weak::upgrade) {
                let nested = exchange.buy_asset(
                    from,
                    BuyOrder {
                        ids: vec![AssetId::new(1)],
                        amounts_out: vec![1],
                        max_currency: u128::MAX,
                        deadline: u64::MAX,
                        recipient: from.clone(),
                    },
                );
                if matches!(nested, Err(ExchangeError::ReentrantCall)) {
                    self.rejected.store(true, Ordering::SeqCst);
                }
            }
            self.inner.transfer(from, to, amount)
        }
    }

    #[test]
    fn calls_from_inside_a_batch_are_rejected_as_reentrant() {
        let currency = Arc::new(CallbackCurrency::default());
        let assets = Arc::new(MultiTokenBook::new());
        let shares = Arc::new(MultiTokenBook::new());
        let bridge = LedgerBridge::new(
            Arc::clone(&currency) as Arc<dyn CurrencyLedger>,
            Arc::clone(&assets) as Arc<dyn MultiTokenLedger>,
            Arc::clone(&shares) as Arc<dyn MultiTokenLedger>,
        );
        let clock = Arc::new(ManualClock::new(NOW));
        let Ok((exchange, _admin)) = Exchange::new(
            ex(),
            bridge,
            clock as Arc<dyn Clock>,
            FeeTier::new(BasisPoints::new(0)),
        ) else {
            panic!("exchange");
        };
        let exchange = Arc::new(exchange);
        let _ = currency.exchange.set(Arc::downgrade(&exchange));

        let lp = acct("lp");
        let (Ok(()), Ok(())) = (
            currency.inner.mint(&lp, Amount::new(1_000)),
            assets.mint(&lp, AssetId::new(1), Amount::new(100)),
        ) else {
            panic!("seeding failed");
        };

        let result = exchange.dispatch(BatchTransfer {
            sender: lp.clone(),
            ids: vec![AssetId::new(1)],
            amounts: vec![100],
            command: Command::AddLiquidity(AddLiquidity {
                max_currency: vec![100],
                deadline: DEADLINE,
            }),
        });

        assert!(result.is_ok());
        assert!(currency.rejected.load(Ordering::SeqCst));
        let Ok(Some(entry)) = exchange.pool(AssetId::new(1)) else {
            panic!("pool missing");
        };
        assert_eq!(entry.pool, Pool::new(Amount::new(100), Amount::new(100), Amount::new(100)));
        assert_eq!(shares.balance_of(&lp, AssetId::new(1)), Amount::new(100));
    }
}
