//! Shared fixtures for engine tests.

use std::sync::Arc;

use hydra_amm::domain::{Amount, BasisPoints, FeeTier};

use super::{AdminCapability, BatchReceipt, Clock, Exchange, ManualClock};
use crate::domain::{
    AccountId, AddLiquidity, AssetId, BatchTransfer, BuyOrder, Command, Pool, RemoveLiquidity,
    SellAsset,
};
use crate::error::ExchangeError;
use crate::ledger::{CurrencyBook, CurrencyLedger, LedgerBridge, MultiTokenBook, MultiTokenLedger};

pub(crate) const NOW: u64 = 1_000;
pub(crate) const DEADLINE: u64 = NOW + 60;

pub(crate) fn acct(name: &str) -> AccountId {
    AccountId::new(name)
}

pub(crate) fn ex() -> AccountId {
    acct("exchange")
}

pub(crate) struct Harness {
    pub exchange: Arc<Exchange>,
    pub admin: AdminCapability,
    pub clock: Arc<ManualClock>,
    pub currency: Arc<CurrencyBook>,
    pub assets: Arc<MultiTokenBook>,
    pub shares: Arc<MultiTokenBook>,
}

pub(crate) fn harness() -> Harness {
    harness_with_fee(0)
}

#[allow(clippy::panic)]
pub(crate) fn harness_with_fee(bps: u32) -> Harness {
    let currency = Arc::new(CurrencyBook::new());
    let assets = Arc::new(MultiTokenBook::new());
    let shares = Arc::new(MultiTokenBook::new());
    let clock = Arc::new(ManualClock::new(NOW));
    let bridge = LedgerBridge::new(
        Arc::clone(&currency) as Arc<dyn CurrencyLedger>,
        Arc::clone(&assets) as Arc<dyn MultiTokenLedger>,
        Arc::clone(&shares) as Arc<dyn MultiTokenLedger>,
    );
    let Ok((exchange, admin)) = Exchange::new(
        ex(),
        bridge,
        Arc::clone(&clock) as Arc<dyn Clock>,
        FeeTier::new(BasisPoints::new(bps)),
    ) else {
        panic!("valid exchange");
    };
    Harness {
        exchange: Arc::new(exchange),
        admin,
        clock,
        currency,
        assets,
        shares,
    }
}

#[allow(clippy::panic)]
impl Harness {
    pub(crate) fn fund(&self, who: &str, currency: u128, assets: &[(u64, u128)]) {
        let Ok(()) = self.currency.mint(&acct(who), Amount::new(currency)) else {
            panic!("currency mint failed");
        };
        for &(id, amount) in assets {
            let Ok(()) = self.assets.mint(&acct(who), AssetId::new(id), Amount::new(amount)) else {
                panic!("asset mint failed");
            };
        }
    }

    /// Legs are `(id, asset_amount, max_currency)`.
    pub(crate) fn add(
        &self,
        who: &str,
        legs: &[(u64, u128, u128)],
    ) -> Result<BatchReceipt, ExchangeError> {
        self.exchange.dispatch(BatchTransfer {
            sender: acct(who),
            ids: legs.iter().map(|l| AssetId::new(l.0)).collect(),
            amounts: legs.iter().map(|l| l.1).collect(),
            command: Command::AddLiquidity(AddLiquidity {
                max_currency: legs.iter().map(|l| l.2).collect(),
                deadline: DEADLINE,
            }),
        })
    }

    pub(crate) fn sell(
        &self,
        who: &str,
        recipient: &str,
        legs: &[(u64, u128)],
        min_currency: u128,
    ) -> Result<BatchReceipt, ExchangeError> {
        self.exchange.dispatch(BatchTransfer {
            sender: acct(who),
            ids: legs.iter().map(|l| AssetId::new(l.0)).collect(),
            amounts: legs.iter().map(|l| l.1).collect(),
            command: Command::SellAsset(SellAsset {
                recipient: acct(recipient),
                min_currency,
                deadline: DEADLINE,
            }),
        })
    }

    /// Legs are `(id, shares, min_currency, min_asset)`.
    pub(crate) fn remove(
        &self,
        who: &str,
        legs: &[(u64, u128, u128, u128)],
    ) -> Result<BatchReceipt, ExchangeError> {
        self.exchange.dispatch(BatchTransfer {
            sender: acct(who),
            ids: legs.iter().map(|l| AssetId::new(l.0)).collect(),
            amounts: legs.iter().map(|l| l.1).collect(),
            command: Command::RemoveLiquidity(RemoveLiquidity {
                min_currency: legs.iter().map(|l| l.2).collect(),
                min_asset: legs.iter().map(|l| l.3).collect(),
                deadline: DEADLINE,
            }),
        })
    }

    pub(crate) fn buy(
        &self,
        who: &str,
        recipient: &str,
        legs: &[(u64, u128)],
        max_currency: u128,
    ) -> Result<BatchReceipt, ExchangeError> {
        self.exchange.buy_asset(
            &acct(who),
            BuyOrder {
                ids: legs.iter().map(|l| AssetId::new(l.0)).collect(),
                amounts_out: legs.iter().map(|l| l.1).collect(),
                max_currency,
                deadline: DEADLINE,
                recipient: acct(recipient),
            },
        )
    }

    pub(crate) fn pool(&self, id: u64) -> Pool {
        let Ok(entry) = self.exchange.pool(AssetId::new(id)) else {
            panic!("pool view failed");
        };
        entry.map(|e| e.pool).unwrap_or(Pool::EMPTY)
    }

    pub(crate) fn currency_of(&self, who: &str) -> u128 {
        self.currency.balance_of(&acct(who)).get()
    }

    pub(crate) fn asset_of(&self, who: &str, id: u64) -> u128 {
        self.assets.balance_of(&acct(who), AssetId::new(id)).get()
    }

    pub(crate) fn shares_of(&self, who: &str, id: u64) -> u128 {
        self.shares.balance_of(&acct(who), AssetId::new(id)).get()
    }

    /// Share balances, share supply and pool shares agree, and the
    /// exchange's custody matches the pool reserves.
    pub(crate) fn assert_books_balanced(&self, id: u64) {
        let asset_id = AssetId::new(id);
        let pool = self.pool(id);
        let held: u128 = self
            .shares
            .holders(asset_id)
            .iter()
            .map(|(_, amount)| amount.get())
            .sum();
        assert_eq!(held, pool.total_shares().get(), "share balances vs pool");
        assert_eq!(
            self.shares.total_supply(asset_id),
            pool.total_shares(),
            "share supply vs pool"
        );
        assert_eq!(
            self.asset_of("exchange", id),
            pool.asset_reserve().get(),
            "asset custody vs reserve"
        );
    }

    /// Funds `lp` and opens pool `id` with the given reserves.
    pub(crate) fn seed_pool(&self, lp: &str, id: u64, currency: u128, asset: u128) {
        self.fund(lp, currency, &[(id, asset)]);
        let Ok(_) = self.add(lp, &[(id, asset, currency)]) else {
            panic!("seeding pool {id} failed");
        };
    }
}
