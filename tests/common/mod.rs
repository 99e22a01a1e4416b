//! Shared fixtures for integration tests: a live server on an ephemeral
//! port backed by seeded in-memory ledgers.

#![allow(clippy::panic, dead_code)]

use std::sync::Arc;
use std::time::Duration;

use hydra_amm::domain::{Amount, BasisPoints, FeeTier};
use shop_exchange::app_state::AppState;
use shop_exchange::build_app;
use shop_exchange::domain::{AccountId, AssetId, EventBus};
use shop_exchange::engine::{Clock, Exchange, SystemClock};
use shop_exchange::ledger::{
    CurrencyBook, CurrencyLedger, LedgerBridge, MultiTokenBook, MultiTokenLedger,
};
use shop_exchange::service::ExchangeService;

/// A running server plus handles on its ledgers.
pub struct TestServer {
    pub base_url: String,
    pub ws_url: String,
    pub currency: Arc<CurrencyBook>,
    pub assets: Arc<MultiTokenBook>,
    pub shares: Arc<MultiTokenBook>,
    pub service: Arc<ExchangeService>,
}

impl TestServer {
    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    pub fn currency_of(&self, who: &str) -> u128 {
        self.currency.balance_of(&AccountId::new(who)).get()
    }

    pub fn asset_of(&self, who: &str, id: u64) -> u128 {
        self.assets.balance_of(&AccountId::new(who), AssetId::new(id)).get()
    }

    pub fn shares_of(&self, who: &str, id: u64) -> u128 {
        self.shares.balance_of(&AccountId::new(who), AssetId::new(id)).get()
    }
}

/// Deadline one hour ahead of the wall clock.
pub fn deadline() -> u64 {
    SystemClock.now() + 3_600
}

/// Spawns a fee-free server with the standard accounts funded:
/// `lp` (1 000 000 currency, 1 000 of ids 1 and 2), `buyer` (10 000
/// currency) and `seller` (100 of id 1).
pub async fn spawn_server() -> TestServer {
    let currency = Arc::new(CurrencyBook::new());
    let assets = Arc::new(MultiTokenBook::new());
    let shares = Arc::new(MultiTokenBook::new());

    let mint_currency = |who: &str, amount: u128| {
        let Ok(()) = currency.mint(&AccountId::new(who), Amount::new(amount)) else {
            panic!("currency mint failed");
        };
    };
    mint_currency("lp", 1_000_000);
    mint_currency("buyer", 10_000);
    for (who, id, amount) in [("lp", 1, 1_000), ("lp", 2, 1_000), ("seller", 1, 100)] {
        let Ok(()) = assets.mint(&AccountId::new(who), AssetId::new(id), Amount::new(amount))
        else {
            panic!("asset mint failed");
        };
    }

    let bridge = LedgerBridge::new(
        Arc::clone(&currency) as Arc<dyn CurrencyLedger>,
        Arc::clone(&assets) as Arc<dyn MultiTokenLedger>,
        Arc::clone(&shares) as Arc<dyn MultiTokenLedger>,
    );
    let Ok((exchange, _admin)) = Exchange::new(
        AccountId::new("exchange"),
        bridge,
        Arc::new(SystemClock),
        FeeTier::new(BasisPoints::new(0)),
    ) else {
        panic!("exchange must build");
    };
    let service = Arc::new(ExchangeService::new(
        Arc::new(exchange),
        EventBus::new(1_024),
    ));
    let app = build_app(AppState::new(Arc::clone(&service)), Duration::from_secs(10));

    let Ok(listener) = tokio::net::TcpListener::bind("127.0.0.1:0").await else {
        panic!("bind failed");
    };
    let Ok(addr) = listener.local_addr() else {
        panic!("no local addr");
    };
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });

    TestServer {
        base_url: format!("http://{addr}"),
        ws_url: format!("ws://{addr}/ws"),
        currency,
        assets,
        shares,
        service,
    }
}
