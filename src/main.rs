//! shop-exchange server entry point.
//!
//! Builds the in-memory ledgers, the exchange and its service, then starts
//! the Axum HTTP server with REST and WebSocket endpoints.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tracing_subscriber::EnvFilter;

use shop_exchange::app_state::AppState;
use shop_exchange::build_app;
use shop_exchange::config::{ExchangeConfig, LogFormat};
use shop_exchange::domain::EventBus;
use shop_exchange::engine::{Exchange, SystemClock};
use shop_exchange::ledger::{CurrencyBook, Genesis, LedgerBridge, MultiTokenBook};
use shop_exchange::persistence::PostgresPersistence;
use shop_exchange::persistence::recorder::{spawn_event_recorder, spawn_snapshotter};
use shop_exchange::service::ExchangeService;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = ExchangeConfig::from_env()?;
    init_tracing(config.log_format);
    tracing::info!(
        addr = %config.listen_addr,
        account = %config.exchange_account,
        fee_bps = config.fee.basis_points().get(),
        "starting shop-exchange"
    );

    // Ledgers
    let currency = Arc::new(CurrencyBook::new());
    let assets = Arc::new(MultiTokenBook::new());
    let shares = Arc::new(MultiTokenBook::new());
    if let Some(path) = &config.genesis_path {
        Genesis::from_file(path)?.apply(&currency, &assets)?;
        tracing::info!(path = %path.display(), "genesis balances applied");
    }
    let bridge = LedgerBridge::new(currency, assets, shares);

    // Exchange + service. No admin surface is served, so the capability is
    // discarded and the fee stays at EXCHANGE_FEE_BPS for the process lifetime.
    let (exchange, _admin) = Exchange::new(
        config.exchange_account.clone(),
        bridge,
        Arc::new(SystemClock),
        config.fee,
    )?;
    let event_bus = EventBus::new(config.event_bus_capacity);
    let service = Arc::new(ExchangeService::new(Arc::new(exchange), event_bus));

    if config.persistence_enabled {
        let store = PostgresPersistence::connect(&config)
            .await
            .context("connecting to PostgreSQL")?;
        spawn_event_recorder(store.clone(), service.event_bus().subscribe());
        spawn_snapshotter(
            store,
            Arc::clone(&service),
            Duration::from_secs(config.snapshot_interval_secs),
            config.cleanup_after_days,
        );
        tracing::info!("persistence enabled");
    }

    let app = build_app(
        AppState::new(service),
        Duration::from_secs(config.request_timeout_secs),
    );

    let listener = tokio::net::TcpListener::bind(config.listen_addr)
        .await
        .with_context(|| format!("binding {}", config.listen_addr))?;
    tracing::info!(addr = %config.listen_addr, "server listening");

    axum::serve(listener, app).await?;

    Ok(())
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    match format {
        LogFormat::Text => tracing_subscriber::fmt().with_env_filter(filter).init(),
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init(),
    }
}
