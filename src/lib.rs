//! # shop-exchange
//!
//! Constant-product exchange between a multi-id asset ledger and a single
//! fungible currency, with a REST and WebSocket front end.
//!
//! Every asset id gets its own `currency × asset = k` pool. Liquidity
//! providers deposit both sides and receive LP shares on a share ledger
//! keyed by the same id; traders buy assets directly with currency or sell
//! them by transferring assets to the exchange with a command. Every
//! multi-id batch is all-or-nothing. Amount math uses `hydra-amm`'s
//! checked `u128` primitives.
//!
//! ## Architecture
//!
//! ```text
//! Clients (HTTP, WebSocket)
//!     │
//!     ├── REST Handlers (api/)
//!     ├── WS Handler (ws/)
//!     │
//!     ├── ExchangeService (service/)   sequencing + events
//!     ├── EventBus (domain/)
//!     │
//!     ├── Exchange (engine/)           dispatch, pricing, atomic batches
//!     ├── PoolRegistry (domain/)
//!     ├── LedgerBridge (ledger/)       currency, asset and share books
//!     │
//!     └── PostgreSQL Persistence (optional)
//! ```

pub mod api;
pub mod app_state;
pub mod config;
pub mod domain;
pub mod engine;
pub mod error;
pub mod ledger;
pub mod persistence;
pub mod service;
pub mod ws;

use std::time::Duration;

use axum::Router;
use axum::routing::get;
use tower_http::cors::CorsLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::app_state::AppState;

/// Builds the full HTTP application: REST routes, `/ws`, and the
/// tracing, CORS and timeout layers.
pub fn build_app(state: AppState, request_timeout: Duration) -> Router {
    Router::new()
        .merge(api::build_router())
        .route("/ws", get(ws::handler::ws_handler))
        .layer(TimeoutLayer::new(request_timeout))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
