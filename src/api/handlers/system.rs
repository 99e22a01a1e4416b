//! System endpoints: health check and market configuration.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use chrono::Utc;
use serde::Serialize;
use utoipa::ToSchema;

use crate::app_state::AppState;
use crate::domain::{
    AccountId, ADD_LIQUIDITY_SELECTOR, REMOVE_LIQUIDITY_SELECTOR, SELL_ASSET_SELECTOR,
};
use crate::engine::pricing::FEE_DENOMINATOR;
use crate::error::{ErrorResponse, ExchangeError};

/// Health check response.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    status: String,
    timestamp: String,
    version: String,
}

/// Command selectors accepted in opaque transfer payloads.
#[derive(Debug, Serialize, ToSchema)]
pub struct SelectorInfo {
    add_liquidity: String,
    sell_asset: String,
    remove_liquidity: String,
}

/// Market configuration response.
#[derive(Debug, Serialize, ToSchema)]
pub struct MarketConfigResponse {
    /// Account holding the exchange's custody.
    pub exchange_account: AccountId,
    /// Current trading fee in basis points.
    pub fee_bps: u32,
    /// Denominator of `fee_bps`.
    pub fee_denominator: u32,
    /// Number of live pools.
    pub pool_count: usize,
    /// Command selectors.
    pub selectors: SelectorInfo,
}

/// `GET /health`: Service health status.
#[utoipa::path(
    get,
    path = "/health",
    tag = "System",
    summary = "Health check",
    description = "Returns service health status, version, and current timestamp.",
    responses(
        (status = 200, description = "Service is healthy", body = HealthResponse),
    )
)]
pub async fn health_handler() -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(HealthResponse {
            status: "healthy".to_string(),
            timestamp: Utc::now().to_rfc3339(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }),
    )
}

/// `GET /config/market`: Fee, custody account and command selectors.
///
/// # Errors
///
/// Returns [`ExchangeError::Internal`] if the exchange state is unavailable.
#[utoipa::path(
    get,
    path = "/config/market",
    tag = "System",
    summary = "Market configuration",
    description = "Returns the trading fee, the exchange custody account and the selectors of the opaque command encoding.",
    responses(
        (status = 200, description = "Market configuration", body = MarketConfigResponse),
        (status = 500, description = "Exchange unavailable", body = ErrorResponse),
    )
)]
pub async fn market_config_handler(
    State(state): State<AppState>,
) -> Result<impl IntoResponse, ExchangeError> {
    let fee = state.service.fee().await?;
    let pool_count = state.service.list_pools().await?.len();
    #[allow(clippy::cast_possible_truncation)]
    let fee_denominator = FEE_DENOMINATOR as u32;

    Ok(Json(MarketConfigResponse {
        exchange_account: state.service.exchange().account().clone(),
        fee_bps: fee.basis_points().get(),
        fee_denominator,
        pool_count,
        selectors: SelectorInfo {
            add_liquidity: format!("{ADD_LIQUIDITY_SELECTOR:#010x}"),
            sell_asset: format!("{SELL_ASSET_SELECTOR:#010x}"),
            remove_liquidity: format!("{REMOVE_LIQUIDITY_SELECTOR:#010x}"),
        },
    }))
}

/// System routes mounted at the root level (not under /api/v1).
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health_handler))
        .route("/config/market", get(market_config_handler))
}
