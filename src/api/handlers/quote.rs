//! Quote handlers: read-only pricing of buys and sells.

use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::post;
use axum::{Json, Router};
use chrono::Utc;
use hydra_amm::domain::Amount;
use hydra_amm::math::CheckedArithmetic;

use crate::api::dto::{QuoteRequest, QuoteResponse, parse_amounts};
use crate::app_state::AppState;
use crate::error::{ErrorResponse, ExchangeError};

/// Which side of the market to price.
#[derive(Debug, Clone, Copy)]
enum Side {
    Buy,
    Sell,
}

async fn quote(
    state: &AppState,
    side: Side,
    req: QuoteRequest,
) -> Result<QuoteResponse, ExchangeError> {
    let amounts = parse_amounts("amounts", &req.amounts)?;
    let prices = match side {
        Side::Buy => state.service.quote_buy(&req.ids, &amounts).await?,
        Side::Sell => state.service.quote_sell(&req.ids, &amounts).await?,
    };
    let total = prices
        .iter()
        .try_fold(Amount::ZERO, |acc, p| acc.safe_add(p))?;

    Ok(QuoteResponse {
        ids: req.ids,
        prices: prices.iter().map(ToString::to_string).collect(),
        total: total.to_string(),
        quoted_at: Utc::now(),
    })
}

/// `POST /quote/buy`: Currency cost of buying the listed amounts.
///
/// # Errors
///
/// Returns [`ExchangeError`] if any leg cannot be priced.
#[utoipa::path(
    post,
    path = "/api/v1/quote/buy",
    tag = "Quotes",
    summary = "Quote a buy",
    description = "Prices buying the listed asset amounts against current reserves, fee included. Repeated ids are priced cumulatively. Nothing is executed.",
    request_body = QuoteRequest,
    responses(
        (status = 200, description = "Per-id cost", body = QuoteResponse),
        (status = 400, description = "Malformed request", body = ErrorResponse),
        (status = 422, description = "Insufficient liquidity", body = ErrorResponse),
    )
)]
pub async fn quote_buy(
    State(state): State<AppState>,
    Json(req): Json<QuoteRequest>,
) -> Result<impl IntoResponse, ExchangeError> {
    Ok(Json(quote(&state, Side::Buy, req).await?))
}

/// `POST /quote/sell`: Currency proceeds of selling the listed amounts.
///
/// # Errors
///
/// Returns [`ExchangeError`] if any leg cannot be priced.
#[utoipa::path(
    post,
    path = "/api/v1/quote/sell",
    tag = "Quotes",
    summary = "Quote a sell",
    description = "Prices selling the listed asset amounts against current reserves, fee included. Repeated ids are priced cumulatively. Nothing is executed.",
    request_body = QuoteRequest,
    responses(
        (status = 200, description = "Per-id proceeds", body = QuoteResponse),
        (status = 400, description = "Malformed request", body = ErrorResponse),
        (status = 422, description = "Insufficient liquidity", body = ErrorResponse),
    )
)]
pub async fn quote_sell(
    State(state): State<AppState>,
    Json(req): Json<QuoteRequest>,
) -> Result<impl IntoResponse, ExchangeError> {
    Ok(Json(quote(&state, Side::Sell, req).await?))
}

/// Quote routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/quote/buy", post(quote_buy))
        .route("/quote/sell", post(quote_sell))
}
