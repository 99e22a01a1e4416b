//! Trading handlers: direct buys and inbound batch transfers.

use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::post;
use axum::{Json, Router};

use crate::api::dto::{BatchReceiptResponse, BuyRequest, TransferRequest};
use crate::app_state::AppState;
use crate::error::{ErrorResponse, ExchangeError};

/// `POST /buy`: Buy exact asset amounts for currency.
///
/// # Errors
///
/// Returns [`ExchangeError`] if the batch is rejected; nothing is settled
/// in that case.
#[utoipa::path(
    post,
    path = "/api/v1/buy",
    tag = "Trading",
    summary = "Buy assets",
    description = "Buys the exact asset amounts listed, paying at most `max_currency` in total. The batch is all-or-nothing.",
    request_body = BuyRequest,
    responses(
        (status = 200, description = "Purchase settled", body = BatchReceiptResponse),
        (status = 400, description = "Malformed request", body = ErrorResponse),
        (status = 409, description = "Exchange busy", body = ErrorResponse),
        (status = 422, description = "Rejected by the market", body = ErrorResponse),
    )
)]
pub async fn buy(
    State(state): State<AppState>,
    Json(req): Json<BuyRequest>,
) -> Result<impl IntoResponse, ExchangeError> {
    let (buyer, order) = req.into_order()?;
    let receipt = state.service.buy(&buyer, order).await?;
    Ok(Json(BatchReceiptResponse::from(&receipt)))
}

/// `POST /transfers`: Hand assets or shares to the exchange with a command.
///
/// # Errors
///
/// Returns [`ExchangeError`] if the command is invalid or the batch is
/// rejected; the transfer is returned to the sender in that case.
#[utoipa::path(
    post,
    path = "/api/v1/transfers",
    tag = "Trading",
    summary = "Inbound batch transfer",
    description = "Transfers `(id, amount)` pairs from `sender` to the exchange and applies the attached command: add liquidity, sell, or remove liquidity. The command is given either typed (`command`) or as a hex-encoded opaque payload (`data`).",
    request_body = TransferRequest,
    responses(
        (status = 200, description = "Batch settled", body = BatchReceiptResponse),
        (status = 400, description = "Malformed request or unknown command", body = ErrorResponse),
        (status = 409, description = "Exchange busy", body = ErrorResponse),
        (status = 422, description = "Rejected by the market", body = ErrorResponse),
    )
)]
pub async fn transfer(
    State(state): State<AppState>,
    Json(req): Json<TransferRequest>,
) -> Result<impl IntoResponse, ExchangeError> {
    let transfer = req.into_transfer()?;
    let receipt = state.service.dispatch(transfer).await?;
    Ok(Json(BatchReceiptResponse::from(&receipt)))
}

/// Trading routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/buy", post(buy))
        .route("/transfers", post(transfer))
}
