//! LP share handlers: balance lookup and transfer.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use hydra_amm::domain::Amount;

use crate::api::dto::{ShareBalanceResponse, ShareTransferRequest, parse_amount};
use crate::app_state::AppState;
use crate::domain::{AccountId, AssetId};
use crate::error::{ErrorResponse, ExchangeError};

/// `GET /accounts/{holder}/shares/{id}`: LP share balance.
///
/// # Errors
///
/// Returns [`ExchangeError::Internal`] if the exchange state is unavailable.
#[utoipa::path(
    get,
    path = "/api/v1/accounts/{holder}/shares/{id}",
    tag = "Shares",
    summary = "Share balance",
    description = "Returns the LP shares of one pool held by an account, with the pool's outstanding supply.",
    params(
        ("holder" = String, Path, description = "Share holder"),
        ("id" = u64, Path, description = "Asset id"),
    ),
    responses(
        (status = 200, description = "Share balance", body = ShareBalanceResponse),
    )
)]
pub async fn share_balance(
    State(state): State<AppState>,
    Path((holder, id)): Path<(String, u64)>,
) -> Result<impl IntoResponse, ExchangeError> {
    let holder = AccountId::new(holder);
    let asset_id = AssetId::new(id);
    let (balance, supply) = state.service.shares(&holder, asset_id).await?;

    Ok(Json(ShareBalanceResponse {
        holder,
        asset_id,
        balance: balance.to_string(),
        total_supply: supply.to_string(),
    }))
}

/// `POST /shares/transfer`: Move LP shares between holders.
///
/// # Errors
///
/// Returns [`ExchangeError::InsufficientShares`] if `from` holds fewer
/// shares than requested.
#[utoipa::path(
    post,
    path = "/api/v1/shares/transfer",
    tag = "Shares",
    summary = "Transfer shares",
    description = "Moves LP shares from one holder to another. The new holder may redeem them.",
    request_body = ShareTransferRequest,
    responses(
        (status = 204, description = "Shares moved"),
        (status = 400, description = "Malformed request", body = ErrorResponse),
        (status = 422, description = "Insufficient shares", body = ErrorResponse),
    )
)]
pub async fn transfer_shares(
    State(state): State<AppState>,
    Json(req): Json<ShareTransferRequest>,
) -> Result<impl IntoResponse, ExchangeError> {
    let amount = Amount::new(parse_amount("amount", &req.amount)?);
    state
        .service
        .transfer_shares(&req.from, &req.to, req.asset_id, amount)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Share routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/accounts/{holder}/shares/{id}", get(share_balance))
        .route("/shares/transfer", post(transfer_shares))
}
