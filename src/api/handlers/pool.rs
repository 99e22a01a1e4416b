//! Pool read handlers: list and get.

use axum::extract::{Path, Query, State};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};

use crate::api::dto::{
    PaginationParams, PoolDetailResponse, PoolListResponse, PoolSummaryDto, ReservesParams,
    ReservesResponse, parse_ids,
};
use crate::app_state::AppState;
use crate::domain::AssetId;
use crate::error::{ErrorResponse, ExchangeError};

/// `GET /pools`: List live pools with pagination.
///
/// # Errors
///
/// Returns [`ExchangeError`] on internal failures.
#[utoipa::path(
    get,
    path = "/api/v1/pools",
    tag = "Pools",
    summary = "List pools",
    description = "Returns a paginated list of every pool with outstanding shares, ordered by asset id.",
    params(PaginationParams),
    responses(
        (status = 200, description = "Paginated pool list", body = PoolListResponse),
    )
)]
pub async fn list_pools(
    State(state): State<AppState>,
    Query(params): Query<PaginationParams>,
) -> Result<impl IntoResponse, ExchangeError> {
    let params = params.clamped();
    let summaries = state.service.list_pools().await?;
    let pagination = params.meta(summaries.len());

    let data: Vec<PoolSummaryDto> = summaries
        .into_iter()
        .skip(params.offset())
        .take(params.per_page as usize)
        .map(PoolSummaryDto::from)
        .collect();

    Ok(Json(PoolListResponse { data, pagination }))
}

/// `GET /pools/reserves`: Currency reserves of several pools.
///
/// # Errors
///
/// Returns [`ExchangeError::InvalidRequest`] if `ids` is empty or not a list
/// of u64 values.
#[utoipa::path(
    get,
    path = "/api/v1/pools/reserves",
    tag = "Pools",
    summary = "Currency reserves",
    description = "Returns the currency reserve of each requested id, zero where no pool exists.",
    params(ReservesParams),
    responses(
        (status = 200, description = "Reserves in request order", body = ReservesResponse),
        (status = 400, description = "Invalid id list", body = ErrorResponse),
    )
)]
pub async fn get_reserves(
    State(state): State<AppState>,
    Query(params): Query<ReservesParams>,
) -> Result<impl IntoResponse, ExchangeError> {
    let ids = parse_ids(&params.ids)?;
    let reserves = state.service.currency_reserves(&ids).await?;
    Ok(Json(ReservesResponse {
        ids,
        currency_reserves: reserves.iter().map(ToString::to_string).collect(),
    }))
}

/// `GET /pools/{id}`: Get pool details.
///
/// # Errors
///
/// Returns [`ExchangeError::PoolNotFound`] if no pool exists for the id.
#[utoipa::path(
    get,
    path = "/api/v1/pools/{id}",
    tag = "Pools",
    summary = "Get pool details",
    description = "Returns reserves, share supply, spot price and trading statistics of one pool.",
    params(
        ("id" = u64, Path, description = "Asset id"),
    ),
    responses(
        (status = 200, description = "Pool details", body = PoolDetailResponse),
        (status = 404, description = "Pool not found", body = ErrorResponse),
    )
)]
pub async fn get_pool(
    State(state): State<AppState>,
    Path(id): Path<u64>,
) -> Result<impl IntoResponse, ExchangeError> {
    let entry = state.service.pool(AssetId::new(id)).await?;
    Ok(Json(PoolDetailResponse::from(&entry)))
}

/// Pool routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/pools", get(list_pools))
        .route("/pools/reserves", get(get_reserves))
        .route("/pools/{id}", get(get_pool))
}
