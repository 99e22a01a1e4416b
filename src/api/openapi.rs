//! OpenAPI document for the REST surface.

use utoipa::OpenApi;

use super::dto::{
    BatchReceiptResponse, BuyRequest, CommandDto, LegDto, PaginationMeta, PoolDetailResponse,
    PoolListResponse, PoolSummaryDto, QuoteRequest, QuoteResponse, ReservesResponse,
    ShareBalanceResponse, ShareTransferRequest, TransferRequest,
};
use super::handlers;
use crate::error::{ErrorBody, ErrorResponse};

/// Generated OpenAPI specification, served by Swagger UI when the
/// `swagger-ui` feature is enabled.
#[derive(Debug, OpenApi)]
#[openapi(
    info(
        title = "shop-exchange",
        description = "Constant-product exchange between a multi-id asset ledger and a fungible currency."
    ),
    paths(
        handlers::system::health_handler,
        handlers::system::market_config_handler,
        handlers::pool::list_pools,
        handlers::pool::get_reserves,
        handlers::pool::get_pool,
        handlers::trade::buy,
        handlers::trade::transfer,
        handlers::quote::quote_buy,
        handlers::quote::quote_sell,
        handlers::shares::share_balance,
        handlers::shares::transfer_shares,
    ),
    components(schemas(
        ErrorResponse,
        ErrorBody,
        PaginationMeta,
        PoolDetailResponse,
        PoolListResponse,
        PoolSummaryDto,
        ReservesResponse,
        BuyRequest,
        TransferRequest,
        CommandDto,
        LegDto,
        BatchReceiptResponse,
        QuoteRequest,
        QuoteResponse,
        ShareBalanceResponse,
        ShareTransferRequest,
    )),
    tags(
        (name = "System", description = "Health and market configuration"),
        (name = "Pools", description = "Pool reserves and statistics"),
        (name = "Trading", description = "Buys, sells and liquidity changes"),
        (name = "Quotes", description = "Read-only pricing"),
        (name = "Shares", description = "LP share balances and transfers"),
    )
)]
pub struct ApiDoc;
