//! Pool DTOs for get and list operations.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use super::common_dto::PaginationMeta;
use crate::domain::{AssetId, PoolEntry, PoolSummary};

/// Single pool detail for `GET /pools/{id}`.
#[derive(Debug, Serialize, ToSchema)]
pub struct PoolDetailResponse {
    /// Pool asset id.
    pub asset_id: AssetId,
    /// Currency reserve (string-encoded).
    pub currency_reserve: String,
    /// Asset reserve (string-encoded).
    pub asset_reserve: String,
    /// Outstanding LP shares (string-encoded).
    pub total_shares: String,
    /// Currency per asset unit, if the pool holds assets.
    pub spot_price: Option<String>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last update timestamp.
    pub updated_at: DateTime<Utc>,
    /// Number of buy and sell legs executed.
    pub trade_count: u64,
    /// Cumulative currency traded (string-encoded).
    pub currency_volume: String,
}

impl From<&PoolEntry> for PoolDetailResponse {
    fn from(entry: &PoolEntry) -> Self {
        Self {
            asset_id: entry.asset_id,
            currency_reserve: entry.pool.currency_reserve().to_string(),
            asset_reserve: entry.pool.asset_reserve().to_string(),
            total_shares: entry.pool.total_shares().to_string(),
            spot_price: entry.pool.spot_price().map(|p| p.to_string()),
            created_at: entry.created_at,
            updated_at: entry.last_modified_at,
            trade_count: entry.trade_count,
            currency_volume: entry.currency_volume.to_string(),
        }
    }
}

/// Pool summary for list responses.
#[derive(Debug, Serialize, ToSchema)]
pub struct PoolSummaryDto {
    /// Pool asset id.
    pub asset_id: AssetId,
    /// Currency reserve (string-encoded).
    pub currency_reserve: String,
    /// Asset reserve (string-encoded).
    pub asset_reserve: String,
    /// Outstanding LP shares (string-encoded).
    pub total_shares: String,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Number of trades.
    pub trade_count: u64,
}

impl From<PoolSummary> for PoolSummaryDto {
    fn from(s: PoolSummary) -> Self {
        Self {
            asset_id: s.asset_id,
            currency_reserve: s.currency_reserve,
            asset_reserve: s.asset_reserve,
            total_shares: s.total_shares,
            created_at: s.created_at,
            trade_count: s.trade_count,
        }
    }
}

/// Query for `GET /pools/reserves`.
#[derive(Debug, Clone, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ReservesParams {
    /// Comma-separated asset ids, e.g. `1,2,3`.
    pub ids: String,
}

/// Currency reserve per requested id; `"0"` for ids without a pool.
#[derive(Debug, Serialize, ToSchema)]
pub struct ReservesResponse {
    /// Requested asset ids, in request order.
    pub ids: Vec<AssetId>,
    /// Currency reserve of each id (string-encoded).
    pub currency_reserves: Vec<String>,
}

/// Paginated list response for `GET /pools`.
#[derive(Debug, Serialize, ToSchema)]
pub struct PoolListResponse {
    /// Pool summaries for the current page.
    pub data: Vec<PoolSummaryDto>,
    /// Pagination metadata.
    pub pagination: PaginationMeta,
}
