//! Price quote DTOs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::domain::AssetId;

/// Request body for `POST /quote/buy` and `POST /quote/sell`.
#[derive(Debug, Deserialize, ToSchema)]
pub struct QuoteRequest {
    /// Asset ids to price. Repeated ids are quoted cumulatively.
    pub ids: Vec<AssetId>,
    /// Asset units per id (string-encoded u128).
    pub amounts: Vec<String>,
}

/// Response body for quote endpoints.
#[derive(Debug, Serialize, ToSchema)]
pub struct QuoteResponse {
    /// Asset ids, echoed from the request.
    pub ids: Vec<AssetId>,
    /// Currency cost (buy) or proceeds (sell) per id (string-encoded).
    pub prices: Vec<String>,
    /// Sum of `prices` (string-encoded).
    pub total: String,
    /// Quote timestamp.
    pub quoted_at: DateTime<Utc>,
}
