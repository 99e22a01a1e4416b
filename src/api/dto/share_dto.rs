//! LP share DTOs.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::domain::{AccountId, AssetId};

/// Response body for `GET /accounts/{holder}/shares/{id}`.
#[derive(Debug, Serialize, ToSchema)]
pub struct ShareBalanceResponse {
    /// Share holder.
    pub holder: AccountId,
    /// Pool (and share) id.
    pub asset_id: AssetId,
    /// Shares held (string-encoded).
    pub balance: String,
    /// Outstanding shares of the pool (string-encoded).
    pub total_supply: String,
}

/// Request body for `POST /shares/transfer`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ShareTransferRequest {
    /// Current holder.
    pub from: AccountId,
    /// New holder.
    pub to: AccountId,
    /// Pool (and share) id.
    pub asset_id: AssetId,
    /// Shares to move (string-encoded u128).
    pub amount: String,
}
