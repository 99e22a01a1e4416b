//! Exchange error types with HTTP status code mapping.
//!
//! [`ExchangeError`] is the central error type for the exchange. Every
//! variant aborts the whole batch with zero state change; none are retried
//! internally. Each variant maps to a numeric code and an HTTP status so the
//! REST layer can render a structured JSON error response.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use hydra_amm::error::AmmError;
use serde::Serialize;

use crate::domain::{AccountId, AssetId};

/// Structured JSON error response body.
///
/// All error responses follow this shape:
/// ```json
/// {
///   "error": {
///     "code": 4003,
///     "message": "slippage exceeded on asset 1: required 120, limit 100",
///     "details": null
///   }
/// }
/// ```
#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct ErrorResponse {
    /// Structured error payload.
    pub error: ErrorBody,
}

/// Inner error body with numeric code and human-readable message.
#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct ErrorBody {
    /// Numeric error code (see [`ExchangeError::error_code`]).
    pub code: u32,
    /// Human-readable error message.
    pub message: String,
    /// Optional additional details.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

/// Exchange-wide error enum.
///
/// # Error Code Ranges
///
/// | Range     | Category        | HTTP Status                  |
/// |-----------|-----------------|------------------------------|
/// | 1000–1999 | Validation      | 400 Bad Request              |
/// | 2000–2999 | State/Not Found | 404 Not Found / 409 Conflict |
/// | 3000–3999 | Server          | 500 Internal Server Error    |
/// | 4000–4999 | Market          | 422 Unprocessable Entity     |
#[derive(Debug, thiserror::Error)]
pub enum ExchangeError {
    /// The command selector is not one of the known command kinds.
    #[error("invalid command selector: {0:#010x}")]
    InvalidCommand(u32),

    /// The command payload could not be decoded or its arrays disagree in length.
    #[error("malformed payload: {0}")]
    MalformedPayload(String),

    /// The request decoded but violates a request-level rule.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// The request deadline lies in the past.
    #[error("request expired: deadline {deadline} is before current time {now}")]
    Expired {
        /// Caller-supplied deadline (unix seconds).
        deadline: u64,
        /// Exchange time when the request executed.
        now: u64,
    },

    /// A caller-supplied price bound was violated.
    #[error("slippage exceeded{}: required {required}, limit {limit}", fmt_asset(.asset_id))]
    SlippageExceeded {
        /// Asset id whose bound was violated (`None` for batch-wide bounds).
        asset_id: Option<AssetId>,
        /// Amount the trade would have required or produced.
        required: u128,
        /// Caller-supplied bound.
        limit: u128,
    },

    /// The pool cannot satisfy the trade.
    #[error("insufficient liquidity in pool {0}")]
    InsufficientLiquidity(AssetId),

    /// The holder does not own enough LP shares.
    #[error("insufficient shares of pool {asset_id} held by {holder}")]
    InsufficientShares {
        /// Share holder.
        holder: AccountId,
        /// Pool id of the shares.
        asset_id: AssetId,
    },

    /// An external ledger rejected a transfer for lack of funds.
    #[error("insufficient balance: {0}")]
    InsufficientBalance(String),

    /// A call arrived while another batch was still in progress.
    #[error("re-entrant call rejected while a batch is in progress")]
    ReentrantCall,

    /// No pool exists for the given asset id.
    #[error("pool not found: {0}")]
    PoolNotFound(AssetId),

    /// Checked arithmetic failed inside the pricing engine.
    #[error("arithmetic error: {0}")]
    Arithmetic(#[from] AmmError),

    /// Persistence layer failure.
    #[error("persistence error: {0}")]
    PersistenceError(String),

    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

fn fmt_asset(asset_id: &Option<AssetId>) -> String {
    asset_id
        .map(|id| format!(" on asset {id}"))
        .unwrap_or_default()
}

impl ExchangeError {
    /// Returns the numeric error code for this variant.
    #[must_use]
    pub const fn error_code(&self) -> u32 {
        match self {
            Self::InvalidCommand(_) => 1001,
            Self::MalformedPayload(_) => 1002,
            Self::InvalidRequest(_) => 1003,
            Self::Arithmetic(_) => 1004,
            Self::PoolNotFound(_) => 2001,
            Self::ReentrantCall => 2002,
            Self::Internal(_) => 3000,
            Self::PersistenceError(_) => 3001,
            Self::InsufficientLiquidity(_) => 4001,
            Self::InsufficientShares { .. } => 4002,
            Self::SlippageExceeded { .. } => 4003,
            Self::Expired { .. } => 4004,
            Self::InsufficientBalance(_) => 4005,
        }
    }

    /// Returns the HTTP status code for this variant.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidCommand(_)
            | Self::MalformedPayload(_)
            | Self::InvalidRequest(_)
            | Self::Arithmetic(_) => StatusCode::BAD_REQUEST,
            Self::PoolNotFound(_) => StatusCode::NOT_FOUND,
            Self::ReentrantCall => StatusCode::CONFLICT,
            Self::InsufficientLiquidity(_)
            | Self::InsufficientShares { .. }
            | Self::SlippageExceeded { .. }
            | Self::Expired { .. }
            | Self::InsufficientBalance(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::PersistenceError(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ExchangeError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorResponse {
            error: ErrorBody {
                code: self.error_code(),
                message: self.to_string(),
                details: None,
            },
        };
        let mut response = axum::Json(body).into_response();
        *response.status_mut() = status;
        response
    }
}
