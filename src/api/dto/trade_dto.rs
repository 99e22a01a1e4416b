//! Trade DTOs: direct buys, inbound batch transfers and their receipts.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use super::common_dto::{decode_hex, parse_amount, parse_amounts};
use crate::domain::{
    AccountId, AddLiquidity, AssetId, BatchTransfer, BuyOrder, Command, RemoveLiquidity,
    SellAsset,
};
use crate::engine::{BatchReceipt, LegReceipt};
use crate::error::ExchangeError;

/// Request body for `POST /buy`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct BuyRequest {
    /// Account paying the currency.
    pub buyer: AccountId,
    /// Account receiving the assets. Defaults to the buyer.
    #[serde(default)]
    pub recipient: Option<AccountId>,
    /// Asset ids to buy.
    pub ids: Vec<AssetId>,
    /// Exact asset units per id (string-encoded u128).
    pub amounts_out: Vec<String>,
    /// Maximum total currency to pay (string-encoded u128).
    pub max_currency: String,
    /// Latest acceptable execution time (unix seconds).
    pub deadline: u64,
}

impl BuyRequest {
    /// Splits the request into the paying account and the order.
    ///
    /// # Errors
    ///
    /// Returns [`ExchangeError::InvalidRequest`] on an unparseable amount.
    pub fn into_order(self) -> Result<(AccountId, BuyOrder), ExchangeError> {
        let order = BuyOrder {
            amounts_out: parse_amounts("amounts_out", &self.amounts_out)?,
            max_currency: parse_amount("max_currency", &self.max_currency)?,
            recipient: self.recipient.unwrap_or_else(|| self.buyer.clone()),
            ids: self.ids,
            deadline: self.deadline,
        };
        Ok((self.buyer, order))
    }
}

/// Typed command carried by `POST /transfers`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum CommandDto {
    /// Deposit the transferred assets as liquidity.
    AddLiquidity {
        /// Maximum currency per id (string-encoded u128).
        max_currency: Vec<String>,
        /// Latest acceptable execution time (unix seconds).
        deadline: u64,
    },
    /// Sell the transferred assets.
    SellAsset {
        /// Account receiving the currency.
        recipient: AccountId,
        /// Minimum total currency (string-encoded u128).
        min_currency: String,
        /// Latest acceptable execution time (unix seconds).
        deadline: u64,
    },
    /// Redeem the transferred LP shares.
    RemoveLiquidity {
        /// Minimum currency per id (string-encoded u128).
        min_currency: Vec<String>,
        /// Minimum asset units per id (string-encoded u128).
        min_asset: Vec<String>,
        /// Latest acceptable execution time (unix seconds).
        deadline: u64,
    },
}

impl TryFrom<CommandDto> for Command {
    type Error = ExchangeError;

    fn try_from(dto: CommandDto) -> Result<Self, Self::Error> {
        Ok(match dto {
            CommandDto::AddLiquidity {
                max_currency,
                deadline,
            } => Self::AddLiquidity(AddLiquidity {
                max_currency: parse_amounts("max_currency", &max_currency)?,
                deadline,
            }),
            CommandDto::SellAsset {
                recipient,
                min_currency,
                deadline,
            } => Self::SellAsset(SellAsset {
                recipient,
                min_currency: parse_amount("min_currency", &min_currency)?,
                deadline,
            }),
            CommandDto::RemoveLiquidity {
                min_currency,
                min_asset,
                deadline,
            } => Self::RemoveLiquidity(RemoveLiquidity {
                min_currency: parse_amounts("min_currency", &min_currency)?,
                min_asset: parse_amounts("min_asset", &min_asset)?,
                deadline,
            }),
        })
    }
}

/// Request body for `POST /transfers`.
///
/// Exactly one of `command` (typed) or `data` (hex-encoded opaque payload)
/// must be present.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TransferRequest {
    /// Account the units are transferred from.
    pub sender: AccountId,
    /// Asset ids (share ids for liquidity removal).
    pub ids: Vec<AssetId>,
    /// Units per id (string-encoded u128).
    pub amounts: Vec<String>,
    /// Typed command.
    #[serde(default)]
    pub command: Option<CommandDto>,
    /// Opaque command payload, hex-encoded.
    #[serde(default)]
    pub data: Option<String>,
}

impl TransferRequest {
    /// Converts the request into a decoded batch transfer.
    ///
    /// # Errors
    ///
    /// Returns [`ExchangeError::InvalidRequest`] if both or neither command
    /// forms are present or an amount does not parse, and the decoder's
    /// errors for a bad opaque payload.
    pub fn into_transfer(self) -> Result<BatchTransfer, ExchangeError> {
        let amounts = parse_amounts("amounts", &self.amounts)?;
        let command = match (self.command, self.data) {
            (Some(dto), None) => Command::try_from(dto)?,
            (None, Some(hex)) => Command::decode(&decode_hex(&hex)?)?,
            _ => {
                return Err(ExchangeError::InvalidRequest(
                    "exactly one of command or data is required".to_string(),
                ));
            }
        };
        Ok(BatchTransfer {
            sender: self.sender,
            ids: self.ids,
            amounts,
            command,
        })
    }
}

/// One settled entry of a batch.
#[derive(Debug, Serialize, ToSchema)]
pub struct LegDto {
    /// Pool the leg executed against.
    pub asset_id: AssetId,
    /// Asset units moved (string-encoded).
    pub asset_amount: String,
    /// Currency moved (string-encoded).
    pub currency_amount: String,
    /// Shares minted or burned (string-encoded).
    pub shares: String,
}

impl From<&LegReceipt> for LegDto {
    fn from(leg: &LegReceipt) -> Self {
        Self {
            asset_id: leg.asset_id,
            asset_amount: leg.asset_amount.to_string(),
            currency_amount: leg.currency_amount.to_string(),
            shares: leg.shares.to_string(),
        }
    }
}

/// Response body for `POST /buy` and `POST /transfers`.
#[derive(Debug, Serialize, ToSchema)]
pub struct BatchReceiptResponse {
    /// Correlation id shared with the emitted events.
    pub batch_id: Uuid,
    /// Operation performed.
    pub kind: String,
    /// Account that initiated the batch.
    pub sender: AccountId,
    /// Account that received the proceeds.
    pub recipient: AccountId,
    /// Per-entry amounts in request order.
    pub legs: Vec<LegDto>,
    /// Total currency paid or received (string-encoded).
    pub total_currency: String,
    /// Pools closed by this batch.
    pub closed_pools: Vec<AssetId>,
    /// Exchange time of execution (unix seconds).
    pub executed_at: u64,
    /// Commit timestamp.
    pub committed_at: DateTime<Utc>,
}

impl From<&BatchReceipt> for BatchReceiptResponse {
    fn from(receipt: &BatchReceipt) -> Self {
        Self {
            batch_id: receipt.batch_id,
            kind: receipt.kind.as_str().to_string(),
            sender: receipt.sender.clone(),
            recipient: receipt.recipient.clone(),
            legs: receipt.legs.iter().map(LegDto::from).collect(),
            total_currency: receipt.total_currency.to_string(),
            closed_pools: receipt.closed_pools.clone(),
            executed_at: receipt.executed_at,
            committed_at: receipt.committed_at,
        }
    }
}
