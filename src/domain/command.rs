//! Batch commands and their opaque wire encoding.
//!
//! Liquidity deposits, sells and withdrawals arrive as a batch transfer of
//! `(id, amount)` pairs plus a [`Command`] describing what to do with them.
//! The command is normally passed as a typed value; [`Command::decode`]
//! accepts the opaque byte form carried by inbound-transfer payloads.
//!
//! # Wire format
//!
//! All integers are big-endian.
//!
//! ```text
//! selector[4] | deadline u64 | body
//!
//! AddLiquidity     body = u128[] max_currency
//! SellAsset        body = u16 len | utf8 recipient | u128 min_currency
//! RemoveLiquidity  body = u128[] min_currency | u128[] min_asset
//!
//! u128[] = u32 count | count * u128
//! ```

use serde::{Deserialize, Serialize};

use super::{AccountId, AssetId};
use crate::error::ExchangeError;

/// Selector of [`Command::AddLiquidity`].
pub const ADD_LIQUIDITY_SELECTOR: u32 = 0x82da_2b73;
/// Selector of [`Command::SellAsset`].
pub const SELL_ASSET_SELECTOR: u32 = 0xade7_9c7a;
/// Selector of [`Command::RemoveLiquidity`].
pub const REMOVE_LIQUIDITY_SELECTOR: u32 = 0x5c0b_f259;

/// Upper bound on array lengths accepted from the wire.
const MAX_BATCH_LEN: usize = 1024;

/// Deposit the transferred assets as liquidity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddLiquidity {
    /// Maximum currency the provider is willing to pair with each id.
    pub max_currency: Vec<u128>,
    /// Latest acceptable execution time (unix seconds).
    pub deadline: u64,
}

/// Sell the transferred assets for currency.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SellAsset {
    /// Account receiving the currency.
    pub recipient: AccountId,
    /// Minimum total currency accepted across the whole batch.
    pub min_currency: u128,
    /// Latest acceptable execution time (unix seconds).
    pub deadline: u64,
}

/// Redeem the transferred LP shares.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoveLiquidity {
    /// Minimum currency accepted per id.
    pub min_currency: Vec<u128>,
    /// Minimum asset units accepted per id.
    pub min_asset: Vec<u128>,
    /// Latest acceptable execution time (unix seconds).
    pub deadline: u64,
}

/// Operation requested alongside an inbound batch transfer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum Command {
    /// Deposit assets (plus currency) into their pools.
    AddLiquidity(AddLiquidity),
    /// Sell assets into their pools.
    SellAsset(SellAsset),
    /// Burn LP shares for a proportional cut of the reserves.
    RemoveLiquidity(RemoveLiquidity),
}

impl Command {
    /// The fixed selector identifying this command kind.
    #[must_use]
    pub const fn selector(&self) -> u32 {
        match self {
            Self::AddLiquidity(_) => ADD_LIQUIDITY_SELECTOR,
            Self::SellAsset(_) => SELL_ASSET_SELECTOR,
            Self::RemoveLiquidity(_) => REMOVE_LIQUIDITY_SELECTOR,
        }
    }

    /// The command deadline (unix seconds).
    #[must_use]
    pub const fn deadline(&self) -> u64 {
        match self {
            Self::AddLiquidity(cmd) => cmd.deadline,
            Self::SellAsset(cmd) => cmd.deadline,
            Self::RemoveLiquidity(cmd) => cmd.deadline,
        }
    }

    /// Short name used in logs and events.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::AddLiquidity(_) => "add_liquidity",
            Self::SellAsset(_) => "sell_asset",
            Self::RemoveLiquidity(_) => "remove_liquidity",
        }
    }

    /// Encodes the command into its opaque wire form.
    ///
    /// # Errors
    ///
    /// Returns [`ExchangeError::MalformedPayload`] if the recipient is longer
    /// than `u16::MAX` bytes or an array exceeds the batch length limit.
    pub fn encode(&self) -> Result<Vec<u8>, ExchangeError> {
        let mut out = Vec::with_capacity(64);
        out.extend_from_slice(&self.selector().to_be_bytes());
        out.extend_from_slice(&self.deadline().to_be_bytes());
        match self {
            Self::AddLiquidity(cmd) => write_u128_array(&mut out, &cmd.max_currency)?,
            Self::SellAsset(cmd) => {
                let recipient = cmd.recipient.as_str().as_bytes();
                let len = u16::try_from(recipient.len()).map_err(|_| {
                    ExchangeError::MalformedPayload(format!(
                        "recipient of {} bytes exceeds limit of {}",
                        recipient.len(),
                        u16::MAX
                    ))
                })?;
                out.extend_from_slice(&len.to_be_bytes());
                out.extend_from_slice(recipient);
                out.extend_from_slice(&cmd.min_currency.to_be_bytes());
            }
            Self::RemoveLiquidity(cmd) => {
                write_u128_array(&mut out, &cmd.min_currency)?;
                write_u128_array(&mut out, &cmd.min_asset)?;
            }
        }
        Ok(out)
    }

    /// Decodes a command from its opaque wire form.
    ///
    /// # Errors
    ///
    /// Returns [`ExchangeError::InvalidCommand`] for an unknown selector and
    /// [`ExchangeError::MalformedPayload`] for truncated, oversized or
    /// trailing data.
    pub fn decode(data: &[u8]) -> Result<Self, ExchangeError> {
        let mut reader = PayloadReader::new(data);
        let selector = reader.read_u32()?;
        if !matches!(
            selector,
            ADD_LIQUIDITY_SELECTOR | SELL_ASSET_SELECTOR | REMOVE_LIQUIDITY_SELECTOR
        ) {
            return Err(ExchangeError::InvalidCommand(selector));
        }
        let deadline = reader.read_u64()?;
        let command = match selector {
            ADD_LIQUIDITY_SELECTOR => Self::AddLiquidity(AddLiquidity {
                max_currency: reader.read_u128_array()?,
                deadline,
            }),
            SELL_ASSET_SELECTOR => {
                let recipient = reader.read_string()?;
                Self::SellAsset(SellAsset {
                    recipient: AccountId::new(recipient),
                    min_currency: reader.read_u128()?,
                    deadline,
                })
            }
            _ => Self::RemoveLiquidity(RemoveLiquidity {
                min_currency: reader.read_u128_array()?,
                min_asset: reader.read_u128_array()?,
                deadline,
            }),
        };
        reader.finish()?;
        Ok(command)
    }
}

fn write_u128_array(out: &mut Vec<u8>, values: &[u128]) -> Result<(), ExchangeError> {
    let count = u32::try_from(values.len())
        .ok()
        .filter(|_| values.len() <= MAX_BATCH_LEN)
        .ok_or_else(|| {
            ExchangeError::MalformedPayload(format!(
                "array of {} entries exceeds limit of {MAX_BATCH_LEN}",
                values.len()
            ))
        })?;
    out.extend_from_slice(&count.to_be_bytes());
    for value in values {
        out.extend_from_slice(&value.to_be_bytes());
    }
    Ok(())
}

/// Bounds-checked sequential reader over a command payload.
#[derive(Debug)]
struct PayloadReader<'a> {
    data: &'a [u8],
    offset: usize,
}

impl<'a> PayloadReader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, offset: 0 }
    }

    fn read_bytes<const N: usize>(&mut self) -> Result<[u8; N], ExchangeError> {
        let end = self
            .offset
            .checked_add(N)
            .ok_or_else(|| truncated(self.offset))?;
        let slice = self
            .data
            .get(self.offset..end)
            .ok_or_else(|| truncated(self.offset))?;
        let mut bytes = [0u8; N];
        bytes.copy_from_slice(slice);
        self.offset = end;
        Ok(bytes)
    }

    fn read_u16(&mut self) -> Result<u16, ExchangeError> {
        self.read_bytes::<2>().map(u16::from_be_bytes)
    }

    fn read_u32(&mut self) -> Result<u32, ExchangeError> {
        self.read_bytes::<4>().map(u32::from_be_bytes)
    }

    fn read_u64(&mut self) -> Result<u64, ExchangeError> {
        self.read_bytes::<8>().map(u64::from_be_bytes)
    }

    fn read_u128(&mut self) -> Result<u128, ExchangeError> {
        self.read_bytes::<16>().map(u128::from_be_bytes)
    }

    fn read_u128_array(&mut self) -> Result<Vec<u128>, ExchangeError> {
        let count = usize::try_from(self.read_u32()?).unwrap_or(usize::MAX);
        if count > MAX_BATCH_LEN {
            return Err(ExchangeError::MalformedPayload(format!(
                "array of {count} entries exceeds limit of {MAX_BATCH_LEN}"
            )));
        }
        (0..count).map(|_| self.read_u128()).collect()
    }

    fn read_string(&mut self) -> Result<String, ExchangeError> {
        let len = usize::from(self.read_u16()?);
        let end = self
            .offset
            .checked_add(len)
            .ok_or_else(|| truncated(self.offset))?;
        let bytes = self
            .data
            .get(self.offset..end)
            .ok_or_else(|| truncated(self.offset))?;
        let text = std::str::from_utf8(bytes)
            .map_err(|e| ExchangeError::MalformedPayload(format!("recipient is not utf-8: {e}")))?;
        self.offset = end;
        Ok(text.to_string())
    }

    fn finish(self) -> Result<(), ExchangeError> {
        let trailing = self.data.len().saturating_sub(self.offset);
        if trailing > 0 {
            return Err(ExchangeError::MalformedPayload(format!(
                "{trailing} trailing bytes after command"
            )));
        }
        Ok(())
    }
}

fn truncated(offset: usize) -> ExchangeError {
    ExchangeError::MalformedPayload(format!("payload truncated at byte {offset}"))
}

/// Inbound batch transfer: the assets (or shares) a sender hands to the
/// exchange together with the command to apply to them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchTransfer {
    /// Account the units are transferred from.
    pub sender: AccountId,
    /// Asset ids (share ids for [`Command::RemoveLiquidity`]).
    pub ids: Vec<AssetId>,
    /// Amount transferred per id.
    pub amounts: Vec<u128>,
    /// Requested operation.
    pub command: Command,
}

/// Direct purchase of assets with currency.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuyOrder {
    /// Asset ids to buy.
    pub ids: Vec<AssetId>,
    /// Exact asset units wanted per id.
    pub amounts_out: Vec<u128>,
    /// Maximum total currency the buyer will pay.
    pub max_currency: u128,
    /// Latest acceptable execution time (unix seconds).
    pub deadline: u64,
    /// Account receiving the assets.
    pub recipient: AccountId,
}
