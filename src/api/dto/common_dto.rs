//! Shared DTO types and parsing helpers used across multiple endpoints.

use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::domain::AssetId;
use crate::error::ExchangeError;

/// Pagination query parameters for list endpoints.
#[derive(Debug, Clone, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct PaginationParams {
    /// Page number (1-indexed). Defaults to 1.
    #[serde(default = "default_page")]
    pub page: u32,
    /// Items per page (max 100). Defaults to 20.
    #[serde(default = "default_per_page")]
    pub per_page: u32,
}

/// Pagination metadata included in list responses.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PaginationMeta {
    /// Current page number.
    pub page: u32,
    /// Items per page.
    pub per_page: u32,
    /// Total number of items.
    pub total: u32,
    /// Total number of pages.
    pub total_pages: u32,
}

fn default_page() -> u32 {
    1
}

fn default_per_page() -> u32 {
    20
}

impl PaginationParams {
    /// Clamps `page` to at least 1 and `per_page` to `1..=100`.
    #[must_use]
    pub fn clamped(&self) -> Self {
        Self {
            page: self.page.max(1),
            per_page: self.per_page.clamp(1, 100),
        }
    }

    /// Number of items skipped before the current page.
    #[must_use]
    pub fn offset(&self) -> usize {
        let skipped = u64::from(self.page.saturating_sub(1)) * u64::from(self.per_page);
        usize::try_from(skipped).unwrap_or(usize::MAX)
    }

    /// Builds the response metadata for a collection of `total` items.
    #[must_use]
    pub fn meta(&self, total: usize) -> PaginationMeta {
        let total = u32::try_from(total).unwrap_or(u32::MAX);
        PaginationMeta {
            page: self.page,
            per_page: self.per_page,
            total,
            total_pages: total.div_ceil(self.per_page.max(1)),
        }
    }
}

/// Parses a string-encoded u128 amount.
///
/// # Errors
///
/// Returns [`ExchangeError::InvalidRequest`] naming `field` if the value is
/// not a decimal u128.
pub fn parse_amount(field: &str, value: &str) -> Result<u128, ExchangeError> {
    value
        .parse()
        .map_err(|_| ExchangeError::InvalidRequest(format!("invalid {field}: {value:?}")))
}

/// Parses a list of string-encoded u128 amounts.
///
/// # Errors
///
/// Returns [`ExchangeError::InvalidRequest`] on the first invalid entry.
pub fn parse_amounts(field: &str, values: &[String]) -> Result<Vec<u128>, ExchangeError> {
    values.iter().map(|v| parse_amount(field, v)).collect()
}

/// Decodes a hex string, with or without a `0x` prefix.
///
/// # Errors
///
/// Returns [`ExchangeError::MalformedPayload`] on an odd digit count or a
/// non-hex character.
pub fn decode_hex(value: &str) -> Result<Vec<u8>, ExchangeError> {
    let digits = value.strip_prefix("0x").unwrap_or(value);
    if digits.len() % 2 != 0 {
        return Err(ExchangeError::MalformedPayload(
            "hex payload has an odd number of digits".to_string(),
        ));
    }
    let nibbles = digits
        .chars()
        .map(|c| {
            c.to_digit(16)
                .and_then(|d| u8::try_from(d).ok())
                .ok_or_else(|| ExchangeError::MalformedPayload(format!("invalid hex digit {c:?}")))
        })
        .collect::<Result<Vec<u8>, _>>()?;
    Ok(nibbles
        .chunks_exact(2)
        .map(|pair| pair.iter().fold(0u8, |byte, nibble| (byte << 4) | nibble))
        .collect())
}

/// Parses a comma-separated list of asset ids.
///
/// # Errors
///
/// Returns [`ExchangeError::InvalidRequest`] on an empty list or an entry
/// that is not a decimal u64.
pub fn parse_ids(value: &str) -> Result<Vec<AssetId>, ExchangeError> {
    let ids = value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<u64>()
                .map(AssetId::new)
                .map_err(|_| ExchangeError::InvalidRequest(format!("invalid asset id: {s:?}")))
        })
        .collect::<Result<Vec<_>, _>>()?;
    if ids.is_empty() {
        return Err(ExchangeError::InvalidRequest("no asset ids given".to_string()));
    }
    Ok(ids)
}
