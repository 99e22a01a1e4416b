//! Type-safe identifiers for assets and ledger accounts.
//!
//! [`AssetId`] names one id of the multi-id asset ledger. Every asset id has
//! at most one pool, and the LP shares of that pool carry the same id on the
//! share ledger. [`AccountId`] names a holder on any of the ledgers.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifier of an asset on the multi-id asset ledger.
///
/// Also used as the pool key in [`super::PoolRegistry`] and as the share id
/// on the share ledger.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    utoipa::ToSchema,
)]
#[serde(transparent)]
pub struct AssetId(u64);

impl AssetId {
    /// Creates an `AssetId` from its raw ledger value.
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the raw ledger value.
    #[must_use]
    pub const fn get(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for AssetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for AssetId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

impl From<AssetId> for u64 {
    fn from(id: AssetId) -> Self {
        id.0
    }
}

/// Address of a holder on the currency, asset or share ledger.
#[derive(
    Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, utoipa::ToSchema,
)]
#[serde(transparent)]
pub struct AccountId(String);

impl AccountId {
    /// Creates an `AccountId` from any string-like address.
    #[must_use]
    pub fn new(address: impl Into<String>) -> Self {
        Self(address.into())
    }

    /// Returns the address as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for AccountId {
    fn from(address: &str) -> Self {
        Self(address.to_string())
    }
}
