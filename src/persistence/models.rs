//! Database rows for events and snapshots.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::{ExchangeEvent, PoolEntry};
use crate::error::ExchangeError;

/// A row of the `events` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventRecord {
    /// Batch correlation id (absent for fee changes).
    pub batch_id: Option<Uuid>,
    /// Event type discriminator (e.g. `"assets_purchased"`).
    pub event_type: String,
    /// Asset ids the event concerns, as decimal strings.
    pub asset_ids: Vec<String>,
    /// Full event as JSONB.
    pub payload: serde_json::Value,
    /// When the event happened.
    pub occurred_at: DateTime<Utc>,
}

impl TryFrom<&ExchangeEvent> for EventRecord {
    type Error = ExchangeError;

    fn try_from(event: &ExchangeEvent) -> Result<Self, Self::Error> {
        let payload = serde_json::to_value(event)
            .map_err(|e| ExchangeError::PersistenceError(e.to_string()))?;
        Ok(Self {
            batch_id: event.batch_id(),
            event_type: event.event_type_str().to_string(),
            asset_ids: event.asset_ids().iter().map(ToString::to_string).collect(),
            payload,
            occurred_at: event.timestamp(),
        })
    }
}

/// A row of the `pool_snapshots` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotRecord {
    /// Pool asset id.
    pub asset_id: String,
    /// Currency reserve.
    pub currency_reserve: String,
    /// Asset reserve.
    pub asset_reserve: String,
    /// Outstanding LP shares.
    pub total_shares: String,
    /// Trades executed so far.
    pub trade_count: i64,
    /// Cumulative currency traded.
    pub currency_volume: String,
}

impl From<&PoolEntry> for SnapshotRecord {
    fn from(entry: &PoolEntry) -> Self {
        Self {
            asset_id: entry.asset_id.to_string(),
            currency_reserve: entry.pool.currency_reserve().to_string(),
            asset_reserve: entry.pool.asset_reserve().to_string(),
            total_shares: entry.pool.total_shares().to_string(),
            trade_count: i64::try_from(entry.trade_count).unwrap_or(i64::MAX),
            currency_volume: entry.currency_volume.to_string(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use hydra_amm::domain::Amount;

    use super::*;
    use crate::domain::{AccountId, AssetId, Pool, TradeLeg};

    #[test]
    fn event_record_indexes_asset_ids() {
        let batch_id = Uuid::new_v4();
        let event = ExchangeEvent::AssetsSold {
            batch_id,
            seller: AccountId::new("ann"),
            recipient: AccountId::new("ann"),
            legs: vec![TradeLeg {
                asset_id: AssetId::new(3),
                asset_amount: "5".to_string(),
                currency_amount: "9".to_string(),
            }],
            total_currency: "9".to_string(),
            timestamp: Utc::now(),
        };
        let Ok(record) = EventRecord::try_from(&event) else {
            panic!("event must convert");
        };
        assert_eq!(record.batch_id, Some(batch_id));
        assert_eq!(record.event_type, "assets_sold");
        assert_eq!(record.asset_ids, vec!["3".to_string()]);
        assert_eq!(
            record.payload.get("event_type"),
            Some(&serde_json::json!("assets_sold"))
        );
    }

    #[test]
    fn fee_change_has_no_batch() {
        let event = ExchangeEvent::FeeUpdated {
            old_fee_bps: 0,
            new_fee_bps: 25,
            timestamp: Utc::now(),
        };
        let Ok(record) = EventRecord::try_from(&event) else {
            panic!("event must convert");
        };
        assert!(record.batch_id.is_none());
        assert!(record.asset_ids.is_empty());
    }

    #[test]
    fn snapshot_keeps_full_precision() {
        let big = u128::MAX - 1;
        let pool = Pool::new(Amount::new(big), Amount::new(7), Amount::new(11));
        let entry = PoolEntry::new(AssetId::new(42), pool);
        let record = SnapshotRecord::from(&entry);
        assert_eq!(record.asset_id, "42");
        assert_eq!(record.currency_reserve, big.to_string());
        assert_eq!(record.total_shares, "11");
        assert_eq!(record.trade_count, 0);
    }
}
