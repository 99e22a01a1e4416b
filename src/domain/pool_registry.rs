//! Pool storage with staged, all-or-nothing batch commits.
//!
//! [`PoolRegistry`] holds the committed reserves of every live pool. Batches
//! never touch it directly: they price and mutate copies inside a
//! [`PoolBatch`], and only a fully validated and settled batch is folded back
//! in with [`PoolRegistry::commit`]. Dropping a `PoolBatch` discards it.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use hydra_amm::domain::Amount;

use super::pool::{Pool, PoolEntry, PoolSummary};
use super::AssetId;

/// Central store for all live pools, keyed by asset id.
///
/// Pools appear on their first liquidity deposit and disappear again once
/// their share supply returns to zero.
#[derive(Debug, Default)]
pub struct PoolRegistry {
    pools: BTreeMap<AssetId, PoolEntry>,
}

impl PoolRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the committed entry for `asset_id`, if the pool is live.
    #[must_use]
    pub fn get(&self, asset_id: AssetId) -> Option<&PoolEntry> {
        self.pools.get(&asset_id)
    }

    /// Returns the committed reserves for `asset_id`, or [`Pool::EMPTY`].
    #[must_use]
    pub fn pool(&self, asset_id: AssetId) -> Pool {
        self.pools
            .get(&asset_id)
            .map(|entry| entry.pool)
            .unwrap_or(Pool::EMPTY)
    }

    /// Returns summaries of all live pools in asset id order.
    #[must_use]
    pub fn list(&self) -> Vec<PoolSummary> {
        self.pools.values().map(PoolSummary::from).collect()
    }

    /// Returns clones of all live entries in asset id order.
    #[must_use]
    pub fn entries(&self) -> Vec<PoolEntry> {
        self.pools.values().cloned().collect()
    }

    /// Returns the number of live pools.
    #[must_use]
    pub fn len(&self) -> usize {
        self.pools.len()
    }

    /// Returns `true` if the registry contains no pools.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pools.is_empty()
    }

    /// Folds a staged batch into the committed state.
    ///
    /// Pools whose share supply reached zero are removed. Returns the ids of
    /// pools closed by this commit.
    pub fn commit(&mut self, batch: PoolBatch, now: DateTime<Utc>) -> Vec<AssetId> {
        let mut closed = Vec::new();
        for (asset_id, staged) in batch.staged {
            if staged.pool.is_empty() {
                if self.pools.remove(&asset_id).is_some() {
                    closed.push(asset_id);
                }
                continue;
            }
            let entry = self
                .pools
                .entry(asset_id)
                .or_insert_with(|| PoolEntry::new(asset_id, staged.pool));
            entry.pool = staged.pool;
            entry.last_modified_at = now;
            entry.trade_count = entry.trade_count.saturating_add(staged.trades);
            entry.currency_volume = entry.currency_volume.saturating_add(staged.volume);
        }
        closed
    }
}

#[derive(Debug, Clone, Copy)]
struct StagedPool {
    pool: Pool,
    trades: u64,
    volume: u128,
}

/// Working copy of the pools touched by one batch.
///
/// Reads fall through to the registry until an id is first written; after
/// that the staged copy wins, so repeated ids inside a batch see each
/// other's effects.
#[derive(Debug, Default)]
pub struct PoolBatch {
    staged: BTreeMap<AssetId, StagedPool>,
}

impl PoolBatch {
    /// Creates an empty batch.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current view of `asset_id`: staged if touched, otherwise committed.
    #[must_use]
    pub fn pool(&self, registry: &PoolRegistry, asset_id: AssetId) -> Pool {
        self.staged
            .get(&asset_id)
            .map(|staged| staged.pool)
            .unwrap_or_else(|| registry.pool(asset_id))
    }

    /// Stages a liquidity change for `asset_id`.
    pub fn put(&mut self, asset_id: AssetId, pool: Pool) {
        self.stage(asset_id, pool, 0, 0);
    }

    /// Stages a trade against `asset_id`, recording its currency volume.
    pub fn put_trade(&mut self, asset_id: AssetId, pool: Pool, currency: Amount) {
        self.stage(asset_id, pool, 1, currency.get());
    }

    fn stage(&mut self, asset_id: AssetId, pool: Pool, trades: u64, volume: u128) {
        let staged = self.staged.entry(asset_id).or_insert(StagedPool {
            pool,
            trades: 0,
            volume: 0,
        });
        staged.pool = pool;
        staged.trades = staged.trades.saturating_add(trades);
        staged.volume = staged.volume.saturating_add(volume);
    }

    /// Returns `true` if nothing has been staged.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.staged.is_empty()
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    fn pool(c: u128, a: u128, s: u128) -> Pool {
        Pool::new(Amount::new(c), Amount::new(a), Amount::new(s))
    }

    fn seeded() -> PoolRegistry {
        let mut registry = PoolRegistry::new();
        let mut batch = PoolBatch::new();
        batch.put(AssetId::new(1), pool(100, 100, 100));
        batch.put(AssetId::new(2), pool(100, 200, 100));
        let _ = registry.commit(batch, Utc::now());
        registry
    }

    #[test]
    fn missing_pool_reads_as_empty() {
        let registry = PoolRegistry::new();
        assert_eq!(registry.pool(AssetId::new(9)), Pool::EMPTY);
        assert!(registry.get(AssetId::new(9)).is_none());
    }

    #[test]
    fn commit_creates_pools() {
        let registry = seeded();
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.pool(AssetId::new(2)), pool(100, 200, 100));
    }

    #[test]
    fn dropped_batch_leaves_registry_untouched() {
        let registry = seeded();
        {
            let mut batch = PoolBatch::new();
            batch.put(AssetId::new(1), pool(1, 1, 1));
            assert_eq!(batch.pool(&registry, AssetId::new(1)), pool(1, 1, 1));
        }
        assert_eq!(registry.pool(AssetId::new(1)), pool(100, 100, 100));
    }

    #[test]
    fn staged_reads_see_earlier_writes() {
        let registry = seeded();
        let mut batch = PoolBatch::new();
        assert_eq!(batch.pool(&registry, AssetId::new(1)), pool(100, 100, 100));
        batch.put_trade(AssetId::new(1), pool(200, 50, 100), Amount::new(100));
        assert_eq!(batch.pool(&registry, AssetId::new(1)), pool(200, 50, 100));
    }

    #[test]
    fn commit_records_trade_metadata() {
        let mut registry = seeded();
        let mut batch = PoolBatch::new();
        batch.put_trade(AssetId::new(1), pool(200, 50, 100), Amount::new(100));
        batch.put_trade(AssetId::new(1), pool(150, 67, 100), Amount::new(50));
        let closed = registry.commit(batch, Utc::now());
        assert!(closed.is_empty());

        let Some(entry) = registry.get(AssetId::new(1)) else {
            panic!("pool vanished");
        };
        assert_eq!(entry.trade_count, 2);
        assert_eq!(entry.currency_volume, 150);
        assert_eq!(entry.pool, pool(150, 67, 100));
    }

    #[test]
    fn commit_removes_drained_pools() {
        let mut registry = seeded();
        let mut batch = PoolBatch::new();
        batch.put(AssetId::new(2), Pool::EMPTY);
        let closed = registry.commit(batch, Utc::now());
        assert_eq!(closed, vec![AssetId::new(2)]);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn list_is_ordered_by_asset_id() {
        let registry = seeded();
        let ids: Vec<AssetId> = registry.list().into_iter().map(|s| s.asset_id).collect();
        assert_eq!(ids, vec![AssetId::new(1), AssetId::new(2)]);
    }
}
