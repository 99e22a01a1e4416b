//! Per-connection subscription manager.
//!
//! Tracks which asset ids a WebSocket client follows and filters events
//! server-side.

use std::collections::BTreeSet;

use crate::domain::{AssetId, ExchangeEvent};

/// Manages the set of asset subscriptions for a single WebSocket connection.
#[derive(Debug, Default)]
pub struct SubscriptionManager {
    /// Subscribed asset ids. Ignored while `subscribe_all` is set.
    asset_ids: BTreeSet<AssetId>,
    /// Whether the client follows every pool (wildcard `"*"`).
    subscribe_all: bool,
}

impl SubscriptionManager {
    /// Creates a new empty subscription manager.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds asset ids to the subscription set, optionally enabling the
    /// wildcard.
    pub fn subscribe(&mut self, ids: &[AssetId], wildcard: bool) {
        if wildcard {
            self.subscribe_all = true;
        }
        self.asset_ids.extend(ids.iter().copied());
    }

    /// Removes asset ids from the subscription set. Removing the wildcard
    /// turns it off.
    pub fn unsubscribe(&mut self, ids: &[AssetId], wildcard: bool) {
        if wildcard {
            self.subscribe_all = false;
        }
        for id in ids {
            self.asset_ids.remove(id);
        }
    }

    /// Returns `true` if the event concerns a followed pool.
    #[must_use]
    pub fn matches(&self, event: &ExchangeEvent) -> bool {
        self.subscribe_all || self.asset_ids.iter().any(|id| event.touches(*id))
    }

    /// Explicitly subscribed asset ids in ascending order.
    #[must_use]
    pub fn ids(&self) -> Vec<AssetId> {
        self.asset_ids.iter().copied().collect()
    }

    /// Returns the number of explicitly subscribed asset ids.
    #[must_use]
    pub fn count(&self) -> usize {
        self.asset_ids.len()
    }

    /// Returns `true` if the wildcard subscription is active.
    #[must_use]
    pub fn is_subscribed_all(&self) -> bool {
        self.subscribe_all
    }
}
