//! Background tasks feeding the persistence layer.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time;

use super::models::{EventRecord, SnapshotRecord};
use super::postgres::PostgresPersistence;
use crate::domain::ExchangeEvent;
use crate::service::ExchangeService;

/// Spawns a task appending every event received on `rx` to the event log.
///
/// The task ends when the event bus closes. Database failures are logged
/// and the event is dropped.
pub fn spawn_event_recorder(
    store: PostgresPersistence,
    mut rx: broadcast::Receiver<ExchangeEvent>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(event) => {
                    let record = match EventRecord::try_from(&event) {
                        Ok(record) => record,
                        Err(e) => {
                            tracing::error!(error = %e, "failed to encode event");
                            continue;
                        }
                    };
                    if let Err(e) = store.save_event(&record).await {
                        tracing::error!(
                            error = %e,
                            event_type = %record.event_type,
                            "failed to persist event"
                        );
                    }
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!(lagged = n, "event recorder lagged behind event bus");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
        tracing::debug!("event recorder stopped");
    })
}

/// Spawns a task that snapshots every live pool each `interval` and prunes
/// snapshots older than `cleanup_after_days` (0 disables pruning).
pub fn spawn_snapshotter(
    store: PostgresPersistence,
    service: Arc<ExchangeService>,
    interval: Duration,
    cleanup_after_days: u64,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = time::interval(interval.max(Duration::from_secs(1)));
        loop {
            ticker.tick().await;

            let entries = match service.pool_entries().await {
                Ok(entries) => entries,
                Err(e) => {
                    tracing::error!(error = %e, "failed to read pools for snapshot");
                    continue;
                }
            };
            let mut saved = 0usize;
            for entry in &entries {
                match store.save_snapshot(&SnapshotRecord::from(entry)).await {
                    Ok(_) => saved += 1,
                    Err(e) => {
                        tracing::error!(error = %e, asset_id = %entry.asset_id, "snapshot failed");
                    }
                }
            }
            tracing::debug!(saved, pools = entries.len(), "pool snapshot taken");

            if cleanup_after_days > 0 {
                match store.delete_old_snapshots(cleanup_after_days).await {
                    Ok(0) => {}
                    Ok(deleted) => tracing::info!(deleted, "old snapshots pruned"),
                    Err(e) => tracing::error!(error = %e, "snapshot cleanup failed"),
                }
            }
        }
    })
}
