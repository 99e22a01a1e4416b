//! Persistence layer: PostgreSQL event log and pool snapshots.
//!
//! Persistence is optional and write-behind: the exchange never waits on
//! the database. [`recorder`] drains the event bus into the `events` table
//! and periodically snapshots every live pool.

pub mod models;
pub mod postgres;
pub mod recorder;

pub use models::{EventRecord, SnapshotRecord};
pub use postgres::PostgresPersistence;
