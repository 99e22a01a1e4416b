//! Exchange engine: pricing, command dispatch and batch settlement.
//!
//! [`Exchange`] is synchronous and runs every batch inside one critical
//! section: validate, price against staged pools, settle through the
//! [`crate::ledger::LedgerBridge`], then commit. Nothing is visible to other
//! callers until the commit.

pub mod admin;
pub mod clock;
pub mod exchange;
pub mod pricing;
pub mod receipt;

pub use admin::AdminCapability;
pub use clock::{Clock, ManualClock, SystemClock};
pub use exchange::Exchange;
pub use pricing::{AddQuote, PricingEngine, RemoveQuote};
pub use receipt::{BatchKind, BatchReceipt, LegReceipt};

#[cfg(test)]
#[allow(clippy::panic)]
mod proptest_properties;
#[cfg(test)]
pub(crate) mod test_support;
