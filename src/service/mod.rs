//! Service layer: sequencing and event emission.
//!
//! [`ExchangeService`] queues top-level calls onto the synchronous
//! [`crate::engine::Exchange`] and publishes the events of every committed
//! batch through the [`super::domain::EventBus`].

pub mod exchange_service;

pub use exchange_service::ExchangeService;
