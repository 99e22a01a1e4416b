//! Shared application state injected into all Axum handlers.

use std::sync::Arc;

use crate::domain::EventBus;
use crate::service::ExchangeService;

/// Shared application state available to all handlers via Axum's
/// `State` extractor.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Exchange service for every trading and liquidity call.
    pub service: Arc<ExchangeService>,
    /// Event bus for WebSocket subscriptions.
    pub event_bus: EventBus,
}

impl AppState {
    /// Builds the state from a service, sharing its event bus.
    #[must_use]
    pub fn new(service: Arc<ExchangeService>) -> Self {
        let event_bus = service.event_bus().clone();
        Self { service, event_bus }
    }
}
