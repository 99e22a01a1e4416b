//! WebSocket layer: connection handling, message routing, subscriptions.
//!
//! The WebSocket endpoint at `/ws` streams [`crate::domain::ExchangeEvent`]s
//! for the asset ids a client subscribes to and answers read-only queries.

pub mod connection;
pub mod handler;
pub mod messages;
pub mod subscription;
