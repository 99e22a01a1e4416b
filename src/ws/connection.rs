//! WebSocket connection state machine.
//!
//! Handles the read/write loop for a single WebSocket connection,
//! dispatching incoming commands and forwarding filtered events.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::broadcast;

use super::messages::{SubscriptionTarget, WsCommand, WsMessage, WsMessageType};
use super::subscription::SubscriptionManager;
use crate::api::dto::{PoolDetailResponse, parse_amounts};
use crate::domain::{AssetId, ExchangeEvent};
use crate::error::ExchangeError;
use crate::service::ExchangeService;

/// Runs the read/write loop for a single WebSocket connection.
///
/// - Reads commands from the client and answers them.
/// - Forwards matching events from the [`broadcast::Receiver`] to the client.
pub async fn run_connection(
    socket: WebSocket,
    mut event_rx: broadcast::Receiver<ExchangeEvent>,
    service: Arc<ExchangeService>,
) {
    let (mut ws_tx, mut ws_rx) = socket.split();
    let mut subs = SubscriptionManager::new();

    loop {
        tokio::select! {
            msg = ws_rx.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        let reply = handle_text_message(&text, &mut subs, &service).await;
                        if let Some(json) = encode(&reply)
                            && ws_tx.send(Message::text(json)).await.is_err() {
                                break;
                            }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    _ => {}
                }
            }
            event = event_rx.recv() => {
                match event {
                    Ok(event) => {
                        if !subs.matches(&event) {
                            continue;
                        }
                        let Ok(payload) = serde_json::to_value(&event) else {
                            tracing::warn!(
                                event = event.event_type_str(),
                                "failed to serialize event"
                            );
                            continue;
                        };
                        let msg = WsMessage::new(
                            uuid::Uuid::new_v4().to_string(),
                            WsMessageType::Event,
                            payload,
                        );
                        if let Some(json) = encode(&msg)
                            && ws_tx.send(Message::text(json)).await.is_err() {
                                break;
                            }
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        tracing::warn!(lagged = n, "ws client lagged behind event bus");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        }
    }

    tracing::debug!("ws connection closed");
}

fn encode(msg: &WsMessage) -> Option<String> {
    serde_json::to_string(msg).ok()
}

/// Handles a text message from the client and builds the reply.
async fn handle_text_message(
    text: &str,
    subs: &mut SubscriptionManager,
    service: &ExchangeService,
) -> WsMessage {
    let Ok(msg) = serde_json::from_str::<WsMessage>(text) else {
        return WsMessage::error("", 400, "malformed JSON");
    };
    if msg.msg_type != WsMessageType::Command {
        return WsMessage::error(msg.id, 400, "expected a command message");
    }
    let Ok(command) = serde_json::from_value::<WsCommand>(msg.payload) else {
        return WsMessage::error(msg.id, 404, "unknown command");
    };

    match execute(command, subs, service).await {
        Ok(payload) => WsMessage::new(msg.id, WsMessageType::Response, payload),
        Err(err) => WsMessage::error(msg.id, err.error_code(), err.to_string()),
    }
}

async fn execute(
    command: WsCommand,
    subs: &mut SubscriptionManager,
    service: &ExchangeService,
) -> Result<serde_json::Value, ExchangeError> {
    match command {
        WsCommand::Subscribe { asset_ids } => {
            let (ids, wildcard) = SubscriptionTarget::partition(&asset_ids);
            subs.subscribe(&ids, wildcard);
            Ok(serde_json::json!({
                "subscribed": ids,
                "count": subs.count(),
                "wildcard": subs.is_subscribed_all(),
            }))
        }
        WsCommand::Unsubscribe { asset_ids } => {
            let (ids, wildcard) = SubscriptionTarget::partition(&asset_ids);
            subs.unsubscribe(&ids, wildcard);
            Ok(serde_json::json!({
                "unsubscribed": ids,
                "remaining": subs.ids(),
                "wildcard": subs.is_subscribed_all(),
            }))
        }
        WsCommand::GetPool { asset_id } => {
            let entry = service.pool(asset_id).await?;
            serde_json::to_value(PoolDetailResponse::from(&entry))
                .map_err(|e| ExchangeError::Internal(e.to_string()))
        }
        WsCommand::QuoteBuy { ids, amounts } => {
            let amounts = parse_amounts("amounts", &amounts)?;
            let prices = service.quote_buy(&ids, &amounts).await?;
            Ok(quote_payload(&ids, &prices))
        }
        WsCommand::QuoteSell { ids, amounts } => {
            let amounts = parse_amounts("amounts", &amounts)?;
            let prices = service.quote_sell(&ids, &amounts).await?;
            Ok(quote_payload(&ids, &prices))
        }
    }
}

fn quote_payload(ids: &[AssetId], prices: &[hydra_amm::domain::Amount]) -> serde_json::Value {
    serde_json::json!({
        "ids": ids,
        "prices": prices.iter().map(ToString::to_string).collect::<Vec<_>>(),
    })
}
