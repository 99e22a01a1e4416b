//! WebSocket message types: envelope and commands.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::AssetId;

/// Top-level WebSocket message envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WsMessage {
    /// Client-provided ID for requests; server-generated for events.
    pub id: String,
    /// Message type discriminator.
    #[serde(rename = "type")]
    pub msg_type: WsMessageType,
    /// ISO-8601 timestamp.
    pub timestamp: DateTime<Utc>,
    /// Variant-specific payload.
    pub payload: serde_json::Value,
}

impl WsMessage {
    /// Builds a server-originated message stamped with the current time.
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        msg_type: WsMessageType,
        payload: serde_json::Value,
    ) -> Self {
        Self {
            id: id.into(),
            msg_type,
            timestamp: Utc::now(),
            payload,
        }
    }

    /// Builds an error reply.
    #[must_use]
    pub fn error(id: impl Into<String>, code: u32, message: impl Into<String>) -> Self {
        Self::new(
            id,
            WsMessageType::Error,
            serde_json::json!({ "code": code, "message": message.into() }),
        )
    }
}

/// Discriminator for WebSocket message types.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum WsMessageType {
    /// Client → Server command.
    Command,
    /// Server → Client response to a command.
    Response,
    /// Server → Client broadcast event.
    Event,
    /// Server → Client error.
    Error,
}

/// One entry of a subscription list: an asset id or the `"*"` wildcard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SubscriptionTarget {
    /// A single asset id.
    Asset(AssetId),
    /// A pattern; only `"*"` is recognised.
    Pattern(String),
}

impl SubscriptionTarget {
    /// Splits targets into explicit ids and a wildcard flag. Unknown
    /// patterns are ignored.
    #[must_use]
    pub fn partition(targets: &[Self]) -> (Vec<AssetId>, bool) {
        let mut ids = Vec::new();
        let mut wildcard = false;
        for target in targets {
            match target {
                Self::Asset(id) => ids.push(*id),
                Self::Pattern(p) if p == "*" => wildcard = true,
                Self::Pattern(_) => {}
            }
        }
        (ids, wildcard)
    }
}

/// Commands that a client can send over WebSocket, carried in the
/// envelope payload.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum WsCommand {
    /// Follow events of specific pools. Use `["*"]` for all pools.
    Subscribe {
        /// Asset ids to follow.
        asset_ids: Vec<SubscriptionTarget>,
    },
    /// Stop following pools.
    Unsubscribe {
        /// Asset ids to drop.
        asset_ids: Vec<SubscriptionTarget>,
    },
    /// Get the current state of one pool.
    GetPool {
        /// Pool asset id.
        asset_id: AssetId,
    },
    /// Price a buy (read-only).
    QuoteBuy {
        /// Asset ids to buy.
        ids: Vec<AssetId>,
        /// Asset units per id (string-encoded u128).
        amounts: Vec<String>,
    },
    /// Price a sell (read-only).
    QuoteSell {
        /// Asset ids to sell.
        ids: Vec<AssetId>,
        /// Asset units per id (string-encoded u128).
        amounts: Vec<String>,
    },
}
