//! Realtime Message Types
//!
//! Wire envelopes exchanged with the Expeta backend. Every frame is a single
//! JSON object carrying a `type` discriminator; subscription-scoped frames
//! also carry a `subscriptionId`.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::error::RealtimeResult;

/// Fired for every inbound application payload
pub const EVENT_MESSAGE: &str = "message";
/// Fired when a connection becomes live
pub const EVENT_OPEN: &str = "open";
/// Fired when a live connection closes
pub const EVENT_CLOSE: &str = "close";
/// Fired on connect failures and transport errors
pub const EVENT_ERROR: &str = "error";
/// Fired once when automatic reconnection gives up
pub const EVENT_RECONNECT_FAILED: &str = "reconnectFailed";

const CONVERSATION_PREFIX: &str = "conversation:";
const GENERATION_PREFIX: &str = "generation:";

/// Topic carrying updates for one conversation
pub fn conversation_topic(conversation_id: &str) -> String {
    format!("{}{}", CONVERSATION_PREFIX, conversation_id)
}

/// Topic carrying progress for one code generation
pub fn generation_topic(generation_id: &str) -> String {
    format!("{}{}", GENERATION_PREFIX, generation_id)
}

/// Protocol messages sent from client to server
///
/// Application payloads are arbitrary JSON and bypass this enum.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutboundMessage {
    /// Heartbeat
    Ping,
    /// Reply to a server heartbeat
    Pong,
    /// Register interest in a topic
    Subscribe {
        #[serde(rename = "subscriptionId")]
        subscription_id: String,
    },
    /// Withdraw interest in a topic
    Unsubscribe {
        #[serde(rename = "subscriptionId")]
        subscription_id: String,
    },
}

impl OutboundMessage {
    pub fn subscribe(topic: impl Into<String>) -> Self {
        Self::Subscribe {
            subscription_id: topic.into(),
        }
    }

    pub fn unsubscribe(topic: impl Into<String>) -> Self {
        Self::Unsubscribe {
            subscription_id: topic.into(),
        }
    }

    /// Serialize to a single text frame
    pub fn to_frame(&self) -> RealtimeResult<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// A parsed server-to-client frame
#[derive(Debug, Clone, PartialEq)]
pub struct InboundMessage {
    payload: Value,
}

impl InboundMessage {
    /// Parse a text frame. Fails only on malformed JSON.
    pub fn parse(text: &str) -> RealtimeResult<Self> {
        let payload: Value = serde_json::from_str(text)?;
        Ok(Self { payload })
    }

    /// The `type` discriminator, if present and a string
    pub fn kind(&self) -> Option<&str> {
        self.payload.get("type").and_then(Value::as_str)
    }

    /// The `subscriptionId` routing key, if present and a string
    pub fn subscription_id(&self) -> Option<&str> {
        self.payload.get("subscriptionId").and_then(Value::as_str)
    }

    pub fn is_ping(&self) -> bool {
        self.kind() == Some("ping")
    }

    pub fn is_pong(&self) -> bool {
        self.kind() == Some("pong")
    }

    pub fn payload(&self) -> &Value {
        &self.payload
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_outbound_ping_serialize() {
        let frame = OutboundMessage::Ping.to_frame().unwrap();
        assert_eq!(frame, r#"{"type":"ping"}"#);
    }

    #[test]
    fn test_outbound_subscribe_uses_camel_case_key() {
        let frame = OutboundMessage::subscribe("generation:g1").to_frame().unwrap();
        let value: Value = serde_json::from_str(&frame).unwrap();
        assert_eq!(
            value,
            json!({"type": "subscribe", "subscriptionId": "generation:g1"})
        );
    }

    #[test]
    fn test_outbound_unsubscribe_deserialize() {
        let json = r#"{"type": "unsubscribe", "subscriptionId": "conversation:c1"}"#;
        let msg: OutboundMessage = serde_json::from_str(json).unwrap();
        assert_eq!(msg, OutboundMessage::unsubscribe("conversation:c1"));
    }

    #[test]
    fn test_inbound_accessors() {
        let msg = InboundMessage::parse(
            r#"{"type":"update","subscriptionId":"conversation:c1","value":5}"#,
        )
        .unwrap();
        assert_eq!(msg.kind(), Some("update"));
        assert_eq!(msg.subscription_id(), Some("conversation:c1"));
        assert_eq!(msg.payload()["value"], 5);
        assert!(!msg.is_ping());
    }

    #[test]
    fn test_inbound_without_routing_fields() {
        let msg = InboundMessage::parse(r#"{"text":"hello"}"#).unwrap();
        assert_eq!(msg.kind(), None);
        assert_eq!(msg.subscription_id(), None);

        // Non-string discriminators are treated as absent
        let msg = InboundMessage::parse(r#"{"type":7,"subscriptionId":null}"#).unwrap();
        assert_eq!(msg.kind(), None);
        assert_eq!(msg.subscription_id(), None);
    }

    #[test]
    fn test_inbound_malformed() {
        assert!(InboundMessage::parse("{\"type\":").is_err());
        assert!(InboundMessage::parse("").is_err());
    }

    #[test]
    fn test_ping_pong_detection() {
        assert!(InboundMessage::parse(r#"{"type":"ping"}"#).unwrap().is_ping());
        assert!(InboundMessage::parse(r#"{"type":"pong"}"#).unwrap().is_pong());
    }

    #[test]
    fn test_topic_helpers() {
        assert_eq!(conversation_topic("c1"), "conversation:c1");
        assert_eq!(generation_topic("g-42"), "generation:g-42");
    }
}
