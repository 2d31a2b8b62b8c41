use serde::{Deserialize, Serialize};

use crate::api::models::ChatMessage;

/// Destination the backend routes outbound chat sends through.
pub const SEND_DESTINATION: &str = "/app/chat";

/// Per-user inbox topic carrying push deliveries from anyone, not just the
/// currently open conversation.
pub fn inbox_destination(user_id: i64) -> String {
    format!("/user/{user_id}/queue/messages")
}

/// Envelope for everything travelling over the live channel, serialized as
/// `{ "type": ..., "payload": ... }` text frames.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum Frame {
    /// Client → Server: open the logical session once the socket is up.
    #[serde(rename = "connect")]
    Connect,
    /// Server → Client: session accepted, subscriptions may follow.
    #[serde(rename = "connected")]
    Connected,
    /// Client → Server: start delivery for one destination.
    #[serde(rename = "subscribe")]
    Subscribe(Subscribe),
    /// Client → Server: publish a message to a destination.
    #[serde(rename = "send")]
    Send(Publish),
    /// Server → Client: push delivery on a subscribed destination.
    #[serde(rename = "message")]
    Message(Delivery),
    /// Server → Client: out-of-band failure.
    #[serde(rename = "error")]
    Error(ChannelFault),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subscribe {
    pub destination: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Publish {
    pub destination: String,
    pub message: ChatMessage,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Delivery {
    pub destination: String,
    pub message: ChatMessage,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelFault {
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn send_frame_wire_shape() {
        let frame = Frame::Send(Publish {
            destination: SEND_DESTINATION.to_string(),
            message: ChatMessage::outgoing(3, 9, "hello"),
        });
        let v: serde_json::Value = serde_json::from_str(&serde_json::to_string(&frame).unwrap()).unwrap();
        assert_eq!(v["type"], "send");
        assert_eq!(v["payload"]["destination"], "/app/chat");
        assert_eq!(v["payload"]["message"]["senderId"], 3);
        assert_eq!(v["payload"]["message"]["content"], "hello");
    }

    #[test]
    fn handshake_frames_carry_no_payload() {
        assert_eq!(serde_json::to_string(&Frame::Connect).unwrap(), r#"{"type":"connect"}"#);
        let back: Frame = serde_json::from_str(r#"{"type":"connected"}"#).unwrap();
        assert_eq!(back, Frame::Connected);
    }

    #[test]
    fn delivery_frame_parses_server_assigned_fields() {
        let raw = r#"{"type":"message","payload":{"destination":"/user/9/queue/messages","message":{"id":12,"senderId":5,"receiverId":9,"content":"hi","timestamp":"2026-08-07T08:00:00"}}}"#;
        match serde_json::from_str::<Frame>(raw).unwrap() {
            Frame::Message(delivery) => {
                assert_eq!(delivery.destination, inbox_destination(9));
                assert_eq!(delivery.message.id, Some(12));
            }
            other => panic!("expected delivery, got {other:?}"),
        }
    }
}
