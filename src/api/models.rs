use serde::{Deserialize, Serialize};

/// One chat message as exchanged with the backend. `id` and `timestamp` are
/// assigned by the server on persistence and absent on an entry that only
/// exists locally as an optimistic send.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    pub sender_id: i64,
    pub receiver_id: i64,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub read: Option<bool>,
}

impl ChatMessage {
    /// Payload for an outbound send: participants and content only, before
    /// the server has assigned anything.
    pub fn outgoing(sender_id: i64, receiver_id: i64, content: impl Into<String>) -> Self {
        Self {
            id: None,
            sender_id,
            receiver_id,
            content: content.into(),
            timestamp: None,
            read: None,
        }
    }

    pub fn involves(&self, user_id: i64) -> bool {
        self.sender_id == user_id || self.receiver_id == user_id
    }
}

/// A user this account has an open conversation with, as listed by the
/// messages overview endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSummary {
    pub id: i64,
    pub username: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile_picture_url: Option<String>,
}
