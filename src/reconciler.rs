//! Merging of the three message producers — history load, local optimistic
//! sends, push deliveries — into one ordered, duplicate-free sequence.

use log::debug;

use crate::api::models::ChatMessage;
use crate::utils::parse_timestamp;

/// Widest clock/serialization skew tolerated when matching a locally sent
/// message to its server-echoed copy.
pub const DEDUP_TOLERANCE_MS: i64 = 1000;

/// The message view of one open conversation. Entries stay in append order:
/// the history batch first, then optimistic sends and push deliveries in
/// real arrival order. The sequence is never re-sorted by timestamp.
#[derive(Debug, Default)]
pub struct MessageLog {
    entries: Vec<ChatMessage>,
}

impl MessageLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the sequence with a freshly loaded history batch.
    pub fn seed(&mut self, history: Vec<ChatMessage>) {
        self.entries = history;
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Record the user's own send immediately. This is always a genuinely
    /// new entry from the client's own action, so no duplicate scan.
    pub fn append_optimistic(&mut self, message: ChatMessage) {
        self.entries.push(message);
    }

    /// Fold in a push delivery. Returns false when the delivery was
    /// recognized as a copy of an entry already present and suppressed.
    pub fn merge_incoming(&mut self, message: ChatMessage) -> bool {
        if is_duplicate(&self.entries, &message) {
            debug!("suppressed duplicate delivery from {}", message.sender_id);
            return false;
        }
        self.entries.push(message);
        true
    }

    /// Drop the entry with the given persisted id. Only called once the
    /// remote delete has succeeded.
    pub fn remove(&mut self, id: i64) -> bool {
        let before = self.entries.len();
        self.entries.retain(|m| m.id != Some(id));
        self.entries.len() != before
    }

    pub fn entries(&self) -> &[ChatMessage] {
        &self.entries
    }

    pub fn snapshot(&self) -> Vec<ChatMessage> {
        self.entries.clone()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// True when `candidate` is a copy of a message already in `existing`.
///
/// A matching persisted id wins outright. Otherwise the same participants
/// and exact content count as the same logical message when both timestamps
/// parse and fall within [`DEDUP_TOLERANCE_MS`] of each other — that window
/// absorbs the skew between a client-stamped optimistic entry and its
/// server-stamped echo, whether or not the backend fans sends back to the
/// sender. An entry missing a parseable timestamp never matches this rule.
pub fn is_duplicate(existing: &[ChatMessage], candidate: &ChatMessage) -> bool {
    existing.iter().any(|entry| {
        if let (Some(a), Some(b)) = (entry.id, candidate.id) {
            if a == b {
                return true;
            }
        }
        entry.sender_id == candidate.sender_id
            && entry.receiver_id == candidate.receiver_id
            && entry.content == candidate.content
            && within_tolerance(entry.timestamp.as_deref(), candidate.timestamp.as_deref())
    })
}

fn within_tolerance(a: Option<&str>, b: Option<&str>) -> bool {
    match (a.and_then(parse_timestamp), b.and_then(parse_timestamp)) {
        (Some(a), Some(b)) => (a - b).num_milliseconds().abs() < DEDUP_TOLERANCE_MS,
        _ => false,
    }
}
